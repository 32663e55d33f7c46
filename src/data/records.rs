use serde::Serialize;
use serde_json::{json, Value};

use super::osm::OsmId;
use crate::errors::Result;

// Column order must match the table definitions of the target database.
pub const NODE_FIELDS: [&str; 8] = ["id", "lat", "lon", "user", "uid", "version", "changeset", "timestamp"];
pub const NODE_TAGS_FIELDS: [&str; 4] = ["id", "key", "value", "type"];
pub const WAY_FIELDS: [&str; 6] = ["id", "user", "uid", "version", "changeset", "timestamp"];
pub const WAY_NODES_FIELDS: [&str; 3] = ["id", "node_id", "position"];
pub const WAY_TAGS_FIELDS: [&str; 4] = ["id", "key", "value", "type"];

/// Everything except the id is kept as the source text, so output columns
/// carry the attribute values unchanged.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub id: OsmId,
    pub lat: String,
    pub lon: String,
    pub user: String,
    pub uid: String,
    pub version: String,
    pub changeset: String,
    pub timestamp: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct WayRecord {
    pub id: OsmId,
    pub user: String,
    pub uid: String,
    pub version: String,
    pub changeset: String,
    pub timestamp: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TagRecord {
    pub id: OsmId,
    pub key: String,
    pub value: String,
    #[serde(rename = "type")]
    pub tag_type: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct WayNodeRecord {
    pub id: OsmId,
    pub node_id: OsmId,
    /// Index of the `nd` child among all children of the way.
    pub position: usize,
}

/// A numeric column as a JSON number when its text reads as one, otherwise
/// as the text itself so the schema reports it.
fn numeric(text: &str) -> Value {
    if let Ok(integer) = text.parse::<i64>() {
        return Value::from(integer);
    }
    match text.parse::<f64>() {
        Ok(float) if float.is_finite() => Value::from(float),
        _ => Value::from(text),
    }
}

/// The flat record set produced from one node or way element.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapedElement {
    Node {
        node: NodeRecord,
        tags: Vec<TagRecord>,
    },
    Way {
        way: WayRecord,
        nodes: Vec<WayNodeRecord>,
        tags: Vec<TagRecord>,
    },
}

impl ShapedElement {
    pub fn id(&self) -> OsmId {
        match self {
            ShapedElement::Node { node, .. } => node.id,
            ShapedElement::Way { way, .. } => way.id,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            ShapedElement::Node { .. } => "node",
            ShapedElement::Way { .. } => "way",
        }
    }

    pub fn tags(&self) -> &[TagRecord] {
        match self {
            ShapedElement::Node { tags, .. } => tags,
            ShapedElement::Way { tags, .. } => tags,
        }
    }

    pub fn tags_mut(&mut self) -> &mut Vec<TagRecord> {
        match self {
            ShapedElement::Node { tags, .. } => tags,
            ShapedElement::Way { tags, .. } => tags,
        }
    }

    /// JSON form checked by the schema validator, keyed like the output tables.
    pub fn to_document(&self) -> Result<Value> {
        let document = match self {
            ShapedElement::Node { node, tags } => {
                let mut row = serde_json::to_value(node)?;
                row["lat"] = numeric(&node.lat);
                row["lon"] = numeric(&node.lon);
                row["uid"] = numeric(&node.uid);
                row["changeset"] = numeric(&node.changeset);
                json!({
                    "node": row,
                    "node_tags": serde_json::to_value(tags)?,
                })
            }
            ShapedElement::Way { way, nodes, tags } => {
                let mut row = serde_json::to_value(way)?;
                row["uid"] = numeric(&way.uid);
                row["changeset"] = numeric(&way.changeset);
                json!({
                    "way": row,
                    "way_nodes": serde_json::to_value(nodes)?,
                    "way_tags": serde_json::to_value(tags)?,
                })
            }
        };
        Ok(document)
    }
}
