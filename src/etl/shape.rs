use std::str::FromStr;

use crate::clean::tag_key::TagKeyClassifier;
use crate::data::osm::{ElementKind, OsmChild, OsmElement, OsmId};
use crate::data::{NodeRecord, ShapedElement, TagRecord, WayNodeRecord, WayRecord};
use crate::errors::{Error, Result};

/// Turns one node or way element into its rows. Relations are not shaped.
pub struct ElementShaper {
    classifier: TagKeyClassifier,
}

/// Typed access to the attributes of one element, naming the element in errors.
struct Fields<'a> {
    element: &'a OsmElement,
    id: Option<&'a str>,
}

impl<'a> Fields<'a> {
    fn new(element: &'a OsmElement) -> Self {
        Fields {
            element,
            id: element.attr("id"),
        }
    }

    fn text(&self, field: &str) -> Result<String> {
        self.element
            .attr(field)
            .map(str::to_string)
            .ok_or_else(|| Error::missing_field(self.element.kind.name(), self.id, field))
    }

    fn parse<T: FromStr>(&self, field: &str) -> Result<T> {
        let value = self
            .element
            .attr(field)
            .ok_or_else(|| Error::missing_field(self.element.kind.name(), self.id, field))?;
        value
            .trim()
            .parse()
            .map_err(|_| Error::invalid_field(self.element.kind.name(), self.id.unwrap_or("?"), field, value))
    }
}

impl ElementShaper {
    pub fn new(classifier: TagKeyClassifier) -> Self {
        ElementShaper { classifier }
    }

    pub fn shape(&self, element: &OsmElement) -> Result<Option<ShapedElement>> {
        match element.kind {
            ElementKind::Node => Ok(Some(self.shape_node(element)?)),
            ElementKind::Way => Ok(Some(self.shape_way(element)?)),
            ElementKind::Relation => Ok(None),
        }
    }

    fn shape_node(&self, element: &OsmElement) -> Result<ShapedElement> {
        let fields = Fields::new(element);
        let node = NodeRecord {
            id: fields.parse("id")?,
            lat: fields.text("lat")?,
            lon: fields.text("lon")?,
            user: fields.text("user")?,
            uid: fields.text("uid")?,
            version: fields.text("version")?,
            changeset: fields.text("changeset")?,
            timestamp: fields.text("timestamp")?,
        };
        let tags = element
            .tags()
            .map(|child| self.shape_tag(element, node.id, child))
            .collect::<Result<Vec<_>>>()?;
        Ok(ShapedElement::Node { node, tags })
    }

    fn shape_way(&self, element: &OsmElement) -> Result<ShapedElement> {
        let fields = Fields::new(element);
        let way = WayRecord {
            id: fields.parse("id")?,
            user: fields.text("user")?,
            uid: fields.text("uid")?,
            version: fields.text("version")?,
            changeset: fields.text("changeset")?,
            timestamp: fields.text("timestamp")?,
        };

        let mut nodes = Vec::new();
        let mut tags = Vec::new();
        // position counts every child, not only the node references
        for (position, child) in element.children.iter().enumerate() {
            match child.name.as_str() {
                "tag" => tags.push(self.shape_tag(element, way.id, child)?),
                "nd" => {
                    let node_ref = child
                        .attr("ref")
                        .ok_or_else(|| Error::missing_field("way", Some(way.id.to_string().as_str()), "nd/ref"))?;
                    let node_id = node_ref
                        .parse::<OsmId>()
                        .map_err(|_| Error::invalid_field("way", &way.id.to_string(), "nd/ref", node_ref))?;
                    nodes.push(WayNodeRecord {
                        id: way.id,
                        node_id,
                        position,
                    });
                }
                _ => (),
            }
        }
        Ok(ShapedElement::Way { way, nodes, tags })
    }

    fn shape_tag(&self, element: &OsmElement, id: OsmId, child: &OsmChild) -> Result<TagRecord> {
        let owner = id.to_string();
        let raw_key = child
            .attr("k")
            .ok_or_else(|| Error::missing_field(element.kind.name(), Some(owner.as_str()), "tag/k"))?;
        let value = child
            .attr("v")
            .ok_or_else(|| Error::missing_field(element.kind.name(), Some(owner.as_str()), "tag/v"))?;
        let tag_key = self.classifier.classify(raw_key);
        Ok(TagRecord {
            id,
            key: tag_key.key,
            value: value.to_string(),
            tag_type: tag_key.namespace,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::errors::ErrorKind;

    fn attrs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn child(name: &str, pairs: &[(&str, &str)]) -> OsmChild {
        OsmChild {
            name: name.to_string(),
            attributes: attrs(pairs),
        }
    }

    fn shaper() -> ElementShaper {
        ElementShaper::new(TagKeyClassifier::new().unwrap())
    }

    fn way(children: Vec<OsmChild>) -> OsmElement {
        OsmElement {
            kind: ElementKind::Way,
            attributes: attrs(&[
                ("id", "100"),
                ("user", "mapper"),
                ("uid", "5"),
                ("version", "3"),
                ("changeset", "77"),
                ("timestamp", "2017-09-01T10:00:00Z"),
            ]),
            children,
        }
    }

    #[test]
    fn way_node_positions_count_all_children() {
        let element = way(vec![
            child("tag", &[("k", "highway"), ("v", "primary")]),
            child("nd", &[("ref", "1")]),
            child("tag", &[("k", "addr:street"), ("v", "Orchard Road")]),
            child("nd", &[("ref", "2")]),
            child("nd", &[("ref", "3")]),
        ]);

        let shaped = shaper().shape(&element).unwrap().unwrap();
        match shaped {
            ShapedElement::Way { way, nodes, tags } => {
                assert_eq!(way.id, 100);
                let positions: Vec<usize> = nodes.iter().map(|n| n.position).collect();
                assert_eq!(positions, vec![1, 3, 4]);
                let refs: Vec<OsmId> = nodes.iter().map(|n| n.node_id).collect();
                assert_eq!(refs, vec![1, 2, 3]);
                assert!(nodes.iter().all(|n| n.id == 100));
                assert_eq!(tags.len(), 2);
                assert_eq!(tags[1].tag_type, "addr");
                assert_eq!(tags[1].key, "street");
            }
            other => panic!("expected a way, got {:?}", other),
        }
    }

    #[test]
    fn node_reads_fixed_fields_and_tags() {
        let element = OsmElement {
            kind: ElementKind::Node,
            attributes: attrs(&[
                ("id", "7"),
                ("lat", "1.2834000"),
                ("lon", "103"),
                ("user", "mapper"),
                ("uid", "5"),
                ("version", "2"),
                ("changeset", "77"),
                ("timestamp", "2017-09-01T10:00:00Z"),
            ]),
            children: vec![
                child("tag", &[("k", "amenity"), ("v", "cafe")]),
                child("tag", &[("k", "opening hours"), ("v", "24/7")]),
            ],
        };

        let shaped = shaper().shape(&element).unwrap().unwrap();
        match shaped {
            ShapedElement::Node { node, tags } => {
                assert_eq!(node.id, 7);
                assert_eq!(node.lat, "1.2834000");
                assert_eq!(node.lon, "103");
                assert_eq!(node.version, "2");
                assert_eq!(tags.len(), 2);
                assert_eq!(tags[0].key, "amenity");
                assert_eq!(tags[0].tag_type, "regular");
                assert_eq!(tags[1].key, "");
                assert_eq!(tags[1].value, "24/7");
                assert!(tags.iter().all(|t| t.id == 7));
            }
            other => panic!("expected a node, got {:?}", other),
        }
    }

    #[test]
    fn missing_field_is_an_error() {
        let mut element = way(Vec::new());
        element.attributes.remove("uid");
        let err = shaper().shape(&element).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingField);
        assert!(err.message.contains("uid"));
        assert!(err.message.contains("100"));
    }

    #[test]
    fn unreadable_id_is_an_error() {
        let mut element = way(Vec::new());
        element.attributes.insert("id".to_string(), "abc".to_string());
        let err = shaper().shape(&element).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidField);
    }

    #[test]
    fn non_key_columns_are_not_parsed() {
        let mut element = way(Vec::new());
        element.attributes.insert("changeset".to_string(), "abc".to_string());
        match shaper().shape(&element).unwrap().unwrap() {
            ShapedElement::Way { way, .. } => assert_eq!(way.changeset, "abc"),
            other => panic!("expected a way, got {:?}", other),
        }
    }

    #[test]
    fn relations_are_not_shaped() {
        let element = OsmElement::new(ElementKind::Relation);
        assert!(shaper().shape(&element).unwrap().is_none());
    }
}
