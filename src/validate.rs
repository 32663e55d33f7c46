use jsonschema::{Draft, JSONSchema};
use serde_json::Value;

use crate::data::ShapedElement;
use crate::errors::{Error, Result};

const ROW_SCHEMA: &str = include_str!("../schemas/osm_rows.json");

/// Checks shaped elements against the bundled row schema.
pub struct SchemaValidator {
    node: JSONSchema,
    way: JSONSchema,
}

fn compile(root: &Value, kind: &str) -> Result<JSONSchema> {
    let mut schema = root
        .get(kind)
        .cloned()
        .ok_or_else(|| Error::from(format!("Row schema has no '{}' entry", kind)))?;
    schema["definitions"] = root["definitions"].clone();

    // jsonschema 0.17 expects a schema with 'static lifetime; it lives for the whole run
    let schema: &'static Value = Box::leak(Box::new(schema));
    JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(schema)
        .map_err(|err| Error::from(format!("Failed to compile '{}' row schema: {}", kind, err)))
}

/// Last path segment that names a field rather than an array index.
fn field_name(instance_path: &str) -> String {
    instance_path
        .split('/')
        .filter(|segment| !segment.is_empty() && !segment.chars().all(|c| c.is_ascii_digit()))
        .last()
        .unwrap_or("<root>")
        .to_string()
}

impl SchemaValidator {
    pub fn new() -> Result<Self> {
        let root: Value = serde_json::from_str(ROW_SCHEMA)?;
        Ok(SchemaValidator {
            node: compile(&root, "node")?,
            way: compile(&root, "way")?,
        })
    }

    /// Reports the first violation found.
    pub fn validate(&self, element: &ShapedElement) -> Result<()> {
        let document = element.to_document()?;
        let schema = match element {
            ShapedElement::Node { .. } => &self.node,
            ShapedElement::Way { .. } => &self.way,
        };

        let result = schema.validate(&document);
        if let Err(mut errors) = result {
            if let Some(error) = errors.next() {
                let path = error.instance_path.to_string();
                let field = field_name(&path);
                let description = format!("{} (at {})", error, path);
                return Err(Error::schema_validation(element.kind_name(), element.id(), &field, &description));
            }
        }
        Ok(())
    }
}
