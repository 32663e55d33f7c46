use std::collections::HashMap;

pub type OsmId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Node,
    Way,
    Relation,
}

impl ElementKind {
    pub const ALL: [ElementKind; 3] = [ElementKind::Node, ElementKind::Way, ElementKind::Relation];

    pub fn from_name(name: &[u8]) -> Option<ElementKind> {
        match name {
            b"node" => Some(ElementKind::Node),
            b"way" => Some(ElementKind::Way),
            b"relation" => Some(ElementKind::Relation),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ElementKind::Node => "node",
            ElementKind::Way => "way",
            ElementKind::Relation => "relation",
        }
    }
}

/// A direct child of a top-level element (`tag`, `nd` or `member`).
#[derive(Debug, Clone, PartialEq)]
pub struct OsmChild {
    pub name: String,
    pub attributes: HashMap<String, String>,
}

impl OsmChild {
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// One top-level element with its attributes and its children in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct OsmElement {
    pub kind: ElementKind,
    pub attributes: HashMap<String, String>,
    pub children: Vec<OsmChild>,
}

impl OsmElement {
    pub fn new(kind: ElementKind) -> Self {
        OsmElement {
            kind,
            attributes: HashMap::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn tags(&self) -> impl Iterator<Item = &OsmChild> {
        self.children.iter().filter(|child| child.name == "tag")
    }
}
