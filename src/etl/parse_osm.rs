use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use xz::bufread::XzDecoder;

use crate::data::osm::{ElementKind, OsmChild, OsmElement};
use crate::errors::{Error, Result};

enum ParserState {
    Top,
    /// Inside a selected top-level element. `depth` counts open child tags.
    Element { element: OsmElement, depth: usize },
    /// Inside a top-level element of a kind that was not selected.
    Skipping { depth: usize },
}

/// Pull parser over an .osm document that yields one top-level element at a
/// time. Only the element being read is held in memory.
pub struct OsmElements<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    kinds: Vec<ElementKind>,
    state: ParserState,
    done: bool,
}

pub fn open_osm_file(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = fs::File::open(path)
        .map_err(|err| Error::from(format!("Could not open {}: {}", path.display(), err)))?;
    let file_reader = BufReader::new(file);
    let is_xz = path.extension().map_or(false, |ext| ext == "xz");
    if is_xz {
        let xz_reader = XzDecoder::new(file_reader);
        Ok(Box::new(BufReader::new(xz_reader)))
    } else {
        Ok(Box::new(file_reader))
    }
}

fn read_attributes(el: &BytesStart) -> Result<HashMap<String, String>> {
    let mut attributes = HashMap::new();
    for attribute_res in el.attributes() {
        let attribute = attribute_res?;
        let key = str::from_utf8(attribute.key.as_ref())?.to_string();
        let value = attribute.unescape_value()?.into_owned();
        attributes.insert(key, value);
    }
    Ok(attributes)
}

fn read_child(el: &BytesStart) -> Result<OsmChild> {
    Ok(OsmChild {
        name: str::from_utf8(el.name().as_ref())?.to_string(),
        attributes: read_attributes(el)?,
    })
}

impl OsmElements<Box<dyn BufRead>> {
    pub fn from_path(path: &Path, kinds: &[ElementKind]) -> Result<Self> {
        Ok(Self::from_reader(open_osm_file(path)?, kinds))
    }
}

impl<R: BufRead> OsmElements<R> {
    pub fn from_reader(input: R, kinds: &[ElementKind]) -> Self {
        let mut reader = Reader::from_reader(input);
        reader.trim_text(true);

        OsmElements {
            reader,
            buf: Vec::new(),
            kinds: kinds.to_vec(),
            state: ParserState::Top,
            done: false,
        }
    }

    fn start_top_level(kinds: &[ElementKind], el: &BytesStart) -> Result<Option<OsmElement>> {
        match ElementKind::from_name(el.name().as_ref()) {
            Some(kind) if kinds.contains(&kind) => {
                let mut element = OsmElement::new(kind);
                element.attributes = read_attributes(el)?;
                Ok(Some(element))
            }
            _ => Ok(None),
        }
    }

    fn is_top_level(el: &BytesStart) -> bool {
        ElementKind::from_name(el.name().as_ref()).is_some()
    }

    fn next_element(&mut self) -> Result<Option<OsmElement>> {
        loop {
            let event = self.reader.read_event_into(&mut self.buf)?;
            let state = std::mem::replace(&mut self.state, ParserState::Top);
            let (next_state, finished) = match (state, event) {
                (ParserState::Top, Event::Eof) => return Ok(None),
                (_, Event::Eof) => {
                    return Err(Error::from("Unexpected end of file inside an element"))
                }

                (ParserState::Top, Event::Start(e)) => match Self::start_top_level(&self.kinds, &e)? {
                    Some(element) => (ParserState::Element { element, depth: 0 }, None),
                    None if Self::is_top_level(&e) => (ParserState::Skipping { depth: 0 }, None),
                    // The <osm> root and anything else without children of interest
                    None => (ParserState::Top, None),
                },
                (ParserState::Top, Event::Empty(e)) => (ParserState::Top, Self::start_top_level(&self.kinds, &e)?),
                (ParserState::Top, _) => (ParserState::Top, None),

                (ParserState::Element { mut element, depth }, Event::Start(e)) => {
                    if depth == 0 {
                        element.children.push(read_child(&e)?);
                    }
                    (ParserState::Element { element, depth: depth + 1 }, None)
                }
                (ParserState::Element { mut element, depth }, Event::Empty(e)) => {
                    if depth == 0 {
                        element.children.push(read_child(&e)?);
                    }
                    (ParserState::Element { element, depth }, None)
                }
                (ParserState::Element { element, depth: 0 }, Event::End(_)) => (ParserState::Top, Some(element)),
                (ParserState::Element { element, depth }, Event::End(_)) => {
                    (ParserState::Element { element, depth: depth - 1 }, None)
                }
                (state @ ParserState::Element { .. }, _) => (state, None),

                (ParserState::Skipping { depth }, Event::Start(_)) => (ParserState::Skipping { depth: depth + 1 }, None),
                (ParserState::Skipping { depth: 0 }, Event::End(_)) => (ParserState::Top, None),
                (ParserState::Skipping { depth }, Event::End(_)) => (ParserState::Skipping { depth: depth - 1 }, None),
                (state @ ParserState::Skipping { .. }, _) => (state, None),
            };
            self.state = next_state;
            // nothing borrows the buffer past this point, clear it to keep memory usage low
            self.buf.clear();
            if finished.is_some() {
                return Ok(finished);
            }
        }
    }
}

impl<R: BufRead> Iterator for OsmElements<R> {
    type Item = Result<OsmElement>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_element() {
            Ok(Some(element)) => Some(Ok(element)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<osm version="0.6" generator="test">
  <bounds minlat="1.2" minlon="103.6" maxlat="1.5" maxlon="104.1"/>
  <node id="1" lat="1.30" lon="103.80" user="a" uid="7" version="1" changeset="9" timestamp="2017-01-01T00:00:00Z"/>
  <node id="2" lat="1.31" lon="103.81" user="b &amp; c" uid="8" version="2" changeset="9" timestamp="2017-01-01T00:00:00Z">
    <tag k="addr:street" v="Orchard Rd"/>
    <tag k="name" v="Caf&#233;"/>
  </node>
  <way id="10" user="a" uid="7" version="1" changeset="9" timestamp="2017-01-01T00:00:00Z">
    <nd ref="1"/>
    <tag k="highway" v="residential"/>
    <nd ref="2"/>
  </way>
  <relation id="20" user="a" uid="7" version="1" changeset="9" timestamp="2017-01-01T00:00:00Z">
    <member type="way" ref="10" role="outer"/>
    <tag k="type" v="multipolygon"/>
  </relation>
</osm>
"#;

    fn read_all(kinds: &[ElementKind]) -> Vec<OsmElement> {
        OsmElements::from_reader(SAMPLE.as_bytes(), kinds)
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn yields_top_level_elements_in_document_order() {
        let elements = read_all(&ElementKind::ALL);
        let kinds: Vec<ElementKind> = elements.iter().map(|el| el.kind).collect();
        assert_eq!(
            kinds,
            vec![ElementKind::Node, ElementKind::Node, ElementKind::Way, ElementKind::Relation]
        );
    }

    #[test]
    fn keeps_children_in_document_order() {
        let elements = read_all(&[ElementKind::Way]);
        assert_eq!(elements.len(), 1);
        let names: Vec<&str> = elements[0].children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["nd", "tag", "nd"]);
        assert_eq!(elements[0].children[2].attr("ref"), Some("2"));
    }

    #[test]
    fn unescapes_attribute_values() {
        let elements = read_all(&[ElementKind::Node]);
        assert_eq!(elements[1].attr("user"), Some("b & c"));
        assert_eq!(elements[1].children[1].attr("v"), Some("Café"));
        assert!(elements[0].children.is_empty());
    }

    #[test]
    fn unselected_kinds_are_skipped_with_their_children() {
        let elements = read_all(&[ElementKind::Node, ElementKind::Way]);
        assert_eq!(elements.len(), 3);
        assert!(elements.iter().all(|el| el.kind != ElementKind::Relation));
        let elements = read_all(&[ElementKind::Relation]);
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].children[0].name, "member");
    }

    #[test]
    fn truncated_document_is_an_error() {
        let truncated = r#"<osm><way id="1"><nd ref="1"/>"#;
        let results: Vec<Result<OsmElement>> =
            OsmElements::from_reader(truncated.as_bytes(), &ElementKind::ALL).collect();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }
}
