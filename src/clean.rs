pub mod lookup;
pub mod postcode;
pub mod street_name;
pub mod tag_key;

use crate::data::ShapedElement;

use self::postcode::PostcodeNormalizer;
use self::street_name::StreetNameNormalizer;

const STREET_KEY: &str = "street";
const POSTCODE_KEY: &str = "postcode";
const HOUSE_NUMBER_KEY: &str = "housenumber";

/// Field-level cleaning of a shaped element's tags.
pub struct ElementCleaner<'a> {
    street_names: StreetNameNormalizer,
    postcodes: PostcodeNormalizer<'a>,
}

impl<'a> ElementCleaner<'a> {
    pub fn new(street_names: StreetNameNormalizer, postcodes: PostcodeNormalizer<'a>) -> Self {
        ElementCleaner {
            street_names,
            postcodes,
        }
    }

    /// Street names are rewritten as they are met. The postal code is only
    /// repaired when street, postal code and house number are all present.
    pub fn clean(&self, element: &mut ShapedElement) {
        let mut street_name = String::new();
        let mut postcode = String::new();
        let mut house_number = String::new();

        for tag in element.tags_mut().iter_mut() {
            match tag.key.as_str() {
                STREET_KEY => {
                    tag.value = self.street_names.normalize(&tag.value);
                    street_name = tag.value.clone();
                }
                POSTCODE_KEY => postcode = tag.value.trim().to_string(),
                HOUSE_NUMBER_KEY => house_number = tag.value.clone(),
                _ => (),
            }
        }

        if street_name.is_empty() || postcode.is_empty() || house_number.is_empty() {
            return;
        }

        let new_postcode = self.postcodes.normalize(&postcode, &house_number, &street_name);
        for tag in element.tags_mut().iter_mut().filter(|tag| tag.key == POSTCODE_KEY) {
            tag.value = new_postcode.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::clean::lookup::testing::stub;
    use crate::data::{NodeRecord, TagRecord};

    fn tag(key: &str, value: &str) -> TagRecord {
        TagRecord {
            id: 1,
            key: key.to_string(),
            value: value.to_string(),
            tag_type: "addr".to_string(),
        }
    }

    fn node_with(tags: Vec<TagRecord>) -> ShapedElement {
        ShapedElement::Node {
            node: NodeRecord {
                id: 1,
                lat: "1.3".to_string(),
                lon: "103.8".to_string(),
                user: "mapper".to_string(),
                uid: "5".to_string(),
                version: "1".to_string(),
                changeset: "11".to_string(),
                timestamp: "2017-09-01T00:00:00Z".to_string(),
            },
            tags,
        }
    }

    fn values(element: &ShapedElement) -> Vec<&str> {
        element.tags().iter().map(|tag| tag.value.as_str()).collect()
    }

    #[test]
    fn postcode_is_repaired_after_street_name_cleaning() {
        let lookup = stub(Some("238826"));
        let cleaner = ElementCleaner::new(
            StreetNameNormalizer::with_overrides(&HashMap::new()).unwrap(),
            PostcodeNormalizer::new(&lookup).unwrap(),
        );
        let mut element = node_with(vec![
            tag("postcode", "Singapore"),
            tag("housenumber", "10"),
            tag("street", "Orchard Rd"),
        ]);

        cleaner.clean(&mut element);

        assert_eq!(values(&element), vec!["238826", "10", "Orchard Road"]);
        assert_eq!(
            *lookup.calls.borrow(),
            vec![("10".to_string(), "Orchard Road".to_string())]
        );
    }

    #[test]
    fn partial_addresses_are_left_alone() {
        let lookup = stub(Some("238826"));
        let cleaner = ElementCleaner::new(
            StreetNameNormalizer::with_overrides(&HashMap::new()).unwrap(),
            PostcodeNormalizer::new(&lookup).unwrap(),
        );
        let mut without_house = node_with(vec![tag("street", "Orchard Road"), tag("postcode", "38826")]);
        let mut without_street = node_with(vec![tag("housenumber", "10"), tag("postcode", "38826")]);
        let mut without_postcode = node_with(vec![tag("housenumber", "10"), tag("street", "Orchard Road")]);

        cleaner.clean(&mut without_house);
        cleaner.clean(&mut without_street);
        cleaner.clean(&mut without_postcode);

        assert_eq!(values(&without_house), vec!["Orchard Road", "38826"]);
        assert_eq!(values(&without_street), vec!["10", "38826"]);
        assert_eq!(values(&without_postcode), vec!["10", "Orchard Road"]);
        assert!(lookup.calls.borrow().is_empty());
    }

    #[test]
    fn five_digit_postcode_is_padded_on_complete_address() {
        let lookup = stub(None);
        let cleaner = ElementCleaner::new(
            StreetNameNormalizer::with_overrides(&HashMap::new()).unwrap(),
            PostcodeNormalizer::new(&lookup).unwrap(),
        );
        let mut element = node_with(vec![
            tag("street", "Raffles Place"),
            tag("housenumber", "1"),
            tag("postcode", " 48616 "),
        ]);

        cleaner.clean(&mut element);

        assert_eq!(values(&element), vec!["Raffles Place", "1", "048616"]);
        assert!(lookup.calls.borrow().is_empty());
    }
}
