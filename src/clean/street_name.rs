use std::collections::HashMap;

use log::info;
use regex::Regex;

use crate::errors::Result;

/// Abbreviations and misspellings of street types seen in the Singapore
/// extract, mapped to their canonical spelling.
pub const DEFAULT_MAPPING: [(&str, &str); 23] = [
    ("Lor", "Lorong"),
    ("Terrance", "Terrace"),
    ("terrace", "Terrace"),
    ("St", "Street"),
    ("Upp", "Upper"),
    ("road", "Road"),
    ("Rd", "Road"),
    (" rd", " Road"),
    ("Roadc", "Road"),
    ("Roads", "Road"),
    ("Pl", "Place"),
    ("Jln", "Jalan"),
    ("aenue", "Avenue"),
    ("Ave", "Avenue"),
    ("Avebue", "Avenue"),
    ("AveNue", "Avenue"),
    ("avenue", "Avenue"),
    ("Blvd", "Boulevard"),
    ("Dr", "Drive"),
    ("drive", "Drive"),
    ("garden", "Garden"),
    ("geylang", "Geylang"),
    ("park", "Park"),
];

pub struct StreetNameNormalizer {
    mapping: HashMap<String, String>,
    type_end: Regex,
    type_num: Regex,
}

impl StreetNameNormalizer {
    pub fn new(mapping: HashMap<String, String>) -> Result<Self> {
        Ok(StreetNameNormalizer {
            mapping,
            type_end: Regex::new(r"(?i)[a-z]+$")?,
            type_num: Regex::new(r"[0-9]+$")?,
        })
    }

    /// Default table with `overrides` applied on top.
    pub fn with_overrides(overrides: &HashMap<String, String>) -> Result<Self> {
        let mut mapping: HashMap<String, String> = DEFAULT_MAPPING
            .iter()
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect();
        mapping.extend(overrides.iter().map(|(from, to)| (from.clone(), to.clone())));
        Self::new(mapping)
    }

    /// The word naming the kind of street. Numbered streets such as
    /// "Ang Mo Kio Avenue 3" carry it in the second to last word.
    pub fn street_type<'a>(&self, street_name: &'a str) -> Option<&'a str> {
        if let Some(m) = self.type_end.find(street_name) {
            return Some(m.as_str());
        }
        if self.type_num.is_match(street_name) {
            let words: Vec<&str> = street_name.split(' ').collect();
            let index = if words.len() >= 2 { words.len() - 2 } else { words.len() - 1 };
            return Some(words[index]);
        }
        None
    }

    /// Replaces every occurrence of the mapped street type in the name, not
    /// only the trailing one.
    pub fn normalize(&self, street_name: &str) -> String {
        let canonical = self
            .street_type(street_name)
            .and_then(|street_type| self.mapping.get(street_type).map(|to| (street_type, to)));

        match canonical {
            Some((street_type, to)) => {
                let normalized = street_name.replace(street_type, to);
                info!(before = street_name, after = normalized.as_str(); "Normalized street name");
                normalized
            }
            None => street_name.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> StreetNameNormalizer {
        StreetNameNormalizer::with_overrides(&HashMap::new()).unwrap()
    }

    #[test]
    fn trailing_word_is_the_street_type() {
        assert_eq!(normalizer().street_type("Jln Besar"), Some("Besar"));
        assert_eq!(normalizer().street_type("Orchard Rd"), Some("Rd"));
    }

    #[test]
    fn numbered_street_uses_second_to_last_word() {
        let normalizer = normalizer();
        assert_eq!(normalizer.street_type("Ang Mo Kio Avenue 3"), Some("Avenue"));
        assert_eq!(normalizer.normalize("Ang Mo Kio Avenue 3"), "Ang Mo Kio Avenue 3");
        assert_eq!(normalizer.normalize("Bedok North Ave 4"), "Bedok North Avenue 4");
    }

    #[test]
    fn single_number_is_its_own_street_type() {
        assert_eq!(normalizer().street_type("12"), Some("12"));
        assert_eq!(normalizer().street_type("Block 12-"), None);
    }

    #[test]
    fn mapped_abbreviation_is_expanded() {
        assert_eq!(normalizer().normalize("Orchard Rd"), "Orchard Road");
        assert_eq!(normalizer().normalize("Upper Serangoon road"), "Upper Serangoon Road");
    }

    #[test]
    fn only_the_detected_street_type_is_looked_up() {
        let mut mapping = HashMap::new();
        mapping.insert("Jln".to_string(), "Jalan".to_string());
        let normalizer = StreetNameNormalizer::new(mapping).unwrap();
        assert_eq!(normalizer.normalize("Jln Besar Jln"), "Jalan Besar Jalan");

        let mut overrides = HashMap::new();
        overrides.insert("Besar".to_string(), "Besar".to_string());
        let normalizer = StreetNameNormalizer::with_overrides(&overrides).unwrap();
        assert_eq!(normalizer.normalize("Jln Besar"), "Jln Besar");
        assert_eq!(normalizer.normalize("Jln"), "Jalan");
    }

    #[test]
    fn every_occurrence_of_the_token_is_replaced() {
        // "St" also matches inside "Stamford"
        assert_eq!(normalizer().normalize("Stamford St"), "Streetamford Street");
    }

    #[test]
    fn unknown_names_pass_through() {
        let normalizer = normalizer();
        assert_eq!(normalizer.normalize("Orchard Road"), "Orchard Road");
        assert_eq!(normalizer.normalize(""), "");
        assert_eq!(normalizer.normalize("Blk 123-"), "Blk 123-");
    }
}
