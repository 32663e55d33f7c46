use log::{info, warn};
use regex::Regex;

use super::lookup::PostcodeLookup;
use crate::errors::Result;

/// Repairs Singapore postal codes, which are six digits and unique per building.
pub struct PostcodeNormalizer<'a> {
    lookup: &'a dyn PostcodeLookup,
    six_digits: Regex,
    five_digits: Regex,
    trailing_digits: Regex,
}

impl<'a> PostcodeNormalizer<'a> {
    pub fn new(lookup: &'a dyn PostcodeLookup) -> Result<Self> {
        Ok(PostcodeNormalizer {
            lookup,
            six_digits: Regex::new(r"^[0-9]{6}$")?,
            five_digits: Regex::new(r"^[0-9]{5}$")?,
            trailing_digits: Regex::new(r"[0-9]{6,}$")?,
        })
    }

    pub fn is_valid(&self, postcode: &str) -> bool {
        self.six_digits.is_match(postcode)
    }

    /// Never fails: when no repair applies and the lookup fails, the old code
    /// is returned as is.
    pub fn normalize(&self, old_postcode: &str, house_number: &str, street_name: &str) -> String {
        let postcode = old_postcode.trim();
        if self.six_digits.is_match(postcode) {
            return postcode.to_string();
        }

        let repaired = if self.five_digits.is_match(postcode) {
            // leading zero lost when the code was stored as a number
            Some(format!("0{}", postcode))
        } else {
            let compact: String = postcode.chars().filter(|c| !c.is_whitespace()).collect();
            self.trailing_digits
                .find(&compact)
                .map(|m| m.as_str()[m.as_str().len() - 6..].to_string())
        };

        let new_postcode = match repaired {
            Some(new_postcode) => new_postcode,
            None => match self.lookup.lookup(house_number, street_name) {
                Ok(found) => {
                    info!(house_number = house_number, street_name = street_name; "Retrieved postal code from lookup service");
                    found
                }
                Err(err) => {
                    warn!(house_number = house_number, street_name = street_name, err = err.message.as_str(); "Postal code lookup failed, keeping original");
                    old_postcode.to_string()
                }
            },
        };
        info!(before = old_postcode, after = new_postcode.as_str(); "Normalized postal code");
        new_postcode
    }
}
