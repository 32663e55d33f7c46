use regex::Regex;

use crate::errors::Result;

pub const DEFAULT_TAG_TYPE: &str = "regular";

const LOWER: &str = r"^[a-z_]*$";
const LOWER_COLON: &str = r"^[a-z_]+:[a-z_]+";
const LOWER_COLON_EXACT: &str = r"^[a-z_]*:[a-z_]*$";
const PROBLEM_CHARS: &str = r#"[=+/&<>;'"?%#$@,. \t\r\n]"#;

/// A raw tag key split into its namespace (output column `type`) and local key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagKey {
    pub namespace: String,
    pub key: String,
}

/// Coarse shape of a raw key, counted by the audit pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyShape {
    Lower,
    LowerColon,
    ProblemChars,
    Other,
}

pub struct TagKeyClassifier {
    lower: Regex,
    lower_colon: Regex,
    lower_colon_exact: Regex,
    problem_chars: Regex,
}

impl TagKeyClassifier {
    pub fn new() -> Result<Self> {
        Ok(TagKeyClassifier {
            lower: Regex::new(LOWER)?,
            lower_colon: Regex::new(LOWER_COLON)?,
            lower_colon_exact: Regex::new(LOWER_COLON_EXACT)?,
            problem_chars: Regex::new(PROBLEM_CHARS)?,
        })
    }

    /// Keys with problem characters are blanked. Keys starting with a
    /// `prefix:local` run are split on their first colon only.
    pub fn classify(&self, raw: &str) -> TagKey {
        if self.problem_chars.is_match(raw) {
            return TagKey {
                namespace: DEFAULT_TAG_TYPE.to_string(),
                key: String::new(),
            };
        }
        match raw.split_once(':') {
            Some((namespace, key)) if self.lower_colon.is_match(raw) => TagKey {
                namespace: namespace.to_string(),
                key: key.to_string(),
            },
            _ => TagKey {
                namespace: DEFAULT_TAG_TYPE.to_string(),
                key: raw.to_string(),
            },
        }
    }

    pub fn shape(&self, raw: &str) -> KeyShape {
        if self.lower.is_match(raw) {
            KeyShape::Lower
        } else if self.lower_colon_exact.is_match(raw) {
            KeyShape::LowerColon
        } else if self.problem_chars.is_match(raw) {
            KeyShape::ProblemChars
        } else {
            KeyShape::Other
        }
    }
}
