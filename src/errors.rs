use std::{fmt, io, str::Utf8Error};
use quick_xml::events::attributes::AttrError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Xml,
    Parse,
    Config,
    Csv,
    Http,
    /// A required attribute is absent on a node or way element.
    MissingField,
    /// A required attribute is present but cannot be read as its column type.
    InvalidField,
    SchemaValidation,
    /// Remote postal code lookup did not produce a code. Never surfaces past
    /// the postal code normalizer.
    LookupFailure,
    Other,
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Error {
            kind,
            message: message.into(),
        }
    }

    pub fn missing_field(element: &str, id: Option<&str>, field: &str) -> Self {
        let message = match id {
            Some(id) => format!("{} {} is missing required field '{}'", element, id, field),
            None => format!("{} is missing required field '{}'", element, field),
        };
        Error::new(ErrorKind::MissingField, message)
    }

    pub fn invalid_field(element: &str, id: &str, field: &str, value: &str) -> Self {
        Error::new(
            ErrorKind::InvalidField,
            format!("{} {} has unreadable value '{}' in field '{}'", element, id, value, field),
        )
    }

    pub fn schema_validation(element: &str, id: i64, field: &str, description: &str) -> Self {
        Error::new(
            ErrorKind::SchemaValidation,
            format!(
                "Element of type '{}' with id {} has the following errors:\n'{}': {}",
                element, id, field, description
            ),
        )
    }

    pub fn lookup_failure(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::LookupFailure, message)
    }

    /// Field-shape errors abort the run in strict mode and only skip the
    /// element otherwise.
    pub fn is_field_error(&self) -> bool {
        matches!(self.kind, ErrorKind::MissingField | ErrorKind::InvalidField)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Error::new(ErrorKind::Io, value.to_string())
    }
}

impl From<quick_xml::Error> for Error {
    fn from(value: quick_xml::Error) -> Self {
        Error::new(ErrorKind::Xml, value.to_string())
    }
}

impl From<AttrError> for Error {
    fn from(value: AttrError) -> Self {
        Error::new(ErrorKind::Xml, value.to_string())
    }
}

impl From<Utf8Error> for Error {
    fn from(value: Utf8Error) -> Self {
        Error::new(ErrorKind::Parse, value.to_string())
    }
}

impl From<csv::Error> for Error {
    fn from(value: csv::Error) -> Self {
        Error::new(ErrorKind::Csv, value.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::new(ErrorKind::Config, value.to_string())
    }
}

impl From<regex::Error> for Error {
    fn from(value: regex::Error) -> Self {
        Error::new(ErrorKind::Config, value.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        Error::new(ErrorKind::Http, value.to_string())
    }
}

impl From<&str> for Error {
    fn from(value: &str) -> Self {
        Error::new(ErrorKind::Other, value)
    }
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Error::new(ErrorKind::Other, value)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_field_names_the_entity_and_field() {
        let err = Error::missing_field("way", Some("42"), "uid");
        assert_eq!(err.kind, ErrorKind::MissingField);
        assert!(err.message.contains("way 42"));
        assert!(err.message.contains("'uid'"));
        assert!(err.is_field_error());
    }

    #[test]
    fn schema_errors_are_not_field_errors() {
        let err = Error::schema_validation("node", 7, "lat", "91.0 is greater than the maximum of 90");
        assert!(!err.is_field_error());
        assert!(err.message.contains("'node' with id 7"));
        assert!(err.message.contains("'lat'"));
    }

    #[test]
    fn library_errors_keep_their_kind() {
        let err: Error = std::str::from_utf8(&[0xff, 0xfe]).unwrap_err().into();
        assert_eq!(err.kind, ErrorKind::Parse);
        let err: Error = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert_eq!(err.kind, ErrorKind::Io);
    }
}
