//! Error types for the datastore layer.

/// Errors raised by keys, schemas and datastore implementations.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A URL-safe key string could not be decoded.
    #[error("invalid key: {message}")]
    InvalidKey { message: String },

    /// A property value does not satisfy its schema declaration.
    #[error("bad value for property '{property}': {message}")]
    BadValue { property: String, message: String },

    /// An entity or key of one kind was used where another kind is expected.
    #[error("kind mismatch: expected '{expected}', got '{found}'")]
    KindMismatch { expected: String, found: String },

    /// The backing store could not serve the call.
    #[error("datastore unavailable: {message}")]
    Unavailable { message: String },

    #[error("{message}")]
    Other { message: String },
}

impl Error {
    pub(crate) fn invalid_key(message: impl Into<String>) -> Self {
        Error::InvalidKey {
            message: message.into(),
        }
    }

    pub(crate) fn bad_value(property: &str, message: impl Into<String>) -> Self {
        Error::BadValue {
            property: property.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_key_display() {
        let e = Error::invalid_key("bad base64");
        assert_eq!(e.to_string(), "invalid key: bad base64");
    }

    #[test]
    fn bad_value_display() {
        let e = Error::bad_value("title", "required");
        let display = e.to_string();
        assert!(display.contains("'title'"));
        assert!(display.contains("required"));
    }

    #[test]
    fn kind_mismatch_display() {
        let e = Error::KindMismatch {
            expected: "Note".to_string(),
            found: "Author".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "kind mismatch: expected 'Note', got 'Author'"
        );
    }

    #[test]
    fn other_display_is_bare_message() {
        let e = Error::Other {
            message: "something went wrong".to_string(),
        };
        assert_eq!(e.to_string(), "something went wrong");
    }
}
