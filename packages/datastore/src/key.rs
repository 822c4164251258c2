//! Entity keys and their URL-safe string form.

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::Error;

/// The identifier half of a key: a numeric id or a string name.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum KeyId {
    /// Numeric id, allocated by the datastore or chosen by the caller.
    Id(i64),
    /// Caller-chosen string name.
    Name(String),
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyId::Id(id) => write!(f, "{}", id),
            KeyId::Name(name) => write!(f, "'{}'", name),
        }
    }
}

/// A globally unique reference to a stored entity.
///
/// A key is a `(kind, id)` pair. Its [`urlsafe`](Key::urlsafe) form is an
/// opaque string that can travel in URLs and is turned back into the same
/// key by [`Key::from_urlsafe`].
///
/// ```rust
/// use docrest_datastore::Key;
///
/// let key = Key::with_id("Note", 42);
/// let encoded = key.urlsafe();
/// assert_eq!(Key::from_urlsafe(&encoded).unwrap(), key);
/// ```
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Key {
    kind: String,
    id: KeyId,
}

const LENGTH_SEP: char = ':';
const ID_TAG: char = 'i';
const NAME_TAG: char = 'n';

impl Key {
    /// Create a key with a numeric id.
    pub fn with_id(kind: impl Into<String>, id: i64) -> Self {
        Key {
            kind: kind.into(),
            id: KeyId::Id(id),
        }
    }

    /// Create a key with a string name.
    pub fn with_name(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Key {
            kind: kind.into(),
            id: KeyId::Name(name.into()),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn id(&self) -> &KeyId {
        &self.id
    }

    /// Encode this key as an opaque URL-safe string.
    ///
    /// The kind is length-prefixed, so any kind text survives the round trip.
    pub fn urlsafe(&self) -> String {
        let tagged = match &self.id {
            KeyId::Id(id) => format!("{}{}", ID_TAG, id),
            KeyId::Name(name) => format!("{}{}", NAME_TAG, name),
        };
        let raw = format!("{}{}{}{}", self.kind.len(), LENGTH_SEP, self.kind, tagged);
        URL_SAFE_NO_PAD.encode(raw.as_bytes())
    }

    /// Decode a key produced by [`urlsafe`](Key::urlsafe).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidKey`] if the string is not valid URL-safe
    /// base64, does not decode to UTF-8, or does not describe a complete key.
    pub fn from_urlsafe(encoded: &str) -> Result<Self, Error> {
        let raw = URL_SAFE_NO_PAD
            .decode(encoded.trim_end_matches('='))
            .map_err(|e| Error::invalid_key(format!("'{}' is not url-safe base64: {}", encoded, e)))?;
        let text = String::from_utf8(raw)
            .map_err(|_| Error::invalid_key(format!("'{}' does not decode to UTF-8", encoded)))?;

        let (length, rest) = text
            .split_once(LENGTH_SEP)
            .ok_or_else(|| Error::invalid_key(format!("'{}' has no kind length", encoded)))?;
        let length: usize = length
            .parse()
            .map_err(|_| Error::invalid_key(format!("'{}' has a malformed kind length", encoded)))?;
        let (kind, tagged) = match (rest.get(..length), rest.get(length..)) {
            (Some(kind), Some(tagged)) => (kind, tagged),
            _ => return Err(Error::invalid_key(format!("'{}' has a truncated kind", encoded))),
        };
        if kind.is_empty() {
            return Err(Error::invalid_key(format!("'{}' has an empty kind", encoded)));
        }

        let mut chars = tagged.chars();
        let id = match chars.next() {
            Some(ID_TAG) => {
                let id: i64 = chars.as_str().parse().map_err(|_| {
                    Error::invalid_key(format!("'{}' has a malformed numeric id", encoded))
                })?;
                if id <= 0 {
                    return Err(Error::invalid_key(format!(
                        "'{}' has a non-positive id",
                        encoded
                    )));
                }
                KeyId::Id(id)
            }
            Some(NAME_TAG) if !chars.as_str().is_empty() => KeyId::Name(chars.as_str().to_string()),
            _ => {
                return Err(Error::invalid_key(format!(
                    "'{}' has no id or name",
                    encoded
                )))
            }
        };

        Ok(Key {
            kind: kind.to_string(),
            id,
        })
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key('{}', {})", self.kind, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urlsafe_roundtrips_numeric_id() {
        let key = Key::with_id("Note", 5629499534213120);
        assert_eq!(Key::from_urlsafe(&key.urlsafe()).unwrap(), key);
    }

    #[test]
    fn urlsafe_roundtrips_name_with_separators() {
        let key = Key::with_name("Author", "a/b?c=d&e");
        let encoded = key.urlsafe();
        assert!(encoded
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_eq!(Key::from_urlsafe(&encoded).unwrap(), key);
    }

    #[test]
    fn padded_input_is_accepted() {
        let key = Key::with_id("A", 1);
        let padded = format!("{}==", key.urlsafe());
        assert_eq!(Key::from_urlsafe(&padded).unwrap(), key);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            Key::from_urlsafe("not a key!"),
            Err(Error::InvalidKey { .. })
        ));
        assert!(Key::from_urlsafe("").is_err());
    }

    #[test]
    fn missing_parts_are_rejected() {
        for raw in ["Note", "x:Notei1", "9:Notei1", "0:i12", "4:Noteixyz", "4:Notei0", "4:Noten"] {
            let encoded = URL_SAFE_NO_PAD.encode(raw);
            assert!(Key::from_urlsafe(&encoded).is_err(), "{:?} should be rejected", raw);
        }
    }

    #[test]
    fn kinds_with_separator_characters_roundtrip() {
        for kind in ["Line\nBreak", "a:b", "12:x", "Ünïcode"] {
            let key = Key::with_id(kind, 7);
            assert_eq!(Key::from_urlsafe(&key.urlsafe()).unwrap(), key);

            let named = Key::with_name(kind, "n\ni5");
            assert_eq!(Key::from_urlsafe(&named.urlsafe()).unwrap(), named);
        }
    }

    #[test]
    fn display_shows_kind_and_id() {
        assert_eq!(Key::with_id("Note", 3).to_string(), "Key('Note', 3)");
        assert_eq!(
            Key::with_name("Note", "first").to_string(),
            "Key('Note', 'first')"
        );
    }
}
