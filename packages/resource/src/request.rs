use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The part of an inbound API request the resource layer reads.
///
/// The REST framework owns the full request; resources only need the path
/// and the query-string parameters used as filters.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Request {
    /// Request path, e.g. `/api/v1/notes/`
    #[serde(default)]
    pub path: String,

    /// Query-string parameters
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, String>,
}

impl Request {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_query() {
        let request = Request::new("/api/v1/notes/")
            .with_query("published", "true")
            .with_query("author", "abc");
        assert_eq!(request.query.len(), 2);
        assert_eq!(request.query["published"], "true");
    }

    #[test]
    fn deserializes_with_defaults() {
        let request: Request = serde_json::from_str(r#"{"path": "/x/"}"#).unwrap();
        assert_eq!(request, Request::new("/x/"));
    }
}
