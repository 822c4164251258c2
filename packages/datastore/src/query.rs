//! Kind queries with equality filters.

use crate::{Entity, Value};

/// An equality constraint on one property.
#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    pub property: String,
    pub value: Value,
}

impl Filter {
    /// Whether `entity` satisfies this filter.
    ///
    /// A repeated (list) property matches when any of its items equals the
    /// filter value.
    pub fn matches(&self, entity: &Entity) -> bool {
        match entity.get(&self.property) {
            Some(Value::List(items)) if !matches!(self.value, Value::List(_)) => {
                items.contains(&self.value)
            }
            Some(value) => value == &self.value,
            None => self.value.is_null(),
        }
    }
}

/// A query over all entities of one kind, narrowed by equality filters.
///
/// ```rust
/// use docrest_datastore::Query;
///
/// let query = Query::new("Note").filter("published", true);
/// assert_eq!(query.filters().len(), 1);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    kind: String,
    filters: Vec<Filter>,
}

impl Query {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            filters: Vec::new(),
        }
    }

    /// Add an equality filter.
    #[must_use]
    pub fn filter(mut self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            property: property.into(),
            value: value.into(),
        });
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Whether `entity` is of this query's kind and passes every filter.
    pub fn matches(&self, entity: &Entity) -> bool {
        entity.kind() == self.kind && self.filters.iter().all(|f| f.matches(entity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_must_match() {
        let query = Query::new("Note");
        assert!(query.matches(&Entity::new("Note")));
        assert!(!query.matches(&Entity::new("Author")));
    }

    #[test]
    fn all_filters_must_hold() {
        let query = Query::new("Note")
            .filter("published", true)
            .filter("views", 3);
        let entity = Entity::new("Note")
            .with_property("published", true)
            .with_property("views", 3);
        assert!(query.matches(&entity));

        let entity = Entity::new("Note")
            .with_property("published", true)
            .with_property("views", 4);
        assert!(!query.matches(&entity));
    }

    #[test]
    fn repeated_property_matches_any_item() {
        let query = Query::new("Note").filter("tags", "rust");
        let entity = Entity::new("Note").with_property("tags", vec!["go", "rust"]);
        assert!(query.matches(&entity));
    }

    #[test]
    fn absent_property_only_matches_null() {
        let entity = Entity::new("Note");
        assert!(!Query::new("Note").filter("title", "x").matches(&entity));
        assert!(Query::new("Note").filter("title", Value::Null).matches(&entity));
    }

    #[test]
    fn string_does_not_equal_bool() {
        let query = Query::new("Note").filter("published", "true");
        let entity = Entity::new("Note").with_property("published", true);
        assert!(!query.matches(&entity));
    }
}
