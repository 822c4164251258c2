//! API field descriptors.
//!
//! A field describes how one entity property appears in the API: its
//! semantic type, whether it may be null or blank, its default, and how its
//! value is found on the entity. Scalar fields are [`ApiField`]s; relations
//! are [`ToOneKeyField`] and [`ToManyKeyField`].

use std::fmt;
use std::sync::Arc;

use base64::Engine;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use docrest_datastore::{Key, PropertyType, Value};
use serde_json::Value as JsonValue;

use crate::json::{json_to_property, property_to_json};
use crate::related::{ToManyKeyField, ToOneKeyField};
use crate::{Bundle, Error};

/// Semantic type of a scalar API field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Char,
    Integer,
    Float,
    Boolean,
    DateTime,
    Date,
    Time,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Char => "char",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
            FieldType::DateTime => "datetime",
            FieldType::Date => "date",
            FieldType::Time => "time",
        };
        write!(f, "{}", name)
    }
}

/// When a timestamp is generated for an auto-timestamp field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoTimestamp {
    /// On every save.
    OnSave,
    /// On the first save only.
    OnCreate,
}

/// Default of a field when no value is available.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldDefault {
    /// A static API value.
    Value(JsonValue),
    /// Generated by the datastore schema at save time; there is no static value.
    Auto(AutoTimestamp),
}

/// Options shared by every field kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldOptions {
    pub null: bool,
    pub blank: bool,
    pub readonly: bool,
    pub unique: bool,
    /// Related data is embedded instead of linked by URI.
    pub full: bool,
    pub default: Option<FieldDefault>,
    pub help_text: Option<String>,
}

macro_rules! option_builders {
    () => {
        #[must_use]
        pub fn null(mut self) -> Self {
            self.options.null = true;
            self
        }

        #[must_use]
        pub fn blank(mut self) -> Self {
            self.options.blank = true;
            self
        }

        #[must_use]
        pub fn readonly(mut self) -> Self {
            self.options.readonly = true;
            self
        }

        #[must_use]
        pub fn unique(mut self) -> Self {
            self.options.unique = true;
            self
        }

        #[must_use]
        pub fn full(mut self) -> Self {
            self.options.full = true;
            self
        }

        #[must_use]
        pub fn default(mut self, value: impl Into<serde_json::Value>) -> Self {
            self.options.default = Some($crate::fields::FieldDefault::Value(value.into()));
            self
        }

        #[must_use]
        pub fn auto_timestamp(mut self, policy: $crate::fields::AutoTimestamp) -> Self {
            self.options.default = Some($crate::fields::FieldDefault::Auto(policy));
            self
        }

        #[must_use]
        pub fn help_text(mut self, text: impl Into<String>) -> Self {
            self.options.help_text = Some(text.into());
            self
        }

        pub fn options(&self) -> &$crate::fields::FieldOptions {
            &self.options
        }
    };
}

pub(crate) use option_builders;

/// Computes an attribute from a bundle.
pub type Resolver<T> = Arc<dyn Fn(&Bundle) -> Result<Option<T>, Error> + Send + Sync>;

/// Where a field finds its value on the bundle.
///
/// `Named` reads an entity property. `Computed` runs a resolver over the
/// whole bundle, which is how reverse relations and derived values are
/// expressed. `T` is what the attribute resolves to: a property [`Value`]
/// for scalar fields, a [`Key`] for to-one relations and a
/// [`RelatedCollection`](crate::RelatedCollection) for to-many relations.
pub enum Attribute<T = Value> {
    Named(String),
    Computed(Resolver<T>),
}

impl<T> Attribute<T> {
    pub fn named(name: impl Into<String>) -> Self {
        Attribute::Named(name.into())
    }

    pub fn computed<F>(resolver: F) -> Self
    where
        F: Fn(&Bundle) -> Result<Option<T>, Error> + Send + Sync + 'static,
    {
        Attribute::Computed(Arc::new(resolver))
    }

    /// The property name, for named attributes.
    pub fn name(&self) -> Option<&str> {
        match self {
            Attribute::Named(name) => Some(name),
            Attribute::Computed(_) => None,
        }
    }
}

impl<T: FromProperty> Attribute<T> {
    /// Resolve the attribute against `bundle`.
    ///
    /// A named property that is absent or null resolves to `None`.
    pub fn resolve(&self, bundle: &Bundle) -> Result<Option<T>, Error> {
        match self {
            Attribute::Named(name) => match bundle.obj.get(name) {
                Some(value) => T::from_property(name, value),
                None => Ok(None),
            },
            Attribute::Computed(resolver) => resolver(bundle),
        }
    }
}

impl<T> Clone for Attribute<T> {
    fn clone(&self) -> Self {
        match self {
            Attribute::Named(name) => Attribute::Named(name.clone()),
            Attribute::Computed(resolver) => Attribute::Computed(Arc::clone(resolver)),
        }
    }
}

impl<T> fmt::Debug for Attribute<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Attribute::Computed(_) => f.debug_tuple("Computed").field(&"<resolver>").finish(),
        }
    }
}

impl<T> fmt::Display for Attribute<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::Named(name) => write!(f, "{}", name),
            Attribute::Computed(_) => write!(f, "<computed>"),
        }
    }
}

/// Types a named attribute can be read as.
pub trait FromProperty: Sized {
    /// Interpret the stored value of property `name`. `Ok(None)` means absent.
    fn from_property(name: &str, value: &Value) -> Result<Option<Self>, Error>;
}

impl FromProperty for Value {
    fn from_property(_name: &str, value: &Value) -> Result<Option<Self>, Error> {
        Ok((!value.is_null()).then(|| value.clone()))
    }
}

impl FromProperty for Key {
    fn from_property(name: &str, value: &Value) -> Result<Option<Self>, Error> {
        match value {
            Value::Null => Ok(None),
            Value::Key(key) => Ok(Some(key.clone())),
            other => Err(Error::api_field(format!(
                "The attribute '{}' holds a {} value, not a key.",
                name,
                other.type_name()
            ))),
        }
    }
}

/// A scalar API field.
///
/// ```rust
/// use docrest_resource::{ApiField, FieldType};
///
/// let field = ApiField::char("title").null().default("");
/// assert_eq!(field.ty(), FieldType::Char);
/// assert!(field.options().null);
/// ```
#[derive(Debug, Clone)]
pub struct ApiField {
    name: String,
    attribute: Option<Attribute>,
    ty: FieldType,
    storage: Option<PropertyType>,
    repeated: bool,
    options: FieldOptions,
}

impl ApiField {
    /// A field reading the entity property of the same name.
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        let name = name.into();
        Self {
            attribute: Some(Attribute::Named(name.clone())),
            name,
            ty,
            storage: None,
            repeated: false,
            options: FieldOptions::default(),
        }
    }

    pub fn char(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Char)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Integer)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Float)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Boolean)
    }

    pub fn datetime(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::DateTime)
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Date)
    }

    pub fn time(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Time)
    }

    /// Read the value from `attribute` instead of the same-named property.
    #[must_use]
    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attribute = Some(attribute);
        self
    }

    /// Record the property type values are stored as.
    ///
    /// Inbound values are converted to this type, so a key property receives
    /// a key rather than its URL-safe string.
    #[must_use]
    pub fn stored_as(mut self, ty: PropertyType) -> Self {
        self.storage = Some(ty);
        self
    }

    /// Values are lists; conversions apply per item.
    #[must_use]
    pub fn repeated(mut self) -> Self {
        self.repeated = true;
        self
    }

    option_builders!();

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> FieldType {
        self.ty
    }

    pub fn attribute(&self) -> Option<&Attribute> {
        self.attribute.as_ref()
    }

    /// Property written by hydration, if the attribute is a named one.
    pub fn attribute_name(&self) -> Option<&str> {
        self.attribute.as_ref().and_then(Attribute::name)
    }

    pub fn storage(&self) -> Option<&PropertyType> {
        self.storage.as_ref()
    }

    pub fn is_repeated(&self) -> bool {
        self.repeated
    }

    /// Produce the property value for this field from inbound data.
    ///
    /// `Ok(None)` leaves the property untouched; `Ok(Some(Value::Null))`
    /// stores an explicit null.
    pub fn hydrate(&self, bundle: &Bundle) -> Result<Option<Value>, Error> {
        if self.options.readonly {
            return Ok(None);
        }

        match bundle.data.get(&self.name) {
            Some(JsonValue::Null) => Ok(self.options.null.then_some(Value::Null)),
            Some(json) => self.to_property(json).map(Some),
            None => {
                let existing = self
                    .attribute_name()
                    .and_then(|attribute| bundle.obj.get(attribute))
                    .filter(|value| !value.is_null());
                if let Some(existing) = existing {
                    return Ok(Some(existing.clone()));
                }
                if let Some(default) = self.usable_default() {
                    return self.to_property(default).map(Some);
                }
                if matches!(self.options.default, Some(FieldDefault::Auto(_))) {
                    return Ok(None);
                }
                if self.options.null {
                    return Ok(Some(Value::Null));
                }
                Err(Error::api_field(format!(
                    "The '{}' field has no data and doesn't allow a default or null value.",
                    self.name
                )))
            }
        }
    }

    /// Produce the API value of this field for `bundle`.
    pub fn dehydrate(&self, bundle: &Bundle) -> Result<JsonValue, Error> {
        let value = match &self.attribute {
            Some(attribute) => attribute.resolve(bundle)?,
            None => None,
        };

        if let Some(value) = value {
            return self.convert(&value);
        }
        if let Some(default) = self.usable_default() {
            return self.convert(&self.to_property(default)?);
        }
        match &self.attribute {
            Some(attribute) if !self.options.null => Err(Error::api_field(format!(
                "The object '{}' has an empty attribute '{}' and doesn't allow a default or null value.",
                bundle.obj.kind(),
                attribute
            ))),
            _ => Ok(JsonValue::Null),
        }
    }

    /// Convert a stored property value to its API representation.
    pub fn convert(&self, value: &Value) -> Result<JsonValue, Error> {
        match value {
            Value::Null => Ok(JsonValue::Null),
            Value::List(items) if self.repeated => items
                .iter()
                .map(|item| self.convert_item(item))
                .collect::<Result<Vec<_>, _>>()
                .map(JsonValue::Array),
            other => self.convert_item(other),
        }
    }

    /// Convert an inbound API value to the property value to store.
    pub fn to_property(&self, json: &JsonValue) -> Result<Value, Error> {
        if !self.repeated {
            return self.item_to_property(json);
        }
        match json {
            JsonValue::Null => Ok(Value::Null),
            JsonValue::Array(items) => items
                .iter()
                .map(|item| self.item_to_property(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            other => Err(self.invalid(other, "expected a list")),
        }
    }

    fn stores_text(&self) -> bool {
        self.ty == FieldType::Char
            && !self.repeated
            && self
                .storage
                .as_ref()
                .map_or(true, |ty| ty.is_text() || matches!(ty, PropertyType::Other(_)))
    }

    /// The static default, unless it is an empty string on a non-text field.
    fn usable_default(&self) -> Option<&JsonValue> {
        match &self.options.default {
            Some(FieldDefault::Value(JsonValue::String(s))) if s.is_empty() && !self.stores_text() => {
                None
            }
            Some(FieldDefault::Value(value)) => Some(value),
            _ => None,
        }
    }

    fn invalid(&self, json: &JsonValue, detail: &str) -> Error {
        Error::api_field(format!(
            "The '{}' {} field was given '{}': {}.",
            self.name, self.ty, json, detail
        ))
    }

    fn unconvertible(&self, value: &Value) -> Error {
        Error::api_field(format!(
            "The '{}' {} field can not show a {} value.",
            self.name,
            self.ty,
            value.type_name()
        ))
    }

    fn item_to_property(&self, json: &JsonValue) -> Result<Value, Error> {
        if json.is_null() {
            return Ok(Value::Null);
        }

        match &self.storage {
            Some(PropertyType::Key { .. }) => {
                let encoded = json
                    .as_str()
                    .ok_or_else(|| self.invalid(json, "expected a URL-safe key"))?;
                return Key::from_urlsafe(encoded)
                    .map(Value::Key)
                    .map_err(|e| self.invalid(json, &e.to_string()));
            }
            Some(PropertyType::Blob) => {
                let encoded = json
                    .as_str()
                    .ok_or_else(|| self.invalid(json, "expected base64 data"))?;
                return base64::engine::general_purpose::STANDARD
                    .decode(encoded)
                    .map(Value::Bytes)
                    .map_err(|e| self.invalid(json, &e.to_string()));
            }
            _ => {}
        }

        match self.ty {
            FieldType::Char => Ok(match json {
                JsonValue::String(s) => Value::String(s.clone()),
                JsonValue::Number(_) | JsonValue::Bool(_) if self.stores_text() => {
                    Value::String(json.to_string())
                }
                other => json_to_property(other),
            }),
            FieldType::Integer => parse_integer(json)
                .map(Value::Integer)
                .ok_or_else(|| self.invalid(json, "expected an integer")),
            FieldType::Float => parse_float(json)
                .map(Value::Float)
                .ok_or_else(|| self.invalid(json, "expected a number")),
            FieldType::Boolean => parse_bool(json)
                .map(Value::Bool)
                .ok_or_else(|| self.invalid(json, "expected a boolean")),
            FieldType::DateTime => {
                let dt = json
                    .as_str()
                    .and_then(parse_datetime)
                    .ok_or_else(|| self.invalid(json, "expected an ISO 8601 datetime"))?;
                Ok(match self.storage {
                    Some(PropertyType::Date) => Value::Date(dt.date_naive()),
                    Some(PropertyType::Time) => Value::Time(dt.time()),
                    _ => Value::DateTime(dt),
                })
            }
            FieldType::Date => json
                .as_str()
                .and_then(parse_date)
                .map(Value::Date)
                .ok_or_else(|| self.invalid(json, "expected an ISO 8601 date")),
            FieldType::Time => json
                .as_str()
                .and_then(parse_time)
                .map(Value::Time)
                .ok_or_else(|| self.invalid(json, "expected an ISO 8601 time")),
        }
    }

    fn convert_item(&self, value: &Value) -> Result<JsonValue, Error> {
        match self.ty {
            FieldType::Char => Ok(match value {
                Value::Bool(_) | Value::Integer(_) | Value::Float(_) => {
                    JsonValue::String(value.to_string())
                }
                other => property_to_json(other),
            }),
            FieldType::Integer => match value {
                Value::Integer(i) => Ok(JsonValue::from(*i)),
                Value::Float(f) => Ok(JsonValue::from(*f as i64)),
                Value::Bool(b) => Ok(JsonValue::from(i64::from(*b))),
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(JsonValue::from)
                    .map_err(|_| self.unconvertible(value)),
                _ => Err(self.unconvertible(value)),
            },
            FieldType::Float => match value {
                Value::Integer(i) => Ok(property_to_json(&Value::Float(*i as f64))),
                Value::Float(_) => Ok(property_to_json(value)),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(|f| property_to_json(&Value::Float(f)))
                    .map_err(|_| self.unconvertible(value)),
                _ => Err(self.unconvertible(value)),
            },
            FieldType::Boolean => Ok(JsonValue::Bool(match value {
                Value::Bool(b) => *b,
                Value::Integer(i) => *i != 0,
                Value::Float(f) => *f != 0.0,
                Value::String(s) => !s.is_empty(),
                Value::Bytes(b) => !b.is_empty(),
                Value::List(items) => !items.is_empty(),
                Value::Map(map) => !map.is_empty(),
                Value::Null => false,
                _ => true,
            })),
            FieldType::DateTime => match value {
                Value::DateTime(_) | Value::Date(_) => Ok(property_to_json(value)),
                Value::String(s) => parse_datetime(s)
                    .map(|dt| JsonValue::String(dt.to_rfc3339()))
                    .ok_or_else(|| self.unconvertible(value)),
                _ => Err(self.unconvertible(value)),
            },
            FieldType::Date => match value {
                Value::Date(_) => Ok(property_to_json(value)),
                Value::DateTime(dt) => Ok(property_to_json(&Value::Date(dt.date_naive()))),
                Value::String(s) => parse_date(s)
                    .map(|d| property_to_json(&Value::Date(d)))
                    .ok_or_else(|| self.unconvertible(value)),
                _ => Err(self.unconvertible(value)),
            },
            FieldType::Time => match value {
                Value::Time(_) => Ok(property_to_json(value)),
                Value::DateTime(dt) => Ok(property_to_json(&Value::Time(dt.time()))),
                Value::String(s) => parse_time(s)
                    .map(|t| property_to_json(&Value::Time(t)))
                    .ok_or_else(|| self.unconvertible(value)),
                _ => Err(self.unconvertible(value)),
            },
        }
    }
}

fn parse_integer(json: &JsonValue) -> Option<i64> {
    match json {
        JsonValue::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_float(json: &JsonValue) -> Option<f64> {
    match json {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_bool(json: &JsonValue) -> Option<bool> {
    match json {
        JsonValue::Bool(b) => Some(*b),
        JsonValue::Number(n) => n.as_i64().map(|i| i != 0),
        JsonValue::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

/// Parse an ISO 8601 datetime. Naive values are taken as UTC and a bare
/// date means midnight.
pub(crate) fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
}

pub(crate) fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .ok()
        .or_else(|| parse_datetime(s).map(|dt| dt.date_naive()))
}

pub(crate) fn parse_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    ["%H:%M:%S%.f", "%H:%M:%S", "%H:%M"]
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(s, format).ok())
        .or_else(|| parse_datetime(s).map(|dt| dt.time()))
}

/// Any field a resource can carry.
#[derive(Debug, Clone)]
pub enum Field {
    Api(ApiField),
    ToOne(ToOneKeyField),
    ToMany(ToManyKeyField),
}

impl Field {
    pub fn name(&self) -> &str {
        match self {
            Field::Api(field) => field.name(),
            Field::ToOne(field) => field.name(),
            Field::ToMany(field) => field.name(),
        }
    }

    pub fn options(&self) -> &FieldOptions {
        match self {
            Field::Api(field) => field.options(),
            Field::ToOne(field) => field.options(),
            Field::ToMany(field) => field.options(),
        }
    }

    pub fn is_related(&self) -> bool {
        !matches!(self, Field::Api(_))
    }

    pub fn as_api(&self) -> Option<&ApiField> {
        match self {
            Field::Api(field) => Some(field),
            _ => None,
        }
    }
}

impl From<ApiField> for Field {
    fn from(field: ApiField) -> Self {
        Field::Api(field)
    }
}

impl From<ToOneKeyField> for Field {
    fn from(field: ToOneKeyField) -> Self {
        Field::ToOne(field)
    }
}

impl From<ToManyKeyField> for Field {
    fn from(field: ToManyKeyField) -> Self {
        Field::ToMany(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Request;
    use chrono::TimeZone;
    use docrest_datastore::Entity;
    use serde_json::json;

    fn bundle(obj: Entity, data: JsonValue) -> Bundle {
        Bundle::new(obj, Arc::new(Request::default()))
            .with_data(Bundle::data_from_json(data).unwrap())
    }

    #[test]
    fn hydrate_converts_by_type() {
        let b = bundle(
            Entity::new("Note"),
            json!({"views": "12", "score": 1.5, "ok": "TRUE", "when": "2024-03-01T10:00:00Z"}),
        );
        assert_eq!(
            ApiField::integer("views").hydrate(&b).unwrap(),
            Some(Value::Integer(12))
        );
        assert_eq!(
            ApiField::float("score").hydrate(&b).unwrap(),
            Some(Value::Float(1.5))
        );
        assert_eq!(
            ApiField::boolean("ok").hydrate(&b).unwrap(),
            Some(Value::Bool(true))
        );
        assert_eq!(
            ApiField::datetime("when").hydrate(&b).unwrap(),
            Some(Value::DateTime(Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()))
        );
    }

    #[test]
    fn hydrate_rejects_unconvertible_values() {
        let b = bundle(Entity::new("Note"), json!({"views": "lots"}));
        assert!(matches!(
            ApiField::integer("views").hydrate(&b),
            Err(Error::ApiField { .. })
        ));
    }

    #[test]
    fn hydrate_missing_prefers_existing_then_default_then_null() {
        let empty = bundle(Entity::new("Note").with_property("title", "kept"), json!({}));
        assert_eq!(
            ApiField::char("title").hydrate(&empty).unwrap(),
            Some(Value::from("kept"))
        );

        let empty = bundle(Entity::new("Note"), json!({}));
        assert_eq!(
            ApiField::char("title").default("untitled").hydrate(&empty).unwrap(),
            Some(Value::from("untitled"))
        );
        assert_eq!(
            ApiField::char("title").null().hydrate(&empty).unwrap(),
            Some(Value::Null)
        );
        assert!(matches!(
            ApiField::char("title").hydrate(&empty),
            Err(Error::ApiField { .. })
        ));
    }

    #[test]
    fn empty_string_default_only_applies_to_text() {
        let empty = bundle(Entity::new("Note"), json!({}));
        let views = ApiField::integer("views").null().blank().default("");
        assert_eq!(views.hydrate(&empty).unwrap(), Some(Value::Null));
        assert_eq!(views.dehydrate(&empty).unwrap(), JsonValue::Null);

        let title = ApiField::char("title").null().blank().default("");
        assert_eq!(title.hydrate(&empty).unwrap(), Some(Value::from("")));
        assert_eq!(title.dehydrate(&empty).unwrap(), json!(""));
    }

    #[test]
    fn auto_timestamp_leaves_property_unset() {
        let empty = bundle(Entity::new("Note"), json!({}));
        let field = ApiField::datetime("updated").auto_timestamp(AutoTimestamp::OnSave);
        assert_eq!(field.hydrate(&empty).unwrap(), None);
    }

    #[test]
    fn readonly_never_hydrates() {
        let b = bundle(Entity::new("Note"), json!({"title": "x"}));
        assert_eq!(ApiField::char("title").readonly().hydrate(&b).unwrap(), None);
    }

    #[test]
    fn key_storage_parses_urlsafe() {
        let key = Key::with_id("Author", 3);
        let b = bundle(Entity::new("Note"), json!({"author": key.urlsafe()}));
        let field = ApiField::char("author")
            .stored_as(PropertyType::Key { kind: None })
            .full();
        assert_eq!(field.hydrate(&b).unwrap(), Some(Value::Key(key.clone())));

        let stored = bundle(Entity::new("Note").with_property("author", key.clone()), json!({}));
        assert_eq!(field.dehydrate(&stored).unwrap(), json!(key.urlsafe()));
    }

    #[test]
    fn datetime_field_over_date_property() {
        let b = bundle(Entity::new("Note"), json!({"on": "2024-05-06"}));
        let field = ApiField::datetime("on").stored_as(PropertyType::Date);
        assert_eq!(
            field.hydrate(&b).unwrap(),
            Some(Value::Date(NaiveDate::from_ymd_opt(2024, 5, 6).unwrap()))
        );
    }

    #[test]
    fn repeated_fields_convert_items() {
        let b = bundle(Entity::new("Note"), json!({"scores": [1, "2"]}));
        let field = ApiField::integer("scores").repeated();
        assert_eq!(
            field.hydrate(&b).unwrap(),
            Some(Value::from(vec![1i64, 2]))
        );

        let stored = bundle(
            Entity::new("Note").with_property("scores", vec![3i64, 4]),
            json!({}),
        );
        assert_eq!(field.dehydrate(&stored).unwrap(), json!([3, 4]));
    }

    #[test]
    fn dehydrate_converts_by_type() {
        let obj = Entity::new("Note")
            .with_property("views", 7)
            .with_property("flag", 0)
            .with_property("at", NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        let b = bundle(obj, json!({}));

        assert_eq!(ApiField::char("views").dehydrate(&b).unwrap(), json!("7"));
        assert_eq!(ApiField::float("views").dehydrate(&b).unwrap(), json!(7.0));
        assert_eq!(ApiField::boolean("flag").dehydrate(&b).unwrap(), json!(false));
        assert_eq!(ApiField::time("at").dehydrate(&b).unwrap(), json!("09:30:00"));
    }

    #[test]
    fn dehydrate_missing_value_rules() {
        let b = bundle(Entity::new("Note"), json!({}));
        assert_eq!(ApiField::char("title").null().dehydrate(&b).unwrap(), JsonValue::Null);
        assert_eq!(
            ApiField::boolean("published").default(false).dehydrate(&b).unwrap(),
            json!(false)
        );
        assert!(matches!(
            ApiField::char("title").dehydrate(&b),
            Err(Error::ApiField { .. })
        ));
    }

    #[test]
    fn computed_attribute_is_resolved() {
        let field = ApiField::integer("title_length").with_attribute(Attribute::computed(|b: &Bundle| {
            Ok(b.obj
                .get("title")
                .and_then(Value::as_str)
                .map(|s| Value::Integer(s.len() as i64)))
        }));
        let b = bundle(Entity::new("Note").with_property("title", "four"), json!({}));
        assert_eq!(field.dehydrate(&b).unwrap(), json!(4));
        assert_eq!(field.attribute_name(), None);
    }

    #[test]
    fn key_attribute_rejects_other_values() {
        let attribute: Attribute<Key> = Attribute::named("author");
        let b = bundle(Entity::new("Note").with_property("author", "nope"), json!({}));
        assert!(attribute.resolve(&b).is_err());

        let b = bundle(Entity::new("Note"), json!({}));
        assert_eq!(attribute.resolve(&b).unwrap(), None);
    }

    #[test]
    fn parse_helpers() {
        assert!(parse_datetime("2024-01-02T03:04:05.123+02:00").is_some());
        assert!(parse_datetime("2024-01-02 03:04:05").is_some());
        assert!(parse_datetime("yesterday").is_none());
        assert_eq!(
            parse_time("07:15"),
            Some(NaiveTime::from_hms_opt(7, 15, 0).unwrap())
        );
        assert_eq!(parse_integer(&json!(4.0)), Some(4));
        assert_eq!(parse_integer(&json!(4.5)), None);
        assert_eq!(parse_bool(&json!("nope")), None);
    }
}
