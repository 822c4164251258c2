//! Statically declared entity schemas.
//!
//! A [`Schema`] lists the properties of one entity kind with their types
//! and options. Schemas are plain data handed to the resource layer at
//! registration time, so nothing is discovered by inspecting live objects.
//!
//! ```rust
//! use docrest_datastore::{PropertyDef, Schema};
//!
//! let schema = Schema::new("Note")
//!     .property(PropertyDef::string("title").required())
//!     .property(PropertyDef::boolean("published").default(false))
//!     .property(PropertyDef::datetime("updated").auto_now());
//!
//! assert!(schema.has_property("title"));
//! ```

use std::fmt;

use chrono::{DateTime, Utc};

use crate::{Entity, Error, Value};

/// The declared type of a property.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PropertyType {
    String,
    /// Long, unindexed text.
    Text,
    Integer,
    Float,
    Boolean,
    Date,
    DateTime,
    Time,
    /// Reference to another entity, optionally restricted to one kind.
    Key { kind: Option<String> },
    Blob,
    /// Any type this layer has no special handling for.
    Other(String),
}

impl PropertyType {
    /// Whether the type holds textual data.
    pub fn is_text(&self) -> bool {
        matches!(self, PropertyType::String | PropertyType::Text)
    }

    pub fn is_key(&self) -> bool {
        matches!(self, PropertyType::Key { .. })
    }

    fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (PropertyType::Other(_), _) => true,
            (PropertyType::String | PropertyType::Text, Value::String(_)) => true,
            (PropertyType::Integer, Value::Integer(_)) => true,
            (PropertyType::Float, Value::Float(_) | Value::Integer(_)) => true,
            (PropertyType::Boolean, Value::Bool(_)) => true,
            (PropertyType::Date, Value::Date(_)) => true,
            (PropertyType::DateTime, Value::DateTime(_)) => true,
            (PropertyType::Time, Value::Time(_)) => true,
            (PropertyType::Key { kind: None }, Value::Key(_)) => true,
            (PropertyType::Key { kind: Some(kind) }, Value::Key(key)) => key.kind() == kind,
            (PropertyType::Blob, Value::Bytes(_)) => true,
            _ => false,
        }
    }

    /// The timestamp an auto-now property of this type receives at `now`.
    fn timestamp(&self, now: DateTime<Utc>) -> Value {
        match self {
            PropertyType::Date => Value::Date(now.date_naive()),
            PropertyType::Time => Value::Time(now.time()),
            _ => Value::DateTime(now),
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyType::String => write!(f, "StringProperty"),
            PropertyType::Text => write!(f, "TextProperty"),
            PropertyType::Integer => write!(f, "IntegerProperty"),
            PropertyType::Float => write!(f, "FloatProperty"),
            PropertyType::Boolean => write!(f, "BooleanProperty"),
            PropertyType::Date => write!(f, "DateProperty"),
            PropertyType::DateTime => write!(f, "DateTimeProperty"),
            PropertyType::Time => write!(f, "TimeProperty"),
            PropertyType::Key { kind: None } => write!(f, "KeyProperty"),
            PropertyType::Key { kind: Some(kind) } => write!(f, "KeyProperty({})", kind),
            PropertyType::Blob => write!(f, "BlobProperty"),
            PropertyType::Other(name) => write!(f, "{}", name),
        }
    }
}

/// Declaration of one property on an entity kind.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyDef {
    pub name: String,
    pub ty: PropertyType,
    pub required: bool,
    /// Value stored when the property is absent at save time.
    pub default: Option<Value>,
    /// Stamp the current time on every save.
    pub auto_now: bool,
    /// Stamp the current time on the first save only.
    pub auto_now_add: bool,
    /// The property holds a list of values.
    pub repeated: bool,
}

impl PropertyDef {
    pub fn new(name: impl Into<String>, ty: PropertyType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: false,
            default: None,
            auto_now: false,
            auto_now_add: false,
            repeated: false,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, PropertyType::String)
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, PropertyType::Text)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, PropertyType::Integer)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, PropertyType::Float)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, PropertyType::Boolean)
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, PropertyType::Date)
    }

    pub fn datetime(name: impl Into<String>) -> Self {
        Self::new(name, PropertyType::DateTime)
    }

    pub fn time(name: impl Into<String>) -> Self {
        Self::new(name, PropertyType::Time)
    }

    /// A key property that may reference any kind.
    pub fn key(name: impl Into<String>) -> Self {
        Self::new(name, PropertyType::Key { kind: None })
    }

    /// A key property restricted to `kind`.
    pub fn key_to(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self::new(
            name,
            PropertyType::Key {
                kind: Some(kind.into()),
            },
        )
    }

    pub fn blob(name: impl Into<String>) -> Self {
        Self::new(name, PropertyType::Blob)
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    #[must_use]
    pub fn auto_now(mut self) -> Self {
        self.auto_now = true;
        self
    }

    #[must_use]
    pub fn auto_now_add(mut self) -> Self {
        self.auto_now_add = true;
        self
    }

    #[must_use]
    pub fn repeated(mut self) -> Self {
        self.repeated = true;
        self
    }

    fn check(&self, value: &Value) -> Result<(), Error> {
        match value {
            Value::List(items) if self.repeated => {
                for item in items {
                    if !self.ty.accepts(item) {
                        return Err(Error::bad_value(
                            &self.name,
                            format!("expected {} items, got {}", self.ty, item.type_name()),
                        ));
                    }
                }
                Ok(())
            }
            _ if self.repeated => Err(Error::bad_value(
                &self.name,
                format!("repeated property expects a list, got {}", value.type_name()),
            )),
            _ if self.ty.accepts(value) => Ok(()),
            _ => Err(Error::bad_value(
                &self.name,
                format!("expected {}, got {}", self.ty, value.type_name()),
            )),
        }
    }
}

/// The property declarations of one entity kind.
#[derive(Clone, Debug, PartialEq)]
pub struct Schema {
    kind: String,
    properties: Vec<PropertyDef>,
}

impl Schema {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            properties: Vec::new(),
        }
    }

    /// Add a property declaration, replacing any earlier one with the same name.
    #[must_use]
    pub fn property(mut self, def: PropertyDef) -> Self {
        match self.properties.iter_mut().find(|p| p.name == def.name) {
            Some(existing) => *existing = def,
            None => self.properties.push(def),
        }
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Property declarations in declaration order.
    pub fn properties(&self) -> &[PropertyDef] {
        &self.properties
    }

    pub fn get(&self, name: &str) -> Option<&PropertyDef> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Resolve save-time behavior and validate `entity` before a put.
    ///
    /// Auto-now properties receive `now` on every call, auto-now-add
    /// properties only while they are still empty, and absent properties
    /// take their static default. Integers stored in float properties are
    /// widened.
    ///
    /// # Errors
    ///
    /// [`Error::KindMismatch`] for an entity of another kind, and
    /// [`Error::BadValue`] for a missing required property or a value whose
    /// type does not match its declaration.
    pub fn prepare_for_put(&self, entity: &mut Entity, now: DateTime<Utc>) -> Result<(), Error> {
        if entity.kind() != self.kind {
            return Err(Error::KindMismatch {
                expected: self.kind.clone(),
                found: entity.kind().to_string(),
            });
        }

        for def in &self.properties {
            let empty = entity.get(&def.name).map_or(true, Value::is_null);

            if def.auto_now || (def.auto_now_add && empty) {
                entity.set(def.name.clone(), def.ty.timestamp(now));
            } else if empty {
                if let Some(default) = &def.default {
                    entity.set(def.name.clone(), default.clone());
                }
            }

            if def.ty == PropertyType::Float {
                if let Some(Value::Integer(i)) = entity.get(&def.name) {
                    let widened = *i as f64;
                    entity.set(def.name.clone(), Value::Float(widened));
                }
            }

            match entity.get(&def.name) {
                None | Some(Value::Null) if def.required => {
                    return Err(Error::bad_value(&def.name, "required property is missing"));
                }
                None | Some(Value::Null) => {}
                Some(value) => def.check(value)?,
            }
        }

        Ok(())
    }
}
