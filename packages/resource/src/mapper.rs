//! Derive API fields from a datastore schema.

use std::collections::{BTreeMap, BTreeSet};

use docrest_datastore::{PropertyDef, PropertyType, Schema};
use serde_json::Value as JsonValue;

use crate::fields::{ApiField, AutoTimestamp, Field, FieldType};
use crate::json::property_to_json;

/// The API field type used for a property type. Unknown types are char.
pub fn api_field_type(ty: &PropertyType) -> FieldType {
    match ty {
        PropertyType::Date | PropertyType::DateTime => FieldType::DateTime,
        PropertyType::Boolean => FieldType::Boolean,
        PropertyType::Float => FieldType::Float,
        PropertyType::Integer => FieldType::Integer,
        PropertyType::Time => FieldType::Time,
        _ => FieldType::Char,
    }
}

/// Build one field per schema property that is not declared, is included
/// (when `include` is non-empty) and is not excluded.
pub fn derive_fields(
    schema: &Schema,
    declared: &BTreeSet<String>,
    include: &[String],
    exclude: &[String],
) -> BTreeMap<String, Field> {
    let mut fields = BTreeMap::new();

    for def in schema.properties() {
        if declared.contains(&def.name) {
            continue;
        }
        if !include.is_empty() && !include.contains(&def.name) {
            continue;
        }
        if exclude.contains(&def.name) {
            continue;
        }

        log::trace!("Deriving field {} from {}", def.name, def.ty);
        fields.insert(def.name.clone(), Field::Api(field_for_property(def)));
    }

    fields
}

fn field_for_property(def: &PropertyDef) -> ApiField {
    let mut field = ApiField::new(def.name.clone(), api_field_type(&def.ty)).stored_as(def.ty.clone());
    if def.repeated {
        field = field.repeated();
    }

    let empty_default = || {
        if def.repeated {
            JsonValue::Array(Vec::new())
        } else {
            JsonValue::String(String::new())
        }
    };

    if !def.required {
        field = field.null().blank().default(empty_default());
    }
    if def.ty.is_text() {
        field = field.default(empty_default());
    }
    if def.ty.is_key() {
        field = field.full();
    }
    if let Some(default) = &def.default {
        field = field.default(property_to_json(default));
    }
    if def.auto_now {
        field = field.auto_timestamp(AutoTimestamp::OnSave);
    } else if def.auto_now_add {
        field = field.auto_timestamp(AutoTimestamp::OnCreate);
    }

    field
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldDefault;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::new("Note")
            .property(PropertyDef::string("title").required())
            .property(PropertyDef::text("body"))
            .property(PropertyDef::integer("views").default(0))
            .property(PropertyDef::boolean("published").required())
            .property(PropertyDef::date("day"))
            .property(PropertyDef::key_to("author", "Author"))
            .property(PropertyDef::datetime("created").auto_now_add())
            .property(PropertyDef::datetime("updated").auto_now())
            .property(PropertyDef::string("tags").repeated())
            .property(PropertyDef::new("geo", PropertyType::Other("GeoPtProperty".into())))
    }

    fn api(fields: &BTreeMap<String, Field>, name: &str) -> ApiField {
        fields[name].as_api().cloned().unwrap()
    }

    #[test]
    fn type_lookup() {
        assert_eq!(api_field_type(&PropertyType::Date), FieldType::DateTime);
        assert_eq!(api_field_type(&PropertyType::Time), FieldType::Time);
        assert_eq!(api_field_type(&PropertyType::Blob), FieldType::Char);
        assert_eq!(
            api_field_type(&PropertyType::Other("GeoPtProperty".into())),
            FieldType::Char
        );
    }

    #[test]
    fn required_text_defaults_to_empty_string() {
        let fields = derive_fields(&schema(), &BTreeSet::new(), &[], &[]);
        let title = api(&fields, "title");
        assert!(!title.options().null);
        assert!(!title.options().blank);
        assert_eq!(title.options().default, Some(FieldDefault::Value(json!(""))));
    }

    #[test]
    fn optional_properties_are_nullable() {
        let fields = derive_fields(&schema(), &BTreeSet::new(), &[], &[]);
        let day = api(&fields, "day");
        assert_eq!(day.ty(), FieldType::DateTime);
        assert!(day.options().null && day.options().blank);
        assert_eq!(day.options().default, Some(FieldDefault::Value(json!(""))));

        let published = api(&fields, "published");
        assert!(!published.options().null);
        assert_eq!(published.options().default, None);
    }

    #[test]
    fn static_and_auto_defaults() {
        let fields = derive_fields(&schema(), &BTreeSet::new(), &[], &[]);
        assert_eq!(
            api(&fields, "views").options().default,
            Some(FieldDefault::Value(json!(0)))
        );
        assert_eq!(
            api(&fields, "created").options().default,
            Some(FieldDefault::Auto(AutoTimestamp::OnCreate))
        );
        assert_eq!(
            api(&fields, "updated").options().default,
            Some(FieldDefault::Auto(AutoTimestamp::OnSave))
        );
    }

    #[test]
    fn keys_are_full_and_repeated_default_to_list() {
        let fields = derive_fields(&schema(), &BTreeSet::new(), &[], &[]);
        assert!(api(&fields, "author").options().full);

        let tags = api(&fields, "tags");
        assert!(tags.is_repeated());
        assert_eq!(tags.options().default, Some(FieldDefault::Value(json!([]))));

        assert_eq!(api(&fields, "geo").ty(), FieldType::Char);
    }

    #[test]
    fn declared_include_and_exclude() {
        let declared: BTreeSet<String> = ["author".to_string()].into();
        let fields = derive_fields(&schema(), &declared, &[], &["body".to_string()]);
        assert!(!fields.contains_key("author"));
        assert!(!fields.contains_key("body"));
        assert!(fields.contains_key("title"));

        let only = derive_fields(
            &schema(),
            &BTreeSet::new(),
            &["title".to_string(), "views".to_string()],
            &["views".to_string()],
        );
        assert_eq!(only.keys().collect::<Vec<_>>(), vec!["title"]);
    }
}
