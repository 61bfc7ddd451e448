//! Schema types
//!
//! Schemas are JSON Schema-shaped objects with one extension: a `selected`
//! boolean on the document and on every property, which the operator flips
//! in the serialized catalog between discovery and sync.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Output field type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
    Null,
}

/// A type or a list of types (for nullable fields)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeList {
    Single(FieldType),
    Multiple(Vec<FieldType>),
}

impl TypeList {
    /// A nullable scalar, serialized as `["null", <type>]`
    pub fn nullable(t: FieldType) -> Self {
        TypeList::Multiple(vec![FieldType::Null, t])
    }

    /// The non-null type, if any
    pub fn primary(&self) -> Option<FieldType> {
        match self {
            TypeList::Single(t) => Some(*t),
            TypeList::Multiple(types) => types.iter().copied().find(|t| *t != FieldType::Null),
        }
    }
}

/// One property of a stream schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaProperty {
    #[serde(rename = "type")]
    pub field_type: TypeList,

    /// Format hint, e.g. "date-time"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Item schema for array properties
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaProperty>>,

    /// Whether the operator selected this field for extraction
    #[serde(default)]
    pub selected: bool,
}

impl SchemaProperty {
    fn scalar(t: FieldType) -> Self {
        Self {
            field_type: TypeList::nullable(t),
            format: None,
            items: None,
            selected: false,
        }
    }

    /// Nullable string property
    pub fn string() -> Self {
        Self::scalar(FieldType::String)
    }

    /// Nullable integer property
    pub fn integer() -> Self {
        Self::scalar(FieldType::Integer)
    }

    /// Nullable number property
    pub fn number() -> Self {
        Self::scalar(FieldType::Number)
    }

    /// Nullable boolean property
    pub fn boolean() -> Self {
        Self::scalar(FieldType::Boolean)
    }

    /// Nullable string with a date-time format hint
    pub fn datetime() -> Self {
        let mut p = Self::scalar(FieldType::String);
        p.format = Some("date-time".to_string());
        p
    }

    /// Nullable array of strings
    pub fn string_array() -> Self {
        Self {
            field_type: TypeList::nullable(FieldType::Array),
            format: None,
            items: Some(Box::new(SchemaProperty::string())),
            selected: false,
        }
    }

    /// Drop the null alternative, marking the field as always present
    #[must_use]
    pub fn required(mut self) -> Self {
        if let Some(t) = self.field_type.primary() {
            self.field_type = TypeList::Single(t);
        }
        self
    }

    /// Whether the property carries a date-time format hint
    pub fn is_datetime(&self) -> bool {
        self.format.as_deref() == Some("date-time")
    }
}

/// A stream's schema: an object with ordered, selectable properties.
///
/// Property order is the order columns came back from the API; it is
/// preserved through serialization so catalogs re-serialize identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDocument {
    #[serde(rename = "type")]
    pub schema_type: FieldType,

    /// Whether the operator selected this stream for extraction
    #[serde(default)]
    pub selected: bool,

    pub properties: IndexMap<String, SchemaProperty>,
}

impl Default for SchemaDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaDocument {
    /// Create an empty object schema, unselected
    pub fn new() -> Self {
        Self {
            schema_type: FieldType::Object,
            selected: false,
            properties: IndexMap::new(),
        }
    }

    /// Append a property, keeping insertion order
    pub fn add_property(&mut self, name: &str, property: SchemaProperty) {
        self.properties.insert(name.to_string(), property);
    }

    /// Names of the selected properties, in schema order
    pub fn selected_fields(&self) -> Vec<&str> {
        self.properties
            .iter()
            .filter(|(_, p)| p.selected)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Copy of this schema restricted to the selected properties
    pub fn filtered_to_selection(&self) -> SchemaDocument {
        SchemaDocument {
            schema_type: self.schema_type,
            selected: self.selected,
            properties: self
                .properties
                .iter()
                .filter(|(_, p)| p.selected)
                .map(|(name, p)| (name.clone(), p.clone()))
                .collect(),
        }
    }

    /// Serialize to a JSON value
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
