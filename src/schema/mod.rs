//! Stream schemas: fixed-resource constants and dynamic table inference

pub mod inference;
pub mod types;

pub use inference::{fixed_schema, map_type_tag, table_schema, RECORD_ID_FIELD};
pub use types::{FieldType, SchemaDocument, SchemaProperty, TypeList};
