//! Schema inference
//!
//! Fixed resources materialize constant schemas. Dynamic tables map each
//! column's API type tag through a closed lookup to an output type; tags
//! this module has never heard of degrade to string instead of failing,
//! so new column types on the API side never break discovery.

use crate::schema::types::{FieldType, SchemaDocument, SchemaProperty};
use crate::types::ResourceKind;
use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashSet;
use tracing::warn;

/// Synthetic numeric key column added to every dynamic table stream.
pub const RECORD_ID_FIELD: &str = "_record_id";

static NUMERIC_TAGS: Lazy<HashSet<&str>> =
    Lazy::new(|| "currency number".split_whitespace().collect());
static INTEGER_TAGS: Lazy<HashSet<&str>> =
    Lazy::new(|| "id integer".split_whitespace().collect());
static DATE_TAGS: Lazy<HashSet<&str>> =
    Lazy::new(|| "date datetime due_date".split_whitespace().collect());
static STRING_TAGS: Lazy<HashSet<&str>> = Lazy::new(|| {
    "assignee_select attachment checklist_horizontal checklist_vertical \
     cnpj connector cpf email label_select long_text phone \
     radio_horizontal radio_vertical select short_text statement time"
        .split_whitespace()
        .collect()
});

/// Map one API column type tag to an output type.
///
/// Total: an unknown tag maps to string so extraction keeps working when
/// the API grows a new column type.
pub fn map_type_tag(tag: &str) -> FieldType {
    if NUMERIC_TAGS.contains(tag) {
        FieldType::Number
    } else if INTEGER_TAGS.contains(tag) {
        FieldType::Integer
    } else if DATE_TAGS.contains(tag) || STRING_TAGS.contains(tag) {
        FieldType::String
    } else {
        warn!("Unknown column type tag '{tag}', treating as string");
        FieldType::String
    }
}

fn is_date_tag(tag: &str) -> bool {
    DATE_TAGS.contains(tag)
}

/// Property for one dynamic table column.
fn column_property(column: &Value) -> SchemaProperty {
    let tag = column.get("type").and_then(Value::as_str).unwrap_or("");
    let is_multiple = column
        .get("is_multiple")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let required = column
        .get("required")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let mut property = if is_multiple {
        SchemaProperty::string_array()
    } else if is_date_tag(tag) {
        SchemaProperty::datetime()
    } else {
        match map_type_tag(tag) {
            FieldType::Number => SchemaProperty::number(),
            FieldType::Integer => SchemaProperty::integer(),
            _ => SchemaProperty::string(),
        }
    };
    if required {
        property = property.required();
    }
    property
}

/// Intrinsic row fields every table stream carries, regardless of how many
/// columns the table defines. Order here is schema order.
fn table_intrinsics(schema: &mut SchemaDocument) {
    schema.add_property(RECORD_ID_FIELD, SchemaProperty::integer().required());
    schema.add_property("id", SchemaProperty::string());
    schema.add_property("title", SchemaProperty::string());
    schema.add_property("url", SchemaProperty::string());
    schema.add_property("created_at", SchemaProperty::datetime());
    schema.add_property("updated_at", SchemaProperty::datetime());
    schema.add_property("due_date", SchemaProperty::datetime());
    schema.add_property("finished_at", SchemaProperty::datetime());
    schema.add_property("created_by_id", SchemaProperty::string());
    schema.add_property("table_id", SchemaProperty::string());
}

/// Infer the schema for one dynamic table from its column definitions.
///
/// Deterministic: property order is intrinsics first, then columns in the
/// order the API returned them. A column without an id cannot be named and
/// is skipped with a warning; everything else degrades, never fails.
pub fn table_schema(columns: &[Value]) -> SchemaDocument {
    let mut schema = SchemaDocument::new();
    table_intrinsics(&mut schema);

    for column in columns {
        let Some(id) = column.get("id").and_then(Value::as_str) else {
            warn!("Skipping table column without an id: {column}");
            continue;
        };
        if schema.properties.contains_key(id) {
            warn!("Duplicate table column '{id}', keeping the first definition");
            continue;
        }
        schema.add_property(id, column_property(column));
    }

    schema
}

/// Materialize the constant schema for a fixed resource.
pub fn fixed_schema(kind: ResourceKind) -> SchemaDocument {
    let mut schema = SchemaDocument::new();
    match kind {
        ResourceKind::Members => {
            schema.add_property("id", SchemaProperty::string().required());
            schema.add_property("name", SchemaProperty::string());
            schema.add_property("email", SchemaProperty::string());
            schema.add_property("username", SchemaProperty::string());
            schema.add_property("created_at", SchemaProperty::datetime());
            schema.add_property("avatarUrl", SchemaProperty::string());
            schema.add_property("timeZone", SchemaProperty::string());
            schema.add_property("locale", SchemaProperty::string());
            schema.add_property("role_name", SchemaProperty::string());
        }
        ResourceKind::Pipes => {
            schema.add_property("id", SchemaProperty::string().required());
            schema.add_property("name", SchemaProperty::string());
            schema.add_property("description", SchemaProperty::string());
            schema.add_property("icon", SchemaProperty::string());
            schema.add_property("created_at", SchemaProperty::datetime());
        }
        ResourceKind::PipePhases => {
            schema.add_property("id", SchemaProperty::string().required());
            schema.add_property("pipe_id", SchemaProperty::string());
            schema.add_property("name", SchemaProperty::string());
            schema.add_property("cards_count", SchemaProperty::integer());
        }
        ResourceKind::PhaseFields => {
            schema.add_property("id", SchemaProperty::string().required());
            schema.add_property("phase_id", SchemaProperty::string());
            schema.add_property("type", SchemaProperty::string());
            schema.add_property("required", SchemaProperty::boolean());
        }
        ResourceKind::Cards => {
            schema.add_property("id", SchemaProperty::string().required());
            schema.add_property("pipe_id", SchemaProperty::string());
            schema.add_property("title", SchemaProperty::string());
            schema.add_property("current_phase", SchemaProperty::string());
            schema.add_property("done", SchemaProperty::boolean());
            schema.add_property("due_date", SchemaProperty::datetime());
            schema.add_property("comments_count", SchemaProperty::integer());
            schema.add_property("url", SchemaProperty::string());
        }
        ResourceKind::CardAssignees => {
            schema.add_property("card_id", SchemaProperty::string().required());
            schema.add_property("id", SchemaProperty::string().required());
        }
        ResourceKind::CardComments => {
            schema.add_property("card_id", SchemaProperty::string().required());
            schema.add_property("text", SchemaProperty::string());
        }
        ResourceKind::CardFields => {
            schema.add_property("card_id", SchemaProperty::string().required());
            schema.add_property("name", SchemaProperty::string());
            schema.add_property("value", SchemaProperty::string());
            schema.add_property("updated_at", SchemaProperty::datetime());
        }
        ResourceKind::CardLabels => {
            schema.add_property("card_id", SchemaProperty::string().required());
            schema.add_property("name", SchemaProperty::string());
        }
        ResourceKind::CardPhaseHistory => {
            schema.add_property("card_id", SchemaProperty::string().required());
            schema.add_property("phase", SchemaProperty::string());
            schema.add_property("firstTimeIn", SchemaProperty::datetime());
            schema.add_property("lastTimeOut", SchemaProperty::datetime());
        }
        ResourceKind::Tables => {
            schema.add_property("id", SchemaProperty::string().required());
            schema.add_property("name", SchemaProperty::string());
            schema.add_property("description", SchemaProperty::string());
            schema.add_property("icon", SchemaProperty::string());
            schema.add_property("authorization", SchemaProperty::string());
            schema.add_property("public", SchemaProperty::boolean());
            schema.add_property("public_form", SchemaProperty::boolean());
            schema.add_property("table_records_count", SchemaProperty::integer());
            schema.add_property("url", SchemaProperty::string());
        }
    }
    schema
}
