//! Nested-object flattening
//!
//! The API returns deeply nested records; downstream wants flat rows.
//! Each resource kind has a fixed decomposition rule that splits one raw
//! item into a primary record plus child records, with each child
//! carrying its immediate parent's identifier by value. Parents never
//! reference children.
//!
//! Flattening is pure and total: a missing sub-collection is an empty
//! collection, a missing scalar is null, and no input that matches the
//! API contract can make it fail.

use crate::schema::RECORD_ID_FIELD;
use crate::types::{RecordValues, ResourceKind};
use serde_json::Value;

/// One raw item decomposed into a primary record and its children.
///
/// Children are ordered: all records of one kind appear in the order
/// their source entries appeared in the raw item.
#[derive(Debug, Clone, Default)]
pub struct Flattened {
    pub primary: RecordValues,
    pub children: Vec<(ResourceKind, RecordValues)>,
}

/// Copy a scalar field from the raw item, null when absent
fn copy(values: &mut RecordValues, raw: &Value, field: &str) {
    values.insert(
        field.to_string(),
        raw.get(field).cloned().unwrap_or(Value::Null),
    );
}

/// Copy a field reached through one level of nesting, null when absent
fn copy_nested(values: &mut RecordValues, raw: &Value, outer: &str, inner: &str, as_name: &str) {
    values.insert(
        as_name.to_string(),
        raw.get(outer)
            .and_then(|v| v.get(inner))
            .cloned()
            .unwrap_or(Value::Null),
    );
}

fn collection<'a>(raw: &'a Value, field: &str) -> &'a [Value] {
    raw.get(field)
        .and_then(Value::as_array)
        .map_or(&[][..], Vec::as_slice)
}

fn id_of(raw: &Value) -> Value {
    raw.get("id").cloned().unwrap_or(Value::Null)
}

/// A member row: the nested `user` object merged with the membership's
/// `role_name`.
pub fn member(raw: &Value) -> RecordValues {
    let user = raw.get("user").cloned().unwrap_or(Value::Null);
    let mut values = RecordValues::new();
    copy(&mut values, &user, "id");
    copy(&mut values, &user, "name");
    copy(&mut values, &user, "email");
    copy(&mut values, &user, "username");
    copy(&mut values, &user, "created_at");
    copy(&mut values, &user, "avatarUrl");
    copy(&mut values, &user, "timeZone");
    copy(&mut values, &user, "locale");
    copy(&mut values, raw, "role_name");
    values
}

/// A pipe decomposes into the pipe row, one row per phase, and one row
/// per field definition inside each phase.
pub fn pipe(raw: &Value) -> Flattened {
    let pipe_id = id_of(raw);

    let mut primary = RecordValues::new();
    copy(&mut primary, raw, "id");
    copy(&mut primary, raw, "name");
    copy(&mut primary, raw, "description");
    copy(&mut primary, raw, "icon");
    copy(&mut primary, raw, "created_at");

    let mut children = Vec::new();
    for phase in collection(raw, "phases") {
        let phase_id = id_of(phase);

        let mut row = RecordValues::new();
        copy(&mut row, phase, "id");
        row.insert("pipe_id".to_string(), pipe_id.clone());
        copy(&mut row, phase, "name");
        copy(&mut row, phase, "cards_count");
        children.push((ResourceKind::PipePhases, row));

        for field in collection(phase, "fields") {
            let mut row = RecordValues::new();
            copy(&mut row, field, "id");
            row.insert("phase_id".to_string(), phase_id.clone());
            copy(&mut row, field, "type");
            copy(&mut row, field, "required");
            children.push((ResourceKind::PhaseFields, row));
        }
    }

    Flattened { primary, children }
}

/// A card decomposes into the card row plus one child row per assignee,
/// comment, label, and phase-history entry.
pub fn card(raw: &Value, pipe_id: &Value) -> Flattened {
    let card_id = id_of(raw);

    let mut primary = RecordValues::new();
    copy(&mut primary, raw, "id");
    primary.insert("pipe_id".to_string(), pipe_id.clone());
    copy(&mut primary, raw, "title");
    copy_nested(&mut primary, raw, "current_phase", "name", "current_phase");
    copy(&mut primary, raw, "done");
    copy(&mut primary, raw, "due_date");
    copy(&mut primary, raw, "comments_count");
    copy(&mut primary, raw, "url");

    let mut children = Vec::new();
    for assignee in collection(raw, "assignees") {
        let mut row = RecordValues::new();
        row.insert("card_id".to_string(), card_id.clone());
        copy(&mut row, assignee, "id");
        children.push((ResourceKind::CardAssignees, row));
    }
    for comment in collection(raw, "comments") {
        let mut row = RecordValues::new();
        row.insert("card_id".to_string(), card_id.clone());
        copy(&mut row, comment, "text");
        children.push((ResourceKind::CardComments, row));
    }
    for field in collection(raw, "fields") {
        let mut row = RecordValues::new();
        row.insert("card_id".to_string(), card_id.clone());
        copy(&mut row, field, "name");
        copy(&mut row, field, "value");
        copy(&mut row, field, "updated_at");
        children.push((ResourceKind::CardFields, row));
    }
    for label in collection(raw, "labels") {
        let mut row = RecordValues::new();
        row.insert("card_id".to_string(), card_id.clone());
        copy(&mut row, label, "name");
        children.push((ResourceKind::CardLabels, row));
    }
    for entry in collection(raw, "phases_history") {
        let mut row = RecordValues::new();
        row.insert("card_id".to_string(), card_id.clone());
        copy_nested(&mut row, entry, "phase", "name", "phase");
        copy(&mut row, entry, "firstTimeIn");
        copy(&mut row, entry, "lastTimeOut");
        children.push((ResourceKind::CardPhaseHistory, row));
    }

    Flattened { primary, children }
}

/// A table definition row. Column definitions belong to the schema, not
/// the record, and are dropped here.
pub fn table(raw: &Value) -> RecordValues {
    let mut values = RecordValues::new();
    copy(&mut values, raw, "id");
    copy(&mut values, raw, "name");
    copy(&mut values, raw, "description");
    copy(&mut values, raw, "icon");
    copy(&mut values, raw, "authorization");
    copy(&mut values, raw, "public");
    copy(&mut values, raw, "public_form");
    copy(&mut values, raw, "table_records_count");
    copy(&mut values, raw, "url");
    values
}

/// One dynamic table row: intrinsic fields first, then one value per
/// filled column keyed by the column id. The numeric row id is hoisted
/// into the synthetic key column, `created_by.id` becomes
/// `created_by_id`, and every row carries its table's id.
pub fn table_row(raw: &Value, table_id: &str) -> RecordValues {
    let mut values = RecordValues::new();
    values.insert(RECORD_ID_FIELD.to_string(), numeric_record_id(raw));
    copy(&mut values, raw, "id");
    copy(&mut values, raw, "title");
    copy(&mut values, raw, "url");
    copy(&mut values, raw, "created_at");
    copy(&mut values, raw, "updated_at");
    copy(&mut values, raw, "due_date");
    copy(&mut values, raw, "finished_at");
    copy_nested(&mut values, raw, "created_by", "id", "created_by_id");
    values.insert("table_id".to_string(), Value::String(table_id.to_string()));

    for field in collection(raw, "record_fields") {
        let Some(column_id) = field
            .get("field")
            .and_then(|f| f.get("id"))
            .and_then(Value::as_str)
        else {
            continue;
        };
        let value = match field.get("array_value") {
            Some(array @ Value::Array(items)) if !items.is_empty() => array.clone(),
            _ => field.get("value").cloned().unwrap_or(Value::Null),
        };
        values.insert(column_id.to_string(), value);
    }

    values
}

/// Row ids arrive as numeric strings; the key column wants an integer.
fn numeric_record_id(raw: &Value) -> Value {
    match raw.get("id") {
        Some(Value::Number(n)) => Value::Number(n.clone()),
        Some(Value::String(s)) => s
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}
