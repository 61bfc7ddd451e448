//! Protocol message emission
//!
//! Sync output is a sequence of line-delimited JSON messages on stdout:
//! SCHEMA announces a stream's shape, RECORD carries one flattened row,
//! STATE carries the checkpoint document. Operator-facing logging goes to
//! stderr through tracing and never mixes with this channel.
//!
//! The emitter owns the selection contract: schemas are emitted already
//! filtered to the selected properties, and no record ever carries a
//! field absent from that filtered schema. Date-time fields are
//! normalized to UTC RFC 3339 on the way out.

use crate::catalog::CatalogEntry;
use crate::error::Result;
use crate::types::RecordValues;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use std::io::Write;

/// One protocol message
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Message {
    #[serde(rename = "SCHEMA")]
    Schema {
        stream: String,
        schema: Value,
        key_properties: Vec<String>,
    },
    #[serde(rename = "RECORD")]
    Record { stream: String, record: Value },
    #[serde(rename = "STATE")]
    State { value: Value },
}

/// Writes protocol messages, one JSON object per line
pub struct Emitter<W: Write> {
    writer: W,
}

impl<W: Write> Emitter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    fn write_message(&mut self, message: &Message) -> Result<()> {
        let line = serde_json::to_string(message)?;
        writeln!(self.writer, "{line}")?;
        self.writer.flush()?;
        Ok(())
    }

    /// Emit the stream's schema, restricted to the selected properties
    pub fn emit_schema(&mut self, entry: &CatalogEntry) -> Result<()> {
        self.write_message(&Message::Schema {
            stream: entry.tap_stream_id.clone(),
            schema: entry.schema.filtered_to_selection().to_value(),
            key_properties: entry.key_properties.clone(),
        })
    }

    /// Emit one record, filtered to the stream's selected fields
    pub fn emit_record(&mut self, entry: &CatalogEntry, values: &RecordValues) -> Result<()> {
        self.write_message(&Message::Record {
            stream: entry.tap_stream_id.clone(),
            record: Value::Object(filter_record(entry, values)),
        })
    }

    /// Emit the current checkpoint document
    pub fn emit_state(&mut self, state: &Value) -> Result<()> {
        self.write_message(&Message::State {
            value: state.clone(),
        })
    }
}

/// Restrict a record to the selected fields, in schema order, with
/// date-time values normalized.
fn filter_record(entry: &CatalogEntry, values: &RecordValues) -> serde_json::Map<String, Value> {
    let mut record = serde_json::Map::new();
    for (name, property) in &entry.schema.properties {
        if !property.selected {
            continue;
        }
        let value = values.get(name).cloned().unwrap_or(Value::Null);
        let value = if property.is_datetime() {
            normalize_datetime(value)
        } else {
            value
        };
        record.insert(name.clone(), value);
    }
    record
}

/// Rewrite a datetime string as UTC RFC 3339. Values that do not parse
/// pass through untouched; a wrong-looking timestamp is better than a
/// dropped one.
fn normalize_datetime(value: Value) -> Value {
    match &value {
        Value::String(s) => match DateTime::parse_from_rfc3339(s) {
            Ok(dt) => Value::String(
                dt.with_timezone(&Utc)
                    .to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
            Err(_) => value,
        },
        _ => value,
    }
}
