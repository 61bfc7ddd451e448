//! Catalog discovery
//!
//! Discovery enumerates every stream the organization can see: the fixed
//! resources plus one `table_<id>` stream per dynamic table. The catalog
//! is serialized for the operator, who flips `selected` flags and feeds
//! the edited file back to sync. Everything starts unselected.
//!
//! Discovery is all-or-nothing: if the table list cannot be enumerated no
//! catalog is emitted at all, because a partial catalog would silently
//! hide streams from the operator.

use crate::client::GraphQlClient;
use crate::error::{Error, Result};
use crate::queries;
use crate::schema::{fixed_schema, table_schema, SchemaDocument, RECORD_ID_FIELD};
use crate::types::{table_stream_id, ResourceKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::info;

/// One stream in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub stream: String,
    pub tap_stream_id: String,
    pub key_properties: Vec<String>,
    pub schema: SchemaDocument,
}

impl CatalogEntry {
    fn new(stream: impl Into<String>, key_properties: Vec<String>, schema: SchemaDocument) -> Self {
        let stream = stream.into();
        Self {
            tap_stream_id: stream.clone(),
            stream,
            key_properties,
            schema,
        }
    }

    /// Whether the operator selected this stream
    pub fn is_selected(&self) -> bool {
        self.schema.selected
    }
}

/// The discovery artifact: an ordered list of streams
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub streams: Vec<CatalogEntry>,
}

impl Catalog {
    /// Load a catalog from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Find a stream by identifier
    pub fn get_stream(&self, stream_id: &str) -> Option<&CatalogEntry> {
        self.streams.iter().find(|s| s.tap_stream_id == stream_id)
    }

    /// Selected streams, in catalog order
    pub fn selected_streams(&self) -> Vec<&CatalogEntry> {
        self.streams.iter().filter(|s| s.is_selected()).collect()
    }

    /// Serialize to a JSON value
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Pull table definitions out of the organization response.
///
/// Any shape surprise here means we cannot trust the enumeration, so it
/// is an error rather than a silent empty list.
fn table_nodes(organization: &Value) -> Result<Vec<Value>> {
    let edges = organization
        .get("tables")
        .and_then(|t| t.get("edges"))
        .and_then(Value::as_array)
        .ok_or_else(|| Error::catalog_incomplete("organization response has no table list"))?;

    edges
        .iter()
        .map(|edge| {
            edge.get("node")
                .cloned()
                .ok_or_else(|| Error::catalog_incomplete("table edge without a node"))
        })
        .collect()
}

/// Build the catalog entry for one dynamic table
fn table_entry(table: &Value) -> Result<CatalogEntry> {
    let id = table
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::catalog_incomplete("table without an id"))?;
    let columns: Vec<Value> = table
        .get("table_fields")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    Ok(CatalogEntry::new(
        table_stream_id(id),
        vec![RECORD_ID_FIELD.to_string()],
        table_schema(&columns),
    ))
}

/// Enumerate all streams for the organization.
pub async fn discover(client: &GraphQlClient, organization_id: u64) -> Result<Catalog> {
    let data = client
        .execute(&queries::organization(organization_id))
        .await
        .map_err(|e| Error::catalog_incomplete(format!("failed to enumerate resources: {e}")))?;
    let organization = data
        .get("organization")
        .filter(|o| !o.is_null())
        .ok_or_else(|| {
            Error::catalog_incomplete(format!("organization {organization_id} not found"))
        })?;

    let mut streams: Vec<CatalogEntry> = ResourceKind::ALL
        .iter()
        .map(|&kind| {
            CatalogEntry::new(kind.stream_id(), kind.key_properties(), fixed_schema(kind))
        })
        .collect();

    for table in table_nodes(organization)? {
        streams.push(table_entry(&table)?);
    }

    info!("Discovered {} streams", streams.len());
    Ok(Catalog { streams })
}
