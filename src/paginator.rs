//! Connection pagination
//!
//! The API exposes large collections as GraphQL connections:
//! `edges[].node` carries the items, `pageInfo { hasNextPage endCursor }`
//! carries the cursor. The paginator owns the cursor for the duration of
//! one traversal and discards it on completion; nothing is kept across
//! runs (full replication).

use crate::client::GraphQlClient;
use crate::error::Result;
use crate::queries;
use serde_json::Value;
use tracing::debug;

/// Opaque cursor plus total-seen counter for one traversal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    /// Opaque continuation token from `pageInfo.endCursor`
    pub end_cursor: String,
    /// Items seen so far in this traversal
    pub seen: u64,
}

/// One fetched page
#[derive(Debug, Clone)]
pub struct Page {
    /// Items in server-assigned order
    pub items: Vec<Value>,
    /// Cursor for the next page, `None` when exhausted
    pub next: Option<PageCursor>,
}

/// A resource the API serves as a paged connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PagedResource {
    /// Cards belonging to one pipe
    Cards { pipe_id: String },
    /// Rows of one dynamic table
    TableRows { table_id: String },
}

impl PagedResource {
    /// Key of the connection object inside the response `data`
    fn connection_key(&self) -> &'static str {
        match self {
            PagedResource::Cards { .. } => "cards",
            PagedResource::TableRows { .. } => "table_records",
        }
    }

    fn query(&self, page_size: u32, cursor: Option<&str>) -> String {
        match self {
            PagedResource::Cards { pipe_id } => queries::cards(pipe_id, page_size, cursor),
            PagedResource::TableRows { table_id } => {
                queries::table_records(table_id, page_size, cursor)
            }
        }
    }
}

/// Issues paged queries and yields raw pages until exhaustion
pub struct Paginator<'a> {
    client: &'a GraphQlClient,
    page_size: u32,
}

impl<'a> Paginator<'a> {
    /// Create a paginator with the given page size
    pub fn new(client: &'a GraphQlClient, page_size: u32) -> Self {
        Self { client, page_size }
    }

    /// Fetch one page. `cursor` is `None` for the first call; thread the
    /// returned cursor back in for subsequent calls.
    pub async fn fetch(
        &self,
        resource: &PagedResource,
        cursor: Option<PageCursor>,
    ) -> Result<Page> {
        let query = resource.query(self.page_size, cursor.as_ref().map(|c| c.end_cursor.as_str()));
        let data = self.client.execute(&query).await?;
        let connection = data
            .get(resource.connection_key())
            .cloned()
            .unwrap_or(Value::Null);
        let page = parse_connection(&connection, cursor.map_or(0, |c| c.seen));
        debug!(
            "Fetched page of {} ({} items, exhausted: {})",
            resource.connection_key(),
            page.items.len(),
            page.next.is_none()
        );
        Ok(page)
    }
}

/// Parse a connection object into items and a continuation cursor.
///
/// A missing or malformed connection yields an empty, exhausted page;
/// shapes the API contract promises never fail here.
pub(crate) fn parse_connection(connection: &Value, seen_before: u64) -> Page {
    let items: Vec<Value> = connection
        .get("edges")
        .and_then(Value::as_array)
        .map(|edges| {
            edges
                .iter()
                .map(|edge| edge.get("node").cloned().unwrap_or(Value::Null))
                .collect()
        })
        .unwrap_or_default();

    let seen = seen_before + items.len() as u64;
    let page_info = connection.get("pageInfo");
    let has_next = page_info
        .and_then(|p| p.get("hasNextPage"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let end_cursor = page_info
        .and_then(|p| p.get("endCursor"))
        .and_then(Value::as_str)
        .unwrap_or("");

    let next = if has_next && !end_cursor.is_empty() {
        Some(PageCursor {
            end_cursor: end_cursor.to_string(),
            seen,
        })
    } else {
        None
    };

    Page { items, next }
}
