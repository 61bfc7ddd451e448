//! Stream synchronization
//!
//! Drives one full-replication run: for each selected stream, in catalog
//! order, emit the schema, re-fetch every record from scratch, flatten,
//! emit, and checkpoint. There is no delta tracking anywhere; every run
//! reads the whole dataset again.
//!
//! Streams fail independently. A fatal fetch error on one stream marks it
//! Failed and the run moves on, so a broken table never blocks members or
//! pipes. Failures are aggregated into the run outcome at the end.
//!
//! Everything is sequential: streams one after another, pages one after
//! another. Parallelism would only reorder records while contending for
//! the same rate limit.

use crate::catalog::{Catalog, CatalogEntry};
use crate::client::GraphQlClient;
use crate::config::TapConfig;
use crate::emit::Emitter;
use crate::error::{Error, Result};
use crate::flatten;
use crate::paginator::{PagedResource, Paginator};
use crate::queries;
use crate::state::StateStore;
use crate::types::{parse_table_stream, ResourceKind};
use serde_json::Value;
use std::io::Write;
use tracing::{error, info, warn};

/// Per-stream lifecycle within one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// Outcome of one stream
#[derive(Debug, Clone)]
pub struct StreamOutcome {
    pub stream: String,
    pub state: StreamState,
    pub records: u64,
    pub error: Option<String>,
}

/// Outcome of a whole run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub streams: Vec<StreamOutcome>,
}

impl RunSummary {
    pub fn failed(&self) -> Vec<&StreamOutcome> {
        self.streams
            .iter()
            .filter(|s| s.state == StreamState::Failed)
            .collect()
    }

    pub fn total_records(&self) -> u64 {
        self.streams.iter().map(|s| s.records).sum()
    }
}

/// The run-wide context: catalog, client, emitter, and checkpoint store
pub struct Synchronizer<'a, W: Write> {
    client: &'a GraphQlClient,
    config: &'a TapConfig,
    catalog: &'a Catalog,
    emitter: Emitter<W>,
    store: StateStore,
    organization: Option<Value>,
}

impl<'a, W: Write> Synchronizer<'a, W> {
    pub fn new(
        client: &'a GraphQlClient,
        config: &'a TapConfig,
        catalog: &'a Catalog,
        writer: W,
        store: StateStore,
    ) -> Self {
        Self {
            client,
            config,
            catalog,
            emitter: Emitter::new(writer),
            store,
            organization: None,
        }
    }

    /// Run the sync over every selected stream.
    ///
    /// Returns `SyncFailed` when any stream failed; other error variants
    /// mean the run itself could not proceed.
    pub async fn run(mut self) -> Result<RunSummary> {
        let selected = self.catalog.selected_streams();
        if selected.is_empty() {
            warn!("No streams selected in catalog, nothing to sync");
            return Ok(RunSummary::default());
        }

        let mut summary = RunSummary::default();
        for entry in selected {
            let stream = entry.tap_stream_id.clone();

            if self.store.state().is_completed(&stream) {
                info!("Stream {stream} already completed, skipping");
                summary.streams.push(StreamOutcome {
                    stream,
                    state: StreamState::Completed,
                    records: 0,
                    error: None,
                });
                continue;
            }

            self.store.state_mut().set_currently_syncing(Some(&stream));
            match self.sync_stream(entry).await {
                Ok(records) => {
                    self.store.state_mut().mark_completed(&stream);
                    self.store.save()?;
                    self.emitter.emit_state(&self.store.state().to_value())?;
                    info!("Stream {stream} completed with {records} record(s)");
                    summary.streams.push(StreamOutcome {
                        stream,
                        state: StreamState::Completed,
                        records,
                        error: None,
                    });
                }
                Err(e) if e.is_stream_failure() => {
                    error!("Stream {stream} failed: {e}");
                    self.store.state_mut().set_currently_syncing(None);
                    summary.streams.push(StreamOutcome {
                        stream,
                        state: StreamState::Failed,
                        records: 0,
                        error: Some(e.to_string()),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        let failed = summary.failed();
        if failed.is_empty() {
            Ok(summary)
        } else {
            Err(Error::SyncFailed {
                failed: failed.len(),
                streams: failed
                    .iter()
                    .map(|s| s.stream.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
        }
    }

    /// Emit one stream's schema and all of its records.
    async fn sync_stream(&mut self, entry: &CatalogEntry) -> Result<u64> {
        info!("Syncing stream {}", entry.tap_stream_id);
        self.emitter.emit_schema(entry)?;

        if let Some(table_id) = parse_table_stream(&entry.tap_stream_id) {
            let table_id = table_id.to_string();
            return self.sync_table_rows(entry, &table_id).await;
        }

        match ResourceKind::from_stream_id(&entry.tap_stream_id) {
            Some(ResourceKind::Members) => self.sync_members(entry).await,
            Some(ResourceKind::Pipes) => self.sync_pipe_derived(entry, None).await,
            Some(kind @ (ResourceKind::PipePhases | ResourceKind::PhaseFields)) => {
                self.sync_pipe_derived(entry, Some(kind)).await
            }
            Some(ResourceKind::Cards) => self.sync_card_derived(entry, None).await,
            Some(
                kind @ (ResourceKind::CardAssignees
                | ResourceKind::CardComments
                | ResourceKind::CardFields
                | ResourceKind::CardLabels
                | ResourceKind::CardPhaseHistory),
            ) => self.sync_card_derived(entry, Some(kind)).await,
            Some(ResourceKind::Tables) => self.sync_tables(entry).await,
            None => Err(Error::StreamNotFound {
                stream: entry.tap_stream_id.clone(),
            }),
        }
    }

    /// The organization snapshot, fetched once per run.
    async fn organization(&mut self) -> Result<Value> {
        if let Some(org) = &self.organization {
            return Ok(org.clone());
        }
        let data = self
            .client
            .execute(&queries::organization(self.config.organization_id))
            .await?;
        let org = data
            .get("organization")
            .filter(|o| !o.is_null())
            .cloned()
            .ok_or_else(|| {
                Error::graphql(format!(
                    "organization {} not found",
                    self.config.organization_id
                ))
            })?;
        self.organization = Some(org.clone());
        Ok(org)
    }

    async fn sync_members(&mut self, entry: &CatalogEntry) -> Result<u64> {
        let org = self.organization().await?;
        let mut records = 0;
        for raw in org.get("members").and_then(Value::as_array).unwrap_or(&vec![]) {
            self.emitter.emit_record(entry, &flatten::member(raw))?;
            records += 1;
        }
        Ok(records)
    }

    /// Pipes and their flattened descendants share one traversal: emit
    /// primaries when `child` is `None`, otherwise only the matching
    /// child records.
    async fn sync_pipe_derived(
        &mut self,
        entry: &CatalogEntry,
        child: Option<ResourceKind>,
    ) -> Result<u64> {
        let org = self.organization().await?;
        let mut records = 0;
        for raw in org.get("pipes").and_then(Value::as_array).unwrap_or(&vec![]) {
            let flat = flatten::pipe(raw);
            match child {
                None => {
                    self.emitter.emit_record(entry, &flat.primary)?;
                    records += 1;
                }
                Some(want) => {
                    for (kind, values) in &flat.children {
                        if *kind == want {
                            self.emitter.emit_record(entry, values)?;
                            records += 1;
                        }
                    }
                }
            }
        }
        Ok(records)
    }

    /// Cards and their flattened descendants: paginate every pipe's cards
    /// and emit primaries or the matching child records.
    async fn sync_card_derived(
        &mut self,
        entry: &CatalogEntry,
        child: Option<ResourceKind>,
    ) -> Result<u64> {
        let org = self.organization().await?;
        let pipe_ids: Vec<Value> = org
            .get("pipes")
            .and_then(Value::as_array)
            .map(|pipes| pipes.iter().map(|p| p.get("id").cloned().unwrap_or(Value::Null)).collect())
            .unwrap_or_default();

        let paginator = Paginator::new(self.client, self.config.effective_page_size());
        let mut records = 0;
        for pipe_id in pipe_ids {
            let Some(pipe_id_str) = pipe_id.as_str().map(str::to_string) else {
                continue;
            };
            let resource = PagedResource::Cards {
                pipe_id: pipe_id_str,
            };
            let mut cursor = None;
            loop {
                let page = paginator.fetch(&resource, cursor).await?;
                for raw in &page.items {
                    let flat = flatten::card(raw, &pipe_id);
                    match child {
                        None => {
                            self.emitter.emit_record(entry, &flat.primary)?;
                            records += 1;
                        }
                        Some(want) => {
                            for (kind, values) in &flat.children {
                                if *kind == want {
                                    self.emitter.emit_record(entry, values)?;
                                    records += 1;
                                }
                            }
                        }
                    }
                }
                match page.next {
                    Some(next) => cursor = Some(next),
                    None => break,
                }
            }
        }
        Ok(records)
    }

    async fn sync_tables(&mut self, entry: &CatalogEntry) -> Result<u64> {
        let org = self.organization().await?;
        let mut records = 0;
        let edges = org
            .get("tables")
            .and_then(|t| t.get("edges"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for edge in &edges {
            let Some(node) = edge.get("node") else {
                continue;
            };
            self.emitter.emit_record(entry, &flatten::table(node))?;
            records += 1;
        }
        Ok(records)
    }

    async fn sync_table_rows(&mut self, entry: &CatalogEntry, table_id: &str) -> Result<u64> {
        let paginator = Paginator::new(self.client, self.config.effective_page_size());
        let resource = PagedResource::TableRows {
            table_id: table_id.to_string(),
        };
        let mut records = 0;
        let mut cursor = None;
        loop {
            let page = paginator.fetch(&resource, cursor).await?;
            for raw in &page.items {
                self.emitter
                    .emit_record(entry, &flatten::table_row(raw, table_id))?;
                records += 1;
            }
            match page.next {
                Some(next) => cursor = Some(next),
                None => return Ok(records),
            }
        }
    }
}
