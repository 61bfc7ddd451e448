//! Common types shared across the tap

use indexmap::IndexMap;
use serde_json::Value;

/// Ordered field-name → value mapping for one output record.
///
/// Insertion order is the emission order, which must match the order the
/// stream's schema declares its properties in.
pub type RecordValues = IndexMap<String, Value>;

/// Prefix used for dynamic table stream identifiers.
pub const TABLE_STREAM_PREFIX: &str = "table_";

/// The fixed (non-table) resources the tap extracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Members,
    Pipes,
    PipePhases,
    PhaseFields,
    Cards,
    CardAssignees,
    CardComments,
    CardFields,
    CardLabels,
    CardPhaseHistory,
    Tables,
}

impl ResourceKind {
    /// Fixed resources in catalog order.
    pub const ALL: [ResourceKind; 11] = [
        ResourceKind::Members,
        ResourceKind::Pipes,
        ResourceKind::PipePhases,
        ResourceKind::PhaseFields,
        ResourceKind::Cards,
        ResourceKind::CardAssignees,
        ResourceKind::CardComments,
        ResourceKind::CardFields,
        ResourceKind::CardLabels,
        ResourceKind::CardPhaseHistory,
        ResourceKind::Tables,
    ];

    /// Stream identifier for this resource.
    pub fn stream_id(self) -> &'static str {
        match self {
            ResourceKind::Members => "members",
            ResourceKind::Pipes => "pipes",
            ResourceKind::PipePhases => "pipe_phases",
            ResourceKind::PhaseFields => "phase_fields",
            ResourceKind::Cards => "cards",
            ResourceKind::CardAssignees => "card_assignees",
            ResourceKind::CardComments => "card_comments",
            ResourceKind::CardFields => "card_fields",
            ResourceKind::CardLabels => "card_labels",
            ResourceKind::CardPhaseHistory => "card_phase_history",
            ResourceKind::Tables => "tables",
        }
    }

    /// Look up a fixed resource by its stream identifier.
    pub fn from_stream_id(stream_id: &str) -> Option<ResourceKind> {
        ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.stream_id() == stream_id)
    }

    /// Key properties for this resource's stream.
    ///
    /// Child collections without their own API identifier have none.
    pub fn key_properties(self) -> Vec<String> {
        match self {
            ResourceKind::Members
            | ResourceKind::Pipes
            | ResourceKind::PipePhases
            | ResourceKind::PhaseFields
            | ResourceKind::Cards
            | ResourceKind::Tables => vec!["id".to_string()],
            ResourceKind::CardAssignees => vec!["card_id".to_string(), "id".to_string()],
            ResourceKind::CardComments
            | ResourceKind::CardFields
            | ResourceKind::CardLabels
            | ResourceKind::CardPhaseHistory => vec![],
        }
    }
}

/// Build the stream identifier for a dynamic table.
///
/// The table id is preserved verbatim so operators can cross-reference it
/// against the product UI.
pub fn table_stream_id(table_id: &str) -> String {
    format!("{TABLE_STREAM_PREFIX}{table_id}")
}

/// Extract the table id from a `table_<id>` stream identifier.
pub fn parse_table_stream(stream_id: &str) -> Option<&str> {
    stream_id.strip_prefix(TABLE_STREAM_PREFIX)
}
