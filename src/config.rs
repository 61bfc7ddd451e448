//! Tap configuration
//!
//! The tap is configured with a single JSON file:
//!
//! ```json
//! {
//!   "personal_access_token": "...",
//!   "organization_id": 12345,
//!   "user_agent": "tap-pipefy via acme-pipeline"
//! }
//! ```
//!
//! `page_size` and `base_url` are optional knobs, mainly for tests.

use crate::error::{Error, Result};
use crate::queries::MAX_PAGE_SIZE;
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// Default Pipefy GraphQL endpoint.
pub const DEFAULT_BASE_URL: &str = "https://app.pipefy.com/queries";

/// Tap configuration loaded from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct TapConfig {
    /// Opaque API credential. Never logged.
    pub personal_access_token: String,

    /// Numeric organization identifier
    pub organization_id: u64,

    /// Free-text caller identification sent to the API
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Records requested per page, clamped to the API maximum
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Endpoint override, used by tests against a mock server
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_page_size() -> u32 {
    MAX_PAGE_SIZE
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl TapConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::config(format!("Failed to read config file: {e}")))?;
        Self::from_json(&contents)
    }

    /// Parse configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let config: TapConfig = serde_json::from_str(json)
            .map_err(|e| Error::config(format!("Invalid config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.personal_access_token.trim().is_empty() {
            return Err(Error::missing_field("personal_access_token"));
        }
        Ok(())
    }

    /// Page size bounded to what the API accepts.
    pub fn effective_page_size(&self) -> u32 {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }

    /// Log the configuration with the credential masked.
    pub fn log_masked(&self) {
        info!(
            "CONFIG: personal_access_token = {}",
            "*".repeat(self.personal_access_token.len())
        );
        info!("CONFIG: organization_id = {}", self.organization_id);
        if let Some(ua) = &self.user_agent {
            info!("CONFIG: user_agent = {ua}");
        }
        info!("CONFIG: page_size = {}", self.effective_page_size());
    }
}
