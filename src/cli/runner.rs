//! CLI runner - executes commands

use crate::catalog::{self, Catalog};
use crate::cli::commands::{Cli, Commands};
use crate::client::{ClientConfig, GraphQlClient};
use crate::config::TapConfig;
use crate::error::{Error, Result};
use crate::queries;
use crate::state::StateStore;
use crate::sync::Synchronizer;
use serde_json::Value;
use std::path::Path;
use tracing::info;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Check => self.check().await,
            Commands::Discover => self.discover().await,
            Commands::Sync { catalog, state } => self.sync(catalog, state.as_deref()).await,
        }
    }

    /// Load configuration from the inline JSON or the config file
    fn load_config(&self) -> Result<TapConfig> {
        let config = if let Some(json) = &self.cli.config_json {
            TapConfig::from_json(json)?
        } else if let Some(path) = &self.cli.config {
            TapConfig::from_file(path)?
        } else {
            return Err(Error::config(
                "No configuration given (use --config or --config-json)",
            ));
        };
        config.log_masked();
        Ok(config)
    }

    fn build_client(&self, config: &TapConfig) -> Result<GraphQlClient> {
        let client_config = ClientConfig {
            base_url: config.base_url.clone(),
            user_agent: config.user_agent.clone(),
            ..ClientConfig::default()
        };
        GraphQlClient::new(config.personal_access_token.clone(), client_config)
    }

    /// Validate the credential with a `me` query
    async fn check(&self) -> Result<()> {
        let config = self.load_config()?;
        let client = self.build_client(&config)?;

        let data = client.execute(&queries::me()).await?;
        let user = data.get("me").filter(|m| !m.is_null()).ok_or_else(|| {
            Error::graphql("credential check returned no user")
        })?;
        let name = user.get("name").and_then(Value::as_str).unwrap_or("?");
        info!("Connection check passed, authenticated as {name}");
        println!(
            "{}",
            serde_json::json!({"status": "ok", "authenticated_as": name})
        );
        Ok(())
    }

    /// Enumerate streams and print the catalog
    async fn discover(&self) -> Result<()> {
        let config = self.load_config()?;
        let client = self.build_client(&config)?;

        let catalog = catalog::discover(&client, config.organization_id).await?;
        println!("{}", serde_json::to_string_pretty(&catalog.to_value())?);
        Ok(())
    }

    /// Run a full-replication sync over the catalog's selected streams
    async fn sync(&self, catalog_path: &Path, state_path: Option<&Path>) -> Result<()> {
        let config = self.load_config()?;
        let client = self.build_client(&config)?;
        let catalog = Catalog::from_file(catalog_path)?;

        let store = match state_path {
            Some(path) => StateStore::load(path)?,
            None => StateStore::in_memory(),
        };

        let synchronizer =
            Synchronizer::new(&client, &config, &catalog, std::io::stdout(), store);
        let summary = synchronizer.run().await?;
        info!(
            "Sync finished: {} stream(s), {} record(s)",
            summary.streams.len(),
            summary.total_records()
        );
        Ok(())
    }
}
