//! tap-pipefy CLI
//!
//! Protocol messages go to stdout; logging stays on stderr.

use clap::Parser;
use tap_pipefy::cli::{Cli, Runner};

#[tokio::main]
async fn main() {
    // Logging must never mix with the protocol stream on stdout
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let runner = Runner::new(cli);

    if let Err(e) = runner.run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
