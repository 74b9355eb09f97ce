//! # agglo
//!
//! Builds GNN training excerpts from a region adjacency graph of
//! over-segmented fragments.
//!
//! ## Usage
//!
//! ```bash
//! agglo init
//! agglo ingest --nodes nodes.json --edges edges.json
//! agglo extract --offset 0,0,0 --shape 1000,1000,1000 --output block.aggx
//! agglo inspect --input block.aggx
//! agglo dataset --output-dir blocks/
//! agglo pairs --offset 0,0,0 --shape 4000,4000,4000
//! ```

use agglo::cli;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    let cli = cli::Cli::parse();

    // AGGLO_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("AGGLO_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let default_level = if cli.verbose {
        "agglo=debug,agglo_core=debug"
    } else if cli.quiet {
        "agglo=warn,agglo_core=warn"
    } else {
        "agglo=info,agglo_core=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_env("AGGLO_LOG")
        .or_else(|_| tracing_subscriber::EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| default_level.into());

    // Logs go to stderr; stdout carries command output.
    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}
