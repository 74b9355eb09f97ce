//! # agglo CLI Module
//!
//! ## Available Commands
//!
//! - `init` - Initialize a new RAG database
//! - `ingest` - Ingest node and edge documents from JSON files
//! - `status` - Show node and edge counts
//! - `extract` - Build the excerpt of one region and write it to a file
//! - `inspect` - Validate and summarize a stored excerpt
//! - `dataset` - Build one excerpt per block of the configured ROI
//! - `pairs` - Show siamese pair counts and sampling weights for a region

mod commands;

use agglo_core::ExcerptError;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// agglo - graph excerpts for fragment agglomeration
///
/// Extracts bounded, boundary-aware training subgraphs from a region
/// adjacency graph of over-segmented fragments.
#[derive(Parser, Debug)]
#[command(name = "agglo")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the RAG database
    #[arg(short = 'D', long, global = true, default_value = "agglo.redb")]
    pub database: PathBuf,

    /// Path to the TOML configuration file
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new empty database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },

    /// Ingest node and edge documents (JSON arrays of objects)
    Ingest {
        /// Node documents with id and center_z/center_y/center_x
        #[arg(short, long)]
        nodes: PathBuf,

        /// Edge documents with u, v and the configured attribute fields
        #[arg(short, long)]
        edges: PathBuf,
    },

    /// Show graph status
    Status,

    /// Build the excerpt of one region
    Extract {
        /// Region offset as z,y,x
        #[arg(long, value_parser = parse_triple)]
        offset: [i64; 3],

        /// Region shape as z,y,x
        #[arg(long, value_parser = parse_triple)]
        shape: [i64; 3],

        /// Masking region offset as z,y,x (defaults to the region)
        #[arg(long, value_parser = parse_triple, requires = "inner_shape")]
        inner_offset: Option<[i64; 3]>,

        /// Masking region shape as z,y,x
        #[arg(long, value_parser = parse_triple, requires = "inner_offset")]
        inner_shape: Option<[i64; 3]>,

        /// JSON object mapping node ids to embedding vectors
        #[arg(long)]
        embeddings: Option<PathBuf>,

        /// Output file for the excerpt
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Validate and summarize a stored excerpt
    Inspect {
        /// Input excerpt file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Build one excerpt per block of the configured dataset ROI
    Dataset {
        /// Directory the excerpts are written to
        #[arg(short, long)]
        output_dir: PathBuf,

        /// JSON object mapping node ids to embedding vectors
        #[arg(long)]
        embeddings: Option<PathBuf>,
    },

    /// Show siamese pair counts and sampling weights for a region
    Pairs {
        /// Region offset as z,y,x
        #[arg(long, value_parser = parse_triple)]
        offset: [i64; 3],

        /// Region shape as z,y,x
        #[arg(long, value_parser = parse_triple)]
        shape: [i64; 3],
    },
}

/// Parse `z,y,x` into three integers.
pub fn parse_triple(s: &str) -> Result<[i64; 3], String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let [z, y, x] = *parts.as_slice() else {
        return Err(format!("expected z,y,x but got '{}'", s));
    };
    let parse = |p: &str| {
        p.parse::<i64>()
            .map_err(|e| format!("invalid coordinate '{}': {}", p, e))
    };
    Ok([parse(z)?, parse(y)?, parse(x)?])
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), ExcerptError> {
    let json_mode = cli.json_mode;
    let config = crate::config::AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Some(Commands::Init { force }) => cmd_init(&cli.database, force),
        Some(Commands::Ingest { nodes, edges }) => {
            cmd_ingest(&cli.database, &config, json_mode, &nodes, &edges)
        }
        Some(Commands::Status) => cmd_status(&cli.database, json_mode),
        Some(Commands::Extract {
            offset,
            shape,
            inner_offset,
            inner_shape,
            embeddings,
            output,
        }) => {
            let region = agglo_core::Region::new(offset, shape);
            let inner = match (inner_offset, inner_shape) {
                (Some(o), Some(s)) => agglo_core::Region::new(o, s),
                _ => region,
            };
            cmd_extract(
                &cli.database,
                &config,
                json_mode,
                &region,
                &inner,
                embeddings.as_deref(),
                &output,
            )
        }
        Some(Commands::Inspect { input }) => cmd_inspect(&input, json_mode),
        Some(Commands::Dataset {
            output_dir,
            embeddings,
        }) => cmd_dataset(
            &cli.database,
            &config,
            json_mode,
            &output_dir,
            embeddings.as_deref(),
        ),
        Some(Commands::Pairs { offset, shape }) => cmd_pairs(
            &cli.database,
            &config,
            json_mode,
            &agglo_core::Region::new(offset, shape),
        ),
        None => {
            // No subcommand - show status by default
            cmd_status(&cli.database, json_mode)
        }
    }
}
