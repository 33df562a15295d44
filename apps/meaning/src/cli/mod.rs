//! # Meaning CLI Module
//!
//! This module implements the CLI interface for Meaning.
//!
//! ## Available Commands
//!
//! - `schema` - Parse a catalog schema and print its groups and fields
//! - `add` - Store one record of `Path=literal` assignments
//! - `search` - Find records holding the given values
//! - `show` - Print the values of a stored record
//! - `status` - Show store counts
//! - `export` - Dump the store as JSON
//! - `init` - Create an empty store

mod commands;

use crate::config::MeaningConfig;
use clap::{Parser, Subcommand};
use meaning_core::MeaningError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Meaning - schema explorer
///
/// Declare schemas as composed kinds, flatten them into fields and store
/// records that share identical sub-records.
#[derive(Parser, Debug)]
#[command(name = "meaning")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the store file (default: meaning.store)
    #[arg(short = 'S', long, global = true)]
    pub store: Option<PathBuf>,

    /// Path to a TOML config file (default: ./meaning.toml when present)
    #[arg(short = 'C', long, global = true)]
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
    /// Parse a catalog schema and print groups, fields and type-paths
    Schema {
        /// Schema name, e.g. EmployeeContractContext
        name: String,
    },

    /// Store one record
    Add {
        /// Schema the record belongs to
        schema: String,

        /// Assignments `Kind.Kind.ValueKind=literal`, optionally `...ValueKind#2=literal`
        #[arg(required = true)]
        assignments: Vec<String>,
    },

    /// Find records holding every given value
    Search {
        /// Schema the query values are addressed in
        schema: String,

        /// Assignments `Kind.Kind.ValueKind=literal`
        #[arg(required = true)]
        assignments: Vec<String>,
    },

    /// Print the values of a stored record
    Show {
        /// Instance id of the record
        root: String,
    },

    /// Show store status
    Status,

    /// Export the store as JSON
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Initialize a new empty store
    Init {
        /// Force initialization even if the store exists
        #[arg(short, long)]
        force: bool,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli, config: &MeaningConfig) -> Result<(), MeaningError> {
    let store_path = config.store_path(cli.store.as_deref());
    let json_mode = cli.json_mode;

    if cli.verbose {
        tracing::info!(store = %store_path.display(), "Using store");
    }

    match cli.command {
        Some(Commands::Schema { name }) => cmd_schema(&name, json_mode),
        Some(Commands::Add {
            schema,
            assignments,
        }) => cmd_add(&store_path, json_mode, &schema, &assignments),
        Some(Commands::Search {
            schema,
            assignments,
        }) => cmd_search(&store_path, json_mode, &schema, &assignments),
        Some(Commands::Show { root }) => cmd_show(&store_path, json_mode, &root),
        Some(Commands::Status) => cmd_status(&store_path, json_mode),
        Some(Commands::Export { output }) => cmd_export(&store_path, &output),
        Some(Commands::Init { force }) => cmd_init(&store_path, force),
        None => {
            // No subcommand - show status by default
            cmd_status(&store_path, json_mode)
        }
    }
}
