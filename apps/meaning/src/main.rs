//! # Meaning - Schema Explorer
//!
//! The main binary for the Meaning schema and value store.
//!
//! ## Usage
//!
//! ```bash
//! meaning init
//! meaning schema EmployeeContractContext
//! meaning add PersonContext PersonNameContext.FirstName=Marc PersonNameContext.LastName=Clifton
//! meaning search PersonNameContext LastName=Clifton
//! meaning show 6f9619ff-8b86-d011-b42d-00cf4fc964ff
//! meaning export -o store.json
//! ```

use clap::Parser;
use meaning::cli;
use meaning::config::MeaningConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // Parse CLI arguments
    let cli = cli::Cli::parse();

    let config = match MeaningConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    // MEANING_LOG_FORMAT=json (or log_format = "json") enables machine-parseable output.
    let json_logs = match std::env::var("MEANING_LOG_FORMAT") {
        Ok(format) => format == "json",
        Err(_) => config.json_logs(),
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "meaning=info,meaning_core=info".into());

    if json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    // Display startup banner
    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    // Execute command
    if let Err(e) = cli::execute(cli, &config) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Meaning startup banner.
fn print_banner() {
    println!(
        r#"
  Meaning v{}
  Schemas as composed kinds, records as shared trees
"#,
        env!("CARGO_PKG_VERSION")
    );
}
