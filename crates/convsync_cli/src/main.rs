//! convsync CLI
//!
//! Command-line tools for exercising the conversation engine.
//!
//! # Commands
//!
//! - `scenario` - Disclose a master/slave pair twice and print both drains
//! - `simulate` - Race concurrent disclosures against drains and verify delivery
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// convsync command-line tools.
#[derive(Parser)]
#[command(name = "convsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Disclose a master entity with one slave twice and print both drains
    Scenario {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Race concurrent disclosures against periodic drains
    Simulate {
        /// Number of disclosing threads
        #[arg(short, long, default_value = "4")]
        threads: usize,

        /// Number of shared entities
        #[arg(short, long, default_value = "100")]
        entities: usize,

        /// Disclosure rounds per thread
        #[arg(short, long, default_value = "10")]
        rounds: usize,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Scenario { format } => {
            commands::scenario::run(&format)?;
        }
        Commands::Simulate {
            threads,
            entities,
            rounds,
            format,
        } => {
            if threads == 0 {
                return Err("At least one thread is required".into());
            }
            commands::simulate::run(threads, entities, rounds, &format)?;
        }
        Commands::Version => {
            println!("convsync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
