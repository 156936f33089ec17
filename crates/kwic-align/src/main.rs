//! # kwic-align CLI (`kwic`)
//!
//! The `kwic` binary drives the import-and-review workflow for
//! keyword-in-context citations.
//!
//! ## Usage
//!
//! ```bash
//! kwic --config ./config/kwic.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `kwic init` | Create the SQLite database and run schema migrations |
//! | `kwic import <file>` | Parse a context XML export into a new inbound batch |
//! | `kwic batches` | List inbound batches with their lock state |
//! | `kwic get <keyword>` | Print committed contexts for a keyword |
//! | `kwic group <location> <number>...` | Bundle committed citations into a group |
//! | `kwic review <batch>` | Lock a batch and show the proposed matching |
//! | `kwic commit <batch>` | Apply the matching under the held lock |
//! | `kwic release <batch>` | Give up a review lock without committing |
//! | `kwic discard <batch>` | Delete a batch without committing anything |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! kwic init --config ./config/kwic.toml
//!
//! # Import an XML export
//! kwic import exports/psalter.xml --user alice
//!
//! # Review and commit a batch
//! kwic review 3f2a... --user alice
//! kwic commit 3f2a... --user alice
//!
//! # Drop unmatched citations instead of promoting them
//! kwic commit 3f2a... --user alice --discard-unmatched
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use kwic_align::{batches, config, get, groups, import, migrate, review};

/// kwic-align CLI — keyword-in-context import and reconciliation for
/// lexicographic curation.
///
/// All commands accept a `--config` flag pointing to a TOML
/// configuration file. See `config/kwic.example.toml` for a full
/// example.
#[derive(Parser)]
#[command(
    name = "kwic",
    about = "kwic-align — keyword-in-context import and reconciliation for lexicographic curation",
    version,
    long_about = "kwic-align ingests batches of keyword-in-context citations from XML exports, \
    aligns each batch against the committed citation inventory with a similarity-scored, \
    order-preserving matcher, and applies the reviewer's decisions under an exclusive review lock."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/kwic.toml")]
    config: PathBuf,

    /// Reviewer name recorded on imports and review locks.
    #[arg(long, global = true, default_value = "local")]
    user: String,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables.
    /// This command is idempotent — running it multiple times is safe.
    Init,

    /// Import a context XML export as a new inbound batch.
    ///
    /// Citations are numbered per location in document order; the
    /// batch is left unlocked, ready for review.
    Import {
        /// Path to the XML export.
        file: PathBuf,
    },

    /// List inbound batches with their lock state.
    Batches {
        /// Print the batch list as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print committed contexts for a keyword.
    Get {
        /// Keyword to look up.
        keyword: String,
    },

    /// Bundle committed citations at one location into a group.
    ///
    /// Members are listed by their citation numbers, in the order the
    /// group should read. Confirming onto a member later recomputes
    /// the group's derived fields.
    Group {
        /// Location whose citations are being grouped.
        location: String,

        /// Citation numbers of the members, in group order.
        #[arg(required = true)]
        numbers: Vec<i64>,
    },

    /// Lock a batch and show the proposed matching.
    ///
    /// Acquiring is re-entrant for the same user and reclaims locks
    /// held past the configured staleness threshold.
    Review {
        /// Batch id (as shown by `kwic batches`).
        batch: String,
    },

    /// Apply the matching for a batch under the held lock.
    ///
    /// Matched citations update their committed counterparts;
    /// unmatched citations are promoted to new committed contexts
    /// unless `--discard-unmatched` is given. A fully reviewed batch
    /// is deleted.
    Commit {
        /// Batch id.
        batch: String,

        /// Drop unmatched inbound citations instead of promoting them.
        #[arg(long)]
        discard_unmatched: bool,
    },

    /// Give up a review lock without committing.
    Release {
        /// Batch id.
        batch: String,
    },

    /// Delete a batch and its citations without committing anything.
    Discard {
        /// Batch id.
        batch: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Import { file } => {
            import::run_import(&cfg, &file, &cli.user).await?;
        }
        Commands::Batches { json } => {
            batches::run_batches(&cfg, json).await?;
        }
        Commands::Get { keyword } => {
            get::run_get(&cfg, &keyword).await?;
        }
        Commands::Group { location, numbers } => {
            groups::run_group(&cfg, &location, &numbers).await?;
        }
        Commands::Review { batch } => {
            review::run_review(&cfg, &batch, &cli.user).await?;
        }
        Commands::Commit {
            batch,
            discard_unmatched,
        } => {
            review::run_commit(&cfg, &batch, &cli.user, discard_unmatched).await?;
        }
        Commands::Release { batch } => {
            review::run_release(&cfg, &batch, &cli.user).await?;
        }
        Commands::Discard { batch } => {
            review::run_discard(&cfg, &batch).await?;
        }
    }

    Ok(())
}
