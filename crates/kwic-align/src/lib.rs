//! # kwic-align
//!
//! **Keyword-in-context import and reconciliation for lexicographic
//! curation.**
//!
//! kwic-align ingests batches of keyword-in-context citations from XML
//! exports, aligns each batch against the already-committed citation
//! inventory with a similarity-scored, order-preserving matcher, and
//! walks a reviewer through confirming, promoting, or discarding every
//! inbound citation under an exclusive review lock.
//!
//! ## Data Flow
//!
//! 1. **Import** ([`import`]) parses an XML export into an inbound
//!    batch, numbering citations per location, and persists it.
//! 2. **Review** ([`review`]) locks the batch, loads the committed
//!    citations sharing its locations, and runs the reconciliation
//!    from `kwic_align_core`: candidate generation, greedy monotonic
//!    matching, and match classification.
//! 3. **Commit** applies the reviewer's dispositions in one guarded
//!    transaction; an emptied batch is deleted and its lock dies with
//!    it.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`db`] | SQLite connection pool with WAL mode |
//! | [`migrate`] | Database schema migrations (idempotent) |
//! | [`sqlite_store`] | SQLite-backed `ContextStore` implementation |
//! | [`import`] | XML batch import with per-location numbering |
//! | [`get`] | Committed-context lookup by keyword |
//! | [`groups`] | Group creation over committed contexts |
//! | [`batches`] | Batch listing with lock state |
//! | [`review`] | Review, commit, release, and discard commands |
//!
//! ## Configuration
//!
//! kwic-align is configured via a TOML file (default:
//! `config/kwic.toml`). See [`config`] for the available options and
//! [`config::load_config`] for validation rules.

pub mod batches;
pub mod config;
pub mod db;
pub mod get;
pub mod groups;
pub mod import;
pub mod migrate;
pub mod review;
pub mod sqlite_store;

pub use kwic_align_core::{classify, distance, group, matching, models, store};
