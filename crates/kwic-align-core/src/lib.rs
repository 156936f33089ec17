//! # kwic-align Core
//!
//! Shared logic for kwic-align: citation data models, the similarity
//! metric, candidate generation and monotonic matching, match
//! classification, the review-lock state machine, and the store
//! abstraction.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or other
//! native-only dependencies. Everything here is deterministic and
//! safely callable concurrently for independent batches.

pub mod classify;
pub mod distance;
pub mod group;
pub mod matching;
pub mod models;
pub mod review;
pub mod store;
