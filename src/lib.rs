//! One-shot retention purge for time-partitioned activity tables.
//!
//! On host start, [`retention::start_auto_purge`] schedules a single
//! background run that removes rows older than the configured retention
//! window, coordinating with the ingestion consumer ([`ingest`]) through the
//! shared state in [`maintenance`].

pub mod config;
pub mod db;
pub mod ingest;
pub mod maintenance;
pub mod models;
pub mod notice;
pub mod observability;
pub mod retention;
