//! Shared store test infrastructure
//!
//! The same test logic runs against both SQLite and PostgreSQL:
//!
//! - **Unit tests (SQLite)**: in-memory, run with every `cargo test`
//! - **Integration tests (PostgreSQL)**: testcontainers, run with `cargo test -- --ignored`

mod activity;
mod purge;
