// SPDX-License-Identifier: MIT OR Apache-2.0
//! gate-store
//!
//! Single-writer embedded `SQLite` store backing approval records, budget
//! state, and replay-protection entries (SPEC_FULL §5 implementation note).
//! Schema and SQL are owned by the consuming crate (`gate-approval`,
//! `gate-budget`, `gate-replay`); this crate only manages the connection
//! lifecycle: one dedicated writer thread reached through a bounded `mpsc`
//! channel, and a round-robin pool of read-only connections.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod store;

pub use config::{JournalMode, SqliteStoreConfig, SyncMode};
pub use store::SqliteStore;
