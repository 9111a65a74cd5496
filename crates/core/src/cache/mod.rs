//! SQLite-backed storage for cache generations.
//!
//! This module provides a persistent cache of request/response pairs using
//! SQLite with async access via tokio-rusqlite. It supports:
//!
//! - Named generations that are created lazily and deleted wholesale
//! - Request identity keys (method + normalized URL) hashed with SHA-256
//! - Atomic batch writes and promotion for install
//! - Automatic schema migrations
//! - WAL mode for concurrent access

pub mod connection;
pub mod entries;
pub mod generations;
pub mod hash;
pub mod migrations;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::CachedResponse;
pub use generations::GenerationSummary;
