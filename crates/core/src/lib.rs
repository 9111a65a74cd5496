//! Core types and shared functionality for waypost.
//!
//! This crate provides:
//! - Cache generation storage with SQLite backend
//! - Versioned generation naming
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod generation;

pub use cache::{CacheDb, CachedResponse, GenerationSummary};
pub use config::AppConfig;
pub use error::Error;
pub use generation::GenerationNames;
