//! Ward core library
//!
//! An offline-first clinical records cache: an embedded SQLite store that is
//! kept consistent with a remote chart server by an incremental/diff-merge
//! sync engine, plus localized read projections for chart display.
//!
//! The main pieces:
//! - [`store::CacheStore`]: transactional cache with change notification
//! - [`sync::Orchestrator`]: runs the phases of a sync cycle
//! - [`sync::SyncScheduler`]: background task, one cycle at a time
//! - [`projection`]: localized chart queries over committed state
//! - [`net::RestClient`]: the chart server REST API

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod net;
pub mod projection;
pub mod store;
pub mod sync;

pub use config::ServerConfig;
pub use error::{Error, Result};
