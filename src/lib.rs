//! taskbridge - Cross-Platform Task Synchronization
//!
//! taskbridge reconciles tasks between a user's lists on two independent
//! task-management platforms (ClickUp and Monday.com) according to a stored
//! Sync Configuration, and records each run in a structured Sync Run Log.
//!
//! # Architecture
//!
//! - **task**: the Common Task Format, the canonical pivot representation
//! - **platforms**: adapters wrapping each platform's API behind one trait
//! - **config**: Sync Configuration (pairing, mappings, schedule)
//! - **sync**: the engine, its mapper/matcher helpers, and the run log
//! - **retry**: caller-level backoff wrapper around whole runs
//! - **logging**: tracing subscriber setup

pub mod config;
pub mod error;
pub mod logging;
pub mod platforms;
pub mod retry;
pub mod sync;
pub mod task;

// Re-exports
pub use error::{PlatformRequestError, RequestErrorKind, Result, TaskBridgeError};
