//! Synchronization core
//!
//! The engine orchestrates a run over two platform adapters; the mapper and
//! matcher are its pure helpers, and the run log records the outcome.

pub mod engine;
pub mod mapper;
pub mod matcher;
pub mod run_log;

pub use engine::SyncEngine;
pub use mapper::apply_mappings;
pub use matcher::{find_match, TargetEntry, SYNC_EXTERNAL_ID_FIELD};
pub use run_log::{ErrorDetails, RunStatus, SyncRunLog, SyncSummary, TaskFailure};
