//! Loading, editing and auto-saving of per-day logs.

mod config;
mod editor;
mod loader;
mod scheduler;
mod session;

pub use config::{EngineConfig, RetryPolicy};
pub use editor::LogEditor;
pub use loader::{LoadOutcome, ReconciliationLoader};
pub use scheduler::{AutoSaveScheduler, FlushReason, FlushSummary, SaveStatus};
