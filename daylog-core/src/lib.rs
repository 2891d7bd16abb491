//! Daylog Core Library
//!
//! Per-day workout and nutrition logs: duplicate resolution, local drafts,
//! reconciliation with a remote record store and debounced auto-save.

pub mod cache;
pub mod dedupe;
pub mod draft;
pub mod engine;
pub mod error;
pub mod kv;
pub mod models;
pub mod navigator;
pub mod normalize;
pub mod store;

pub use cache::RecordCache;
pub use dedupe::{dedupe, superseded};
pub use draft::{Draft, DraftKey, Phase, PopulateSummary, SlotSnapshot, SlotState};
pub use engine::{
    AutoSaveScheduler, EngineConfig, FlushReason, FlushSummary, LoadOutcome, LogEditor,
    ReconciliationLoader, RetryPolicy, SaveStatus,
};
pub use error::{KvError, LoadError, RecordError, SaveError, StoreError};
pub use kv::{KeyValueStore, MemoryKv};
pub use models::{
    Category, ExerciseLog, ExerciseTemplate, LogRecord, Macros, MealItem, MealItemTemplate,
    MealTemplate, MenuType, NewLogRecord, NutritionPayload, Payload, RecordPatch, SetLog, SlotKey,
    Templates, WorkoutPayload, WorkoutType,
};
pub use navigator::{ActiveDate, DateNavigator};
pub use normalize::Completion;
pub use store::{Filter, HttpStore, MemoryStore, RecordStore, StoreStats};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
