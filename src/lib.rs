//! Crash-safe orchestration of sequential story illustration.
//!
//! A story's pages are illustrated one by one through an external
//! image-generation backend, with two guarantees layered on top:
//!
//! - **Visual consistency.** A per-story [`VisualGuide`] (characters,
//!   settings, art style) and optional collection-wide constraints are
//!   deterministically folded into every prompt, chaining each page to a
//!   global reference sheet and to its predecessor.
//! - **Crash safety.** Every task lives in a durable SQLite-backed store;
//!   the in-memory priority queue is a rebuildable cache of its pending
//!   set. On startup the coordinator resets work stranded in flight by a
//!   dead process and re-seeds the queue, so no page stays stuck.
//!
//! The external generator is injected as an [`IllustrationGenerator`]
//! implementation; this crate never performs network I/O itself.

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod logging;

pub use config::CoordinatorConfig;
pub use db::models::PersistedIllustrationTask;
pub use db::{init_db, DbPool};
pub use engine::generator::IllustrationGenerator;
pub use engine::prompt::{
    build_global_reference_prompt, build_sequential_illustration_prompt,
    COLLECTION_CONSISTENCY_HEADER, COLLECTION_REQUIREMENTS_HEADER, GLOBAL_REFERENCE_HEADER,
    PREVIOUS_ILLUSTRATION_HEADER, TEXT_EXCLUSION_DIRECTIVE,
};
pub use engine::queue::TaskQueue;
pub use engine::types::{
    CoordinatorStats, CreateTaskInput, GeneratedIllustration, GenerationRequest,
    IllustrationTask, TaskPriority, TaskStatus, TaskStatusEvent,
};
pub use engine::visual::{
    CollectionVisualContext, PageVisualPlan, StoryPage, StoryStructure, VisualGuide,
};
pub use engine::IllustrationCoordinator;
pub use error::EngineError;
