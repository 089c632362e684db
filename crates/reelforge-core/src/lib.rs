//! Shared domain types for the media pipeline orchestrator.
//!
//! This crate contains:
//! - Task identifiers
//! - `PipelineRequest` and its nested stage option types
//! - `TaskRecord`, the durable per-task state
//! - The error taxonomy and JSON sanitation
//! - `ExecutionPlan`, the precomputed stage selection

pub mod error;
pub mod id;
pub mod plan;
pub mod record;
pub mod request;
pub mod sanitize;

pub use error::{ErrorPayload, StageError};
pub use id::TaskId;
pub use plan::ExecutionPlan;
pub use record::{ProgressEntry, Stage, Status, TaskRecord, to_iso_z};
pub use request::{FaceFusionOptions, PipelineRequest, SovitsOptions, Wav2LipOptions};
