//! Pipeline Engine and Job Manager: runs the voice/lip-sync/face-swap
//! stage DAG and tracks in-flight tasks (`spec.md` §4.3, §4.4).

pub mod engine;
pub mod error;
pub mod manager;

pub use engine::PipelineEngine;
pub use error::{EngineError, EngineResult, WaitError};
pub use manager::JobManager;
