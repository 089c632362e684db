//! Construction-time errors for the engine, distinct from the per-task
//! [`reelforge_core::StageError`] taxonomy that `PipelineEngine::execute`
//! normalizes into a `TaskRecord`'s `error` field.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to build remote job client: {0}")]
    ClientBuild(#[from] reqwest::Error),

    #[error("task store error: {0}")]
    Store(#[from] reelforge_store::StoreError),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Outcome of polling a task to completion (`JobManager::wait_for_completion`).
#[derive(Debug, Error)]
pub enum WaitError {
    #[error("task not found")]
    NotFound,
    #[error("timed out waiting for task completion")]
    Timeout,
    #[error("task store error: {0}")]
    Store(#[from] reelforge_store::StoreError),
}

