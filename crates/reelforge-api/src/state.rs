//! Application state.

use reelforge_config::AppConfig;
use reelforge_engine::{EngineResult, JobManager};
use std::sync::Arc;

/// Shared application state: a single Job Manager handle, cloned cheaply
/// per request.
#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<JobManager>,
}

impl AppState {
    pub async fn connect(config: &AppConfig) -> EngineResult<Self> {
        let jobs = Arc::new(JobManager::connect(config).await?);
        Ok(Self { jobs })
    }
}
