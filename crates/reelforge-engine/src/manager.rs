//! `JobManager`: submits tasks, tracks their running handles, and serves
//! reads/waits against the store (`spec.md` §4.4). Tasks are spawned
//! immediately on submit and tracked in a live handle set, pruned as
//! they finish.

use crate::engine::PipelineEngine;
use crate::error::{EngineError, EngineResult, WaitError};
use reelforge_config::AppConfig;
use reelforge_core::{ExecutionPlan, PipelineRequest, StageError, TaskId, TaskRecord};
use reelforge_store::TaskStore;
use reelforge_worker::RemoteJobClient;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub struct JobManager {
    engine: Arc<PipelineEngine>,
    tasks: Mutex<HashMap<TaskId, JoinHandle<()>>>,
    poll_interval: Duration,
}

impl JobManager {
    /// Build a job manager from environment-sourced configuration:
    /// connects the task store and constructs one remote job client per
    /// configured worker endpoint (`spec.md` §6).
    pub async fn connect(config: &AppConfig) -> EngineResult<Self> {
        let store = TaskStore::connect(
            &config.cache_url,
            &config.tls_cert_mode,
            &config.task_prefix,
            config.cache_ttl_secs,
            Some(Path::new(&config.disk_dir)),
            config.disk_ttl_secs,
        )
        .await?;

        let sovits = build_client(config.sovits.as_ref())?;
        let wav2lip = build_client(config.wav2lip.as_ref())?;
        let facefusion = build_client(config.facefusion.as_ref())?;

        let poll_interval = Duration::from_secs_f64(config.poll_interval_secs);
        let job_timeout = Duration::from_secs_f64(config.job_timeout_secs);

        let engine = Arc::new(PipelineEngine::new(
            store,
            sovits,
            wav2lip,
            facefusion,
            poll_interval,
            job_timeout,
        ));

        Ok(Self {
            engine,
            tasks: Mutex::new(HashMap::new()),
            poll_interval,
        })
    }

    /// Validate the request, write its initial `queued` record, and
    /// spawn its execution as an independent logical thread
    /// (`spec.md` §5, §4.4). Mirrors `JobManager.submit`'s
    /// `wav2lip_not_configured` pre-check.
    pub async fn submit(&self, request: PipelineRequest) -> Result<TaskId, StageError> {
        let plan = ExecutionPlan::select(&request);
        if plan.runs_lip_sync_stage() && !self.engine.wav2lip_configured() {
            return Err(StageError::Wav2LipNotConfigured);
        }

        let task_id = TaskId::new();
        let record = TaskRecord::queued(task_id, request.clone());
        self.engine.seed(&record).await.map_err(|err| StageError::Other {
            error: "task_store_write_failed".to_string(),
            detail: serde_json::Value::String(err.to_string()),
        })?;

        let engine = Arc::clone(&self.engine);
        let handle = tokio::spawn(async move {
            engine.execute(task_id, request).await;
        });

        self.reap_finished();
        self.tasks.lock().unwrap().insert(task_id, handle);
        info!(%task_id, "submitted pipeline task");

        Ok(task_id)
    }

    /// Fetch the current record for a task.
    pub async fn get_task(&self, task_id: TaskId) -> Result<Option<TaskRecord>, WaitError> {
        Ok(self.engine.get(&task_id).await?)
    }

    /// Poll until the task reaches a terminal status or `timeout`
    /// elapses, matching `wait_for_completion` in the original source.
    pub async fn wait_for_completion(
        &self,
        task_id: TaskId,
        timeout: Option<Duration>,
    ) -> Result<TaskRecord, WaitError> {
        let poll = self.poll_interval.max(Duration::from_secs(1));
        let start = std::time::Instant::now();

        loop {
            let record = self.engine.get(&task_id).await?.ok_or(WaitError::NotFound)?;
            if record.status.is_terminal() {
                return Ok(record);
            }
            if let Some(timeout) = timeout {
                if start.elapsed() > timeout {
                    return Err(WaitError::Timeout);
                }
            }
            tokio::time::sleep(poll).await;
        }
    }

    /// Abort every in-flight task, then close the remote job clients and
    /// the task store. Remote jobs already submitted are not cancelled
    /// server-side; they're simply abandoned, matching the source's
    /// `task.cancel()` loop in `JobManager.close` (`spec.md` §5's
    /// cancellation semantics) — but in-flight HTTP calls now observe
    /// cancellation instead of running to completion unattended.
    pub async fn close(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut tasks = self.tasks.lock().unwrap();
            tasks.drain().map(|(_, handle)| handle).collect()
        };
        for handle in handles {
            handle.abort();
        }
        self.engine.close().await;
    }

    fn reap_finished(&self) {
        let mut tasks = self.tasks.lock().unwrap();
        tasks.retain(|task_id, handle| {
            let finished = handle.is_finished();
            if finished {
                debug!(%task_id, "pruning finished task handle");
            }
            !finished
        });
    }
}

fn build_client(
    config: Option<&reelforge_config::WorkerEndpointConfig>,
) -> EngineResult<Option<Arc<RemoteJobClient>>> {
    match config {
        Some(config) => Ok(Some(Arc::new(RemoteJobClient::new(config)?))),
        None => Ok(None),
    }
}
