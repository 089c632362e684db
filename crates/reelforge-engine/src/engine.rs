//! `PipelineEngine`: runs one task's stage DAG end to end (`spec.md`
//! §4.3). Grounded on `JobManager._execute` in the original source —
//! every progress message and payload shape below is taken from there.

use reelforge_core::request::{PipelineRequest, SovitsOptions};
use reelforge_core::{ExecutionPlan, Stage, StageError, Status, TaskId, TaskRecord};
use reelforge_store::TaskStore;
use reelforge_worker::RemoteJobClient;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// One remote worker endpoint per stage. `None` means the stage is
/// unconfigured for this deployment; requests that need it fail with
/// the matching `*NotConfigured` error.
pub struct PipelineEngine {
    store: TaskStore,
    sovits: Option<Arc<RemoteJobClient>>,
    wav2lip: Option<Arc<RemoteJobClient>>,
    facefusion: Option<Arc<RemoteJobClient>>,
    poll_interval: Duration,
    job_timeout: Duration,
}

impl PipelineEngine {
    pub fn new(
        store: TaskStore,
        sovits: Option<Arc<RemoteJobClient>>,
        wav2lip: Option<Arc<RemoteJobClient>>,
        facefusion: Option<Arc<RemoteJobClient>>,
        poll_interval: Duration,
        job_timeout: Duration,
    ) -> Self {
        Self {
            store,
            sovits,
            wav2lip,
            facefusion,
            poll_interval: poll_interval.max(Duration::from_secs(1)),
            job_timeout,
        }
    }

    pub fn wav2lip_configured(&self) -> bool {
        self.wav2lip.is_some()
    }

    /// Close every configured remote job client and the task store,
    /// matching `JobManager.close`'s `wav_endpoint`/`face_endpoint`/
    /// `sovits_endpoint` teardown in the original source (`spec.md`
    /// §4.4, §5).
    pub async fn close(&self) {
        let clients = [self.sovits.as_ref(), self.wav2lip.as_ref(), self.facefusion.as_ref()];
        for client in clients.into_iter().flatten() {
            client.close();
        }
        if let Err(err) = self.store.close().await {
            error!(error = %err, "failed to close task store");
        }
    }

    /// Write the initial `queued` record before the task is spawned.
    pub async fn seed(&self, record: &TaskRecord) -> reelforge_store::StoreResult<()> {
        let mut store = self.store.clone();
        store.write(record).await
    }

    /// Fetch the current record for a task.
    pub async fn get(&self, task_id: &TaskId) -> reelforge_store::StoreResult<Option<TaskRecord>> {
        let mut store = self.store.clone();
        store.get(task_id).await
    }

    /// Run a task to completion, writing every intermediate transition to
    /// the store and finally its `completed`/`failed` record. Never
    /// returns an error itself — failures land in the record, matching
    /// `_execute`'s blanket `except Exception` (`spec.md` §4.3, §7).
    pub async fn execute(&self, task_id: TaskId, request: PipelineRequest) {
        info!(%task_id, "starting pipeline task");
        match self.run(task_id, request).await {
            Ok(result) => {
                self.update(&task_id, |record| {
                    record.status = Status::Completed;
                    record.state = Status::Completed;
                    record.stage = Stage::Completed;
                    record.result = result;
                    record.error = None;
                })
                .await;
                self.append_progress(&task_id, "Pipeline completed", Some(Stage::Completed), None)
                    .await;
            }
            Err(err) => {
                let payload = err.into_payload();
                error!(%task_id, error = %payload.error, "pipeline task failed");
                let extra = serde_json::to_value(&payload).ok();
                self.update(&task_id, |record| {
                    record.status = Status::Failed;
                    record.state = Status::Failed;
                    record.stage = Stage::Failed;
                    record.error = Some(payload.clone());
                })
                .await;
                self.append_progress(&task_id, "Pipeline failed", Some(Stage::Failed), extra)
                    .await;
            }
        }
    }

    async fn run(&self, task_id: TaskId, mut request: PipelineRequest) -> Result<Option<Value>, StageError> {
        let plan = ExecutionPlan::select(&request);
        let mut intermediate: Map<String, Value> = Map::new();
        let mut sovits_result: Option<Value> = None;

        if plan.runs_voice_stage() {
            sovits_result = Some(self.run_sovits_stage(&task_id, &mut request, &mut intermediate).await?);
        } else if request.audio_key.is_none() && request.audio_base64.is_none() {
            return Err(StageError::MissingAudioKey);
        }

        if !plan.runs_lip_sync_stage() {
            let result = match &sovits_result {
                Some(value) => Some(value.clone()),
                None => request
                    .audio_key
                    .as_ref()
                    .map(|key| serde_json::json!({ "output_key": key })),
            };
            return Ok(result);
        }

        let wav_result = self
            .run_wav2lip_stage(&task_id, &request, &mut intermediate)
            .await?;

        if !plan.runs_face_swap_stage() {
            let mut final_result = wav_result.clone();
            if request.retain_intermediate && !intermediate.is_empty() {
                merge_intermediate(&mut final_result, &intermediate);
            }
            return Ok(Some(Value::Object(final_result)));
        }

        let final_result = self
            .run_facefusion_stage(&task_id, &request, &wav_result, &intermediate)
            .await?;
        Ok(Some(final_result))
    }

    async fn run_sovits_stage(
        &self,
        task_id: &TaskId,
        request: &mut PipelineRequest,
        intermediate: &mut Map<String, Value>,
    ) -> Result<Value, StageError> {
        let client = self.sovits.as_ref().ok_or(StageError::SovitsNotConfigured)?;
        let script_text = request.script_text_trimmed().to_string();
        let voice_key = request
            .voice_reference_key()
            .map(str::to_string)
            .ok_or(StageError::MissingReferenceAudio)?;

        self.set_stage(task_id, Status::Running, Stage::Sovits).await;
        self.append_progress(task_id, "Submitting SoVITS job", Some(Stage::Sovits), None)
            .await;

        let payload = serde_json::json!({
            "reference_audio_key": voice_key,
            "target_text": script_text,
            "reference_text": "",
            "ref_text_free": true,
            "output_key": request.sovits.output_key,
            "options": sovits_options_payload(&request.sovits),
        });

        let job_id = client.submit(payload).await?;
        self.merge_detail(task_id, "sovits_job_id", Value::String(job_id.clone()))
            .await;
        self.append_progress(
            task_id,
            "SoVITS job submitted",
            Some(Stage::Sovits),
            Some(serde_json::json!({ "job_id": job_id })),
        )
        .await;

        let status = client
            .wait(&job_id, self.poll_interval, Some(self.job_timeout))
            .await?;
        let output = status
            .get("output")
            .and_then(Value::as_object)
            .cloned()
            .ok_or_else(|| StageError::NoSovitsOutput {
                detail: status.clone(),
            })?;

        let output_key = output
            .get("output_key")
            .and_then(Value::as_str)
            .ok_or_else(|| StageError::MissingSovitsOutputKey {
                detail: Value::Object(output.clone()),
            })?
            .to_string();

        if let Some(audio_base64) = output.get("audio_base64").and_then(Value::as_str) {
            request.audio_base64 = Some(audio_base64.to_string());
        }
        request.audio_key = Some(output_key);
        request.reference_audio_key = Some(voice_key);

        let result = Value::Object(output);
        intermediate.insert("sovits".to_string(), result.clone());

        self.merge_detail(task_id, "sovits_status", status).await;
        self.update(task_id, |record| {
            record.intermediate = Some(intermediate.clone());
        })
        .await;
        self.append_progress(task_id, "SoVITS completed", Some(Stage::Sovits), None)
            .await;

        Ok(result)
    }

    async fn run_wav2lip_stage(
        &self,
        task_id: &TaskId,
        request: &PipelineRequest,
        intermediate: &mut Map<String, Value>,
    ) -> Result<Map<String, Value>, StageError> {
        let client = self.wav2lip.as_ref().ok_or(StageError::Wav2LipNotConfigured)?;

        self.set_stage(task_id, Status::Running, Stage::Wav2lip).await;
        self.append_progress(task_id, "Submitting Wav2Lip job", Some(Stage::Wav2lip), None)
            .await;

        let request_value = serde_json::to_value(request).map_err(|e| StageError::Other {
            error: "request_serialize_failed".to_string(),
            detail: Value::String(e.to_string()),
        })?;

        let job_id = client.submit(request_value).await?;
        self.merge_detail(task_id, "wav2lip_job_id", Value::String(job_id.clone()))
            .await;
        self.append_progress(
            task_id,
            "Wav2Lip job submitted",
            Some(Stage::Wav2lip),
            Some(serde_json::json!({ "job_id": job_id })),
        )
        .await;

        let status = client
            .wait(&job_id, self.poll_interval, Some(self.job_timeout))
            .await?;

        let wav_result = match status.get("output") {
            Some(Value::Object(map)) => map.clone(),
            Some(Value::String(url)) => {
                let mut map = Map::new();
                map.insert("output_url".to_string(), Value::String(url.clone()));
                map
            }
            _ => {
                return Err(StageError::NoWav2LipOutput {
                    detail: status.clone(),
                })
            }
        };

        intermediate.insert("wav2lip".to_string(), Value::Object(wav_result.clone()));
        self.merge_detail(task_id, "wav2lip_status", status).await;
        self.update(task_id, |record| {
            record.intermediate = Some(intermediate.clone());
        })
        .await;
        self.append_progress(task_id, "Wav2Lip completed", Some(Stage::Wav2lip), None)
            .await;

        Ok(wav_result)
    }

    async fn run_facefusion_stage(
        &self,
        task_id: &TaskId,
        request: &PipelineRequest,
        wav_result: &Map<String, Value>,
        intermediate: &Map<String, Value>,
    ) -> Result<Value, StageError> {
        let client = self
            .facefusion
            .as_ref()
            .ok_or(StageError::FaceFusionNotConfigured)?;

        self.update(task_id, |record| record.stage = Stage::Facefusion).await;
        self.append_progress(
            task_id,
            "Submitting FaceFusion job",
            Some(Stage::Facefusion),
            None,
        )
        .await;

        let request_value = serde_json::to_value(request).map_err(|e| StageError::Other {
            error: "request_serialize_failed".to_string(),
            detail: Value::String(e.to_string()),
        })?;
        let wav2lip_field = wav_result
            .get("wav2lip")
            .cloned()
            .unwrap_or(Value::Null);
        let payload = serde_json::json!({ "request": request_value, "wav2lip": wav2lip_field });

        let job_id = client.submit(payload).await?;
        self.merge_detail(task_id, "facefusion_job_id", Value::String(job_id.clone()))
            .await;
        self.append_progress(
            task_id,
            "FaceFusion job submitted",
            Some(Stage::Facefusion),
            Some(serde_json::json!({ "job_id": job_id })),
        )
        .await;

        let status = client
            .wait(&job_id, self.poll_interval, Some(self.job_timeout))
            .await?;
        let mut output = status
            .get("output")
            .and_then(Value::as_object)
            .cloned()
            .ok_or_else(|| StageError::NoFaceFusionOutput {
                detail: status.clone(),
            })?;

        if request.retain_intermediate && !intermediate.is_empty() {
            merge_intermediate(&mut output, intermediate);
        }

        self.merge_detail(task_id, "facefusion_status", status).await;
        self.append_progress(task_id, "FaceFusion completed", Some(Stage::Facefusion), None)
            .await;

        Ok(Value::Object(output))
    }

    async fn set_stage(&self, task_id: &TaskId, status: Status, stage: Stage) {
        self.update(task_id, |record| {
            record.status = status;
            record.state = status;
            record.stage = stage;
        })
        .await;
    }

    async fn merge_detail(&self, task_id: &TaskId, key: &str, value: Value) {
        self.update(task_id, |record| {
            record.details.insert(key.to_string(), value.clone());
        })
        .await;
    }

    async fn append_progress(&self, task_id: &TaskId, message: &str, stage: Option<Stage>, extra: Option<Value>) {
        let entry = reelforge_core::ProgressEntry::new(message, stage, extra);
        self.update(task_id, move |record| record.progress.push(entry))
            .await;
    }

    /// Best-effort store update: a failure here is logged, not
    /// propagated, so an engine bug or Redis hiccup can't crash the
    /// task's own error-reporting path.
    async fn update(&self, task_id: &TaskId, mutate: impl FnOnce(&mut TaskRecord)) {
        let mut store = self.store.clone();
        if let Err(err) = store.update(task_id, mutate).await {
            error!(%task_id, error = %err, "failed to persist task record update");
        }
    }
}

/// Strip the fields the engine hoists to the top level of the SoVITS
/// payload and force `ref_text_free` regardless of what the caller sent
/// (`spec.md` §4.3, supplemented from `original_source`).
fn sovits_options_payload(options: &SovitsOptions) -> Value {
    let mut map = match serde_json::to_value(options) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    map.remove("output_key");
    map.remove("reference_text");
    map.remove("reference_text_key");
    map.insert("ref_text_free".to_string(), Value::Bool(true));
    Value::Object(map)
}

fn merge_intermediate(target: &mut Map<String, Value>, intermediate: &Map<String, Value>) {
    let entry = target
        .entry("intermediate".to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(existing) = entry {
        for (key, value) in intermediate {
            existing.insert(key.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sovits_options_payload_strips_hoisted_fields_and_forces_ref_text_free() {
        let mut options = SovitsOptions::default();
        options.output_key = Some("outputs/sovits/a.wav".to_string());
        options.reference_text = Some("hello".to_string());
        options.ref_text_free = false;

        let payload = sovits_options_payload(&options);
        let map = payload.as_object().unwrap();
        assert!(!map.contains_key("output_key"));
        assert!(!map.contains_key("reference_text"));
        assert!(!map.contains_key("reference_text_key"));
        assert_eq!(map["ref_text_free"], Value::Bool(true));
        assert_eq!(map["speed"], serde_json::json!(1.5));
    }

    #[test]
    fn merge_intermediate_creates_and_merges_into_existing_map() {
        let mut target = Map::new();
        target.insert("output_key".to_string(), Value::String("a.mp4".to_string()));

        let mut intermediate = Map::new();
        intermediate.insert("sovits".to_string(), serde_json::json!({"output_key": "a.wav"}));

        merge_intermediate(&mut target, &intermediate);
        assert_eq!(target["intermediate"]["sovits"]["output_key"], "a.wav");

        let mut more = Map::new();
        more.insert("wav2lip".to_string(), serde_json::json!({"output_url": "x"}));
        merge_intermediate(&mut target, &more);
        assert_eq!(target["intermediate"]["sovits"]["output_key"], "a.wav");
        assert_eq!(target["intermediate"]["wav2lip"]["output_url"], "x");
    }
}
