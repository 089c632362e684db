//! Error taxonomy for the pipeline orchestrator.
//!
//! Every stage failure and remote-job failure ultimately normalizes to an
//! [`ErrorPayload`] (`{error, detail}`), which is what lands in
//! `TaskRecord::error` and in a progress entry's `extra`. [`StageError`] is
//! the typed form threaded through the engine; it converts to
//! `ErrorPayload` at the one place the engine catches it, instead of the
//! source's raise-a-dict-then-unpack pattern.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Structured error payload as exposed in a `TaskRecord`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: String,
    pub detail: Value,
}

impl ErrorPayload {
    pub fn new(error: impl Into<String>, detail: impl Into<Value>) -> Self {
        Self {
            error: error.into(),
            detail: detail.into(),
        }
    }
}

/// A stage-level failure, tagged the way the source's exception dicts are.
///
/// Each variant corresponds to one tag in `spec.md` §7's taxonomy. `Other`
/// is the catch-all normalization target for anything that isn't one of
/// the named failure modes (mirrors `_normalise_exception` in the
/// original source).
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("remote submit failed")]
    SubmitFailed { detail: Value },
    #[error("remote status check failed")]
    StatusFailed { detail: Value },
    #[error("remote job failed")]
    JobFailed { detail: Value },
    #[error("remote job timed out")]
    JobTimeout { job_id: String, last_tag: String },
    #[error("remote job output reported an error")]
    OutputError { detail: Value },

    #[error("sovits produced no usable output")]
    NoSovitsOutput { detail: Value },
    #[error("sovits output is missing output_key")]
    MissingSovitsOutputKey { detail: Value },
    #[error("wav2lip produced no usable output")]
    NoWav2LipOutput { detail: Value },
    #[error("facefusion produced no usable output")]
    NoFaceFusionOutput { detail: Value },

    #[error("sovits worker is not configured")]
    SovitsNotConfigured,
    #[error("facefusion worker is not configured")]
    FaceFusionNotConfigured,
    #[error("wav2lip worker is not configured")]
    Wav2LipNotConfigured,

    #[error("missing reference audio")]
    MissingReferenceAudio,
    #[error("missing audio key")]
    MissingAudioKey,

    #[error("{error}: {detail}")]
    Other { error: String, detail: Value },
}

impl StageError {
    /// Normalize into the flat `{error, detail}` shape stored on a
    /// `TaskRecord`, matching `_normalise_exception` in the original
    /// source: structured variants carry their own detail verbatim,
    /// everything else gets a short descriptive detail.
    pub fn into_payload(self) -> ErrorPayload {
        match self {
            StageError::SubmitFailed { detail } => ErrorPayload::new("runpod_submit_failed", detail),
            StageError::StatusFailed { detail } => ErrorPayload::new("runpod_status_failed", detail),
            StageError::JobFailed { detail } => ErrorPayload::new("runpod_job_failed", detail),
            StageError::OutputError { detail } => ErrorPayload::new("runpod_output_error", detail),
            StageError::NoSovitsOutput { detail } => ErrorPayload::new("no_sovits_output", detail),
            StageError::MissingSovitsOutputKey { detail } => {
                ErrorPayload::new("missing_sovits_output_key", detail)
            }
            StageError::NoWav2LipOutput { detail } => ErrorPayload::new("no_wav2lip_output", detail),
            StageError::NoFaceFusionOutput { detail } => {
                ErrorPayload::new("no_facefusion_output", detail)
            }
            StageError::JobTimeout { job_id, last_tag } => ErrorPayload::new(
                "runpod_job_timeout",
                serde_json::json!({ "job_id": job_id, "status": last_tag }),
            ),
            StageError::SovitsNotConfigured => ErrorPayload::new(
                "sovits_not_configured",
                serde_json::json!("sovits worker is required for this request"),
            ),
            StageError::FaceFusionNotConfigured => ErrorPayload::new(
                "facefusion_not_configured",
                serde_json::json!("facefusion worker is required for this request"),
            ),
            StageError::Wav2LipNotConfigured => {
                ErrorPayload::new("wav2lip_not_configured", serde_json::json!("wav2lip required"))
            }
            StageError::MissingReferenceAudio => ErrorPayload::new(
                "missing_reference_audio",
                serde_json::json!("reference_audio_key or audio_key is required"),
            ),
            StageError::MissingAudioKey => ErrorPayload::new(
                "missing_audio_key",
                serde_json::json!("audio_key or audio_base64 is required"),
            ),
            StageError::Other { error, detail } => ErrorPayload::new(error, detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_error_preserves_detail_verbatim() {
        let detail = serde_json::json!({ "error": "oom" });
        let err = StageError::OutputError {
            detail: detail.clone(),
        };
        let payload = err.into_payload();
        assert_eq!(payload.error, "runpod_output_error");
        assert_eq!(payload.detail, detail);
    }

    #[test]
    fn job_timeout_carries_job_id_and_tag() {
        let err = StageError::JobTimeout {
            job_id: "job-1".into(),
            last_tag: "IN_QUEUE".into(),
        };
        let payload = err.into_payload();
        assert_eq!(payload.error, "runpod_job_timeout");
        assert_eq!(payload.detail["job_id"], "job-1");
        assert_eq!(payload.detail["status"], "IN_QUEUE");
    }
}
