//! `RemoteJobClient`: submit/status/wait wrapper around one remote
//! worker endpoint (`spec.md` §4.1, §6).

use reelforge_config::WorkerEndpointConfig;
use reelforge_core::StageError;
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Success tags recognized in a worker's status response (`spec.md` §6).
const SUCCESS_TAGS: &[&str] = &["COMPLETED", "COMPLETED_SUCCESS", "SUCCEEDED"];
/// Terminal-failure tags (`spec.md` §6).
const FAILURE_TAGS: &[&str] = &["FAILED", "FAILED_INTERNAL", "CANCELLED", "ERROR"];

/// Submit/poll/wait client for one remote worker endpoint. Constructed
/// once per configured worker kind and shared across all tasks that use
/// it (`spec.md` §4.1, §5).
pub struct RemoteJobClient {
    endpoint_id: String,
    api_key: String,
    base_url: String,
    http: reqwest::Client,
    cancel: CancellationToken,
}

impl RemoteJobClient {
    pub fn new(config: &WorkerEndpointConfig) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs_f64(config.timeout_secs.max(1.0)))
            .build()?;
        Ok(Self {
            endpoint_id: config.endpoint_id.clone(),
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            http,
            cancel: CancellationToken::new(),
        })
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}/{}{}", self.base_url, self.endpoint_id, suffix)
    }

    /// Submit a job. Returns the remote job ID.
    pub async fn submit(&self, payload: Value) -> Result<String, StageError> {
        let body = serde_json::json!({ "input": payload });
        let response = self
            .run_cancellable(
                self.http
                    .post(self.url("/run"))
                    .bearer_auth(&self.api_key)
                    .json(&body)
                    .send(),
                "submit",
            )
            .await
            .map_err(|e| StageError::SubmitFailed {
                detail: Value::String(e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StageError::SubmitFailed {
                detail: serde_json::json!({ "status": status.as_u16(), "body": body }),
            });
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| StageError::SubmitFailed {
                detail: Value::String(e.to_string()),
            })?;

        data.get("id")
            .or_else(|| data.get("jobId"))
            .or_else(|| data.get("job_id"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(StageError::SubmitFailed { detail: data })
    }

    /// Fetch the current raw status payload for a job.
    pub async fn status(&self, job_id: &str) -> Result<Value, StageError> {
        let url = self.url(&format!("/status/{job_id}"));

        let response = self
            .run_cancellable(
                self.http.get(&url).bearer_auth(&self.api_key).send(),
                "status",
            )
            .await
            .map_err(|e| StageError::StatusFailed {
                detail: Value::String(e),
            })?;

        let response = if response.status() == reqwest::StatusCode::METHOD_NOT_ALLOWED {
            debug!(job_id, "status endpoint rejected GET, retrying with POST");
            self.run_cancellable(
                self.http
                    .post(&url)
                    .bearer_auth(&self.api_key)
                    .json(&serde_json::json!({}))
                    .send(),
                "status",
            )
            .await
            .map_err(|e| StageError::StatusFailed {
                detail: Value::String(e),
            })?
        } else {
            response
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StageError::StatusFailed {
                detail: serde_json::json!({ "status": status.as_u16(), "body": body }),
            });
        }

        response.json().await.map_err(|e| StageError::StatusFailed {
            detail: Value::String(e.to_string()),
        })
    }

    /// Poll `status` until the job reaches a terminal state, fails, or
    /// times out. Uses monotonic time so wall-clock jumps never mislead
    /// the timeout (`spec.md` §4.1).
    pub async fn wait(
        &self,
        job_id: &str,
        poll_interval: Duration,
        timeout: Option<Duration>,
    ) -> Result<Value, StageError> {
        let poll_interval = poll_interval.max(Duration::from_secs(1));
        let start = Instant::now();
        let mut last_tag = String::new();

        loop {
            let status = self.status(job_id).await?;
            let output = status.get("output");
            let tag = status
                .get("status")
                .or_else(|| status.get("state"))
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_uppercase();
            last_tag = tag.clone();

            if let Some(output_obj) = output.and_then(Value::as_object) {
                if output_obj.contains_key("error") {
                    return Err(StageError::OutputError {
                        detail: Value::Object(output_obj.clone()),
                    });
                }
            }

            if SUCCESS_TAGS.contains(&tag.as_str()) || (tag.is_empty() && output.is_some()) {
                return Ok(status);
            }

            if FAILURE_TAGS.contains(&tag.as_str()) {
                let detail = match output {
                    Some(Value::Object(obj)) => Value::Object(obj.clone()),
                    _ => status.clone(),
                };
                return Err(StageError::JobFailed { detail });
            }

            if let Some(timeout) = timeout {
                if start.elapsed() > timeout {
                    return Err(StageError::JobTimeout {
                        job_id: job_id.to_string(),
                        last_tag,
                    });
                }
            }

            if self.cancel.is_cancelled() {
                warn!(job_id, "remote job client closed while waiting");
                return Err(StageError::JobTimeout {
                    job_id: job_id.to_string(),
                    last_tag,
                });
            }

            tokio::select! {
                _ = tokio::time::sleep(poll_interval) => {}
                _ = self.cancel.cancelled() => {
                    return Err(StageError::JobTimeout { job_id: job_id.to_string(), last_tag });
                }
            }
        }
    }

    /// Run a future, aborting early if the client has been closed. The
    /// error type is collapsed to `String` here since callers only ever
    /// wrap it back into a `StageError` detail.
    async fn run_cancellable<T>(
        &self,
        fut: impl std::future::Future<Output = reqwest::Result<T>>,
        op: &str,
    ) -> Result<T, String> {
        tokio::select! {
            res = fut => res.map_err(|e| e.to_string()),
            _ = self.cancel.cancelled() => Err(format!("client closed during {op}")),
        }
    }

    /// Close the client: in-flight and future requests observe
    /// cancellation (`spec.md` §4.1, §5).
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> WorkerEndpointConfig {
        WorkerEndpointConfig::new("ep-1", "key-1", "https://api.example.com/v2", 5.0).unwrap()
    }

    #[tokio::test]
    async fn close_marks_the_client_cancelled() {
        let client = RemoteJobClient::new(&config()).unwrap();
        assert!(!client.cancel.is_cancelled());
        client.close();
        assert!(client.cancel.is_cancelled());
    }

    #[test]
    fn url_joins_base_endpoint_and_suffix() {
        let client = RemoteJobClient::new(&config()).unwrap();
        assert_eq!(client.url("/run"), "https://api.example.com/v2/ep-1/run");
    }

    fn client_for(server: &wiremock::MockServer) -> RemoteJobClient {
        let config = WorkerEndpointConfig::new("ep-1", "key-1", &server.uri(), 5.0).unwrap();
        RemoteJobClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn submit_extracts_job_id_from_response() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ep-1/run"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "job-42" })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let job_id = client.submit(serde_json::json!({ "text": "hi" })).await.unwrap();
        assert_eq!(job_id, "job-42");
    }

    #[tokio::test]
    async fn status_falls_back_to_post_on_method_not_allowed() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ep-1/status/job-1"))
            .respond_with(ResponseTemplate::new(405))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/ep-1/status/job-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "status": "IN_QUEUE" })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let status = client.status("job-1").await.unwrap();
        assert_eq!(status["status"], "IN_QUEUE");
    }

    #[tokio::test]
    async fn wait_returns_output_on_success_tag() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ep-1/status/job-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "COMPLETED",
                "output": { "output_key": "outputs/a.wav" },
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let result = client
            .wait("job-2", Duration::from_millis(10), Some(Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(result["output"]["output_key"], "outputs/a.wav");
    }

    #[tokio::test]
    async fn wait_prefers_output_error_over_failure_tag() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ep-1/status/job-3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "FAILED",
                "output": { "error": "oom" },
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .wait("job-3", Duration::from_millis(10), Some(Duration::from_secs(5)))
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::OutputError { .. }));
    }

    #[tokio::test]
    async fn wait_maps_failure_tag_to_job_failed() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ep-1/status/job-3b"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "FAILED",
                "output": { "message": "worker crashed" },
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .wait("job-3b", Duration::from_millis(10), Some(Duration::from_secs(5)))
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::JobFailed { .. }));
    }

    #[tokio::test]
    async fn wait_times_out_when_job_stays_in_queue() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ep-1/status/job-4"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "status": "IN_QUEUE" })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .wait("job-4", Duration::from_millis(10), Some(Duration::from_millis(50)))
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::JobTimeout { .. }));
    }
}
