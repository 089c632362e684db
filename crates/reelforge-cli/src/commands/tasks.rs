//! `submit` / `status` / `wait` subcommands, talking to the API server's
//! HTTP surface (`spec.md` §6's CLI surface).

use anyhow::{Context, Result};
use serde_json::Value;

pub async fn submit(api_url: &str, request_path: &str) -> Result<()> {
    let body = std::fs::read_to_string(request_path)
        .with_context(|| format!("failed to read request file: {}", request_path))?;
    let request: Value = serde_json::from_str(&body)
        .with_context(|| format!("{} is not valid JSON", request_path))?;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/api/v1/tasks", api_url))
        .json(&request)
        .send()
        .await
        .context("failed to reach the API server")?;

    print_response(response).await
}

pub async fn status(api_url: &str, task_id: &str) -> Result<()> {
    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/api/v1/tasks/{}", api_url, task_id))
        .send()
        .await
        .context("failed to reach the API server")?;

    print_response(response).await
}

pub async fn wait(api_url: &str, task_id: &str, timeout_secs: Option<f64>) -> Result<()> {
    let client = reqwest::Client::new();
    let mut request = client.get(format!("{}/api/v1/tasks/{}/wait", api_url, task_id));
    if let Some(timeout_secs) = timeout_secs {
        request = request.query(&[("timeout_secs", timeout_secs)]);
    }

    let response = request.send().await.context("failed to reach the API server")?;
    print_response(response).await
}

async fn print_response(response: reqwest::Response) -> Result<()> {
    let status = response.status();
    let body: Value = response
        .json()
        .await
        .context("response body was not valid JSON")?;

    println!("{}", serde_json::to_string_pretty(&body)?);
    if !status.is_success() {
        anyhow::bail!("request failed with status {}", status);
    }
    Ok(())
}
