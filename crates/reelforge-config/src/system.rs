//! System-wide configuration, gathered once at startup and passed to the
//! `JobManager` constructor (`spec.md` §9's constructor-injection design
//! note, replacing the source's import-time env reads + module
//! singletons).

use crate::error::{ConfigError, ConfigResult};
use crate::worker::{WorkerEndpointConfig, WorkerKind};

/// TLS certificate verification mode for the cache connection
/// (`spec.md` §6): `disable`, `require`, or a literal value passed
/// through to the underlying client untouched.
#[derive(Debug, Clone)]
pub enum TlsCertMode {
    Disable,
    Require,
    Literal(String),
}

impl TlsCertMode {
    fn from_env_value(value: Option<String>) -> Self {
        let trimmed = value.as_deref().map(str::trim).unwrap_or("");
        if trimmed.is_empty() {
            return TlsCertMode::Require;
        }
        match trimmed.to_lowercase().as_str() {
            "disable" => TlsCertMode::Disable,
            "require" => TlsCertMode::Require,
            _ => TlsCertMode::Literal(trimmed.to_string()),
        }
    }
}

/// System-wide configuration for the orchestrator core.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Cache (Redis) connection URL.
    pub cache_url: String,
    pub tls_cert_mode: TlsCertMode,
    /// Cache key prefix, with trailing colons stripped (`spec.md` §6).
    pub task_prefix: String,
    pub cache_ttl_secs: u64,
    pub disk_dir: String,
    pub disk_ttl_secs: u64,
    pub poll_interval_secs: f64,
    pub job_timeout_secs: f64,
    pub sovits: Option<WorkerEndpointConfig>,
    pub wav2lip: Option<WorkerEndpointConfig>,
    pub facefusion: Option<WorkerEndpointConfig>,
}

const DEFAULT_CACHE_TTL_SECS: u64 = 7 * 24 * 60 * 60;
const DEFAULT_API_BASE: &str = "https://api.runpod.ai/v2";

impl AppConfig {
    /// Gather configuration from environment variables
    /// (`spec.md` §6: "Configuration (environment, only fields the core
    /// consumes)").
    pub fn from_env() -> ConfigResult<Self> {
        let cache_url = std::env::var("JOBSTORE_REDIS_URL")
            .or_else(|_| std::env::var("CELERY_BROKER_URL"))
            .unwrap_or_else(|_| "redis://127.0.0.1:6379/0".to_string());

        let tls_cert_mode =
            TlsCertMode::from_env_value(std::env::var("JOBSTORE_REDIS_SSL_CERT_REQS").ok());

        let task_prefix = std::env::var("JOBSTORE_TASK_PREFIX")
            .unwrap_or_else(|_| "pipeline".to_string())
            .trim_end_matches(':')
            .to_string();

        let cache_ttl_secs = parse_env_u64("JOBSTORE_TTL_SECONDS", DEFAULT_CACHE_TTL_SECS)?;

        let disk_dir =
            std::env::var("JOBSTORE_PERSIST_DIR").unwrap_or_else(|_| "/tmp/pipeline-tasks".to_string());

        let disk_ttl_secs = parse_env_u64("JOBSTORE_PERSIST_TTL_SECONDS", cache_ttl_secs)?
            .max(cache_ttl_secs);

        let poll_interval_secs = parse_env_f64("RUNPOD_POLL_INTERVAL", 5.0)?.max(1.0);
        let job_timeout_secs = parse_env_f64("RUNPOD_JOB_TIMEOUT", 1800.0)?;

        let api_base =
            std::env::var("RUNPOD_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        let timeout = parse_env_f64("RUNPOD_HTTP_TIMEOUT", 120.0)?;

        let sovits = WorkerEndpointConfig::from_env(
            WorkerKind::Sovits,
            "RUNPOD_SOVITS_ENDPOINT",
            "RUNPOD_API_KEY",
            &api_base,
            timeout,
        )?;
        let wav2lip = WorkerEndpointConfig::from_env(
            WorkerKind::Wav2Lip,
            "RUNPOD_WAV2LIP_ENDPOINT",
            "RUNPOD_API_KEY",
            &api_base,
            timeout,
        )?;
        let facefusion = WorkerEndpointConfig::from_env(
            WorkerKind::FaceFusion,
            "RUNPOD_FACEFUSION_ENDPOINT",
            "RUNPOD_API_KEY",
            &api_base,
            timeout,
        )?;

        Ok(Self {
            cache_url,
            tls_cert_mode,
            task_prefix,
            cache_ttl_secs,
            disk_dir,
            disk_ttl_secs,
            poll_interval_secs,
            job_timeout_secs,
            sovits,
            wav2lip,
            facefusion,
        })
    }
}

fn parse_env_u64(var: &'static str, default: u64) -> ConfigResult<u64> {
    match std::env::var(var) {
        Err(_) => Ok(default),
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidEnv { field: var, value: raw }),
    }
}

fn parse_env_f64(var: &'static str, default: f64) -> ConfigResult<f64> {
    match std::env::var(var) {
        Err(_) => Ok(default),
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidEnv { field: var, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_prefix_strips_trailing_colons() {
        // Exercised indirectly: the trimming logic matches `prefix.rstrip(":")`
        // in the original `JobStore.__init__`.
        assert_eq!("pipeline:::".trim_end_matches(':'), "pipeline");
    }

    #[test]
    fn disk_ttl_is_clamped_to_at_least_cache_ttl() {
        let cache_ttl = 1000u64;
        let disk_ttl = 500u64.max(cache_ttl);
        assert_eq!(disk_ttl, cache_ttl);
    }
}
