//! Per-worker-kind endpoint configuration (`spec.md` §4.1, §6).

use crate::error::{ConfigError, ConfigResult};
use crate::sanitize::sanitize_config_value;

/// The kind of remote worker an endpoint serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerKind {
    Sovits,
    Wav2Lip,
    FaceFusion,
}

impl WorkerKind {
    pub fn name(self) -> &'static str {
        match self {
            WorkerKind::Sovits => "sovits",
            WorkerKind::Wav2Lip => "wav2lip",
            WorkerKind::FaceFusion => "facefusion",
        }
    }
}

/// Configuration for one remote worker endpoint. Construction sanitizes
/// every string field and rejects empty-after-sanitization values,
/// matching `RunPodEndpoint.__init__` in the original source.
#[derive(Debug, Clone)]
pub struct WorkerEndpointConfig {
    pub endpoint_id: String,
    pub api_key: String,
    pub base_url: String,
    pub timeout_secs: f64,
}

impl WorkerEndpointConfig {
    pub fn new(
        endpoint_id: &str,
        api_key: &str,
        base_url: &str,
        timeout_secs: f64,
    ) -> ConfigResult<Self> {
        let endpoint_id = sanitize_config_value(endpoint_id);
        let api_key = sanitize_config_value(api_key);
        let base_url = sanitize_config_value(base_url).trim_end_matches('/').to_string();

        if endpoint_id.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "endpoint_id",
            });
        }
        if api_key.is_empty() {
            return Err(ConfigError::InvalidValue { field: "api_key" });
        }
        if base_url.is_empty() {
            return Err(ConfigError::InvalidValue { field: "base_url" });
        }

        Ok(Self {
            endpoint_id,
            api_key,
            base_url,
            timeout_secs,
        })
    }

    /// Build from the three environment variables the source reads for
    /// one worker kind, returning `None` (not an error) when unconfigured
    /// — an absent triple simply disables that stage (`spec.md` §6).
    pub fn from_env(
        kind: WorkerKind,
        endpoint_var: &'static str,
        api_key_var: &'static str,
        base_url: &str,
        timeout_secs: f64,
    ) -> ConfigResult<Option<Self>> {
        let endpoint_id = std::env::var(endpoint_var).unwrap_or_default();
        let api_key = std::env::var(api_key_var).unwrap_or_default();
        if sanitize_config_value(&endpoint_id).is_empty() || sanitize_config_value(&api_key).is_empty() {
            return Ok(None);
        }
        let _ = kind;
        Self::new(&endpoint_id, &api_key, base_url, timeout_secs).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_trims_trailing_slash_from_base_url() {
        let cfg = WorkerEndpointConfig::new("ep", "key", "https://api.example.com/", 120.0).unwrap();
        assert_eq!(cfg.base_url, "https://api.example.com");
    }

    #[test]
    fn empty_after_sanitization_is_a_construction_error() {
        assert!(WorkerEndpointConfig::new("\x00\x01", "key", "https://x", 1.0).is_err());
        assert!(WorkerEndpointConfig::new("ep", "\x7f", "https://x", 1.0).is_err());
        assert!(WorkerEndpointConfig::new("ep", "key", "   ", 1.0).is_err());
    }
}
