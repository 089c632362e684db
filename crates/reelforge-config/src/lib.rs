//! Environment-sourced configuration for the media pipeline orchestrator.

pub mod error;
pub mod sanitize;
pub mod system;
pub mod worker;

pub use error::{ConfigError, ConfigResult};
pub use sanitize::sanitize_config_value;
pub use system::{AppConfig, TlsCertMode};
pub use worker::{WorkerEndpointConfig, WorkerKind};
