//! HTTP façade over the Job Manager: submit/get/wait endpoints only
//! (`spec.md` §6's "HTTP API" ambient surface). Auth, billing, and
//! webhooks are explicitly out of scope.

pub mod error;
pub mod routes;
pub mod state;

pub use state::AppState;
