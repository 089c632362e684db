//! Remote Job Client: submit/poll/wait against one configured worker
//! endpoint (`spec.md` §4.1).

pub mod client;

pub use client::RemoteJobClient;
