//! Task Store: the durable cache + filesystem mirror backing task
//! records (`spec.md` §4.2).

pub mod error;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use store::TaskStore;
