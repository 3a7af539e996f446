//! Helpers shared by the connectors.

pub mod retry;

pub use retry::{RetryConfig, retry, retry_with_backoff};
