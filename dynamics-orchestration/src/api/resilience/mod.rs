//! Configuration and retry backoff
//!
//! Provides the orchestration configuration (batch caps, slice sizes, retry
//! counts) and the backoff policy used between resubmissions.

pub mod config;
pub mod retry;

pub use config::{BatchConfig, OrchestrationConfig, OrchestrationConfigBuilder, UploadConfig};
pub use retry::{RetryConfig, RetryPolicy};
