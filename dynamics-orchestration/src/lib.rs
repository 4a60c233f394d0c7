//! Batch, chunked upload and paging orchestration for OData-style Web APIs

pub mod api;
pub mod cli;
pub mod error;

pub use error::{OrchestrationError, Result};
