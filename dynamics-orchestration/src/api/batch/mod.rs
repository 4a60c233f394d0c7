//! JSON batching
//!
//! Requests are collected into [`BatchPlan`]s of at most 20 steps (the service
//! limit), optionally ordered with `dependsOn`. A [`BatchPlanCollection`]
//! spreads any number of requests over as many plans as needed, and the
//! [`BatchExecutor`] submits them and can resubmit the steps that failed.

pub mod collection;
pub mod executor;
pub mod plan;
pub mod response;
pub mod step;

pub use collection::BatchPlanCollection;
pub use executor::BatchExecutor;
pub use plan::{BatchPlan, is_success_status};
pub use response::{BatchResponse, BatchResponseCollection, BatchStepResponse};
pub use step::RequestStep;
