//! Submits batch plans through the request adapter

use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Instant;

use super::collection::BatchPlanCollection;
use super::plan::BatchPlan;
use super::response::{BatchResponse, BatchResponseCollection};
use crate::api::constants::BATCH_ENDPOINT;
use crate::api::request::RequestAdapter;
use crate::api::resilience::BatchConfig;
use crate::error::{OrchestrationError, Result};

/// Executes batch plans one round trip at a time
///
/// Plans of a collection run strictly in order. Partial failure is reported in
/// the returned responses, not as an error.
#[derive(Clone)]
pub struct BatchExecutor {
    adapter: Arc<dyn RequestAdapter>,
    endpoint: String,
}

impl BatchExecutor {
    pub fn new(adapter: Arc<dyn RequestAdapter>) -> Self {
        Self {
            adapter,
            endpoint: BATCH_ENDPOINT.to_string(),
        }
    }

    pub fn from_config(adapter: Arc<dyn RequestAdapter>, config: &BatchConfig) -> Self {
        Self {
            adapter,
            endpoint: config.endpoint.clone(),
        }
    }

    /// Post to a different batch endpoint (absolute, or relative to the adapter's base URL)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one plan and decode the per-step results
    pub async fn execute_plan(&self, plan: &BatchPlan) -> Result<BatchResponse> {
        if plan.is_empty() {
            return Err(OrchestrationError::invalid_argument(
                "cannot execute an empty batch plan",
            ));
        }

        let start = Instant::now();
        let request = plan.to_request(&self.endpoint)?;
        debug!("Submitting batch of {} steps to {}", plan.len(), self.endpoint);

        let raw = self.adapter.send(request).await?;
        let response = BatchResponse::from_raw(raw)?;

        let failed = response.failed_ids();
        if failed.is_empty() {
            info!(
                "Batch of {} steps succeeded in {}ms",
                plan.len(),
                start.elapsed().as_millis()
            );
        } else {
            warn!(
                "Batch of {} steps finished with {} failed: {}",
                plan.len(),
                failed.len(),
                failed.join(", ")
            );
        }

        Ok(response)
    }

    /// Finalize the collection and execute its plans in order
    pub async fn execute_collection(
        &self,
        collection: &mut BatchPlanCollection,
    ) -> Result<BatchResponseCollection> {
        let plans = collection.finalize_for_execution();
        let total = plans.len();
        let mut responses = BatchResponseCollection::new();

        for (idx, plan) in plans.iter().enumerate() {
            debug!("Executing batch plan {}/{}", idx + 1, total);
            responses.push(self.execute_plan(plan).await?);
        }

        Ok(responses)
    }

    /// Resubmit the failed steps of `plan`; `None` when nothing failed
    pub async fn retry_failed(
        &self,
        plan: &BatchPlan,
        response: &BatchResponse,
    ) -> Result<Option<BatchResponse>> {
        let retry = plan.build_retry_plan(&response.status_codes());
        if retry.is_empty() {
            return Ok(None);
        }
        info!("Retrying {} failed batch steps", retry.len());
        self.execute_plan(&retry).await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::batch::RequestStep;
    use crate::api::request::RequestInformation;
    use crate::api::request::mock::MockAdapter;
    use serde_json::{Value, json};

    fn plan_with(ids: &[&str]) -> BatchPlan {
        let mut plan = BatchPlan::new();
        for id in ids {
            let request = RequestInformation::get(format!("https://graph.microsoft.com/v1.0/users/{}", id));
            plan.add_step(RequestStep::new(*id, request).unwrap()).unwrap();
        }
        plan
    }

    fn statuses(pairs: &[(&str, u16)]) -> Value {
        json!({
            "responses": pairs
                .iter()
                .map(|(id, status)| json!({"id": id, "status": status}))
                .collect::<Vec<_>>()
        })
    }

    #[tokio::test]
    async fn test_execute_plan_posts_payload() {
        let adapter = Arc::new(MockAdapter::new().respond_json(200, statuses(&[("1", 200), ("2", 404)])));
        let executor = BatchExecutor::new(adapter.clone()).with_endpoint("https://graph.microsoft.com/v1.0/$batch");
        let plan = plan_with(&["1", "2"]);

        let response = executor.execute_plan(&plan).await.unwrap();
        assert_eq!(response.failed_ids(), vec!["2"]);

        let requests = adapter.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, reqwest::Method::POST);
        assert_eq!(requests[0].url, "https://graph.microsoft.com/v1.0/$batch");
        let body: Value = serde_json::from_slice(requests[0].body.as_ref().unwrap()).unwrap();
        assert_eq!(body["requests"][1]["url"], "/users/2");
    }

    #[tokio::test]
    async fn test_execute_empty_plan_is_rejected() {
        let adapter = Arc::new(MockAdapter::new());
        let executor = BatchExecutor::new(adapter.clone());

        let err = executor.execute_plan(&BatchPlan::new()).await.unwrap_err();
        assert!(matches!(err, OrchestrationError::InvalidArgument(_)));
        assert_eq!(adapter.request_count(), 0);
    }

    #[tokio::test]
    async fn test_execute_collection_runs_plans_in_order() {
        let adapter = Arc::new(
            MockAdapter::new()
                .respond_json(200, statuses(&[("0", 200), ("1", 200)]))
                .respond_json(200, statuses(&[("2", 503)])),
        );
        let executor = BatchExecutor::from_config(adapter.clone(), &BatchConfig::default());

        let mut collection = BatchPlanCollection::with_capacity(2).unwrap();
        for i in 0..3 {
            let request = RequestInformation::get(format!("/users/{}", i));
            collection.add_step(RequestStep::new(i.to_string(), request).unwrap()).unwrap();
        }

        let responses = executor.execute_collection(&mut collection).await.unwrap();
        assert!(collection.is_finalized());
        assert_eq!(responses.len(), 2);
        assert_eq!(responses.failed_ids(), vec!["2"]);

        let requests = adapter.requests();
        let first: Value = serde_json::from_slice(requests[0].body.as_ref().unwrap()).unwrap();
        let second: Value = serde_json::from_slice(requests[1].body.as_ref().unwrap()).unwrap();
        assert_eq!(first["requests"].as_array().unwrap().len(), 2);
        assert_eq!(second["requests"][0]["id"], "2");
        assert_eq!(requests[0].url, "$batch");
    }

    #[tokio::test]
    async fn test_retry_failed_resubmits_only_failures() {
        let adapter = Arc::new(MockAdapter::new().respond_json(200, statuses(&[("2", 200)])));
        let executor = BatchExecutor::new(adapter.clone());
        let plan = plan_with(&["1", "2"]);
        let first = BatchResponse::from_raw(crate::api::request::RawResponse::json(
            200,
            &statuses(&[("1", 200), ("2", 500)]),
        ))
        .unwrap();

        let retried = executor.retry_failed(&plan, &first).await.unwrap().unwrap();
        assert!(retried.is_success());

        let body: Value = serde_json::from_slice(adapter.requests()[0].body.as_ref().unwrap()).unwrap();
        let ids: Vec<&str> = body["requests"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["2"]);

        let all_good = BatchResponse::from_raw(crate::api::request::RawResponse::json(
            200,
            &statuses(&[("1", 200), ("2", 201)]),
        ))
        .unwrap();
        assert!(executor.retry_failed(&plan, &all_good).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let adapter = Arc::new(MockAdapter::new().fail("connection refused"));
        let executor = BatchExecutor::new(adapter);

        let err = executor.execute_plan(&plan_with(&["1"])).await.unwrap_err();
        assert!(matches!(err, OrchestrationError::Transport(_)));
    }
}
