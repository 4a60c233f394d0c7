//! Size-bounded, dependency-checked batch of requests
//!
//! A [`BatchPlan`] is the content of one JSON batch round trip. It keeps its
//! steps in insertion order, refuses to grow past its cap, and only accepts
//! dependencies on steps it already contains.

use log::debug;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use url::Url;

use super::step::RequestStep;
use crate::api::constants::{MAX_BATCH_STEPS, MIN_BATCH_STEPS, VERSION_PREFIX_LEN};
use crate::api::request::{
    BINARY_CONTENT_TYPE, CONTENT_TYPE_HEADER, JSON_CONTENT_TYPE, RequestInformation,
};
use crate::error::{OrchestrationError, Result};

const AUTHORIZATION_HEADER: &str = "authorization";

/// Whether an HTTP status counts as success for retry purposes
pub fn is_success_status(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Insertion-ordered set of request steps sent as one batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchPlan {
    steps: Vec<RequestStep>,
    max_steps: usize,
}

/// Wire payload: `{"requests": [...]}`
#[derive(Debug, Serialize)]
struct BatchRequestBody<'a> {
    requests: Vec<BatchRequestItem<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchRequestItem<'a> {
    id: &'a str,
    url: String,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    depends_on: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    headers: Option<BTreeMap<&'a str, &'a str>>,
}

impl Default for BatchPlan {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchPlan {
    /// Empty plan with the protocol cap of 20 steps
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            max_steps: MAX_BATCH_STEPS,
        }
    }

    /// Empty plan with a lower cap (between 2 and 20)
    pub fn with_capacity(max_steps: usize) -> Result<Self> {
        if !(MIN_BATCH_STEPS..=MAX_BATCH_STEPS).contains(&max_steps) {
            return Err(OrchestrationError::invalid_argument(format!(
                "batch capacity must be between {} and {}, got {}",
                MIN_BATCH_STEPS, MAX_BATCH_STEPS, max_steps
            )));
        }
        Ok(Self {
            steps: Vec::new(),
            max_steps,
        })
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.steps.len() >= self.max_steps
    }

    pub fn steps(&self) -> &[RequestStep] {
        &self.steps
    }

    pub fn step(&self, id: &str) -> Option<&RequestStep> {
        self.steps.iter().find(|step| step.id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.step(id).is_some()
    }

    /// Add a step, returning `false` if a step with the same id already exists
    ///
    /// # Errors
    /// - [`OrchestrationError::CapacityExceeded`] when the plan is full
    /// - [`OrchestrationError::InvalidDependency`] when a dependency is not in the plan
    pub fn add_step(&mut self, step: RequestStep) -> Result<bool> {
        if self.contains(step.id()) {
            return Ok(false);
        }
        if self.is_full() {
            return Err(OrchestrationError::CapacityExceeded {
                capacity: self.max_steps,
            });
        }
        if let Some(missing) = step.depends_on().iter().find(|dep| !self.contains(dep)) {
            return Err(OrchestrationError::InvalidDependency {
                step_id: step.id().to_string(),
                dependency_id: missing.clone(),
            });
        }

        self.steps.push(step);
        Ok(true)
    }

    /// Add a request under a generated id and return that id
    pub fn add_request(&mut self, request: RequestInformation) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        self.add_step(RequestStep::new(id.clone(), request)?)?;
        Ok(id)
    }

    /// Remove a step and strip its id from every remaining dependency list
    pub fn remove_step(&mut self, id: &str) -> Result<bool> {
        if id.trim().is_empty() {
            return Err(OrchestrationError::invalid_argument("step id cannot be empty"));
        }

        let before = self.steps.len();
        self.steps.retain(|step| step.id() != id);
        if self.steps.len() == before {
            return Ok(false);
        }

        for step in &mut self.steps {
            step.remove_dependency(id);
        }
        Ok(true)
    }

    /// New plan holding the requests of every step whose recorded status was not 2xx
    ///
    /// Steps keep their ids but lose their dependencies: a prerequisite that
    /// succeeded is not part of the retry, so each retried step runs on its own.
    pub fn build_retry_plan(&self, status_by_id: &HashMap<String, u16>) -> BatchPlan {
        let steps: Vec<RequestStep> = self
            .steps
            .iter()
            .filter(|step| {
                status_by_id
                    .get(step.id())
                    .is_some_and(|status| !is_success_status(*status))
            })
            .map(RequestStep::without_dependencies)
            .collect();

        debug!(
            "Built retry plan with {} of {} steps",
            steps.len(),
            self.steps.len()
        );

        BatchPlan {
            steps,
            max_steps: self.max_steps,
        }
    }

    /// JSON batch payload
    pub fn to_json(&self) -> Result<Value> {
        let body = BatchRequestBody {
            requests: self.steps.iter().map(serialize_step).collect(),
        };
        Ok(serde_json::to_value(body)?)
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.to_json()?)?)
    }

    /// POST request carrying this plan to `endpoint`
    pub fn to_request(&self, endpoint: &str) -> Result<RequestInformation> {
        Ok(RequestInformation::post(endpoint)
            .with_header("Accept", JSON_CONTENT_TYPE)
            .with_content(self.to_json_bytes()?, JSON_CONTENT_TYPE))
    }
}

fn serialize_step(step: &RequestStep) -> BatchRequestItem<'_> {
    let request = step.request();
    let body = step_body(request);

    let mut headers: BTreeMap<&str, &str> = request
        .headers
        .iter()
        .filter(|(name, _)| !name.eq_ignore_ascii_case(AUTHORIZATION_HEADER))
        .filter(|(name, _)| body.is_none() || !name.eq_ignore_ascii_case(CONTENT_TYPE_HEADER))
        .map(|(name, value)| (name.as_str(), value.as_str()))
        .collect();
    if body.is_some() {
        headers.insert(
            CONTENT_TYPE_HEADER,
            request.effective_content_type().unwrap_or(BINARY_CONTENT_TYPE),
        );
    }

    BatchRequestItem {
        id: step.id(),
        url: relative_url(&request.url),
        method: request.method.as_str(),
        depends_on: step.has_dependencies().then(|| step.depends_on()),
        body,
        headers: (!headers.is_empty()).then_some(headers),
    }
}

/// JSON bodies are inlined as objects, anything else as an escaped string
fn step_body(request: &RequestInformation) -> Option<Value> {
    let body = request.body.as_ref()?;
    if request.has_json_body() {
        if let Ok(value) = serde_json::from_slice::<Value>(body) {
            return Some(value);
        }
    }
    Some(Value::String(String::from_utf8_lossy(body).into_owned()))
}

/// Batch step URLs are relative to the versioned service root
///
/// Absolute URLs lose their scheme, host and the version segment; the query
/// string is kept percent-encoded. Relative URLs pass through unchanged.
pub(crate) fn relative_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => {
            let path = parsed.path().get(VERSION_PREFIX_LEN..).unwrap_or_default();
            match parsed.query() {
                Some(query) => format!("{}?{}", path, query),
                None => path.to_string(),
            }
        }
        Err(_) => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn step(id: &str) -> RequestStep {
        let url = format!("https://graph.microsoft.com/v1.0/users/{}", id);
        RequestStep::new(id, RequestInformation::get(url)).unwrap()
    }

    #[test]
    fn test_add_step_rejects_unknown_dependency() {
        let mut plan = BatchPlan::new();
        plan.add_step(step("1")).unwrap();

        let err = plan.add_step(step("2").depends_on_step("3")).unwrap_err();
        match err {
            OrchestrationError::InvalidDependency {
                step_id,
                dependency_id,
            } => {
                assert_eq!(step_id, "2");
                assert_eq!(dependency_id, "3");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(plan.add_step(step("2").depends_on_step("1")).unwrap());
    }

    #[test]
    fn test_add_step_duplicate_is_noop() {
        let mut plan = BatchPlan::new();
        assert!(plan.add_step(step("1")).unwrap());
        assert!(!plan.add_step(step("1")).unwrap());
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn test_add_step_capacity_exceeded() {
        let mut plan = BatchPlan::new();
        for i in 0..MAX_BATCH_STEPS {
            plan.add_step(step(&i.to_string())).unwrap();
        }

        let err = plan.add_step(step("overflow")).unwrap_err();
        assert!(matches!(err, OrchestrationError::CapacityExceeded { capacity: 20 }));
        assert_eq!(plan.len(), MAX_BATCH_STEPS);
    }

    #[test]
    fn test_with_capacity_bounds() {
        assert!(BatchPlan::with_capacity(1).is_err());
        assert!(BatchPlan::with_capacity(21).is_err());
        assert_eq!(BatchPlan::with_capacity(2).unwrap().max_steps(), 2);
    }

    #[test]
    fn test_add_request_generates_id() {
        let mut plan = BatchPlan::new();
        let id = plan.add_request(RequestInformation::get("/me")).unwrap();
        assert!(uuid::Uuid::parse_str(&id).is_ok());
        assert!(plan.contains(&id));
    }

    #[test]
    fn test_remove_step_cascades_dependencies() {
        let mut plan = BatchPlan::new();
        plan.add_step(step("1")).unwrap();
        plan.add_step(step("2").depends_on_step("1")).unwrap();
        plan.add_step(step("3").with_dependencies(["1", "2"])).unwrap();

        assert!(plan.remove_step("1").unwrap());
        assert!(!plan.remove_step("1").unwrap());
        assert!(plan.step("2").unwrap().depends_on().is_empty());
        assert_eq!(plan.step("3").unwrap().depends_on(), ["2"]);

        let payload = plan.to_json().unwrap();
        assert!(payload["requests"][0].get("dependsOn").is_none());
        assert_eq!(payload["requests"][1]["dependsOn"], json!(["2"]));
    }

    #[test]
    fn test_remove_step_empty_id() {
        let mut plan = BatchPlan::new();
        assert!(matches!(
            plan.remove_step(""),
            Err(OrchestrationError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_build_retry_plan_keeps_only_failures() {
        let mut plan = BatchPlan::new();
        plan.add_step(step("1")).unwrap();
        plan.add_step(step("2").depends_on_step("1")).unwrap();
        plan.add_step(step("3")).unwrap();

        let statuses = HashMap::from([("1".to_string(), 200), ("2".to_string(), 500)]);
        let retry = plan.build_retry_plan(&statuses);

        assert_eq!(retry.len(), 1);
        let retried = retry.step("2").unwrap();
        assert_eq!(retried.request(), plan.step("2").unwrap().request());
        assert!(retried.depends_on().is_empty());
    }

    #[test]
    fn test_serialize_strips_version_and_authorization() {
        let mut plan = BatchPlan::new();
        let request = RequestInformation::get(
            "https://graph.microsoft.com/v1.0/me/events?$filter=subject eq 'x'",
        )
        .with_header("Authorization", "Bearer secret")
        .with_header("Prefer", "odata.maxpagesize=5");
        plan.add_step(RequestStep::new("1", request).unwrap()).unwrap();

        let beta = RequestInformation::delete("https://graph.microsoft.com/beta/users/42")
            .with_header("AUTHORIZATION", "Bearer other");
        plan.add_step(RequestStep::new("2", beta).unwrap()).unwrap();

        let payload = plan.to_json().unwrap();
        let first = &payload["requests"][0];
        assert_eq!(first["id"], "1");
        assert_eq!(first["method"], "GET");
        assert_eq!(first["url"], "/me/events?$filter=subject%20eq%20%27x%27");
        assert_eq!(first["headers"], json!({"Prefer": "odata.maxpagesize=5"}));
        assert!(first.get("body").is_none());

        let second = &payload["requests"][1];
        assert_eq!(second["url"], "/users/42");
        assert!(second.get("headers").is_none());
    }

    #[test]
    fn test_serialize_inlines_json_body() {
        let mut plan = BatchPlan::new();
        let request = RequestInformation::post("https://graph.microsoft.com/v1.0/me/events")
            .with_json_body(&json!({"subject": "Sync"}))
            .unwrap();
        plan.add_step(RequestStep::new("1", request).unwrap()).unwrap();

        let payload = plan.to_json().unwrap();
        let item = &payload["requests"][0];
        assert_eq!(item["body"], json!({"subject": "Sync"}));
        assert_eq!(item["headers"], json!({"Content-Type": "application/json"}));
    }

    #[test]
    fn test_serialize_escapes_non_json_body() {
        let mut plan = BatchPlan::new();
        let request = RequestInformation::put("/me/drive/root:/notes.txt:/content")
            .with_header("content-type", "text/plain")
            .with_content("line \"one\"", "text/plain");
        plan.add_step(RequestStep::new("1", request).unwrap()).unwrap();

        let payload = plan.to_json().unwrap();
        let item = &payload["requests"][0];
        assert_eq!(item["url"], "/me/drive/root:/notes.txt:/content");
        assert_eq!(item["body"], json!("line \"one\""));
        assert_eq!(item["headers"], json!({"Content-Type": "text/plain"}));
    }

    #[test]
    fn test_to_request_posts_payload() {
        let mut plan = BatchPlan::new();
        plan.add_step(step("1")).unwrap();

        let request = plan.to_request("$batch").unwrap();
        assert_eq!(request.method, reqwest::Method::POST);
        assert_eq!(request.url, "$batch");
        let body: Value = serde_json::from_slice(request.body.as_ref().unwrap()).unwrap();
        assert_eq!(body, plan.to_json().unwrap());
    }

    #[derive(Debug, Clone)]
    enum PlanOp {
        Add { id: u8, deps: Vec<u8> },
        Remove { id: u8 },
    }

    fn plan_op() -> impl Strategy<Value = PlanOp> {
        prop_oneof![
            (0u8..30, prop::collection::vec(0u8..30, 0..3))
                .prop_map(|(id, deps)| PlanOp::Add { id, deps }),
            (0u8..30).prop_map(|id| PlanOp::Remove { id }),
        ]
    }

    proptest! {
        #[test]
        fn prop_plan_respects_cap_and_dependencies(ops in prop::collection::vec(plan_op(), 0..80)) {
            let mut plan = BatchPlan::with_capacity(8).unwrap();

            for op in ops {
                match op {
                    PlanOp::Add { id, deps } => {
                        let step = RequestStep::new(id.to_string(), RequestInformation::get("/me"))
                            .unwrap()
                            .with_dependencies(deps.iter().map(|d| d.to_string()));
                        let _ = plan.add_step(step);
                    }
                    PlanOp::Remove { id } => {
                        let removed = id.to_string();
                        let _ = plan.remove_step(&removed);
                        for step in plan.steps() {
                            prop_assert!(!step.depends_on().contains(&removed));
                        }
                    }
                }

                prop_assert!(plan.len() <= plan.max_steps());
                for step in plan.steps() {
                    for dep in step.depends_on() {
                        prop_assert!(plan.contains(dep));
                    }
                }
            }

            let payload = plan.to_json().unwrap();
            for item in payload["requests"].as_array().unwrap() {
                if let Some(deps) = item.get("dependsOn") {
                    prop_assert!(!deps.as_array().unwrap().is_empty());
                }
            }
        }
    }
}
