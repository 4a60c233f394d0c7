//! JSON batch response envelopes

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

use super::plan::is_success_status;
use crate::api::request::RawResponse;
use crate::error::{OrchestrationError, Result};

/// Outcome of one step inside a batch response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchStepResponse {
    pub id: String,
    pub status: u16,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl BatchStepResponse {
    pub fn is_success(&self) -> bool {
        is_success_status(self.status)
    }

    /// Decode the body into `T`; a failed step becomes [`OrchestrationError::RemoteFailure`]
    pub fn deserialize_body<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        if !self.is_success() {
            return Err(OrchestrationError::RemoteFailure {
                status: self.status,
                body: self
                    .body
                    .as_ref()
                    .map(Value::to_string)
                    .unwrap_or_default(),
            });
        }
        match &self.body {
            None | Some(Value::Null) => Ok(None),
            Some(body) => Ok(Some(serde_json::from_value(body.clone())?)),
        }
    }
}

/// Decoded response of one batch round trip
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    #[serde(default)]
    responses: Vec<BatchStepResponse>,
    #[serde(
        rename = "@odata.nextLink",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    next_link: Option<String>,
}

impl BatchResponse {
    pub fn new(responses: Vec<BatchStepResponse>) -> Self {
        Self {
            responses,
            next_link: None,
        }
    }

    /// Decode the batch envelope; a failed batch request is a [`OrchestrationError::RemoteFailure`]
    pub fn from_raw(response: RawResponse) -> Result<Self> {
        let response = response.error_for_status()?;
        if !response.has_body() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_slice(&response.body)?)
    }

    pub fn responses(&self) -> &[BatchStepResponse] {
        &self.responses
    }

    pub fn next_link(&self) -> Option<&str> {
        self.next_link.as_deref()
    }

    pub fn response(&self, id: &str) -> Option<&BatchStepResponse> {
        self.responses.iter().find(|r| r.id == id)
    }

    /// Step id to status code, the input for building retry plans
    pub fn status_codes(&self) -> HashMap<String, u16> {
        self.responses
            .iter()
            .map(|r| (r.id.clone(), r.status))
            .collect()
    }

    pub fn deserialize_body<T: DeserializeOwned>(&self, id: &str) -> Result<Option<T>> {
        match self.response(id) {
            Some(step) => step.deserialize_body(),
            None => Ok(None),
        }
    }

    pub fn failed_ids(&self) -> Vec<&str> {
        self.responses
            .iter()
            .filter(|r| !r.is_success())
            .map(|r| r.id.as_str())
            .collect()
    }

    /// Whether every step succeeded
    pub fn is_success(&self) -> bool {
        self.responses.iter().all(BatchStepResponse::is_success)
    }
}

/// Responses of every plan in a batch collection, in execution order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResponseCollection {
    responses: Vec<BatchResponse>,
}

impl BatchResponseCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, response: BatchResponse) {
        self.responses.push(response);
    }

    pub fn batches(&self) -> &[BatchResponse] {
        &self.responses
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }

    /// Merged status codes; later batches win on id collisions
    pub fn status_codes(&self) -> HashMap<String, u16> {
        self.responses
            .iter()
            .flat_map(|batch| batch.responses())
            .map(|r| (r.id.clone(), r.status))
            .collect()
    }

    pub fn response(&self, id: &str) -> Option<&BatchStepResponse> {
        self.responses
            .iter()
            .rev()
            .find_map(|batch| batch.response(id))
    }

    pub fn deserialize_body<T: DeserializeOwned>(&self, id: &str) -> Result<Option<T>> {
        match self.response(id) {
            Some(step) => step.deserialize_body(),
            None => Ok(None),
        }
    }

    /// Ids whose latest response failed, in order of first appearance
    pub fn failed_ids(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.responses
            .iter()
            .flat_map(|batch| batch.responses())
            .filter(|r| seen.insert(r.id.as_str()))
            .filter(|r| self.response(&r.id).is_some_and(|latest| !latest.is_success()))
            .map(|r| r.id.as_str())
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.failed_ids().is_empty()
    }
}
