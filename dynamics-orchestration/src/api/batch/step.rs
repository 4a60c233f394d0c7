//! A single request inside a batch plan

use crate::api::request::RequestInformation;
use crate::error::{OrchestrationError, Result};

/// One planned request plus the ids of the steps it must run after
#[derive(Debug, Clone, PartialEq)]
pub struct RequestStep {
    id: String,
    request: RequestInformation,
    /// Ids of steps in the same plan; empty means no ordering constraint
    depends_on: Vec<String>,
}

impl RequestStep {
    pub fn new(id: impl Into<String>, request: RequestInformation) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(OrchestrationError::invalid_argument("step id cannot be empty"));
        }
        Ok(Self {
            id,
            request,
            depends_on: Vec::new(),
        })
    }

    /// Declare that this step runs after `step_id`
    pub fn depends_on_step(mut self, step_id: impl Into<String>) -> Self {
        let step_id = step_id.into();
        if !self.depends_on.contains(&step_id) {
            self.depends_on.push(step_id);
        }
        self
    }

    pub fn with_dependencies<I, S>(self, step_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        step_ids
            .into_iter()
            .fold(self, |step, id| step.depends_on_step(id))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn request(&self) -> &RequestInformation {
        &self.request
    }

    pub fn depends_on(&self) -> &[String] {
        &self.depends_on
    }

    pub fn has_dependencies(&self) -> bool {
        !self.depends_on.is_empty()
    }

    pub fn into_request(self) -> RequestInformation {
        self.request
    }

    /// Copy of this step with the same id and request but no dependencies
    pub fn without_dependencies(&self) -> Self {
        Self {
            id: self.id.clone(),
            request: self.request.clone(),
            depends_on: Vec::new(),
        }
    }

    /// Drop `step_id` from the dependency list, returning whether it was present
    pub(crate) fn remove_dependency(&mut self, step_id: &str) -> bool {
        let before = self.depends_on.len();
        self.depends_on.retain(|dep| dep != step_id);
        self.depends_on.len() != before
    }
}
