//! Scripted request adapter for unit tests

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::{RawResponse, RequestAdapter, RequestInformation};

/// Replays queued responses in order and records every request it receives
#[derive(Default)]
pub(crate) struct MockAdapter {
    responses: Mutex<VecDeque<anyhow::Result<RawResponse>>>,
    requests: Mutex<Vec<RequestInformation>>,
}

impl MockAdapter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(self, response: RawResponse) -> Self {
        self.responses.lock().unwrap().push_back(Ok(response));
        self
    }

    pub(crate) fn respond_json(self, status: u16, body: serde_json::Value) -> Self {
        self.respond(RawResponse::json(status, &body))
    }

    pub(crate) fn fail(self, message: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(anyhow::anyhow!(message.to_string())));
        self
    }

    pub(crate) fn requests(&self) -> Vec<RequestInformation> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl RequestAdapter for MockAdapter {
    async fn send(&self, request: RequestInformation) -> anyhow::Result<RawResponse> {
        let description = format!("{} {}", request.method, request.url);
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow::anyhow!("no scripted response for {}", description)))
    }
}
