//! Raw HTTP responses and serde-based decoding

use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::collections::HashMap;

use crate::error::{OrchestrationError, Result};

/// Undecoded response returned by a [`super::RequestAdapter`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl RawResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// JSON body with a matching Content-Type header
    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        Self::new(status)
            .with_header("Content-Type", "application/json")
            .with_body(value.to_string())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn has_body(&self) -> bool {
        !self.body.iter().all(u8::is_ascii_whitespace)
    }

    /// Lossy UTF-8 view of the body, for diagnostics
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Convert a non-success status into [`OrchestrationError::RemoteFailure`]
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(OrchestrationError::RemoteFailure {
                status: self.status,
                body: self.body_text(),
            })
        }
    }
}

/// Decode a successful response body into `T`
///
/// Empty bodies (e.g. 204 No Content) decode to `None`.
pub fn decode_response<T: DeserializeOwned>(response: RawResponse) -> Result<Option<T>> {
    let response = response.error_for_status()?;
    if !response.has_body() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_slice(&response.body)?))
}
