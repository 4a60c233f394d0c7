//! Request descriptor handed to the request adapter

use bytes::Bytes;
use reqwest::Method;
use serde::Serialize;
use std::collections::HashMap;

use crate::error::Result;

pub const CONTENT_TYPE_HEADER: &str = "Content-Type";
pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const BINARY_CONTENT_TYPE: &str = "application/octet-stream";

/// One planned HTTP request: method, URL, headers and an optional body
#[derive(Debug, Clone, PartialEq)]
pub struct RequestInformation {
    pub method: Method,
    /// Absolute URL, or a URL relative to the adapter's base URL
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Bytes>,
    /// Media type of `body`
    pub content_type: Option<String>,
}

impl RequestInformation {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
            content_type: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(Method::PATCH, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    /// Set a header, replacing any existing header with the same name in any casing
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.headers.retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
        self.headers.insert(name, value.into());
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Serialize `value` as the JSON body
    pub fn with_json_body<T: Serialize>(mut self, value: &T) -> Result<Self> {
        self.body = Some(Bytes::from(serde_json::to_vec(value)?));
        self.content_type = Some(JSON_CONTENT_TYPE.to_string());
        Ok(self)
    }

    /// Attach raw content with an explicit media type
    pub fn with_content(mut self, content: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        self.body = Some(content.into());
        self.content_type = Some(content_type.into());
        self
    }

    /// Media type of the body: explicit content type first, then a Content-Type header
    pub fn effective_content_type(&self) -> Option<&str> {
        self.content_type
            .as_deref()
            .or_else(|| self.header(CONTENT_TYPE_HEADER))
    }

    pub fn has_json_body(&self) -> bool {
        self.body.is_some()
            && self
                .effective_content_type()
                .is_some_and(|ct| ct.to_ascii_lowercase().contains("json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_header_replaces_any_casing() {
        let request = RequestInformation::get("https://graph.microsoft.com/v1.0/me")
            .with_header("prefer", "odata.maxpagesize=10")
            .with_header("Prefer", "odata.maxpagesize=50");

        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.header("PREFER"), Some("odata.maxpagesize=50"));
    }

    #[test]
    fn test_json_body_sets_content_type() {
        let request = RequestInformation::post("/accounts")
            .with_json_body(&json!({"name": "Contoso"}))
            .unwrap();

        assert!(request.has_json_body());
        assert_eq!(request.effective_content_type(), Some(JSON_CONTENT_TYPE));
        assert_eq!(request.body.as_deref(), Some(br#"{"name":"Contoso"}"#.as_slice()));
    }

    #[test]
    fn test_content_type_falls_back_to_header() {
        let request = RequestInformation::put("/content")
            .with_header("content-type", "text/plain")
            .with_content(Bytes::from_static(b"hello"), "text/plain");
        assert!(!request.has_json_body());

        let mut request = RequestInformation::patch("/accounts(1)").with_header("content-type", "application/json; charset=utf-8");
        request.body = Some(Bytes::from_static(b"{}"));
        assert!(request.has_json_body());
    }
}
