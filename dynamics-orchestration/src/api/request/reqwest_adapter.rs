//! `reqwest` implementation of the request adapter

use anyhow::Context;
use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::HashMap;
use std::time::Instant;
use url::Url;

use super::{CONTENT_TYPE_HEADER, RawResponse, RequestAdapter, RequestInformation};

/// Sends [`RequestInformation`] through a shared `reqwest::Client`
///
/// Authentication is expected to be configured on the client itself (default
/// headers or a middleware layer) or supplied via [`ReqwestAdapter::with_default_header`].
#[derive(Debug, Clone)]
pub struct ReqwestAdapter {
    client: reqwest::Client,
    base_url: Option<Url>,
    default_headers: HashMap<String, String>,
}

impl ReqwestAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: None,
            default_headers: HashMap::new(),
        }
    }

    /// Resolve relative request URLs against `base_url`
    ///
    /// A trailing slash is added so that `https://host/api/data/v9.2` keeps
    /// its last segment when joined.
    pub fn with_base_url(mut self, base_url: &str) -> anyhow::Result<Self> {
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        self.base_url = Some(Url::parse(&normalized).with_context(|| format!("Invalid base URL: {}", base_url))?);
        Ok(self)
    }

    /// Header added to every request unless the request sets it itself
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    fn resolve_url(&self, url: &str) -> anyhow::Result<Url> {
        match Url::parse(url) {
            Ok(absolute) => Ok(absolute),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = self
                    .base_url
                    .as_ref()
                    .with_context(|| format!("Relative URL '{}' requires a base URL", url))?;
                base.join(url.trim_start_matches('/'))
                    .with_context(|| format!("Failed to resolve '{}' against {}", url, base))
            }
            Err(e) => Err(e).with_context(|| format!("Invalid request URL: {}", url)),
        }
    }

    /// Convert the descriptor into a native `reqwest::Request` without sending it
    pub fn convert_to_native(&self, request: &RequestInformation) -> anyhow::Result<reqwest::Request> {
        let url = self.resolve_url(&request.url)?;

        let mut headers = HeaderMap::new();
        for (name, value) in &self.default_headers {
            if request.header(name).is_none() {
                insert_header(&mut headers, name, value)?;
            }
        }
        for (name, value) in &request.headers {
            insert_header(&mut headers, name, value)?;
        }
        if request.body.is_some() {
            if let Some(content_type) = request.content_type.as_deref() {
                insert_header(&mut headers, CONTENT_TYPE_HEADER, content_type)?;
            }
        }

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .headers(headers);
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        builder.build().context("Failed to build HTTP request")
    }
}

fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) -> anyhow::Result<()> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .with_context(|| format!("Invalid header name: {}", name))?;
    let value = HeaderValue::from_str(value)
        .with_context(|| format!("Invalid value for header {}", name))?;
    headers.insert(name, value);
    Ok(())
}

#[async_trait]
impl RequestAdapter for ReqwestAdapter {
    async fn send(&self, request: RequestInformation) -> anyhow::Result<RawResponse> {
        let native = self.convert_to_native(&request)?;
        let method = native.method().clone();
        let url = native.url().clone();
        let start = Instant::now();

        let response = self
            .client
            .execute(native)
            .await
            .with_context(|| format!("{} {} failed", method, url))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read response body of {} {}", method, url))?;

        debug!(
            "{} {} -> {} ({} bytes, {}ms)",
            method,
            url,
            status,
            body.len(),
            start.elapsed().as_millis()
        );

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}
