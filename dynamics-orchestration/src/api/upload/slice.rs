//! Request builder for a single upload slice

use bytes::Bytes;
use log::debug;
use serde::de::DeserializeOwned;
use std::fmt;
use std::marker::PhantomData;

use super::handler::UploadResponseHandler;
use super::session::UploadResult;
use crate::api::request::{BINARY_CONTENT_TYPE, RequestAdapter, RequestInformation};
use crate::error::{OrchestrationError, Result};

pub const CONTENT_RANGE_HEADER: &str = "Content-Range";
pub const CONTENT_LENGTH_HEADER: &str = "Content-Length";

/// One contiguous byte range of an upload, addressed to the session URL
///
/// `range_end` is inclusive. `T` is the item type the service returns once the
/// last slice lands.
pub struct UploadSliceRequestBuilder<T> {
    session_url: String,
    range_begin: u64,
    range_end: u64,
    total_session_length: u64,
    _item: PhantomData<fn() -> T>,
}

impl<T> Clone for UploadSliceRequestBuilder<T> {
    fn clone(&self) -> Self {
        Self {
            session_url: self.session_url.clone(),
            range_begin: self.range_begin,
            range_end: self.range_end,
            total_session_length: self.total_session_length,
            _item: PhantomData,
        }
    }
}

impl<T> fmt::Debug for UploadSliceRequestBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadSliceRequestBuilder")
            .field("session_url", &self.session_url)
            .field("range_begin", &self.range_begin)
            .field("range_end", &self.range_end)
            .field("total_session_length", &self.total_session_length)
            .finish()
    }
}

impl<T> UploadSliceRequestBuilder<T> {
    pub fn new(
        session_url: impl Into<String>,
        range_begin: u64,
        range_end: u64,
        total_session_length: u64,
    ) -> Result<Self> {
        let session_url = session_url.into();
        if session_url.is_empty() {
            return Err(OrchestrationError::invalid_argument(
                "upload session URL cannot be empty",
            ));
        }
        if range_begin > range_end || range_end >= total_session_length {
            return Err(OrchestrationError::invalid_argument(format!(
                "invalid slice range {}-{} for {} bytes",
                range_begin, range_end, total_session_length
            )));
        }
        Ok(Self {
            session_url,
            range_begin,
            range_end,
            total_session_length,
            _item: PhantomData,
        })
    }

    pub fn session_url(&self) -> &str {
        &self.session_url
    }

    pub fn range_begin(&self) -> u64 {
        self.range_begin
    }

    pub fn range_end(&self) -> u64 {
        self.range_end
    }

    pub fn total_session_length(&self) -> u64 {
        self.total_session_length
    }

    pub fn range_length(&self) -> u64 {
        self.range_end - self.range_begin + 1
    }

    /// `Content-Range` header value, e.g. `bytes 0-99/1000`
    pub fn content_range(&self) -> String {
        format!(
            "bytes {}-{}/{}",
            self.range_begin, self.range_end, self.total_session_length
        )
    }

    /// PUT carrying `chunk` as an octet stream
    pub fn to_request(&self, chunk: Bytes) -> Result<RequestInformation> {
        if chunk.len() as u64 != self.range_length() {
            return Err(OrchestrationError::invalid_argument(format!(
                "slice {} expects {} bytes, got {}",
                self.content_range(),
                self.range_length(),
                chunk.len()
            )));
        }
        Ok(RequestInformation::put(self.session_url.clone())
            .with_header(CONTENT_RANGE_HEADER, self.content_range())
            .with_header(CONTENT_LENGTH_HEADER, self.range_length().to_string())
            .with_content(chunk, BINARY_CONTENT_TYPE))
    }
}

impl<T: DeserializeOwned> UploadSliceRequestBuilder<T> {
    /// Send the slice and classify the response
    pub async fn put(&self, adapter: &dyn RequestAdapter, chunk: Bytes) -> Result<UploadResult<T>> {
        let request = self.to_request(chunk)?;
        debug!("Uploading slice {}", self.content_range());
        let response = adapter.send(request).await?;
        UploadResponseHandler::new().handle_response(response)
    }
}
