//! Drives a resumable large-file upload slice by slice

use bytes::Bytes;
use chrono::Utc;
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use std::io::SeekFrom;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};

use super::session::{UploadResult, UploadSession};
use super::slice::UploadSliceRequestBuilder;
use crate::api::constants::DEFAULT_MAX_SLICE_SIZE;
use crate::api::request::{RequestAdapter, RequestInformation, decode_response};
use crate::api::resilience::{RetryConfig, RetryPolicy, UploadConfig};
use crate::error::{OrchestrationError, Result};

/// Split the outstanding ranges into slices of at most `max_slice_size` bytes
pub fn plan_slices<T>(
    session_url: &str,
    ranges: &[(u64, u64)],
    total_length: u64,
    max_slice_size: u64,
) -> Result<Vec<UploadSliceRequestBuilder<T>>> {
    if max_slice_size == 0 {
        return Err(OrchestrationError::invalid_argument(
            "max slice size must be greater than zero",
        ));
    }

    let mut slices = Vec::new();
    for &(begin, end) in ranges {
        let mut slice_begin = begin;
        while slice_begin <= end {
            let slice_end = end.min(slice_begin.saturating_add(max_slice_size - 1));
            slices.push(UploadSliceRequestBuilder::new(
                session_url,
                slice_begin,
                slice_end,
                total_length,
            )?);
            slice_begin = slice_end + 1;
        }
    }
    Ok(slices)
}

/// Uploads a seekable byte source through an [`UploadSession`]
///
/// Slices are sent in order. A terminal response ends the upload early; each
/// continuation reports progress as `(bytes_sent, total_length)`.
pub struct LargeFileUploadTask<R, T> {
    adapter: Arc<dyn RequestAdapter>,
    session: UploadSession,
    source: R,
    total_length: u64,
    max_slice_size: u64,
    slices: Vec<UploadSliceRequestBuilder<T>>,
    retry_policy: RetryPolicy,
    cancelled: bool,
}

impl<R, T> LargeFileUploadTask<R, T>
where
    R: AsyncRead + AsyncSeek + Unpin + Send,
    T: DeserializeOwned + Send,
{
    /// `max_slice_size` defaults to 5 MiB
    pub fn new(
        adapter: Arc<dyn RequestAdapter>,
        session: UploadSession,
        source: R,
        total_length: u64,
        max_slice_size: Option<u64>,
    ) -> Result<Self> {
        if session.upload_url.is_empty() {
            return Err(OrchestrationError::invalid_argument(
                "upload session URL cannot be empty",
            ));
        }
        if total_length == 0 {
            return Err(OrchestrationError::invalid_argument(
                "upload length must be greater than zero",
            ));
        }

        let max_slice_size = max_slice_size.unwrap_or(DEFAULT_MAX_SLICE_SIZE);
        let ranges = session.outstanding_ranges(total_length)?;
        let slices = plan_slices(&session.upload_url, &ranges, total_length, max_slice_size)?;
        debug!(
            "Planned {} slices of up to {} bytes for {} bytes",
            slices.len(),
            max_slice_size,
            total_length
        );

        Ok(Self {
            adapter,
            session,
            source,
            total_length,
            max_slice_size,
            slices,
            retry_policy: RetryPolicy::default(),
            cancelled: false,
        })
    }

    pub fn from_config(
        adapter: Arc<dyn RequestAdapter>,
        session: UploadSession,
        source: R,
        total_length: u64,
        config: &UploadConfig,
    ) -> Result<Self> {
        Self::new(adapter, session, source, total_length, Some(config.max_slice_size))
    }

    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_policy = RetryPolicy::new(config);
        self
    }

    pub fn session(&self) -> &UploadSession {
        &self.session
    }

    pub fn slices(&self) -> &[UploadSliceRequestBuilder<T>] {
        &self.slices
    }

    pub fn total_length(&self) -> u64 {
        self.total_length
    }

    pub fn max_slice_size(&self) -> u64 {
        self.max_slice_size
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    fn ensure_active(&self) -> Result<()> {
        if self.cancelled || self.session.is_expired() {
            return Err(OrchestrationError::UploadSessionExpired {
                upload_url: self.session.upload_url.clone(),
                expired_at: self.session.expiration_date_time,
            });
        }
        Ok(())
    }

    async fn read_slice(&mut self, slice: &UploadSliceRequestBuilder<T>) -> Result<Bytes> {
        self.source.seek(SeekFrom::Start(slice.range_begin())).await?;
        let mut buffer = vec![0u8; slice.range_length() as usize];
        self.source.read_exact(&mut buffer).await?;
        Ok(Bytes::from(buffer))
    }

    async fn send_with_retries(
        &self,
        slice: &UploadSliceRequestBuilder<T>,
        chunk: Bytes,
        max_retries: u32,
    ) -> Result<UploadResult<T>> {
        let mut retry = 0;
        loop {
            match slice.put(self.adapter.as_ref(), chunk.clone()).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && retry < max_retries => {
                    retry += 1;
                    warn!(
                        "Slice {} failed (retry {}/{}): {}",
                        slice.content_range(),
                        retry,
                        max_retries,
                        e
                    );
                    self.retry_policy.wait(retry).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Send every pending slice, retrying each up to `max_retries` times
    ///
    /// Accepted slices leave the pending list, so calling this again after a
    /// failure continues from the first unacknowledged slice. Returns the
    /// terminal result, or the last in-progress session when the service
    /// never signalled completion.
    pub async fn upload<F>(&mut self, max_retries: u32, mut progress: F) -> Result<UploadResult<T>>
    where
        F: FnMut(u64, u64) + Send,
    {
        self.ensure_active()?;

        let start = Instant::now();
        info!(
            "Uploading {} bytes in {} slices to {}",
            self.total_length,
            self.slices.len(),
            self.session.upload_url
        );

        while let Some(slice) = self.slices.first().cloned() {
            let chunk = self.read_slice(&slice).await?;
            let result = self.send_with_retries(&slice, chunk, max_retries).await?;
            self.slices.remove(0);
            progress(slice.range_end() + 1, self.total_length);

            match result {
                UploadResult::InProgress(update) => {
                    debug!(
                        "Slice {} accepted, next expected {:?}",
                        slice.content_range(),
                        update.next_expected_ranges
                    );
                    self.session.merge(update);
                }
                terminal => {
                    self.slices.clear();
                    info!(
                        "Upload of {} bytes finished in {}ms",
                        self.total_length,
                        start.elapsed().as_millis()
                    );
                    return Ok(terminal);
                }
            }
        }

        warn!(
            "All slices sent to {} without a completion response",
            self.session.upload_url
        );
        Ok(UploadResult::InProgress(self.session.clone()))
    }

    /// Ask the service which ranges it still expects, then upload only those
    pub async fn resume<F>(&mut self, max_retries: u32, progress: F) -> Result<UploadResult<T>>
    where
        F: FnMut(u64, u64) + Send,
    {
        self.ensure_active()?;

        let response = self
            .adapter
            .send(RequestInformation::get(self.session.upload_url.clone()))
            .await?;
        let status = response.status;
        let update: UploadSession = decode_response(response)?.ok_or(
            OrchestrationError::AmbiguousUploadCompletion {
                status,
                body: String::new(),
            },
        )?;
        if update.next_expected_ranges.is_empty() {
            return Err(OrchestrationError::AmbiguousUploadCompletion {
                status,
                body: "upload session reports no outstanding ranges".to_string(),
            });
        }

        self.session.merge(update);
        self.ensure_active()?;

        let ranges = self.session.outstanding_ranges(self.total_length)?;
        self.slices = plan_slices(
            &self.session.upload_url,
            &ranges,
            self.total_length,
            self.max_slice_size,
        )?;
        info!(
            "Resuming upload with {} slices from {:?}",
            self.slices.len(),
            self.session.next_expected_ranges
        );

        self.upload(max_retries, progress).await
    }

    /// Delete the upload session; the task refuses further uploads afterwards
    pub async fn cancel(&mut self) -> Result<()> {
        if self.cancelled {
            return Ok(());
        }

        self.adapter
            .send(RequestInformation::delete(self.session.upload_url.clone()))
            .await?
            .error_for_status()?;

        self.cancelled = true;
        self.session.expiration_date_time = Some(Utc::now());
        info!("Cancelled upload session {}", self.session.upload_url);
        Ok(())
    }
}
