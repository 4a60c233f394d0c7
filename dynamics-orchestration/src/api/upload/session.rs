//! Upload session state and slice results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{OrchestrationError, Result};

/// Server-side resource tracking a chunked upload
///
/// Slice responses usually omit `uploadUrl`, so it defaults to empty when
/// decoding and is filled in from the session the task was started with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSession {
    #[serde(default)]
    pub upload_url: String,
    /// Byte ranges still outstanding, e.g. `["0-"]` or `["4096-8191", "12000-"]`
    #[serde(default)]
    pub next_expected_ranges: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date_time: Option<DateTime<Utc>>,
}

impl UploadSession {
    pub fn new(upload_url: impl Into<String>) -> Self {
        Self {
            upload_url: upload_url.into(),
            next_expected_ranges: Vec::new(),
            expiration_date_time: None,
        }
    }

    pub fn with_next_expected_ranges<I, S>(mut self, ranges: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.next_expected_ranges = ranges.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_expiration(mut self, expiration: DateTime<Utc>) -> Self {
        self.expiration_date_time = Some(expiration);
        self
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiration_date_time.is_some_and(|expiry| expiry <= now)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Take over progress reported by a later response
    ///
    /// An empty upload URL in `update` keeps the current one.
    pub fn merge(&mut self, update: UploadSession) {
        if !update.upload_url.is_empty() {
            self.upload_url = update.upload_url;
        }
        self.next_expected_ranges = update.next_expected_ranges;
        if update.expiration_date_time.is_some() {
            self.expiration_date_time = update.expiration_date_time;
        }
    }

    /// Inclusive byte ranges still to send for a stream of `total_length` bytes
    ///
    /// No reported ranges means nothing was acknowledged yet: the whole stream.
    /// Open-ended ranges (`"4096-"`) run to the last byte.
    pub fn outstanding_ranges(&self, total_length: u64) -> Result<Vec<(u64, u64)>> {
        if total_length == 0 {
            return Err(OrchestrationError::invalid_argument(
                "upload length must be greater than zero",
            ));
        }
        if self.next_expected_ranges.is_empty() {
            return Ok(vec![(0, total_length - 1)]);
        }

        self.next_expected_ranges
            .iter()
            .map(|range| parse_range(range, total_length))
            .collect()
    }
}

fn parse_range(range: &str, total_length: u64) -> Result<(u64, u64)> {
    let invalid = || {
        OrchestrationError::invalid_argument(format!(
            "invalid expected range '{}' for {} bytes",
            range, total_length
        ))
    };

    let (begin, end) = range.trim().split_once('-').ok_or_else(invalid)?;
    let begin: u64 = begin.trim().parse().map_err(|_| invalid())?;
    let end: u64 = match end.trim() {
        "" => total_length - 1,
        end => end.parse::<u64>().map_err(|_| invalid())?.min(total_length - 1),
    };

    if begin > end {
        return Err(invalid());
    }
    Ok((begin, end))
}

/// Outcome of sending one slice
#[derive(Debug, Clone, PartialEq)]
pub enum UploadResult<T> {
    /// The service returned the created item
    Completed(T),
    /// The service created the item and returned only its location
    Location(String),
    /// More bytes are expected
    InProgress(UploadSession),
}

impl<T> UploadResult<T> {
    pub fn is_upload_successful(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Location(_))
    }

    pub fn item(&self) -> Option<&T> {
        match self {
            Self::Completed(item) => Some(item),
            _ => None,
        }
    }

    pub fn into_item(self) -> Option<T> {
        match self {
            Self::Completed(item) => Some(item),
            _ => None,
        }
    }

    pub fn location(&self) -> Option<&str> {
        match self {
            Self::Location(location) => Some(location),
            _ => None,
        }
    }

    pub fn session(&self) -> Option<&UploadSession> {
        match self {
            Self::InProgress(session) => Some(session),
            _ => None,
        }
    }
}
