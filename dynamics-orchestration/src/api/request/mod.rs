//! Request execution collaborator
//!
//! The orchestration engines never talk to the network themselves. Every round
//! trip goes through a [`RequestAdapter`], which takes a [`RequestInformation`]
//! and hands back a [`RawResponse`]. Decoding is done with serde through
//! [`decode_response`].

pub mod information;
#[cfg(test)]
pub(crate) mod mock;
pub mod reqwest_adapter;
pub mod response;

pub use information::{
    BINARY_CONTENT_TYPE, CONTENT_TYPE_HEADER, JSON_CONTENT_TYPE, RequestInformation,
};
pub use reqwest_adapter::ReqwestAdapter;
pub use response::{RawResponse, decode_response};

use async_trait::async_trait;

/// The single-request execution primitive the engines are built on
///
/// Implementations own authentication, middleware, timeouts and transport-level
/// retries. They should only fail for transport problems; HTTP error statuses
/// are returned as a [`RawResponse`] so callers can inspect them.
#[async_trait]
pub trait RequestAdapter: Send + Sync {
    async fn send(&self, request: RequestInformation) -> anyhow::Result<RawResponse>;
}
