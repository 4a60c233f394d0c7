//! Resumable large-file uploads
//!
//! A [`LargeFileUploadTask`] splits a seekable source into byte-range slices
//! and PUTs them to an upload session URL, classifying each response with the
//! [`UploadResponseHandler`].

pub mod handler;
pub mod session;
pub mod slice;
pub mod task;

pub use handler::UploadResponseHandler;
pub use session::{UploadResult, UploadSession};
pub use slice::UploadSliceRequestBuilder;
pub use task::{LargeFileUploadTask, plan_slices};
