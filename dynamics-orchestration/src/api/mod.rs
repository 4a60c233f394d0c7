//! Request orchestration for OData-style Web APIs
//!
//! The service accepts one logical request per round trip, caps JSON batches
//! at 20 requests, takes large files as byte-range slices against an upload
//! session and returns collections one page at a time. This module coordinates
//! those multi-request protocols on top of a single-request [`RequestAdapter`].

pub mod batch;
pub mod constants;
pub mod paging;
pub mod request;
pub mod resilience;
pub mod upload;

pub use batch::{
    BatchExecutor, BatchPlan, BatchPlanCollection, BatchResponse, BatchResponseCollection,
    BatchStepResponse, RequestStep,
};
pub use paging::{CollectionPage, ODataPage, PageIterator, PageIteratorState};
pub use request::{
    RawResponse, RequestAdapter, RequestInformation, ReqwestAdapter, decode_response,
};
pub use resilience::{
    BatchConfig, OrchestrationConfig, OrchestrationConfigBuilder, RetryConfig, RetryPolicy,
    UploadConfig,
};
pub use upload::{
    LargeFileUploadTask, UploadResponseHandler, UploadResult, UploadSession,
    UploadSliceRequestBuilder,
};
