//! Protocol constants for OData-style Web APIs

/// Maximum number of requests the service accepts in one JSON batch
pub const MAX_BATCH_STEPS: usize = 20;

/// Smallest per-plan cap a batch collection may be configured with
pub const MIN_BATCH_STEPS: usize = 2;

/// Batch endpoint, relative to the service root
pub const BATCH_ENDPOINT: &str = "$batch";

/// Length of the API version segment (`/v1.0`, `/beta`) stripped from batch step URLs
pub const VERSION_PREFIX_LEN: usize = 5;

/// Default upload slice size (5 MiB)
pub const DEFAULT_MAX_SLICE_SIZE: u64 = 5 * 1024 * 1024;

/// Default number of retries for a failed upload slice
pub const DEFAULT_MAX_RETRIES_PER_SLICE: u32 = 3;

/// Annotation carrying the link to the next page of a collection
pub const NEXT_LINK_KEY: &str = "@odata.nextLink";

/// Annotation carrying the continuation link for change tracking
pub const DELTA_LINK_KEY: &str = "@odata.deltaLink";

/// Property holding the items of a collection page
pub const COLLECTION_VALUE_KEY: &str = "value";
