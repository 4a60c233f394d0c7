pub mod batch;
pub mod upload;
