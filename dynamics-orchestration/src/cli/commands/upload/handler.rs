//! Upload planning handler

use anyhow::Result;
use colored::*;
use serde_json::Value;

use super::UploadCommands;
use crate::api::upload::plan_slices;
use crate::api::{OrchestrationConfig, UploadSession, UploadSliceRequestBuilder};

/// Slices the upload task would send for these arguments
pub fn plan_upload(
    args: &UploadCommands,
    config: &OrchestrationConfig,
) -> Result<Vec<UploadSliceRequestBuilder<Value>>> {
    let session = UploadSession::new(args.url.clone()).with_next_expected_ranges(args.ranges.clone());
    let ranges = session.outstanding_ranges(args.length)?;
    let slice_size = args.slice_size.unwrap_or(config.upload.max_slice_size);

    Ok(plan_slices(&session.upload_url, &ranges, args.length, slice_size)?)
}

pub fn handle_plan_upload_command(args: UploadCommands, config: &OrchestrationConfig) -> Result<()> {
    let slices = plan_upload(&args, config)?;
    let planned: u64 = slices.iter().map(|s| s.range_length()).sum();

    eprintln!(
        "{} {} bytes of {} in {} slices, up to {} retries per slice",
        "Planned".bright_green().bold(),
        planned,
        args.length,
        slices.len(),
        config.upload.max_retries_per_slice
    );
    for slice in &slices {
        println!("PUT {}  Content-Range: {}", slice.session_url(), slice.content_range());
    }
    Ok(())
}
