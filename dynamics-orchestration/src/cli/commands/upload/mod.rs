//! `plan-upload` command

pub mod handler;

use clap::Args;

#[derive(Args, Debug)]
pub struct UploadCommands {
    /// Total number of bytes to upload
    #[arg(long)]
    pub length: u64,

    /// Maximum bytes per slice (defaults to the config value)
    #[arg(long)]
    pub slice_size: Option<u64>,

    /// Outstanding ranges reported by the session, e.g. `0-1023 4096-`
    #[arg(long, num_args = 1..)]
    pub ranges: Vec<String>,

    /// Upload session URL used in the plan
    #[arg(long, default_value = "https://upload.example.com/session")]
    pub url: String,
}
