//! `plan-batch` command

pub mod handler;

use clap::{Args, ValueEnum};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct BatchCommands {
    /// JSON file holding an array of requests
    pub file: PathBuf,

    /// Maximum steps per batch plan (2-20, defaults to the config value)
    #[arg(long)]
    pub max_steps: Option<usize>,

    /// Output format
    #[arg(long, value_enum, default_value = "json")]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    Json,
    /// Single-line JSON
    JsonCompact,
}
