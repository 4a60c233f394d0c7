//! Orchestration configuration with builder pattern
//!
//! Provides a unified configuration for batch partitioning, upload slicing and
//! retry backoff with sane defaults, presets, and TOML loading.

use super::retry::RetryConfig;
use crate::api::constants::{
    BATCH_ENDPOINT, DEFAULT_MAX_RETRIES_PER_SLICE, DEFAULT_MAX_SLICE_SIZE, MAX_BATCH_STEPS,
    MIN_BATCH_STEPS,
};
use crate::error::{OrchestrationError, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Global configuration for the orchestration engines
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestrationConfig {
    pub batch: BatchConfig,
    pub upload: UploadConfig,
    pub retry: RetryConfig,
}

/// Batch partitioning configuration
#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    /// Steps per plan before a collection rolls over to a new plan (2..=20)
    pub max_steps_per_plan: usize,
    /// Batch endpoint the executor posts to
    pub endpoint: String,
}

/// Chunked upload configuration
#[derive(Debug, Clone, PartialEq)]
pub struct UploadConfig {
    /// Largest byte range sent in one slice
    pub max_slice_size: u64,
    /// Times a failed slice is resubmitted before the upload fails
    pub max_retries_per_slice: u32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_steps_per_plan: MAX_BATCH_STEPS,
            endpoint: BATCH_ENDPOINT.to_string(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_slice_size: DEFAULT_MAX_SLICE_SIZE,
            max_retries_per_slice: DEFAULT_MAX_RETRIES_PER_SLICE,
        }
    }
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            batch: BatchConfig::default(),
            upload: UploadConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

/// On-disk representation; every key is optional and falls back to the default
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    batch: BatchSection,
    upload: UploadSection,
    retry: RetrySection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct BatchSection {
    max_steps_per_plan: Option<usize>,
    endpoint: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct UploadSection {
    max_slice_size: Option<u64>,
    max_retries_per_slice: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RetrySection {
    base_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
    backoff_multiplier: Option<f64>,
    jitter: Option<bool>,
}

impl OrchestrationConfig {
    /// Create a new builder for OrchestrationConfig
    pub fn builder() -> OrchestrationConfigBuilder {
        OrchestrationConfigBuilder::new()
    }

    /// Conservative config for production environments
    pub fn conservative() -> Self {
        Self {
            batch: BatchConfig {
                max_steps_per_plan: 10, // Smaller batches keep partial failures cheap
                endpoint: BATCH_ENDPOINT.to_string(),
            },
            upload: UploadConfig {
                max_slice_size: 320 * 1024 * 10, // 3.125 MiB, a multiple of 320 KiB
                max_retries_per_slice: 5,
            },
            retry: RetryConfig::conservative(),
        }
    }

    /// Aggressive config for development/testing
    pub fn development() -> Self {
        Self {
            batch: BatchConfig::default(),
            upload: UploadConfig {
                max_slice_size: 10 * 1024 * 1024,
                max_retries_per_slice: 1,
            },
            retry: RetryConfig::aggressive(),
        }
    }

    /// No retries and no backoff (for testing)
    pub fn disabled() -> Self {
        Self {
            batch: BatchConfig::default(),
            upload: UploadConfig {
                max_slice_size: DEFAULT_MAX_SLICE_SIZE,
                max_retries_per_slice: 0,
            },
            retry: RetryConfig::immediate(),
        }
    }

    /// Parse a TOML document; missing keys keep their default values
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content)
            .map_err(|e| OrchestrationError::invalid_argument(format!("invalid config: {}", e)))?;

        let defaults = Self::default();
        let config = Self {
            batch: BatchConfig {
                max_steps_per_plan: file
                    .batch
                    .max_steps_per_plan
                    .unwrap_or(defaults.batch.max_steps_per_plan),
                endpoint: file.batch.endpoint.unwrap_or(defaults.batch.endpoint),
            },
            upload: UploadConfig {
                max_slice_size: file
                    .upload
                    .max_slice_size
                    .unwrap_or(defaults.upload.max_slice_size),
                max_retries_per_slice: file
                    .upload
                    .max_retries_per_slice
                    .unwrap_or(defaults.upload.max_retries_per_slice),
            },
            retry: RetryConfig {
                base_delay: file
                    .retry
                    .base_delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.retry.base_delay),
                max_delay: file
                    .retry
                    .max_delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.retry.max_delay),
                backoff_multiplier: file
                    .retry
                    .backoff_multiplier
                    .unwrap_or(defaults.retry.backoff_multiplier),
                jitter: file.retry.jitter.unwrap_or(defaults.retry.jitter),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        let steps = self.batch.max_steps_per_plan;
        if !(MIN_BATCH_STEPS..=MAX_BATCH_STEPS).contains(&steps) {
            return Err(OrchestrationError::invalid_argument(format!(
                "batch.max_steps_per_plan must be between {} and {}, got {}",
                MIN_BATCH_STEPS, MAX_BATCH_STEPS, steps
            )));
        }
        if self.batch.endpoint.trim().is_empty() {
            return Err(OrchestrationError::invalid_argument(
                "batch.endpoint cannot be empty",
            ));
        }
        if self.upload.max_slice_size == 0 {
            return Err(OrchestrationError::invalid_argument(
                "upload.max_slice_size must be greater than zero",
            ));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(OrchestrationError::invalid_argument(format!(
                "retry.backoff_multiplier must be at least 1.0, got {}",
                self.retry.backoff_multiplier
            )));
        }
        Ok(())
    }
}

/// Builder for OrchestrationConfig
#[derive(Debug)]
pub struct OrchestrationConfigBuilder {
    config: OrchestrationConfig,
}

impl OrchestrationConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: OrchestrationConfig::default(),
        }
    }

    /// Set steps per batch plan
    pub fn max_steps_per_plan(mut self, steps: usize) -> Self {
        self.config.batch.max_steps_per_plan = steps;
        self
    }

    /// Set the batch endpoint
    pub fn batch_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.batch.endpoint = endpoint.into();
        self
    }

    /// Set the upload slice size in bytes
    pub fn max_slice_size(mut self, bytes: u64) -> Self {
        self.config.upload.max_slice_size = bytes;
        self
    }

    /// Set retries per upload slice
    pub fn max_retries_per_slice(mut self, retries: u32) -> Self {
        self.config.upload.max_retries_per_slice = retries;
        self
    }

    /// Configure retry backoff
    pub fn retry_config(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Enable/disable jitter on retry delays
    pub fn jitter(mut self, enabled: bool) -> Self {
        self.config.retry.jitter = enabled;
        self
    }

    /// Build and validate the final configuration
    pub fn build(self) -> Result<OrchestrationConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for OrchestrationConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
