//! Retention engine configuration.
//!
//! # Example
//!
//! ```toml
//! [retention]
//! page_size = 100
//! worker_count = 10
//! lookahead_months = 3
//! dry_run = false
//! ```

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Settings shared by the full scan and the batch path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct RetentionConfig {
    /// Visits per page in the batch path.
    /// Default: 100
    #[serde(default = "default_page_size")]
    pub page_size: u64,

    /// Number of concurrent batch workers.
    /// Default: 10
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// How far ahead of today the batch candidate query looks, in months.
    /// Candidates are still checked against the exact current time before
    /// anything is written.
    /// Default: 3
    #[serde(default = "default_lookahead_months")]
    pub lookahead_months: u32,

    /// If true, log which visits would be transferred without writing.
    /// Default: false
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            worker_count: default_worker_count(),
            lookahead_months: default_lookahead_months(),
            dry_run: false,
        }
    }
}

impl RetentionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::Validation(
                "retention.page_size must be greater than 0".into(),
            ));
        }
        if self.worker_count == 0 {
            return Err(ConfigError::Validation(
                "retention.worker_count must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

fn default_page_size() -> u64 {
    100
}

fn default_worker_count() -> usize {
    10
}

fn default_lookahead_months() -> u32 {
    3
}
