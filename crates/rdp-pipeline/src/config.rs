//! Pipeline configuration
//!
//! All paths and warehouse identifiers live in an explicit [`PipelineConfig`]
//! passed to each stage at construction. Values come from environment
//! variables with the defaults below; there is no process-global state.

use rdp_common::{RdpError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// Pipeline Configuration Constants
// ============================================================================

/// Default directory scanned for new catalog CSV files.
pub const DEFAULT_INPUT_DIR: &str = "./files";

/// Default directory receiving transformed artifacts.
pub const DEFAULT_OUTPUT_DIR: &str = "./transformed_files";

/// Default path of the processed-file ledger.
pub const DEFAULT_LEDGER_PATH: &str = "./processed_files/processed_files.txt";

/// Default warehouse stage receiving artifact uploads.
pub const DEFAULT_STAGE_NAME: &str = "RDP_STAGE";

/// Default warehouse table the copy-into targets.
pub const DEFAULT_TARGET_TABLE: &str = "PRODUCT_CATALOG";

/// Default number of retries for a failed stage.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default fixed delay between stage retries, in seconds.
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 300;

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory holding raw input CSV files
    pub input_dir: PathBuf,
    /// Directory receiving cleaned artifacts
    pub output_dir: PathBuf,
    /// Processed-file ledger location
    pub ledger_path: PathBuf,
    /// Warehouse stage name for artifact uploads
    pub stage_name: String,
    /// Warehouse table receiving catalog rows
    pub target_table: String,
    /// Per-stage retry policy
    pub retry: RetryPolicy,
}

/// Fixed-delay retry policy for failed stages
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// How many times a retryable stage failure is retried
    pub max_retries: u32,
    /// Delay between attempts, in seconds
    pub retry_delay_secs: u64,
}

impl RetryPolicy {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from(DEFAULT_INPUT_DIR),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            ledger_path: PathBuf::from(DEFAULT_LEDGER_PATH),
            stage_name: DEFAULT_STAGE_NAME.to_string(),
            target_table: DEFAULT_TARGET_TABLE.to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment and defaults
    ///
    /// Environment variables:
    /// - `RDP_INPUT_DIR`: directory scanned for input files
    /// - `RDP_OUTPUT_DIR`: directory for transformed artifacts
    /// - `RDP_LEDGER_PATH`: processed-file ledger location
    /// - `RDP_STAGE_NAME`: warehouse stage name
    /// - `RDP_TARGET_TABLE`: warehouse target table
    /// - `RDP_MAX_RETRIES`: retries per failed stage
    /// - `RDP_RETRY_DELAY_SECS`: fixed delay between retries
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Ok(dir) = std::env::var("RDP_INPUT_DIR") {
            config.input_dir = PathBuf::from(dir);
        }

        if let Ok(dir) = std::env::var("RDP_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }

        if let Ok(path) = std::env::var("RDP_LEDGER_PATH") {
            config.ledger_path = PathBuf::from(path);
        }

        if let Ok(stage) = std::env::var("RDP_STAGE_NAME") {
            config.stage_name = stage;
        }

        if let Ok(table) = std::env::var("RDP_TARGET_TABLE") {
            config.target_table = table;
        }

        if let Ok(val) = std::env::var("RDP_MAX_RETRIES") {
            config.retry.max_retries = parse_var("RDP_MAX_RETRIES", &val)?;
        }

        if let Ok(val) = std::env::var("RDP_RETRY_DELAY_SECS") {
            config.retry.retry_delay_secs = parse_var("RDP_RETRY_DELAY_SECS", &val)?;
        }

        Ok(config)
    }
}

/// Parse a numeric environment variable, rejecting garbage instead of
/// silently falling back to a default.
fn parse_var<T: std::str::FromStr>(field: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| RdpError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    })
}
