//! Input file discovery
//!
//! Read-only stage: lists candidate CSV files in the input directory and
//! subtracts everything the processed-file ledger already records. Safe to
//! retry any number of times.

use std::path::PathBuf;
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::ledger::ProcessedLedger;
use crate::transform::artifact_file_name;

/// Extension the pipeline picks up from the input directory
const INPUT_EXTENSION: &str = "csv";

/// Outcome of a discovery pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovery {
    /// New input files, sorted by name
    Batch(Vec<PathBuf>),
    /// Everything in the input directory is already recorded in the ledger.
    /// The expected outcome of most scheduled runs, not an error.
    NoWork,
}

/// Discovery stage
pub struct Discoverer {
    input_dir: PathBuf,
    ledger_path: PathBuf,
}

impl Discoverer {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            input_dir: config.input_dir.clone(),
            ledger_path: config.ledger_path.clone(),
        }
    }

    /// List candidate inputs and subtract the ledger
    ///
    /// A candidate is excluded when the ledger holds either its base name or
    /// its derived artifact name, so both historical ledger formats dedup
    /// correctly.
    pub fn discover(&self) -> Result<Discovery> {
        let ledger = ProcessedLedger::load(&self.ledger_path)?;

        let entries = std::fs::read_dir(&self.input_dir).map_err(|source| {
            PipelineError::Discovery {
                path: self.input_dir.clone(),
                source,
            }
        })?;

        let mut candidates = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| PipelineError::Discovery {
                path: self.input_dir.clone(),
                source,
            })?;
            let path = entry.path();

            if path.extension().and_then(|ext| ext.to_str()) != Some(INPUT_EXTENSION)
                || !path.is_file()
            {
                continue;
            }

            let Some(base) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };

            if ledger.contains(base) || ledger.contains(&artifact_file_name(&path)) {
                debug!(file = base, "Already processed, skipping");
                continue;
            }

            candidates.push(path);
        }

        if candidates.is_empty() {
            info!(input_dir = %self.input_dir.display(), "No new files to process");
            return Ok(Discovery::NoWork);
        }

        // Filesystem listing order is not deterministic; sort for
        // reproducible batches.
        candidates.sort();
        info!(count = candidates.len(), "Discovered new input files");
        Ok(Discovery::Batch(candidates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_for(dir: &TempDir) -> PipelineConfig {
        PipelineConfig {
            input_dir: dir.path().join("files"),
            output_dir: dir.path().join("transformed_files"),
            ledger_path: dir.path().join("processed_files.txt"),
            ..PipelineConfig::default()
        }
    }

    fn touch(path: PathBuf) {
        std::fs::write(path, "product_name\nWidget\n").unwrap();
    }

    #[test]
    fn test_discover_sorted_batch() {
        let dir = TempDir::new().unwrap();
        let config = config_for(&dir);
        std::fs::create_dir_all(&config.input_dir).unwrap();
        touch(config.input_dir.join("b.csv"));
        touch(config.input_dir.join("a.csv"));
        touch(config.input_dir.join("notes.txt"));

        let discovery = Discoverer::new(&config).discover().unwrap();
        let Discovery::Batch(files) = discovery else {
            panic!("expected a batch");
        };
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, ["a.csv", "b.csv"]);
    }

    #[test]
    fn test_ledger_excludes_by_base_name() {
        let dir = TempDir::new().unwrap();
        let config = config_for(&dir);
        std::fs::create_dir_all(&config.input_dir).unwrap();
        touch(config.input_dir.join("a.csv"));
        std::fs::write(&config.ledger_path, "a.csv\n").unwrap();

        let discovery = Discoverer::new(&config).discover().unwrap();
        assert_eq!(discovery, Discovery::NoWork);
    }

    #[test]
    fn test_ledger_excludes_by_artifact_name() {
        let dir = TempDir::new().unwrap();
        let config = config_for(&dir);
        std::fs::create_dir_all(&config.input_dir).unwrap();
        touch(config.input_dir.join("a.csv"));
        touch(config.input_dir.join("b.csv"));
        std::fs::write(&config.ledger_path, "transformed_a.csv\n").unwrap();

        let discovery = Discoverer::new(&config).discover().unwrap();
        let Discovery::Batch(files) = discovery else {
            panic!("expected a batch");
        };
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("b.csv"));
    }

    #[test]
    fn test_missing_input_dir_is_retryable() {
        let dir = TempDir::new().unwrap();
        let config = config_for(&dir);

        let err = Discoverer::new(&config).discover().unwrap_err();
        assert!(matches!(err, PipelineError::Discovery { .. }));
        assert!(err.is_retryable());
    }
}
