//! Processed-file ledger
//!
//! Plain-text file, one processed artifact name per line, append-only.
//! The ledger is the dedup source of truth: an input file keeps getting
//! picked up by discovery until its name lands here, and never afterwards.
//! Single-writer access is assumed (the scheduler runs at most one pipeline
//! instance at a time).

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{PipelineError, Result};

/// Persisted set of names that have been fully loaded into the warehouse
#[derive(Debug)]
pub struct ProcessedLedger {
    path: PathBuf,
    entries: HashSet<String>,
}

impl ProcessedLedger {
    /// Load the ledger from disk, treating a missing file as empty
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let entries = match File::open(&path) {
            Ok(file) => {
                let lines = BufReader::new(file)
                    .lines()
                    .collect::<std::io::Result<Vec<_>>>()
                    .map_err(|source| PipelineError::Ledger {
                        path: path.clone(),
                        source,
                    })?;
                lines
                    .into_iter()
                    .map(|line| line.trim().to_string())
                    .filter(|line| !line.is_empty())
                    .collect()
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Ledger not found, starting empty");
                HashSet::new()
            },
            Err(source) => return Err(PipelineError::Ledger { path, source }),
        };

        Ok(Self { path, entries })
    }

    /// Whether a name has already been processed
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains(name)
    }

    /// Number of recorded names
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append one processed name and make it durable before returning
    ///
    /// Called immediately after a warehouse commit; the fsync keeps the
    /// commit-to-ledger window as small as the platform allows.
    pub fn append(&mut self, name: &str) -> Result<()> {
        let ledger_err = |source| PipelineError::Ledger {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(ledger_err)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(ledger_err)?;
        writeln!(file, "{}", name).map_err(ledger_err)?;
        file.sync_all().map_err(ledger_err)?;

        self.entries.insert(name.to_string());
        Ok(())
    }
}
