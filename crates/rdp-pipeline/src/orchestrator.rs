//! Stage orchestration
//!
//! Threads the three stages together with direct typed return values and
//! applies the retry policy: a stage that fails with a retryable error is
//! re-run after a fixed delay, up to the configured count. Data-contract
//! violations are surfaced immediately since re-running them cannot help.
//!
//! Periodic invocation and run-level mutual exclusion belong to the
//! external scheduler; this type only knows how to run one cycle.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::discover::{Discoverer, Discovery};
use crate::error::PipelineError;
use crate::load::{LoadReport, Loader};
use crate::transform::Transformer;
use crate::warehouse::WarehouseClient;

/// Counters for one pipeline run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    pub run_id: Uuid,
    pub files_discovered: usize,
    pub artifacts_written: usize,
    pub artifacts_loaded: usize,
    pub artifacts_failed: usize,
    pub duration_secs: f64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl RunStats {
    fn finish(run_id: Uuid, started_at: DateTime<Utc>) -> Self {
        let completed_at = Utc::now();
        Self {
            run_id,
            duration_secs: (completed_at - started_at).num_milliseconds() as f64 / 1000.0,
            started_at: Some(started_at),
            completed_at: Some(completed_at),
            ..Default::default()
        }
    }
}

/// One pipeline instance: discover, transform, load
pub struct Orchestrator {
    config: PipelineConfig,
    discoverer: Discoverer,
    transformer: Transformer,
    loader: Loader,
}

impl Orchestrator {
    pub fn new(config: PipelineConfig, client: Arc<dyn WarehouseClient>) -> Self {
        let discoverer = Discoverer::new(&config);
        let transformer = Transformer::new(&config);
        let loader = Loader::new(&config, client);
        Self {
            config,
            discoverer,
            transformer,
            loader,
        }
    }

    /// Run one discover, transform, load cycle
    pub async fn run_once(&self) -> Result<RunStats> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, "Pipeline run starting");

        let discovery = self
            .retry_stage("discover", || self.discoverer.discover())
            .await
            .context("discover stage failed")?;

        let files = match discovery {
            Discovery::NoWork => {
                info!(%run_id, "No new files, run complete");
                return Ok(RunStats::finish(run_id, started_at));
            },
            Discovery::Batch(files) => files,
        };

        let artifacts = self
            .retry_stage("transform", || self.transformer.transform(&files))
            .await
            .context("transform stage failed")?;

        let report = self.load_with_retries(&artifacts).await?;

        let mut stats = RunStats::finish(run_id, started_at);
        stats.files_discovered = files.len();
        stats.artifacts_written = artifacts.len();
        stats.artifacts_loaded = report.loaded.len();
        stats.artifacts_failed = report.failed.len();

        info!(
            %run_id,
            discovered = stats.files_discovered,
            loaded = stats.artifacts_loaded,
            failed = stats.artifacts_failed,
            "Pipeline run complete"
        );
        Ok(stats)
    }

    /// Retry a synchronous stage on retryable errors, with a fixed delay
    async fn retry_stage<T, F>(&self, stage: &str, mut op: F) -> std::result::Result<T, PipelineError>
    where
        F: FnMut() -> std::result::Result<T, PipelineError>,
    {
        let policy = self.config.retry;
        let mut attempt = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < policy.max_retries => {
                    attempt += 1;
                    warn!(
                        stage,
                        attempt,
                        max_retries = policy.max_retries,
                        error = %err,
                        "Stage failed, retrying after delay"
                    );
                    sleep(policy.delay()).await;
                },
                Err(err) => return Err(err),
            }
        }
    }

    /// Retry the load stage as a whole; artifacts already in the ledger are
    /// skipped by the loader, so a retry only touches unfinished work
    async fn load_with_retries(&self, artifacts: &[std::path::PathBuf]) -> Result<LoadReport> {
        let policy = self.config.retry;
        let mut attempt = 0;
        loop {
            match self.loader.load(artifacts).await {
                Ok(report) => return Ok(report),
                Err(err) if err.is_retryable() && attempt < policy.max_retries => {
                    attempt += 1;
                    warn!(
                        stage = "load",
                        attempt,
                        max_retries = policy.max_retries,
                        error = %err,
                        "Stage failed, retrying after delay"
                    );
                    sleep(policy.delay()).await;
                },
                Err(err) => return Err(err).context("load stage failed"),
            }
        }
    }
}
