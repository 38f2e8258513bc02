//! Warehouse load stage
//!
//! Each artifact gets its own transaction: stage upload, copy into the
//! target table, commit. The processed-file ledger is appended only after
//! the commit succeeds, so a ledger entry implies the rows are in the
//! warehouse. A failed artifact is rolled back and reported without
//! stopping the rest of the batch.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::ledger::ProcessedLedger;
use crate::warehouse::{copy_into_sql, stage_upload_sql, WarehouseClient, WarehouseConnection};

/// Outcome of one load invocation
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    /// Artifact names committed and recorded in the ledger, in load order
    pub loaded: Vec<String>,
    /// Artifacts whose transaction rolled back, with the failure reason
    pub failed: Vec<FailedArtifact>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// One artifact that failed to load
#[derive(Debug, Clone, Serialize)]
pub struct FailedArtifact {
    pub artifact: String,
    pub reason: String,
}

impl LoadReport {
    pub fn all_loaded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Load stage
pub struct Loader {
    client: Arc<dyn WarehouseClient>,
    stage_name: String,
    target_table: String,
    ledger_path: PathBuf,
}

impl Loader {
    pub fn new(config: &PipelineConfig, client: Arc<dyn WarehouseClient>) -> Self {
        Self {
            client,
            stage_name: config.stage_name.clone(),
            target_table: config.target_table.clone(),
            ledger_path: config.ledger_path.clone(),
        }
    }

    /// Stage and copy each artifact inside its own transaction
    ///
    /// Artifacts already present in the ledger are skipped, so no artifact
    /// loads twice even if it appears in the batch more than once. A ledger
    /// append failure aborts the stage: continuing would load artifacts the
    /// ledger cannot account for.
    pub async fn load(&self, artifacts: &[PathBuf]) -> Result<LoadReport> {
        let mut report = LoadReport {
            started_at: Some(Utc::now()),
            ..Default::default()
        };

        if artifacts.is_empty() {
            report.completed_at = Some(Utc::now());
            return Ok(report);
        }

        let mut ledger = ProcessedLedger::load(&self.ledger_path)?;
        let mut conn = self
            .client
            .connect()
            .await
            .map_err(|err| PipelineError::Warehouse(format!("connect failed: {err}")))?;

        for artifact in artifacts {
            let name = artifact
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or_default()
                .to_string();

            if ledger.contains(&name) {
                warn!(artifact = %name, "Artifact already recorded in ledger, skipping");
                continue;
            }

            match self.load_one(conn.as_mut(), artifact, &name).await {
                Ok(()) => {
                    ledger.append(&name)?;
                    info!(artifact = %name, table = %self.target_table, "Artifact loaded and recorded");
                    report.loaded.push(name);
                },
                Err(reason) => {
                    error!(
                        artifact = %name,
                        error = %reason,
                        "Artifact load failed, transaction rolled back"
                    );
                    report.failed.push(FailedArtifact {
                        artifact: name,
                        reason: reason.to_string(),
                    });
                },
            }
        }

        report.completed_at = Some(Utc::now());
        Ok(report)
    }

    /// Run one artifact's transaction; on any failure, roll back and leave
    /// the ledger untouched
    async fn load_one(
        &self,
        conn: &mut dyn WarehouseConnection,
        artifact: &Path,
        name: &str,
    ) -> anyhow::Result<()> {
        conn.set_autocommit(false).await?;

        match self.stage_and_copy(conn, artifact, name).await {
            Ok(()) => {
                conn.commit().await?;
                Ok(())
            },
            Err(err) => {
                if let Err(rollback_err) = conn.rollback().await {
                    warn!(artifact = %name, error = %rollback_err, "Rollback failed");
                }
                Err(err)
            },
        }
    }

    async fn stage_and_copy(
        &self,
        conn: &mut dyn WarehouseConnection,
        artifact: &Path,
        name: &str,
    ) -> anyhow::Result<()> {
        conn.execute(&stage_upload_sql(artifact, &self.stage_name))
            .await?;
        conn.execute(&copy_into_sql(name, &self.stage_name, &self.target_table))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Scripted warehouse that records every call and can fail `execute`
    /// for statements containing a marker string.
    struct MockWarehouse {
        calls: Arc<Mutex<Vec<String>>>,
        fail_on: Option<String>,
    }

    impl MockWarehouse {
        fn new(fail_on: Option<&str>) -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
                fail_on: fail_on.map(str::to_string),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl WarehouseClient for MockWarehouse {
        async fn connect(&self) -> anyhow::Result<Box<dyn WarehouseConnection>> {
            Ok(Box::new(MockConnection {
                calls: self.calls.clone(),
                fail_on: self.fail_on.clone(),
            }))
        }
    }

    struct MockConnection {
        calls: Arc<Mutex<Vec<String>>>,
        fail_on: Option<String>,
    }

    #[async_trait]
    impl WarehouseConnection for MockConnection {
        async fn set_autocommit(&mut self, enabled: bool) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(format!("AUTOCOMMIT {enabled}"));
            Ok(())
        }

        async fn execute(&mut self, sql: &str) -> anyhow::Result<()> {
            if let Some(ref marker) = self.fail_on {
                if sql.contains(marker) {
                    anyhow::bail!("injected failure for {marker}");
                }
            }
            self.calls.lock().unwrap().push(sql.to_string());
            Ok(())
        }

        async fn commit(&mut self) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push("COMMIT".to_string());
            Ok(())
        }

        async fn rollback(&mut self) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push("ROLLBACK".to_string());
            Ok(())
        }
    }

    fn loader_for(dir: &TempDir, warehouse: Arc<MockWarehouse>) -> Loader {
        let config = PipelineConfig {
            input_dir: dir.path().join("files"),
            output_dir: dir.path().join("transformed_files"),
            ledger_path: dir.path().join("processed_files.txt"),
            ..PipelineConfig::default()
        };
        Loader::new(&config, warehouse)
    }

    #[tokio::test]
    async fn test_successful_load_commits_then_records() {
        let dir = TempDir::new().unwrap();
        let warehouse = Arc::new(MockWarehouse::new(None));
        let loader = loader_for(&dir, warehouse.clone());

        let report = loader
            .load(&[dir.path().join("transformed_b.csv")])
            .await
            .unwrap();

        assert_eq!(report.loaded, ["transformed_b.csv"]);
        assert!(report.all_loaded());

        let calls = warehouse.calls();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[0], "AUTOCOMMIT false");
        assert!(calls[1].starts_with("PUT 'file://"));
        assert!(calls[2].starts_with("COPY INTO PRODUCT_CATALOG"));
        assert_eq!(calls[3], "COMMIT");

        let ledger = ProcessedLedger::load(dir.path().join("processed_files.txt")).unwrap();
        assert!(ledger.contains("transformed_b.csv"));
    }

    #[tokio::test]
    async fn test_failed_copy_rolls_back_and_continues() {
        let dir = TempDir::new().unwrap();
        let warehouse = Arc::new(MockWarehouse::new(Some("@RDP_STAGE/transformed_c.csv")));
        let loader = loader_for(&dir, warehouse.clone());

        let report = loader
            .load(&[
                dir.path().join("transformed_c.csv"),
                dir.path().join("transformed_d.csv"),
            ])
            .await
            .unwrap();

        assert_eq!(report.loaded, ["transformed_d.csv"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].artifact, "transformed_c.csv");

        let calls = warehouse.calls();
        assert!(calls.contains(&"ROLLBACK".to_string()));

        let ledger = ProcessedLedger::load(dir.path().join("processed_files.txt")).unwrap();
        assert!(!ledger.contains("transformed_c.csv"));
        assert!(ledger.contains("transformed_d.csv"));
    }

    #[tokio::test]
    async fn test_duplicate_artifact_loads_once() {
        let dir = TempDir::new().unwrap();
        let warehouse = Arc::new(MockWarehouse::new(None));
        let loader = loader_for(&dir, warehouse.clone());

        let artifact = dir.path().join("transformed_b.csv");
        let report = loader.load(&[artifact.clone(), artifact]).await.unwrap();

        assert_eq!(report.loaded.len(), 1);
        let commits = warehouse
            .calls()
            .iter()
            .filter(|call| *call == "COMMIT")
            .count();
        assert_eq!(commits, 1);
    }
}
