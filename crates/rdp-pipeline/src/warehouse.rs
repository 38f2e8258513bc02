//! Warehouse collaborator interface
//!
//! The pipeline issues exactly two SQL operations per artifact, a stage
//! upload and a copy-into-table, through the traits below. Concrete clients
//! live outside this crate; tests use a scripted in-process mock.

use async_trait::async_trait;
use std::path::Path;

/// Connection factory for the warehouse
#[async_trait]
pub trait WarehouseClient: Send + Sync {
    /// Open a connection. The connection is released when the returned
    /// handle drops, on every exit path.
    async fn connect(&self) -> anyhow::Result<Box<dyn WarehouseConnection>>;
}

/// One open warehouse connection
#[async_trait]
pub trait WarehouseConnection: Send {
    /// Toggle autocommit for the connection
    async fn set_autocommit(&mut self, enabled: bool) -> anyhow::Result<()>;

    /// Execute a single SQL statement
    async fn execute(&mut self, sql: &str) -> anyhow::Result<()>;

    /// Commit the open transaction
    async fn commit(&mut self) -> anyhow::Result<()>;

    /// Roll back the open transaction
    async fn rollback(&mut self) -> anyhow::Result<()>;
}

/// Stage-upload command for one artifact (compressed warehouse-side copy)
pub fn stage_upload_sql(artifact: &Path, stage_name: &str) -> String {
    format!(
        "PUT 'file://{}' @{} AUTO_COMPRESS=TRUE",
        artifact.display(),
        stage_name
    )
}

/// Copy-into-table command referencing a staged artifact
pub fn copy_into_sql(artifact_name: &str, stage_name: &str, target_table: &str) -> String {
    format!(
        "COPY INTO {} FROM @{}/{} \
         FILE_FORMAT = (TYPE = 'CSV', FIELD_OPTIONALLY_ENCLOSED_BY='\"', SKIP_HEADER = 1)",
        target_table, stage_name, artifact_name
    )
}
