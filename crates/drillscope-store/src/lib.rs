mod sqlite;

use std::collections::HashMap;

use drillscope_core::{
    CoreError, MeasureQuery, MeasureRow, Metric, MetricId, Resource, ResourceSnapshot, Snapshot,
    SnapshotId, ValueColumn,
};
use rusqlite::Connection;
use thiserror::Error;

pub use sqlite::{MEASURES_DB_FILE_NAME, SqliteMeasureStore};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("invalid stored data: {0}")]
    InvalidData(#[from] CoreError),
}

/// Read surface the drill-down engine needs from measure storage.
///
/// Implementations must tolerate concurrent read-only use; the engine never
/// writes through this trait.
pub trait MeasureStore {
    fn find_resource_by_key(&self, key: &str) -> Result<Option<Resource>, StoreError>;
    fn find_resources_by_keys(&self, keys: &[String]) -> Result<Vec<Resource>, StoreError>;
    fn find_metric_by_key(&self, key: &str) -> Result<Option<Metric>, StoreError>;

    /// Most recent snapshot of `resource`, if it was ever analyzed.
    fn find_latest_snapshot(&self, resource: &Resource) -> Result<Option<Snapshot>, StoreError>;

    /// Canonical resource when `resource` is a copy, `None` otherwise.
    fn resource_copy(&self, resource: &Resource) -> Result<Option<Resource>, StoreError>;

    /// Rows matching `query`, ranked and capped as described on
    /// [`MeasureQuery`].
    fn query_measures(&self, query: &MeasureQuery) -> Result<Vec<MeasureRow>, StoreError>;

    fn find_snapshots_with_resources(
        &self,
        snapshot_ids: &[SnapshotId],
    ) -> Result<HashMap<SnapshotId, ResourceSnapshot>, StoreError>;

    fn measure_exists(
        &self,
        snapshot_id: SnapshotId,
        metric_id: MetricId,
        column: ValueColumn,
    ) -> Result<bool, StoreError>;
}

fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS resources (
            id INTEGER PRIMARY KEY,
            kee TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            qualifier TEXT NOT NULL,
            copy_resource_id INTEGER,
            person_id INTEGER
        );

        CREATE TABLE IF NOT EXISTS snapshots (
            id INTEGER PRIMARY KEY,
            resource_id INTEGER NOT NULL,
            qualifier TEXT NOT NULL,
            root_snapshot_id INTEGER,
            path TEXT NOT NULL DEFAULT '',
            islast INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS snapshots_resource_islast
            ON snapshots(resource_id, islast);
        CREATE INDEX IF NOT EXISTS snapshots_root_qualifier
            ON snapshots(root_snapshot_id, islast, qualifier);

        CREATE TABLE IF NOT EXISTS metrics (
            id INTEGER PRIMARY KEY,
            kee TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            direction INTEGER NOT NULL DEFAULT 0,
            best_value REAL
        );

        CREATE TABLE IF NOT EXISTS project_measures (
            id INTEGER PRIMARY KEY,
            snapshot_id INTEGER NOT NULL,
            metric_id INTEGER NOT NULL,
            value REAL,
            variation_value_1 REAL,
            variation_value_2 REAL,
            variation_value_3 REAL,
            variation_value_4 REAL,
            variation_value_5 REAL,
            text_value TEXT,
            alert_status TEXT,
            alert_text TEXT,
            rule_id INTEGER,
            characteristic_id INTEGER,
            person_id INTEGER
        );

        CREATE INDEX IF NOT EXISTS measures_snapshot_metric
            ON project_measures(snapshot_id, metric_id);
        "#,
    )?;

    Ok(())
}
