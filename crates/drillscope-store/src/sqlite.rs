use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use drillscope_config::{StoreConfig, drillscope_dir};
use drillscope_core::{
    CoreError, Measure, MeasureQuery, MeasureRow, Metric, MetricDirection, MetricId, Resource,
    ResourceSnapshot, ScopeFilter, Snapshot, SnapshotId, ValueColumn,
};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

use super::{MeasureStore, StoreError, run_migrations};

pub const MEASURES_DB_FILE_NAME: &str = "measures.sqlite";

const RESOURCE_COLUMNS: &str =
    "r.id, r.kee, r.name, r.qualifier, r.copy_resource_id, r.person_id";
const SNAPSHOT_COLUMNS: &str =
    "s.id, s.resource_id, s.qualifier, s.root_snapshot_id, s.path, s.islast";

/// SQLite-backed measure store. Every call opens its own connection, so one
/// instance can serve concurrent readers.
#[derive(Debug, Clone)]
pub struct SqliteMeasureStore {
    sqlite_path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteMeasureStore {
    pub fn open(workspace_root: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with_config(workspace_root, &StoreConfig::default())
    }

    pub fn open_with_config(
        workspace_root: impl AsRef<Path>,
        config: &StoreConfig,
    ) -> Result<Self, StoreError> {
        let dir = drillscope_dir(workspace_root);
        fs::create_dir_all(&dir)?;

        let store = Self {
            sqlite_path: dir.join(MEASURES_DB_FILE_NAME),
            busy_timeout: Duration::from_millis(config.busy_timeout_ms),
        };

        let conn = store.connection()?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        run_migrations(&conn)?;
        drop(conn);

        Ok(store)
    }

    pub fn sqlite_path(&self) -> &Path {
        &self.sqlite_path
    }

    fn connection(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.sqlite_path)?;
        conn.busy_timeout(self.busy_timeout)?;
        Ok(conn)
    }

    pub fn upsert_resource(&self, resource: &Resource) -> Result<(), StoreError> {
        self.connection()?.execute(
            r#"
            INSERT INTO resources (id, kee, name, qualifier, copy_resource_id, person_id)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                kee = excluded.kee,
                name = excluded.name,
                qualifier = excluded.qualifier,
                copy_resource_id = excluded.copy_resource_id,
                person_id = excluded.person_id
            "#,
            params![
                resource.id,
                resource.key,
                resource.name,
                resource.qualifier.as_str(),
                resource.copy_resource_id,
                resource.person_id,
            ],
        )?;
        Ok(())
    }

    pub fn upsert_metric(&self, metric: &Metric) -> Result<(), StoreError> {
        self.connection()?.execute(
            r#"
            INSERT INTO metrics (id, kee, name, direction, best_value)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                kee = excluded.kee,
                name = excluded.name,
                direction = excluded.direction,
                best_value = excluded.best_value
            "#,
            params![
                metric.id,
                metric.key,
                metric.name,
                metric.direction.as_i64(),
                metric.best_value,
            ],
        )?;
        Ok(())
    }

    pub fn upsert_snapshot(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        self.connection()?.execute(
            r#"
            INSERT INTO snapshots (id, resource_id, qualifier, root_snapshot_id, path, islast)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                resource_id = excluded.resource_id,
                qualifier = excluded.qualifier,
                root_snapshot_id = excluded.root_snapshot_id,
                path = excluded.path,
                islast = excluded.islast
            "#,
            params![
                snapshot.id,
                snapshot.resource_id,
                snapshot.qualifier.as_str(),
                snapshot.root_snapshot_id,
                snapshot.path,
                snapshot.is_last,
            ],
        )?;
        Ok(())
    }

    pub fn upsert_measure(&self, measure: &Measure) -> Result<(), StoreError> {
        let [v1, v2, v3, v4, v5] = measure.variation_values;
        self.connection()?.execute(
            r#"
            INSERT INTO project_measures (
                id, snapshot_id, metric_id, value,
                variation_value_1, variation_value_2, variation_value_3,
                variation_value_4, variation_value_5,
                text_value, alert_status, alert_text,
                rule_id, characteristic_id, person_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            ON CONFLICT(id) DO UPDATE SET
                snapshot_id = excluded.snapshot_id,
                metric_id = excluded.metric_id,
                value = excluded.value,
                variation_value_1 = excluded.variation_value_1,
                variation_value_2 = excluded.variation_value_2,
                variation_value_3 = excluded.variation_value_3,
                variation_value_4 = excluded.variation_value_4,
                variation_value_5 = excluded.variation_value_5,
                text_value = excluded.text_value,
                alert_status = excluded.alert_status,
                alert_text = excluded.alert_text,
                rule_id = excluded.rule_id,
                characteristic_id = excluded.characteristic_id,
                person_id = excluded.person_id
            "#,
            params![
                measure.id,
                measure.snapshot_id,
                measure.metric_id,
                measure.value,
                v1,
                v2,
                v3,
                v4,
                v5,
                measure.text_value,
                measure.alert_status,
                measure.alert_text,
                measure.rule_id,
                measure.characteristic_id,
                measure.person_id,
            ],
        )?;
        Ok(())
    }

    fn find_resource(&self, id: i64) -> Result<Option<Resource>, StoreError> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {RESOURCE_COLUMNS} FROM resources r WHERE r.id = ?1"
        ))?;
        let raw = stmt
            .query_row(params![id], |row| RawResource::from_row(row, 0))
            .optional()?;
        raw.map(RawResource::into_resource)
            .transpose()
            .map_err(Into::into)
    }
}

impl MeasureStore for SqliteMeasureStore {
    fn find_resource_by_key(&self, key: &str) -> Result<Option<Resource>, StoreError> {
        let key = key.trim();
        if key.is_empty() {
            return Ok(None);
        }

        let conn = self.connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {RESOURCE_COLUMNS} FROM resources r WHERE r.kee = ?1"
        ))?;
        let raw = stmt
            .query_row(params![key], |row| RawResource::from_row(row, 0))
            .optional()?;
        raw.map(RawResource::into_resource)
            .transpose()
            .map_err(Into::into)
    }

    fn find_resources_by_keys(&self, keys: &[String]) -> Result<Vec<Resource>, StoreError> {
        let keys = keys
            .iter()
            .map(|key| key.trim())
            .filter(|key| !key.is_empty())
            .collect::<BTreeSet<_>>();
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {RESOURCE_COLUMNS} FROM resources r WHERE r.kee IN ({}) ORDER BY r.id",
            placeholders(keys.len())
        ))?;
        let rows = stmt.query_map(params_from_iter(keys.iter()), |row| {
            RawResource::from_row(row, 0)
        })?;

        let raw = rows.collect::<Result<Vec<_>, _>>()?;
        raw.into_iter()
            .map(|raw| raw.into_resource().map_err(Into::into))
            .collect()
    }

    fn find_metric_by_key(&self, key: &str) -> Result<Option<Metric>, StoreError> {
        let key = key.trim();
        if key.is_empty() {
            return Ok(None);
        }

        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, kee, name, direction, best_value
            FROM metrics
            WHERE kee = ?1
            "#,
        )?;
        let raw = stmt
            .query_row(params![key], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, Option<f64>>(4)?,
                ))
            })
            .optional()?;

        let Some((id, key, name, direction, best_value)) = raw else {
            return Ok(None);
        };
        Ok(Some(Metric {
            id,
            key,
            name,
            direction: MetricDirection::try_from(direction)?,
            best_value,
        }))
    }

    fn find_latest_snapshot(&self, resource: &Resource) -> Result<Option<Snapshot>, StoreError> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {SNAPSHOT_COLUMNS}
            FROM snapshots s
            WHERE s.resource_id = ?1 AND s.islast = 1
            ORDER BY s.id DESC
            LIMIT 1
            "#
        ))?;
        let raw = stmt
            .query_row(params![resource.id], |row| RawSnapshot::from_row(row, 0))
            .optional()?;
        raw.map(RawSnapshot::into_snapshot)
            .transpose()
            .map_err(Into::into)
    }

    fn resource_copy(&self, resource: &Resource) -> Result<Option<Resource>, StoreError> {
        match resource.copy_resource_id {
            Some(copy_id) => self.find_resource(copy_id),
            None => Ok(None),
        }
    }

    fn query_measures(&self, query: &MeasureQuery) -> Result<Vec<MeasureRow>, StoreError> {
        if query.qualifiers.is_empty() || query.limit == 0 {
            return Ok(Vec::new());
        }

        let (sql, values) = measure_query_sql(query);
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
            Ok(MeasureRow {
                id: row.get(0)?,
                metric_id: row.get(1)?,
                value: row.get(2)?,
                text_value: row.get(3)?,
                alert_status: row.get(4)?,
                alert_text: row.get(5)?,
                snapshot_id: row.get(6)?,
            })
        })?;
        let measures = rows.collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            root_snapshot_id = query.root_snapshot_id,
            qualifiers = ?query.qualifiers,
            value_column = query.value_column.column_name(),
            limit = query.limit,
            rows = measures.len(),
            "measure query executed"
        );
        Ok(measures)
    }

    fn find_snapshots_with_resources(
        &self,
        snapshot_ids: &[SnapshotId],
    ) -> Result<HashMap<SnapshotId, ResourceSnapshot>, StoreError> {
        let ids = snapshot_ids.iter().copied().collect::<BTreeSet<_>>();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let conn = self.connection()?;
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {SNAPSHOT_COLUMNS}, {RESOURCE_COLUMNS}
            FROM snapshots s
            JOIN resources r ON r.id = s.resource_id
            WHERE s.id IN ({})
            "#,
            placeholders(ids.len())
        ))?;
        let rows = stmt.query_map(params_from_iter(ids.iter()), |row| {
            Ok((RawSnapshot::from_row(row, 0)?, RawResource::from_row(row, 6)?))
        })?;

        let mut resolved = HashMap::with_capacity(ids.len());
        for row in rows {
            let (snapshot, resource) = row?;
            let snapshot = snapshot.into_snapshot()?;
            let resource = resource.into_resource()?;
            resolved.insert(snapshot.id, ResourceSnapshot::new(snapshot, resource));
        }
        Ok(resolved)
    }

    fn measure_exists(
        &self,
        snapshot_id: SnapshotId,
        metric_id: MetricId,
        column: ValueColumn,
    ) -> Result<bool, StoreError> {
        let conn = self.connection()?;
        let exists = conn.query_row(
            &format!(
                r#"
                SELECT EXISTS(
                    SELECT 1 FROM project_measures
                    WHERE snapshot_id = ?1 AND metric_id = ?2 AND {} IS NOT NULL
                )
                "#,
                column.column_name()
            ),
            params![snapshot_id, metric_id],
            |row| row.get::<_, bool>(0),
        )?;
        Ok(exists)
    }
}

/// SQL text and positional values for a measure query. Column names only
/// come from [`ValueColumn::column_name`], never from caller input.
fn measure_query_sql(query: &MeasureQuery) -> (String, Vec<Value>) {
    let column = query.value_column.column_name();
    let mut conditions = Vec::new();
    let mut values = Vec::new();

    conditions.push("s.root_snapshot_id = ?".to_owned());
    values.push(Value::Integer(query.root_snapshot_id));

    if query.last_snapshots_only {
        conditions.push("s.islast = 1".to_owned());
    }

    conditions.push(format!(
        "s.qualifier IN ({})",
        placeholders(query.qualifiers.len())
    ));
    values.extend(
        query
            .qualifiers
            .iter()
            .map(|qualifier| Value::Text(qualifier.as_str().to_owned())),
    );

    conditions.push(r"s.path LIKE ? ESCAPE '\'".to_owned());
    values.push(Value::Text(format!("{}%", escape_like(&query.path_prefix))));

    conditions.push("m.metric_id = ?".to_owned());
    values.push(Value::Integer(query.metric_id));

    conditions.push(format!("m.{column} IS NOT NULL"));

    if let Some(excluded) = query.excluded_value {
        conditions.push(format!("m.{column} <> ?"));
        values.push(Value::Real(excluded));
    }

    if query.exclude_zero {
        conditions.push(format!("m.{column} <> 0"));
    }

    push_scope_filter(&mut conditions, &mut values, "m.rule_id", query.rule);
    push_scope_filter(
        &mut conditions,
        &mut values,
        "m.characteristic_id",
        query.characteristic,
    );
    push_scope_filter(&mut conditions, &mut values, "m.person_id", query.person);

    values.push(Value::Integer(i64::from(query.limit)));

    let sql = format!(
        r#"
        SELECT m.id, m.metric_id, m.{column}, m.text_value,
               m.alert_status, m.alert_text, m.snapshot_id
        FROM project_measures m
        JOIN snapshots s ON s.id = m.snapshot_id
        WHERE {}
        ORDER BY m.{column} {}, s.resource_id ASC, m.id ASC
        LIMIT ?
        "#,
        conditions.join(" AND "),
        query.order.as_sql(),
    );

    (sql, values)
}

fn push_scope_filter(
    conditions: &mut Vec<String>,
    values: &mut Vec<Value>,
    column: &str,
    filter: ScopeFilter<i64>,
) {
    match filter {
        ScopeFilter::Exactly(id) => {
            conditions.push(format!("{column} = ?"));
            values.push(Value::Integer(id));
        }
        ScopeFilter::Absent => conditions.push(format!("{column} IS NULL")),
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

struct RawResource {
    id: i64,
    key: String,
    name: String,
    qualifier: String,
    copy_resource_id: Option<i64>,
    person_id: Option<i64>,
}

impl RawResource {
    fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(offset)?,
            key: row.get(offset + 1)?,
            name: row.get(offset + 2)?,
            qualifier: row.get(offset + 3)?,
            copy_resource_id: row.get(offset + 4)?,
            person_id: row.get(offset + 5)?,
        })
    }

    fn into_resource(self) -> Result<Resource, CoreError> {
        Ok(Resource {
            id: self.id,
            key: self.key,
            name: self.name,
            qualifier: self.qualifier.parse()?,
            copy_resource_id: self.copy_resource_id,
            person_id: self.person_id,
        })
    }
}

struct RawSnapshot {
    id: i64,
    resource_id: i64,
    qualifier: String,
    root_snapshot_id: Option<i64>,
    path: String,
    is_last: bool,
}

impl RawSnapshot {
    fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(offset)?,
            resource_id: row.get(offset + 1)?,
            qualifier: row.get(offset + 2)?,
            root_snapshot_id: row.get(offset + 3)?,
            path: row.get(offset + 4)?,
            is_last: row.get(offset + 5)?,
        })
    }

    fn into_snapshot(self) -> Result<Snapshot, CoreError> {
        Ok(Snapshot {
            id: self.id,
            resource_id: self.resource_id,
            qualifier: self.qualifier.parse()?,
            root_snapshot_id: self.root_snapshot_id,
            path: self.path,
            is_last: self.is_last,
        })
    }
}
