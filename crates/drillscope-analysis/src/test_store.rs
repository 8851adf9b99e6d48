//! In-memory `MeasureStore` that records what the engine asks for.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};

use drillscope_core::{
    Measure, MeasureQuery, MeasureRow, Metric, MetricId, Qualifier, Resource, ResourceId,
    ResourceSnapshot, Snapshot, SnapshotId, ValueColumn,
};
use drillscope_store::{MeasureStore, StoreError};

#[derive(Debug, Default)]
pub(crate) struct RecordingStore {
    resources: BTreeMap<ResourceId, Resource>,
    snapshots: BTreeMap<SnapshotId, Snapshot>,
    metrics: Vec<Metric>,
    measures: Vec<Measure>,
    queries: RefCell<Vec<MeasureQuery>>,
    snapshot_lookups: RefCell<Vec<Vec<SnapshotId>>>,
    exists_checks: Cell<usize>,
}

impl RecordingStore {
    pub(crate) fn add_resource(&mut self, resource: Resource) {
        self.resources.insert(resource.id, resource);
    }

    pub(crate) fn add_snapshot(&mut self, snapshot: Snapshot) {
        self.snapshots.insert(snapshot.id, snapshot);
    }

    pub(crate) fn add_metric(&mut self, metric: Metric) {
        self.metrics.push(metric);
    }

    pub(crate) fn add_measure(&mut self, measure: Measure) {
        self.measures.push(measure);
    }

    pub(crate) fn queries(&self) -> Vec<MeasureQuery> {
        self.queries.borrow().clone()
    }

    pub(crate) fn snapshot_lookups(&self) -> Vec<Vec<SnapshotId>> {
        self.snapshot_lookups.borrow().clone()
    }

    pub(crate) fn exists_checks(&self) -> usize {
        self.exists_checks.get()
    }
}

impl MeasureStore for RecordingStore {
    fn find_resource_by_key(&self, key: &str) -> Result<Option<Resource>, StoreError> {
        Ok(self
            .resources
            .values()
            .find(|resource| resource.key == key)
            .cloned())
    }

    fn find_resources_by_keys(&self, keys: &[String]) -> Result<Vec<Resource>, StoreError> {
        Ok(self
            .resources
            .values()
            .filter(|resource| keys.contains(&resource.key))
            .cloned()
            .collect())
    }

    fn find_metric_by_key(&self, key: &str) -> Result<Option<Metric>, StoreError> {
        Ok(self.metrics.iter().find(|metric| metric.key == key).cloned())
    }

    fn find_latest_snapshot(&self, resource: &Resource) -> Result<Option<Snapshot>, StoreError> {
        Ok(self
            .snapshots
            .values()
            .filter(|snapshot| snapshot.resource_id == resource.id && snapshot.is_last)
            .max_by_key(|snapshot| snapshot.id)
            .cloned())
    }

    fn resource_copy(&self, resource: &Resource) -> Result<Option<Resource>, StoreError> {
        Ok(resource
            .copy_resource_id
            .and_then(|id| self.resources.get(&id))
            .cloned())
    }

    fn query_measures(&self, query: &MeasureQuery) -> Result<Vec<MeasureRow>, StoreError> {
        self.queries.borrow_mut().push(query.clone());

        let mut matching = self
            .measures
            .iter()
            .filter_map(|measure| {
                let snapshot = self.snapshots.get(&measure.snapshot_id)?;
                query
                    .matches(snapshot, measure)
                    .then_some((snapshot.resource_id, measure))
            })
            .collect::<Vec<_>>();
        matching.sort_by(|left, right| query.compare(*left, *right));

        Ok(matching
            .into_iter()
            .take(query.limit as usize)
            .map(|(_, measure)| measure.to_row(query.value_column))
            .collect())
    }

    fn find_snapshots_with_resources(
        &self,
        snapshot_ids: &[SnapshotId],
    ) -> Result<HashMap<SnapshotId, ResourceSnapshot>, StoreError> {
        self.snapshot_lookups.borrow_mut().push(snapshot_ids.to_vec());

        Ok(snapshot_ids
            .iter()
            .filter_map(|id| {
                let snapshot = self.snapshots.get(id)?;
                let resource = self.resources.get(&snapshot.resource_id)?;
                Some((*id, ResourceSnapshot::new(snapshot.clone(), resource.clone())))
            })
            .collect())
    }

    fn measure_exists(
        &self,
        snapshot_id: SnapshotId,
        metric_id: MetricId,
        column: ValueColumn,
    ) -> Result<bool, StoreError> {
        self.exists_checks.set(self.exists_checks.get() + 1);
        Ok(self.measures.iter().any(|measure| {
            measure.snapshot_id == snapshot_id
                && measure.metric_id == metric_id
                && measure.value_in(column).is_some()
        }))
    }
}

pub(crate) fn resource(id: ResourceId, key: &str, qualifier: Qualifier) -> Resource {
    Resource {
        id,
        key: key.to_owned(),
        name: key.rsplit(':').next().unwrap_or(key).to_owned(),
        qualifier,
        copy_resource_id: None,
        person_id: None,
    }
}

pub(crate) fn snapshot(
    id: SnapshotId,
    resource_id: ResourceId,
    qualifier: Qualifier,
    root_snapshot_id: Option<SnapshotId>,
    path: &str,
) -> Snapshot {
    Snapshot {
        id,
        resource_id,
        qualifier,
        root_snapshot_id,
        path: path.to_owned(),
        is_last: true,
    }
}

pub(crate) fn measure(
    id: i64,
    snapshot_id: SnapshotId,
    metric_id: MetricId,
    value: Option<f64>,
) -> Measure {
    Measure {
        id,
        snapshot_id,
        metric_id,
        value,
        variation_values: [None; 5],
        text_value: None,
        alert_status: None,
        alert_text: None,
        rule_id: None,
        characteristic_id: None,
        person_id: None,
    }
}
