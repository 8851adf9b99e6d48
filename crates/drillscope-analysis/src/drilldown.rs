use std::collections::BTreeSet;

use drillscope_core::{
    Metric, Period, Resource, ResourceId, ResourceSnapshot, Snapshot, ValueColumn,
};
use drillscope_store::{MeasureStore, StoreError};
use serde::Serialize;

use crate::column::DrilldownColumn;
use crate::query::{DrilldownOptions, MeasureQueryBuilder};

/// Upper bound on walked levels. Hierarchy trees are at most four deep; only
/// copy chains pointing back at an ancestor can get near this.
const MAX_WALKED_COLUMNS: usize = 32;

/// Ranked children of a resource for one metric, level by level.
#[derive(Debug, Clone, Serialize)]
pub struct Drilldown {
    resource: Resource,
    metric: Metric,
    selected_resource_ids: BTreeSet<ResourceId>,
    snapshot: Option<Snapshot>,
    columns: Vec<DrilldownColumn>,
}

impl Drilldown {
    /// Walks the hierarchy below `resource`'s latest snapshot. Only columns
    /// with at least one measure are kept, but empty levels still advance
    /// the walk. A resource that was never analyzed yields no columns.
    pub fn build<S: MeasureStore + ?Sized>(
        store: &S,
        resource: Resource,
        metric: Metric,
        selected_resource_ids: impl IntoIterator<Item = ResourceId>,
        options: &DrilldownOptions,
    ) -> Result<Self, StoreError> {
        let selected_resource_ids = selected_resource_ids.into_iter().collect::<BTreeSet<_>>();
        let snapshot = store.find_latest_snapshot(&resource)?;

        let mut drilldown = Self {
            resource,
            metric,
            selected_resource_ids,
            snapshot,
            columns: Vec::new(),
        };
        let Some(snapshot) = drilldown.snapshot.clone() else {
            tracing::debug!(
                resource = %drilldown.resource.key,
                "resource has no snapshot, drill-down is empty"
            );
            return Ok(drilldown);
        };

        let root = ResourceSnapshot::new(snapshot, drilldown.resource.clone());
        let builder = MeasureQueryBuilder::new(&drilldown.metric, options);
        let mut walked: Vec<DrilldownColumn> = Vec::new();

        loop {
            let Some(mut column) = DrilldownColumn::derive(store, &root, walked.last())? else {
                break;
            };
            column.compute_measures(store, &builder, &drilldown.selected_resource_ids)?;
            walked.push(column);

            if walked.len() >= MAX_WALKED_COLUMNS {
                tracing::warn!(
                    resource = %drilldown.resource.key,
                    columns = walked.len(),
                    "drill-down stopped at the column limit; check for cyclic copy resources"
                );
                break;
            }
        }

        tracing::debug!(
            resource = %drilldown.resource.key,
            metric = %drilldown.metric.key,
            walked = walked.len(),
            "drill-down walk finished"
        );
        walked.retain(DrilldownColumn::is_displayed);
        drilldown.columns = walked;
        Ok(drilldown)
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    pub fn metric(&self) -> &Metric {
        &self.metric
    }

    /// Latest snapshot of the drilled resource.
    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    pub fn columns(&self) -> &[DrilldownColumn] {
        &self.columns
    }

    /// Whether the drilled resource itself has a plain value for the metric.
    pub fn has_value<S: MeasureStore + ?Sized>(&self, store: &S) -> Result<bool, StoreError> {
        self.exists_in(store, ValueColumn::Value)
    }

    /// Whether the drilled resource has a variation for `period`.
    pub fn has_period_value<S: MeasureStore + ?Sized>(
        &self,
        store: &S,
        period: Period,
    ) -> Result<bool, StoreError> {
        self.exists_in(store, ValueColumn::Variation(period))
    }

    fn exists_in<S: MeasureStore + ?Sized>(
        &self,
        store: &S,
        column: ValueColumn,
    ) -> Result<bool, StoreError> {
        match &self.snapshot {
            Some(snapshot) => store.measure_exists(snapshot.id, self.metric.id, column),
            None => Ok(false),
        }
    }
}
