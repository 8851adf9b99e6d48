use std::collections::{BTreeSet, HashMap};

use drillscope_core::{
    MeasureRow, PersonId, QualifierGroup, Resource, ResourceId, ResourceSnapshot, Snapshot,
    SnapshotId, child_qualifiers, child_qualifiers_of_group,
};
use drillscope_store::{MeasureStore, StoreError};
use serde::Serialize;

use crate::query::MeasureQueryBuilder;

/// One level of a drill-down: the children of `base` restricted to
/// `qualifiers`, ranked on the drill-down metric.
#[derive(Debug, Clone, Serialize)]
pub struct DrilldownColumn {
    depth: usize,
    base: ResourceSnapshot,
    qualifiers: QualifierGroup,
    person_id: Option<PersonId>,
    measures: Vec<MeasureRow>,
    #[serde(skip)]
    resources_by_snapshot: HashMap<SnapshotId, Resource>,
    selected: Option<ResourceSnapshot>,
}

impl DrilldownColumn {
    /// Builds the column following `previous`, or the first column when
    /// `previous` is `None`. Returns `None` when no further level exists:
    /// either no base snapshot resolves or the qualifier scope is empty.
    pub fn derive<S: MeasureStore + ?Sized>(
        store: &S,
        root: &ResourceSnapshot,
        previous: Option<&DrilldownColumn>,
    ) -> Result<Option<Self>, StoreError> {
        let (mut base, person_id) = match previous {
            Some(previous) => {
                let base = previous
                    .selected
                    .as_ref()
                    .unwrap_or(&previous.base)
                    .clone();
                let person_id = previous.person_id.or(base.resource.person_id);
                (base, person_id)
            }
            None => (root.clone(), root.resource.person_id),
        };
        let depth = previous.map_or(0, |previous| previous.depth + 1);

        let qualifiers = match store.resource_copy(&base.resource)? {
            Some(canonical) => {
                let Some(snapshot) = store.find_latest_snapshot(&canonical)? else {
                    tracing::debug!(
                        depth,
                        copy = %base.resource.key,
                        canonical = %canonical.key,
                        "canonical resource has no snapshot, drill-down stops"
                    );
                    return Ok(None);
                };
                tracing::debug!(
                    depth,
                    copy = %base.resource.key,
                    canonical = %canonical.key,
                    snapshot_id = snapshot.id,
                    "redirecting copy to canonical resource"
                );
                // A copy restarts the walk from the canonical resource's own level.
                let qualifiers = child_qualifiers(snapshot.qualifier);
                base = ResourceSnapshot::new(snapshot, canonical);
                qualifiers
            }
            None => match previous {
                Some(previous) => child_qualifiers_of_group(previous.qualifiers),
                None => child_qualifiers(root.snapshot.qualifier),
            },
        };

        if qualifiers.is_empty() {
            return Ok(None);
        }

        tracing::debug!(
            depth,
            base_snapshot_id = base.snapshot.id,
            qualifiers = ?qualifiers,
            person_id = ?person_id,
            "drill-down column derived"
        );

        Ok(Some(Self {
            depth,
            base,
            qualifiers,
            person_id,
            measures: Vec::new(),
            resources_by_snapshot: HashMap::new(),
            selected: None,
        }))
    }

    /// Runs the column's measure query and resolves the resources behind the
    /// returned rows. The first ranked row owned by a selected resource
    /// becomes the selected child.
    pub fn compute_measures<S: MeasureStore + ?Sized>(
        &mut self,
        store: &S,
        builder: &MeasureQueryBuilder<'_>,
        selected_resource_ids: &BTreeSet<ResourceId>,
    ) -> Result<(), StoreError> {
        let query = builder.build(&self.base.snapshot, self.qualifiers, self.person_id);
        let mut measures = store.query_measures(&query)?;
        measures.truncate(query.limit as usize);

        let mut snapshot_ids = Vec::new();
        for measure in &measures {
            if !snapshot_ids.contains(&measure.snapshot_id) {
                snapshot_ids.push(measure.snapshot_id);
            }
        }
        let resolved = if snapshot_ids.is_empty() {
            HashMap::new()
        } else {
            store.find_snapshots_with_resources(&snapshot_ids)?
        };

        self.selected = measures
            .iter()
            .filter_map(|measure| resolved.get(&measure.snapshot_id))
            .find(|child| selected_resource_ids.contains(&child.resource.id))
            .cloned();
        self.resources_by_snapshot = resolved
            .into_iter()
            .map(|(snapshot_id, child)| (snapshot_id, child.resource))
            .collect();
        self.measures = measures;

        tracing::debug!(
            depth = self.depth,
            measures = self.measures.len(),
            selected = ?self.selected.as_ref().map(|child| child.resource.id),
            "drill-down column measured"
        );
        Ok(())
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn base_snapshot(&self) -> &Snapshot {
        &self.base.snapshot
    }

    pub fn base_resource(&self) -> &Resource {
        &self.base.resource
    }

    pub fn qualifiers(&self) -> QualifierGroup {
        self.qualifiers
    }

    pub fn person_id(&self) -> Option<PersonId> {
        self.person_id
    }

    pub fn measures(&self) -> &[MeasureRow] {
        &self.measures
    }

    pub fn selected_snapshot(&self) -> Option<&ResourceSnapshot> {
        self.selected.as_ref()
    }

    /// Resource owning the snapshot of `measure`.
    pub fn resource_for(&self, measure: &MeasureRow) -> Option<&Resource> {
        self.resources_by_snapshot.get(&measure.snapshot_id)
    }

    pub fn is_displayed(&self) -> bool {
        !self.measures.is_empty()
    }
}
