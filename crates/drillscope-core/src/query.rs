use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::{
    CharacteristicId, Measure, MetricId, Period, PersonId, Qualifier, ResourceId, RuleId,
    Snapshot, SnapshotId,
};

pub const PATH_SEPARATOR: char = '.';

const VARIATION_COLUMNS: [&str; 5] = [
    "variation_value_1",
    "variation_value_2",
    "variation_value_3",
    "variation_value_4",
    "variation_value_5",
];

/// Which stored value a measure query ranks and filters on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ValueColumn {
    #[default]
    Value,
    Variation(Period),
}

impl ValueColumn {
    pub fn for_period(period: Option<Period>) -> Self {
        period.map_or(Self::Value, Self::Variation)
    }

    pub fn column_name(self) -> &'static str {
        match self {
            Self::Value => "value",
            Self::Variation(period) => VARIATION_COLUMNS[usize::from(period.index() - 1)],
        }
    }

    pub fn is_plain_value(self) -> bool {
        matches!(self, Self::Value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }

    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Ascending => ordering,
            Self::Descending => ordering.reverse(),
        }
    }
}

/// Attribution filter on one scope dimension of a measure. `Absent` only
/// admits measures where the dimension is unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScopeFilter<T> {
    #[default]
    Absent,
    Exactly(T),
}

impl<T: PartialEq> ScopeFilter<T> {
    pub fn admits(&self, value: Option<&T>) -> bool {
        match (self, value) {
            (Self::Absent, None) => true,
            (Self::Exactly(expected), Some(actual)) => expected == actual,
            _ => false,
        }
    }
}

impl<T> From<Option<T>> for ScopeFilter<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Absent, Self::Exactly)
    }
}

/// Fully specified measure selection for one drill-down column.
///
/// Every field is a conjunctive constraint. Stores rank matching rows on
/// `value_column` in `order`, break ties by owning resource id then measure
/// id (both ascending), and return at most `limit` rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasureQuery {
    pub root_snapshot_id: SnapshotId,
    pub last_snapshots_only: bool,
    pub qualifiers: Vec<Qualifier>,
    /// Snapshot paths must start with this prefix.
    pub path_prefix: String,
    pub metric_id: MetricId,
    pub value_column: ValueColumn,
    /// Rows whose selected value equals this are dropped.
    pub excluded_value: Option<f64>,
    pub exclude_zero: bool,
    pub rule: ScopeFilter<RuleId>,
    pub characteristic: ScopeFilter<CharacteristicId>,
    pub person: ScopeFilter<PersonId>,
    pub order: SortOrder,
    pub limit: u32,
}

impl MeasureQuery {
    /// Evaluates the predicate against one stored measure and the snapshot
    /// that owns it. Ordering and `limit` are not part of the predicate.
    pub fn matches(&self, snapshot: &Snapshot, measure: &Measure) -> bool {
        if measure.snapshot_id != snapshot.id || measure.metric_id != self.metric_id {
            return false;
        }
        if snapshot.root_snapshot_id != Some(self.root_snapshot_id)
            || (self.last_snapshots_only && !snapshot.is_last)
            || !self.qualifiers.contains(&snapshot.qualifier)
            || !snapshot.path.starts_with(&self.path_prefix)
        {
            return false;
        }

        let Some(value) = measure.value_in(self.value_column) else {
            return false;
        };
        if self.excluded_value.is_some_and(|excluded| value == excluded) {
            return false;
        }
        if self.exclude_zero && value == 0.0 {
            return false;
        }

        self.rule.admits(measure.rule_id.as_ref())
            && self.characteristic.admits(measure.characteristic_id.as_ref())
            && self.person.admits(measure.person_id.as_ref())
    }

    /// Ranking used for matching rows: selected value in `order`, then
    /// resource id and measure id ascending.
    pub fn compare(
        &self,
        left: (ResourceId, &Measure),
        right: (ResourceId, &Measure),
    ) -> Ordering {
        let left_value = left.1.value_in(self.value_column);
        let right_value = right.1.value_in(self.value_column);
        let primary = match (left_value, right_value) {
            (Some(l), Some(r)) => l.partial_cmp(&r).unwrap_or(Ordering::Equal),
            (l, r) => l.is_some().cmp(&r.is_some()),
        };

        self.order
            .apply(primary)
            .then_with(|| left.0.cmp(&right.0))
            .then_with(|| left.1.id.cmp(&right.1.id))
    }
}
