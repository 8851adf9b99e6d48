mod hierarchy;
mod query;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use hierarchy::{HIERARCHY_TREES, QualifierGroup, child_qualifiers, child_qualifiers_of_group};
pub use query::{MeasureQuery, PATH_SEPARATOR, ScopeFilter, SortOrder, ValueColumn};

pub type ResourceId = i64;
pub type SnapshotId = i64;
pub type MetricId = i64;
pub type MeasureId = i64;
pub type RuleId = i64;
pub type CharacteristicId = i64;
pub type PersonId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("unknown qualifier '{0}'")]
    UnknownQualifier(String),
    #[error("period {0} is out of range, expected 1..=5")]
    InvalidPeriod(i64),
    #[error("metric direction {0} is invalid, expected -1, 0 or 1")]
    InvalidDirection(i64),
}

/// Kind of a measured resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Ord, PartialOrd)]
pub enum Qualifier {
    #[serde(rename = "TRK")]
    Project,
    #[serde(rename = "BRC")]
    Module,
    #[serde(rename = "DIR")]
    Directory,
    #[serde(rename = "PAC")]
    Package,
    #[serde(rename = "FIL")]
    File,
    #[serde(rename = "CLA")]
    Class,
    #[serde(rename = "UTS")]
    UnitTestFile,
    #[serde(rename = "VW")]
    View,
    #[serde(rename = "SVW")]
    SubView,
    #[serde(rename = "PERSON")]
    Person,
    #[serde(rename = "PERSON_PRJ")]
    PersonProject,
    #[serde(rename = "LIB")]
    Library,
}

impl Qualifier {
    pub const ALL: [Qualifier; 12] = [
        Self::Project,
        Self::Module,
        Self::Directory,
        Self::Package,
        Self::File,
        Self::Class,
        Self::UnitTestFile,
        Self::View,
        Self::SubView,
        Self::Person,
        Self::PersonProject,
        Self::Library,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Project => "TRK",
            Self::Module => "BRC",
            Self::Directory => "DIR",
            Self::Package => "PAC",
            Self::File => "FIL",
            Self::Class => "CLA",
            Self::UnitTestFile => "UTS",
            Self::View => "VW",
            Self::SubView => "SVW",
            Self::Person => "PERSON",
            Self::PersonProject => "PERSON_PRJ",
            Self::Library => "LIB",
        }
    }
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Qualifier {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|qualifier| qualifier.as_str() == value)
            .ok_or_else(|| CoreError::UnknownQualifier(value.to_owned()))
    }
}

/// Comparison slot of a variation value, `1..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Ord, PartialOrd)]
#[serde(try_from = "i64", into = "i64")]
pub struct Period(u8);

impl Period {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(index: i64) -> Result<Self, CoreError> {
        if !(i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&index) {
            return Err(CoreError::InvalidPeriod(index));
        }
        Ok(Self(index as u8))
    }

    pub fn index(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Period {
    type Error = CoreError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Period> for i64 {
    fn from(period: Period) -> Self {
        i64::from(period.0)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether a growing value is an improvement for a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "i64", into = "i64")]
pub enum MetricDirection {
    HigherIsWorse,
    #[default]
    Neutral,
    HigherIsBetter,
}

impl MetricDirection {
    pub fn as_i64(self) -> i64 {
        match self {
            Self::HigherIsWorse => -1,
            Self::Neutral => 0,
            Self::HigherIsBetter => 1,
        }
    }
}

impl TryFrom<i64> for MetricDirection {
    type Error = CoreError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Self::HigherIsWorse),
            0 => Ok(Self::Neutral),
            1 => Ok(Self::HigherIsBetter),
            other => Err(CoreError::InvalidDirection(other)),
        }
    }
}

impl From<MetricDirection> for i64 {
    fn from(direction: MetricDirection) -> Self {
        direction.as_i64()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub key: String,
    pub name: String,
    pub qualifier: Qualifier,
    /// Canonical resource this one is an alias of.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copy_resource_id: Option<ResourceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person_id: Option<PersonId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub resource_id: ResourceId,
    pub qualifier: Qualifier,
    /// Absent when the snapshot is the root of its analysis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_snapshot_id: Option<SnapshotId>,
    /// Ancestor snapshot ids, each followed by `.`; empty for a root.
    #[serde(default)]
    pub path: String,
    pub is_last: bool,
}

impl Snapshot {
    /// Root of the analysis this snapshot belongs to.
    pub fn lineage_root_id(&self) -> SnapshotId {
        self.root_snapshot_id.unwrap_or(self.id)
    }

    /// Path prefix shared by every descendant of this snapshot.
    pub fn descendant_path_prefix(&self) -> String {
        format!("{}{}{}", self.path, self.id, PATH_SEPARATOR)
    }
}

/// A snapshot together with the resource that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub snapshot: Snapshot,
    pub resource: Resource,
}

impl ResourceSnapshot {
    pub fn new(snapshot: Snapshot, resource: Resource) -> Self {
        Self { snapshot, resource }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub id: MetricId,
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub direction: MetricDirection,
    /// Value at which a measure is considered perfect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_value: Option<f64>,
}

impl Metric {
    pub fn sort_order(&self) -> SortOrder {
        match self.direction {
            MetricDirection::HigherIsWorse => SortOrder::Descending,
            MetricDirection::Neutral | MetricDirection::HigherIsBetter => SortOrder::Ascending,
        }
    }
}

/// A stored measure with all of its value columns and scope dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    pub id: MeasureId,
    pub snapshot_id: SnapshotId,
    pub metric_id: MetricId,
    pub value: Option<f64>,
    /// Variation against periods 1 to 5.
    #[serde(default)]
    pub variation_values: [Option<f64>; 5],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<RuleId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub characteristic_id: Option<CharacteristicId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person_id: Option<PersonId>,
}

impl Measure {
    pub fn value_in(&self, column: ValueColumn) -> Option<f64> {
        match column {
            ValueColumn::Value => self.value,
            ValueColumn::Variation(period) => {
                self.variation_values[usize::from(period.index() - 1)]
            }
        }
    }

    pub fn to_row(&self, column: ValueColumn) -> MeasureRow {
        MeasureRow {
            id: self.id,
            metric_id: self.metric_id,
            value: self.value_in(column),
            text_value: self.text_value.clone(),
            alert_status: self.alert_status.clone(),
            alert_text: self.alert_text.clone(),
            snapshot_id: self.snapshot_id,
        }
    }
}

/// One measure row as returned by a measure query. `value` holds whichever
/// value column the query selected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasureRow {
    pub id: MeasureId,
    pub metric_id: MetricId,
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_text: Option<String>,
    pub snapshot_id: SnapshotId,
}
