use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use drillscope_config::{DrillscopeConfig, load_workspace_config};
use drillscope_core::{CharacteristicId, Period, Qualifier, ResourceId, RuleId, ValueColumn};
use drillscope_store::{MeasureStore, SqliteMeasureStore};
use serde::{Deserialize, Serialize};

use crate::AnalysisError;
use crate::column::DrilldownColumn;
use crate::drilldown::Drilldown;
use crate::query::DrilldownOptions;

const DRILLDOWN_SCHEMA_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DrilldownReportRequest {
    pub resource_key: String,
    pub metric_key: String,
    #[serde(default)]
    pub selected_keys: Vec<String>,
    #[serde(default)]
    pub period: Option<Period>,
    #[serde(default)]
    pub exclude_zero_value: bool,
    #[serde(default)]
    pub rule_id: Option<RuleId>,
    #[serde(default)]
    pub characteristic_id: Option<CharacteristicId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportResource {
    pub key: String,
    pub name: String,
    pub qualifier: Qualifier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrilldownReportEntry {
    pub resource: ReportResource,
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_text: Option<String>,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrilldownReportColumn {
    pub depth: usize,
    pub base: ReportResource,
    pub qualifiers: Vec<Qualifier>,
    pub entries: Vec<DrilldownReportEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrilldownReport {
    pub schema_version: String,
    pub resource: ReportResource,
    pub metric_key: String,
    pub metric_name: String,
    pub value_column: String,
    pub has_value: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_period_value: Option<bool>,
    pub columns: Vec<DrilldownReportColumn>,
    pub notes: Vec<String>,
}

/// Builds drill-down reports for a workspace, resolving resources and
/// metrics by key.
#[derive(Debug, Clone)]
pub struct DrilldownAnalyzer {
    workspace: PathBuf,
    config: DrillscopeConfig,
}

impl DrilldownAnalyzer {
    pub fn new(workspace: impl AsRef<Path>) -> Result<Self, AnalysisError> {
        let workspace = workspace.as_ref().to_path_buf();
        let config = load_workspace_config(&workspace)?;
        Ok(Self { workspace, config })
    }

    pub fn report(
        &self,
        request: DrilldownReportRequest,
    ) -> Result<DrilldownReport, AnalysisError> {
        let store = SqliteMeasureStore::open_with_config(&self.workspace, &self.config.store)?;
        self.report_with_store(&store, request)
    }

    pub fn report_with_store<S: MeasureStore + ?Sized>(
        &self,
        store: &S,
        request: DrilldownReportRequest,
    ) -> Result<DrilldownReport, AnalysisError> {
        let resource = store
            .find_resource_by_key(&request.resource_key)?
            .ok_or_else(|| AnalysisError::UnknownResource(request.resource_key.clone()))?;
        let metric = store
            .find_metric_by_key(&request.metric_key)?
            .ok_or_else(|| AnalysisError::UnknownMetric(request.metric_key.clone()))?;

        let mut notes = Vec::new();
        let selected = store.find_resources_by_keys(&request.selected_keys)?;
        let found_keys = selected
            .iter()
            .map(|resource| resource.key.as_str())
            .collect::<BTreeSet<_>>();
        for key in &request.selected_keys {
            let key = key.trim();
            if key.is_empty() || found_keys.contains(key) {
                continue;
            }
            tracing::warn!(key, "selected resource key not found, ignoring it");
            notes.push(format!("selected resource '{key}' was not found"));
        }
        let selected_ids = selected
            .iter()
            .map(|resource| resource.id)
            .collect::<BTreeSet<ResourceId>>();

        let options = DrilldownOptions {
            period: request.period,
            exclude_zero_value: request.exclude_zero_value,
            rule_id: request.rule_id,
            characteristic_id: request.characteristic_id,
            max_measures: self.config.drilldown.max_measures,
        };
        let drilldown = Drilldown::build(store, resource, metric, selected_ids, &options)?;

        if drilldown.snapshot().is_none() {
            notes.push(format!(
                "resource '{}' has not been analyzed; drill-down is empty",
                drilldown.resource().key
            ));
        }

        let has_value = drilldown.has_value(store)?;
        let has_period_value = match request.period {
            Some(period) => Some(drilldown.has_period_value(store, period)?),
            None => None,
        };

        let columns = drilldown
            .columns()
            .iter()
            .map(report_column)
            .collect();

        Ok(DrilldownReport {
            schema_version: DRILLDOWN_SCHEMA_VERSION.to_owned(),
            resource: ReportResource {
                key: drilldown.resource().key.clone(),
                name: drilldown.resource().name.clone(),
                qualifier: drilldown.resource().qualifier,
            },
            metric_key: drilldown.metric().key.clone(),
            metric_name: drilldown.metric().name.clone(),
            value_column: ValueColumn::for_period(request.period)
                .column_name()
                .to_owned(),
            has_value,
            has_period_value,
            columns,
            notes,
        })
    }
}

fn report_column(column: &DrilldownColumn) -> DrilldownReportColumn {
    // Only the child the walk actually followed is flagged.
    let followed = column.selected_snapshot().map(|child| child.resource.id);
    let entries = column
        .measures()
        .iter()
        .filter_map(|measure| {
            let resource = column.resource_for(measure)?;
            Some(DrilldownReportEntry {
                resource: ReportResource {
                    key: resource.key.clone(),
                    name: resource.name.clone(),
                    qualifier: resource.qualifier,
                },
                value: measure.value,
                text_value: measure.text_value.clone(),
                alert_status: measure.alert_status.clone(),
                alert_text: measure.alert_text.clone(),
                selected: followed == Some(resource.id),
            })
        })
        .collect();

    let base = column.base_resource();
    DrilldownReportColumn {
        depth: column.depth(),
        base: ReportResource {
            key: base.key.clone(),
            name: base.name.clone(),
            qualifier: base.qualifier,
        },
        qualifiers: column.qualifiers().to_vec(),
        entries,
    }
}
