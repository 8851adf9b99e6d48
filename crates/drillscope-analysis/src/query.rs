use drillscope_config::MAX_MEASURES_PER_COLUMN;
use drillscope_core::{
    CharacteristicId, MeasureQuery, Metric, Period, PersonId, Qualifier, RuleId, Snapshot,
    ValueColumn,
};
use serde::{Deserialize, Serialize};

/// Caller options for one drill-down. Attribution filters are independent of
/// each other; combining them is the caller's decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrilldownOptions {
    /// Rank on the variation against this period instead of the plain value.
    /// Default: none.
    #[serde(default)]
    pub period: Option<Period>,
    /// Drop rows whose ranked value is zero. Default: false.
    #[serde(default)]
    pub exclude_zero_value: bool,
    /// Only measures attributed to this rule. Default: unattributed measures.
    #[serde(default)]
    pub rule_id: Option<RuleId>,
    /// Only measures attributed to this characteristic. Default: unattributed
    /// measures.
    #[serde(default)]
    pub characteristic_id: Option<CharacteristicId>,
    /// Rows per column, clamped into `1..=200`. Default: 200.
    #[serde(default = "default_max_measures")]
    pub max_measures: u32,
}

impl Default for DrilldownOptions {
    fn default() -> Self {
        Self {
            period: None,
            exclude_zero_value: false,
            rule_id: None,
            characteristic_id: None,
            max_measures: default_max_measures(),
        }
    }
}

fn default_max_measures() -> u32 {
    MAX_MEASURES_PER_COLUMN
}

/// Turns drill-down context into the measure predicate for one column.
#[derive(Debug, Clone, Copy)]
pub struct MeasureQueryBuilder<'a> {
    metric: &'a Metric,
    options: &'a DrilldownOptions,
}

impl<'a> MeasureQueryBuilder<'a> {
    pub fn new(metric: &'a Metric, options: &'a DrilldownOptions) -> Self {
        Self { metric, options }
    }

    pub fn value_column(&self) -> ValueColumn {
        ValueColumn::for_period(self.options.period)
    }

    pub fn limit(&self) -> u32 {
        self.options.max_measures.clamp(1, MAX_MEASURES_PER_COLUMN)
    }

    /// Predicate selecting the metric's measures on last snapshots below
    /// `base` whose qualifier is in `qualifiers`.
    pub fn build(
        &self,
        base: &Snapshot,
        qualifiers: &[Qualifier],
        person_id: Option<PersonId>,
    ) -> MeasureQuery {
        let value_column = self.value_column();
        // Best value only applies to absolute values, never to variations.
        let excluded_value = if value_column.is_plain_value() {
            self.metric.best_value
        } else {
            None
        };

        MeasureQuery {
            root_snapshot_id: base.lineage_root_id(),
            last_snapshots_only: true,
            qualifiers: qualifiers.to_vec(),
            path_prefix: base.descendant_path_prefix(),
            metric_id: self.metric.id,
            value_column,
            excluded_value,
            exclude_zero: self.options.exclude_zero_value,
            rule: self.options.rule_id.into(),
            characteristic: self.options.characteristic_id.into(),
            person: person_id.into(),
            order: self.metric.sort_order(),
            limit: self.limit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use drillscope_core::{MetricDirection, ScopeFilter, SortOrder};

    use super::*;

    fn metric(direction: MetricDirection, best_value: Option<f64>) -> Metric {
        Metric {
            id: 42,
            key: "coverage".to_owned(),
            name: "Coverage".to_owned(),
            direction,
            best_value,
        }
    }

    fn base() -> Snapshot {
        Snapshot {
            id: 5,
            resource_id: 50,
            qualifier: Qualifier::Module,
            root_snapshot_id: Some(1),
            path: "1.".to_owned(),
            is_last: true,
        }
    }

    #[test]
    fn default_options_select_unattributed_plain_values() {
        let metric = metric(MetricDirection::HigherIsBetter, None);
        let options = DrilldownOptions::default();
        let query = MeasureQueryBuilder::new(&metric, &options).build(
            &base(),
            &[Qualifier::Directory, Qualifier::Package],
            None,
        );

        assert_eq!(query.root_snapshot_id, 1);
        assert!(query.last_snapshots_only);
        assert_eq!(query.path_prefix, "1.5.");
        assert_eq!(query.metric_id, 42);
        assert_eq!(query.value_column, ValueColumn::Value);
        assert_eq!(query.excluded_value, None);
        assert!(!query.exclude_zero);
        assert_eq!(query.rule, ScopeFilter::Absent);
        assert_eq!(query.characteristic, ScopeFilter::Absent);
        assert_eq!(query.person, ScopeFilter::Absent);
        assert_eq!(query.order, SortOrder::Ascending);
        assert_eq!(query.limit, 200);
    }

    #[test]
    fn root_base_uses_its_own_id_as_lineage_root() {
        let metric = metric(MetricDirection::Neutral, None);
        let options = DrilldownOptions::default();
        let mut root = base();
        root.root_snapshot_id = None;
        root.path = String::new();

        let query =
            MeasureQueryBuilder::new(&metric, &options).build(&root, &[Qualifier::Module], None);
        assert_eq!(query.root_snapshot_id, 5);
        assert_eq!(query.path_prefix, "5.");
    }

    #[test]
    fn best_value_is_excluded_only_for_plain_values() {
        let metric = metric(MetricDirection::HigherIsWorse, Some(0.0));
        let mut options = DrilldownOptions::default();
        let builder = MeasureQueryBuilder::new(&metric, &options);
        let query = builder.build(&base(), &[Qualifier::File], None);
        assert_eq!(query.excluded_value, Some(0.0));
        assert_eq!(query.order, SortOrder::Descending);

        options.period = Some(Period::new(2).expect("period"));
        let builder = MeasureQueryBuilder::new(&metric, &options);
        let query = builder.build(&base(), &[Qualifier::File], None);
        assert_eq!(query.excluded_value, None);
        assert_eq!(query.value_column.column_name(), "variation_value_2");
    }

    #[test]
    fn attribution_options_become_exact_filters() {
        let metric = metric(MetricDirection::HigherIsBetter, None);
        let options = DrilldownOptions {
            exclude_zero_value: true,
            rule_id: Some(7),
            characteristic_id: Some(8),
            ..DrilldownOptions::default()
        };
        let query = MeasureQueryBuilder::new(&metric, &options).build(
            &base(),
            &[Qualifier::File],
            Some(9),
        );

        assert!(query.exclude_zero);
        assert_eq!(query.rule, ScopeFilter::Exactly(7));
        assert_eq!(query.characteristic, ScopeFilter::Exactly(8));
        assert_eq!(query.person, ScopeFilter::Exactly(9));
    }

    #[test]
    fn limit_is_clamped_to_the_column_cap() {
        let metric = metric(MetricDirection::HigherIsBetter, None);
        let mut options = DrilldownOptions {
            max_measures: 10_000,
            ..DrilldownOptions::default()
        };
        assert_eq!(MeasureQueryBuilder::new(&metric, &options).limit(), 200);

        options.max_measures = 0;
        assert_eq!(MeasureQueryBuilder::new(&metric, &options).limit(), 1);

        options.max_measures = 15;
        assert_eq!(MeasureQueryBuilder::new(&metric, &options).limit(), 15);
    }
}
