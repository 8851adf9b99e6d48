mod column;
mod drilldown;
mod query;
mod report;
#[cfg(test)]
mod test_store;

use drillscope_config::ConfigError;
use drillscope_store::StoreError;
use thiserror::Error;

pub use column::DrilldownColumn;
pub use drilldown::Drilldown;
pub use query::{DrilldownOptions, MeasureQueryBuilder};
pub use report::{
    DrilldownAnalyzer, DrilldownReport, DrilldownReportColumn, DrilldownReportEntry,
    DrilldownReportRequest, ReportResource,
};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("unknown resource key: {0}")]
    UnknownResource(String),
    #[error("unknown metric key: {0}")]
    UnknownMetric(String),
}
