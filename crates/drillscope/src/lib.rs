pub mod cli;
pub mod drilldown;
pub mod logging;
