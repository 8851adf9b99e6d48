use std::ffi::OsString;
use std::path::PathBuf;

use clap::Parser;
use drillscope_analysis::DrilldownReportRequest;
use drillscope_core::{CharacteristicId, Period, RuleId};

use crate::drilldown::OutputFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Human,
    Json,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Json => "json",
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "invalid log format '{other}', expected one of: human, json"
            )),
        }
    }
}

#[derive(Debug, Clone, Parser)]
#[command(author, version, about = "Drill down into ranked metric values")]
pub struct Cli {
    #[arg(long, default_value = ".", help = "Workspace root holding .drillscope/")]
    pub workspace: PathBuf,

    #[arg(long, help = "Key of the resource to drill into")]
    pub resource: String,

    #[arg(long, help = "Key of the metric to rank children by")]
    pub metric: String,

    #[arg(
        long = "select",
        value_name = "KEY",
        help = "Resource key to follow into the next level (repeatable)"
    )]
    pub selected: Vec<String>,

    #[arg(
        long,
        value_parser = parse_period,
        help = "Rank on the variation against period 1-5 instead of the value"
    )]
    pub period: Option<Period>,

    #[arg(long, help = "Skip children whose ranked value is zero")]
    pub exclude_zero: bool,

    #[arg(long, help = "Only measures attributed to this rule id")]
    pub rule: Option<RuleId>,

    #[arg(long, help = "Only measures attributed to this characteristic id")]
    pub characteristic: Option<CharacteristicId>,

    #[arg(
        long,
        default_value = "table",
        value_parser = parse_output_format,
        help = "Output format: table or json"
    )]
    pub output: OutputFormat,

    #[arg(
        long,
        default_value = "human",
        value_parser = parse_log_format,
        help = "Log format: human or json"
    )]
    pub log_format: LogFormat,
}

impl Cli {
    pub fn report_request(&self) -> DrilldownReportRequest {
        DrilldownReportRequest {
            resource_key: self.resource.trim().to_owned(),
            metric_key: self.metric.trim().to_owned(),
            selected_keys: self
                .selected
                .iter()
                .map(|key| key.trim().to_owned())
                .filter(|key| !key.is_empty())
                .collect(),
            period: self.period,
            exclude_zero_value: self.exclude_zero,
            rule_id: self.rule,
            characteristic_id: self.characteristic,
        }
    }
}

/// Parses process arguments, tolerating a leading `--` left by wrappers such
/// as `cargo run --`.
pub fn parse_cli_from<I, T>(args: I) -> Cli
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let mut args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    if args.get(1).is_some_and(|arg| arg == "--") {
        args.remove(1);
    }

    Cli::parse_from(args)
}

fn parse_period(value: &str) -> Result<Period, String> {
    let index = value
        .trim()
        .parse::<i64>()
        .map_err(|_| format!("invalid period '{value}', expected an integer 1-5"))?;
    Period::new(index).map_err(|err| err.to_string())
}

fn parse_output_format(value: &str) -> Result<OutputFormat, String> {
    value.parse()
}

fn parse_log_format(value: &str) -> Result<LogFormat, String> {
    value.parse()
}
