use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use drillscope_analysis::{DrilldownAnalyzer, DrilldownReport, DrilldownReportRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Json => "json",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "invalid output format '{other}', expected one of: table, json"
            )),
        }
    }
}

pub fn run_drilldown_once(
    workspace: &Path,
    request: DrilldownReportRequest,
    format: OutputFormat,
    out: &mut dyn Write,
) -> Result<()> {
    let analyzer =
        DrilldownAnalyzer::new(workspace).context("failed to load drill-down configuration")?;
    let resource_key = request.resource_key.clone();
    let report = analyzer
        .report(request)
        .with_context(|| format!("failed to build drill-down for {resource_key}"))?;

    match format {
        OutputFormat::Table => {
            write_drilldown_table(&report, out).context("failed to write drill-down table")?
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &report)
                .context("failed to serialize drill-down report")?;
            writeln!(out).context("failed to write drill-down report")?;
        }
    }

    Ok(())
}

/// One tab-separated block per column: a `# column` header line, the row
/// header, then one line per ranked child.
pub fn write_drilldown_table(
    report: &DrilldownReport,
    out: &mut dyn Write,
) -> std::io::Result<()> {
    writeln!(
        out,
        "# {} {} on {} ({})",
        normalize_table_field(&report.resource.key),
        report.resource.qualifier,
        normalize_table_field(&report.metric_key),
        report.value_column
    )?;

    for column in &report.columns {
        let qualifiers = column
            .qualifiers
            .iter()
            .map(|qualifier| qualifier.as_str())
            .collect::<Vec<_>>()
            .join(",");
        writeln!(
            out,
            "# column {} base={} qualifiers={}",
            column.depth,
            normalize_table_field(&column.base.key),
            qualifiers
        )?;
        writeln!(out, "rank\tresource_key\tname\tqualifier\tvalue\talert\tselected")?;

        for (index, entry) in column.entries.iter().enumerate() {
            let value = entry
                .value
                .map(|value| value.to_string())
                .unwrap_or_else(|| "-".to_owned());
            writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}",
                index + 1,
                normalize_table_field(&entry.resource.key),
                normalize_table_field(&entry.resource.name),
                entry.resource.qualifier,
                value,
                normalize_table_field(entry.alert_status.as_deref().unwrap_or("-")),
                if entry.selected { "*" } else { "" }
            )?;
        }
    }

    for note in &report.notes {
        writeln!(out, "# note: {}", normalize_table_field(note))?;
    }

    Ok(())
}

fn normalize_table_field(value: &str) -> String {
    value.replace(['\t', '\n', '\r'], " ")
}

#[cfg(test)]
mod tests {
    use drillscope_analysis::{DrilldownReportColumn, DrilldownReportEntry, ReportResource};
    use drillscope_core::Qualifier;

    use super::*;

    fn resource(key: &str, qualifier: Qualifier) -> ReportResource {
        ReportResource {
            key: key.to_owned(),
            name: key.rsplit(':').next().unwrap_or(key).to_owned(),
            qualifier,
        }
    }

    fn report() -> DrilldownReport {
        DrilldownReport {
            schema_version: "1.0".to_owned(),
            resource: resource("org:app", Qualifier::Project),
            metric_key: "violations".to_owned(),
            metric_name: "Violations".to_owned(),
            value_column: "value".to_owned(),
            has_value: true,
            has_period_value: None,
            columns: vec![DrilldownReportColumn {
                depth: 0,
                base: resource("org:app", Qualifier::Project),
                qualifiers: vec![Qualifier::Module],
                entries: vec![
                    DrilldownReportEntry {
                        resource: resource("org:app:core", Qualifier::Module),
                        value: Some(12.0),
                        text_value: None,
                        alert_status: Some("WARN".to_owned()),
                        alert_text: None,
                        selected: true,
                    },
                    DrilldownReportEntry {
                        resource: resource("org:app:web\tui", Qualifier::Module),
                        value: Some(2.5),
                        text_value: None,
                        alert_status: None,
                        alert_text: None,
                        selected: false,
                    },
                ],
            }],
            notes: vec!["selected resource 'org:gone' was not found".to_owned()],
        }
    }

    #[test]
    fn table_output_has_stable_header_and_columns() {
        let mut out = Vec::new();
        write_drilldown_table(&report(), &mut out).expect("write table");
        let rendered = String::from_utf8(out).expect("utf8 output");
        let lines = rendered.lines().collect::<Vec<_>>();

        assert_eq!(lines[0], "# org:app TRK on violations (value)");
        assert_eq!(lines[1], "# column 0 base=org:app qualifiers=BRC");
        assert_eq!(
            lines[2],
            "rank\tresource_key\tname\tqualifier\tvalue\talert\tselected"
        );
        assert_eq!(lines[3], "1\torg:app:core\tcore\tBRC\t12\tWARN\t*");

        let columns = lines[4].split('\t').collect::<Vec<_>>();
        assert_eq!(columns.len(), 7);
        assert_eq!(columns[1], "org:app:web ui");
        assert_eq!(columns[4], "2.5");
        assert_eq!(
            lines[5],
            "# note: selected resource 'org:gone' was not found"
        );
    }

    #[test]
    fn output_format_parses_known_values() {
        assert_eq!("table".parse::<OutputFormat>(), Ok(OutputFormat::Table));
        assert_eq!(" json".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!(OutputFormat::Json.as_str(), "json");
        assert!("csv".parse::<OutputFormat>().is_err());
    }
}
