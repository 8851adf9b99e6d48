use anyhow::{Context, Result};
use drillscope::cli::{Cli, parse_cli_from};
use drillscope::drilldown::run_drilldown_once;
use drillscope::logging::init_logging;
use drillscope_config::{config_path, ensure_workspace_config, validate_config};

fn main() -> Result<()> {
    let cli = parse_cli_from(std::env::args_os());
    run(cli)
}

fn run(cli: Cli) -> Result<()> {
    let workspace = cli.workspace.canonicalize().with_context(|| {
        format!(
            "failed to resolve workspace path {}",
            cli.workspace.display()
        )
    })?;

    let config = ensure_workspace_config(&workspace).with_context(|| {
        format!(
            "failed to load or create workspace config at {}",
            config_path(&workspace).display()
        )
    })?;
    init_logging(&config.logging, cli.log_format)?;
    for warning in validate_config(&config) {
        tracing::warn!(code = warning.code, "{}", warning.message);
    }

    let request = cli.report_request();
    let mut out = std::io::stdout().lock();
    run_drilldown_once(&workspace, request, cli.output, &mut out)
}
