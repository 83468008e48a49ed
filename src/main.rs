use std::process::ExitCode;
use std::sync::Arc;

use jira_worklog::config::{self, AppConfigOverrides};
use jira_worklog::logging;
use jira_worklog::metrics::Metrics;
use jira_worklog::report;

fn main() -> ExitCode {
    let mut args = std::env::args_os();
    let _program = args.next();
    let path = config::resolve_config_path(args.next());

    let metrics = Arc::new(Metrics::new());
    match report::execute(&path, &AppConfigOverrides::from_env(), metrics) {
        Ok(report) => {
            println!("{report}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            logging::error(err.to_string());
            ExitCode::FAILURE
        }
    }
}
