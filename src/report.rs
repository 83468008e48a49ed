use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{self, AppConfig, AppConfigOverrides, ConfigError};
use crate::jira::{JiraClient, JiraError};
use crate::logging;
use crate::metrics::Metrics;
use crate::worklog::{WorklogError, WorklogFilter, WorklogTally};

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Jira(#[from] JiraError),
    #[error("issue {issue}: {source}")]
    Worklog { issue: String, source: WorklogError },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorklogReport {
    pub total_seconds: u64,
    pub issues_scanned: u64,
    pub issues_skipped: u64,
    pub entries_matched: u64,
}

impl fmt::Display for WorklogReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Total Worklog: {}", self.total_seconds)
    }
}

/// Loads the config at `path`, applies `overrides` and runs the whole
/// search-and-sum pass against the configured host.
pub fn execute(
    path: &Path,
    overrides: &AppConfigOverrides,
    metrics: Arc<Metrics>,
) -> Result<WorklogReport, RunError> {
    let mut cfg = config::load_from(path)?;
    cfg.apply_overrides(overrides)?;
    logging::init(cfg.logging.debug);
    logging::info(format!("loaded config from {}", path.display()));

    let missing = cfg.missing_connection_fields();
    if !missing.is_empty() {
        logging::warn(format!(
            "config leaves {} empty; jira requests are likely to fail",
            missing.join(", ")
        ));
    }

    let jira = JiraClient::new_with_metrics(
        &cfg.hostname,
        cfg.username.clone(),
        cfg.password.clone(),
        Duration::from_secs(cfg.timeout_secs),
        Arc::clone(&metrics),
    )?;
    logging::info(format!("using jira base url {}", jira.base_url));

    let report = run(&cfg, &jira, &metrics)?;
    logging::debug(metrics.snapshot().to_string());
    Ok(report)
}

/// Searches issues for `config.jql` and folds each issue's matching worklog
/// seconds into one total, one issue at a time.
pub fn run(config: &AppConfig, jira: &JiraClient, metrics: &Metrics) -> Result<WorklogReport, RunError> {
    let filter = config.worklog.filter()?;
    let issues = jira.search_issues(&config.jql)?;
    metrics.add_issues_found(issues.len() as u64);
    logging::info(format!("found {} issues", issues.len()));

    let mut total = WorklogTally::default();
    let mut report = WorklogReport::default();
    for issue in &issues {
        let tally = match issue_tally(jira, &filter, &issue.key, metrics) {
            Ok(tally) => tally,
            Err(err) if config.worklog.skip_failed_issues => {
                logging::warn(format!("skipping issue {}: {}", issue.key, err));
                metrics.inc_issue_skipped();
                report.issues_skipped += 1;
                continue;
            }
            Err(err) => return Err(err),
        };

        total = total.checked_add(tally).map_err(|source| RunError::Worklog {
            issue: issue.key.clone(),
            source,
        })?;
        report.issues_scanned += 1;
    }

    report.total_seconds = total.seconds;
    report.entries_matched = total.matched;
    Ok(report)
}

fn issue_tally(
    jira: &JiraClient,
    filter: &WorklogFilter,
    issue_key: &str,
    metrics: &Metrics,
) -> Result<WorklogTally, RunError> {
    let entries = jira.get_worklogs(issue_key)?;
    metrics.add_worklogs_fetched(entries.len() as u64);

    let tally = filter.tally(&entries).map_err(|source| RunError::Worklog {
        issue: issue_key.to_string(),
        source,
    })?;
    metrics.add_worklogs_matched(tally.matched);
    logging::debug(format!(
        "issue {} worklogs={} matched={} seconds={}",
        issue_key,
        entries.len(),
        tally.matched,
        tally.seconds
    ));
    Ok(tally)
}
