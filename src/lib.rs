//! `jira-worklog` totals the seconds one author logged on the issues matched
//! by a JQL filter, within an inclusive date range.

/// Config file loading and validation.
pub mod config;
/// Jira REST client, issue search and worklog retrieval.
pub mod jira;
/// Logging helpers used throughout the crate.
pub mod logging;
/// Run counters.
pub mod metrics;
/// Sequencing of search, retrieval and aggregation into a report.
pub mod report;
/// Author and date-range filtering of worklog entries.
pub mod worklog;
