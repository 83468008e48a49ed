use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Metrics {
    api_requests: AtomicU64,
    issues_found: AtomicU64,
    worklogs_fetched: AtomicU64,
    worklogs_matched: AtomicU64,
    issues_skipped: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub api_requests: u64,
    pub issues_found: u64,
    pub worklogs_fetched: u64,
    pub worklogs_matched: u64,
    pub issues_skipped: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_api_request(&self) {
        self.api_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_issues_found(&self, count: u64) {
        self.issues_found.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_worklogs_fetched(&self, count: u64) {
        self.worklogs_fetched.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_worklogs_matched(&self, count: u64) {
        self.worklogs_matched.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_issue_skipped(&self) {
        self.issues_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            api_requests: self.api_requests.load(Ordering::Relaxed),
            issues_found: self.issues_found.load(Ordering::Relaxed),
            worklogs_fetched: self.worklogs_fetched.load(Ordering::Relaxed),
            worklogs_matched: self.worklogs_matched.load(Ordering::Relaxed),
            issues_skipped: self.issues_skipped.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "metrics api_requests={} issues_found={} worklogs_fetched={} worklogs_matched={} issues_skipped={}",
            self.api_requests,
            self.issues_found,
            self.worklogs_fetched,
            self.worklogs_matched,
            self.issues_skipped
        )
    }
}
