use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use reqwest::blocking::Client;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::logging;
use crate::metrics::Metrics;

pub const REST_API_PREFIX: &str = "/rest/api/2";
pub const SEARCH_PATH: &str = "search";
pub const ISSUE_PATH: &str = "issue";
pub const WORKLOG_PATH: &str = "worklog";

const BODY_EXCERPT_CHARS: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueRef {
    pub key: String,
}

/// A single worklog record as reported by Jira.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorklogEntry {
    pub author: String,
    pub started: String,
    pub time_spent_seconds: u64,
}

impl WorklogEntry {
    /// The calendar date written before the `T` in `started`, without any
    /// zone conversion.
    pub fn started_on(&self) -> Option<NaiveDate> {
        let date_part = self.started.split('T').next()?;
        NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
    }
}

/// A list response carrying Jira's `total` and `maxResults` counters.
#[derive(Debug, Clone)]
pub struct PagedResult<T> {
    pub max_results: u64,
    pub total: u64,
    pub items: Vec<T>,
}

impl<T> PagedResult<T> {
    /// Returns the items only if the page holds the whole result set.
    pub fn into_complete(self, what: &str) -> Result<Vec<T>, JiraError> {
        if self.total > self.max_results {
            return Err(JiraError::Incomplete {
                what: what.to_string(),
                total: self.total,
                max_results: self.max_results,
            });
        }
        Ok(self.items)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JiraError {
    #[error("jira request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("jira returned HTTP {status}: {body}")]
    Http { status: StatusCode, body: String },
    #[error("failed to decode jira response: {source}; body: {body}")]
    Decode {
        source: serde_json::Error,
        body: String,
    },
    #[error("jira reported {total} {what} but returned at most {max_results}")]
    Incomplete {
        what: String,
        total: u64,
        max_results: u64,
    },
    #[error("invalid jira hostname '{0}'")]
    InvalidBaseUrl(String),
}

#[derive(Debug, Clone)]
pub struct JiraClient {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub http: Client,
    metrics: Arc<Metrics>,
}

impl JiraClient {
    pub fn new(
        hostname: &str,
        username: String,
        password: String,
        timeout: Duration,
    ) -> Result<Self, JiraError> {
        Self::new_with_metrics(hostname, username, password, timeout, Arc::new(Metrics::new()))
    }

    pub fn new_with_metrics(
        hostname: &str,
        username: String,
        password: String,
        timeout: Duration,
        metrics: Arc<Metrics>,
    ) -> Result<Self, JiraError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: normalize_base_url(hostname)?,
            username,
            password,
            http,
            metrics,
        })
    }

    /// GETs `{base}/rest/api/2/{segments...}?{query}` and returns the body.
    /// Anything other than `200 OK` is an error.
    pub fn rest_get(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<String, JiraError> {
        let url = self.endpoint(segments)?;
        logging::debug(format!("jira request url {}", url));

        self.metrics.inc_api_request();
        let response = self
            .http
            .get(url)
            .basic_auth(&self.username, Some(&self.password))
            .query(query)
            .send()?;

        let status = response.status();
        logging::debug(format!("jira response status {}", status.as_u16()));
        if status != StatusCode::OK {
            let body = response.text().unwrap_or_default();
            return Err(JiraError::Http {
                status,
                body: excerpt(&body),
            });
        }

        Ok(response.text()?)
    }

    pub fn search_issues(&self, jql: &str) -> Result<Vec<IssueRef>, JiraError> {
        let body = self.rest_get(&[SEARCH_PATH], &[("jql", jql)])?;
        let payload: SearchResponse = decode(&body)?;
        let page = PagedResult {
            max_results: payload.max_results,
            total: payload.total,
            items: payload.issues,
        };

        let issues: Vec<IssueRef> = page
            .into_complete("issues")?
            .into_iter()
            .map(|issue| IssueRef { key: issue.key })
            .collect();

        logging::debug(format!("jira search matched {} issues", issues.len()));
        if issues.is_empty() {
            logging::warn(format!("jira search returned zero issues for jql '{}'", jql));
        }
        Ok(issues)
    }

    pub fn get_worklogs(&self, issue_key: &str) -> Result<Vec<WorklogEntry>, JiraError> {
        let body = self.rest_get(&[ISSUE_PATH, issue_key, WORKLOG_PATH], &[])?;
        let payload: WorklogResponse = decode(&body)?;
        let page = PagedResult {
            max_results: payload.max_results,
            total: payload.total,
            items: payload.worklogs,
        };

        Ok(page
            .into_complete(&format!("worklogs on {issue_key}"))?
            .into_iter()
            .map(WorklogRecord::into_entry)
            .collect())
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, JiraError> {
        let invalid = || JiraError::InvalidBaseUrl(self.base_url.clone());
        let mut url = Url::parse(&format!("{}{}", self.base_url, REST_API_PREFIX))
            .map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .extend(segments);
        Ok(url)
    }
}

fn normalize_base_url(raw: &str) -> Result<String, JiraError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(JiraError::InvalidBaseUrl(raw.to_string()));
    }

    let candidate = if trimmed.starts_with("https://") || trimmed.starts_with("http://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let parsed = Url::parse(&candidate).map_err(|_| JiraError::InvalidBaseUrl(raw.to_string()))?;
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, JiraError> {
    serde_json::from_str(body).map_err(|source| {
        let short_body = excerpt(body);
        logging::warn(format!("failed decoding jira response: {}", short_body));
        JiraError::Decode {
            source,
            body: short_body,
        }
    })
}

fn excerpt(body: &str) -> String {
    if body.chars().count() > BODY_EXCERPT_CHARS {
        let head: String = body.chars().take(BODY_EXCERPT_CHARS).collect();
        format!("{head}...")
    } else {
        body.to_string()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    max_results: u64,
    #[serde(default)]
    total: u64,
    #[serde(default)]
    issues: Vec<SearchIssue>,
}

#[derive(Debug, Deserialize)]
struct SearchIssue {
    key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorklogResponse {
    #[serde(default)]
    max_results: u64,
    #[serde(default)]
    total: u64,
    #[serde(default)]
    worklogs: Vec<WorklogRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorklogRecord {
    #[serde(default)]
    started: String,
    #[serde(default)]
    time_spent_seconds: u64,
    #[serde(default)]
    author: Option<AuthorObj>,
}

#[derive(Debug, Deserialize)]
struct AuthorObj {
    #[serde(default)]
    name: String,
}

impl WorklogRecord {
    fn into_entry(self) -> WorklogEntry {
        WorklogEntry {
            author: self.author.map(|a| a.name).unwrap_or_default(),
            started: self.started,
            time_spent_seconds: self.time_spent_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::GET;
    use httpmock::MockServer;

    fn client(base_url: String) -> JiraClient {
        JiraClient::new(
            &base_url,
            "bob".into(),
            "secret".into(),
            Duration::from_secs(5),
        )
        .expect("client")
    }

    #[test]
    fn search_sends_encoded_jql_with_basic_auth() {
        let server = MockServer::start();
        let search = server.mock(|when, then| {
            when.method(GET)
                .path("/rest/api/2/search")
                .query_param("jql", "project = OPS AND worklogAuthor = bob")
                .header("Authorization", "Basic Ym9iOnNlY3JldA==");
            then.status(200).json_body(serde_json::json!({
                "startAt": 0,
                "maxResults": 50,
                "total": 2,
                "issues": [{"key": "OPS-1"}, {"key": "OPS-7"}]
            }));
        });

        let issues = client(server.base_url())
            .search_issues("project = OPS AND worklogAuthor = bob")
            .expect("search should succeed");

        search.assert();
        assert_eq!(
            issues,
            vec![
                IssueRef { key: "OPS-1".into() },
                IssueRef { key: "OPS-7".into() }
            ]
        );
    }

    #[test]
    fn search_rejects_truncated_results() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/rest/api/2/search");
            then.status(200).json_body(serde_json::json!({
                "maxResults": 50,
                "total": 51,
                "issues": [{"key": "OPS-1"}]
            }));
        });

        let err = client(server.base_url())
            .search_issues("project = OPS")
            .expect_err("truncated page must fail");
        assert!(matches!(
            err,
            JiraError::Incomplete {
                total: 51,
                max_results: 50,
                ..
            }
        ));
    }

    #[test]
    fn page_at_capacity_is_complete() {
        let full = PagedResult {
            max_results: 50,
            total: 50,
            items: vec![1_u8; 50],
        };
        assert_eq!(full.into_complete("items").expect("complete").len(), 50);

        let over = PagedResult {
            max_results: 50,
            total: 51,
            items: vec![1_u8; 50],
        };
        assert!(matches!(
            over.into_complete("items"),
            Err(JiraError::Incomplete { .. })
        ));
    }

    #[test]
    fn fetches_worklogs_for_issue() {
        let server = MockServer::start();
        let worklog = server.mock(|when, then| {
            when.method(GET).path("/rest/api/2/issue/OPS-1/worklog");
            then.status(200).json_body(serde_json::json!({
                "startAt": 0,
                "maxResults": 20,
                "total": 2,
                "worklogs": [
                    {
                        "started": "2021-01-26T07:20:00.000+0400",
                        "timeSpentSeconds": 3600,
                        "author": {"name": "bob"}
                    },
                    {
                        "started": "2021-01-27T23:59:00.000+0000",
                        "timeSpentSeconds": 60,
                        "author": {"name": "alice"}
                    }
                ]
            }));
        });

        let entries = client(server.base_url())
            .get_worklogs("OPS-1")
            .expect("worklogs should load");

        worklog.assert();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].author, "bob");
        assert_eq!(
            entries[0].started_on(),
            NaiveDate::from_ymd_opt(2021, 1, 26)
        );
        assert_eq!(entries[0].time_spent_seconds, 3600);
        assert_eq!(entries[1].author, "alice");
    }

    #[test]
    fn worklog_page_with_more_entries_fails() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/rest/api/2/issue/OPS-1/worklog");
            then.status(200).json_body(serde_json::json!({
                "maxResults": 1,
                "total": 2,
                "worklogs": [{
                    "started": "2021-01-26T07:20:00.000+0000",
                    "timeSpentSeconds": 3600,
                    "author": {"name": "bob"}
                }]
            }));
        });

        let err = client(server.base_url())
            .get_worklogs("OPS-1")
            .expect_err("truncated worklogs must fail");
        assert!(matches!(err, JiraError::Incomplete { total: 2, .. }));
    }

    #[test]
    fn non_ok_status_is_an_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/rest/api/2/search");
            then.status(500).body("boom");
        });
        server.mock(|when, then| {
            when.method(GET).path("/rest/api/2/issue/OPS-404/worklog");
            then.status(404).body("Issue does not exist");
        });

        let jira = client(server.base_url());
        let err = jira.search_issues("x").expect_err("500 must fail");
        assert!(
            matches!(err, JiraError::Http { status, ref body } if status == StatusCode::INTERNAL_SERVER_ERROR && body == "boom")
        );

        let err = jira.get_worklogs("OPS-404").expect_err("404 must fail");
        assert!(matches!(err, JiraError::Http { status, .. } if status == StatusCode::NOT_FOUND));
    }

    #[test]
    fn other_success_statuses_are_rejected() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/rest/api/2/search");
            then.status(204);
        });

        let err = client(server.base_url())
            .search_issues("x")
            .expect_err("only 200 is accepted");
        assert!(matches!(err, JiraError::Http { status, .. } if status == StatusCode::NO_CONTENT));
    }

    #[test]
    fn malformed_body_is_a_decode_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/rest/api/2/search");
            then.status(200).body("<html>login required</html>");
        });

        let err = client(server.base_url())
            .search_issues("x")
            .expect_err("html must not decode");
        assert!(matches!(err, JiraError::Decode { ref body, .. } if body.contains("login required")));
    }

    #[test]
    fn worklogs_keep_raw_started_values() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/rest/api/2/issue/OPS-2/worklog");
            then.status(200).json_body(serde_json::json!({
                "maxResults": 20,
                "total": 2,
                "worklogs": [
                    {"timeSpentSeconds": 3600, "author": {"name": "alice"}},
                    {"started": "26/01/2021 07:20", "timeSpentSeconds": 60, "author": {"name": "bob"}}
                ]
            }));
        });

        let entries = client(server.base_url())
            .get_worklogs("OPS-2")
            .expect("odd start dates still decode");

        assert_eq!(entries[0].started, "");
        assert_eq!(entries[0].started_on(), None);
        assert_eq!(entries[1].started, "26/01/2021 07:20");
        assert_eq!(entries[1].started_on(), None);
    }

    #[test]
    fn issue_without_key_is_a_decode_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/rest/api/2/search");
            then.status(200).json_body(serde_json::json!({
                "maxResults": 50,
                "total": 2,
                "issues": [{"key": "OPS-1"}, {"id": "10002"}]
            }));
        });

        let err = client(server.base_url())
            .search_issues("x")
            .expect_err("keyless issue must not decode");
        assert!(matches!(err, JiraError::Decode { .. }));
    }

    #[test]
    fn hung_server_hits_timeout() {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("server start");
        let addr = format!("http://{}", server.server_addr());
        std::thread::spawn(move || {
            if let Ok(req) = server.recv() {
                std::thread::sleep(Duration::from_secs(3));
                drop(req);
            }
        });

        let jira = JiraClient::new(&addr, "bob".into(), "secret".into(), Duration::from_millis(300))
            .expect("client");
        let err = jira.search_issues("x").expect_err("request should time out");
        assert!(matches!(err, JiraError::Request(ref e) if e.is_timeout()));
    }

    #[test]
    fn counts_api_requests() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/rest/api/2/search");
            then.status(200)
                .json_body(serde_json::json!({"maxResults": 50, "total": 0, "issues": []}));
        });

        let metrics = Arc::new(Metrics::new());
        let jira = JiraClient::new_with_metrics(
            &server.base_url(),
            "bob".into(),
            "secret".into(),
            Duration::from_secs(5),
            Arc::clone(&metrics),
        )
        .expect("client");
        jira.search_issues("x").expect("search");
        jira.search_issues("y").expect("search");

        assert_eq!(metrics.snapshot().api_requests, 2);
    }

    #[test]
    fn normalizes_hostnames() {
        assert_eq!(
            normalize_base_url("jira.example.com/").expect("normalize"),
            "https://jira.example.com"
        );
        assert_eq!(
            normalize_base_url(" http://localhost:8080/jira/ ").expect("normalize"),
            "http://localhost:8080/jira"
        );
        assert!(matches!(
            normalize_base_url("  "),
            Err(JiraError::InvalidBaseUrl(_))
        ));
    }

    #[test]
    fn builds_endpoint_under_rest_prefix() {
        let jira = client("http://localhost:8080/jira".into());
        let url = jira
            .endpoint(&[ISSUE_PATH, "OPS-1", WORKLOG_PATH])
            .expect("endpoint");
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/jira/rest/api/2/issue/OPS-1/worklog"
        );
    }
}
