use std::ffi::OsString;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;

use crate::worklog::WorklogFilter;

pub const DEFAULT_CONFIG_DIR: &str = "./etc";
pub const DEFAULT_CONFIG_FILE: &str = "secret.config.json";
pub const CONFIG_PATH_ENV: &str = "JIRA_WORKLOG_CONFIG";

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub jql: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub worklog: WorklogConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorklogConfig {
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub begin: String,
    #[serde(default)]
    pub end: String,
    #[serde(default)]
    pub skip_failed_issues: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, Default)]
pub struct AppConfigOverrides {
    pub hostname: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub jql: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found at {path}")]
    MissingConfigFile { path: PathBuf },
    #[error("failed to read config file at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse JSON config at {path}: {source}")]
    ParseJson {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to parse TOML config at {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

pub fn load_from(path: &Path) -> Result<AppConfig, ConfigError> {
    let path = path.to_path_buf();
    let raw = std::fs::read_to_string(&path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ConfigError::MissingConfigFile { path: path.clone() }
        } else {
            ConfigError::ReadFailed {
                path: path.clone(),
                source,
            }
        }
    })?;

    let cfg = parse(&path, &raw)?;
    cfg.validate()?;
    Ok(cfg)
}

fn parse(path: &Path, raw: &str) -> Result<AppConfig, ConfigError> {
    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);

    if is_toml {
        toml::from_str::<AppConfig>(raw).map_err(|source| ConfigError::ParseToml {
            path: path.to_path_buf(),
            source,
        })
    } else {
        serde_json::from_str::<AppConfig>(raw).map_err(|source| ConfigError::ParseJson {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Picks the config file: explicit argument, then `JIRA_WORKLOG_CONFIG`,
/// then `./etc/secret.config.json`.
pub fn resolve_config_path(arg: Option<OsString>) -> PathBuf {
    resolve_config_path_from_env(arg, std::env::var_os(CONFIG_PATH_ENV))
}

fn resolve_config_path_from_env(arg: Option<OsString>, env: Option<OsString>) -> PathBuf {
    arg.filter(|value| !value.is_empty())
        .or_else(|| env.filter(|value| !value.is_empty()))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_DIR).join(DEFAULT_CONFIG_FILE))
}

impl AppConfigOverrides {
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Self {
            hostname: var("JIRA_WORKLOG_HOSTNAME"),
            username: var("JIRA_WORKLOG_USERNAME"),
            password: var("JIRA_WORKLOG_PASSWORD"),
            jql: var("JIRA_WORKLOG_JQL"),
        }
    }
}

impl AppConfig {
    pub fn apply_overrides(&mut self, overrides: &AppConfigOverrides) -> Result<(), ConfigError> {
        if let Some(value) = &overrides.hostname {
            self.hostname = value.clone();
        }
        if let Some(value) = &overrides.username {
            self.username = value.clone();
        }
        if let Some(value) = &overrides.password {
            self.password = value.clone();
        }
        if let Some(value) = &overrides.jql {
            self.jql = value.clone();
        }

        self.validate()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be > 0".into()));
        }
        self.worklog.filter()?;
        Ok(())
    }

    /// Names of connection fields left empty. Requests will fail without
    /// them, but loading still succeeds.
    pub fn missing_connection_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.hostname.trim().is_empty() {
            missing.push("hostname");
        }
        if self.username.is_empty() {
            missing.push("username");
        }
        if self.password.is_empty() {
            missing.push("password");
        }
        missing
    }
}

impl WorklogConfig {
    /// Empty `begin`/`end` become `None`; present values must be
    /// `YYYY-MM-DD` dates.
    pub fn filter(&self) -> Result<WorklogFilter, ConfigError> {
        let begin = parse_date("worklog.begin", &self.begin)?;
        let end = parse_date("worklog.end", &self.end)?;
        if let (Some(begin), Some(end)) = (begin, end) {
            if begin > end {
                return Err(ConfigError::Invalid(format!(
                    "worklog.begin ({begin}) must not be after worklog.end ({end})"
                )));
            }
        }

        Ok(WorklogFilter {
            author: self.author.clone(),
            begin,
            end,
        })
    }
}

fn parse_date(field: &str, raw: &str) -> Result<Option<NaiveDate>, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
        .map(Some)
        .map_err(|_| {
            ConfigError::Invalid(format!("{field} must be a YYYY-MM-DD date, got '{raw}'"))
        })
}

const fn default_timeout_secs() -> u64 {
    30
}
