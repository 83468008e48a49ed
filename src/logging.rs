use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

static DEBUG_ENABLED: OnceLock<bool> = OnceLock::new();

/// Turns on debug output for the rest of the process. Only the first call
/// (or the first log line, whichever comes first) decides.
pub fn init(debug: bool) {
    let _ = DEBUG_ENABLED.set(debug || debug_from_env());
}

fn debug_from_env() -> bool {
    std::env::var("JIRA_WORKLOG_DEBUG")
        .ok()
        .map(|v| {
            let normalized = v.trim().to_ascii_lowercase();
            normalized == "1" || normalized == "true" || normalized == "yes"
        })
        .unwrap_or(false)
}

fn debug_enabled() -> bool {
    *DEBUG_ENABLED.get_or_init(debug_from_env)
}

fn ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn emit(level: &str, message: &str) {
    eprintln!("[{}][{}] {}", ts(), level, message);
}

pub fn debug(message: impl AsRef<str>) {
    if debug_enabled() {
        emit("DEBUG", message.as_ref());
    }
}

pub fn info(message: impl AsRef<str>) {
    emit("INFO", message.as_ref());
}

pub fn warn(message: impl AsRef<str>) {
    emit("WARN", message.as_ref());
}

pub fn error(message: impl AsRef<str>) {
    emit("ERROR", message.as_ref());
}
