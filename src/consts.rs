/// Day key format used for daily buckets: "2025-01-15"
pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

pub(crate) const DEFAULT_CODEX_DIR: &str = ".codex";
pub(crate) const CODEX_HOME_ENV: &str = "CODEX_HOME";
pub(crate) const SESSIONS_SUBDIR: &str = "sessions";
pub(crate) const ARCHIVED_SUBDIR: &str = "archived_sessions";
pub(crate) const TRACKER_SUBDIR: &str = "usage_tracker";
pub(crate) const CONFIG_FILE: &str = "config.toml";
pub(crate) const SNAPSHOT_FILE: &str = "latest_snapshot.json";
pub(crate) const APP_DIR: &str = "codex-usage";

pub(crate) const DEFAULT_SESSION_WINDOW_MINUTES: i64 = 300;
pub(crate) const DEFAULT_WEEK_WINDOW_MINUTES: i64 = 10_080;

pub(crate) const TOP_SESSIONS_LIMIT: usize = 10;

pub(crate) const DEFAULT_WATCH_INTERVAL_SECS: u64 = 180;
pub(crate) const MIN_WATCH_INTERVAL_SECS: u64 = 30;

/// Fallback session id when a log path has no usable file stem
pub(crate) const UNKNOWN: &str = "unknown";
