//! Snapshot document assembly and persistence
//!
//! The snapshot is the tool's contract with external readers (menu-bar
//! widgets, status lines), so every key is always present; unknown values
//! serialize as `null`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::consts::DATE_FORMAT;
use crate::core::{
    AggregationSettings, ParsedSession, QuotaWindow, RollingWindows, TokenUsage, UsageSummary,
};
use crate::error::AppError;
use crate::utils::format_utc;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct Snapshot {
    pub(crate) generated_at: String,
    pub(crate) codex_home: String,
    pub(crate) files_scanned: usize,
    pub(crate) sessions_count: usize,
    pub(crate) events_count: usize,
    pub(crate) last_activity_at: Option<String>,
    pub(crate) windows: RollingWindows,
    pub(crate) session_window: QuotaWindowDoc,
    pub(crate) weekly_window: QuotaWindowDoc,
    pub(crate) rate_limits: RateLimitsDoc,
    pub(crate) active_session: SessionDoc,
    pub(crate) daily_totals: DailyTotals,
    pub(crate) top_sessions: Vec<SessionDoc>,
    pub(crate) config: ConfigDoc,
    pub(crate) timezone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct QuotaWindowDoc {
    pub(crate) window_minutes: i64,
    pub(crate) usage: TokenUsage,
    pub(crate) used_percent: Option<f64>,
    pub(crate) resets_at: Option<String>,
    pub(crate) resets_at_epoch: Option<i64>,
    pub(crate) resets_in_seconds: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct RateLimitWindowDoc {
    pub(crate) used_percent: Option<f64>,
    pub(crate) window_minutes: i64,
    pub(crate) resets_at_epoch: Option<i64>,
    pub(crate) resets_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct RateLimitsDoc {
    pub(crate) captured_at: Option<String>,
    pub(crate) primary: RateLimitWindowDoc,
    pub(crate) secondary: RateLimitWindowDoc,
    pub(crate) credits: Option<serde_json::Value>,
}

/// Shape shared by `active_session` and each `top_sessions` entry
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub(crate) struct SessionDoc {
    pub(crate) session_id: Option<String>,
    pub(crate) file_path: Option<String>,
    pub(crate) started_at: Option<String>,
    pub(crate) last_event_at: Option<String>,
    pub(crate) totals: TokenUsage,
    pub(crate) cli_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct ConfigDoc {
    pub(crate) path: String,
    pub(crate) session_limit_tokens: Option<i64>,
    pub(crate) week_limit_tokens: Option<i64>,
    pub(crate) session_window_minutes: i64,
    pub(crate) week_window_minutes: i64,
}

/// Day buckets, serialized as a JSON object whose keys keep the newest-first
/// order they were built in
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct DailyTotals(pub(crate) Vec<(String, TokenUsage)>);

impl Serialize for DailyTotals {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (day, usage) in &self.0 {
            map.serialize_entry(day, usage)?;
        }
        map.end()
    }
}

impl From<&[(NaiveDate, TokenUsage)]> for DailyTotals {
    fn from(days: &[(NaiveDate, TokenUsage)]) -> Self {
        DailyTotals(
            days.iter()
                .map(|(day, usage)| (day.format(DATE_FORMAT).to_string(), *usage))
                .collect(),
        )
    }
}

impl From<&ParsedSession> for SessionDoc {
    fn from(session: &ParsedSession) -> Self {
        SessionDoc {
            session_id: Some(session.session_id.clone()),
            file_path: Some(session.file_path.display().to_string()),
            started_at: session.started_at.map(format_utc),
            last_event_at: session.last_event_at.map(format_utc),
            totals: session.totals,
            cli_version: session.cli_version.clone(),
        }
    }
}

impl From<&QuotaWindow> for QuotaWindowDoc {
    fn from(window: &QuotaWindow) -> Self {
        QuotaWindowDoc {
            window_minutes: window.window_minutes,
            usage: window.usage,
            used_percent: window.used_percent,
            resets_at: window.reset.at.map(format_utc),
            resets_at_epoch: window.reset.epoch,
            resets_in_seconds: window.reset.in_seconds,
        }
    }
}

impl From<&QuotaWindow> for RateLimitWindowDoc {
    fn from(window: &QuotaWindow) -> Self {
        RateLimitWindowDoc {
            used_percent: window.used_percent,
            window_minutes: window.reported_window_minutes,
            resets_at_epoch: window.reset.epoch,
            resets_at: window.reset.at.map(format_utc),
        }
    }
}

/// Run-level facts the summary itself does not carry
#[derive(Debug, Clone, Copy)]
pub(crate) struct SnapshotContext<'a> {
    pub(crate) generated_at: DateTime<Utc>,
    pub(crate) codex_home: &'a Path,
    pub(crate) config_path: &'a Path,
    pub(crate) settings: &'a AggregationSettings,
    pub(crate) files_scanned: usize,
    pub(crate) sessions_count: usize,
}

impl Snapshot {
    pub(crate) fn assemble(summary: &UsageSummary<'_>, ctx: &SnapshotContext<'_>) -> Self {
        let settings = ctx.settings;
        Snapshot {
            generated_at: format_utc(ctx.generated_at),
            codex_home: ctx.codex_home.display().to_string(),
            files_scanned: ctx.files_scanned,
            sessions_count: ctx.sessions_count,
            events_count: summary.events_count,
            last_activity_at: summary.last_activity_at.map(format_utc),
            windows: summary.windows,
            session_window: QuotaWindowDoc::from(&summary.session_window),
            weekly_window: QuotaWindowDoc::from(&summary.weekly_window),
            rate_limits: RateLimitsDoc {
                captured_at: summary.rate_limits_captured_at.map(format_utc),
                primary: RateLimitWindowDoc::from(&summary.session_window),
                secondary: RateLimitWindowDoc::from(&summary.weekly_window),
                credits: summary.credits.cloned(),
            },
            active_session: summary
                .active_session
                .map(SessionDoc::from)
                .unwrap_or_default(),
            daily_totals: DailyTotals::from(summary.daily.as_slice()),
            top_sessions: summary
                .top_sessions
                .iter()
                .map(|session| SessionDoc::from(*session))
                .collect(),
            config: ConfigDoc {
                path: ctx.config_path.display().to_string(),
                session_limit_tokens: settings.session_limit_tokens,
                week_limit_tokens: settings.week_limit_tokens,
                session_window_minutes: settings.session_window_minutes,
                week_window_minutes: settings.week_window_minutes,
            },
            timezone: settings.timezone.label(ctx.generated_at),
        }
    }

    pub(crate) fn to_json(&self) -> Result<String, AppError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Write `snapshot` to `path`, creating parent directories. The document
/// goes to a sibling temp file first and is renamed into place.
pub(crate) fn write_snapshot(snapshot: &Snapshot, path: &Path) -> Result<(), AppError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| AppError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let mut body = snapshot.to_json()?;
    body.push('\n');

    let tmp = temp_path(path);
    let write_err = |source| AppError::WriteSnapshot {
        path: path.to_path_buf(),
        source,
    };
    if let Err(source) = fs::write(&tmp, body) {
        let _ = fs::remove_file(&tmp);
        return Err(write_err(source));
    }
    if let Err(source) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(write_err(source));
    }

    debug!("Wrote snapshot to {}", path.display());
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(format!(".tmp-{}", std::process::id()));
    path.with_file_name(name)
}
