//! Codex session log parser
//!
//! A session log is JSONL. Usage arrives as `event_msg` records whose payload
//! type is `token_count`; they carry the session's cumulative token counters,
//! so incremental usage is recovered by differencing consecutive readings.

use chrono::{DateTime, Utc};
use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::core::{
    ObservedRateLimits, ParsedSession, RateLimitSnapshot, RateLimitWindow, TokenUsage, UsageEvent,
};
use crate::utils::parse_timestamp;

// ============================================================================
// Record shapes
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawJsonEntry {
    #[serde(default, deserialize_with = "lenient_str")]
    timestamp: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "lenient_str")]
    entry_type: Option<String>,
    #[serde(default)]
    payload: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SessionMetaPayload {
    #[serde(deserialize_with = "lenient_text")]
    id: Option<String>,
    #[serde(deserialize_with = "lenient_str")]
    timestamp: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    cli_version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EventPayload {
    #[serde(rename = "type", deserialize_with = "lenient_str")]
    payload_type: Option<String>,
    #[serde(deserialize_with = "lenient")]
    info: Option<TokenInfo>,
    rate_limits: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TokenInfo {
    #[serde(deserialize_with = "lenient")]
    total_token_usage: Option<RawTokenUsage>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawTokenUsage {
    #[serde(deserialize_with = "lenient_int")]
    input_tokens: Option<i64>,
    #[serde(deserialize_with = "lenient_int")]
    cached_input_tokens: Option<i64>,
    #[serde(deserialize_with = "lenient_int")]
    output_tokens: Option<i64>,
    #[serde(deserialize_with = "lenient_int")]
    reasoning_output_tokens: Option<i64>,
    #[serde(deserialize_with = "lenient_int")]
    total_tokens: Option<i64>,
}

impl From<RawTokenUsage> for TokenUsage {
    fn from(raw: RawTokenUsage) -> Self {
        let field = |value: Option<i64>| value.unwrap_or(0).max(0);
        TokenUsage {
            input_tokens: field(raw.input_tokens),
            cached_input_tokens: field(raw.cached_input_tokens),
            output_tokens: field(raw.output_tokens),
            reasoning_output_tokens: field(raw.reasoning_output_tokens),
            total_tokens: field(raw.total_tokens),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRateLimits {
    #[serde(deserialize_with = "lenient")]
    primary: Option<RawRateLimitWindow>,
    #[serde(deserialize_with = "lenient")]
    secondary: Option<RawRateLimitWindow>,
    credits: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRateLimitWindow {
    #[serde(deserialize_with = "lenient_float")]
    used_percent: Option<f64>,
    #[serde(deserialize_with = "lenient_int")]
    window_minutes: Option<i64>,
    #[serde(deserialize_with = "lenient_int")]
    resets_at: Option<i64>,
}

impl From<RawRateLimitWindow> for RateLimitWindow {
    fn from(raw: RawRateLimitWindow) -> Self {
        RateLimitWindow {
            used_percent: raw.used_percent,
            window_minutes: raw.window_minutes,
            resets_at: raw.resets_at,
        }
    }
}

impl From<RawRateLimits> for RateLimitSnapshot {
    fn from(raw: RawRateLimits) -> Self {
        let credits = raw
            .credits
            .filter(|value| value.as_object().is_some_and(|map| !map.is_empty()));
        RateLimitSnapshot {
            primary: raw.primary.map(Into::into).unwrap_or_default(),
            secondary: raw.secondary.map(Into::into).unwrap_or_default(),
            credits,
        }
    }
}

// Field-level leniency: a value of the wrong shape reads as absent instead of
// failing the whole record.

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

fn lenient_str<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        _ => None,
    })
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_int<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_as_i64))
}

fn lenient_float<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_as_f64))
}

fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

// ============================================================================
// Record decoding
// ============================================================================

#[derive(Debug, Default)]
pub(crate) struct SessionMeta {
    pub(crate) id: Option<String>,
    pub(crate) started_at: Option<DateTime<Utc>>,
    pub(crate) cli_version: Option<String>,
}

#[derive(Debug, Default)]
pub(crate) struct TokenCount {
    /// Cumulative counters as of this record
    pub(crate) total: TokenUsage,
    pub(crate) rate_limits: Option<RateLimitSnapshot>,
}

#[derive(Debug)]
pub(crate) enum LogRecord {
    SessionMeta(SessionMeta),
    TokenCount(TokenCount),
    Other,
}

/// Decode one JSONL line. `None` means the line is not a JSON record at all.
pub(crate) fn decode_record(line: &str) -> Option<(Option<DateTime<Utc>>, LogRecord)> {
    let raw: RawJsonEntry = serde_json::from_str(line).ok()?;
    let timestamp = raw.timestamp.as_deref().and_then(parse_timestamp);

    let record = match raw.entry_type.as_deref() {
        Some("session_meta") => {
            let payload: SessionMetaPayload =
                serde_json::from_value(raw.payload).unwrap_or_default();
            LogRecord::SessionMeta(SessionMeta {
                id: payload.id,
                started_at: payload.timestamp.as_deref().and_then(parse_timestamp),
                cli_version: payload.cli_version,
            })
        }
        Some("event_msg") => {
            let payload: EventPayload = serde_json::from_value(raw.payload).unwrap_or_default();
            if payload.payload_type.as_deref() != Some("token_count") {
                LogRecord::Other
            } else {
                let total = payload
                    .info
                    .and_then(|info| info.total_token_usage)
                    .map(TokenUsage::from)
                    .unwrap_or_default();
                let rate_limits = payload
                    .rate_limits
                    .filter(|value| value.as_object().is_some_and(|map| !map.is_empty()))
                    .and_then(|value| serde_json::from_value::<RawRateLimits>(value).ok())
                    .map(RateLimitSnapshot::from);
                LogRecord::TokenCount(TokenCount { total, rate_limits })
            }
        }
        _ => LogRecord::Other,
    };

    Some((timestamp, record))
}

// ============================================================================
// Session reconstruction
// ============================================================================

/// Folds a session's records, in file order, into a `ParsedSession`
#[derive(Debug)]
pub(crate) struct SessionBuilder {
    session_id: String,
    file_path: PathBuf,
    started_at: Option<DateTime<Utc>>,
    last_event_at: Option<DateTime<Utc>>,
    cli_version: Option<String>,
    totals: TokenUsage,
    events: Vec<UsageEvent>,
    previous_totals: Option<TokenUsage>,
    rate_limits: Option<ObservedRateLimits>,
}

impl SessionBuilder {
    pub(crate) fn new(path: &Path) -> Self {
        let session_id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(crate::consts::UNKNOWN)
            .to_string();
        SessionBuilder {
            session_id,
            file_path: path.to_path_buf(),
            started_at: None,
            last_event_at: None,
            cli_version: None,
            totals: TokenUsage::zero(),
            events: Vec::new(),
            previous_totals: None,
            rate_limits: None,
        }
    }

    fn touch(&mut self, timestamp: Option<DateTime<Utc>>) {
        if let Some(ts) = timestamp
            && self.last_event_at.is_none_or(|last| ts > last)
        {
            self.last_event_at = Some(ts);
        }
    }

    pub(crate) fn apply(
        &mut self,
        timestamp: Option<DateTime<Utc>>,
        record: LogRecord,
        now: DateTime<Utc>,
    ) {
        match record {
            LogRecord::SessionMeta(meta) => self.apply_meta(timestamp, meta),
            LogRecord::TokenCount(count) => self.apply_token_count(timestamp, count, now),
            LogRecord::Other => {}
        }
    }

    fn apply_meta(&mut self, timestamp: Option<DateTime<Utc>>, meta: SessionMeta) {
        if let Some(id) = meta.id {
            self.session_id = id;
        }
        self.started_at = meta.started_at.or(timestamp).or(self.started_at);
        if meta.cli_version.is_some() {
            self.cli_version = meta.cli_version;
        }
        self.touch(timestamp);
    }

    fn apply_token_count(
        &mut self,
        timestamp: Option<DateTime<Utc>>,
        count: TokenCount,
        now: DateTime<Utc>,
    ) {
        self.touch(timestamp);

        // A zero reading carries no information and leaves the cursor alone
        if count.total.has_activity() {
            let delta = match &self.previous_totals {
                Some(prev) => count.total.delta(prev),
                None => count.total,
            };
            self.previous_totals = Some(count.total);

            if delta.has_activity() {
                self.events.push(UsageEvent {
                    timestamp: timestamp.unwrap_or(now),
                    usage: delta,
                });
                self.totals.add(&delta);
            }
        }

        if let Some(limits) = count.rate_limits {
            let observed_at =
                timestamp.or_else(|| self.rate_limits.as_ref().and_then(|r| r.observed_at));
            self.rate_limits = Some(ObservedRateLimits {
                limits,
                observed_at,
            });
        }
    }

    /// `None` when the session produced no measurable usage
    pub(crate) fn finish(self) -> Option<ParsedSession> {
        if self.events.is_empty() && !self.totals.has_activity() {
            return None;
        }
        Some(ParsedSession {
            session_id: self.session_id,
            file_path: self.file_path,
            started_at: self.started_at,
            last_event_at: self.last_event_at,
            cli_version: self.cli_version,
            totals: self.totals,
            events: self.events,
            rate_limits: self.rate_limits,
        })
    }
}

/// Parse one session log. Unreadable files and files without usage yield `None`.
///
/// `now` timestamps usage whose record carries no parsable timestamp.
pub(crate) fn parse_session_file(path: &Path, now: DateTime<Utc>) -> Option<ParsedSession> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(err) => {
            debug!(path = %path.display(), error = %err, "failed to open session log");
            return None;
        }
    };
    let reader = BufReader::new(file);
    let mut builder = SessionBuilder::new(path);

    for (line_no, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(err) if err.kind() == ErrorKind::InvalidData => {
                debug!(path = %path.display(), line = line_no + 1, "skipping non UTF-8 line");
                continue;
            }
            Err(err) => {
                debug!(path = %path.display(), error = %err, "failed to read session log");
                return None;
            }
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        // A line still being appended fails to decode here and is picked up next run
        let Some((timestamp, record)) = decode_record(trimmed) else {
            debug!(path = %path.display(), line = line_no + 1, "skipping malformed record");
            continue;
        };
        builder.apply(timestamp, record, now);
    }

    builder.finish()
}
