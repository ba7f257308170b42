//! Aggregation over all parsed sessions
//!
//! Merges every session's events into one chronological stream, then derives
//! rolling windows, quota windows, daily buckets and session rankings.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::core::limits::{
    PERCENT_SOURCES, ResetTime, WindowContext, resolve_reset, resolve_used_percent,
};
use crate::core::types::{
    ObservedRateLimits, ParsedSession, RateLimitSnapshot, RateLimitWindow, TokenUsage, UsageEvent,
};
use crate::utils::Timezone;

/// Inputs that shape an aggregation run besides the sessions themselves
#[derive(Debug, Clone, Copy)]
pub(crate) struct AggregationSettings {
    pub(crate) session_window_minutes: i64,
    pub(crate) week_window_minutes: i64,
    pub(crate) session_limit_tokens: Option<i64>,
    pub(crate) week_limit_tokens: Option<i64>,
    pub(crate) top_sessions: usize,
    pub(crate) timezone: Timezone,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) struct RollingWindows {
    pub(crate) last_5h: TokenUsage,
    pub(crate) last_24h: TokenUsage,
    pub(crate) last_7d: TokenUsage,
    pub(crate) last_30d: TokenUsage,
    pub(crate) all_time: TokenUsage,
}

/// One quota window (session or weekly) after resolution
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct QuotaWindow {
    pub(crate) window_minutes: i64,
    pub(crate) usage: TokenUsage,
    pub(crate) used_percent: Option<f64>,
    pub(crate) reset: ResetTime,
    /// Window length Codex reported, else the configured one
    pub(crate) reported_window_minutes: i64,
}

/// Result of one aggregation run; borrows the sessions it ranks
#[derive(Debug)]
pub(crate) struct UsageSummary<'a> {
    pub(crate) events_count: usize,
    pub(crate) last_activity_at: Option<DateTime<Utc>>,
    pub(crate) windows: RollingWindows,
    pub(crate) session_window: QuotaWindow,
    pub(crate) weekly_window: QuotaWindow,
    pub(crate) rate_limits_captured_at: Option<DateTime<Utc>>,
    pub(crate) credits: Option<&'a serde_json::Value>,
    /// Most recent day first
    pub(crate) daily: Vec<(NaiveDate, TokenUsage)>,
    pub(crate) active_session: Option<&'a ParsedSession>,
    pub(crate) top_sessions: Vec<&'a ParsedSession>,
}

/// All events from all sessions, oldest first. Equal timestamps keep
/// session order, then in-file order.
pub(crate) fn merge_events(sessions: &[ParsedSession]) -> Vec<UsageEvent> {
    let mut events: Vec<UsageEvent> = sessions
        .iter()
        .flat_map(|session| session.events.iter().copied())
        .collect();
    events.sort_by_key(|event| event.timestamp);
    events
}

/// Sum of events at or after `now - minutes`. Expects `events` sorted.
pub(crate) fn sum_window(events: &[UsageEvent], now: DateTime<Utc>, minutes: i64) -> TokenUsage {
    let cutoff = Duration::try_minutes(minutes).and_then(|window| now.checked_sub_signed(window));
    let start = match cutoff {
        Some(cutoff) => events.partition_point(|event| event.timestamp < cutoff),
        None => 0,
    };
    events[start..].iter().map(|event| &event.usage).sum()
}

pub(crate) fn rolling_windows(events: &[UsageEvent], now: DateTime<Utc>) -> RollingWindows {
    RollingWindows {
        last_5h: sum_window(events, now, 5 * 60),
        last_24h: sum_window(events, now, 24 * 60),
        last_7d: sum_window(events, now, 7 * 24 * 60),
        last_30d: sum_window(events, now, 30 * 24 * 60),
        all_time: events.iter().map(|event| &event.usage).sum(),
    }
}

/// Most recently observed rate limits across sessions; on a tie the later
/// session wins
pub(crate) fn latest_rate_limits(sessions: &[ParsedSession]) -> Option<&ObservedRateLimits> {
    sessions
        .iter()
        .filter_map(|session| session.rate_limits.as_ref())
        .filter(|observed| observed.observed_at.is_some())
        .fold(None, |best: Option<&ObservedRateLimits>, candidate| match best {
            Some(current) if candidate.observed_at < current.observed_at => Some(current),
            _ => Some(candidate),
        })
}

/// Per-day totals keyed by calendar date in `timezone`, newest day first
pub(crate) fn daily_totals(
    events: &[UsageEvent],
    timezone: Timezone,
) -> Vec<(NaiveDate, TokenUsage)> {
    let mut days: BTreeMap<NaiveDate, TokenUsage> = BTreeMap::new();
    for event in events {
        days.entry(timezone.local_date(event.timestamp))
            .or_default()
            .add(&event.usage);
    }
    days.into_iter().rev().collect()
}

/// Session with the latest activity. Undated sessions rank below dated
/// ones; the earliest discovered session wins a tie.
pub(crate) fn active_session(sessions: &[ParsedSession]) -> Option<&ParsedSession> {
    sessions.iter().fold(None, |best: Option<&ParsedSession>, candidate| match best {
        Some(current) if candidate.last_event_at <= current.last_event_at => Some(current),
        _ => Some(candidate),
    })
}

/// Sessions by total tokens, highest first, discovery order on ties
pub(crate) fn top_sessions(sessions: &[ParsedSession], limit: usize) -> Vec<&ParsedSession> {
    let mut ranked: Vec<&ParsedSession> = sessions.iter().collect();
    ranked.sort_by(|a, b| b.totals.total_tokens.cmp(&a.totals.total_tokens));
    ranked.truncate(limit);
    ranked
}

fn quota_window(
    events: &[UsageEvent],
    now: DateTime<Utc>,
    window_minutes: i64,
    limit_tokens: Option<i64>,
    reported: &RateLimitWindow,
) -> QuotaWindow {
    let usage = sum_window(events, now, window_minutes);
    let ctx = WindowContext {
        reported,
        usage: &usage,
        limit_tokens,
    };
    QuotaWindow {
        window_minutes,
        usage,
        used_percent: resolve_used_percent(PERCENT_SOURCES, &ctx),
        reset: resolve_reset(reported.resets_at, now),
        reported_window_minutes: reported.window_minutes.unwrap_or(window_minutes),
    }
}

pub(crate) fn aggregate<'a>(
    sessions: &'a [ParsedSession],
    settings: &AggregationSettings,
    now: DateTime<Utc>,
) -> UsageSummary<'a> {
    let events = merge_events(sessions);

    let latest = latest_rate_limits(sessions);
    let no_limits = RateLimitSnapshot::default();
    let limits = latest.map(|observed| &observed.limits).unwrap_or(&no_limits);

    let session_window = quota_window(
        &events,
        now,
        settings.session_window_minutes,
        settings.session_limit_tokens,
        &limits.primary,
    );
    let weekly_window = quota_window(
        &events,
        now,
        settings.week_window_minutes,
        settings.week_limit_tokens,
        &limits.secondary,
    );

    UsageSummary {
        events_count: events.len(),
        last_activity_at: events.last().map(|event| event.timestamp),
        windows: rolling_windows(&events, now),
        session_window,
        weekly_window,
        rate_limits_captured_at: latest.and_then(|observed| observed.observed_at),
        credits: latest.and_then(|observed| observed.limits.credits.as_ref()),
        daily: daily_totals(&events, settings.timezone),
        active_session: active_session(sessions),
        top_sessions: top_sessions(sessions, settings.top_sessions),
    }
}
