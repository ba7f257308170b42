//! Percent-used and reset-time resolution for the quota windows
//!
//! Percent used is resolved by asking an ordered list of sources; the first
//! one with an answer wins. No answer means the percent is unknown.

use chrono::{DateTime, Utc};

use crate::core::types::{RateLimitWindow, TokenUsage};
use crate::utils::epoch_to_utc;

/// What a percent source gets to look at for one window
#[derive(Debug, Clone, Copy)]
pub(crate) struct WindowContext<'a> {
    /// Figures Codex reported for the matching rate-limit window
    pub(crate) reported: &'a RateLimitWindow,
    /// Locally summed usage inside the window
    pub(crate) usage: &'a TokenUsage,
    /// Configured token budget for the window
    pub(crate) limit_tokens: Option<i64>,
}

pub(crate) trait PercentSource {
    /// `None` means "no opinion", letting the next source answer
    fn used_percent(&self, ctx: &WindowContext<'_>) -> Option<f64>;
}

/// Percent reported by Codex itself
pub(crate) struct ReportedPercent;

impl PercentSource for ReportedPercent {
    fn used_percent(&self, ctx: &WindowContext<'_>) -> Option<f64> {
        ctx.reported.used_percent
    }
}

/// Window usage measured against a configured token budget, capped at 100
pub(crate) struct ConfiguredLimit;

impl PercentSource for ConfiguredLimit {
    fn used_percent(&self, ctx: &WindowContext<'_>) -> Option<f64> {
        let limit = ctx.limit_tokens.filter(|limit| *limit > 0)?;
        let percent = ctx.usage.total_tokens as f64 / limit as f64 * 100.0;
        Some(percent.min(100.0))
    }
}

pub(crate) const PERCENT_SOURCES: &[&dyn PercentSource] = &[&ReportedPercent, &ConfiguredLimit];

pub(crate) fn resolve_used_percent(
    sources: &[&dyn PercentSource],
    ctx: &WindowContext<'_>,
) -> Option<f64> {
    sources.iter().find_map(|source| source.used_percent(ctx))
}

/// A window's reset instant in the three shapes the snapshot exposes
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ResetTime {
    pub(crate) epoch: Option<i64>,
    pub(crate) at: Option<DateTime<Utc>>,
    /// Negative once the reset has passed; left as-is so readers can tell
    /// the snapshot is stale
    pub(crate) in_seconds: Option<i64>,
}

pub(crate) fn resolve_reset(epoch: Option<i64>, now: DateTime<Utc>) -> ResetTime {
    let at = epoch.and_then(epoch_to_utc);
    ResetTime {
        epoch,
        at,
        in_seconds: at.map(|at| (at - now).num_seconds()),
    }
}
