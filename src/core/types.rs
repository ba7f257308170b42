//! Core data types shared by the parser, the aggregator and the snapshot
//!
//! Everything here is immutable once built; aggregation only reads it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

/// Token counters reported by Codex.
///
/// Used both for cumulative readings and for per-event deltas. All fields
/// stay non-negative: `delta` clamps each field independently.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) struct TokenUsage {
    pub(crate) input_tokens: i64,
    pub(crate) cached_input_tokens: i64,
    pub(crate) output_tokens: i64,
    pub(crate) reasoning_output_tokens: i64,
    pub(crate) total_tokens: i64,
}

impl TokenUsage {
    pub(crate) fn zero() -> Self {
        Self::default()
    }

    /// Fieldwise sum, saturating at `i64::MAX` for absurd counters in corrupt logs
    pub(crate) fn add(&mut self, other: &TokenUsage) {
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.cached_input_tokens = self
            .cached_input_tokens
            .saturating_add(other.cached_input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
        self.reasoning_output_tokens = self
            .reasoning_output_tokens
            .saturating_add(other.reasoning_output_tokens);
        self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
    }

    /// Portion of this cumulative reading that is new since `previous`.
    ///
    /// Counters can go backwards when a session restarts or a log is cut
    /// short; such fields contribute 0.
    pub(crate) fn delta(&self, previous: &TokenUsage) -> TokenUsage {
        TokenUsage {
            input_tokens: (self.input_tokens - previous.input_tokens).max(0),
            cached_input_tokens: (self.cached_input_tokens - previous.cached_input_tokens).max(0),
            output_tokens: (self.output_tokens - previous.output_tokens).max(0),
            reasoning_output_tokens: (self.reasoning_output_tokens
                - previous.reasoning_output_tokens)
                .max(0),
            total_tokens: (self.total_tokens - previous.total_tokens).max(0),
        }
    }

    pub(crate) fn has_activity(&self) -> bool {
        self.input_tokens > 0
            || self.cached_input_tokens > 0
            || self.output_tokens > 0
            || self.reasoning_output_tokens > 0
            || self.total_tokens > 0
    }
}

impl<'a> std::iter::Sum<&'a TokenUsage> for TokenUsage {
    fn sum<I: Iterator<Item = &'a TokenUsage>>(iter: I) -> Self {
        iter.fold(TokenUsage::zero(), |mut acc, usage| {
            acc.add(usage);
            acc
        })
    }
}

/// Incremental usage attributed to one instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct UsageEvent {
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) usage: TokenUsage,
}

/// One quota window as reported by Codex (`primary` or `secondary`)
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct RateLimitWindow {
    pub(crate) used_percent: Option<f64>,
    pub(crate) window_minutes: Option<i64>,
    /// Unix epoch seconds
    pub(crate) resets_at: Option<i64>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct RateLimitSnapshot {
    pub(crate) primary: RateLimitWindow,
    pub(crate) secondary: RateLimitWindow,
    /// Passed through untouched; only kept when it is a non-empty object
    pub(crate) credits: Option<serde_json::Value>,
}

/// A rate-limit snapshot together with the instant it was observed
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ObservedRateLimits {
    pub(crate) limits: RateLimitSnapshot,
    pub(crate) observed_at: Option<DateTime<Utc>>,
}

/// Everything reconstructed from a single session log
#[derive(Debug, Clone)]
pub(crate) struct ParsedSession {
    pub(crate) session_id: String,
    pub(crate) file_path: PathBuf,
    pub(crate) started_at: Option<DateTime<Utc>>,
    pub(crate) last_event_at: Option<DateTime<Utc>>,
    pub(crate) cli_version: Option<String>,
    /// Sum of all event deltas
    pub(crate) totals: TokenUsage,
    pub(crate) events: Vec<UsageEvent>,
    pub(crate) rate_limits: Option<ObservedRateLimits>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(input: i64, cached: i64, output: i64, reasoning: i64, total: i64) -> TokenUsage {
        TokenUsage {
            input_tokens: input,
            cached_input_tokens: cached,
            output_tokens: output,
            reasoning_output_tokens: reasoning,
            total_tokens: total,
        }
    }

    #[test]
    fn zero_has_no_activity() {
        assert!(!TokenUsage::zero().has_activity());
        assert_eq!(TokenUsage::zero(), TokenUsage::default());
    }

    #[test]
    fn any_nonzero_field_is_activity() {
        assert!(usage(0, 0, 0, 0, 1).has_activity());
        assert!(usage(0, 1, 0, 0, 0).has_activity());
        assert!(usage(0, 0, 0, 3, 0).has_activity());
    }

    #[test]
    fn delta_against_itself_is_zero() {
        let a = usage(1000, 200, 500, 100, 1500);
        assert_eq!(a.delta(&a), TokenUsage::zero());
    }

    #[test]
    fn delta_subtracts_fieldwise() {
        let total = usage(1000, 200, 500, 100, 1500);
        let prev = usage(400, 100, 200, 50, 600);
        assert_eq!(total.delta(&prev), usage(600, 100, 300, 50, 900));
    }

    #[test]
    fn delta_clamps_regressions_per_field() {
        let current = usage(100, 0, 500, 10, 600);
        let prev = usage(400, 50, 200, 20, 900);
        let d = current.delta(&prev);
        assert_eq!(d, usage(0, 0, 300, 0, 0));
    }

    #[test]
    fn add_is_commutative_and_associative() {
        let a = usage(1, 2, 3, 4, 10);
        let b = usage(10, 20, 30, 40, 100);
        let c = usage(7, 0, 5, 0, 12);

        let mut ab = a;
        ab.add(&b);
        let mut ba = b;
        ba.add(&a);
        assert_eq!(ab, ba);

        let mut ab_c = ab;
        ab_c.add(&c);
        let mut bc = b;
        bc.add(&c);
        let mut a_bc = a;
        a_bc.add(&bc);
        assert_eq!(ab_c, a_bc);
    }

    #[test]
    fn add_saturates_instead_of_wrapping() {
        let huge = usage(i64::MAX, 0, i64::MAX, 0, i64::MAX);
        let mut acc = huge;
        acc.add(&huge);
        assert_eq!(acc, huge);

        let total: TokenUsage = [huge, huge, usage(1, 1, 1, 1, 1)].iter().sum();
        assert_eq!(total, usage(i64::MAX, 1, i64::MAX, 1, i64::MAX));
    }

    #[test]
    fn sum_folds_from_zero() {
        let items = [usage(1, 0, 1, 0, 2), usage(2, 1, 2, 1, 6)];
        let total: TokenUsage = items.iter().sum();
        assert_eq!(total, usage(3, 1, 3, 1, 8));
        let empty: [TokenUsage; 0] = [];
        assert_eq!(empty.iter().sum::<TokenUsage>(), TokenUsage::zero());
    }
}
