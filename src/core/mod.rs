//! Core module - usage types and the aggregation engine

mod aggregator;
mod limits;
mod types;

pub(crate) use aggregator::{AggregationSettings, QuotaWindow, RollingWindows, UsageSummary, aggregate};
pub(crate) use types::{
    ObservedRateLimits, ParsedSession, RateLimitSnapshot, RateLimitWindow, TokenUsage, UsageEvent,
};
