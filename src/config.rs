//! Instance configuration for the aggregation core.
//!
//! Defaults match the production BTC perpetual settings. The price scale is
//! semantically per-instrument (100 suits two-decimal ticks; finer-tick
//! assets need a larger scale), which is why it is carried per instance
//! instead of baked in as a compile-time constant.

use serde::Deserialize;

/// Tuning for one [`CrossVenueAggregator`](crate::CrossVenueAggregator).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Integer price scale: `price_raw = round(price * price_scale)`.
    pub price_scale: i64,
    /// Maximum tracked levels per side per venue.
    pub max_levels: usize,
    /// Maximum levels per side in an aggregated snapshot.
    pub output_levels: usize,
    /// A venue with no write for longer than this is excluded from merges.
    pub stale_ms: i64,
    /// A level holding at least this share of its side's depth is a wall.
    pub wall_threshold_pct: f64,
    /// Maximum reported walls per side.
    pub wall_cap: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            price_scale: 100,
            max_levels: 1000,
            output_levels: 50,
            stale_ms: 5_000,
            wall_threshold_pct: 0.03,
            wall_cap: 8,
        }
    }
}

/// Tuning for one [`VwafEngine`](crate::VwafEngine).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VwafConfig {
    /// A funding sample older than this is excluded from the aggregate.
    pub funding_fresh_ms: i64,
    /// Below this total open interest the aggregate is not representative
    /// and the result is zeroed.
    pub min_oi_usd: f64,
}

impl Default for VwafConfig {
    fn default() -> Self {
        Self {
            funding_fresh_ms: 90_000,
            min_oi_usd: 1_000_000.0,
        }
    }
}
