//! Volume-weighted aggregate funding: the open-interest-weighted funding
//! rate across venues, its dispersion, and a sentiment bucket.
//!
//! Funding pollers push per-venue samples in; the broadcast timer pulls a
//! computed result out. The engine's mutex is independent of the aggregator
//! lock — no operation ever holds both.

use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use derive_more::Constructor;
use serde::{Deserialize, Serialize};

use crate::config::VwafConfig;
use crate::venue::VenueId;

/// One venue's latest funding observation.
#[derive(Debug, Clone, Copy, Default)]
struct FundingSample {
    /// 8-hour funding rate as a decimal, e.g. 0.0001 = 1 bp.
    rate: f64,
    /// Open interest in USD, the weighting mass.
    oi_usd: f64,
    ts_ms: i64,
    active: bool,
}

/// Sentiment bucket derived from the aggregate funding rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    ExtremelyShort,
    ShortHeavy,
    Neutral,
    LongHeavy,
    ExtremelyLong,
}

impl Sentiment {
    /// Bucket an aggregate funding rate. All thresholds are strict: a rate
    /// sitting exactly on a boundary stays in the milder bucket.
    fn from_vwaf(vwaf: f64) -> Self {
        if vwaf > 0.0005 {
            Sentiment::ExtremelyLong
        } else if vwaf > 0.0002 {
            Sentiment::LongHeavy
        } else if vwaf < -0.0005 {
            Sentiment::ExtremelyShort
        } else if vwaf < -0.0002 {
            Sentiment::ShortHeavy
        } else {
            Sentiment::Neutral
        }
    }

    /// Map a raw score onto a bucket, clamping into `[-2, 2]`.
    pub fn from_score(score: i32) -> Self {
        match score.clamp(-2, 2) {
            -2 => Sentiment::ExtremelyShort,
            -1 => Sentiment::ShortHeavy,
            0 => Sentiment::Neutral,
            1 => Sentiment::LongHeavy,
            _ => Sentiment::ExtremelyLong,
        }
    }

    /// Score in `[-2, 2]`; negative is short-leaning, positive long-leaning.
    pub fn score(self) -> i32 {
        match self {
            Sentiment::ExtremelyShort => -2,
            Sentiment::ShortHeavy => -1,
            Sentiment::Neutral => 0,
            Sentiment::LongHeavy => 1,
            Sentiment::ExtremelyLong => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Sentiment::ExtremelyShort => "extremely_short",
            Sentiment::ShortHeavy => "short_heavy",
            Sentiment::Neutral => "neutral",
            Sentiment::LongHeavy => "long_heavy",
            Sentiment::ExtremelyLong => "extremely_long",
        }
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-venue contribution to the aggregate, in venue-slot order.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize, Constructor)]
pub struct VenueFunding {
    pub venue: VenueId,
    pub rate: f64,
    pub oi_usd: f64,
    pub weight: f64,
}

/// Output of [`VwafEngine::compute`].
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VwafResult {
    /// Open-interest-weighted average 8-hour funding rate.
    pub vwaf: f64,
    /// `vwaf` annualized: three funding periods a day, 365 days.
    pub annualized: f64,
    /// `vwaf` expressed as an 8-hour percentage.
    pub vwaf_8h_pct: f64,
    /// Population standard deviation of the contributing rates about `vwaf`.
    pub divergence: f64,
    pub total_oi_usd: f64,
    pub sentiment: Sentiment,
    /// Contributing venues in slot order; weights are zero below the OI floor.
    pub by_venue: Vec<VenueFunding>,
}

impl Default for VwafResult {
    fn default() -> Self {
        Self {
            vwaf: 0.0,
            annualized: 0.0,
            vwaf_8h_pct: 0.0,
            divergence: 0.0,
            total_oi_usd: 0.0,
            sentiment: Sentiment::Neutral,
            by_venue: Vec::new(),
        }
    }
}

/// Aggregates per-venue funding samples behind a single mutex.
pub struct VwafEngine {
    config: VwafConfig,
    samples: Mutex<[FundingSample; VenueId::COUNT]>,
}

impl VwafEngine {
    pub fn new(config: VwafConfig) -> Self {
        Self {
            config,
            samples: Mutex::new([FundingSample::default(); VenueId::COUNT]),
        }
    }

    pub fn config(&self) -> &VwafConfig {
        &self.config
    }

    /// Store a venue's funding sample and mark its slot live.
    pub fn update_funding(&self, venue: VenueId, rate: f64, oi_usd: f64, ts_ms: i64) {
        let mut samples = self.lock();
        samples[venue.index()] = FundingSample {
            rate,
            oi_usd,
            ts_ms,
            active: true,
        };
    }

    /// Compute the aggregate over every live, fresh sample.
    pub fn compute(&self) -> VwafResult {
        self.compute_at(Utc::now().timestamp_millis())
    }

    pub(crate) fn compute_at(&self, now_ms: i64) -> VwafResult {
        // Samples are a small Copy array; snapshot them and drop the lock
        // before doing any arithmetic.
        let samples = *self.lock();

        let active: Vec<(VenueId, FundingSample)> = VenueId::ALL
            .iter()
            .map(|&venue| (venue, samples[venue.index()]))
            .filter(|(_, s)| s.active && now_ms - s.ts_ms < self.config.funding_fresh_ms)
            .collect();

        let mut result = VwafResult::default();
        let total_oi: f64 = active.iter().map(|(_, s)| s.oi_usd).sum();

        if total_oi < self.config.min_oi_usd {
            // Not enough weight behind the data: report who is live, nothing else.
            result.by_venue = active
                .iter()
                .map(|&(venue, s)| VenueFunding::new(venue, s.rate, s.oi_usd, 0.0))
                .collect();
            return result;
        }

        result.total_oi_usd = total_oi;
        let mut vwaf = 0.0;
        for &(venue, s) in &active {
            let weight = s.oi_usd / total_oi;
            vwaf += s.rate * weight;
            result.by_venue.push(VenueFunding::new(venue, s.rate, s.oi_usd, weight));
        }

        result.vwaf = vwaf;
        result.annualized = vwaf * 3.0 * 365.0;
        result.vwaf_8h_pct = vwaf * 100.0;

        if !active.is_empty() {
            let sq_sum: f64 = active
                .iter()
                .map(|(_, s)| {
                    let dev = s.rate - vwaf;
                    dev * dev
                })
                .sum();
            result.divergence = (sq_sum / active.len() as f64).sqrt();
        }

        result.sentiment = Sentiment::from_vwaf(vwaf);
        result
    }

    /// Deactivate every slot. Retained values are no longer read; the next
    /// [`update_funding`](VwafEngine::update_funding) re-arms a slot.
    pub fn clear(&self) {
        let mut samples = self.lock();
        for sample in samples.iter_mut() {
            sample.active = false;
        }
    }

    fn lock(&self) -> MutexGuard<'_, [FundingSample; VenueId::COUNT]> {
        self.samples
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
