//! Per-venue book state: two ladders plus sequencing and freshness metadata.

use super::{BookSide, Side};
use chrono::Utc;
use tracing::debug;

/// Complete book for one venue — bids, asks, and delta-ordering metadata.
///
/// Deltas carry a venue-assigned monotone `update_id`; a batch that does not
/// advance the sequence is dropped whole, with no partial application. An id
/// of 0 bypasses sequencing for venues that do not number their deltas.
/// Recovery after a sequence gap is the adapter's job (request a fresh
/// snapshot); the book itself only refuses the stale batch.
#[derive(Debug, Clone)]
pub struct VenueBook {
    pub bids: BookSide,
    pub asks: BookSide,
    pub last_update_id: u64,
    pub initialized: bool,
    /// Wall-clock milliseconds of the last successful write.
    pub last_seen_ms: i64,
}

impl VenueBook {
    pub fn new(max_levels: usize) -> Self {
        Self {
            bids: BookSide::new(Side::Bid, max_levels),
            asks: BookSide::new(Side::Ask, max_levels),
            last_update_id: 0,
            initialized: false,
            last_seen_ms: 0,
        }
    }

    /// Install a full snapshot and mark the book live.
    pub fn apply_snapshot(&mut self, update_id: u64, bids: &[(i64, f64)], asks: &[(i64, f64)]) {
        self.apply_snapshot_at(Utc::now().timestamp_millis(), update_id, bids, asks);
    }

    pub(crate) fn apply_snapshot_at(
        &mut self,
        now_ms: i64,
        update_id: u64,
        bids: &[(i64, f64)],
        asks: &[(i64, f64)],
    ) {
        self.bids.apply_snapshot(bids);
        self.asks.apply_snapshot(asks);
        self.last_update_id = update_id;
        self.initialized = true;
        self.last_seen_ms = now_ms;
    }

    /// Apply a delta batch: every bid delta, then every ask delta, in order.
    pub fn apply_delta(&mut self, update_id: u64, bid_deltas: &[(i64, f64)], ask_deltas: &[(i64, f64)]) {
        self.apply_delta_at(Utc::now().timestamp_millis(), update_id, bid_deltas, ask_deltas);
    }

    pub(crate) fn apply_delta_at(
        &mut self,
        now_ms: i64,
        update_id: u64,
        bid_deltas: &[(i64, f64)],
        ask_deltas: &[(i64, f64)],
    ) {
        if !self.initialized {
            debug!(update_id, "delta before snapshot, ignoring");
            return;
        }
        if update_id != 0 && update_id <= self.last_update_id {
            debug!(
                update_id,
                last_update_id = self.last_update_id,
                "stale delta, ignoring"
            );
            return;
        }

        for &(price_raw, qty) in bid_deltas {
            self.bids.apply_delta(price_raw, qty);
        }
        for &(price_raw, qty) in ask_deltas {
            self.asks.apply_delta(price_raw, qty);
        }
        if update_id != 0 {
            self.last_update_id = update_id;
        }
        self.last_seen_ms = now_ms;
    }

    /// True when the book is live but has seen no write within `stale_ms`.
    pub fn is_stale(&self, stale_ms: i64) -> bool {
        self.is_stale_at(Utc::now().timestamp_millis(), stale_ms)
    }

    pub(crate) fn is_stale_at(&self, now_ms: i64, stale_ms: i64) -> bool {
        self.initialized && now_ms - self.last_seen_ms > stale_ms
    }

    /// Restore the default-constructed state.
    pub fn reset(&mut self) {
        *self = Self::new(self.bids.max_levels());
    }
}
