//! Cross-venue aggregation: merged depth, best bid/offer, and wall detection
//! over every live venue book.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::books::{to_price_raw, Level, VenueBook};
use crate::config::AggregatorConfig;
use crate::error::AggregatorError;
use crate::venue::VenueId;
use crate::walls::{detect_walls, Wall};

/// Point-in-time merged view across all live venues.
///
/// Bids descend and asks ascend by price; quantities at equal prices are
/// summed across venues. Cross-venue books routinely cross by small amounts
/// under latency — a crossed view is reported faithfully, never repaired.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AggregatedSnapshot {
    pub timestamp_ms: i64,
    /// Scale for converting level prices to floating units.
    pub price_scale: i64,
    pub bids: Vec<Level>,
    pub asks: Vec<Level>,
    pub bid_walls: Vec<Wall>,
    pub ask_walls: Vec<Wall>,
    /// Highest bid across venues in floating units; 0 when no bids.
    pub best_bid: f64,
    /// Lowest ask across venues in floating units; 0 when no asks.
    pub best_ask: f64,
    pub spread: f64,
    pub mid_price: f64,
}

/// Top-of-ladder view of a single venue.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VenueDepth {
    pub timestamp_ms: i64,
    pub venue: VenueId,
    pub bids: Vec<Level>,
    pub asks: Vec<Level>,
}

/// Liveness summary for one venue slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct VenueHealth {
    pub venue: VenueId,
    pub initialized: bool,
    pub stale: bool,
    pub last_seen_ms: i64,
    pub last_update_id: u64,
}

/// Owns one [`VenueBook`] per venue slot behind a single reader/writer lock.
///
/// Writers (snapshots, deltas, clears) take the lock exclusively and set the
/// dirty hint; the merged read takes it shared, so concurrent readers never
/// block each other. No lock is held across anything but the book mutation
/// or fold itself. The dirty flag is a relaxed change hint for broadcast
/// throttling, not a barrier; readers never clear it implicitly.
pub struct CrossVenueAggregator {
    config: AggregatorConfig,
    books: RwLock<[VenueBook; VenueId::COUNT]>,
    dirty: AtomicBool,
}

impl CrossVenueAggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        let max_levels = config.max_levels;
        Self {
            config,
            books: RwLock::new(std::array::from_fn(|_| VenueBook::new(max_levels))),
            dirty: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Install a venue's full snapshot.
    ///
    /// Prices must be finite and non-negative, quantities finite; on a
    /// validation error no state changes.
    pub fn init_snapshot(
        &self,
        venue: VenueId,
        update_id: u64,
        bids: &[(f64, f64)],
        asks: &[(f64, f64)],
    ) -> Result<(), AggregatorError> {
        self.init_snapshot_at(Utc::now().timestamp_millis(), venue, update_id, bids, asks)
    }

    pub(crate) fn init_snapshot_at(
        &self,
        now_ms: i64,
        venue: VenueId,
        update_id: u64,
        bids: &[(f64, f64)],
        asks: &[(f64, f64)],
    ) -> Result<(), AggregatorError> {
        let bids = self.to_raw(bids)?;
        let asks = self.to_raw(asks)?;
        {
            let mut books = self.write_books();
            books[venue.index()].apply_snapshot_at(now_ms, update_id, &bids, &asks);
            self.dirty.store(true, Ordering::Relaxed);
        }
        info!(
            venue = %venue,
            update_id,
            bids = bids.len(),
            asks = asks.len(),
            "venue snapshot installed"
        );
        Ok(())
    }

    /// Apply a delta batch to a venue.
    ///
    /// Pre-snapshot and non-advancing batches are dropped whole inside the
    /// venue book; that is routine feed behaviour, not an error.
    pub fn apply_delta(
        &self,
        venue: VenueId,
        update_id: u64,
        bid_deltas: &[(f64, f64)],
        ask_deltas: &[(f64, f64)],
    ) -> Result<(), AggregatorError> {
        self.apply_delta_at(
            Utc::now().timestamp_millis(),
            venue,
            update_id,
            bid_deltas,
            ask_deltas,
        )
    }

    pub(crate) fn apply_delta_at(
        &self,
        now_ms: i64,
        venue: VenueId,
        update_id: u64,
        bid_deltas: &[(f64, f64)],
        ask_deltas: &[(f64, f64)],
    ) -> Result<(), AggregatorError> {
        let bid_deltas = self.to_raw(bid_deltas)?;
        let ask_deltas = self.to_raw(ask_deltas)?;
        let mut books = self.write_books();
        books[venue.index()].apply_delta_at(now_ms, update_id, &bid_deltas, &ask_deltas);
        self.dirty.store(true, Ordering::Relaxed);
        Ok(())
    }

    /// Reset a venue's book to its default state.
    pub fn clear_venue(&self, venue: VenueId) {
        {
            let mut books = self.write_books();
            books[venue.index()].reset();
            self.dirty.store(true, Ordering::Relaxed);
        }
        info!(venue = %venue, "venue book cleared");
    }

    /// Merge every live venue into a snapshot with up to `levels` levels per
    /// side (`None` and out-of-range values clamp to the configured output
    /// bound).
    ///
    /// Reading mutates no venue state and leaves the dirty flag untouched;
    /// consumers using the flag for change detection call [`clear_dirty`]
    /// themselves after taking a snapshot.
    ///
    /// [`clear_dirty`]: CrossVenueAggregator::clear_dirty
    pub fn get_aggregated(&self, levels: Option<usize>) -> AggregatedSnapshot {
        self.get_aggregated_at(Utc::now().timestamp_millis(), levels)
    }

    pub(crate) fn get_aggregated_at(
        &self,
        now_ms: i64,
        levels: Option<usize>,
    ) -> AggregatedSnapshot {
        let levels = levels
            .unwrap_or(self.config.output_levels)
            .min(self.config.output_levels);

        let mut merged_bids: BTreeMap<Reverse<i64>, f64> = BTreeMap::new();
        let mut merged_asks: BTreeMap<i64, f64> = BTreeMap::new();
        let mut skipped_stale: Vec<VenueId> = Vec::new();
        {
            let books = self.read_books();
            for (slot, book) in books.iter().enumerate() {
                if !book.initialized {
                    continue;
                }
                if book.is_stale_at(now_ms, self.config.stale_ms) {
                    skipped_stale.push(VenueId::ALL[slot]);
                    continue;
                }
                for level in book.bids.top(self.config.max_levels) {
                    *merged_bids.entry(Reverse(level.price_raw)).or_insert(0.0) += level.qty;
                }
                for level in book.asks.top(self.config.max_levels) {
                    *merged_asks.entry(level.price_raw).or_insert(0.0) += level.qty;
                }
            }
        }
        for venue in skipped_stale {
            debug!(venue = %venue, "stale venue excluded from merge");
        }

        let mut snap = AggregatedSnapshot {
            timestamp_ms: now_ms,
            price_scale: self.config.price_scale,
            bids: merged_bids
                .into_iter()
                .take(levels)
                .map(|(Reverse(price_raw), qty)| Level::new(price_raw, qty))
                .collect(),
            asks: merged_asks
                .into_iter()
                .take(levels)
                .map(|(price_raw, qty)| Level::new(price_raw, qty))
                .collect(),
            ..AggregatedSnapshot::default()
        };

        let scale = self.config.price_scale;
        snap.best_bid = snap.bids.first().map_or(0.0, |l| l.price_f64(scale));
        snap.best_ask = snap.asks.first().map_or(0.0, |l| l.price_f64(scale));
        snap.spread = snap.best_ask - snap.best_bid;
        snap.mid_price = (snap.best_bid + snap.best_ask) / 2.0;

        detect_walls(
            &mut snap,
            self.config.wall_threshold_pct,
            self.config.wall_cap,
        );
        snap
    }

    /// Top-`levels` view of a single venue, or `None` before its first
    /// snapshot. Staleness does not hide a venue here — per-venue reads are
    /// how a collaborator inspects a quiet book.
    pub fn venue_snapshot(&self, venue: VenueId, levels: Option<usize>) -> Option<VenueDepth> {
        let levels = levels
            .unwrap_or(self.config.output_levels)
            .min(self.config.output_levels);
        let now_ms = Utc::now().timestamp_millis();
        let books = self.read_books();
        let book = &books[venue.index()];
        if !book.initialized {
            return None;
        }
        Some(VenueDepth {
            timestamp_ms: now_ms,
            venue,
            bids: book.bids.top(levels).to_vec(),
            asks: book.asks.top(levels).to_vec(),
        })
    }

    /// Liveness of every venue slot, in slot order.
    pub fn venue_health(&self) -> Vec<VenueHealth> {
        self.venue_health_at(Utc::now().timestamp_millis())
    }

    pub(crate) fn venue_health_at(&self, now_ms: i64) -> Vec<VenueHealth> {
        let books = self.read_books();
        VenueId::ALL
            .iter()
            .map(|&venue| {
                let book = &books[venue.index()];
                VenueHealth {
                    venue,
                    initialized: book.initialized,
                    stale: book.is_stale_at(now_ms, self.config.stale_ms),
                    last_seen_ms: book.last_seen_ms,
                    last_update_id: book.last_update_id,
                }
            })
            .collect()
    }

    /// True when any write has landed since the last [`clear_dirty`].
    ///
    /// [`clear_dirty`]: CrossVenueAggregator::clear_dirty
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Relaxed)
    }

    pub fn clear_dirty(&self) {
        self.dirty.store(false, Ordering::Relaxed);
    }

    fn to_raw(&self, pairs: &[(f64, f64)]) -> Result<Vec<(i64, f64)>, AggregatorError> {
        let mut out = Vec::with_capacity(pairs.len());
        for &(price, qty) in pairs {
            if !price.is_finite() || price < 0.0 {
                return Err(AggregatorError::InvalidPrice(price));
            }
            if !qty.is_finite() {
                return Err(AggregatorError::InvalidQty(qty));
            }
            out.push((to_price_raw(price, self.config.price_scale), qty));
        }
        Ok(out)
    }

    fn read_books(&self) -> RwLockReadGuard<'_, [VenueBook; VenueId::COUNT]> {
        self.books
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_books(&self) -> RwLockWriteGuard<'_, [VenueBook; VenueId::COUNT]> {
        self.books
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: i64 = 1_700_000_000_000;

    fn aggregator() -> CrossVenueAggregator {
        CrossVenueAggregator::new(AggregatorConfig::default())
    }

    #[test]
    fn test_single_venue_bbo_and_spread() {
        let agg = aggregator();
        agg.init_snapshot_at(
            T0,
            VenueId::Binance,
            1,
            &[(63_500.50, 1.0), (63_500.40, 2.0)],
            &[(63_500.60, 0.5), (63_500.70, 1.5)],
        )
        .unwrap();

        let snap = agg.get_aggregated_at(T0, None);
        assert!((snap.best_bid - 63_500.50).abs() < 1e-9);
        assert!((snap.best_ask - 63_500.60).abs() < 1e-9);
        assert!((snap.spread - 0.10).abs() < 1e-9);
        assert!((snap.mid_price - 63_500.55).abs() < 1e-9);
        assert_eq!(snap.bids.len(), 2);
        assert_eq!(snap.asks.len(), 2);
        assert_eq!(snap.timestamp_ms, T0);
    }

    #[test]
    fn test_cross_venue_merge_sums_equal_prices() {
        let agg = aggregator();
        agg.init_snapshot_at(T0, VenueId::Binance, 1, &[(63_500.50, 1.0)], &[])
            .unwrap();
        agg.init_snapshot_at(
            T0,
            VenueId::Bybit,
            1,
            &[(63_500.50, 2.0), (63_500.40, 0.3)],
            &[],
        )
        .unwrap();

        let snap = agg.get_aggregated_at(T0, None);
        assert_eq!(snap.bids[0].price_raw, 6_350_050);
        assert!((snap.bids[0].qty - 3.0).abs() < 1e-12);
        assert_eq!(snap.bids[1].price_raw, 6_350_040);
        assert!((snap.bids[1].qty - 0.3).abs() < 1e-12);
        // Bid prices strictly decrease in the output.
        for pair in snap.bids.windows(2) {
            assert!(pair[0].price_raw > pair[1].price_raw);
        }
    }

    #[test]
    fn test_stale_venue_excluded_from_merge() {
        let agg = aggregator();
        agg.init_snapshot_at(T0, VenueId::Binance, 1, &[(63_500.00, 1.0)], &[])
            .unwrap();
        agg.init_snapshot_at(T0, VenueId::Okx, 1, &[(63_499.00, 2.0)], &[])
            .unwrap();

        // Advance past the staleness window, refreshing only Okx.
        let later = T0 + agg.config().stale_ms + 1;
        agg.apply_delta_at(later, VenueId::Okx, 2, &[(63_499.00, 2.5)], &[])
            .unwrap();

        let snap = agg.get_aggregated_at(later, None);
        assert_eq!(snap.bids.len(), 1);
        assert_eq!(snap.bids[0].price_raw, 6_349_900);
        assert!((snap.best_bid - 63_499.00).abs() < 1e-9);
    }

    #[test]
    fn test_empty_aggregator_reads_zeroed_bbo() {
        let snap = aggregator().get_aggregated_at(T0, None);
        assert!(snap.bids.is_empty());
        assert!(snap.asks.is_empty());
        assert_eq!(snap.best_bid, 0.0);
        assert_eq!(snap.best_ask, 0.0);
        assert_eq!(snap.spread, 0.0);
        assert_eq!(snap.mid_price, 0.0);
        assert!(snap.bid_walls.is_empty());
        assert!(snap.ask_walls.is_empty());
    }

    #[test]
    fn test_crossed_cross_venue_book_reported_faithfully() {
        let agg = aggregator();
        agg.init_snapshot_at(T0, VenueId::Binance, 1, &[(63_501.00, 1.0)], &[])
            .unwrap();
        agg.init_snapshot_at(T0, VenueId::Bybit, 1, &[], &[(63_500.00, 1.0)])
            .unwrap();

        let snap = agg.get_aggregated_at(T0, None);
        assert!(snap.best_bid > snap.best_ask);
        assert!(snap.spread < 0.0);
    }

    #[test]
    fn test_invalid_input_leaves_state_untouched() {
        let agg = aggregator();
        agg.init_snapshot_at(T0, VenueId::Binance, 1, &[(63_500.00, 1.0)], &[])
            .unwrap();

        // A bad pair anywhere in the batch rejects the whole call.
        let err = agg
            .apply_delta_at(
                T0,
                VenueId::Binance,
                2,
                &[(63_499.00, 1.0), (-1.0, 2.0)],
                &[],
            )
            .unwrap_err();
        assert_eq!(err, AggregatorError::InvalidPrice(-1.0));

        let err = agg
            .init_snapshot_at(T0, VenueId::Binance, 3, &[(63_500.00, f64::NAN)], &[])
            .unwrap_err();
        assert!(matches!(err, AggregatorError::InvalidQty(_)));

        let snap = agg.get_aggregated_at(T0, None);
        assert_eq!(snap.bids.len(), 1);
        assert!((snap.bids[0].qty - 1.0).abs() < f64::EPSILON);

        let health = agg.venue_health_at(T0);
        assert_eq!(health[VenueId::Binance.index()].last_update_id, 1);
    }

    #[test]
    fn test_stale_sequence_number_leaves_book_unchanged() {
        let agg = aggregator();
        agg.init_snapshot_at(T0, VenueId::Binance, 100, &[(63_500.00, 1.0)], &[])
            .unwrap();
        agg.apply_delta_at(T0, VenueId::Binance, 100, &[(63_500.00, 9.0)], &[])
            .unwrap();

        let snap = agg.get_aggregated_at(T0, None);
        assert!((snap.bids[0].qty - 1.0).abs() < f64::EPSILON);
        let health = agg.venue_health_at(T0);
        assert_eq!(health[VenueId::Binance.index()].last_update_id, 100);
    }

    #[test]
    fn test_clear_venue_resets_slot() {
        let agg = aggregator();
        agg.init_snapshot_at(T0, VenueId::Mexc, 7, &[(63_500.00, 1.0)], &[])
            .unwrap();
        agg.clear_venue(VenueId::Mexc);

        assert!(agg.get_aggregated_at(T0, None).bids.is_empty());
        let health = agg.venue_health_at(T0);
        assert!(!health[VenueId::Mexc.index()].initialized);
        assert_eq!(health[VenueId::Mexc.index()].last_update_id, 0);
    }

    #[test]
    fn test_levels_request_clamped_to_output_bound() {
        let agg = aggregator();
        let bids: Vec<(f64, f64)> = (0..80).map(|i| (63_000.0 - i as f64, 1.0)).collect();
        agg.init_snapshot_at(T0, VenueId::Binance, 1, &bids, &[])
            .unwrap();

        assert_eq!(agg.get_aggregated_at(T0, None).bids.len(), 50);
        assert_eq!(agg.get_aggregated_at(T0, Some(10)).bids.len(), 10);
        assert_eq!(agg.get_aggregated_at(T0, Some(500)).bids.len(), 50);
    }

    #[test]
    fn test_dirty_flag_set_by_writes_cleared_by_consumer() {
        let agg = aggregator();
        assert!(!agg.is_dirty());

        agg.init_snapshot_at(T0, VenueId::Binance, 1, &[(63_500.00, 1.0)], &[])
            .unwrap();
        assert!(agg.is_dirty());

        // Reading does not clear the hint.
        let _ = agg.get_aggregated_at(T0, None);
        assert!(agg.is_dirty());

        agg.clear_dirty();
        assert!(!agg.is_dirty());

        agg.clear_venue(VenueId::Binance);
        assert!(agg.is_dirty());
    }

    #[test]
    fn test_venue_snapshot_reads_one_book() {
        let agg = aggregator();
        assert!(agg.venue_snapshot(VenueId::Gate, None).is_none());

        agg.init_snapshot_at(
            T0,
            VenueId::Gate,
            1,
            &[(63_500.00, 1.0), (63_499.00, 2.0)],
            &[(63_501.00, 3.0)],
        )
        .unwrap();
        let depth = agg.venue_snapshot(VenueId::Gate, Some(1)).unwrap();
        assert_eq!(depth.venue, VenueId::Gate);
        assert_eq!(depth.bids.len(), 1);
        assert_eq!(depth.bids[0].price_raw, 6_350_000);
        assert_eq!(depth.asks.len(), 1);
    }

    #[test]
    fn test_venue_health_reports_slot_order() {
        let agg = aggregator();
        agg.init_snapshot_at(T0, VenueId::Bitget, 9, &[(63_500.00, 1.0)], &[])
            .unwrap();

        let health = agg.venue_health_at(T0 + agg.config().stale_ms + 1);
        assert_eq!(health.len(), VenueId::COUNT);
        for (slot, entry) in health.iter().enumerate() {
            assert_eq!(entry.venue.index(), slot);
        }
        let bitget = &health[VenueId::Bitget.index()];
        assert!(bitget.initialized);
        assert!(bitget.stale);
        assert_eq!(bitget.last_update_id, 9);
        assert!(!health[VenueId::Binance.index()].initialized);
        assert!(!health[VenueId::Binance.index()].stale);
    }

    #[test]
    fn test_concurrent_writers_and_readers() {
        let agg = aggregator();
        let venues = [VenueId::Binance, VenueId::Bybit, VenueId::Okx, VenueId::Gate];

        std::thread::scope(|scope| {
            for venue in venues {
                let agg = &agg;
                scope.spawn(move || {
                    agg.init_snapshot_at(T0, venue, 1, &[(63_500.00, 1.0)], &[(63_501.00, 1.0)])
                        .unwrap();
                    for i in 0..200u64 {
                        agg.apply_delta_at(
                            T0,
                            venue,
                            2 + i,
                            &[(63_500.00 - (i % 10) as f64, 0.5)],
                            &[(63_501.00 + (i % 10) as f64, 0.5)],
                        )
                        .unwrap();
                    }
                });
            }
            for _ in 0..2 {
                let agg = &agg;
                scope.spawn(move || {
                    for _ in 0..100 {
                        let snap = agg.get_aggregated_at(T0, None);
                        // Each observed snapshot is internally consistent.
                        for pair in snap.bids.windows(2) {
                            assert!(pair[0].price_raw > pair[1].price_raw);
                        }
                        for pair in snap.asks.windows(2) {
                            assert!(pair[0].price_raw < pair[1].price_raw);
                        }
                    }
                });
            }
        });

        // Writers are independent per venue, so the final state is fixed:
        // every venue converged to the same ladders.
        let snap = agg.get_aggregated_at(T0, None);
        assert_eq!(snap.bids.len(), 10);
        assert!((snap.bids[0].qty - 4.0 * 0.5).abs() < 1e-12);
        let health = agg.venue_health_at(T0);
        for venue in venues {
            assert_eq!(health[venue.index()].last_update_id, 201);
        }
    }

    #[test]
    fn test_merge_sum_matches_per_venue_totals() {
        let agg = aggregator();
        let venues = [VenueId::Binance, VenueId::Okx, VenueId::Hyperliquid];
        for (i, venue) in venues.iter().enumerate() {
            agg.init_snapshot_at(
                T0,
                *venue,
                1,
                &[(63_500.00, 1.0 + i as f64), (63_499.00 - i as f64, 0.5)],
                &[],
            )
            .unwrap();
        }

        let snap = agg.get_aggregated_at(T0, None);
        let merged: f64 = snap.bids.iter().map(|l| l.qty).sum();
        // 3 shared levels (1+2+3) plus three 0.5 singletons.
        assert!((merged - 7.5).abs() < 1e-12);
        assert!((snap.bids[0].qty - 6.0).abs() < 1e-12);
    }

    mod de {
        use super::*;

        #[test]
        fn test_snapshot_serializes_plain_fields() {
            let agg = aggregator();
            agg.init_snapshot_at(T0, VenueId::Binance, 1, &[(63_500.50, 40.0)], &[
                (63_500.60, 1.0),
            ])
            .unwrap();

            let snap = agg.get_aggregated_at(T0, None);
            let value: serde_json::Value = serde_json::to_value(&snap).unwrap();
            assert_eq!(value["timestamp_ms"], T0);
            assert_eq!(value["bids"][0]["price_raw"], 6_350_050);
            assert_eq!(value["best_ask"], 63_500.60);
            // The lone bid is 100% of bid depth, so it reports as a wall.
            assert_eq!(value["bid_walls"][0]["is_bid"], true);
        }
    }
}
