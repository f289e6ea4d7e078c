//! One ordered price→quantity ladder for a single side of a venue's book.

use super::{Level, Side, QTY_EPSILON};
use std::cmp::Ordering;

/// One side of one venue's book, ordered best-first.
///
/// Backed by a sorted `Vec` with binary search: O(log n) lookup plus O(k)
/// element shifts on insert and remove. At the configured depth (1000
/// levels) and typical delta shapes this outruns pointer-chasing structures.
///
/// Invariants between calls: strictly ordered by the side's ranking, unique
/// prices, every quantity above [`QTY_EPSILON`], length ≤ `max_levels`.
#[derive(Debug, Clone)]
pub struct BookSide {
    side: Side,
    levels: Vec<Level>,
    /// Best price after the previous mutation; 0 when the ladder was empty.
    last_best: i64,
    max_levels: usize,
}

impl BookSide {
    pub fn new(side: Side, max_levels: usize) -> Self {
        Self {
            side,
            levels: Vec::with_capacity(max_levels),
            last_best: 0,
            max_levels,
        }
    }

    /// Replace the ladder from a full snapshot.
    ///
    /// Zero-quantity entries are skipped. When the input holds more than
    /// `max_levels` usable levels, the best `max_levels` under the side's
    /// ranking are kept and the rest discarded.
    pub fn apply_snapshot(&mut self, pairs: &[(i64, f64)]) {
        self.levels.clear();
        self.levels.extend(
            pairs
                .iter()
                .filter(|&&(_, qty)| qty > QTY_EPSILON)
                .map(|&(price_raw, qty)| Level::new(price_raw, qty)),
        );
        match self.side {
            Side::Bid => self
                .levels
                .sort_unstable_by_key(|level| std::cmp::Reverse(level.price_raw)),
            Side::Ask => self.levels.sort_unstable_by_key(|level| level.price_raw),
        }
        // Venue snapshots should not repeat a price; keep the first if one does.
        self.levels.dedup_by_key(|level| level.price_raw);
        self.levels.truncate(self.max_levels);
        self.last_best = self.levels.first().map_or(0, |level| level.price_raw);
    }

    /// Apply a single delta. A quantity at or below [`QTY_EPSILON`] removes
    /// the level; otherwise the level is overwritten in place or inserted in
    /// order.
    ///
    /// Returns whether the best price changed.
    pub fn apply_delta(&mut self, price_raw: i64, qty: f64) -> bool {
        if qty <= QTY_EPSILON {
            self.remove(price_raw)
        } else {
            self.upsert(price_raw, qty)
        }
    }

    /// Up to `n` best levels in ladder order.
    pub fn top(&self, n: usize) -> &[Level] {
        &self.levels[..self.levels.len().min(n)]
    }

    /// Every level in ladder order.
    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn total_qty(&self) -> f64 {
        self.levels.iter().map(|level| level.qty).sum()
    }

    pub fn best_price(&self) -> Option<i64> {
        self.levels.first().map(|level| level.price_raw)
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub(crate) fn max_levels(&self) -> usize {
        self.max_levels
    }

    /// Rank position of `price_raw`: `Ok` when resident, `Err` with the
    /// in-order insertion point otherwise.
    fn position(&self, price_raw: i64) -> Result<usize, usize> {
        let side = self.side;
        self.levels.binary_search_by(|level| {
            if level.price_raw == price_raw {
                Ordering::Equal
            } else if side.ranks_before(level.price_raw, price_raw) {
                Ordering::Less
            } else {
                Ordering::Greater
            }
        })
    }

    fn remove(&mut self, price_raw: i64) -> bool {
        match self.position(price_raw) {
            Ok(index) => {
                self.levels.remove(index);
                self.note_best()
            }
            Err(_) => false,
        }
    }

    fn upsert(&mut self, price_raw: i64, qty: f64) -> bool {
        match self.position(price_raw) {
            Ok(index) => {
                // In-place quantity update; the best price cannot move.
                self.levels[index].qty = qty;
                false
            }
            Err(index) => {
                if self.levels.len() == self.max_levels {
                    if index >= self.max_levels {
                        // Ranks below every resident level; drop it.
                        return false;
                    }
                    // Evict the worst-ranked level to stay within bounds.
                    self.levels.pop();
                }
                self.levels.insert(index, Level::new(price_raw, qty));
                self.note_best()
            }
        }
    }

    fn note_best(&mut self) -> bool {
        let best = self.levels.first().map_or(0, |level| level.price_raw);
        let changed = best != self.last_best;
        self.last_best = best;
        changed
    }
}
