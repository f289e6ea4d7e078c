//! Detection of outsized resting levels — limit walls / iceberg remnants —
//! in an aggregated snapshot.

use crate::aggregator::AggregatedSnapshot;
use crate::books::Level;
use serde::{Deserialize, Serialize};

/// A single price level holding a disproportionate share of its side's depth.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Wall {
    /// Price in floating units.
    pub price: f64,
    pub qty: f64,
    /// Fraction of the side's total emitted depth, e.g. 0.045 = 4.5%.
    pub pct_of_depth: f64,
    pub is_bid: bool,
}

/// Populate the snapshot's wall lists in place.
///
/// A level qualifies when its quantity is at least `threshold_pct` of its
/// side's total emitted depth. Walls are taken in ladder order, at most
/// `cap` per side; a side with zero total emits none.
pub(crate) fn detect_walls(snap: &mut AggregatedSnapshot, threshold_pct: f64, cap: usize) {
    snap.bid_walls = side_walls(&snap.bids, snap.price_scale, threshold_pct, cap, true);
    snap.ask_walls = side_walls(&snap.asks, snap.price_scale, threshold_pct, cap, false);
}

fn side_walls(
    levels: &[Level],
    price_scale: i64,
    threshold_pct: f64,
    cap: usize,
    is_bid: bool,
) -> Vec<Wall> {
    let total: f64 = levels.iter().map(|level| level.qty).sum();
    if total <= 0.0 {
        return Vec::new();
    }

    let mut walls = Vec::new();
    for level in levels {
        if walls.len() >= cap {
            break;
        }
        let pct = level.qty / total;
        if pct >= threshold_pct {
            walls.push(Wall {
                price: level.price_f64(price_scale),
                qty: level.qty,
                pct_of_depth: pct,
                is_bid,
            });
        }
    }
    walls
}
