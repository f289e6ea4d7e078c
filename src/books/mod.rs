//! Price-ladder primitives shared by every venue book.
//!
//! Prices are carried as signed 64-bit integers scaled by a per-instrument
//! factor so that equality, ordering, and merge-key decisions never touch
//! floating point. Quantities stay `f64`; conversion back to floating prices
//! happens only at the output boundary.

use derive_more::Constructor;
use serde::{Deserialize, Serialize};

pub mod ladder;
pub mod venue;

pub use ladder::BookSide;
pub use venue::VenueBook;

/// Quantities at or below this magnitude are treated as zero.
pub const QTY_EPSILON: f64 = 1e-12;

/// A single price level: integer-scaled price and floating quantity.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize, Constructor)]
pub struct Level {
    pub price_raw: i64,
    pub qty: f64,
}

impl Level {
    /// Price in floating units for the given instrument scale.
    pub fn price_f64(&self, price_scale: i64) -> f64 {
        self.price_raw as f64 / price_scale as f64
    }
}

/// Which side of the book a ladder represents; carries the ranking rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    /// True when price `a` ranks strictly better than price `b` on this side.
    ///
    /// Bids rank high to low, asks low to high.
    pub fn ranks_before(self, a: i64, b: i64) -> bool {
        match self {
            Side::Bid => a > b,
            Side::Ask => a < b,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Bid => "bid",
            Side::Ask => "ask",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Convert a floating price into integer-scaled form.
pub fn to_price_raw(price: f64, price_scale: i64) -> i64 {
    (price * price_scale as f64).round() as i64
}
