//! Cross-venue order book aggregation and funding sentiment core.
//!
//! Maintains per-venue price-ladder state fed by snapshot and delta streams
//! from up to seven venues, merges the live books into a unified depth view
//! with best bid/offer, spread, and wall detection, and aggregates per-venue
//! funding rates into an open-interest-weighted sentiment reading.
//!
//! The crate is synchronous and does no I/O of its own: socket adapters feed
//! already-parsed `(price, quantity)` pairs in, and a broadcast timer pulls
//! plain snapshot values out. Book state sits behind one reader/writer lock
//! (exclusive writes, shared merged reads); the funding engine carries its
//! own independent mutex.
//!
//! ```
//! use crossbook::{AggregatorConfig, CrossVenueAggregator, VenueId};
//!
//! let aggregator = CrossVenueAggregator::new(AggregatorConfig::default());
//! aggregator
//!     .init_snapshot(
//!         VenueId::Binance,
//!         100,
//!         &[(63_500.50, 1.0), (63_500.40, 2.0)],
//!         &[(63_500.60, 0.5)],
//!     )
//!     .unwrap();
//!
//! let snapshot = aggregator.get_aggregated(None);
//! assert_eq!(snapshot.best_bid, 63_500.50);
//! ```

pub mod aggregator;
pub mod books;
pub mod config;
pub mod error;
pub mod venue;
pub mod vwaf;
pub mod walls;

// Re-export the commonly used types for convenience.
pub use aggregator::{AggregatedSnapshot, CrossVenueAggregator, VenueDepth, VenueHealth};
pub use books::{BookSide, Level, Side, VenueBook, QTY_EPSILON};
pub use config::{AggregatorConfig, VwafConfig};
pub use error::AggregatorError;
pub use venue::VenueId;
pub use vwaf::{Sentiment, VenueFunding, VwafEngine, VwafResult};
pub use walls::Wall;
