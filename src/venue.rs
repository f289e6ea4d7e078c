use crate::error::AggregatorError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of venue slots tracked by the aggregator.
///
/// Venues are addressed by a dense slot index ([`VenueId::index`]) so that
/// per-venue state lives in fixed arrays rather than keyed maps: iterating
/// all venues is a plain array walk and no hashing touches the hot path.
/// There is no dynamic registration.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum VenueId {
    Binance = 0,
    Bybit = 1,
    Okx = 2,
    Hyperliquid = 3,
    Gate = 4,
    Mexc = 5,
    Bitget = 6,
}

impl VenueId {
    /// Number of venue slots.
    pub const COUNT: usize = 7;

    /// Every venue in slot order.
    pub const ALL: [VenueId; VenueId::COUNT] = [
        VenueId::Binance,
        VenueId::Bybit,
        VenueId::Okx,
        VenueId::Hyperliquid,
        VenueId::Gate,
        VenueId::Mexc,
        VenueId::Bitget,
    ];

    /// Dense slot index of this venue.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Lowercase wire tag for this venue.
    pub fn as_str(self) -> &'static str {
        match self {
            VenueId::Binance => "binance",
            VenueId::Bybit => "bybit",
            VenueId::Okx => "okx",
            VenueId::Hyperliquid => "hyperliquid",
            VenueId::Gate => "gate",
            VenueId::Mexc => "mexc",
            VenueId::Bitget => "bitget",
        }
    }
}

impl fmt::Display for VenueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VenueId {
    type Err = AggregatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "binance" => Ok(VenueId::Binance),
            "bybit" => Ok(VenueId::Bybit),
            "okx" => Ok(VenueId::Okx),
            "hyperliquid" => Ok(VenueId::Hyperliquid),
            "gate" => Ok(VenueId::Gate),
            "mexc" => Ok(VenueId::Mexc),
            "bitget" => Ok(VenueId::Bitget),
            other => Err(AggregatorError::UnknownVenue(other.to_string())),
        }
    }
}
