use thiserror::Error;

/// All errors generated by the aggregation core.
///
/// Routine feed conditions are deliberately absent: a delta arriving before a
/// snapshot, a non-advancing update id, or an insert into a full ladder at a
/// worse price are dropped silently per the sequencing contract, not
/// surfaced as errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AggregatorError {
    #[error("unknown venue tag: {0}")]
    UnknownVenue(String),

    #[error("invalid price: {0}")]
    InvalidPrice(f64),

    #[error("invalid quantity: {0}")]
    InvalidQty(f64),
}
