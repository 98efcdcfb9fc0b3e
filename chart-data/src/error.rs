use thiserror::Error;

/// All errors generated in `chart-data`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChartError {
    /// Network failure, non-success HTTP status, or timeout from a single
    /// provider. The gateway reacts by advancing its fallback chain.
    #[error("provider request failed: {0}")]
    Provider(String),

    /// A provider responded successfully but the payload was empty or
    /// malformed. Treated the same as [`ChartError::Provider`] for fallback
    /// purposes. Also raised when bucketing receives an empty sample list.
    #[error("invalid market data: {0}")]
    InvalidData(String),

    /// Every provider in the chain failed. The caller decides between a
    /// degraded/offline status and synthetic data.
    #[error("all market data providers exhausted")]
    DataUnavailable,

    /// An unrecognised timeframe identifier was requested.
    #[error("invalid timeframe identifier: {0}")]
    InvalidTimeframe(String),
}

impl ChartError {
    /// Determine if an error should advance the provider fallback chain
    /// rather than escalate to the caller.
    pub fn is_fallback_trigger(&self) -> bool {
        matches!(self, ChartError::Provider(_) | ChartError::InvalidData(_))
    }
}
