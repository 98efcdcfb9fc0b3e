//! Core market data types shared across the pipeline.

use serde::{Deserialize, Serialize};

/// Padding applied to each side of the visible price range, as a fraction of
/// the low-to-high span.
pub const RANGE_PADDING: f64 = 0.1;

/// Round a price to 2 decimal places for display/storage consistency.
pub fn round_price(price: f64) -> f64 {
    (price * 100.0).round() / 100.0
}

/// One raw timestamped price sample, as produced by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct PricePoint {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub price: f64,
}

/// OHLC summary of price activity within one fixed time bucket.
///
/// Invariant: `low <= min(open, close)` and `high >= max(open, close)`.
/// Mutations re-take min/max rather than overwriting, so the envelope only
/// ever widens.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Candle {
    /// Milliseconds since the Unix epoch. Bucket start for bucketed candles,
    /// raw tick arrival time for live-rollover candles.
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Candle {
    /// Construct a candle with all four prices rounded to 2 decimals.
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            timestamp,
            open: round_price(open),
            high: round_price(high),
            low: round_price(low),
            close: round_price(close),
        }
    }

    /// True if the candle closed at or above its open.
    pub fn is_bullish(&self) -> bool {
        self.close >= self.open
    }
}

/// Align a timestamp to the start of its bucket.
///
/// Euclidean flooring keeps pre-epoch timestamps on the same grid as
/// positive ones.
#[inline]
pub fn bucket_start(timestamp: i64, bucket_width_ms: i64) -> i64 {
    timestamp.div_euclid(bucket_width_ms) * bucket_width_ms
}

/// Current spot quote with the 24h statistics the primary provider reports.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct SpotPrice {
    pub price: f64,
    /// 24h price change in percent. Zero when the provider omits it.
    pub change_24h: f64,
    /// 24h traded volume in USD. Zero when the provider omits it.
    pub volume_24h: f64,
}

/// Visible price range derived from a candle series: min of all lows and max
/// of all highs, widened by [`RANGE_PADDING`] of the span on each side.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

impl PriceRange {
    /// Pad the raw low/high extremes of a series.
    pub fn from_extremes(min_low: f64, max_high: f64) -> Self {
        let padding = (max_high - min_low) * RANGE_PADDING;
        Self {
            min: min_low - padding,
            max: max_high + padding,
        }
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}

impl Default for PriceRange {
    /// Placeholder band shown before any data has arrived.
    fn default() -> Self {
        Self {
            min: 60_000.0,
            max: 70_000.0,
        }
    }
}
