//! Timeframe registry.
//!
//! Maps each supported chart resolution to its bucket width, the number of
//! candles retained in the rolling window, and the interval code used by the
//! Binance fallback provider.

use crate::error::ChartError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Immutable registry entry for one timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeframeConfig {
    /// Bucket width in minutes.
    pub bucket_minutes: u32,
    /// Maximum candles retained in the rolling window.
    pub max_candles: usize,
    /// Interval code understood by the Binance klines endpoint.
    pub binance_interval: &'static str,
}

/// A supported chart resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
}

impl Timeframe {
    /// Every supported timeframe, in ascending bucket-width order.
    pub const ALL: [Timeframe; 6] = [
        Timeframe::M1,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::H1,
        Timeframe::H4,
        Timeframe::D1,
    ];

    /// Registry lookup for this timeframe.
    pub const fn config(&self) -> TimeframeConfig {
        match self {
            Timeframe::M1 => TimeframeConfig {
                bucket_minutes: 1,
                max_candles: 60,
                binance_interval: "1m",
            },
            Timeframe::M5 => TimeframeConfig {
                bucket_minutes: 5,
                max_candles: 60,
                binance_interval: "5m",
            },
            Timeframe::M15 => TimeframeConfig {
                bucket_minutes: 15,
                max_candles: 60,
                binance_interval: "15m",
            },
            Timeframe::H1 => TimeframeConfig {
                bucket_minutes: 60,
                max_candles: 48,
                binance_interval: "1h",
            },
            Timeframe::H4 => TimeframeConfig {
                bucket_minutes: 240,
                max_candles: 48,
                binance_interval: "4h",
            },
            Timeframe::D1 => TimeframeConfig {
                bucket_minutes: 1440,
                max_candles: 30,
                binance_interval: "1d",
            },
        }
    }

    /// Bucket width in milliseconds.
    pub const fn bucket_width_ms(&self) -> i64 {
        self.config().bucket_minutes as i64 * 60_000
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
        }
    }
}

impl Default for Timeframe {
    fn default() -> Self {
        Timeframe::M1
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = ChartError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "1m" => Ok(Timeframe::M1),
            "5m" => Ok(Timeframe::M5),
            "15m" => Ok(Timeframe::M15),
            "1h" => Ok(Timeframe::H1),
            "4h" => Ok(Timeframe::H4),
            "1d" => Ok(Timeframe::D1),
            other => Err(ChartError::InvalidTimeframe(other.to_string())),
        }
    }
}
