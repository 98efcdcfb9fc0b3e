//! Binance provider (fallback).
//!
//! The klines endpoint is candle-native, so each kline is expanded into four
//! raw samples placed inside its own bucket. Binance open times are
//! epoch-aligned multiples of the interval width, which lets floor-division
//! bucketing reconstruct every kline's OHLC exactly.

use crate::candle::PricePoint;
use crate::error::ChartError;
use crate::provider::HistorySource;
use crate::timeframe::Timeframe;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_BASE_URL: &str = "https://api.binance.com/api/v3";

/// Hard cap on the number of klines requested per call.
const MAX_KLINE_LIMIT: usize = 500;

/// Binance kline response format
#[derive(Debug, Deserialize)]
struct BinanceKline(
    i64,    // 0: Open time
    String, // 1: Open
    String, // 2: High
    String, // 3: Low
    String, // 4: Close
    String, // 5: Volume
    i64,    // 6: Close time
    String, // 7: Quote asset volume
    i64,    // 8: Number of trades
    String, // 9: Taker buy base asset volume
    String, // 10: Taker buy quote asset volume
    String, // 11: Ignore
);

/// Binance REST client.
#[derive(Debug, Clone)]
pub struct Binance {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl Binance {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self::with_base_url(client, timeout, DEFAULT_BASE_URL)
    }

    /// Point the client at a different host (test servers, proxies).
    pub fn with_base_url(
        client: reqwest::Client,
        timeout: Duration,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            timeout,
        }
    }
}

/// Expand one kline into four samples at its open/high/low/close positions.
///
/// The open sits on the bucket start and the close one millisecond before the
/// bucket ends, so re-bucketing keeps them as the earliest and latest samples
/// of the bucket. Rows with unparseable prices are skipped.
fn expand_kline(kline: &BinanceKline, bucket_width_ms: i64) -> Option<[PricePoint; 4]> {
    let open_time = kline.0;
    let open: f64 = kline.1.parse().ok()?;
    let high: f64 = kline.2.parse().ok()?;
    let low: f64 = kline.3.parse().ok()?;
    let close: f64 = kline.4.parse().ok()?;

    Some([
        PricePoint {
            timestamp: open_time,
            price: open,
        },
        PricePoint {
            timestamp: open_time + 1,
            price: high,
        },
        PricePoint {
            timestamp: open_time + 2,
            price: low,
        },
        PricePoint {
            timestamp: open_time + bucket_width_ms - 1,
            price: close,
        },
    ])
}

#[async_trait]
impl HistorySource for Binance {
    fn name(&self) -> &'static str {
        "binance"
    }

    async fn fetch_history(&self, timeframe: Timeframe) -> Result<Vec<PricePoint>, ChartError> {
        let config = timeframe.config();
        let limit = config.max_candles.min(MAX_KLINE_LIMIT);

        let url = format!(
            "{}/klines?symbol=BTCUSDT&interval={}&limit={}",
            self.base_url, config.binance_interval, limit
        );

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| {
                ChartError::Provider(format!("binance klines request failed: {}", err))
            })?;

        if !response.status().is_success() {
            return Err(ChartError::Provider(format!(
                "binance klines returned HTTP {}",
                response.status()
            )));
        }

        let klines: Vec<BinanceKline> = response.json().await.map_err(|err| {
            ChartError::InvalidData(format!("binance klines decode failed: {}", err))
        })?;

        if klines.is_empty() {
            return Err(ChartError::InvalidData(
                "binance klines returned no rows".to_string(),
            ));
        }

        let total = klines.len();
        let width = timeframe.bucket_width_ms();
        let points: Vec<PricePoint> = klines
            .iter()
            .filter_map(|kline| expand_kline(kline, width))
            .flatten()
            .collect();

        if points.is_empty() {
            return Err(ChartError::InvalidData(
                "binance klines contained no parseable rows".to_string(),
            ));
        }
        if points.len() < total * 4 {
            warn!(
                "skipped {} unparseable binance klines",
                total - points.len() / 4
            );
        }

        Ok(points)
    }
}
