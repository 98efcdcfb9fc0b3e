//! CoinGecko provider (primary).
//!
//! Historical samples come from the market_chart range endpoint as raw
//! `[timestamp_ms, price]` pairs; the spot quote comes from simple/price
//! with the optional 24h change/volume statistics.

use crate::candle::{PricePoint, SpotPrice};
use crate::error::ChartError;
use crate::provider::{HistorySource, SpotSource};
use crate::timeframe::Timeframe;
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// CoinGecko REST client.
#[derive(Debug, Clone)]
pub struct CoinGecko {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

/// market_chart/range response. Only the price series is used.
#[derive(Debug, Deserialize)]
struct MarketChartResponse {
    #[serde(default)]
    prices: Vec<(f64, f64)>,
}

/// simple/price response for `ids=bitcoin`.
#[derive(Debug, Deserialize)]
struct SimplePriceResponse {
    bitcoin: Option<BitcoinQuote>,
}

#[derive(Debug, Deserialize)]
struct BitcoinQuote {
    usd: Option<f64>,
    #[serde(default)]
    usd_24h_change: Option<f64>,
    #[serde(default)]
    usd_24h_vol: Option<f64>,
}

impl CoinGecko {
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

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        endpoint: &str,
    ) -> Result<T, ChartError> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| {
                ChartError::Provider(format!("coingecko {} request failed: {}", endpoint, err))
            })?;

        if !response.status().is_success() {
            return Err(ChartError::Provider(format!(
                "coingecko {} returned HTTP {}",
                endpoint,
                response.status()
            )));
        }

        response.json().await.map_err(|err| {
            ChartError::InvalidData(format!("coingecko {} decode failed: {}", endpoint, err))
        })
    }
}

#[async_trait]
impl HistorySource for CoinGecko {
    fn name(&self) -> &'static str {
        "coingecko"
    }

    async fn fetch_history(&self, timeframe: Timeframe) -> Result<Vec<PricePoint>, ChartError> {
        let config = timeframe.config();
        // Range is expressed in Unix seconds and spans the full retained window
        let end = Utc::now().timestamp();
        let start = end - config.max_candles as i64 * config.bucket_minutes as i64 * 60;

        let url = format!(
            "{}/coins/bitcoin/market_chart/range?vs_currency=usd&from={}&to={}",
            self.base_url, start, end
        );

        let payload: MarketChartResponse = self.get_json(&url, "market_chart").await?;
        if payload.prices.is_empty() {
            return Err(ChartError::InvalidData(
                "coingecko market_chart returned no price samples".to_string(),
            ));
        }

        Ok(payload
            .prices
            .into_iter()
            .map(|(timestamp, price)| PricePoint {
                timestamp: timestamp as i64,
                price,
            })
            .collect())
    }
}

#[async_trait]
impl SpotSource for CoinGecko {
    fn name(&self) -> &'static str {
        "coingecko"
    }

    async fn fetch_spot(&self) -> Result<SpotPrice, ChartError> {
        let url = format!(
            "{}/simple/price?ids=bitcoin&vs_currencies=usd&include_24hr_change=true&include_24hr_vol=true",
            self.base_url
        );

        let payload: SimplePriceResponse = self.get_json(&url, "simple_price").await?;
        let quote = payload.bitcoin.ok_or_else(|| {
            ChartError::InvalidData("coingecko spot response missing bitcoin quote".to_string())
        })?;
        let price = quote.usd.ok_or_else(|| {
            ChartError::InvalidData("coingecko spot response missing usd price".to_string())
        })?;

        Ok(SpotPrice {
            price,
            change_24h: quote.usd_24h_change.unwrap_or(0.0),
            volume_24h: quote.usd_24h_vol.unwrap_or(0.0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_chart_de() {
        let raw = r#"{"prices":[[1700000000000,64500.12],[1700000060000,64510.5]],"market_caps":[],"total_volumes":[]}"#;
        let payload: MarketChartResponse = serde_json::from_str(raw).unwrap();

        assert_eq!(payload.prices.len(), 2);
        assert_eq!(payload.prices[0], (1_700_000_000_000.0, 64_500.12));
    }

    #[test]
    fn test_market_chart_de_missing_prices() {
        let raw = r#"{"market_caps":[]}"#;
        let payload: MarketChartResponse = serde_json::from_str(raw).unwrap();
        assert!(payload.prices.is_empty());
    }

    #[test]
    fn test_simple_price_de_full() {
        let raw = r#"{"bitcoin":{"usd":64500.12,"usd_24h_change":-1.52,"usd_24h_vol":28123456789.0}}"#;
        let payload: SimplePriceResponse = serde_json::from_str(raw).unwrap();

        let quote = payload.bitcoin.unwrap();
        assert_eq!(quote.usd, Some(64_500.12));
        assert_eq!(quote.usd_24h_change, Some(-1.52));
        assert_eq!(quote.usd_24h_vol, Some(28_123_456_789.0));
    }

    #[test]
    fn test_simple_price_de_optional_stats_missing() {
        let raw = r#"{"bitcoin":{"usd":64500.12}}"#;
        let payload: SimplePriceResponse = serde_json::from_str(raw).unwrap();

        let quote = payload.bitcoin.unwrap();
        assert_eq!(quote.usd, Some(64_500.12));
        assert_eq!(quote.usd_24h_change, None);
        assert_eq!(quote.usd_24h_vol, None);
    }

    #[test]
    fn test_simple_price_de_missing_bitcoin() {
        let raw = r#"{}"#;
        let payload: SimplePriceResponse = serde_json::from_str(raw).unwrap();
        assert!(payload.bitcoin.is_none());
    }
}
