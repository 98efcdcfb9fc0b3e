//! Market data gateway: a TTL response cache in front of the provider
//! fallback chain.
//!
//! History requests try the primary provider first and fall back to the
//! secondary on failure; exhaustion surfaces as
//! [`ChartError::DataUnavailable`] so the caller decides what happens next.
//! Spot requests have no fallback and propagate their provider error as-is.

use crate::cache::TtlCache;
use crate::candle::{PricePoint, SpotPrice};
use crate::error::ChartError;
use crate::provider::{Binance, CoinGecko, HistorySource, SpotSource};
use crate::timeframe::Timeframe;
use std::time::Duration;
use tracing::{debug, warn};

const SPOT_CACHE_KEY: &str = "spot";

/// Cached response payloads, keyed by logical query signature.
#[derive(Debug, Clone)]
enum CachedQuery {
    History(Vec<PricePoint>),
    Spot(SpotPrice),
}

/// Single entry point for market data. Owned by one task; a fresh cache
/// entry short-circuits the network entirely, fallback chain included.
pub struct MarketGateway {
    primary: Box<dyn HistorySource>,
    secondary: Box<dyn HistorySource>,
    spot_source: Box<dyn SpotSource>,
    cache: TtlCache<String, CachedQuery>,
}

impl MarketGateway {
    /// Default wiring: CoinGecko primary (history + spot), Binance secondary,
    /// one shared HTTP client.
    pub fn new(request_timeout: Duration, cache_ttl: Duration) -> Self {
        let client = reqwest::Client::new();
        let coingecko = CoinGecko::new(client.clone(), request_timeout);
        let binance = Binance::new(client, request_timeout);

        Self::with_sources(
            Box::new(coingecko.clone()),
            Box::new(binance),
            Box::new(coingecko),
            cache_ttl,
        )
    }

    /// Assemble a gateway from explicit sources.
    pub fn with_sources(
        primary: Box<dyn HistorySource>,
        secondary: Box<dyn HistorySource>,
        spot_source: Box<dyn SpotSource>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            primary,
            secondary,
            spot_source,
            cache: TtlCache::new(cache_ttl),
        }
    }

    /// Historical price samples for one timeframe window, cached for the
    /// gateway's TTL.
    pub async fn fetch_history(
        &mut self,
        timeframe: Timeframe,
    ) -> Result<Vec<PricePoint>, ChartError> {
        let key = format!("history-{}", timeframe);
        if let Some(CachedQuery::History(points)) = self.cache.get(&key) {
            debug!("{} history served from cache", timeframe);
            return Ok(points);
        }

        let points = self.fetch_history_uncached(timeframe).await?;
        self.cache.insert(key, CachedQuery::History(points.clone()));
        Ok(points)
    }

    async fn fetch_history_uncached(
        &self,
        timeframe: Timeframe,
    ) -> Result<Vec<PricePoint>, ChartError> {
        match self.primary.fetch_history(timeframe).await {
            Ok(points) => {
                debug!(
                    "{} returned {} samples for {}",
                    self.primary.name(),
                    points.len(),
                    timeframe
                );
                Ok(points)
            }
            Err(err) if err.is_fallback_trigger() => {
                warn!(
                    "{} history fetch failed, trying {}: {}",
                    self.primary.name(),
                    self.secondary.name(),
                    err
                );
                match self.secondary.fetch_history(timeframe).await {
                    Ok(points) => {
                        debug!(
                            "{} returned {} samples for {}",
                            self.secondary.name(),
                            points.len(),
                            timeframe
                        );
                        Ok(points)
                    }
                    Err(err) => {
                        warn!("{} history fetch failed: {}", self.secondary.name(), err);
                        Err(ChartError::DataUnavailable)
                    }
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Current spot quote, cached for the gateway's TTL. No fallback.
    pub async fn fetch_spot(&mut self) -> Result<SpotPrice, ChartError> {
        let key = SPOT_CACHE_KEY.to_string();
        if let Some(CachedQuery::Spot(spot)) = self.cache.get(&key) {
            debug!("spot price served from cache");
            return Ok(spot);
        }

        let spot = self.spot_source.fetch_spot().await?;
        self.cache.insert(key, CachedQuery::Spot(spot));
        Ok(spot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubHistory {
        response: Result<Vec<PricePoint>, ChartError>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl HistorySource for StubHistory {
        fn name(&self) -> &'static str {
            "stub-history"
        }

        async fn fetch_history(
            &self,
            _timeframe: Timeframe,
        ) -> Result<Vec<PricePoint>, ChartError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response.clone()
        }
    }

    struct StubSpot {
        response: Result<SpotPrice, ChartError>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SpotSource for StubSpot {
        fn name(&self) -> &'static str {
            "stub-spot"
        }

        async fn fetch_spot(&self) -> Result<SpotPrice, ChartError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response.clone()
        }
    }

    fn history_stub(
        response: Result<Vec<PricePoint>, ChartError>,
    ) -> (Box<dyn HistorySource>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let stub = StubHistory {
            response,
            calls: Arc::clone(&calls),
        };
        (Box::new(stub), calls)
    }

    fn spot_stub(
        response: Result<SpotPrice, ChartError>,
    ) -> (Box<dyn SpotSource>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let stub = StubSpot {
            response,
            calls: Arc::clone(&calls),
        };
        (Box::new(stub), calls)
    }

    fn samples(price: f64) -> Vec<PricePoint> {
        vec![PricePoint {
            timestamp: 1_700_000_040_000,
            price,
        }]
    }

    fn spot(price: f64) -> SpotPrice {
        SpotPrice {
            price,
            change_24h: 1.5,
            volume_24h: 9_000_000.0,
        }
    }

    const TTL: Duration = Duration::from_secs(30);

    #[tokio::test]
    async fn test_primary_success_skips_secondary() {
        let (primary, _) = history_stub(Ok(samples(100.0)));
        let (secondary, secondary_calls) = history_stub(Ok(samples(200.0)));
        let (spot_source, _) = spot_stub(Ok(spot(100.0)));
        let mut gateway = MarketGateway::with_sources(primary, secondary, spot_source, TTL);

        let points = gateway.fetch_history(Timeframe::M1).await.unwrap();

        assert_eq!(points[0].price, 100.0);
        assert_eq!(secondary_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_primary_failure_falls_back_to_secondary() {
        let (primary, primary_calls) =
            history_stub(Err(ChartError::Provider("coingecko down".to_string())));
        let (secondary, secondary_calls) = history_stub(Ok(samples(200.0)));
        let (spot_source, _) = spot_stub(Ok(spot(100.0)));
        let mut gateway = MarketGateway::with_sources(primary, secondary, spot_source, TTL);

        let points = gateway.fetch_history(Timeframe::M1).await.unwrap();

        assert_eq!(points[0].price, 200.0);
        assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
        assert_eq!(secondary_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_payload_triggers_fallback() {
        let (primary, _) = history_stub(Err(ChartError::InvalidData("empty prices".to_string())));
        let (secondary, _) = history_stub(Ok(samples(200.0)));
        let (spot_source, _) = spot_stub(Ok(spot(100.0)));
        let mut gateway = MarketGateway::with_sources(primary, secondary, spot_source, TTL);

        let points = gateway.fetch_history(Timeframe::H1).await.unwrap();

        assert_eq!(points[0].price, 200.0);
    }

    #[tokio::test]
    async fn test_exhausted_chain_yields_data_unavailable() {
        let (primary, _) = history_stub(Err(ChartError::Provider("down".to_string())));
        let (secondary, _) = history_stub(Err(ChartError::Provider("also down".to_string())));
        let (spot_source, _) = spot_stub(Ok(spot(100.0)));
        let mut gateway = MarketGateway::with_sources(primary, secondary, spot_source, TTL);

        let err = gateway.fetch_history(Timeframe::M1).await.unwrap_err();

        assert_eq!(err, ChartError::DataUnavailable);
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_cache_hit_skips_network() {
        let (primary, primary_calls) = history_stub(Ok(samples(100.0)));
        let (secondary, _) = history_stub(Ok(samples(200.0)));
        let (spot_source, _) = spot_stub(Ok(spot(100.0)));
        let mut gateway = MarketGateway::with_sources(primary, secondary, spot_source, TTL);

        gateway.fetch_history(Timeframe::M1).await.unwrap();
        gateway.fetch_history(Timeframe::M1).await.unwrap();
        assert_eq!(primary_calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(31)).await;
        gateway.fetch_history(Timeframe::M1).await.unwrap();
        assert_eq!(primary_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_timeframes_cache_independently() {
        let (primary, primary_calls) = history_stub(Ok(samples(100.0)));
        let (secondary, _) = history_stub(Ok(samples(200.0)));
        let (spot_source, _) = spot_stub(Ok(spot(100.0)));
        let mut gateway = MarketGateway::with_sources(primary, secondary, spot_source, TTL);

        gateway.fetch_history(Timeframe::M1).await.unwrap();
        gateway.fetch_history(Timeframe::M5).await.unwrap();

        assert_eq!(primary_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fallback_result_is_cached() {
        let (primary, primary_calls) =
            history_stub(Err(ChartError::Provider("down".to_string())));
        let (secondary, secondary_calls) = history_stub(Ok(samples(200.0)));
        let (spot_source, _) = spot_stub(Ok(spot(100.0)));
        let mut gateway = MarketGateway::with_sources(primary, secondary, spot_source, TTL);

        gateway.fetch_history(Timeframe::M1).await.unwrap();
        let points = gateway.fetch_history(Timeframe::M1).await.unwrap();

        assert_eq!(points[0].price, 200.0);
        assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
        assert_eq!(secondary_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_spot_failure_propagates_without_fallback() {
        let (primary, primary_calls) = history_stub(Ok(samples(100.0)));
        let (secondary, secondary_calls) = history_stub(Ok(samples(200.0)));
        let (spot_source, _) = spot_stub(Err(ChartError::Provider("rate limited".to_string())));
        let mut gateway = MarketGateway::with_sources(primary, secondary, spot_source, TTL);

        let err = gateway.fetch_spot().await.unwrap_err();

        assert_eq!(err, ChartError::Provider("rate limited".to_string()));
        assert_eq!(primary_calls.load(Ordering::SeqCst), 0);
        assert_eq!(secondary_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spot_cached_until_expiry() {
        let (primary, _) = history_stub(Ok(samples(100.0)));
        let (secondary, _) = history_stub(Ok(samples(200.0)));
        let (spot_source, spot_calls) = spot_stub(Ok(spot(64_500.0)));
        let mut gateway = MarketGateway::with_sources(primary, secondary, spot_source, TTL);

        let first = gateway.fetch_spot().await.unwrap();
        let second = gateway.fetch_spot().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(spot_calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(31)).await;
        gateway.fetch_spot().await.unwrap();
        assert_eq!(spot_calls.load(Ordering::SeqCst), 2);
    }
}
