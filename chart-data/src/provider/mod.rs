//! Market data providers.
//!
//! The gateway composes providers through two seams: [`HistorySource`] for
//! historical raw price samples and [`SpotSource`] for the current spot
//! quote. CoinGecko implements both and acts as the primary; Binance
//! implements history only and is used as the fallback.

use crate::candle::{PricePoint, SpotPrice};
use crate::error::ChartError;
use crate::timeframe::Timeframe;
use async_trait::async_trait;

pub mod binance;
pub mod coingecko;

pub use binance::Binance;
pub use coingecko::CoinGecko;

/// A source of historical raw price samples for one timeframe's window.
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Short provider name for logging.
    fn name(&self) -> &'static str;

    /// Fetch enough raw samples to cover the timeframe's retained window.
    async fn fetch_history(&self, timeframe: Timeframe) -> Result<Vec<PricePoint>, ChartError>;
}

/// A source of the current spot price.
#[async_trait]
pub trait SpotSource: Send + Sync {
    /// Short provider name for logging.
    fn name(&self) -> &'static str;

    async fn fetch_spot(&self) -> Result<SpotPrice, ChartError>;
}
