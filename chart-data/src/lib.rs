//! Live Bitcoin candlestick data pipeline.
//!
//! Turns an irregular stream of timestamped price samples into fixed-width
//! OHLC candles and keeps a bounded rolling window of them up to date as
//! live ticks arrive:
//! - Provider gateway (CoinGecko primary, Binance fallback) with a 30s
//!   response cache and 10s request deadlines
//! - Floor-division bucketing of raw samples into candles
//! - Live-tick folding into the in-progress candle, with FIFO eviction and
//!   price-range recompute after every mutation
//! - Synthetic offline series when every provider is unreachable
//!
//! [`chart::ChartEngine`] ties the pieces together behind watch channels so
//! view layers can consume read-only snapshots and status updates.

pub mod aggregate;
pub mod cache;
pub mod candle;
pub mod chart;
pub mod debounce;
pub mod error;
pub mod gateway;
pub mod provider;
pub mod synthetic;
pub mod timeframe;

// Core data model
pub use candle::{Candle, PricePoint, PriceRange, SpotPrice, bucket_start, round_price};
pub use timeframe::{Timeframe, TimeframeConfig};

// Aggregation
pub use aggregate::{CandleSeries, bucket_samples};

// Engine surface consumed by view layers
pub use chart::{ChartConfig, ChartEngine, ChartSnapshot, ChartStatus, StatusKind};
pub use debounce::Debouncer;
pub use error::ChartError;
pub use gateway::MarketGateway;
