//! Chart engine: lifecycle, periodic live-price ticker and snapshot/status
//! distribution.
//!
//! One spawned worker task exclusively owns the candle series and the
//! gateway; consumers receive cloned [`ChartSnapshot`] and [`ChartStatus`]
//! values over `tokio::sync::watch` channels. Fetching and folding run
//! inline in the worker's interval loop, so a slow fetch delays the next
//! tick instead of overlapping it.

use crate::aggregate::{CandleSeries, bucket_samples};
use crate::candle::{Candle, PriceRange, SpotPrice};
use crate::gateway::MarketGateway;
use crate::provider::{Binance, CoinGecko, binance, coingecko};
use crate::synthetic::fallback_series;
use crate::timeframe::Timeframe;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

/// Buffered timeframe switch requests; excess switches in one burst are
/// dropped with a warning.
const COMMAND_BUFFER: usize = 8;

/// Connection state surfaced to the view layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Connecting,
    Connected,
    Error,
}

impl StatusKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusKind::Connecting => "connecting",
            StatusKind::Connected => "connected",
            StatusKind::Error => "error",
        }
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status kind plus a human-readable message for the status bar.
///
/// The `Error` kind also covers degraded mode, where the series is synthetic
/// rather than provider-sourced.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ChartStatus {
    pub kind: StatusKind,
    pub message: String,
}

impl ChartStatus {
    pub fn connecting(message: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Connecting,
            message: message.into(),
        }
    }

    pub fn connected(message: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Connected,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Error,
            message: message.into(),
        }
    }
}

impl fmt::Display for ChartStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Read-only view of the chart state, cloned out of the worker task after
/// every series mutation.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ChartSnapshot {
    pub candles: Vec<Candle>,
    pub price_range: PriceRange,
    pub timeframe: Timeframe,
    /// Last spot quote, for the stats display. `None` until the first
    /// successful spot fetch.
    pub spot: Option<SpotPrice>,
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct ChartConfig {
    /// Period of the live-price ticker.
    pub update_frequency: Duration,
    /// Deadline applied to every outbound provider request.
    pub request_timeout: Duration,
    /// Validity window of the gateway response cache.
    pub cache_ttl: Duration,
    pub initial_timeframe: Timeframe,
    pub coingecko_base_url: String,
    pub binance_base_url: String,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            update_frequency: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
            cache_ttl: Duration::from_secs(30),
            initial_timeframe: Timeframe::default(),
            coingecko_base_url: coingecko::DEFAULT_BASE_URL.to_string(),
            binance_base_url: binance::DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl ChartConfig {
    /// Defaults with optional environment overrides
    /// (`CHART_UPDATE_FREQUENCY_MS`, `CHART_CACHE_TTL_MS`).
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(frequency) = duration_from_env("CHART_UPDATE_FREQUENCY_MS") {
            config.update_frequency = frequency;
        }
        if let Some(ttl) = duration_from_env("CHART_CACHE_TTL_MS") {
            config.cache_ttl = ttl;
        }
        config
    }

    pub fn with_update_frequency(mut self, update_frequency: Duration) -> Self {
        self.update_frequency = update_frequency;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn with_cache_ttl(mut self, cache_ttl: Duration) -> Self {
        self.cache_ttl = cache_ttl;
        self
    }

    pub fn with_initial_timeframe(mut self, timeframe: Timeframe) -> Self {
        self.initial_timeframe = timeframe;
        self
    }

    pub fn with_coingecko_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.coingecko_base_url = base_url.into();
        self
    }

    pub fn with_binance_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.binance_base_url = base_url.into();
        self
    }
}

fn duration_from_env(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .map(Duration::from_millis)
}

enum Command {
    SetTimeframe { timeframe: Timeframe, generation: u64 },
}

struct Publishers {
    snapshot: watch::Sender<ChartSnapshot>,
    status: watch::Sender<ChartStatus>,
}

/// Stateful owner of one live chart: gateway, candle series and ticker.
///
/// `start` spawns the worker and is one-shot; after `stop` the engine is
/// inert. Dropping the engine stops it.
pub struct ChartEngine {
    config: ChartConfig,
    generation: Arc<AtomicU64>,
    snapshot_rx: watch::Receiver<ChartSnapshot>,
    status_rx: watch::Receiver<ChartStatus>,
    publishers: Option<Publishers>,
    command_tx: Option<mpsc::Sender<Command>>,
    worker: Option<JoinHandle<()>>,
}

impl ChartEngine {
    pub fn new(config: ChartConfig) -> Self {
        let initial = ChartSnapshot {
            candles: Vec::new(),
            price_range: PriceRange::default(),
            timeframe: config.initial_timeframe,
            spot: None,
        };
        let (snapshot_tx, snapshot_rx) = watch::channel(initial);
        let (status_tx, status_rx) =
            watch::channel(ChartStatus::connecting("Fetching live Bitcoin data..."));

        Self {
            config,
            generation: Arc::new(AtomicU64::new(0)),
            snapshot_rx,
            status_rx,
            publishers: Some(Publishers {
                snapshot: snapshot_tx,
                status: status_tx,
            }),
            command_tx: None,
            worker: None,
        }
    }

    /// Spawn the worker with the default CoinGecko-then-Binance gateway.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) {
        let client = reqwest::Client::new();
        let coingecko = CoinGecko::with_base_url(
            client.clone(),
            self.config.request_timeout,
            self.config.coingecko_base_url.clone(),
        );
        let binance = Binance::with_base_url(
            client,
            self.config.request_timeout,
            self.config.binance_base_url.clone(),
        );
        let gateway = MarketGateway::with_sources(
            Box::new(coingecko.clone()),
            Box::new(binance),
            Box::new(coingecko),
            self.config.cache_ttl,
        );
        self.start_with_gateway(gateway);
    }

    /// Spawn the worker against an explicit gateway.
    pub fn start_with_gateway(&mut self, gateway: MarketGateway) {
        let Some(publishers) = self.publishers.take() else {
            warn!("chart engine already started");
            return;
        };
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let timeframe = self.config.initial_timeframe;

        let worker = Worker {
            gateway,
            series: CandleSeries::new(
                timeframe.bucket_width_ms(),
                timeframe.config().max_candles,
            ),
            timeframe,
            spot: None,
            generation: Arc::clone(&self.generation),
            publishers,
            commands: command_rx,
            update_frequency: self.config.update_frequency,
        };

        self.command_tx = Some(command_tx);
        self.worker = Some(tokio::spawn(worker.run()));
        info!("chart engine started on {}", timeframe);
    }

    /// Request a switch to another timeframe.
    ///
    /// The switch is handled asynchronously by the worker; a request
    /// superseded before its fetch completes is discarded.
    pub fn set_timeframe(&self, timeframe: Timeframe) {
        let Some(command_tx) = &self.command_tx else {
            warn!("set_timeframe before start is ignored");
            return;
        };

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Err(err) = command_tx.try_send(Command::SetTimeframe {
            timeframe,
            generation,
        }) {
            warn!("timeframe switch to {} dropped: {}", timeframe, err);
        }
    }

    /// Current snapshot (cloned).
    pub fn snapshot(&self) -> ChartSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Current status (cloned).
    pub fn status(&self) -> ChartStatus {
        self.status_rx.borrow().clone()
    }

    /// Receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<ChartSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Receiver that observes status transitions.
    pub fn subscribe_status(&self) -> watch::Receiver<ChartStatus> {
        self.status_rx.clone()
    }

    /// Abort the worker. No tick fires after this returns. Idempotent;
    /// the engine cannot be restarted.
    pub fn stop(&mut self) {
        self.command_tx = None;
        if let Some(worker) = self.worker.take() {
            worker.abort();
            info!("chart engine stopped");
        }
    }
}

impl Drop for ChartEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The spawned task that owns all mutable chart state.
struct Worker {
    gateway: MarketGateway,
    series: CandleSeries,
    timeframe: Timeframe,
    spot: Option<SpotPrice>,
    generation: Arc<AtomicU64>,
    publishers: Publishers,
    commands: mpsc::Receiver<Command>,
    update_frequency: Duration,
}

impl Worker {
    async fn run(mut self) {
        let generation = self.generation.load(Ordering::SeqCst);
        self.load_series(self.timeframe, generation).await;

        if self.publishers.status.borrow().kind == StatusKind::Connected {
            self.publish_status(ChartStatus::connected("Live data feed active"));
        }

        let mut ticker = interval_at(
            Instant::now() + self.update_frequency,
            self.update_frequency,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.refresh_spot().await,
                command = self.commands.recv() => match command {
                    Some(Command::SetTimeframe { timeframe, generation }) => {
                        self.switch_timeframe(timeframe, generation).await;
                    }
                    None => break,
                },
            }
        }
        debug!("chart worker shut down");
    }

    /// Fetch, bucket and install the series for `timeframe`. On exhaustion
    /// the synthetic offline series takes its place under an error status.
    async fn load_series(&mut self, timeframe: Timeframe, generation: u64) {
        let result = self
            .gateway
            .fetch_history(timeframe)
            .await
            .and_then(|points| bucket_samples(&points, timeframe.bucket_width_ms()));

        // The fetch may have been superseded by a newer switch request.
        if !self.is_current(generation) {
            debug!("discarding stale {} history", timeframe);
            return;
        }

        match result {
            Ok(candles) => {
                self.install_series(timeframe, candles);
                self.publish_status(ChartStatus::connected("Live data loaded"));
            }
            Err(err) => {
                warn!("{} history unavailable, switching to offline data: {}", timeframe, err);
                let candles = fallback_series(timeframe, Utc::now().timestamp_millis());
                self.install_series(timeframe, candles);
                self.publish_status(ChartStatus::error(
                    "Data sources unreachable, showing offline data",
                ));
            }
        }
    }

    async fn switch_timeframe(&mut self, timeframe: Timeframe, generation: u64) {
        if !self.is_current(generation) {
            debug!("skipping superseded switch to {}", timeframe);
            return;
        }
        self.publish_status(ChartStatus::connecting(format!(
            "Loading {} data...",
            timeframe
        )));
        self.load_series(timeframe, generation).await;
    }

    /// One ticker beat: fetch the spot quote and fold it into the series.
    /// A failed fetch leaves the series and status untouched.
    async fn refresh_spot(&mut self) {
        match self.gateway.fetch_spot().await {
            Ok(spot) => {
                self.spot = Some(spot);
                self.series
                    .fold_tick(Utc::now().timestamp_millis(), spot.price);
                self.publish_snapshot();
            }
            Err(err) => warn!("spot refresh failed, keeping last candle: {}", err),
        }
    }

    fn install_series(&mut self, timeframe: Timeframe, candles: Vec<Candle>) {
        self.timeframe = timeframe;
        self.series = CandleSeries::from_candles(
            candles,
            timeframe.bucket_width_ms(),
            timeframe.config().max_candles,
        );
        self.publish_snapshot();
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn publish_snapshot(&self) {
        let snapshot = ChartSnapshot {
            candles: self.series.to_vec(),
            price_range: self.series.price_range(),
            timeframe: self.timeframe,
            spot: self.spot,
        };
        let _ = self.publishers.snapshot.send(snapshot);
    }

    fn publish_status(&self, status: ChartStatus) {
        info!("chart status {}", status);
        let _ = self.publishers.status.send(status);
    }
}
