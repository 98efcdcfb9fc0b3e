//! Candle aggregation engine.
//!
//! Buckets raw price samples into fixed-width OHLC candles and maintains the
//! bounded rolling window for the active timeframe, folding new live ticks
//! into the most recent candle or rolling over when the bucket boundary is
//! crossed.

use crate::candle::{Candle, PricePoint, PriceRange, bucket_start, round_price};
use crate::error::ChartError;
use std::collections::{BTreeMap, VecDeque};
use tracing::debug;

/// Bucket raw price samples into OHLC candles.
///
/// Samples are grouped by floor-division bucket start; within each bucket the
/// earliest sample opens and the latest closes, with ties broken by input
/// order. Output is ascending by bucket start with no duplicate buckets and
/// all prices rounded to 2 decimals.
///
/// An empty sample list is invalid data, not an empty series.
pub fn bucket_samples(
    samples: &[PricePoint],
    bucket_width_ms: i64,
) -> Result<Vec<Candle>, ChartError> {
    if samples.is_empty() {
        return Err(ChartError::InvalidData(
            "no price samples to aggregate".to_string(),
        ));
    }

    let mut buckets: BTreeMap<i64, Vec<PricePoint>> = BTreeMap::new();
    for sample in samples {
        buckets
            .entry(bucket_start(sample.timestamp, bucket_width_ms))
            .or_default()
            .push(*sample);
    }

    let candles = buckets
        .into_iter()
        .map(|(start, mut points)| {
            // Stable sort keeps input order for equal timestamps
            points.sort_by_key(|point| point.timestamp);

            let open = points[0].price;
            let close = points[points.len() - 1].price;
            let mut high = f64::MIN;
            let mut low = f64::MAX;
            for point in &points {
                high = high.max(point.price);
                low = low.min(point.price);
            }

            Candle::new(start, open, high, low, close)
        })
        .collect();

    Ok(candles)
}

/// Bounded rolling window of candles for one timeframe.
///
/// Oldest-first ordering, strictly increasing timestamps. When the cap is
/// exceeded the oldest candle is evicted, never the newest. The visible
/// price range is recomputed from scratch after every mutation.
#[derive(Debug, Clone)]
pub struct CandleSeries {
    candles: VecDeque<Candle>,
    bucket_width_ms: i64,
    max_candles: usize,
    range: PriceRange,
}

impl CandleSeries {
    /// Empty series for the given bucket width and window cap.
    pub fn new(bucket_width_ms: i64, max_candles: usize) -> Self {
        Self {
            candles: VecDeque::with_capacity(max_candles + 1),
            bucket_width_ms,
            max_candles,
            range: PriceRange::default(),
        }
    }

    /// Build a series from bucketed candles, applying the window cap.
    ///
    /// When the input exceeds the cap the newest candles win.
    pub fn from_candles(candles: Vec<Candle>, bucket_width_ms: i64, max_candles: usize) -> Self {
        let mut series = Self::new(bucket_width_ms, max_candles);
        for candle in candles {
            series.candles.push_back(candle);
            if series.candles.len() > series.max_candles {
                series.candles.pop_front();
            }
        }
        series.recompute_range();
        series
    }

    /// Fold one live price tick into the series.
    ///
    /// Within the current bucket the last candle is mutated in place (close
    /// follows the tick, high/low only ever widen). Once `now_ms` has moved
    /// a full bucket width past the last candle's timestamp a new candle is
    /// appended, opening at the previous close and stamped with the raw tick
    /// time, and the oldest candle is evicted if the cap is exceeded.
    pub fn fold_tick(&mut self, now_ms: i64, price: f64) {
        let Some(last) = self.candles.back().copied() else {
            debug!("ignoring price tick on empty candle series");
            return;
        };

        let price = round_price(price);

        if now_ms - last.timestamp >= self.bucket_width_ms {
            self.candles.push_back(Candle::new(
                now_ms,
                last.close,
                last.close.max(price),
                last.close.min(price),
                price,
            ));
            if self.candles.len() > self.max_candles {
                self.candles.pop_front();
            }
        } else if let Some(current) = self.candles.back_mut() {
            current.close = price;
            current.high = current.high.max(price);
            current.low = current.low.min(price);
        }

        self.recompute_range();
    }

    /// Visible price range as of the last mutation.
    pub fn price_range(&self) -> PriceRange {
        self.range
    }

    pub fn candles(&self) -> &VecDeque<Candle> {
        &self.candles
    }

    /// Snapshot the window as a contiguous vector, oldest first.
    pub fn to_vec(&self) -> Vec<Candle> {
        self.candles.iter().copied().collect()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.back()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn bucket_width_ms(&self) -> i64 {
        self.bucket_width_ms
    }

    pub fn max_candles(&self) -> usize {
        self.max_candles
    }

    fn recompute_range(&mut self) {
        if self.candles.is_empty() {
            self.range = PriceRange::default();
            return;
        }

        let mut min_low = f64::MAX;
        let mut max_high = f64::MIN;
        for candle in &self.candles {
            min_low = min_low.min(candle.low);
            max_high = max_high.max(candle.high);
        }

        self.range = PriceRange::from_extremes(min_low, max_high);
    }
}
