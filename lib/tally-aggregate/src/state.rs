//! Per-context accumulation state.
use ahash::AHashSet;
use tally_context::Context;
use tally_event::{MetricKind, Point, PointKind, SampleValue};
use tracing::{info, warn};

use crate::{
    config::{percentile_suffix, HistogramAggregate, HistogramConfiguration},
    AggregateError,
};

/// The accumulation state of one context.
///
/// Each variant implements the sample/flush contract of its metric kind: [`sample`](Self::sample) folds a new
/// observation in, and [`flush`](Self::flush) appends zero or more finalized points, resetting whatever state is
/// per-interval. The kind-to-variant mapping is closed; a context's variant is fixed when its first sample arrives.
#[derive(Debug)]
pub enum MetricState {
    /// Gauge state.
    Gauge(Gauge),

    /// Bucketed gauge state.
    BucketGauge(BucketGauge),

    /// Count state.
    Count(Count),

    /// Monotonic count state.
    MonotonicCount(MonotonicCount),

    /// Counter state.
    Counter(Counter),

    /// Histogram state.
    Histogram(Histogram),

    /// Set state.
    Set(Set),

    /// Rate state.
    Rate(Rate),
}

impl MetricState {
    /// Materializes the state for the given kind.
    pub fn for_kind(kind: MetricKind, histogram_config: &HistogramConfiguration) -> Self {
        match kind {
            MetricKind::Gauge => Self::Gauge(Gauge::default()),
            MetricKind::BucketGauge => Self::BucketGauge(BucketGauge::default()),
            MetricKind::Count => Self::Count(Count::default()),
            MetricKind::MonotonicCount => Self::MonotonicCount(MonotonicCount::default()),
            MetricKind::Counter => Self::Counter(Counter::default()),
            MetricKind::Histogram => Self::Histogram(Histogram::new(histogram_config.clone())),
            MetricKind::Set => Self::Set(Set::default()),
            MetricKind::Rate => Self::Rate(Rate::default()),
        }
    }

    /// Returns the kind this state was materialized for.
    pub fn kind(&self) -> MetricKind {
        match self {
            Self::Gauge(_) => MetricKind::Gauge,
            Self::BucketGauge(_) => MetricKind::BucketGauge,
            Self::Count(_) => MetricKind::Count,
            Self::MonotonicCount(_) => MetricKind::MonotonicCount,
            Self::Counter(_) => MetricKind::Counter,
            Self::Histogram(_) => MetricKind::Histogram,
            Self::Set(_) => MetricKind::Set,
            Self::Rate(_) => MetricKind::Rate,
        }
    }

    /// Folds a new sample into the state.
    ///
    /// `sample_rate` must already be clamped into `(0, 1]`. `timestamp` is the sample's explicit timestamp, if it
    /// carried one; `arrival_time` is when the sample reached the aggregator, used where the contract needs a time
    /// and the sample has none of its own.
    pub fn sample(
        &mut self, value: &SampleValue, sample_rate: f64, timestamp: Option<u64>, arrival_time: u64,
    ) -> Result<(), AggregateError> {
        if let Self::Set(set) = self {
            set.sample(value);
            return Ok(());
        }

        let numeric = match value.as_float() {
            Some(numeric) => numeric,
            None => return Err(AggregateError::NonNumericValue { kind: self.kind() }),
        };

        match self {
            Self::Gauge(gauge) => gauge.sample(numeric, timestamp),
            Self::BucketGauge(gauge) => gauge.sample(numeric),
            Self::Count(count) => count.sample(numeric),
            Self::MonotonicCount(count) => count.sample(numeric),
            Self::Counter(counter) => counter.sample(numeric, sample_rate),
            Self::Histogram(histogram) => histogram.sample(numeric, sample_rate),
            Self::Rate(rate) => rate.sample(numeric, timestamp, arrival_time),
            Self::Set(_) => unreachable!("handled above"),
        }

        Ok(())
    }

    /// Produces the state's finalized points for the interval ending at `flush_timestamp`.
    pub fn flush(&mut self, context: &Context, flush_timestamp: u64, interval: f64, points: &mut Vec<Point>) {
        match self {
            Self::Gauge(gauge) => gauge.flush(context, flush_timestamp, points),
            Self::BucketGauge(gauge) => gauge.flush(context, flush_timestamp, points),
            Self::Count(count) => count.flush(context, flush_timestamp, interval, points),
            Self::MonotonicCount(count) => count.flush(context, flush_timestamp, interval, points),
            Self::Counter(counter) => counter.flush(context, flush_timestamp, interval, points),
            Self::Histogram(histogram) => histogram.flush(context, flush_timestamp, interval, points),
            Self::Set(set) => set.flush(context, flush_timestamp, points),
            Self::Rate(rate) => rate.flush(context, flush_timestamp, points),
        }
    }
}

/// Gauge: tracks the latest value.
///
/// Flushes with the sample's own timestamp when it carried one, falling back to the flush timestamp.
#[derive(Debug, Default)]
pub struct Gauge {
    value: Option<f64>,
    timestamp: Option<u64>,
}

impl Gauge {
    fn sample(&mut self, value: f64, timestamp: Option<u64>) {
        self.value = Some(value);
        self.timestamp = timestamp;
    }

    fn flush(&mut self, context: &Context, flush_timestamp: u64, points: &mut Vec<Point>) {
        if let Some(value) = self.value.take() {
            let timestamp = self.timestamp.take().unwrap_or(flush_timestamp);
            points.push(context_point(context, context.name(), timestamp, value, PointKind::Gauge, None));
        }
    }
}

/// Gauge variant for bucketed aggregation: always flushes with the flush timestamp.
///
/// The bucketed aggregator flushes each bucket with the bucket's start time, so the sample's own timestamp has
/// already done its job selecting the bucket.
#[derive(Debug, Default)]
pub struct BucketGauge {
    value: Option<f64>,
}

impl BucketGauge {
    fn sample(&mut self, value: f64) {
        self.value = Some(value);
    }

    fn flush(&mut self, context: &Context, flush_timestamp: u64, points: &mut Vec<Point>) {
        if let Some(value) = self.value.take() {
            points.push(context_point(
                context,
                context.name(),
                flush_timestamp,
                value,
                PointKind::Gauge,
                None,
            ));
        }
    }
}

/// Count: accumulates values by plain addition.
#[derive(Debug, Default)]
pub struct Count {
    value: Option<f64>,
}

impl Count {
    fn sample(&mut self, value: f64) {
        self.value = Some(self.value.unwrap_or(0.0) + value);
    }

    fn flush(&mut self, context: &Context, flush_timestamp: u64, interval: f64, points: &mut Vec<Point>) {
        if let Some(value) = self.value.take() {
            points.push(context_point(
                context,
                context.name(),
                flush_timestamp,
                value,
                PointKind::Count,
                Some(interval),
            ));
        }
    }
}

/// MonotonicCount: sums the non-negative deltas of a monotonically increasing raw counter reading.
///
/// A reading lower than its predecessor is taken as a counter reset and contributes zero rather than a negative
/// delta. The latest reading survives a flush so that deltas keep accumulating across intervals.
#[derive(Debug, Default)]
pub struct MonotonicCount {
    previous: Option<f64>,
    delta_sum: f64,
    sampled: bool,
}

impl MonotonicCount {
    fn sample(&mut self, value: f64) {
        if let Some(previous) = self.previous {
            self.delta_sum += (value - previous).max(0.0);
        }
        self.previous = Some(value);
        self.sampled = true;
    }

    fn flush(&mut self, context: &Context, flush_timestamp: u64, interval: f64, points: &mut Vec<Point>) {
        if self.sampled {
            points.push(context_point(
                context,
                context.name(),
                flush_timestamp,
                self.delta_sum,
                PointKind::Count,
                Some(interval),
            ));
        }
        self.delta_sum = 0.0;
        self.sampled = false;
    }
}

/// Counter: accumulates sample-rate-scaled values and flushes them as a per-second rate.
///
/// Unlike the other variants, a counter emits on every flush — a zero-valued rate when idle — until the owning
/// table expires it. This keeps downstream rate series continuous instead of leaving gaps between sparse updates.
#[derive(Debug, Default)]
pub struct Counter {
    value: f64,
}

impl Counter {
    fn sample(&mut self, value: f64, sample_rate: f64) {
        self.value += value * (1.0 / sample_rate).round();
    }

    fn flush(&mut self, context: &Context, flush_timestamp: u64, interval: f64, points: &mut Vec<Point>) {
        let rate = self.value / interval;
        points.push(context_point(
            context,
            context.name(),
            flush_timestamp,
            rate,
            PointKind::Rate,
            Some(interval),
        ));
        self.value = 0.0;
    }
}

/// Histogram: buffers raw samples and flushes configured aggregates and percentiles.
///
/// The sample count is scaled by the sample rate so that `count` reflects true event volume, while the aggregates
/// and percentiles operate on the raw observed values.
#[derive(Debug)]
pub struct Histogram {
    samples: Vec<f64>,
    count: u64,
    config: HistogramConfiguration,
}

impl Histogram {
    fn new(config: HistogramConfiguration) -> Self {
        Self {
            samples: Vec::new(),
            count: 0,
            config,
        }
    }

    fn sample(&mut self, value: f64, sample_rate: f64) {
        self.samples.push(value);
        self.count += (1.0 / sample_rate).round() as u64;
    }

    fn flush(&mut self, context: &Context, flush_timestamp: u64, interval: f64, points: &mut Vec<Point>) {
        if self.count == 0 {
            return;
        }

        self.samples.sort_unstable_by(|a, b| a.total_cmp(b));
        let length = self.samples.len();

        for aggregate in self.config.aggregates() {
            let metric = format!("{}.{}", context.name(), aggregate.as_str());
            match aggregate {
                HistogramAggregate::Min => {
                    points.push(context_point(
                        context,
                        metric,
                        flush_timestamp,
                        self.samples[0],
                        PointKind::Gauge,
                        None,
                    ));
                }
                HistogramAggregate::Max => {
                    points.push(context_point(
                        context,
                        metric,
                        flush_timestamp,
                        self.samples[length - 1],
                        PointKind::Gauge,
                        None,
                    ));
                }
                HistogramAggregate::Median => {
                    let median = self.samples[median_index(length)];
                    points.push(context_point(context, metric, flush_timestamp, median, PointKind::Gauge, None));
                }
                HistogramAggregate::Avg => {
                    let avg = self.samples.iter().sum::<f64>() / length as f64;
                    points.push(context_point(context, metric, flush_timestamp, avg, PointKind::Gauge, None));
                }
                HistogramAggregate::Sum => {
                    let sum = self.samples.iter().sum::<f64>();
                    points.push(context_point(context, metric, flush_timestamp, sum, PointKind::Gauge, None));
                }
                HistogramAggregate::Count => {
                    let count_rate = self.count as f64 / interval;
                    points.push(context_point(
                        context,
                        metric,
                        flush_timestamp,
                        count_rate,
                        PointKind::Rate,
                        Some(interval),
                    ));
                }
            }
        }

        for &percentile in self.config.percentiles() {
            let metric = format!("{}.{}", context.name(), percentile_suffix(percentile));
            let value = self.samples[percentile_index(percentile, length)];
            points.push(context_point(context, metric, flush_timestamp, value, PointKind::Gauge, None));
        }

        self.samples.clear();
        self.count = 0;
    }
}

/// Set: tracks unique values and flushes their cardinality as a gauge.
#[derive(Debug, Default)]
pub struct Set {
    values: AHashSet<String>,
}

impl Set {
    fn sample(&mut self, value: &SampleValue) {
        let value = match value {
            SampleValue::Text(text) => text.clone(),
            SampleValue::Float(numeric) => numeric.to_string(),
        };
        self.values.insert(value);
    }

    fn flush(&mut self, context: &Context, flush_timestamp: u64, points: &mut Vec<Point>) {
        if !self.values.is_empty() {
            points.push(context_point(
                context,
                context.name(),
                flush_timestamp,
                self.values.len() as f64,
                PointKind::Gauge,
                None,
            ));
            self.values.clear();
        }
    }
}

/// Rate: computes the per-second rate of change between the two most recent raw readings.
///
/// A zero-length interval between readings and a negative delta (a reset of the underlying counter) both suppress
/// the point; neither is an error. Only the most recent reading survives a flush.
#[derive(Debug, Default)]
pub struct Rate {
    samples: Vec<(u64, f64)>,
}

impl Rate {
    fn sample(&mut self, value: f64, timestamp: Option<u64>, arrival_time: u64) {
        self.samples.push((timestamp.unwrap_or(arrival_time), value));
    }

    fn flush(&mut self, context: &Context, flush_timestamp: u64, points: &mut Vec<Point>) {
        if self.samples.len() < 2 {
            return;
        }

        let previous = self.samples[self.samples.len() - 2];
        let latest = self.samples[self.samples.len() - 1];
        self.samples = vec![latest];

        let elapsed = latest.0 as i64 - previous.0 as i64;
        if elapsed == 0 {
            warn!(metric = context.name(), "Rate interval is 0. Not flushing.");
            return;
        }

        let delta = latest.1 - previous.1;
        if delta < 0.0 {
            info!(
                metric = context.name(),
                "Rate delta is negative. Counter may have been reset. Not flushing."
            );
            return;
        }

        points.push(context_point(
            context,
            context.name(),
            flush_timestamp,
            delta / elapsed as f64,
            PointKind::Gauge,
            None,
        ));
    }
}

/// Builds a point carrying the context's tags, host, and device.
pub(crate) fn context_point(
    context: &Context, metric: impl Into<String>, timestamp: u64, value: f64, kind: PointKind, interval: Option<f64>,
) -> Point {
    Point::new(metric, timestamp, value, kind)
        .with_tags(context.tags().clone())
        .with_host(context.hostname().map(str::to_string))
        .with_device_name(context.device().map(str::to_string))
        .with_interval(interval)
}

/// Builds the zero-valued rate point synthesized for an idle counter context.
pub(crate) fn zero_counter_point(context: &Context, flush_timestamp: u64, interval: f64) -> Point {
    context_point(context, context.name(), flush_timestamp, 0.0, PointKind::Rate, Some(interval))
}

/// Index of the median sample in a sorted buffer of `length` samples.
///
/// `round(length/2 - 1)`, rounding half away from zero.
fn median_index(length: usize) -> usize {
    let index = (length as f64 / 2.0 - 1.0).round().max(0.0) as usize;
    index.min(length - 1)
}

/// Index of the percentile sample in a sorted buffer of `length` samples.
///
/// `round(p * length - 1)`, rounding half down, so five samples put the 50th percentile at index 1 while the median
/// sits at index 2.
fn percentile_index(percentile: f64, length: usize) -> usize {
    let index = (percentile * length as f64 - 1.5).ceil().max(0.0) as usize;
    index.min(length - 1)
}

#[cfg(test)]
mod tests {
    use float_cmp::assert_approx_eq;
    use tally_context::{Context, TagSet};
    use tally_event::PointKind;

    use super::*;

    const INTERVAL: f64 = 10.0;
    const FLUSH_TS: u64 = 1000;

    fn context(name: &str) -> Context {
        Context::from_name_and_tags(name, TagSet::default())
    }

    fn flush_state(state: &mut MetricState, context: &Context) -> Vec<Point> {
        let mut points = Vec::new();
        state.flush(context, FLUSH_TS, INTERVAL, &mut points);
        points
    }

    fn sample_float(state: &mut MetricState, value: f64) {
        state
            .sample(&SampleValue::Float(value), 1.0, None, FLUSH_TS - 1)
            .expect("sample should not fail");
    }

    #[test]
    fn gauge_uses_sample_timestamp_when_present() {
        let ctx = context("test.gauge");
        let mut state = MetricState::for_kind(MetricKind::Gauge, &HistogramConfiguration::default());

        state.sample(&SampleValue::Float(42.0), 1.0, Some(900), 950).unwrap();
        let points = flush_state(&mut state, &ctx);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].timestamp(), 900);
        assert_eq!(points[0].value(), 42.0);
        assert_eq!(points[0].kind, PointKind::Gauge);

        // Without an explicit timestamp, the flush timestamp is used.
        sample_float(&mut state, 43.0);
        let points = flush_state(&mut state, &ctx);
        assert_eq!(points[0].timestamp(), FLUSH_TS);

        // Cleared after flush.
        assert!(flush_state(&mut state, &ctx).is_empty());
    }

    #[test]
    fn bucket_gauge_always_uses_flush_timestamp() {
        let ctx = context("test.gauge");
        let mut state = MetricState::for_kind(MetricKind::BucketGauge, &HistogramConfiguration::default());

        state.sample(&SampleValue::Float(42.0), 1.0, Some(900), 950).unwrap();
        let points = flush_state(&mut state, &ctx);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].timestamp(), FLUSH_TS);
    }

    #[test]
    fn count_accumulates_by_addition() {
        let ctx = context("test.count");
        let mut state = MetricState::for_kind(MetricKind::Count, &HistogramConfiguration::default());

        sample_float(&mut state, 1.0);
        sample_float(&mut state, 2.5);
        sample_float(&mut state, -0.5);

        let points = flush_state(&mut state, &ctx);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].value(), 3.0);
        assert_eq!(points[0].kind, PointKind::Count);

        assert!(flush_state(&mut state, &ctx).is_empty());
    }

    #[test]
    fn monotonic_count_ignores_resets() {
        let ctx = context("test.monotonic");
        let mut state = MetricState::for_kind(MetricKind::MonotonicCount, &HistogramConfiguration::default());

        for reading in [100.0, 150.0, 40.0, 90.0] {
            sample_float(&mut state, reading);
        }

        let points = flush_state(&mut state, &ctx);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].value(), 100.0);
        assert_eq!(points[0].kind, PointKind::Count);

        // The latest reading carries over as the baseline for the next interval.
        assert!(flush_state(&mut state, &ctx).is_empty());
        sample_float(&mut state, 120.0);
        let points = flush_state(&mut state, &ctx);
        assert_eq!(points[0].value(), 30.0);
    }

    #[test]
    fn counter_scales_by_sample_rate_and_emits_rate() {
        let ctx = context("test.counter");
        let mut state = MetricState::for_kind(MetricKind::Counter, &HistogramConfiguration::default());

        state.sample(&SampleValue::Float(1.0), 0.5, None, FLUSH_TS - 1).unwrap();
        state.sample(&SampleValue::Float(2.0), 1.0, None, FLUSH_TS - 1).unwrap();

        let points = flush_state(&mut state, &ctx);
        assert_eq!(points.len(), 1);
        // (1 * 2 + 2) / 10
        assert_approx_eq!(f64, points[0].value(), 0.4);
        assert_eq!(points[0].kind, PointKind::Rate);
        assert_eq!(points[0].interval, Some(INTERVAL));

        // Counters keep emitting zero after a flush; removal is the expiry sweep's job.
        let points = flush_state(&mut state, &ctx);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].value(), 0.0);
    }

    #[test]
    fn histogram_numeric_law() {
        let ctx = context("test.histogram");
        let config = HistogramConfiguration::from_options(
            &["min", "max", "median", "avg", "sum", "count"].map(String::from),
            &[0.5],
        )
        .unwrap();
        let mut state = MetricState::for_kind(MetricKind::Histogram, &config);

        for value in [1.0, 2.0, 3.0, 4.0, 5.0] {
            sample_float(&mut state, value);
        }

        let points = flush_state(&mut state, &ctx);
        let by_name = |suffix: &str| {
            points
                .iter()
                .find(|p| p.metric == format!("test.histogram.{}", suffix))
                .unwrap_or_else(|| panic!("missing {} point", suffix))
        };

        assert_eq!(by_name("min").value(), 1.0);
        assert_eq!(by_name("max").value(), 5.0);
        assert_eq!(by_name("median").value(), 3.0);
        assert_approx_eq!(f64, by_name("avg").value(), 3.0);
        assert_eq!(by_name("sum").value(), 15.0);
        assert_approx_eq!(f64, by_name("count").value(), 0.5);
        assert_eq!(by_name("count").kind, PointKind::Rate);
        // Percentile 0.50 lands on index round(0.5 * 5 - 1) = 1.
        assert_eq!(by_name("50percentile").value(), 2.0);

        // Everything is cleared after flush.
        assert!(flush_state(&mut state, &ctx).is_empty());
    }

    #[test]
    fn histogram_scales_count_by_sample_rate() {
        let ctx = context("test.histogram");
        let mut state = MetricState::for_kind(MetricKind::Histogram, &HistogramConfiguration::default());

        state.sample(&SampleValue::Float(1.0), 0.25, None, FLUSH_TS - 1).unwrap();

        let points = flush_state(&mut state, &ctx);
        let count = points.iter().find(|p| p.metric.ends_with(".count")).unwrap();
        assert_approx_eq!(f64, count.value(), 4.0 / INTERVAL);
    }

    #[test]
    fn set_cardinality() {
        let ctx = context("test.set");
        let mut state = MetricState::for_kind(MetricKind::Set, &HistogramConfiguration::default());

        for value in ["a", "b", "a", "c"] {
            state.sample(&SampleValue::from(value), 1.0, None, FLUSH_TS - 1).unwrap();
        }

        let points = flush_state(&mut state, &ctx);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].value(), 3.0);
        assert_eq!(points[0].kind, PointKind::Gauge);

        assert!(flush_state(&mut state, &ctx).is_empty());
    }

    #[test]
    fn rate_from_last_two_readings() {
        let ctx = context("test.rate");
        let mut state = MetricState::for_kind(MetricKind::Rate, &HistogramConfiguration::default());

        state.sample(&SampleValue::Float(10.0), 1.0, Some(100), 100).unwrap();
        state.sample(&SampleValue::Float(40.0), 1.0, Some(110), 110).unwrap();

        let points = flush_state(&mut state, &ctx);
        assert_eq!(points.len(), 1);
        assert_approx_eq!(f64, points[0].value(), 3.0);
        assert_eq!(points[0].kind, PointKind::Gauge);
    }

    #[test]
    fn rate_needs_two_readings() {
        let ctx = context("test.rate");
        let mut state = MetricState::for_kind(MetricKind::Rate, &HistogramConfiguration::default());

        state.sample(&SampleValue::Float(10.0), 1.0, Some(100), 100).unwrap();
        assert!(flush_state(&mut state, &ctx).is_empty());

        // The lone reading is retained, so one more sample is enough to produce a rate.
        state.sample(&SampleValue::Float(20.0), 1.0, Some(105), 105).unwrap();
        let points = flush_state(&mut state, &ctx);
        assert_approx_eq!(f64, points[0].value(), 2.0);
    }

    #[test]
    fn rate_suppresses_zero_interval() {
        let ctx = context("test.rate");
        let mut state = MetricState::for_kind(MetricKind::Rate, &HistogramConfiguration::default());

        state.sample(&SampleValue::Float(10.0), 1.0, Some(100), 100).unwrap();
        state.sample(&SampleValue::Float(20.0), 1.0, Some(100), 100).unwrap();

        assert!(flush_state(&mut state, &ctx).is_empty());
    }

    #[test]
    fn rate_suppresses_counter_reset() {
        let ctx = context("test.rate");
        let mut state = MetricState::for_kind(MetricKind::Rate, &HistogramConfiguration::default());

        state.sample(&SampleValue::Float(100.0), 1.0, Some(100), 100).unwrap();
        state.sample(&SampleValue::Float(5.0), 1.0, Some(110), 110).unwrap();

        assert!(flush_state(&mut state, &ctx).is_empty());

        // The post-reset reading becomes the baseline for the next interval.
        state.sample(&SampleValue::Float(25.0), 1.0, Some(120), 120).unwrap();
        let points = flush_state(&mut state, &ctx);
        assert_approx_eq!(f64, points[0].value(), 2.0);
    }

    #[test]
    fn non_numeric_value_is_rejected_for_numeric_kinds() {
        let mut state = MetricState::for_kind(MetricKind::Gauge, &HistogramConfiguration::default());
        let result = state.sample(&SampleValue::from("oops"), 1.0, None, FLUSH_TS);
        assert!(matches!(result, Err(AggregateError::NonNumericValue { .. })));
    }

    #[test]
    fn median_and_percentile_indices() {
        // Median rounds half away from zero, percentiles round half down.
        assert_eq!(median_index(5), 2);
        assert_eq!(median_index(4), 1);
        assert_eq!(median_index(1), 0);

        assert_eq!(percentile_index(0.5, 5), 1);
        assert_eq!(percentile_index(0.95, 20), 18);
        assert_eq!(percentile_index(0.95, 5), 4);
        assert_eq!(percentile_index(0.99, 10), 9);
        assert_eq!(percentile_index(0.5, 1), 0);
    }
}
