//! Metric sample types.
use std::fmt;

/// The kind of a metric series.
///
/// Every context is bound to exactly one kind, fixed at the first sample it receives. The kind selects which
/// accumulation state the aggregator materializes for the context and how that state turns into points on flush.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MetricKind {
    /// Latest-value semantics; flushes with the sample's own timestamp when one was given.
    Gauge,

    /// Latest-value semantics; always flushes with the flush timestamp.
    ///
    /// Used by the bucketed aggregator, where the flush timestamp is the start of the time bucket the sample fell
    /// into. Kept distinct from [`Gauge`](Self::Gauge) since downstream consumers may depend on either timestamp
    /// policy.
    BucketGauge,

    /// Plain additive accumulation, flushed as a raw count.
    Count,

    /// Deltas of a monotonically increasing raw counter reading, flushed as a raw count.
    MonotonicCount,

    /// Sample-rate-scaled additive accumulation, flushed as a per-second rate.
    Counter,

    /// Raw sample buffer, flushed as configured aggregates and percentiles.
    Histogram,

    /// Unique-value tracking, flushed as a cardinality gauge.
    Set,

    /// Per-second rate of change between consecutive raw readings.
    Rate,
}

impl MetricKind {
    /// Returns the kind as a human-readable string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Gauge => "gauge",
            Self::BucketGauge => "bucket_gauge",
            Self::Count => "count",
            Self::MonotonicCount => "monotonic_count",
            Self::Counter => "counter",
            Self::Histogram => "histogram",
            Self::Set => "set",
            Self::Rate => "rate",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The value carried by a single sample.
///
/// Set-kind samples carry the raw string observed on the wire; every other kind carries a number.
#[derive(Clone, Debug, PartialEq)]
pub enum SampleValue {
    /// A numeric value.
    Float(f64),

    /// A raw string value, as used by set metrics.
    Text(String),
}

impl SampleValue {
    /// Returns the numeric value, if this is a numeric sample.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            Self::Text(_) => None,
        }
    }
}

impl From<f64> for SampleValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for SampleValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SampleValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl fmt::Display for SampleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float(value) => write!(f, "{}", value),
            Self::Text(value) => write!(f, "{}", value),
        }
    }
}

/// A single observed sample for a context.
///
/// Carries the value plus the per-sample metadata that affects how it is folded into the context's state: the client
/// sample rate and an optional explicit timestamp. A sample rate outside `(0, 1]` is treated as 1 at submission.
#[derive(Clone, Debug)]
pub struct MetricSample {
    /// The observed value.
    pub value: SampleValue,

    /// Fraction of actual events represented by this sample, in `(0, 1]`.
    pub sample_rate: f64,

    /// Explicit timestamp of the sample, in seconds since the Unix epoch.
    ///
    /// When absent, the sample is attributed to its arrival time.
    pub timestamp: Option<u64>,
}

impl MetricSample {
    /// Creates a new `MetricSample` with a sample rate of 1 and no explicit timestamp.
    pub fn new<V: Into<SampleValue>>(value: V) -> Self {
        Self {
            value: value.into(),
            sample_rate: 1.0,
            timestamp: None,
        }
    }

    /// Sets the sample rate.
    pub fn with_sample_rate(mut self, sample_rate: f64) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Sets the explicit timestamp.
    pub fn with_timestamp(mut self, timestamp: impl Into<Option<u64>>) -> Self {
        self.timestamp = timestamp.into();
        self
    }
}
