//! Aggregator configuration.
use std::sync::Arc;

use serde::Deserialize;
use tally_error::{generic_error, GenericError};

use crate::{
    aggregator::Aggregator,
    bucketed::BucketAggregator,
    formatter::{NamespaceFormatter, PassthroughFormatter, PointFormatter},
};

const fn default_interval() -> f64 {
    10.0
}

const fn default_expiry_seconds() -> u64 {
    300
}

const fn default_recent_point_threshold() -> u64 {
    3600
}

fn default_histogram_aggregates() -> Vec<String> {
    ["max", "median", "avg", "count"].iter().map(|s| s.to_string()).collect()
}

fn default_histogram_percentiles() -> Vec<f64> {
    vec![0.95]
}

/// Aggregator configuration.
///
/// One configuration builds either flavor of aggregator: [`build`](Self::build) for the plain per-flush variant, or
/// [`build_bucketed`](Self::build_bucketed) for the time-bucketed variant. Contradictory settings — an unknown
/// histogram aggregate name, a percentile outside `(0, 1)`, a non-positive interval — fail at build time rather than
/// being discovered mid-flight.
#[derive(Deserialize)]
pub struct AggregatorConfiguration {
    /// Hostname attributed to samples that do not carry one of their own.
    pub hostname: String,

    /// Width of the aggregation interval, in seconds.
    ///
    /// Rates are normalized over this interval, and the bucketed aggregator aligns its buckets to it.
    ///
    /// Defaults to 10 seconds.
    #[serde(default = "default_interval")]
    pub interval: f64,

    /// How long a context may go without samples before it is dropped, in seconds.
    ///
    /// Counter contexts keep reporting zero for this long after their last sample, then disappear.
    ///
    /// Defaults to 300 seconds (5 minutes).
    #[serde(default = "default_expiry_seconds")]
    pub expiry_seconds: u64,

    /// Maximum age of an explicit sample timestamp, in seconds, relative to arrival.
    ///
    /// Samples older than this are discarded and counted rather than aggregated, so that stragglers cannot be
    /// attributed to the wrong interval.
    ///
    /// Defaults to 3600 seconds (1 hour).
    #[serde(default = "default_recent_point_threshold")]
    pub recent_point_threshold: u64,

    /// Aggregates every histogram emits on flush.
    ///
    /// Any subset of `min`, `max`, `median`, `avg`, `sum`, and `count`.
    ///
    /// Defaults to `max`, `median`, `avg`, and `count`.
    #[serde(default = "default_histogram_aggregates")]
    pub histogram_aggregates: Vec<String>,

    /// Percentiles every histogram emits on flush, as fractions in `(0, 1)`.
    ///
    /// Defaults to `[0.95]`.
    #[serde(default = "default_histogram_percentiles")]
    pub histogram_percentiles: Vec<f64>,

    /// Namespace prefix applied to every emitted metric name, dot-separated.
    ///
    /// Defaults to no prefix.
    #[serde(default)]
    pub metric_namespace: Option<String>,

    /// Point formatter override.
    ///
    /// When set, replaces the default output shaping (including the namespace prefix) wholesale.
    #[serde(skip)]
    pub formatter: Option<Arc<dyn PointFormatter>>,
}

impl AggregatorConfiguration {
    /// Creates a new `AggregatorConfiguration` with the given hostname and default values for everything else.
    pub fn with_hostname<S: Into<String>>(hostname: S) -> Self {
        Self {
            hostname: hostname.into(),
            interval: default_interval(),
            expiry_seconds: default_expiry_seconds(),
            recent_point_threshold: default_recent_point_threshold(),
            histogram_aggregates: default_histogram_aggregates(),
            histogram_percentiles: default_histogram_percentiles(),
            metric_namespace: None,
            formatter: None,
        }
    }

    /// Sets the aggregation interval, in seconds.
    pub fn with_interval(mut self, interval: f64) -> Self {
        self.interval = interval;
        self
    }

    /// Sets the context expiry period, in seconds.
    pub fn with_expiry_seconds(mut self, expiry_seconds: u64) -> Self {
        self.expiry_seconds = expiry_seconds;
        self
    }

    /// Sets the maximum accepted age of explicit sample timestamps, in seconds.
    pub fn with_recent_point_threshold(mut self, recent_point_threshold: u64) -> Self {
        self.recent_point_threshold = recent_point_threshold;
        self
    }

    /// Sets the histogram aggregates.
    pub fn with_histogram_aggregates<I, S>(mut self, aggregates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.histogram_aggregates = aggregates.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the histogram percentiles.
    pub fn with_histogram_percentiles<I: IntoIterator<Item = f64>>(mut self, percentiles: I) -> Self {
        self.histogram_percentiles = percentiles.into_iter().collect();
        self
    }

    /// Sets the metric namespace prefix.
    pub fn with_metric_namespace<S: Into<String>>(mut self, namespace: S) -> Self {
        self.metric_namespace = Some(namespace.into());
        self
    }

    /// Sets a point formatter override.
    pub fn with_formatter(mut self, formatter: Arc<dyn PointFormatter>) -> Self {
        self.formatter = Some(formatter);
        self
    }

    /// Builds an [`Aggregator`] from this configuration.
    pub fn build(&self) -> Result<Aggregator, GenericError> {
        let (histogram_config, formatter) = self.common_parts()?;
        Ok(Aggregator::from_parts(self, histogram_config, formatter))
    }

    /// Builds a [`BucketAggregator`] from this configuration.
    pub fn build_bucketed(&self) -> Result<BucketAggregator, GenericError> {
        let (histogram_config, formatter) = self.common_parts()?;
        Ok(BucketAggregator::from_parts(self, histogram_config, formatter))
    }

    fn common_parts(&self) -> Result<(HistogramConfiguration, Arc<dyn PointFormatter>), GenericError> {
        if !(self.interval > 0.0) {
            return Err(generic_error!("aggregation interval must be positive, got {}", self.interval));
        }

        let histogram_config =
            HistogramConfiguration::from_options(&self.histogram_aggregates, &self.histogram_percentiles)?;

        let formatter = match &self.formatter {
            Some(formatter) => Arc::clone(formatter),
            None => match self.metric_namespace.as_deref() {
                Some(namespace) if !namespace.is_empty() => {
                    Arc::new(NamespaceFormatter::new(namespace)) as Arc<dyn PointFormatter>
                }
                _ => Arc::new(PassthroughFormatter),
            },
        };

        Ok((histogram_config, formatter))
    }
}

/// A single histogram aggregate.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HistogramAggregate {
    /// Smallest sample.
    Min,

    /// Largest sample.
    Max,

    /// Median sample.
    Median,

    /// Mean of the samples.
    Avg,

    /// Sum of the samples.
    Sum,

    /// Sample-rate-scaled number of samples, emitted as a rate over the interval.
    Count,
}

impl HistogramAggregate {
    /// Returns the aggregate name as used in configuration and in emitted metric names.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Min => "min",
            Self::Max => "max",
            Self::Median => "median",
            Self::Avg => "avg",
            Self::Sum => "sum",
            Self::Count => "count",
        }
    }

    fn parse(name: &str) -> Option<Self> {
        match name {
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            "median" => Some(Self::Median),
            "avg" => Some(Self::Avg),
            "sum" => Some(Self::Sum),
            "count" => Some(Self::Count),
            _ => None,
        }
    }
}

/// Validated histogram flush configuration.
///
/// Applies uniformly to every histogram context created by the owning aggregator.
#[derive(Clone, Debug)]
pub struct HistogramConfiguration {
    aggregates: Vec<HistogramAggregate>,
    percentiles: Vec<f64>,
}

impl HistogramConfiguration {
    /// Creates a `HistogramConfiguration` from raw aggregate names and percentiles.
    ///
    /// Unknown aggregate names and percentiles outside `(0, 1)` are rejected.
    pub fn from_options(aggregates: &[String], percentiles: &[f64]) -> Result<Self, GenericError> {
        let mut parsed = Vec::with_capacity(aggregates.len());
        for name in aggregates {
            let aggregate = HistogramAggregate::parse(name)
                .ok_or_else(|| generic_error!("unknown histogram aggregate '{}'", name))?;
            if !parsed.contains(&aggregate) {
                parsed.push(aggregate);
            }
        }

        for &percentile in percentiles {
            if !(percentile > 0.0 && percentile < 1.0) {
                return Err(generic_error!(
                    "histogram percentile {} must be within (0, 1)",
                    percentile
                ));
            }
        }

        Ok(Self {
            aggregates: parsed,
            percentiles: percentiles.to_vec(),
        })
    }

    /// Returns the configured aggregates.
    pub fn aggregates(&self) -> &[HistogramAggregate] {
        &self.aggregates
    }

    /// Returns the configured percentiles.
    pub fn percentiles(&self) -> &[f64] {
        &self.percentiles
    }
}

impl Default for HistogramConfiguration {
    fn default() -> Self {
        Self::from_options(&default_histogram_aggregates(), &default_histogram_percentiles())
            .expect("default histogram configuration must be valid")
    }
}

/// Renders the metric name suffix for a percentile.
///
/// The percentile is rendered as an integer number of percent, truncated: `0.95` becomes `95percentile`.
pub(crate) fn percentile_suffix(percentile: f64) -> String {
    format!("{}percentile", (percentile * 100.0) as u32)
}
