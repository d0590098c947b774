//! Finalized output points.
use std::fmt;

use serde::Serialize;
use tally_context::TagSet;

/// The wire-facing type of an emitted point.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PointKind {
    /// A point-in-time value.
    Gauge,

    /// A normalized per-second rate over an interval.
    Rate,

    /// A raw count over an interval.
    Count,
}

impl PointKind {
    /// Returns the kind as the string used in the output record.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Gauge => "gauge",
            Self::Rate => "rate",
            Self::Count => "count",
        }
    }
}

impl fmt::Display for PointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A finalized data point, ready for transport.
///
/// This is the externally consumed record shape: a metric name, exactly one `(timestamp, value)` pair, the context's
/// tags/host/device, the point kind, and the aggregation interval where one applies. It serializes directly to the
/// outbound JSON form, with the kind under a `type` key.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Point {
    /// Metric name, with any configured namespace prefix already applied.
    pub metric: String,

    /// Exactly one `(timestamp, value)` pair.
    pub points: [(u64, f64); 1],

    /// Tags of the originating context, or `None` if it had none.
    pub tags: Option<TagSet>,

    /// Hostname of the originating context.
    pub host: Option<String>,

    /// Device name of the originating context.
    pub device_name: Option<String>,

    /// The point kind.
    #[serde(rename = "type")]
    pub kind: PointKind,

    /// Aggregation interval in seconds, for rate and count points.
    pub interval: Option<f64>,
}

impl Point {
    /// Creates a new `Point` with no tags, host, device, or interval.
    pub fn new<S: Into<String>>(metric: S, timestamp: u64, value: f64, kind: PointKind) -> Self {
        Self {
            metric: metric.into(),
            points: [(timestamp, value)],
            tags: None,
            host: None,
            device_name: None,
            kind,
            interval: None,
        }
    }

    /// Sets the tags.
    ///
    /// An empty tag set is recorded as no tags at all.
    pub fn with_tags(mut self, tags: TagSet) -> Self {
        self.tags = if tags.is_empty() { None } else { Some(tags) };
        self
    }

    /// Sets the hostname.
    pub fn with_host(mut self, host: impl Into<Option<String>>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the device name.
    pub fn with_device_name(mut self, device_name: impl Into<Option<String>>) -> Self {
        self.device_name = device_name.into();
        self
    }

    /// Sets the aggregation interval.
    pub fn with_interval(mut self, interval: impl Into<Option<f64>>) -> Self {
        self.interval = interval.into();
        self
    }

    /// Returns the timestamp of the point.
    pub fn timestamp(&self) -> u64 {
        self.points[0].0
    }

    /// Returns the value of the point.
    pub fn value(&self) -> f64 {
        self.points[0].1
    }
}
