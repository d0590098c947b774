//! Output point formatting.
use tally_event::Point;

/// Shapes finalized points before they are handed to the caller.
///
/// Every point produced by a flush passes through the aggregator's formatter exactly once. The default formatter
/// passes points through untouched; configuring a metric namespace swaps in a [`NamespaceFormatter`], and callers
/// with bespoke output requirements can supply their own implementation at construction time.
pub trait PointFormatter: Send + Sync {
    /// Formats a single point.
    fn format(&self, point: Point) -> Point;
}

/// The identity formatter.
#[derive(Debug, Default)]
pub struct PassthroughFormatter;

impl PointFormatter for PassthroughFormatter {
    fn format(&self, point: Point) -> Point {
        point
    }
}

/// Prefixes every emitted metric name with a configured namespace.
#[derive(Debug)]
pub struct NamespaceFormatter {
    prefix: String,
}

impl NamespaceFormatter {
    /// Creates a formatter with the given namespace.
    ///
    /// A trailing dot is appended to the namespace when absent.
    pub fn new<S: Into<String>>(namespace: S) -> Self {
        let mut prefix = namespace.into();
        if !prefix.ends_with('.') {
            prefix.push('.');
        }
        Self { prefix }
    }
}

impl PointFormatter for NamespaceFormatter {
    fn format(&self, mut point: Point) -> Point {
        point.metric.insert_str(0, &self.prefix);
        point
    }
}
