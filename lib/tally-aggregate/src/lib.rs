//! The metrics aggregation engine.
//!
//! Samples — whether decoded from the wire protocol or submitted directly — are classified by metric kind,
//! accumulated per context, and periodically flushed into finalized [`Point`](tally_event::Point)s ready for
//! transport. Two aggregator flavors share the same per-context state machinery:
//!
//! - [`Aggregator`] keeps one rolling context table and flushes it whole, with idle-expiry and zero-value counter
//!   continuity handled inside the table's lifetime.
//! - [`BucketAggregator`] partitions time into interval-aligned buckets, one context table per open bucket, closing
//!   and flushing buckets as time advances.
//!
//! Both are single-owner types: callers serialize access (typically a mutex around submissions with flushes taken
//! under the same lock) and pass the clock in explicitly.
#![deny(warnings)]
#![deny(missing_docs)]

use snafu::Snafu;
use tally_context::Context;
use tally_event::MetricKind;

mod aggregator;
pub use self::aggregator::{Aggregator, FlushStats};

mod bucketed;
pub use self::bucketed::BucketAggregator;

mod config;
pub use self::config::{AggregatorConfiguration, HistogramAggregate, HistogramConfiguration};

mod formatter;
pub use self::formatter::{NamespaceFormatter, PassthroughFormatter, PointFormatter};

mod state;
pub use self::state::{BucketGauge, Count, Counter, Gauge, Histogram, MetricState, MonotonicCount, Rate, Set};

mod table;
pub use self::table::{ContextEntry, ContextTable};

pub mod time;

/// Error produced when a sample cannot be folded into aggregation state.
///
/// Both variants indicate integration bugs on the submitting side rather than bad luck on the wire, which is why
/// they surface as errors instead of being silently coerced.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum AggregateError {
    /// A context was resubmitted under a different metric kind than it was created with.
    #[snafu(display(
        "context '{}' is bound to kind {}, resubmitted as {}",
        context,
        existing,
        submitted
    ))]
    KindConflict {
        /// The context in conflict.
        context: Context,

        /// The kind the context was created with.
        existing: MetricKind,

        /// The kind of the conflicting submission.
        submitted: MetricKind,
    },

    /// A non-numeric value was submitted for a numeric metric kind.
    #[snafu(display("metric kind {} requires a numeric value", kind))]
    NonNumericValue {
        /// The kind the value was submitted for.
        kind: MetricKind,
    },
}
