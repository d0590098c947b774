//! Core data model for the aggregation pipeline.
//!
//! Everything the pipeline passes between its stages lives here: metric samples and their kinds on the way in,
//! finalized [`Point`]s on the way out, and the event/service-check records that bypass aggregation entirely.
#![deny(warnings)]
#![deny(missing_docs)]

pub mod metric;
pub use self::metric::{MetricKind, MetricSample, SampleValue};

pub mod point;
pub use self::point::{Point, PointKind};

pub mod eventd;
pub use self::eventd::{AlertType, EventD, Priority};

pub mod service_check;
pub use self::service_check::{CheckStatus, ServiceCheck};
