//! Metric context identity.
//!
//! A [`Context`] is the unique identity of a metric series: metric name, canonical tag set, hostname, and device
//! name. Canonicalization (tag sorting and deduplication, reserved tag extraction) happens once, at construction,
//! so that lookups and equality checks operate on a precomputed form.
#![deny(warnings)]
#![deny(missing_docs)]

mod context;
pub use self::context::Context;

pub mod tags;
pub use self::tags::{Tag, TagSet};
