//! Context-to-state mapping.
use std::collections::hash_map::Entry;

use ahash::AHashMap;
use tally_context::Context;
use tally_event::MetricKind;

use crate::{config::HistogramConfiguration, state::MetricState, AggregateError};

/// A single context's entry in a [`ContextTable`].
#[derive(Debug)]
pub struct ContextEntry {
    /// The accumulation state of the context.
    pub state: MetricState,

    /// When the context last received a sample, in seconds since the Unix epoch.
    pub last_sample_time: u64,
}

/// Mapping from context to accumulation state.
///
/// Context identity is the canonical composite key, so lookups are independent of the order tags arrived in. The
/// metric kind of a context is fixed when its entry is created: resubmitting the same context under a different
/// kind is refused rather than silently coercing the existing state.
#[derive(Debug, Default)]
pub struct ContextTable {
    entries: AHashMap<Context, ContextEntry>,
}

impl ContextTable {
    /// Returns `true` if the table holds no contexts.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of contexts in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns the entry for the given context, creating it with the given kind when absent.
    ///
    /// Returns [`AggregateError::KindConflict`] when the context already exists under a different kind.
    pub fn lookup_or_create(
        &mut self, context: Context, kind: MetricKind, histogram_config: &HistogramConfiguration,
    ) -> Result<&mut ContextEntry, AggregateError> {
        match self.entries.entry(context) {
            Entry::Occupied(entry) => {
                let existing = entry.get().state.kind();
                if existing != kind {
                    return Err(AggregateError::KindConflict {
                        context: entry.key().clone(),
                        existing,
                        submitted: kind,
                    });
                }
                Ok(entry.into_mut())
            }
            Entry::Vacant(entry) => Ok(entry.insert(ContextEntry {
                state: MetricState::for_kind(kind, histogram_config),
                last_sample_time: 0,
            })),
        }
    }

    /// Removes every context whose last sample is older than `cutoff`, returning the removed contexts.
    pub fn drain_expired(&mut self, cutoff: u64) -> Vec<Context> {
        let mut expired = Vec::new();
        self.entries.retain(|context, entry| {
            if entry.last_sample_time < cutoff {
                expired.push(context.clone());
                false
            } else {
                true
            }
        });
        expired
    }

    /// Returns an iterator over the contexts and their entries.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&Context, &mut ContextEntry)> {
        self.entries.iter_mut().map(|(context, entry)| (context, entry))
    }

    /// Consumes the table, yielding its contexts and entries.
    pub fn into_entries(self) -> impl Iterator<Item = (Context, ContextEntry)> {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use tally_context::TagSet;

    use super::*;

    fn context(name: &str) -> Context {
        Context::from_name_and_tags(name, TagSet::default())
    }

    #[test]
    fn kind_is_fixed_at_creation() {
        let config = HistogramConfiguration::default();
        let mut table = ContextTable::default();

        table
            .lookup_or_create(context("metric"), MetricKind::Counter, &config)
            .expect("first creation should succeed");
        table
            .lookup_or_create(context("metric"), MetricKind::Counter, &config)
            .expect("same kind should be accepted");

        let err = table
            .lookup_or_create(context("metric"), MetricKind::Gauge, &config)
            .unwrap_err();
        assert!(matches!(
            err,
            AggregateError::KindConflict {
                existing: MetricKind::Counter,
                submitted: MetricKind::Gauge,
                ..
            }
        ));

        // A different context is free to use another kind.
        table
            .lookup_or_create(context("other"), MetricKind::Gauge, &config)
            .expect("distinct context should be accepted");
    }

    #[test]
    fn drain_expired_removes_idle_contexts() {
        let config = HistogramConfiguration::default();
        let mut table = ContextTable::default();

        table
            .lookup_or_create(context("fresh"), MetricKind::Gauge, &config)
            .unwrap()
            .last_sample_time = 100;
        table
            .lookup_or_create(context("idle"), MetricKind::Gauge, &config)
            .unwrap()
            .last_sample_time = 10;

        let expired = table.drain_expired(50);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].name(), "idle");
        assert_eq!(table.len(), 1);
    }
}
