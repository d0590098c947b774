//! The time-bucketed aggregator.
use std::sync::Arc;

use ahash::AHashMap;
use tally_codec::{StatsdCodec, StatsdPacket};
use tally_context::{Context, TagSet};
use tally_error::GenericError;
use tally_event::{EventD, MetricKind, MetricSample, Point, ServiceCheck};
use tracing::{debug, warn};

use crate::{
    aggregator::{
        clamp_sample_rate, eventd_from_packet, resolve_device, resolve_host, samples_from_packet,
        service_check_from_packet, FlushStats,
    },
    config::{AggregatorConfiguration, HistogramConfiguration},
    formatter::PointFormatter,
    state,
    table::ContextTable,
    AggregateError,
};

struct Bucket {
    start: u64,
    contexts: ContextTable,
}

/// The time-bucketed metrics aggregator.
///
/// Instead of one rolling table, time is partitioned into fixed-width buckets aligned to the interval, each with its
/// own [`ContextTable`]. A sample lands in the bucket its timestamp falls into; a flush closes every bucket that
/// ended before the current interval, in ascending order, emitting each context's points with the bucket start as
/// their timestamp. This gives exactly-once-per-interval semantics when many independent submitters race a single
/// periodic flush.
///
/// Counter continuity is tracked across buckets: a counter context absent from a closed bucket still yields a
/// zero-valued point for that bucket, until it goes idle past the expiry period and disappears. Gauge samples are
/// materialized as [`MetricKind::BucketGauge`], so their points always carry the bucket start time.
pub struct BucketAggregator {
    hostname: String,
    interval: f64,
    expiry_seconds: u64,
    recent_point_threshold: u64,
    histogram_config: HistogramConfiguration,
    formatter: Arc<dyn PointFormatter>,
    codec: StatsdCodec,
    buckets: Vec<Bucket>,
    current_bucket: Option<(u64, usize)>,
    counter_last_seen: AHashMap<Context, u64>,
    last_flush_cutoff: u64,
    events: Vec<EventD>,
    service_checks: Vec<ServiceCheck>,
    stats: FlushStats,
    stale_points_since_flush: u64,
}

impl BucketAggregator {
    pub(crate) fn from_parts(
        config: &AggregatorConfiguration, histogram_config: HistogramConfiguration, formatter: Arc<dyn PointFormatter>,
    ) -> Self {
        Self {
            hostname: config.hostname.clone(),
            interval: config.interval,
            expiry_seconds: config.expiry_seconds,
            recent_point_threshold: config.recent_point_threshold,
            histogram_config,
            formatter,
            codec: StatsdCodec::default(),
            buckets: Vec::with_capacity(2),
            current_bucket: None,
            counter_last_seen: AHashMap::default(),
            last_flush_cutoff: 0,
            events: Vec::new(),
            service_checks: Vec::new(),
            stats: FlushStats::default(),
            stale_points_since_flush: 0,
        }
    }

    /// Returns the aggregation interval, in seconds.
    pub fn interval(&self) -> f64 {
        self.interval
    }

    /// Returns the aggregator's lifetime statistics.
    pub fn stats(&self) -> FlushStats {
        self.stats
    }

    /// Submits a single sample for the given metric.
    ///
    /// The sample lands in the bucket its timestamp falls into; samples without an explicit timestamp land in the
    /// bucket covering `current_time`. Gauge samples are materialized as bucketed gauges.
    #[allow(clippy::too_many_arguments)]
    pub fn submit_metric(
        &mut self, name: &str, kind: MetricKind, sample: MetricSample, tags: TagSet, hostname: Option<&str>,
        device: Option<&str>, current_time: u64,
    ) -> Result<(), AggregateError> {
        if let Some(timestamp) = sample.timestamp {
            if current_time.saturating_sub(timestamp) > self.recent_point_threshold {
                debug!(metric = name, timestamp, "Discarding sample with stale timestamp.");
                self.stale_points_since_flush += 1;
                self.stats.stale_points_dropped += 1;
                return Ok(());
            }
        }

        let kind = match kind {
            MetricKind::Gauge => MetricKind::BucketGauge,
            other => other,
        };

        let (tags, tag_host, tag_device) = tags.extract_reserved();
        let host = resolve_host(tag_host, hostname, &self.hostname);
        let device = resolve_device(tag_device, device);
        let context = Context::new(name, tags, host, device);

        let sample_timestamp = sample.timestamp.unwrap_or(current_time);
        let bucket_start = align_to_bucket_start(sample_timestamp, self.interval);
        let index = self.get_or_create_bucket(bucket_start);

        let entry = self.buckets[index].contexts.lookup_or_create(context, kind, &self.histogram_config)?;
        entry
            .state
            .sample(&sample.value, clamp_sample_rate(sample.sample_rate), sample.timestamp, current_time)?;
        entry.last_sample_time = current_time;

        Ok(())
    }

    /// Submits a raw packet of newline-separated wire lines.
    ///
    /// A line that fails to decode — or that resubmits a context under a conflicting kind within its bucket — is
    /// dropped and counted; the remaining lines of the packet are still processed.
    pub fn submit_packets(&mut self, packets: &str, current_time: u64) {
        for line in packets.lines() {
            if line.is_empty() {
                continue;
            }

            if let Err(e) = self.submit_line(line, current_time) {
                debug!(error = %e, line, "Dropping undecodable line.");
                self.stats.lines_dropped += 1;
            }
        }
    }

    fn submit_line(&mut self, line: &str, current_time: u64) -> Result<(), GenericError> {
        match self.codec.decode_line(line.as_bytes())? {
            StatsdPacket::Metrics(packets) => {
                for packet in packets {
                    let (name, kind, tags, samples) = samples_from_packet(packet);
                    for sample in samples {
                        self.submit_metric(&name, kind, sample, tags.clone(), None, None, current_time)?;
                    }
                }
            }
            StatsdPacket::Event(packet) => self.events.push(eventd_from_packet(packet)),
            StatsdPacket::ServiceCheck(packet) => self.service_checks.push(service_check_from_packet(packet)),
        }
        Ok(())
    }

    /// Submits an event.
    pub fn submit_event(&mut self, event: EventD) {
        self.events.push(event);
    }

    /// Submits a service check.
    pub fn submit_service_check(&mut self, service_check: ServiceCheck) {
        self.service_checks.push(service_check);
    }

    fn get_or_create_bucket(&mut self, bucket_start: u64) -> usize {
        // The hot path hits the same bucket sample after sample, so the last touched bucket is cached. Indices stay
        // valid between flushes since buckets are only appended here, and a flush clears the cache.
        if let Some((start, index)) = self.current_bucket {
            if start == bucket_start {
                return index;
            }
        }

        let index = match self.buckets.iter().position(|bucket| bucket.start == bucket_start) {
            Some(index) => index,
            None => {
                self.buckets.push(Bucket {
                    start: bucket_start,
                    contexts: ContextTable::default(),
                });
                self.buckets.len() - 1
            }
        };
        self.current_bucket = Some((bucket_start, index));
        index
    }

    /// Flushes every closed bucket into a flat list of points.
    ///
    /// Buckets whose start precedes the current interval boundary are closed and flushed in ascending start order.
    /// When no buckets exist at all but a full interval has elapsed since the previous flush, zero-valued counter
    /// points are still synthesized for tracked counter contexts, so idle counters report zero instead of
    /// disappearing early.
    pub fn flush(&mut self, current_time: u64) -> Vec<Point> {
        let flush_cutoff = align_to_bucket_start(current_time, self.interval);
        let expiry_cutoff = current_time.saturating_sub(self.expiry_seconds);

        let mut points = Vec::new();
        if !self.buckets.is_empty() {
            // Oldest first, so counter continuity tracking sees the buckets in order.
            self.buckets.sort_unstable_by_key(|bucket| bucket.start);

            let mut index = 0;
            while index < self.buckets.len() {
                if self.buckets[index].start >= flush_cutoff {
                    index += 1;
                    continue;
                }

                let bucket = self.buckets.remove(index);
                let bucket_start = bucket.start;
                debug!(bucket_start, contexts = bucket.contexts.len(), "Flushing bucket.");

                let mut not_sampled = self.counter_last_seen.clone();
                for (context, mut entry) in bucket.contexts.into_entries() {
                    if entry.last_sample_time < expiry_cutoff {
                        debug!(%context, "Context went idle past expiry. Removing.");
                        self.counter_last_seen.remove(&context);
                        self.stats.contexts_expired += 1;
                        continue;
                    }

                    let is_counter = entry.state.kind() == MetricKind::Counter;
                    entry.state.flush(&context, bucket_start, self.interval, &mut points);
                    if is_counter {
                        not_sampled.remove(&context);
                        self.counter_last_seen.insert(context, entry.last_sample_time);
                    }
                }

                // Counters absent from this bucket still report zero until they expire.
                self.synthesize_zero_counters(&not_sampled, expiry_cutoff, bucket_start, &mut points);
            }

            self.current_bucket = None;
        } else if (current_time.saturating_sub(self.last_flush_cutoff)) as f64 > self.interval {
            let tracked = self.counter_last_seen.clone();
            self.synthesize_zero_counters(&tracked, expiry_cutoff, flush_cutoff, &mut points);
        }
        self.last_flush_cutoff = flush_cutoff;

        if self.stale_points_since_flush > 0 {
            warn!(
                points = self.stale_points_since_flush,
                threshold_seconds = self.recent_point_threshold,
                "Discarded points with stale explicit timestamps since last flush."
            );
            self.stale_points_since_flush = 0;
        }

        self.stats.points_flushed += points.len() as u64;
        points.into_iter().map(|point| self.formatter.format(point)).collect()
    }

    fn synthesize_zero_counters(
        &mut self, candidates: &AHashMap<Context, u64>, expiry_cutoff: u64, flush_timestamp: u64,
        points: &mut Vec<Point>,
    ) {
        for (context, last_sample_time) in candidates {
            if *last_sample_time < expiry_cutoff {
                debug!(%context, "Zero-value counter went idle past expiry. Removing.");
                self.counter_last_seen.remove(context);
                self.stats.contexts_expired += 1;
            } else {
                points.push(state::zero_counter_point(context, flush_timestamp, self.interval));
            }
        }
    }

    /// Drains all pending events.
    pub fn flush_events(&mut self) -> Vec<EventD> {
        std::mem::take(&mut self.events)
    }

    /// Drains all pending service checks.
    pub fn flush_service_checks(&mut self) -> Vec<ServiceCheck> {
        std::mem::take(&mut self.service_checks)
    }
}

fn align_to_bucket_start(timestamp: u64, interval: f64) -> u64 {
    timestamp - (timestamp as f64 % interval) as u64
}

#[cfg(test)]
mod tests {
    use float_cmp::assert_approx_eq;
    use tally_event::PointKind;

    use super::*;
    use crate::config::AggregatorConfiguration;

    const INTERVAL_SECS: u64 = 10;
    const INTERVAL: f64 = INTERVAL_SECS as f64;
    const EXPIRY_SECONDS: u64 = 300;

    // Aligned test timeline: inserts land near the end of a bucket, flushes happen right after it closes.
    const FIRST_INSERT_TS: u64 = 1_700_000_000 - (1_700_000_000 % INTERVAL_SECS) + INTERVAL_SECS - 1;
    const FIRST_BUCKET_START: u64 = FIRST_INSERT_TS - (FIRST_INSERT_TS % INTERVAL_SECS);
    const FIRST_FLUSH_TS: u64 = FIRST_BUCKET_START + INTERVAL_SECS;
    const SECOND_INSERT_TS: u64 = FIRST_INSERT_TS + INTERVAL_SECS;
    const SECOND_BUCKET_START: u64 = FIRST_BUCKET_START + INTERVAL_SECS;
    const SECOND_FLUSH_TS: u64 = FIRST_FLUSH_TS + INTERVAL_SECS;
    const THIRD_FLUSH_TS: u64 = SECOND_FLUSH_TS + INTERVAL_SECS;

    fn aggregator() -> BucketAggregator {
        AggregatorConfiguration::with_hostname("testhost")
            .with_interval(INTERVAL)
            .with_expiry_seconds(EXPIRY_SECONDS)
            .build_bucketed()
            .expect("configuration should be valid")
    }

    #[test]
    fn bucket_start_alignment() {
        assert_eq!(align_to_bucket_start(1000, 10.0), 1000);
        assert_eq!(align_to_bucket_start(1009, 10.0), 1000);
        assert_eq!(align_to_bucket_start(1010, 10.0), 1010);
    }

    #[test]
    fn open_buckets_are_not_flushed() {
        let mut agg = aggregator();

        agg.submit_packets("foo:5|c", FIRST_INSERT_TS);

        // The bucket is still open at its own start time, and closed once the next interval begins.
        assert!(agg.flush(FIRST_INSERT_TS).is_empty());

        let points = agg.flush(FIRST_FLUSH_TS);
        assert_eq!(points.len(), 1);
        assert_approx_eq!(f64, points[0].value(), 0.5);
        assert_eq!(points[0].timestamp(), FIRST_BUCKET_START);
    }

    #[test]
    fn buckets_flush_in_ascending_order() {
        let mut agg = aggregator();

        // Deliberately submit into the later bucket first, using explicit timestamps.
        let line = format!("foo:1|c|T{}", SECOND_INSERT_TS);
        agg.submit_packets(&line, SECOND_INSERT_TS);
        let line = format!("foo:2|c|T{}", FIRST_INSERT_TS);
        agg.submit_packets(&line, SECOND_INSERT_TS);

        let points = agg.flush(SECOND_FLUSH_TS);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].timestamp(), FIRST_BUCKET_START);
        assert_approx_eq!(f64, points[0].value(), 0.2);
        assert_eq!(points[1].timestamp(), SECOND_BUCKET_START);
        assert_approx_eq!(f64, points[1].value(), 0.1);
    }

    #[test]
    fn gauges_flush_with_bucket_start_timestamp() {
        let mut agg = aggregator();

        agg.submit_packets("temp:42|g", FIRST_INSERT_TS);

        let points = agg.flush(FIRST_FLUSH_TS);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].kind, PointKind::Gauge);
        assert_eq!(points[0].value(), 42.0);
        assert_eq!(points[0].timestamp(), FIRST_BUCKET_START);
    }

    #[test]
    fn idle_counters_emit_zero_for_later_buckets() {
        let mut agg = aggregator();

        agg.submit_packets("foo:5|c", FIRST_INSERT_TS);
        let points = agg.flush(FIRST_FLUSH_TS);
        assert_eq!(points.len(), 1);
        assert_approx_eq!(f64, points[0].value(), 0.5);

        // A different metric keeps the next bucket alive; the idle counter reports zero for it.
        agg.submit_packets("bar:1|g", SECOND_INSERT_TS);
        let mut points = agg.flush(SECOND_FLUSH_TS);
        points.sort_by(|a, b| a.metric.cmp(&b.metric));

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].metric, "bar");
        assert_eq!(points[1].metric, "foo");
        assert_eq!(points[1].value(), 0.0);
        assert_eq!(points[1].kind, PointKind::Rate);
        assert_eq!(points[1].timestamp(), SECOND_BUCKET_START);
    }

    #[test]
    fn idle_counters_emit_zero_with_no_buckets_at_all() {
        let mut agg = aggregator();

        agg.submit_packets("foo:5|c", FIRST_INSERT_TS);
        assert_eq!(agg.flush(FIRST_FLUSH_TS).len(), 1);

        // No samples at all since the last flush: after a full interval, the counter still reports zero.
        let points = agg.flush(THIRD_FLUSH_TS);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].metric, "foo");
        assert_eq!(points[0].value(), 0.0);
    }

    #[test]
    fn idle_counters_expire_from_continuity_tracking() {
        let mut agg = aggregator();

        agg.submit_packets("foo:5|c", FIRST_INSERT_TS);
        assert_eq!(agg.flush(FIRST_FLUSH_TS).len(), 1);

        // Once the counter has been idle past the expiry period, no zero-value points are synthesized for it.
        let expired_flush_ts = FIRST_INSERT_TS + EXPIRY_SECONDS + INTERVAL_SECS;
        let points = agg.flush(expired_flush_ts);
        assert!(points.is_empty());
        assert_eq!(agg.stats().contexts_expired, 1);

        // And nothing lingers for later flushes either.
        assert!(agg.flush(expired_flush_ts + INTERVAL_SECS).is_empty());
    }

    #[test]
    fn timestamped_samples_select_their_bucket() {
        let mut agg = aggregator();

        // Two samples arriving at the same wall clock time, one explicitly timestamped into the previous bucket.
        let line = format!("foo:1|c|T{}\nfoo:3|c", FIRST_INSERT_TS);
        agg.submit_packets(&line, SECOND_INSERT_TS);

        let points = agg.flush(SECOND_FLUSH_TS);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].timestamp(), FIRST_BUCKET_START);
        assert_approx_eq!(f64, points[0].value(), 0.1);
        assert_eq!(points[1].timestamp(), SECOND_BUCKET_START);
        assert_approx_eq!(f64, points[1].value(), 0.3);
    }

    #[test]
    fn same_context_in_one_bucket_accumulates() {
        let mut agg = aggregator();

        agg.submit_packets("foo:5|c|#a:1,b:2", FIRST_INSERT_TS);
        agg.submit_packets("foo:5|c|#b:2,a:1", FIRST_INSERT_TS);

        let points = agg.flush(FIRST_FLUSH_TS);
        assert_eq!(points.len(), 1);
        assert_approx_eq!(f64, points[0].value(), 1.0);
    }
}
