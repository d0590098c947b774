//! The non-bucketed aggregator.
use std::sync::Arc;

use smallvec::SmallVec;
use tally_codec::{EventPacket, MetricPacket, MetricValues, ServiceCheckPacket, StatsdCodec, StatsdPacket};
use tally_context::{Context, TagSet};
use tally_error::GenericError;
use tally_event::{EventD, MetricKind, MetricSample, Point, ServiceCheck};
use tracing::{debug, warn};

use crate::{
    config::{AggregatorConfiguration, HistogramConfiguration},
    formatter::PointFormatter,
    table::ContextTable,
    time::get_unix_timestamp,
    AggregateError,
};

/// Counters describing what an aggregator has done since construction.
///
/// These replace process-global logger state: the counters live and die with the owning aggregator, and can be read
/// at any point through [`Aggregator::stats`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FlushStats {
    /// Number of points produced by flushes.
    pub points_flushed: u64,

    /// Number of samples dropped for carrying a stale explicit timestamp.
    pub stale_points_dropped: u64,

    /// Number of wire lines dropped as malformed or conflicting.
    pub lines_dropped: u64,

    /// Number of contexts removed by idle expiry.
    pub contexts_expired: u64,
}

/// The non-bucketed metrics aggregator.
///
/// Samples accumulate into one [`ContextTable`] between flushes. A flush sweeps expired contexts out, asks every
/// remaining context for its points, and resets whatever state is per-interval. Contexts live until they go idle
/// for the configured expiry period; a flushed counter keeps reporting zero until then, so sparse counter series
/// stay continuous downstream.
///
/// Time is always passed in explicitly (`current_time`, in seconds since the Unix epoch) so that callers own the
/// clock; the convenience submission methods use the wall clock.
pub struct Aggregator {
    hostname: String,
    interval: f64,
    expiry_seconds: u64,
    recent_point_threshold: u64,
    histogram_config: HistogramConfiguration,
    formatter: Arc<dyn PointFormatter>,
    codec: StatsdCodec,
    contexts: ContextTable,
    events: Vec<EventD>,
    service_checks: Vec<ServiceCheck>,
    stats: FlushStats,
    stale_points_since_flush: u64,
}

impl Aggregator {
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
            contexts: ContextTable::default(),
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
    /// The reserved `host`/`device` tags are redirected to the context's hostname/device fields; a sample that names
    /// no host at all is attributed to the configured hostname. A sample whose explicit timestamp is older than the
    /// recent point threshold is discarded and counted rather than aggregated.
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

        let (tags, tag_host, tag_device) = tags.extract_reserved();
        let host = resolve_host(tag_host, hostname, &self.hostname);
        let device = resolve_device(tag_device, device);
        let context = Context::new(name, tags, host, device);

        let entry = self.contexts.lookup_or_create(context, kind, &self.histogram_config)?;
        entry
            .state
            .sample(&sample.value, clamp_sample_rate(sample.sample_rate), sample.timestamp, current_time)?;
        entry.last_sample_time = current_time;

        Ok(())
    }

    /// Submits a gauge sample.
    pub fn gauge(&mut self, name: &str, value: f64, tags: TagSet) -> Result<(), AggregateError> {
        self.submit_metric(name, MetricKind::Gauge, MetricSample::new(value), tags, None, None, get_unix_timestamp())
    }

    /// Increments a counter by one.
    pub fn increment(&mut self, name: &str, tags: TagSet) -> Result<(), AggregateError> {
        self.submit_metric(name, MetricKind::Counter, MetricSample::new(1.0), tags, None, None, get_unix_timestamp())
    }

    /// Decrements a counter by one.
    pub fn decrement(&mut self, name: &str, tags: TagSet) -> Result<(), AggregateError> {
        self.submit_metric(name, MetricKind::Counter, MetricSample::new(-1.0), tags, None, None, get_unix_timestamp())
    }

    /// Submits a raw count sample.
    pub fn count(&mut self, name: &str, value: f64, tags: TagSet) -> Result<(), AggregateError> {
        self.submit_metric(name, MetricKind::Count, MetricSample::new(value), tags, None, None, get_unix_timestamp())
    }

    /// Submits a raw reading of a monotonically increasing counter, to be reported as a count of deltas.
    pub fn count_from_counter(&mut self, name: &str, value: f64, tags: TagSet) -> Result<(), AggregateError> {
        self.submit_metric(
            name,
            MetricKind::MonotonicCount,
            MetricSample::new(value),
            tags,
            None,
            None,
            get_unix_timestamp(),
        )
    }

    /// Submits a raw reading for rate-of-change tracking.
    pub fn rate(&mut self, name: &str, value: f64, tags: TagSet) -> Result<(), AggregateError> {
        self.submit_metric(name, MetricKind::Rate, MetricSample::new(value), tags, None, None, get_unix_timestamp())
    }

    /// Submits a histogram sample.
    pub fn histogram(&mut self, name: &str, value: f64, tags: TagSet) -> Result<(), AggregateError> {
        self.submit_metric(
            name,
            MetricKind::Histogram,
            MetricSample::new(value),
            tags,
            None,
            None,
            get_unix_timestamp(),
        )
    }

    /// Submits a set member.
    pub fn set<V: Into<String>>(&mut self, name: &str, value: V, tags: TagSet) -> Result<(), AggregateError> {
        self.submit_metric(
            name,
            MetricKind::Set,
            MetricSample::new(value.into()),
            tags,
            None,
            None,
            get_unix_timestamp(),
        )
    }

    /// Submits a raw packet of newline-separated wire lines.
    ///
    /// A line that fails to decode — or that resubmits a context under a conflicting kind — is dropped and counted;
    /// the remaining lines of the packet are still processed.
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

    /// Flushes all aggregated state into a flat list of points.
    ///
    /// Contexts idle past the expiry period are removed without a final point. Stale-point discards since the
    /// previous flush are summarized in a single warning.
    pub fn flush(&mut self, current_time: u64) -> Vec<Point> {
        let expiry_cutoff = current_time.saturating_sub(self.expiry_seconds);
        let expired = self.contexts.drain_expired(expiry_cutoff);
        if !expired.is_empty() {
            for context in &expired {
                debug!(%context, expiry_seconds = self.expiry_seconds, "Context went idle past expiry. Removing.");
            }
            self.stats.contexts_expired += expired.len() as u64;
        }

        let mut points = Vec::new();
        for (context, entry) in self.contexts.iter_mut() {
            entry.state.flush(context, current_time, self.interval, &mut points);
        }

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

    /// Drains all pending events.
    pub fn flush_events(&mut self) -> Vec<EventD> {
        std::mem::take(&mut self.events)
    }

    /// Drains all pending service checks.
    pub fn flush_service_checks(&mut self) -> Vec<ServiceCheck> {
        std::mem::take(&mut self.service_checks)
    }
}

/// Clamps a sample rate into `(0, 1]`.
pub(crate) fn clamp_sample_rate(sample_rate: f64) -> f64 {
    if sample_rate > 0.0 && sample_rate <= 1.0 {
        sample_rate
    } else {
        1.0
    }
}

pub(crate) fn resolve_host(tag_host: Option<String>, explicit: Option<&str>, default: &str) -> Option<String> {
    let host = match tag_host {
        Some(host) => host,
        None => match explicit {
            Some(host) => host.to_string(),
            None => default.to_string(),
        },
    };

    // An empty host explicitly clears the field rather than naming a host.
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

pub(crate) fn resolve_device(tag_device: Option<String>, explicit: Option<&str>) -> Option<String> {
    let device = match tag_device {
        Some(device) => device,
        None => explicit.map(str::to_string).unwrap_or_default(),
    };

    if device.is_empty() {
        None
    } else {
        Some(device)
    }
}

pub(crate) fn samples_from_packet(packet: MetricPacket<'_>) -> (String, MetricKind, TagSet, SmallVec<[MetricSample; 2]>) {
    let name = packet.metric_name.to_string();
    let kind = packet.values.metric_kind();
    let tags = packet.tags.into_iter().collect::<TagSet>();

    let mut samples = SmallVec::new();
    match packet.values {
        MetricValues::Set(value) => {
            samples.push(
                MetricSample::new(value)
                    .with_sample_rate(packet.sample_rate)
                    .with_timestamp(packet.timestamp),
            );
        }
        MetricValues::Gauge(values) | MetricValues::Counter(values) | MetricValues::Histogram(values) => {
            for value in values {
                samples.push(
                    MetricSample::new(value)
                        .with_sample_rate(packet.sample_rate)
                        .with_timestamp(packet.timestamp),
                );
            }
        }
    }

    (name, kind, tags, samples)
}

pub(crate) fn eventd_from_packet(packet: EventPacket<'_>) -> EventD {
    let tags = packet.tags.into_iter().collect::<TagSet>();
    EventD::new(packet.title, packet.text)
        .with_timestamp(packet.timestamp)
        .with_hostname(packet.hostname.map(str::to_string))
        .with_aggregation_key(packet.aggregation_key.map(str::to_string))
        .with_priority(packet.priority)
        .with_alert_type(packet.alert_type)
        .with_source_type_name(packet.source_type_name.map(str::to_string))
        .with_tags(tags)
}

pub(crate) fn service_check_from_packet(packet: ServiceCheckPacket<'_>) -> ServiceCheck {
    let tags = packet.tags.into_iter().collect::<TagSet>();
    ServiceCheck::new(packet.name, packet.status)
        .with_timestamp(packet.timestamp)
        .with_hostname(packet.hostname.map(str::to_string))
        .with_message(packet.message)
        .with_tags(tags)
}

#[cfg(test)]
mod tests {
    use float_cmp::assert_approx_eq;
    use tally_event::{CheckStatus, PointKind, SampleValue};

    use super::*;
    use crate::{config::AggregatorConfiguration, time::get_unix_timestamp};

    const INTERVAL: f64 = 10.0;
    const EXPIRY_SECONDS: u64 = 300;
    const SUBMIT_TS: u64 = 1_700_000_000;
    const FLUSH_TS: u64 = SUBMIT_TS + 10;

    fn aggregator() -> Aggregator {
        AggregatorConfiguration::with_hostname("testhost")
            .with_interval(INTERVAL)
            .with_expiry_seconds(EXPIRY_SECONDS)
            .build()
            .expect("configuration should be valid")
    }

    #[test]
    fn counter_rate_law() {
        let mut agg = aggregator();

        for _ in 0..3 {
            agg.submit_packets("foo:5|c", SUBMIT_TS);
        }

        let points = agg.flush(FLUSH_TS);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].metric, "foo");
        assert_eq!(points[0].kind, PointKind::Rate);
        assert_approx_eq!(f64, points[0].value(), 1.5);
        assert_eq!(points[0].interval, Some(INTERVAL));
    }

    #[test]
    fn context_identity_invariant_to_tag_order() {
        let mut agg = aggregator();

        agg.submit_packets("name:1|c|#a:1,b:2", SUBMIT_TS);
        agg.submit_packets("name:1|c|#b:2,a:1", SUBMIT_TS);

        let points = agg.flush(FLUSH_TS);
        assert_eq!(points.len(), 1);
        assert_approx_eq!(f64, points[0].value(), 2.0 / INTERVAL);
    }

    #[test]
    fn flush_is_idempotent_for_per_interval_state() {
        let mut agg = aggregator();

        agg.submit_packets("g:1|g\nh:2|ms\ns:three|s", SUBMIT_TS);

        let points = agg.flush(FLUSH_TS);
        assert!(!points.is_empty());

        // Nothing was submitted since, so nothing is left to emit.
        let points = agg.flush(FLUSH_TS + 10);
        assert!(points.is_empty());
    }

    #[test]
    fn malformed_lines_are_skipped_not_fatal() {
        let mut agg = aggregator();

        agg.submit_packets("utter nonsense\ngood:1|c", SUBMIT_TS);

        let points = agg.flush(FLUSH_TS);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].metric, "good");
        assert_eq!(agg.stats().lines_dropped, 1);
    }

    #[test]
    fn kind_conflict_on_the_wire_drops_the_line() {
        let mut agg = aggregator();

        agg.submit_packets("name:1|c", SUBMIT_TS);
        agg.submit_packets("name:1|g", SUBMIT_TS);

        assert_eq!(agg.stats().lines_dropped, 1);

        let points = agg.flush(FLUSH_TS);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].kind, PointKind::Rate);
    }

    #[test]
    fn kind_conflict_is_loud_for_direct_submission() {
        let mut agg = aggregator();

        agg.submit_metric(
            "name",
            MetricKind::Counter,
            MetricSample::new(1.0),
            TagSet::default(),
            None,
            None,
            SUBMIT_TS,
        )
        .expect("first submission should succeed");

        let err = agg
            .submit_metric(
                "name",
                MetricKind::Gauge,
                MetricSample::new(1.0),
                TagSet::default(),
                None,
                None,
                SUBMIT_TS,
            )
            .unwrap_err();
        assert!(matches!(err, AggregateError::KindConflict { .. }));
    }

    #[test]
    fn stale_timestamps_are_discarded() {
        let mut agg = aggregator();

        let stale = MetricSample::new(1.0).with_timestamp(SUBMIT_TS - 3601);
        agg.submit_metric("old", MetricKind::Gauge, stale, TagSet::default(), None, None, SUBMIT_TS)
            .expect("stale samples are dropped, not errors");

        assert!(agg.flush(FLUSH_TS).is_empty());
        assert_eq!(agg.stats().stale_points_dropped, 1);
    }

    #[test]
    fn wire_timestamps_survive_to_gauge_points() {
        let mut agg = aggregator();

        let line = format!("g:1|g|T{}", SUBMIT_TS - 5);
        agg.submit_packets(&line, SUBMIT_TS);

        let points = agg.flush(FLUSH_TS);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].timestamp(), SUBMIT_TS - 5);
    }

    #[test]
    fn reserved_tags_redirect_to_host_and_device() {
        let mut agg = aggregator();

        agg.submit_packets("disk.used:100|g|#device:sda1,env:prod,host:web-1", SUBMIT_TS);

        let points = agg.flush(FLUSH_TS);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].host.as_deref(), Some("web-1"));
        assert_eq!(points[0].device_name.as_deref(), Some("sda1"));
        let tags = points[0].tags.as_ref().unwrap();
        assert_eq!(tags.len(), 1);
        assert!(tags.has_tag("env:prod"));
    }

    #[test]
    fn empty_host_tag_clears_the_host() {
        let mut agg = aggregator();

        agg.submit_packets("foo:1|g|#host:", SUBMIT_TS);
        agg.submit_packets("bar:1|g", SUBMIT_TS);

        let mut points = agg.flush(FLUSH_TS);
        points.sort_by(|a, b| a.metric.cmp(&b.metric));

        assert_eq!(points[0].metric, "bar");
        assert_eq!(points[0].host.as_deref(), Some("testhost"));
        assert_eq!(points[1].metric, "foo");
        assert_eq!(points[1].host, None);
    }

    #[test]
    fn out_of_range_sample_rate_is_clamped() {
        let mut agg = aggregator();

        agg.submit_packets("foo:1|c|@4", SUBMIT_TS);

        let points = agg.flush(FLUSH_TS);
        assert_approx_eq!(f64, points[0].value(), 1.0 / INTERVAL);
    }

    #[test]
    fn counter_expires_after_zero_value_grace() {
        let mut agg = aggregator();

        agg.submit_packets("foo:5|c", SUBMIT_TS);

        // First flush emits the accumulated rate, later flushes within the expiry window emit zero.
        let points = agg.flush(SUBMIT_TS + 10);
        assert_approx_eq!(f64, points[0].value(), 0.5);

        let points = agg.flush(SUBMIT_TS + 20);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].value(), 0.0);

        // Once idle past the expiry period, the context disappears without a final point.
        let points = agg.flush(SUBMIT_TS + EXPIRY_SECONDS + 1);
        assert!(points.is_empty());
        assert_eq!(agg.stats().contexts_expired, 1);

        // Resubmission starts a brand-new context.
        agg.submit_packets("foo:5|c", SUBMIT_TS + EXPIRY_SECONDS + 2);
        let points = agg.flush(SUBMIT_TS + EXPIRY_SECONDS + 12);
        assert_approx_eq!(f64, points[0].value(), 0.5);
    }

    #[test]
    fn set_cardinality_over_the_wire() {
        let mut agg = aggregator();

        for value in ["a", "b", "a", "c"] {
            agg.submit_packets(&format!("users:{}|s", value), SUBMIT_TS);
        }

        let points = agg.flush(FLUSH_TS);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].value(), 3.0);
    }

    #[test]
    fn multivalue_line_counts_every_sample() {
        let mut agg = aggregator();

        agg.submit_packets("foo:1:2:3|c", SUBMIT_TS);

        let points = agg.flush(FLUSH_TS);
        assert_approx_eq!(f64, points[0].value(), 6.0 / INTERVAL);
    }

    #[test]
    fn namespace_prefix_applies_to_every_point() {
        let mut agg = AggregatorConfiguration::with_hostname("testhost")
            .with_interval(INTERVAL)
            .with_metric_namespace("myapp")
            .build()
            .unwrap();

        agg.submit_packets("latency:5|ms", SUBMIT_TS);

        let points = agg.flush(FLUSH_TS);
        assert!(!points.is_empty());
        for point in points {
            assert!(
                point.metric.starts_with("myapp.latency"),
                "unexpected metric name {}",
                point.metric
            );
        }
    }

    #[test]
    fn events_and_service_checks_route_to_sinks() {
        let mut agg = aggregator();

        agg.submit_packets("_e{5,4}:title|text|h:web-1\n_sc|mysvc|2|m:down", SUBMIT_TS);

        let events = agg.flush_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title(), "title");
        assert_eq!(events[0].hostname(), Some("web-1"));
        assert!(agg.flush_events().is_empty());

        let service_checks = agg.flush_service_checks();
        assert_eq!(service_checks.len(), 1);
        assert_eq!(service_checks[0].status(), CheckStatus::Critical);
        assert_eq!(service_checks[0].message(), Some("down"));
        assert!(agg.flush_service_checks().is_empty());

        // Events and service checks never become points.
        assert!(agg.flush(FLUSH_TS).is_empty());
    }

    #[test]
    fn convenience_methods_cover_every_kind() {
        let mut agg = aggregator();
        let tags = TagSet::default();

        agg.gauge("conv.gauge", 1.0, tags.clone()).unwrap();
        agg.increment("conv.counter", tags.clone()).unwrap();
        agg.decrement("conv.counter", tags.clone()).unwrap();
        agg.count("conv.count", 7.0, tags.clone()).unwrap();
        agg.count_from_counter("conv.monotonic", 100.0, tags.clone()).unwrap();
        agg.count_from_counter("conv.monotonic", 150.0, tags.clone()).unwrap();
        agg.histogram("conv.histogram", 1.0, tags.clone()).unwrap();
        agg.set("conv.set", "member", tags.clone()).unwrap();
        agg.rate("conv.rate", 10.0, tags).unwrap();

        let mut points = agg.flush(get_unix_timestamp() + 1);
        points.sort_by(|a, b| a.metric.cmp(&b.metric));

        let find = |name: &str| {
            points
                .iter()
                .find(|p| p.metric == name)
                .unwrap_or_else(|| panic!("missing point {}", name))
        };

        assert_eq!(find("conv.gauge").value(), 1.0);
        assert_eq!(find("conv.counter").value(), 0.0);
        assert_eq!(find("conv.count").value(), 7.0);
        assert_eq!(find("conv.monotonic").value(), 50.0);
        assert_eq!(find("conv.set").value(), 1.0);
        assert!(points.iter().any(|p| p.metric == "conv.histogram.max"));
    }

    #[test]
    fn non_numeric_direct_submission_is_an_error() {
        let mut agg = aggregator();

        let sample = MetricSample::new(SampleValue::from("oops"));
        let err = agg
            .submit_metric("gauge", MetricKind::Gauge, sample, TagSet::default(), None, None, SUBMIT_TS)
            .unwrap_err();
        assert!(matches!(err, AggregateError::NonNumericValue { .. }));
    }
}
