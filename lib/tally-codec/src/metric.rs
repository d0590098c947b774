use memchr::memchr;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    combinator::all_consuming,
    error::{Error, ErrorKind},
    number::complete::double,
    sequence::{preceded, terminated},
    IResult, Parser as _,
};
use smallvec::SmallVec;
use tally_event::MetricKind;

use super::{
    helpers::{ascii_alphanum_and_seps, permissive_metric_name, split_at_delimiter, unix_timestamp, utf8, RawTags},
    StatsdCodecConfiguration,
};

/// The values carried by one value group of a metric line.
///
/// The variant is determined by the group's wire type code, making the code-to-kind mapping a closed, static lookup:
/// `g` is a gauge, `c` a counter, `h` and `ms` histograms, and `s` a set. A set group keeps its raw string; every
/// other group carries one or more numeric values.
#[derive(Debug, PartialEq)]
pub enum MetricValues<'a> {
    /// Gauge values.
    Gauge(SmallVec<[f64; 2]>),

    /// Counter values.
    Counter(SmallVec<[f64; 2]>),

    /// Histogram values.
    Histogram(SmallVec<[f64; 2]>),

    /// A set member.
    Set(&'a str),
}

impl MetricValues<'_> {
    /// Returns the metric kind these values map to.
    pub fn metric_kind(&self) -> MetricKind {
        match self {
            Self::Gauge(_) => MetricKind::Gauge,
            Self::Counter(_) => MetricKind::Counter,
            Self::Histogram(_) => MetricKind::Histogram,
            Self::Set(_) => MetricKind::Set,
        }
    }

    /// Returns the number of individual samples these values represent.
    pub fn num_points(&self) -> u64 {
        match self {
            Self::Gauge(values) | Self::Counter(values) | Self::Histogram(values) => values.len() as u64,
            Self::Set(_) => 1,
        }
    }
}

/// A single parsed metric sample group.
///
/// One line produces one packet per value group it carries, all sharing the metric name.
#[derive(Debug)]
pub struct MetricPacket<'a> {
    /// Name of the metric.
    pub metric_name: &'a str,

    /// The values of the group, tagged by wire type.
    pub values: MetricValues<'a>,

    /// Client sample rate, as sent. Defaults to 1 when absent.
    pub sample_rate: f64,

    /// Explicit client timestamp, in seconds since the Unix epoch.
    pub timestamp: Option<u64>,

    /// Unparsed tags of the group.
    pub tags: RawTags<'a>,
}

/// Parses a metric sample line into its value groups.
///
/// Returns one [`MetricPacket`] per value group carried by the line.
#[inline]
pub fn parse_statsd_metric<'a>(
    input: &'a [u8], config: &StatsdCodecConfiguration,
) -> IResult<&'a [u8], SmallVec<[MetricPacket<'a>; 2]>> {
    let metric_name_parser = if config.permissive {
        permissive_metric_name
    } else {
        ascii_alphanum_and_seps
    };
    let (remaining, metric_name) = terminated(metric_name_parser, tag(":")).parse(input)?;
    if remaining.is_empty() {
        return Err(nom::Err::Error(Error::new(remaining, ErrorKind::TakeWhile1)));
    }

    let mut packets = SmallVec::new();
    for group in split_value_groups(remaining) {
        let (_, packet) = parse_value_group(group, metric_name, config)?;
        packets.push(packet);
    }

    Ok((&[], packets))
}

/// Splits the post-name portion of a metric line into value groups.
///
/// One line may carry several `value|type|...` groups separated by colons, while both a group's value run and its
/// tag values may themselves contain colons. A colon is therefore a group boundary only once the current group has
/// seen its `|` separator, and only when the fragment that follows carries a `|` of its own: anything else is either
/// another value of a multi-value run or the colon-bearing continuation of a tag value, and stays in the current
/// group.
fn split_value_groups(input: &[u8]) -> SmallVec<[&[u8]; 2]> {
    let mut groups = SmallVec::new();
    let mut group_start = 0;
    let mut seen_pipe = false;

    let mut idx = 0;
    while idx < input.len() {
        match input[idx] {
            b'|' => seen_pipe = true,
            b':' if seen_pipe => {
                let fragment_end = memchr(b':', &input[idx + 1..])
                    .map(|pos| idx + 1 + pos)
                    .unwrap_or(input.len());
                if memchr(b'|', &input[idx + 1..fragment_end]).is_some() {
                    groups.push(&input[group_start..idx]);
                    group_start = idx + 1;
                    seen_pipe = false;
                }
            }
            _ => {}
        }
        idx += 1;
    }

    groups.push(&input[group_start..]);
    groups
}

fn parse_value_group<'a>(
    group: &'a [u8], metric_name: &'a str, config: &StatsdCodecConfiguration,
) -> IResult<&'a [u8], MetricPacket<'a>> {
    let (remaining, raw_values) = terminated(take_while1(|b| b != b'|'), tag("|")).parse(group)?;
    let (remaining, raw_kind) = alt((tag("g"), tag("c"), tag("ms"), tag("h"), tag("s"))).parse(remaining)?;

    let (_, raw_values) = utf8(raw_values)?;

    // Whatever follows the type code is a pipe-separated list of extensions: sample rate, tags, and an optional
    // explicit timestamp. Unknown extensions are skipped.
    let mut sample_rate = 1.0;
    let mut maybe_timestamp = None;
    let mut tags = RawTags::empty();

    if !remaining.is_empty() {
        let (mut rest, _) = tag("|").parse(remaining)?;
        while let Some((chunk, tail)) = split_at_delimiter(rest, b'|') {
            if chunk.is_empty() {
                break;
            }

            match chunk[0] {
                b'@' => {
                    let (_, rate) = all_consuming(preceded(tag("@"), double)).parse(chunk)?;
                    sample_rate = rate;
                }
                b'#' => {
                    let (_, raw_tags) = utf8(&chunk[1..])?;
                    tags = RawTags::new(raw_tags);
                }
                b'T' => {
                    if config.timestamps {
                        let (_, timestamp) = all_consuming(preceded(tag("T"), unix_timestamp)).parse(chunk)?;
                        maybe_timestamp = Some(timestamp);
                    }
                }
                _ => {}
            }

            rest = tail;
        }
    }

    let values = match raw_kind {
        b"g" => MetricValues::Gauge(parse_float_run(raw_values, group)?),
        b"c" => MetricValues::Counter(parse_float_run(raw_values, group)?),
        b"h" | b"ms" => MetricValues::Histogram(parse_float_run(raw_values, group)?),
        b"s" => MetricValues::Set(raw_values),
        _ => unreachable!("constrained by the alt parser"),
    };

    Ok((
        &[],
        MetricPacket {
            metric_name,
            values,
            sample_rate,
            timestamp: maybe_timestamp,
            tags,
        },
    ))
}

fn parse_float_run<'a>(run: &str, raw_group: &'a [u8]) -> Result<SmallVec<[f64; 2]>, nom::Err<Error<&'a [u8]>>> {
    let mut values = SmallVec::new();
    for raw_value in run.split(':') {
        match raw_value.parse::<f64>() {
            Ok(value) => values.push(value),
            Err(_) => return Err(nom::Err::Error(Error::new(raw_group, ErrorKind::Float))),
        }
    }
    Ok(values)
}
