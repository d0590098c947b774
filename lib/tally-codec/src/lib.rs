//! Wire codec for the statsd-style line protocol.
//!
//! The codec turns a single line of a packet into a structured record: one or more metric sample groups, an event,
//! or a service check. It holds no state — framing (splitting a datagram into lines) and aggregation are the
//! caller's concern.
//!
//! ## Metric line grammar
//!
//! `<name>:<value>[:<value>...]|<type>[|@<sample_rate>][|#<tag>,...][|T<timestamp>]`
//!
//! A single line may carry several value groups for the same name, each group terminated by its own
//! `|type|...` suffix. Tag values may contain colons; the group splitter keeps them intact.
#![deny(warnings)]
#![deny(missing_docs)]

use smallvec::SmallVec;
use snafu::Snafu;

mod message;
pub use self::message::{parse_message_type, MessageType};

mod helpers;
pub use self::helpers::{RawTags, RawTagsIter};

mod metric;
pub use self::metric::{parse_statsd_metric, MetricPacket, MetricValues};

mod event;
pub use self::event::{parse_statsd_event, EventPacket};

mod service_check;
pub use self::service_check::{parse_statsd_service_check, ServiceCheckPacket};

type NomParserError<'a> = nom::Err<nom::error::Error<&'a [u8]>>;

/// Error produced when a line cannot be parsed.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum ParseError {
    /// The line was structurally invalid.
    #[snafu(display("encountered error '{:?}' while processing line '{}'", kind, data))]
    Structural {
        /// The parser error kind.
        kind: nom::error::ErrorKind,

        /// The offending portion of the line.
        data: String,
    },
}

impl<'a> From<NomParserError<'a>> for ParseError {
    fn from(err: NomParserError<'a>) -> Self {
        match err {
            nom::Err::Error(e) | nom::Err::Failure(e) => ParseError::Structural {
                kind: e.code,
                data: String::from_utf8_lossy(e.input).to_string(),
            },
            nom::Err::Incomplete(_) => unreachable!("codec only supports complete lines"),
        }
    }
}

/// Codec configuration.
#[derive(Clone, Debug)]
pub struct StatsdCodecConfiguration {
    permissive: bool,
    timestamps: bool,
}

impl StatsdCodecConfiguration {
    /// Sets whether or not the codec operates in permissive mode.
    ///
    /// In permissive mode, metric names may contain any printable ASCII character other than the `:` delimiter,
    /// rather than the conventional alphanumerics-and-separators set. This allows decoding payloads from clients
    /// that take liberties with naming, at the cost of letting through names that downstream systems may reject.
    ///
    /// Defaults to `false`.
    pub fn with_permissive_mode(mut self, permissive: bool) -> Self {
        self.permissive = permissive;
        self
    }

    /// Sets whether or not explicit timestamps are read from metric lines.
    ///
    /// When disabled, a `T<timestamp>` extension is consumed but ignored, so every sample is attributed to its
    /// arrival time.
    ///
    /// Defaults to `true`.
    pub fn with_timestamps(mut self, timestamps: bool) -> Self {
        self.timestamps = timestamps;
        self
    }
}

impl Default for StatsdCodecConfiguration {
    fn default() -> Self {
        Self {
            permissive: false,
            timestamps: true,
        }
    }
}

/// A parsed line.
#[derive(Debug)]
pub enum StatsdPacket<'a> {
    /// Metric sample groups. A line carries at least one, and one per additional value group.
    Metrics(SmallVec<[MetricPacket<'a>; 2]>),

    /// An event.
    Event(EventPacket<'a>),

    /// A service check.
    ServiceCheck(ServiceCheckPacket<'a>),
}

/// A statsd-style line codec.
#[derive(Clone, Debug, Default)]
pub struct StatsdCodec {
    config: StatsdCodecConfiguration,
}

impl StatsdCodec {
    /// Creates a codec with the given configuration.
    pub fn from_configuration(config: StatsdCodecConfiguration) -> Self {
        Self { config }
    }

    /// Decodes a single line.
    ///
    /// The message family is chosen by prefix: `_e{` for events, `_sc|` for service checks, and anything else is
    /// treated as a metric sample line.
    pub fn decode_line<'a>(&self, data: &'a [u8]) -> Result<StatsdPacket<'a>, ParseError> {
        match parse_message_type(data) {
            MessageType::Event => {
                let (_, packet) = parse_statsd_event(data, &self.config)?;
                Ok(StatsdPacket::Event(packet))
            }
            MessageType::ServiceCheck => {
                let (_, packet) = parse_statsd_service_check(data, &self.config)?;
                Ok(StatsdPacket::ServiceCheck(packet))
            }
            MessageType::MetricSample => {
                let (_, packets) = parse_statsd_metric(data, &self.config)?;
                Ok(StatsdPacket::Metrics(packets))
            }
        }
    }
}
