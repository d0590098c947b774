use nom::{
    bytes::complete::tag,
    character::complete::u8 as parse_u8,
    combinator::all_consuming,
    error::{Error, ErrorKind},
    sequence::{preceded, separated_pair},
    IResult, Parser as _,
};
use tally_event::CheckStatus;

use super::{
    helpers::{ascii_alphanum_and_seps, split_at_delimiter, unix_timestamp, utf8, RawTags},
    message::*,
    StatsdCodecConfiguration,
};

/// A parsed service check line.
#[derive(Debug)]
pub struct ServiceCheckPacket<'a> {
    /// Name of the check.
    pub name: &'a str,

    /// Status of the check.
    pub status: CheckStatus,

    /// Explicit client timestamp, in seconds since the Unix epoch.
    pub timestamp: Option<u64>,

    /// Hostname the check originated from.
    pub hostname: Option<&'a str>,

    /// Message describing the current state of the check.
    pub message: Option<String>,

    /// Unparsed tags of the check.
    pub tags: RawTags<'a>,
}

/// Parses a service check line.
pub fn parse_statsd_service_check<'a>(
    input: &'a [u8], _config: &StatsdCodecConfiguration,
) -> IResult<&'a [u8], ServiceCheckPacket<'a>> {
    let (remaining, (name, raw_status)) = preceded(
        tag(SERVICE_CHECK_PREFIX),
        separated_pair(ascii_alphanum_and_seps, tag("|"), parse_u8),
    )
    .parse(input)?;

    let status =
        CheckStatus::try_from(raw_status).map_err(|_| nom::Err::Error(Error::new(input, ErrorKind::Verify)))?;

    let mut maybe_timestamp = None;
    let mut maybe_hostname = None;
    let mut maybe_message = None;
    let mut maybe_tags = None;

    if !remaining.is_empty() {
        let (mut rest, _) = tag("|").parse(remaining)?;
        while let Some((chunk, tail)) = split_at_delimiter(rest, b'|') {
            if chunk.len() < 2 {
                break;
            }

            match &chunk[..2] {
                TIMESTAMP_PREFIX => {
                    let (_, timestamp) = all_consuming(preceded(tag(TIMESTAMP_PREFIX), unix_timestamp)).parse(chunk)?;
                    maybe_timestamp = Some(timestamp);
                }
                HOSTNAME_PREFIX => {
                    let (_, hostname) =
                        all_consuming(preceded(tag(HOSTNAME_PREFIX), ascii_alphanum_and_seps)).parse(chunk)?;
                    maybe_hostname = Some(hostname);
                }
                SERVICE_CHECK_MESSAGE_PREFIX => {
                    let (_, message) = all_consuming(preceded(tag(SERVICE_CHECK_MESSAGE_PREFIX), utf8)).parse(chunk)?;
                    maybe_message = Some(clean_data(message));
                }
                _ if chunk.starts_with(TAGS_PREFIX) => {
                    let (_, raw_tags) = utf8(&chunk[1..])?;
                    maybe_tags = Some(RawTags::new(raw_tags));
                }
                _ => {}
            }

            rest = tail;
        }
    }

    let service_check = ServiceCheckPacket {
        name,
        status,
        timestamp: maybe_timestamp,
        hostname: maybe_hostname,
        message: maybe_message,
        tags: maybe_tags.unwrap_or_else(RawTags::empty),
    };
    Ok((&[], service_check))
}
