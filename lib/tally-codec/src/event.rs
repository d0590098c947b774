use nom::{
    bytes::complete::{tag, take},
    character::complete::u32 as parse_u32,
    combinator::all_consuming,
    error::{Error, ErrorKind},
    sequence::{delimited, preceded, separated_pair},
    IResult, Parser as _,
};
use tally_event::{AlertType, Priority};

use super::{
    helpers::{ascii_alphanum_and_seps, split_at_delimiter, unix_timestamp, utf8, RawTags},
    message::*,
    StatsdCodecConfiguration,
};

/// A parsed event line.
#[derive(Debug)]
pub struct EventPacket<'a> {
    /// Title of the event.
    pub title: String,

    /// Body text of the event.
    pub text: String,

    /// Explicit client timestamp, in seconds since the Unix epoch.
    pub timestamp: Option<u64>,

    /// Hostname the event originated from.
    pub hostname: Option<&'a str>,

    /// Key used to group this event with others.
    pub aggregation_key: Option<&'a str>,

    /// Priority of the event.
    pub priority: Option<Priority>,

    /// Alert type of the event.
    pub alert_type: Option<AlertType>,

    /// Source type name of the event.
    pub source_type_name: Option<&'a str>,

    /// Unparsed tags of the event.
    pub tags: RawTags<'a>,
}

/// Parses an event line.
pub fn parse_statsd_event<'a>(
    input: &'a [u8], _config: &StatsdCodecConfiguration,
) -> IResult<&'a [u8], EventPacket<'a>> {
    // The header carries the byte lengths of the title and text: `_e{<TITLE_LENGTH>,<TEXT_LENGTH>}:`.
    let (remaining, (title_len, text_len)) = delimited(
        tag(EVENT_PREFIX),
        separated_pair(parse_u32, tag(","), parse_u32),
        tag("}:"),
    )
    .parse(input)?;

    // Title and text are the required fields of an event.
    if title_len == 0 || text_len == 0 {
        return Err(nom::Err::Error(Error::new(input, ErrorKind::Verify)));
    }

    let (remaining, (raw_title, raw_text)) =
        separated_pair(take(title_len), tag("|"), take(text_len)).parse(remaining)?;

    let title = match simdutf8::basic::from_utf8(raw_title) {
        Ok(title) => clean_data(title),
        Err(_) => return Err(nom::Err::Error(Error::new(raw_title, ErrorKind::Verify))),
    };

    let text = match simdutf8::basic::from_utf8(raw_text) {
        Ok(text) => clean_data(text),
        Err(_) => return Err(nom::Err::Error(Error::new(raw_text, ErrorKind::Verify))),
    };

    // Everything else is an optional pipe-separated extension. Priority and alert type have defaults.
    let mut maybe_priority = Some(Priority::Normal);
    let mut maybe_alert_type = Some(AlertType::Info);
    let mut maybe_timestamp = None;
    let mut maybe_hostname = None;
    let mut maybe_aggregation_key = None;
    let mut maybe_source_type = None;
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
                AGGREGATION_KEY_PREFIX => {
                    let (_, aggregation_key) =
                        all_consuming(preceded(tag(AGGREGATION_KEY_PREFIX), ascii_alphanum_and_seps)).parse(chunk)?;
                    maybe_aggregation_key = Some(aggregation_key);
                }
                PRIORITY_PREFIX => {
                    let (_, priority) =
                        all_consuming(preceded(tag(PRIORITY_PREFIX), ascii_alphanum_and_seps)).parse(chunk)?;
                    maybe_priority = Priority::try_from_string(priority);
                }
                SOURCE_TYPE_PREFIX => {
                    let (_, source_type) =
                        all_consuming(preceded(tag(SOURCE_TYPE_PREFIX), ascii_alphanum_and_seps)).parse(chunk)?;
                    maybe_source_type = Some(source_type);
                }
                ALERT_TYPE_PREFIX => {
                    let (_, alert_type) =
                        all_consuming(preceded(tag(ALERT_TYPE_PREFIX), ascii_alphanum_and_seps)).parse(chunk)?;
                    maybe_alert_type = AlertType::try_from_string(alert_type);
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

    let event = EventPacket {
        title,
        text,
        timestamp: maybe_timestamp,
        hostname: maybe_hostname,
        aggregation_key: maybe_aggregation_key,
        priority: maybe_priority,
        alert_type: maybe_alert_type,
        source_type_name: maybe_source_type,
        tags: maybe_tags.unwrap_or_else(RawTags::empty),
    };
    Ok((&[], event))
}

#[cfg(test)]
mod tests {
    use tally_event::{AlertType, Priority};

    use super::{parse_statsd_event, EventPacket};
    use crate::StatsdCodecConfiguration;

    fn parse(input: &[u8]) -> Result<EventPacket<'_>, nom::Err<nom::error::Error<&[u8]>>> {
        let config = StatsdCodecConfiguration::default();
        let (remaining, packet) = parse_statsd_event(input, &config)?;
        assert!(remaining.is_empty());
        Ok(packet)
    }

    #[test]
    fn basic_event() {
        let packet = parse(b"_e{5,4}:title|text").expect("should not fail to parse");
        assert_eq!(packet.title, "title");
        assert_eq!(packet.text, "text");
        assert_eq!(packet.priority, Some(Priority::Normal));
        assert_eq!(packet.alert_type, Some(AlertType::Info));
        assert_eq!(packet.timestamp, None);
    }

    #[test]
    fn event_with_newline_escapes() {
        // The declared text length counts the escaped form (12 bytes), not the unescaped one.
        let packet = parse(b"_e{5,12}:title|line1\\nline2").expect("should not fail to parse");
        assert_eq!(packet.text, "line1\nline2");
    }

    #[test]
    fn event_with_extensions() {
        let raw = b"_e{5,4}:title|text|d:1234567890|h:myhost|k:aggkey|p:low|s:mysource|t:error|#tag1,tag2:value";
        let packet = parse(raw).expect("should not fail to parse");

        assert_eq!(packet.timestamp, Some(1234567890));
        assert_eq!(packet.hostname, Some("myhost"));
        assert_eq!(packet.aggregation_key, Some("aggkey"));
        assert_eq!(packet.priority, Some(Priority::Low));
        assert_eq!(packet.source_type_name, Some("mysource"));
        assert_eq!(packet.alert_type, Some(AlertType::Error));

        let tags = packet.tags.into_iter().collect::<Vec<_>>();
        assert_eq!(tags, vec!["tag1", "tag2:value"]);
    }

    #[test]
    fn event_with_zero_lengths_is_rejected() {
        assert!(parse(b"_e{0,4}:|text").is_err());
        assert!(parse(b"_e{5,0}:title|").is_err());
    }

    #[test]
    fn event_with_wrong_lengths_is_rejected() {
        assert!(parse(b"_e{50,4}:title|text").is_err());
    }
}
