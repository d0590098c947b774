/// The three message families carried by the wire protocol.
#[derive(Debug, Eq, PartialEq)]
pub enum MessageType {
    /// A metric sample line.
    MetricSample,

    /// An event line.
    Event,

    /// A service check line.
    ServiceCheck,
}

pub const EVENT_PREFIX: &[u8] = b"_e{";
pub const SERVICE_CHECK_PREFIX: &[u8] = b"_sc|";

pub const TIMESTAMP_PREFIX: &[u8] = b"d:";
pub const HOSTNAME_PREFIX: &[u8] = b"h:";
pub const AGGREGATION_KEY_PREFIX: &[u8] = b"k:";
pub const PRIORITY_PREFIX: &[u8] = b"p:";
pub const SOURCE_TYPE_PREFIX: &[u8] = b"s:";
pub const ALERT_TYPE_PREFIX: &[u8] = b"t:";
pub const TAGS_PREFIX: &[u8] = b"#";
pub const SERVICE_CHECK_MESSAGE_PREFIX: &[u8] = b"m:";

/// Unescapes the `\n` sequences that clients use to smuggle newlines through a line-oriented protocol.
pub fn clean_data(s: &str) -> String {
    s.replace("\\n", "\n")
}

/// Determines the message family of a single line.
///
/// Anything that does not carry an event or service check prefix is treated as a metric sample; actually parsing it
/// may of course still fail.
pub fn parse_message_type(data: &[u8]) -> MessageType {
    if data.starts_with(EVENT_PREFIX) {
        return MessageType::Event;
    } else if data.starts_with(SERVICE_CHECK_PREFIX) {
        return MessageType::ServiceCheck;
    }
    MessageType::MetricSample
}
