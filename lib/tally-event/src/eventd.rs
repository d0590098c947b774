//! Events.
use std::fmt;

use tally_context::TagSet;

/// Alert type of an event.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AlertType {
    /// Indicates an informational event.
    Info,

    /// Indicates an error event.
    Error,

    /// Indicates a warning event.
    Warning,

    /// Indicates a successful event.
    Success,
}

impl AlertType {
    /// Attempts to parse an alert type from its wire representation.
    pub fn try_from_string(s: &str) -> Option<Self> {
        match s {
            "info" => Some(Self::Info),
            "error" => Some(Self::Error),
            "warning" => Some(Self::Warning),
            "success" => Some(Self::Success),
            _ => None,
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Info => "info",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Success => "success",
        };
        write!(f, "{}", s)
    }
}

/// Priority of an event.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Priority {
    /// The event has normal priority.
    Normal,

    /// The event has low priority.
    Low,
}

impl Priority {
    /// Attempts to parse a priority from its wire representation.
    pub fn try_from_string(s: &str) -> Option<Self> {
        match s {
            "normal" => Some(Self::Normal),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Normal => "normal",
            Self::Low => "low",
        };
        write!(f, "{}", s)
    }
}

/// An event.
///
/// Events represent a point-in-time occurrence — a deploy, an error burst, a state change — rather than a sampled
/// quantity. They bypass metric aggregation entirely and are handed to the event sink as-is.
#[derive(Clone, Debug)]
pub struct EventD {
    title: String,
    text: String,
    timestamp: Option<u64>,
    hostname: Option<String>,
    aggregation_key: Option<String>,
    priority: Option<Priority>,
    source_type_name: Option<String>,
    alert_type: Option<AlertType>,
    tags: TagSet,
}

impl EventD {
    /// Creates a new `EventD` with the given title and text.
    pub fn new<S1: Into<String>, S2: Into<String>>(title: S1, text: S2) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
            timestamp: None,
            hostname: None,
            aggregation_key: None,
            priority: None,
            source_type_name: None,
            alert_type: None,
            tags: TagSet::default(),
        }
    }

    /// Returns the title of the event.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the text of the event.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the timestamp of the event, in seconds since the Unix epoch.
    pub fn timestamp(&self) -> Option<u64> {
        self.timestamp
    }

    /// Returns the host where the event originated from.
    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    /// Returns the key used to group this event with others.
    pub fn aggregation_key(&self) -> Option<&str> {
        self.aggregation_key.as_deref()
    }

    /// Returns the priority of the event.
    pub fn priority(&self) -> Option<Priority> {
        self.priority
    }

    /// Returns the source type name of the event.
    pub fn source_type_name(&self) -> Option<&str> {
        self.source_type_name.as_deref()
    }

    /// Returns the alert type of the event.
    pub fn alert_type(&self) -> Option<AlertType> {
        self.alert_type
    }

    /// Returns the tags associated with the event.
    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    /// Sets the timestamp, in seconds since the Unix epoch.
    pub fn with_timestamp(mut self, timestamp: impl Into<Option<u64>>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    /// Sets the hostname.
    pub fn with_hostname(mut self, hostname: impl Into<Option<String>>) -> Self {
        self.hostname = hostname.into();
        self
    }

    /// Sets the aggregation key.
    pub fn with_aggregation_key(mut self, aggregation_key: impl Into<Option<String>>) -> Self {
        self.aggregation_key = aggregation_key.into();
        self
    }

    /// Sets the priority.
    pub fn with_priority(mut self, priority: impl Into<Option<Priority>>) -> Self {
        self.priority = priority.into();
        self
    }

    /// Sets the source type name.
    pub fn with_source_type_name(mut self, source_type_name: impl Into<Option<String>>) -> Self {
        self.source_type_name = source_type_name.into();
        self
    }

    /// Sets the alert type.
    pub fn with_alert_type(mut self, alert_type: impl Into<Option<AlertType>>) -> Self {
        self.alert_type = alert_type.into();
        self
    }

    /// Sets the tags.
    pub fn with_tags(mut self, tags: TagSet) -> Self {
        self.tags = tags;
        self
    }
}
