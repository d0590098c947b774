//! Service checks.
use std::fmt;

use tally_context::TagSet;

/// Status of a service check.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CheckStatus {
    /// The service is operating normally.
    Ok,

    /// The service is degraded.
    Warning,

    /// The service is unavailable.
    Critical,

    /// The status of the service could not be determined.
    Unknown,
}

impl CheckStatus {
    /// Returns the numeric wire representation of the status.
    pub const fn as_u8(&self) -> u8 {
        match self {
            Self::Ok => 0,
            Self::Warning => 1,
            Self::Critical => 2,
            Self::Unknown => 3,
        }
    }
}

impl TryFrom<u8> for CheckStatus {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Ok),
            1 => Ok(Self::Warning),
            2 => Ok(Self::Critical),
            3 => Ok(Self::Unknown),
            other => Err(other),
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ok => "ok",
            Self::Warning => "warning",
            Self::Critical => "critical",
            Self::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// A service check.
///
/// Service checks report the health of a named service at a point in time. Like events, they bypass metric
/// aggregation and are handed to their sink as-is.
#[derive(Clone, Debug)]
pub struct ServiceCheck {
    name: String,
    status: CheckStatus,
    timestamp: Option<u64>,
    hostname: Option<String>,
    message: Option<String>,
    tags: TagSet,
}

impl ServiceCheck {
    /// Creates a new `ServiceCheck` with the given name and status.
    pub fn new<S: Into<String>>(name: S, status: CheckStatus) -> Self {
        Self {
            name: name.into(),
            status,
            timestamp: None,
            hostname: None,
            message: None,
            tags: TagSet::default(),
        }
    }

    /// Returns the name of the check.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the status of the check.
    pub fn status(&self) -> CheckStatus {
        self.status
    }

    /// Returns the timestamp of the check, in seconds since the Unix epoch.
    pub fn timestamp(&self) -> Option<u64> {
        self.timestamp
    }

    /// Returns the host where the check originated from.
    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    /// Returns the message describing the current state of the check.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns the tags associated with the check.
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

    /// Sets the message.
    pub fn with_message(mut self, message: impl Into<Option<String>>) -> Self {
        self.message = message.into();
        self
    }

    /// Sets the tags.
    pub fn with_tags(mut self, tags: TagSet) -> Self {
        self.tags = tags;
        self
    }
}
