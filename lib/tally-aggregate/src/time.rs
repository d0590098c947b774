//! Wall clock access.
use std::time::SystemTime;

/// Returns the current Unix timestamp, in seconds.
pub fn get_unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
