//! Constants for the download module (timeouts, pacing).

use std::time::Duration;

/// Default HTTP connect timeout.
pub const CONNECT_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Default HTTP read timeout.
pub const READ_TIMEOUT: Duration = Duration::from_millis(60_000);

/// Default pause between two full fetches from the same host.
pub const DOWNLOAD_DELAY: Duration = Duration::from_secs(1);

/// Warning threshold for cumulative pacing delay per host.
pub const CUMULATIVE_DELAY_WARNING_THRESHOLD: Duration = Duration::from_secs(300);

/// Suffix of the temporary file a transfer is streamed into.
pub const PARTIAL_SUFFIX: &str = ".part";
