//! Session configuration.
//!
//! A [`Session`] is assembled once per run by layering three sources:
//! built-in defaults, an optional INI file ([`FileConfig`]), and overrides
//! supplied on the command line. [`SessionBuilder`] performs the merge and
//! validation; the resulting `Session` is immutable.

mod file;
mod sample;
mod session;

pub use file::FileConfig;
pub use sample::{SAMPLE_CONFIG, write_sample_config};
pub use session::{Session, SessionBuilder, password_digest};

use std::time::Duration;

/// Default TCP port of the receiving server.
pub const DEFAULT_PORT: u16 = 9999;
/// Default number of backlog lines read from each file at start-up.
pub const DEFAULT_TAIL_LINES: usize = 10;
/// Default in-memory retry queue capacity.
pub const DEFAULT_BUFFER_SIZE: usize = 1000;
/// Default cap on consecutive reconnect attempts.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 10;
/// Default base delay between reconnect attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);
/// Ceiling applied to the growing reconnect delay.
pub const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(300);
/// Default interval between file polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
/// Default idle period after which a heartbeat is sent.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);
/// Timeout applied when opening the TCP connection and during the handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Timeout applied while waiting for a line's echo confirmation.
pub const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(5);
/// Pause inserted between replayed sends.
pub const DEFAULT_DRAIN_DELAY: Duration = Duration::from_millis(10);
/// Default text encoding label.
pub const DEFAULT_ENCODING: &str = "utf-8";

/// Parse a boolean the way INI files in the field spell them.
pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a duration expressed in (possibly fractional) seconds.
pub(crate) fn parse_seconds(value: &str) -> Option<Duration> {
    let secs: f64 = value.trim().parse().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}
