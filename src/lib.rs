//! Reliable log shipping.
//!
//! Tails local log files and ships every line to a remote collector over TCP
//! (optionally TLS), waiting for the collector to echo each line back before
//! moving on. Lines that cannot be delivered are kept in a bounded memory
//! queue that overflows into a gzip file, and are replayed in order once the
//! connection comes back.

pub mod buffer;
pub mod config;
pub mod error;
pub mod line;
pub mod rate_limited_warner;
pub mod reconnect;
pub mod session;
pub mod shipper;
pub mod source;
pub mod tail;
pub mod transport;

#[cfg(test)]
mod test_utils;

pub use buffer::{DrainOutcome, RetryBuffer};
pub use config::{FileConfig, Session, SessionBuilder};
pub use error::{ConfigError, ShipError, TailError};
pub use line::{BufferedLine, SystemMarker};
pub use session::{SessionEvent, SessionHandle, SessionOutcome, ShippingSession, StopToken};
pub use source::{FileTailSource, LineSource};
