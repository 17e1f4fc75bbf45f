//! Per-line delivery with echo confirmation.
//!
//! Each line is written as `"[<source>] <line>\n"` and the server is expected
//! to answer with the same bytes. There is no framing beyond the newline, so a
//! reply split across TCP segments reads as a short reply and fails the send;
//! the line is then replayed after reconnecting (at-least-once delivery).

use std::{
    io::{Read, Write},
    time::Duration,
};

use crate::{error::ShipError, transport::Connection};

/// Largest reply accepted beyond the size of the line itself.
const REPLY_SLACK: usize = 1024;

/// Render `line` in wire format, ensuring exactly one trailing newline is
/// present.
pub fn format_line(source: &str, line: &str) -> String {
    let mut formatted = format!("[{source}] {line}");
    if !formatted.ends_with('\n') {
        formatted.push('\n');
    }
    formatted
}

/// Compare the echoed reply against what was sent, ignoring trailing
/// whitespace on both sides.
pub fn confirms(sent: &[u8], reply: &[u8]) -> bool {
    sent.trim_ascii_end() == reply.trim_ascii_end()
}

/// Ship one line and wait for its confirmation.
///
/// The read uses `confirm_timeout` and restores the connection's previous
/// read timeout afterwards. Any error means the connection must be dropped
/// by the caller; nothing is retried here.
pub fn send(
    conn: &mut Connection,
    source: &str,
    line: &str,
    confirm_timeout: Duration,
) -> Result<(), ShipError> {
    let formatted = format_line(source, line);
    conn.write_all(formatted.as_bytes())?;
    conn.flush()?;

    let previous = conn.read_timeout()?;
    conn.set_read_timeout(Some(confirm_timeout))?;
    let mut reply = vec![0u8; formatted.len() + REPLY_SLACK];
    let read = conn.read(&mut reply);
    conn.set_read_timeout(previous)?;
    let read = read?;

    if confirms(formatted.as_bytes(), &reply[..read]) {
        Ok(())
    } else {
        Err(ShipError::ConfirmationMismatch {
            sent: formatted.trim_end().to_owned(),
            received: String::from_utf8_lossy(&reply[..read]).trim_end().to_owned(),
        })
    }
}
