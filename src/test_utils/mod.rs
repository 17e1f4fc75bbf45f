//! Test-only helpers shared across crate unit tests.
//!
//! This module is only compiled for unit tests and provides a scripted
//! receiving server so transport, shipper and session tests can run against
//! a real socket on an ephemeral localhost port.

pub mod fake_server;

use std::{net::SocketAddr, path::Path, time::Duration};

use crate::config::SessionBuilder;

/// Session settings pointing at `addr` with test-friendly timings.
///
/// Tails `dir/app.log` and keeps the overflow file inside `dir`.
pub fn session_builder(addr: SocketAddr, dir: &Path) -> SessionBuilder {
    SessionBuilder::new()
        .with_host(addr.ip().to_string())
        .with_port(addr.port())
        .with_log_files([dir.join("app.log")])
        .with_client_name("test-client")
        .with_buffer_dir(dir)
        .with_connect_timeout(Duration::from_secs(1))
        .with_confirm_timeout(Duration::from_millis(500))
        .with_reconnect_delay(Duration::from_millis(10))
        .with_poll_interval(Duration::from_millis(20))
        .with_heartbeat_interval(Duration::ZERO)
        .with_drain_delay(Duration::ZERO)
}
