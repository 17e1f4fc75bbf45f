#![allow(dead_code)]

pub mod collector;

use std::{
    fs::{self, OpenOptions},
    io::Write,
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use logship::SessionBuilder;
use rstest::fixture;
use tempfile::TempDir;

pub use collector::Collector;

/// A scratch directory holding `app.log` and the overflow file.
pub struct Workspace {
    pub dir: TempDir,
    pub log: PathBuf,
}

impl Workspace {
    /// Source tag the client puts in front of lines from `app.log`.
    pub fn tag(&self) -> String {
        self.log.display().to_string()
    }

    pub fn append(&self, text: &str) {
        OpenOptions::new()
            .append(true)
            .open(&self.log)
            .expect("open log")
            .write_all(text.as_bytes())
            .expect("append log");
    }

    /// Settings shipping `app.log` to `addr` with fast timings.
    pub fn session(&self, addr: SocketAddr) -> SessionBuilder {
        builder(addr, self.dir.path(), &self.log)
    }
}

/// Return a workspace whose `app.log` starts empty.
#[fixture]
pub fn workspace() -> Workspace {
    let dir = tempfile::tempdir().expect("temp dir");
    let log = dir.path().join("app.log");
    fs::write(&log, "").expect("create log");
    Workspace { dir, log }
}

fn builder(addr: SocketAddr, dir: &Path, log: &Path) -> SessionBuilder {
    SessionBuilder::new()
        .with_host(addr.ip().to_string())
        .with_port(addr.port())
        .with_log_files([log])
        .with_client_name("it-client")
        .with_buffer_dir(dir)
        .with_connect_timeout(Duration::from_secs(1))
        .with_confirm_timeout(Duration::from_millis(500))
        .with_reconnect_delay(Duration::from_millis(10))
        .with_poll_interval(Duration::from_millis(20))
        .with_heartbeat_interval(Duration::ZERO)
        .with_drain_delay(Duration::ZERO)
}
