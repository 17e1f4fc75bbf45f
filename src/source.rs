//! Producers of [`BufferedLine`]s.
//!
//! The shipping worker does not care where lines come from. File tailing is
//! one producer; anything that can enumerate events (an OS event log, a
//! service poller) plugs in by implementing [`LineSource`].

use log::{info, warn};

use crate::{
    config::Session,
    line::BufferedLine,
    tail::{FileWatcher, PollWatcher, last_lines},
};

/// A pluggable producer polled once per worker tick.
pub trait LineSource: Send {
    /// Lines to ship once at start-up, before incremental production.
    fn backlog(&mut self) -> Vec<BufferedLine> {
        Vec::new()
    }

    /// Lines produced since the previous call, in production order.
    fn produce(&mut self) -> Vec<BufferedLine>;

    /// Release any resources held by the producer.
    fn close(&mut self) {}
}

/// Tails the session's files.
pub struct FileTailSource<W = PollWatcher> {
    watcher: W,
    tail_lines: usize,
    encoding: &'static encoding_rs::Encoding,
    client_identity: String,
}

impl FileTailSource<PollWatcher> {
    /// Tail every file named by `session` with a [`PollWatcher`].
    pub fn for_session(session: &Session) -> Self {
        let watcher = PollWatcher::new(session.log_files.iter().cloned(), session.encoding);
        Self::with_watcher(watcher, session)
    }
}

impl<W: FileWatcher> FileTailSource<W> {
    pub fn with_watcher(watcher: W, session: &Session) -> Self {
        Self {
            watcher,
            tail_lines: session.tail_lines,
            encoding: session.encoding,
            client_identity: session.client_identity.clone(),
        }
    }

    fn line(&self, text: String, source: &str) -> BufferedLine {
        BufferedLine::new(text, source, self.client_identity.as_str())
    }
}

impl<W: FileWatcher> LineSource for FileTailSource<W> {
    fn backlog(&mut self) -> Vec<BufferedLine> {
        let mut lines = Vec::new();
        if self.tail_lines == 0 {
            return lines;
        }
        for path in self.watcher.paths() {
            let source = path.display().to_string();
            match last_lines(path, self.tail_lines, self.encoding) {
                Ok(found) => {
                    info!("logship: read {} backlog lines from {source}", found.len());
                    lines.extend(found.into_iter().map(|text| {
                        BufferedLine::new(text, source.as_str(), self.client_identity.as_str())
                    }));
                }
                Err(err) => warn!("logship: no backlog for {source}: {err}"),
            }
        }
        lines
    }

    fn produce(&mut self) -> Vec<BufferedLine> {
        let changes = self.watcher.poll_for_changes();
        let mut lines = Vec::new();
        for change in changes {
            let source = change.path.display().to_string();
            lines.extend(change.lines.into_iter().map(|text| self.line(text, &source)));
        }
        lines
    }

    fn close(&mut self) {
        self.watcher.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::session_builder;
    use rstest::rstest;
    use std::{fs, fs::OpenOptions, io::Write, net::SocketAddr};
    use tempfile::tempdir;

    fn addr() -> SocketAddr {
        "127.0.0.1:9".parse().expect("literal address")
    }

    #[rstest]
    fn backlog_then_incremental_lines() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("app.log");
        fs::write(&path, "one\ntwo\nthree\n").expect("seed");
        let session = session_builder(addr(), dir.path())
            .with_tail_lines(2)
            .build()
            .expect("valid session");
        let mut source = FileTailSource::for_session(&session);

        let backlog: Vec<String> = source.backlog().into_iter().map(|l| l.text).collect();
        assert_eq!(backlog, ["two", "three"]);
        assert!(source.produce().is_empty());

        OpenOptions::new()
            .append(true)
            .open(&path)
            .expect("open")
            .write_all(b"four\n")
            .expect("append");
        let produced = source.produce();
        assert_eq!(produced.len(), 1);
        assert_eq!(produced[0].text, "four");
        assert_eq!(produced[0].source_path, path.display().to_string());
        assert_eq!(produced[0].client_identity, "test-client");
    }

    #[rstest]
    fn zero_tail_lines_skips_backlog() {
        let dir = tempdir().expect("temp dir");
        fs::write(dir.path().join("app.log"), "one\n").expect("seed");
        let session = session_builder(addr(), dir.path())
            .with_tail_lines(0)
            .build()
            .expect("valid session");
        let mut source = FileTailSource::for_session(&session);
        assert!(source.backlog().is_empty());
    }
}
