//! File watchers: turn a set of paths into batches of new lines.

use std::path::{Path, PathBuf};

use encoding_rs::Encoding;
use log::{debug, error, warn};

use crate::error::TailError;

use super::watched::WatchedFile;

/// New lines observed in one file during one poll.
#[derive(Debug, PartialEq, Eq)]
pub struct FileChange {
    pub path: PathBuf,
    pub lines: Vec<String>,
}

/// Source of per-file changes, polled once per worker tick.
pub trait FileWatcher: Send {
    /// Check every watched file and return the ones with new lines, in the
    /// order the files are watched.
    fn poll_for_changes(&mut self) -> Vec<FileChange>;

    /// Paths still being monitored.
    fn paths(&self) -> Vec<&Path>;

    /// Release every open handle.
    fn close(&mut self);
}

/// Stat-based watcher that checks each file on every poll.
#[derive(Debug)]
pub struct PollWatcher {
    files: Vec<WatchedFile>,
    encoding: &'static Encoding,
}

impl PollWatcher {
    /// Watch `paths` from their current end.
    ///
    /// Unreadable files are logged and left out; missing files are kept and
    /// picked up once they appear.
    pub fn new<I, P>(paths: I, encoding: &'static Encoding) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let files = paths
            .into_iter()
            .filter_map(|path| match WatchedFile::at_end(path) {
                Ok(watched) => Some(watched),
                Err(err) => {
                    error!("logship: not monitoring {err}");
                    None
                }
            })
            .collect();
        Self { files, encoding }
    }
}

impl FileWatcher for PollWatcher {
    fn poll_for_changes(&mut self) -> Vec<FileChange> {
        let encoding = self.encoding;
        let mut changes = Vec::new();
        self.files.retain_mut(|watched| match watched.poll(encoding) {
            Ok(result) => {
                if !result.lines.is_empty() {
                    changes.push(FileChange {
                        path: watched.path().to_path_buf(),
                        lines: result.lines,
                    });
                }
                true
            }
            Err(err @ TailError::PermissionDenied { .. }) => {
                error!("logship: no longer monitoring {err}");
                false
            }
            Err(err @ TailError::Missing { .. }) => {
                debug!("logship: skipping this tick: {err}");
                true
            }
            Err(err) => {
                warn!("logship: skipping this tick: {err}");
                true
            }
        });
        changes
    }

    fn paths(&self) -> Vec<&Path> {
        self.files.iter().map(WatchedFile::path).collect()
    }

    fn close(&mut self) {
        self.files.iter_mut().for_each(WatchedFile::close);
    }
}
