//! File tailing.
//!
//! Two modes per file: a cold-start [`last_lines`] backlog read, then an
//! incremental watch through a [`FileWatcher`] that detects rotation (file
//! identity change) and truncation (size below the stored offset).

mod backlog;
mod watched;
mod watcher;

pub use backlog::{CHUNK_SIZE, last_lines};
pub use watched::{FileIdentity, PollResult, WatchedFile};
pub use watcher::{FileChange, FileWatcher, PollWatcher};
