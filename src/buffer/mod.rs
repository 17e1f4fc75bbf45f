//! Retry buffer: bounded in-memory FIFO with gzip overflow on disk.
//!
//! Lines that could not be shipped are [`offer`](RetryBuffer::offer)ed here.
//! Once the memory queue is full, further lines go to the overflow file, and
//! keep going there until the file has been drained back into memory, so a
//! newer line never overtakes an older one.

mod overflow;

pub use overflow::OverflowFile;

use std::{collections::VecDeque, io, path::PathBuf, thread, time::Duration};

use log::{error, info, warn};

use crate::{
    error::ShipError,
    line::BufferedLine,
    rate_limited_warner::{DEFAULT_WARN_INTERVAL, RateLimitedWarner},
};

/// How a [`RetryBuffer::drain`] call ended.
#[derive(Debug)]
pub enum DrainOutcome {
    /// Every buffered line was shipped.
    Flushed,
    /// Draining was cut short before the next send.
    Interrupted,
    /// The peer rejected a line; it is back at the front of the queue.
    Failed(ShipError),
    /// The memory queue was shipped but the overflow file could not be read.
    OverflowUnreadable(io::Error),
}

impl DrainOutcome {
    pub fn is_flushed(&self) -> bool {
        matches!(self, Self::Flushed)
    }
}

#[derive(Debug)]
pub struct RetryBuffer {
    queue: VecDeque<BufferedLine>,
    capacity: usize,
    overflow: OverflowFile,
    /// Records written to the overflow file since it was last drained.
    on_disk: usize,
    drain_delay: Duration,
    warner: RateLimitedWarner,
}

impl RetryBuffer {
    /// Create a buffer and load any overflow left by a previous run into
    /// memory, removing the file.
    pub fn open(
        capacity: usize,
        overflow_path: impl Into<PathBuf>,
        drain_delay: Duration,
    ) -> io::Result<Self> {
        let overflow = OverflowFile::new(overflow_path);
        let restored = overflow.take()?;
        if !restored.is_empty() {
            info!(
                "logship: restored {} buffered lines from {}",
                restored.len(),
                overflow.path().display()
            );
        }
        Ok(Self {
            queue: restored.into(),
            capacity,
            overflow,
            on_disk: 0,
            drain_delay,
            warner: RateLimitedWarner::new(DEFAULT_WARN_INTERVAL),
        })
    }

    /// Lines held in memory.
    pub fn in_memory(&self) -> usize {
        self.queue.len()
    }

    /// Lines written to disk since the overflow was last drained.
    pub fn on_disk(&self) -> usize {
        self.on_disk
    }

    /// Total lines waiting to be shipped.
    pub fn len(&self) -> usize {
        self.queue.len() + self.on_disk
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queue `line` for a later attempt. Never blocks on the network.
    pub fn offer(&mut self, line: BufferedLine) {
        if self.queue.len() < self.capacity && self.on_disk == 0 {
            self.queue.push_back(line);
            return;
        }
        match self.overflow.append(&line) {
            Ok(()) => {
                self.on_disk += 1;
                self.warner.record();
                let on_disk = self.on_disk;
                let path = self.overflow.path().display();
                self.warner.warn_if_due(|count| {
                    warn!(
                        "logship: memory buffer full; wrote {count} lines to {path} ({on_disk} on disk)"
                    );
                });
            }
            Err(err) => {
                // Keep the line rather than lose it; memory grows past capacity.
                error!(
                    "logship: cannot write overflow file {}: {err}; keeping line in memory",
                    self.overflow.path().display()
                );
                self.queue.push_back(line);
            }
        }
    }

    /// Ship buffered lines in FIFO order until the buffer is empty, a send
    /// fails or `keep_going` returns `false`.
    ///
    /// `keep_going` is consulted before every send. A failed line goes back
    /// to the front of the queue. The overflow file is consulted only after
    /// the memory queue is empty. Whatever is not shipped stays buffered.
    pub fn drain<C, F>(&mut self, mut keep_going: C, mut ship: F) -> DrainOutcome
    where
        C: FnMut() -> bool,
        F: FnMut(&BufferedLine) -> Result<(), ShipError>,
    {
        let mut shipped = 0usize;
        loop {
            while let Some(line) = self.queue.pop_front() {
                if !keep_going() {
                    self.queue.push_front(line);
                    info!(
                        "logship: replay interrupted after {shipped} lines; {} still buffered",
                        self.len()
                    );
                    return DrainOutcome::Interrupted;
                }
                if let Err(err) = ship(&line) {
                    warn!(
                        "logship: replay stopped after {shipped} lines: {err}; {} still buffered",
                        self.len() + 1
                    );
                    self.queue.push_front(line);
                    return DrainOutcome::Failed(err);
                }
                shipped += 1;
                if !self.drain_delay.is_zero() && !self.is_empty() {
                    thread::sleep(self.drain_delay);
                }
            }
            if self.on_disk == 0 && !self.overflow.exists() {
                break;
            }
            match self.overflow.take() {
                Ok(records) => {
                    info!(
                        "logship: loaded {} lines from {}",
                        records.len(),
                        self.overflow.path().display()
                    );
                    self.on_disk = 0;
                    if records.is_empty() {
                        break;
                    }
                    self.queue.extend(records);
                }
                Err(err) => {
                    error!(
                        "logship: cannot read overflow file {}: {err}",
                        self.overflow.path().display()
                    );
                    return DrainOutcome::OverflowUnreadable(err);
                }
            }
        }
        if shipped > 0 {
            info!("logship: replayed {shipped} buffered lines");
        }
        self.warner.flush(|count| {
            warn!("logship: {count} lines passed through the overflow file");
        });
        DrainOutcome::Flushed
    }

    /// Move the memory queue to disk, ahead of any records already there, so
    /// that the next start replays everything in order.
    pub fn persist(&mut self) -> io::Result<usize> {
        if self.queue.is_empty() {
            return Ok(0);
        }
        let lines: Vec<BufferedLine> = self.queue.drain(..).collect();
        if let Err(err) = self.overflow.prepend(&lines) {
            self.queue.extend(lines);
            return Err(err);
        }
        self.on_disk += lines.len();
        Ok(lines.len())
    }
}
