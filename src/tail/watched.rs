//! Per-file tail state: identity, offset and open handle.

use std::{
    fs::{self, File, Metadata},
    io::{self, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use encoding_rs::Encoding;
use log::info;

use super::backlog::last_line_end;
use crate::error::TailError;

/// Token identifying the file behind a path.
///
/// On Unix this is the device and inode pair. Elsewhere the creation time
/// stands in for it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileIdentity {
    #[cfg(unix)]
    dev: u64,
    #[cfg(unix)]
    ino: u64,
    #[cfg(not(unix))]
    created: Option<std::time::SystemTime>,
}

impl FileIdentity {
    pub fn of(metadata: &Metadata) -> Self {
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            Self {
                dev: metadata.dev(),
                ino: metadata.ino(),
            }
        }
        #[cfg(not(unix))]
        {
            Self {
                created: metadata.created().ok(),
            }
        }
    }
}

/// What a single poll of a [`WatchedFile`] observed.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PollResult {
    /// Complete, non-blank lines read this tick, in file order.
    pub lines: Vec<String>,
    pub rotated: bool,
    pub truncated: bool,
}

/// One monitored path.
///
/// Invariant: `offset` never exceeds the size of the file behind `handle`.
/// Bytes after the last newline are left unread until the line is finished.
#[derive(Debug)]
pub struct WatchedFile {
    path: PathBuf,
    identity: Option<FileIdentity>,
    offset: u64,
    handle: Option<File>,
}

impl WatchedFile {
    /// Start watching `path` from the end of its last finished line, so only
    /// content written from now on is reported, along with the rest of a line
    /// the writer had not finished. A missing file is watched from offset 0
    /// once it appears.
    pub fn at_end(path: impl Into<PathBuf>) -> Result<Self, TailError> {
        let path = path.into();
        let mut watched = Self {
            path,
            identity: None,
            offset: 0,
            handle: None,
        };
        match watched.open() {
            Ok(metadata) => {
                let handle = watched.handle.as_mut().ok_or_else(|| TailError::Missing {
                    path: watched.path.clone(),
                })?;
                watched.offset = last_line_end(handle, metadata.len())
                    .map_err(|e| TailError::from_io(&watched.path, e))?;
            }
            Err(TailError::Missing { .. }) => {}
            Err(err) => return Err(err),
        }
        Ok(watched)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn identity(&self) -> Option<FileIdentity> {
        self.identity
    }

    fn open(&mut self) -> Result<Metadata, TailError> {
        let file = File::open(&self.path).map_err(|e| TailError::from_io(&self.path, e))?;
        let metadata = file.metadata().map_err(|e| TailError::from_io(&self.path, e))?;
        self.identity = Some(FileIdentity::of(&metadata));
        self.handle = Some(file);
        Ok(metadata)
    }

    /// Release the open handle. The next poll reopens the path.
    pub fn close(&mut self) {
        self.handle = None;
    }

    /// Check the file for rotation, truncation and new content.
    ///
    /// Rotation is detected through the identity token before sizes are
    /// compared, because a replacement file can happen to have the same size.
    pub fn poll(&mut self, encoding: &'static Encoding) -> Result<PollResult, TailError> {
        let mut result = PollResult::default();
        let metadata = match fs::metadata(&self.path) {
            Ok(metadata) => metadata,
            Err(err) => {
                self.close();
                return Err(TailError::from_io(&self.path, err));
            }
        };

        let identity = FileIdentity::of(&metadata);
        if self.handle.is_none() || self.identity != Some(identity) {
            if self.identity.is_some_and(|known| known != identity) {
                info!("logship: {} was rotated; reading from the start", self.path.display());
                result.rotated = true;
            }
            self.close();
            self.open()?;
            self.offset = 0;
        }

        let size = metadata.len();
        if size < self.offset {
            info!(
                "logship: {} was truncated ({} -> {size} bytes); reading from the start",
                self.path.display(),
                self.offset
            );
            self.offset = 0;
            result.truncated = true;
            return Ok(result);
        }
        if size == self.offset {
            return Ok(result);
        }

        let bytes = self
            .read_from_offset(size - self.offset)
            .map_err(|e| TailError::from_io(&self.path, e))?;
        let Some(last_break) = bytes.iter().rposition(|&b| b == b'\n') else {
            return Ok(result);
        };
        let complete = &bytes[..=last_break];
        self.offset += complete.len() as u64;
        let (text, _) = encoding.decode_without_bom_handling(complete);
        result.lines = text
            .split('\n')
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect();
        Ok(result)
    }

    fn read_from_offset(&mut self, len: u64) -> io::Result<Vec<u8>> {
        let handle = self
            .handle
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "file handle closed"))?;
        handle.seek(SeekFrom::Start(self.offset))?;
        let mut bytes = Vec::with_capacity(len as usize);
        handle.take(len).read_to_end(&mut bytes)?;
        Ok(bytes)
    }
}
