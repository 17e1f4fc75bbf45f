//! Error taxonomy shared by the shipping components.
//!
//! Configuration problems are fatal and surface before any connection is
//! attempted. Everything raised while shipping is recoverable: the session
//! buffers the affected line and hands control to the reconnect supervisor.

use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors raised while assembling a [`Session`](crate::config::Session).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A mandatory field was not supplied by the config file or overrides.
    #[error("missing required setting: {0}")]
    Missing(&'static str),
    /// A supplied value could not be used.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// The config file could not be read or written.
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The config file is not valid INI.
    #[error("{path} is invalid: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Failures raised by the transport and the line shipper.
#[derive(Debug, Error)]
pub enum ShipError {
    /// The peer answered the password digest with something other than
    /// `AUTH_SUCCESS`.
    #[error("authentication rejected by {peer}: {response:?}")]
    Auth { peer: String, response: String },
    /// Connect, read, write or timeout failure.
    #[error(transparent)]
    Transport(#[from] io::Error),
    /// The echoed confirmation did not match the line that was sent.
    #[error("confirmation mismatch: sent {sent:?}, received {received:?}")]
    ConfirmationMismatch { sent: String, received: String },
}

/// Per-file failures observed while tailing.
#[derive(Debug, Error)]
pub enum TailError {
    /// The file exists but cannot be read. The file is dropped from
    /// monitoring.
    #[error("{path}: permission denied")]
    PermissionDenied { path: PathBuf },
    /// The file is absent. It is retried on the next tick.
    #[error("{path}: file not found")]
    Missing { path: PathBuf },
    /// Any other I/O failure. It is retried on the next tick.
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl TailError {
    /// Classify an I/O error raised while touching `path`.
    pub fn from_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            io::ErrorKind::NotFound => Self::Missing { path },
            _ => Self::Io { path, source },
        }
    }

    /// Whether the file should be removed from monitoring for good.
    pub fn is_fatal_for_file(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. })
    }
}
