//! Immutable per-run session descriptor and its builder.

use std::{fmt, path::PathBuf, time::Duration};

use encoding_rs::Encoding;
use sha2::{Digest, Sha256};

use crate::error::ConfigError;

use super::{
    DEFAULT_BUFFER_SIZE, DEFAULT_CONFIRM_TIMEOUT, DEFAULT_CONNECT_TIMEOUT, DEFAULT_DRAIN_DELAY,
    DEFAULT_ENCODING, DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_MAX_RECONNECT_ATTEMPTS,
    DEFAULT_POLL_INTERVAL, DEFAULT_PORT, DEFAULT_RECONNECT_DELAY, DEFAULT_TAIL_LINES, FileConfig,
};

/// Lowercase hex SHA-256 digest of `password`, as sent during the handshake.
pub fn password_digest(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// Everything a shipping worker needs to know about its run.
///
/// Built once by [`SessionBuilder::build`] and never mutated afterwards.
/// Only the password digest is retained; the plaintext is dropped by the
/// builder.
#[derive(Clone)]
pub struct Session {
    pub host: String,
    pub port: u16,
    pub password_digest: Option<String>,
    pub use_tls: bool,
    pub encoding: &'static Encoding,
    pub log_files: Vec<PathBuf>,
    pub tail_lines: usize,
    pub buffer_capacity: usize,
    pub max_reconnect_attempts: u32,
    pub reconnect_delay: Duration,
    pub poll_interval: Duration,
    /// `None` disables heartbeats.
    pub heartbeat_interval: Option<Duration>,
    pub client_identity: String,
    pub buffer_dir: PathBuf,
    pub connect_timeout: Duration,
    pub confirm_timeout: Duration,
    pub drain_delay: Duration,
}

impl Session {
    /// `host:port` label used in logs and errors.
    pub fn peer(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Location of this session's private overflow file.
    ///
    /// The name is derived from the client identity, the peer and a short
    /// digest of the monitored files, so two sessions in one host process
    /// never share a file.
    pub fn overflow_path(&self) -> PathBuf {
        let mut files: Vec<_> = self.log_files.iter().map(|p| p.to_string_lossy()).collect();
        files.sort_unstable();
        let files_digest = Sha256::digest(files.join("\n").as_bytes());
        let key = format!(
            "{}_{}_{}_{}",
            self.client_identity,
            self.host,
            self.port,
            hex::encode(&files_digest[..4])
        );
        let slug: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.buffer_dir.join(format!("logship-{slug}.buffer.gz"))
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("peer", &self.peer())
            .field("authenticated", &self.password_digest.is_some())
            .field("use_tls", &self.use_tls)
            .field("encoding", &self.encoding.name())
            .field("log_files", &self.log_files)
            .field("tail_lines", &self.tail_lines)
            .field("buffer_capacity", &self.buffer_capacity)
            .field("max_reconnect_attempts", &self.max_reconnect_attempts)
            .field("reconnect_delay", &self.reconnect_delay)
            .field("client_identity", &self.client_identity)
            .finish_non_exhaustive()
    }
}

macro_rules! option_setter {
    ($(#[$meta:meta])* $fn_name:ident, $field:ident, $ty:ty) => {
        $(#[$meta])*
        pub fn $fn_name(mut self, value: $ty) -> Self {
            self.$field = Some(value);
            self
        }
    };
}

macro_rules! ensure_positive {
    ($value:expr, $zero:expr, $field:expr) => {{
        if $value == $zero {
            Err(ConfigError::Invalid(format!(
                "{} must be greater than zero",
                $field
            )))
        } else {
            Ok($value)
        }
    }};
}

/// Layered builder for [`Session`].
///
/// Start from [`SessionBuilder::new`] for pure defaults or
/// [`SessionBuilder::from_file`] to seed it with config-file values, then
/// apply command-line overrides through the `with_*` setters.
#[derive(Clone, Default)]
pub struct SessionBuilder {
    host: Option<String>,
    port: Option<u16>,
    password: Option<String>,
    use_tls: Option<bool>,
    log_files: Option<Vec<PathBuf>>,
    encoding: Option<String>,
    tail_lines: Option<usize>,
    buffer_size: Option<usize>,
    max_reconnect_attempts: Option<u32>,
    reconnect_delay: Option<Duration>,
    poll_interval: Option<Duration>,
    heartbeat_interval: Option<Duration>,
    client_name: Option<String>,
    buffer_dir: Option<PathBuf>,
    connect_timeout: Option<Duration>,
    confirm_timeout: Option<Duration>,
    drain_delay: Option<Duration>,
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a builder with every value present in `file`.
    pub fn from_file(file: &FileConfig) -> Self {
        Self {
            host: file.host.clone(),
            port: file.port,
            password: file.password.clone(),
            use_tls: file.use_ssl,
            log_files: file.log_files.clone(),
            encoding: file.encoding.clone(),
            tail_lines: file.tail_lines,
            buffer_size: file.buffer_size,
            max_reconnect_attempts: file.max_reconnect_attempts,
            reconnect_delay: file.reconnect_delay,
            poll_interval: file.poll_interval,
            heartbeat_interval: file.heartbeat_interval,
            client_name: file.client_name.clone(),
            buffer_dir: file.buffer_dir.clone(),
            ..Self::default()
        }
    }

    /// Set the server host name or address.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the plaintext password. It is hashed during [`build`](Self::build).
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the files to monitor.
    pub fn with_log_files<I, P>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.log_files = Some(files.into_iter().map(Into::into).collect());
        self
    }

    /// Set the text encoding label (`utf-8`, `latin1`, `windows-1252`, ...).
    pub fn with_encoding(mut self, label: impl Into<String>) -> Self {
        self.encoding = Some(label.into());
        self
    }

    /// Set the client identity stamped on every buffered line.
    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = Some(name.into());
        self
    }

    /// Set the directory holding the overflow file.
    pub fn with_buffer_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.buffer_dir = Some(dir.into());
        self
    }

    option_setter!(with_port, port, u16);
    option_setter!(
        #[doc = "Enable or disable the TLS upgrade."]
        with_tls,
        use_tls,
        bool
    );
    option_setter!(with_tail_lines, tail_lines, usize);
    option_setter!(
        #[doc = "Set the in-memory retry queue capacity."]
        with_buffer_size,
        buffer_size,
        usize
    );
    option_setter!(with_max_reconnect_attempts, max_reconnect_attempts, u32);
    option_setter!(with_reconnect_delay, reconnect_delay, Duration);
    option_setter!(with_poll_interval, poll_interval, Duration);
    option_setter!(
        #[doc = "Set the idle period before a heartbeat. Zero disables heartbeats."]
        with_heartbeat_interval,
        heartbeat_interval,
        Duration
    );
    option_setter!(with_connect_timeout, connect_timeout, Duration);
    option_setter!(with_confirm_timeout, confirm_timeout, Duration);
    option_setter!(with_drain_delay, drain_delay, Duration);

    /// Validate the merged settings and produce a [`Session`].
    pub fn build(self) -> Result<Session, ConfigError> {
        let host = self
            .host
            .map(|h| h.trim().to_owned())
            .filter(|h| !h.is_empty())
            .ok_or(ConfigError::Missing("host"))?;
        let port = ensure_positive!(self.port.unwrap_or(DEFAULT_PORT), 0, "port")?;
        let log_files = self
            .log_files
            .filter(|files| !files.is_empty())
            .ok_or(ConfigError::Missing("log_files"))?;

        let label = self.encoding.as_deref().unwrap_or(DEFAULT_ENCODING);
        let encoding = Encoding::for_label(label.trim().to_ascii_lowercase().as_bytes())
            .ok_or_else(|| ConfigError::Invalid(format!("unknown encoding {label}")))?;

        let buffer_capacity =
            ensure_positive!(self.buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE), 0, "buffer_size")?;
        let max_reconnect_attempts = ensure_positive!(
            self.max_reconnect_attempts
                .unwrap_or(DEFAULT_MAX_RECONNECT_ATTEMPTS),
            0,
            "max_reconnect_attempts"
        )?;
        let reconnect_delay = ensure_positive!(
            self.reconnect_delay.unwrap_or(DEFAULT_RECONNECT_DELAY),
            Duration::ZERO,
            "reconnect_delay"
        )?;
        let poll_interval = ensure_positive!(
            self.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL),
            Duration::ZERO,
            "poll_interval"
        )?;
        let heartbeat_interval = Some(
            self.heartbeat_interval
                .unwrap_or(DEFAULT_HEARTBEAT_INTERVAL),
        )
        .filter(|interval| !interval.is_zero());

        let password_digest = self
            .password
            .filter(|p| !p.is_empty())
            .map(|p| password_digest(&p));
        let client_identity = self
            .client_name
            .map(|n| n.trim().to_owned())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(default_client_name);

        Ok(Session {
            host,
            port,
            password_digest,
            use_tls: self.use_tls.unwrap_or(false),
            encoding,
            log_files,
            tail_lines: self.tail_lines.unwrap_or(DEFAULT_TAIL_LINES),
            buffer_capacity,
            max_reconnect_attempts,
            reconnect_delay,
            poll_interval,
            heartbeat_interval,
            client_identity,
            buffer_dir: self.buffer_dir.unwrap_or_else(|| PathBuf::from(".")),
            connect_timeout: self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            confirm_timeout: self.confirm_timeout.unwrap_or(DEFAULT_CONFIRM_TIMEOUT),
            drain_delay: self.drain_delay.unwrap_or(DEFAULT_DRAIN_DELAY),
        })
    }
}

impl fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("log_files", &self.log_files)
            .finish_non_exhaustive()
    }
}

fn default_client_name() -> String {
    ["HOSTNAME", "COMPUTERNAME"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|name| !name.trim().is_empty())
        .unwrap_or_else(|| "unknown-host".to_owned())
}
