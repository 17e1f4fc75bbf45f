//! INI config file support.
//!
//! Recognised layout:
//!
//! ```ini
//! [Server]
//! host = logs.example.org
//! port = 9999
//! password = secret
//!
//! [LogFiles]
//! paths = /var/log/syslog, /var/log/auth.log
//!
//! [SSL]
//! use_ssl = false
//!
//! [Client]
//! encoding = utf-8
//! tail_lines = 10
//! buffer_size = 1000
//! max_reconnect_attempts = 10
//! reconnect_delay = 5
//! ```
//!
//! Unknown sections and keys are ignored.

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use ini::{Ini, ParseOption, Properties};

use crate::error::ConfigError;

use super::{parse_bool, parse_seconds};

/// Values read from a config file. Absent keys stay `None` so that built-in
/// defaults apply.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub password: Option<String>,
    pub log_files: Option<Vec<PathBuf>>,
    pub use_ssl: Option<bool>,
    pub encoding: Option<String>,
    pub tail_lines: Option<usize>,
    pub buffer_size: Option<usize>,
    pub max_reconnect_attempts: Option<u32>,
    pub reconnect_delay: Option<Duration>,
    pub poll_interval: Option<Duration>,
    pub heartbeat_interval: Option<Duration>,
    pub client_name: Option<String>,
    pub buffer_dir: Option<PathBuf>,
}

impl FileConfig {
    /// Read and parse the INI file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| match source.kind() {
            ErrorKind::NotFound => ConfigError::Invalid(format!("{} doesn't exist", path.display())),
            _ => ConfigError::Io {
                path: path.to_path_buf(),
                source,
            },
        })?;
        // A leading BOM is common on files edited on Windows.
        let (text, _, _) = encoding_rs::UTF_8.decode(&bytes);
        Self::parse(&text).map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Parse INI text.
    ///
    /// Returns a human-readable message on failure; [`load`](Self::load)
    /// attaches the file path.
    pub fn parse(text: &str) -> Result<Self, String> {
        // Escapes stay off so Windows paths such as `C:\logs\app.log` survive.
        let options = ParseOption {
            enabled_escape: false,
            ..ParseOption::default()
        };
        let ini = Ini::load_from_str_opt(text, options).map_err(|err| err.to_string())?;
        let mut config = Self::default();

        if let Some(server) = ini.section(Some("Server")) {
            config.host = text_value(server, "host");
            config.port = parsed_value(server, "Server", "port")?;
            config.password = server.get("password").map(str::to_owned);
        }
        if let Some(files) = ini.section(Some("LogFiles")) {
            config.log_files = files.get("paths").map(split_paths).filter(|p| !p.is_empty());
        }
        if let Some(ssl) = ini.section(Some("SSL"))
            && let Some(raw) = ssl.get("use_ssl")
        {
            config.use_ssl = Some(
                parse_bool(raw).ok_or_else(|| format!("[SSL] use_ssl: invalid boolean {raw:?}"))?,
            );
        }
        if let Some(client) = ini.section(Some("Client")) {
            config.encoding = text_value(client, "encoding");
            config.tail_lines = parsed_value(client, "Client", "tail_lines")?;
            config.buffer_size = parsed_value(client, "Client", "buffer_size")?;
            config.max_reconnect_attempts =
                parsed_value(client, "Client", "max_reconnect_attempts")?;
            config.reconnect_delay = seconds_value(client, "reconnect_delay")?;
            config.poll_interval = seconds_value(client, "poll_interval")?;
            config.heartbeat_interval = seconds_value(client, "heartbeat_interval")?;
            config.client_name = text_value(client, "name");
            config.buffer_dir = text_value(client, "buffer_dir").map(PathBuf::from);
        }
        Ok(config)
    }
}

fn text_value(section: &Properties, key: &str) -> Option<String> {
    section
        .get(key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

fn parsed_value<T: std::str::FromStr>(
    section: &Properties,
    name: &str,
    key: &str,
) -> Result<Option<T>, String> {
    section
        .get(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|_| format!("[{name}] {key}: invalid number {raw:?}"))
        })
        .transpose()
}

fn seconds_value(section: &Properties, key: &str) -> Result<Option<Duration>, String> {
    section
        .get(key)
        .map(|raw| parse_seconds(raw).ok_or_else(|| format!("[Client] {key}: invalid seconds {raw:?}")))
        .transpose()
}

fn split_paths(raw: &str) -> Vec<PathBuf> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .collect()
}
