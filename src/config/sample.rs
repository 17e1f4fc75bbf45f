//! Sample configuration emitted by `logship --create-config`.

use std::{fs, path::Path};

use crate::error::ConfigError;

/// Annotated sample config covering every recognised key.
pub const SAMPLE_CONFIG: &str = r#"; logship configuration

[Server]
host = localhost
port = 9999
; Leave empty to skip authentication. Only the SHA-256 digest is sent.
password =

[LogFiles]
; Comma-separated list of files to tail.
paths = /var/log/syslog

[SSL]
; Certificates are not validated; self-signed servers are accepted.
use_ssl = false

[Client]
encoding = utf-8
tail_lines = 10
buffer_size = 1000
max_reconnect_attempts = 10
; Seconds. The delay grows by 1.5x per failed attempt, up to 300.
reconnect_delay = 5
poll_interval = 0.5
; Seconds of idleness before a HEARTBEAT line. 0 disables heartbeats.
heartbeat_interval = 60
; Directory holding the on-disk overflow buffer.
buffer_dir = .
"#;

/// Write [`SAMPLE_CONFIG`] to `path`, refusing to overwrite an existing file.
pub fn write_sample_config(path: impl AsRef<Path>) -> Result<(), ConfigError> {
    let path = path.as_ref();
    if path.exists() {
        return Err(ConfigError::Invalid(format!(
            "{} already exists",
            path.display()
        )));
    }
    fs::write(path, SAMPLE_CONFIG).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}
