//! The unit of shipping.

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Source tag used for synthetic system messages.
pub const SYSTEM_SOURCE: &str = "SYSTEM";

/// Synthetic messages the client emits about itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SystemMarker {
    MonitorStart,
    MonitorStop,
    Heartbeat,
}

impl SystemMarker {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MonitorStart => "MONITOR_START",
            Self::MonitorStop => "MONITOR_STOP",
            Self::Heartbeat => "HEARTBEAT",
        }
    }
}

impl fmt::Display for SystemMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A line waiting to be shipped.
///
/// The serialised form is the overflow file record:
/// `{"timestamp": <epoch secs>, "line": ..., "source": ..., "client": ...}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BufferedLine {
    /// Seconds since the Unix epoch when the line was produced.
    pub timestamp: f64,
    #[serde(rename = "line")]
    pub text: String,
    #[serde(rename = "source")]
    pub source_path: String,
    #[serde(rename = "client")]
    pub client_identity: String,
}

impl BufferedLine {
    pub fn new(
        text: impl Into<String>,
        source_path: impl Into<String>,
        client_identity: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: now_epoch_secs(),
            text: text.into(),
            source_path: source_path.into(),
            client_identity: client_identity.into(),
        }
    }

    /// A synthetic system message tagged with [`SYSTEM_SOURCE`].
    pub fn system(marker: SystemMarker, client_identity: impl Into<String>) -> Self {
        Self::new(marker.as_str(), SYSTEM_SOURCE, client_identity)
    }
}

fn now_epoch_secs() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
