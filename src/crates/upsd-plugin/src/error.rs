use std::time::Duration;
use thiserror::Error;

/// Result type for upsd plugin operations
pub type Result<T> = std::result::Result<T, UpsdError>;

/// Error types that can occur while talking to upsd or emitting charts
#[derive(Error, Debug)]
pub enum UpsdError {
    /// The daemon could not be reached at all
    #[error("failed to connect to upsd at {address}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Transport layer error (I/O, network, broken stdout)
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    /// A request did not complete within its budget
    #[error("{operation} timed out after {}", humantime::format_duration(*after))]
    Timeout {
        operation: String,
        after: Duration,
    },

    /// The daemon answered with something we could not make sense of
    #[error("protocol error: {message}")]
    Protocol { message: String },

    /// The daemon answered with an `ERR <code>` reply
    #[error("upsd replied ERR {code}")]
    Daemon { code: String },

    /// The device does not expose the requested variable
    #[error("variable {variable} is not supported by {device}")]
    NotSupported { device: String, variable: String },
}

impl UpsdError {
    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Whether the error leaves the connection in an unknown state.
    ///
    /// Daemon-level refusals (`ERR ...`) are answered in-band and keep the
    /// stream usable; everything else forces a reconnect.
    pub fn breaks_connection(&self) -> bool {
        !matches!(self, Self::Daemon { .. } | Self::NotSupported { .. })
    }
}
