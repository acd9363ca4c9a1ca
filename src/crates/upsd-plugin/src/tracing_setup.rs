//! Tracing configuration.
//!
//! Logs go to the systemd journal when the agent asks for it
//! (NETDATA_LOG_METHOD=journal) or provides one (NETDATA_SYSTEMD_JOURNAL_PATH),
//! to stderr otherwise. Stdout is reserved for the chart protocol.

use crate::netdata_env::{LogMethod, NetdataEnv};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Output destination for logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogOutput {
    /// Write to systemd journal with structured logging
    Journal,
    /// Write to stderr with formatted text
    Stderr,
    /// Logging disabled by the agent
    Off,
}

impl LogOutput {
    fn detect(env: &NetdataEnv) -> Self {
        match env.log_method {
            Some(LogMethod::None) => LogOutput::Off,
            Some(LogMethod::Stderr) => LogOutput::Stderr,
            Some(LogMethod::Journal) => LogOutput::Journal,
            None if env.systemd_journal_path.is_some() => LogOutput::Journal,
            None => LogOutput::Stderr,
        }
    }
}

/// Default filter when RUST_LOG is not set.
fn default_filter(env: &NetdataEnv) -> &'static str {
    env.log_level.map_or("info", |level| level.as_filter())
}

/// Initialize tracing for the plugin.
///
/// Respects RUST_LOG, otherwise follows NETDATA_LOG_LEVEL. Falls back to
/// stderr when the journal cannot be reached.
pub fn init_tracing(env: &NetdataEnv) {
    let output = LogOutput::detect(env);
    if output == LogOutput::Off {
        return;
    }

    let default_filter = default_filter(env);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let registry = tracing_subscriber::registry().with(env_filter);

    let journald_error = if output == LogOutput::Journal {
        match tracing_journald::layer() {
            Ok(layer) => {
                registry.with(layer).init();
                tracing::info!("tracing initialized, logging to systemd journal");
                return;
            }
            Err(e) => Some(e),
        }
    } else {
        None
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true)
        .with_ansi(false);
    registry.with(fmt_layer).init();

    if let Some(e) = journald_error {
        tracing::warn!("failed to connect to journald, logging to stderr: {}", e);
    }
    tracing::debug!("tracing initialized with filter '{}'", default_filter);
}
