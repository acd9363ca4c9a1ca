//! Interface to the daemon that knows about the UPS devices.

use crate::error::Result;
use async_trait::async_trait;

/// One reply line of a list query, split into words.
///
/// List replies mirror the daemon verbatim, including the trailing
/// `END LIST ...` row which callers must filter out.
pub type ListRow = Vec<String>;

/// A source of UPS devices and their variables.
///
/// Calls are made one at a time from the poll loop; implementations are
/// expected to bound each call in time.
#[async_trait]
pub trait DataSource: Send {
    /// Rows of `LIST UPS`: `["UPS", <name>, <description>]`, then the end marker.
    async fn list_devices(&mut self) -> Result<Vec<ListRow>>;

    /// Rows of `LIST VAR <device>`: `["VAR", <device>, <name>, <value>]`, then the end marker.
    async fn list_variables(&mut self, device: &str) -> Result<Vec<ListRow>>;

    /// Current value of a single variable.
    ///
    /// Fails with [`crate::UpsdError::NotSupported`] when the device does not
    /// expose it.
    async fn get_variable(&mut self, device: &str, variable: &str) -> Result<String>;

    /// Release the connection to the daemon, best effort.
    async fn close(&mut self) {}
}

/// Whether a list row is the `END LIST ...` terminator.
pub fn is_end_marker(row: &[String]) -> bool {
    row.first().is_some_and(|word| word == "END")
}
