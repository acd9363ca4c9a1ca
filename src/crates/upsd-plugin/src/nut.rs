//! Client for the NUT network protocol spoken by `upsd`.
//!
//! See <https://networkupstools.org/docs/developer-guide.chunked/net-protocol.html>

use crate::error::{Result, UpsdError};
use crate::source::{DataSource, ListRow};
use async_trait::async_trait;
use std::borrow::Cow;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

/// Default port `upsd` listens on.
pub const DEFAULT_PORT: u16 = 3493;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reply {
    /// A single line, e.g. the answer to `GET VAR`
    Single,
    /// `BEGIN LIST ...`, any number of rows, `END LIST ...`
    List,
}

struct Connection {
    stream: BufReader<TcpStream>,
    line: String,
}

impl Connection {
    async fn open(address: &str, timeout: Duration) -> Result<Self> {
        let stream = match tokio::time::timeout(timeout, TcpStream::connect(address)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(UpsdError::Connect {
                    address: address.to_string(),
                    source,
                })
            }
            Err(_) => {
                return Err(UpsdError::Connect {
                    address: address.to_string(),
                    source: io::Error::new(io::ErrorKind::TimedOut, "connect timed out"),
                })
            }
        };
        stream.set_nodelay(true)?;
        debug!("connected to upsd at {}", address);

        Ok(Self {
            stream: BufReader::new(stream),
            line: String::new(),
        })
    }

    async fn read_row(&mut self) -> Result<ListRow> {
        self.line.clear();
        if self.stream.read_line(&mut self.line).await? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "upsd closed the connection",
            )
            .into());
        }

        let row = split_words(self.line.trim_end_matches(['\r', '\n']))?;
        if row.first().map(String::as_str) == Some("ERR") {
            let code = row.get(1).cloned().unwrap_or_default();
            return Err(UpsdError::Daemon { code });
        }
        Ok(row)
    }

    async fn exchange(&mut self, command: &str, reply: Reply) -> Result<Vec<ListRow>> {
        let stream = self.stream.get_mut();
        stream.write_all(command.as_bytes()).await?;
        stream.write_all(b"\n").await?;
        stream.flush().await?;

        let first = self.read_row().await?;
        if reply == Reply::Single {
            return Ok(vec![first]);
        }

        if first.first().map(String::as_str) != Some("BEGIN") {
            return Err(UpsdError::protocol(format!(
                "expected BEGIN LIST in reply to '{}', got '{}'",
                command,
                first.join(" ")
            )));
        }

        let mut rows = Vec::new();
        loop {
            let row = self.read_row().await?;
            let end = row.first().map(String::as_str) == Some("END");
            rows.push(row);
            if end {
                return Ok(rows);
            }
        }
    }
}

/// A [`DataSource`] backed by a TCP connection to `upsd`.
///
/// Every request is bounded by the configured timeout. A request that times
/// out or fails at the transport level drops the connection, the next request
/// reconnects.
pub struct NutClient {
    address: String,
    timeout: Duration,
    connection: Option<Connection>,
}

impl NutClient {
    /// Connect to `upsd` at `address` (`host:port`).
    pub async fn connect(address: &str, timeout: Duration) -> Result<Self> {
        let connection = Connection::open(address, timeout).await?;
        Ok(Self {
            address: address.to_string(),
            timeout,
            connection: Some(connection),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    async fn request(&mut self, command: String, reply: Reply) -> Result<Vec<ListRow>> {
        let mut connection = match self.connection.take() {
            Some(connection) => connection,
            None => Connection::open(&self.address, self.timeout).await?,
        };

        let outcome =
            tokio::time::timeout(self.timeout, connection.exchange(&command, reply)).await;
        let result = match outcome {
            Ok(result) => result,
            Err(_) => Err(UpsdError::Timeout {
                operation: command,
                after: self.timeout,
            }),
        };

        match &result {
            Err(e) if e.breaks_connection() => debug!("dropping upsd connection: {}", e),
            _ => self.connection = Some(connection),
        }
        result
    }
}

#[async_trait]
impl DataSource for NutClient {
    async fn list_devices(&mut self) -> Result<Vec<ListRow>> {
        self.request("LIST UPS".to_string(), Reply::List).await
    }

    async fn list_variables(&mut self, device: &str) -> Result<Vec<ListRow>> {
        self.request(format!("LIST VAR {}", quote(device)), Reply::List)
            .await
    }

    async fn get_variable(&mut self, device: &str, variable: &str) -> Result<String> {
        let command = format!("GET VAR {} {}", quote(device), quote(variable));
        let rows = match self.request(command, Reply::Single).await {
            Err(UpsdError::Daemon { code }) if code == "VAR-NOT-SUPPORTED" => {
                return Err(UpsdError::NotSupported {
                    device: device.to_string(),
                    variable: variable.to_string(),
                })
            }
            result => result?,
        };

        match rows.into_iter().next() {
            Some(mut row) if row.len() >= 4 && row[0] == "VAR" => Ok(row.swap_remove(3)),
            Some(row) => Err(UpsdError::protocol(format!(
                "unexpected reply to GET VAR {} {}: '{}'",
                device,
                variable,
                row.join(" ")
            ))),
            None => Err(UpsdError::protocol("empty reply to GET VAR")),
        }
    }

    async fn close(&mut self) {
        if self.connection.is_none() {
            return;
        }
        if let Err(e) = self.request("LOGOUT".to_string(), Reply::Single).await {
            debug!("LOGOUT failed: {}", e);
        }
        self.connection = None;
    }
}

/// Split a reply line into words.
///
/// Words are separated by spaces; a double-quoted word may contain spaces, and
/// a backslash escapes the next character.
pub fn split_words(line: &str) -> Result<Vec<String>> {
    let mut words = Vec::new();
    let mut chars = line.chars();
    let mut word = String::new();
    let mut in_word = false;
    let mut quoted = false;

    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                let escaped = chars
                    .next()
                    .ok_or_else(|| UpsdError::protocol(format!("dangling escape in '{}'", line)))?;
                word.push(escaped);
                in_word = true;
            }
            '"' => {
                quoted = !quoted;
                in_word = true;
            }
            ' ' | '\t' if !quoted => {
                if in_word {
                    words.push(std::mem::take(&mut word));
                    in_word = false;
                }
            }
            _ => {
                word.push(ch);
                in_word = true;
            }
        }
    }

    if quoted {
        return Err(UpsdError::protocol(format!("unterminated quote in '{}'", line)));
    }
    if in_word {
        words.push(word);
    }
    Ok(words)
}

/// Quote a request argument when it would not survive word splitting.
fn quote(word: &str) -> Cow<'_, str> {
    let plain = !word.is_empty()
        && !word
            .chars()
            .any(|c| c.is_whitespace() || c == '"' || c == '\\');
    if plain {
        return Cow::Borrowed(word);
    }

    let mut quoted = String::with_capacity(word.len() + 2);
    quoted.push('"');
    for ch in word.chars() {
        if ch == '"' || ch == '\\' {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    Cow::Owned(quoted)
}
