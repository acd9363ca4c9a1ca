#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use tokio_util::sync::CancellationToken;
use upsd_plugin::{DataSource, ListRow, Result, UpsdError};

/// In-memory stand-in for upsd.
#[derive(Default)]
pub struct FakeSource {
    devices: Vec<(String, BTreeMap<String, String>)>,
    extra_device_rows: Vec<ListRow>,
    failing_gets: HashSet<(String, String)>,
    failing_lists: HashSet<String>,
    fail_enumeration: bool,
    cancel_after: Option<(CancellationToken, usize)>,
    pub calls: Vec<String>,
    pub closed: bool,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(mut self, name: &str, variables: &[(&str, &str)]) -> Self {
        self.add_device(name, variables);
        self
    }

    pub fn add_device(&mut self, name: &str, variables: &[(&str, &str)]) {
        let variables = variables
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.devices.push((name.to_string(), variables));
    }

    /// Extra `LIST UPS` rows, inserted before the end marker.
    pub fn with_device_row(mut self, words: &[&str]) -> Self {
        self.extra_device_rows
            .push(words.iter().map(|w| w.to_string()).collect());
        self
    }

    pub fn set_variable(&mut self, device: &str, name: &str, value: &str) {
        if let Some(vars) = self.variables_mut(device) {
            vars.insert(name.to_string(), value.to_string());
        }
    }

    pub fn remove_variable(&mut self, device: &str, name: &str) {
        if let Some(vars) = self.variables_mut(device) {
            vars.remove(name);
        }
    }

    pub fn fail_get(&mut self, device: &str, name: &str, fail: bool) {
        let key = (device.to_string(), name.to_string());
        if fail {
            self.failing_gets.insert(key);
        } else {
            self.failing_gets.remove(&key);
        }
    }

    pub fn fail_list_variables(&mut self, device: &str, fail: bool) {
        if fail {
            self.failing_lists.insert(device.to_string());
        } else {
            self.failing_lists.remove(device);
        }
    }

    pub fn fail_enumeration(&mut self, fail: bool) {
        self.fail_enumeration = fail;
    }

    /// Cancel `token` once `cycles` device enumerations have been served.
    pub fn cancel_after(mut self, token: CancellationToken, cycles: usize) -> Self {
        self.cancel_after = Some((token, cycles));
        self
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls.iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn variables_mut(&mut self, device: &str) -> Option<&mut BTreeMap<String, String>> {
        self.devices
            .iter_mut()
            .find(|(name, _)| name == device)
            .map(|(_, vars)| vars)
    }

    fn variables(&self, device: &str) -> Result<&BTreeMap<String, String>> {
        self.devices
            .iter()
            .find(|(name, _)| name == device)
            .map(|(_, vars)| vars)
            .ok_or_else(|| UpsdError::Daemon {
                code: "UNKNOWN-UPS".to_string(),
            })
    }
}

fn row(words: &[&str]) -> ListRow {
    words.iter().map(|w| w.to_string()).collect()
}

#[async_trait]
impl DataSource for FakeSource {
    async fn list_devices(&mut self) -> Result<Vec<ListRow>> {
        self.calls.push("LIST UPS".to_string());
        if let Some((token, cycles)) = &self.cancel_after {
            if self.count_calls("LIST UPS") >= *cycles {
                token.cancel();
            }
        }
        if self.fail_enumeration {
            return Err(UpsdError::Daemon {
                code: "DRIVER-NOT-CONNECTED".to_string(),
            });
        }

        let mut rows: Vec<ListRow> = self
            .devices
            .iter()
            .map(|(name, _)| row(&["UPS", name.as_str(), "fake device"]))
            .collect();
        rows.extend(self.extra_device_rows.iter().cloned());
        rows.push(row(&["END", "LIST", "UPS"]));
        Ok(rows)
    }

    async fn list_variables(&mut self, device: &str) -> Result<Vec<ListRow>> {
        self.calls.push(format!("LIST VAR {}", device));
        if self.failing_lists.contains(device) {
            return Err(UpsdError::Timeout {
                operation: format!("LIST VAR {}", device),
                after: std::time::Duration::from_secs(5),
            });
        }

        let mut rows: Vec<ListRow> = self
            .variables(device)?
            .iter()
            .map(|(name, value)| row(&["VAR", device, name.as_str(), value.as_str()]))
            .collect();
        rows.push(row(&["END", "LIST", "VAR", device]));
        Ok(rows)
    }

    async fn get_variable(&mut self, device: &str, variable: &str) -> Result<String> {
        self.calls.push(format!("GET VAR {} {}", device, variable));
        if self
            .failing_gets
            .contains(&(device.to_string(), variable.to_string()))
        {
            return Err(UpsdError::Daemon {
                code: "DATA-STALE".to_string(),
            });
        }

        self.variables(device)?
            .get(variable)
            .cloned()
            .ok_or_else(|| UpsdError::NotSupported {
                device: device.to_string(),
                variable: variable.to_string(),
            })
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}

pub fn output_lines(out: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(out)
        .lines()
        .map(str::to_string)
        .collect()
}

/// Chart ids of the CHART lines in `lines`.
pub fn declared_charts(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .filter_map(|l| l.strip_prefix("CHART '"))
        .filter_map(|rest| rest.split('\'').next())
        .map(str::to_string)
        .collect()
}

/// Chart ids of the BEGIN lines in `lines`.
pub fn sampled_charts(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .filter_map(|l| l.strip_prefix("BEGIN "))
        .map(str::to_string)
        .collect()
}

/// SET lines of the block that starts with `BEGIN <chart>`, as (dimension, value).
pub fn sample_block(lines: &[String], chart: &str) -> Vec<(String, String)> {
    let begin = format!("BEGIN {}", chart);
    lines
        .iter()
        .skip_while(|l| l.as_str() != begin)
        .skip(1)
        .take_while(|l| l.as_str() != "END")
        .filter_map(|l| {
            let rest = l.strip_prefix("SET '")?;
            let (dimension, value) = rest.split_once("' = ")?;
            Some((dimension.to_string(), value.to_string()))
        })
        .collect()
}
