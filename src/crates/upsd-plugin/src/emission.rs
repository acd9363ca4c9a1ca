//! Chart declaration and sampling for UPS devices.

use crate::catalog::{MetricDescriptor, LABEL_VARIABLES};
use crate::writer::ChartWriter;
use std::collections::HashMap;
use std::io::{self, Write};

/// Plugin name reported in CHART lines.
pub const PLUGIN_NAME: &str = "upsd";

/// Longest device prefix accepted in a chart id.
const MAX_DEVICE_ID_LEN: usize = 63;

/// Turn a daemon-assigned device name into a chart id prefix.
///
/// Spaces and dots are replaced by underscores and the result is capped at
/// [`MAX_DEVICE_ID_LEN`] bytes.
pub fn clean_device_name(name: &str) -> String {
    let mut cleaned = String::with_capacity(name.len().min(MAX_DEVICE_ID_LEN));
    for ch in name.chars() {
        let ch = if ch == ' ' || ch == '.' { '_' } else { ch };
        if cleaned.len() + ch.len_utf8() > MAX_DEVICE_ID_LEN {
            break;
        }
        cleaned.push(ch);
    }
    cleaned
}

/// Chart labels attached to every chart of a device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceLabels {
    labels: Vec<(&'static str, String)>,
}

impl DeviceLabels {
    /// Collect the whitelisted attributes present in `variables`, followed by
    /// the device name and the collection job.
    pub fn from_variables(
        device: &str,
        job_name: &str,
        variables: &HashMap<String, String>,
    ) -> Self {
        let mut labels: Vec<(&'static str, String)> = LABEL_VARIABLES
            .iter()
            .filter_map(|(variable, key)| variables.get(*variable).map(|v| (*key, v.clone())))
            .collect();
        labels.push(("ups_name", device.to_string()));
        labels.push(("_collect_job", job_name.to_string()));
        Self { labels }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.labels.iter().map(|(k, v)| (*k, v.as_str()))
    }
}

/// Renders chart declarations and samples into a [`ChartWriter`].
pub struct Emitter {
    writer: ChartWriter,
    update_every: u64,
}

impl Emitter {
    pub fn new(update_every: u64) -> Self {
        Self {
            writer: ChartWriter::new(),
            update_every,
        }
    }

    /// Declare a device chart: CHART, its labels, CLABEL_COMMIT and one
    /// DIMENSION per descriptor dimension.
    ///
    /// Declaring twice is harmless for the agent, callers consult the
    /// [`crate::ChartRegistry`] to avoid it.
    pub fn declare(&mut self, device: &str, descriptor: &MetricDescriptor, labels: &DeviceLabels) {
        let chart_id = chart_id(device, descriptor);
        self.writer
            .write_chart(&chart_id, descriptor, self.update_every, PLUGIN_NAME);
        for (key, value) in labels.iter() {
            self.writer.write_label(key, value);
        }
        self.writer.commit_labels();
        for dimension in descriptor.dimensions {
            self.writer.write_dimension_definition(dimension);
        }
    }

    /// Emit one BEGIN/SET.../END block, one value per dimension in order.
    ///
    /// Returns `false` without writing anything when the number of values
    /// does not match the number of dimensions.
    pub fn sample<V: AsRef<str>>(
        &mut self,
        device: &str,
        descriptor: &MetricDescriptor,
        values: &[V],
    ) -> bool {
        if values.len() != descriptor.dimensions.len() {
            tracing::warn!(
                "chart {} expects {} values, got {}",
                descriptor.chart_id,
                descriptor.dimensions.len(),
                values.len()
            );
            return false;
        }

        self.writer.begin_chart(&chart_id(device, descriptor));
        for (dimension, value) in descriptor.dimensions.iter().zip(values) {
            self.writer.write_dimension(dimension, value.as_ref());
        }
        self.writer.end_chart();
        true
    }

    /// Write everything emitted so far to `out` and flush it.
    pub fn flush_to<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        self.writer.flush_to(out)
    }

    /// Bytes emitted since the last flush
    pub fn pending(&self) -> &[u8] {
        self.writer.buffer()
    }
}

fn chart_id(device: &str, descriptor: &MetricDescriptor) -> String {
    format!("{}.{}", clean_device_name(device), descriptor.chart_id)
}
