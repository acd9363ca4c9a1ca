//! The collection loop: enumerate devices, declare their charts once, sample
//! them every cycle.

use crate::catalog::{MetricDescriptor, CATALOG};
use crate::emission::{clean_device_name, DeviceLabels, Emitter};
use crate::error::{Result, UpsdError};
use crate::registry::ChartRegistry;
use crate::source::{is_end_marker, DataSource, ListRow};
use crate::status::UpsStatusFlags;
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What happened during one collection cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// Devices enumerated this cycle
    pub devices: usize,
    /// Charts declared this cycle
    pub declared: usize,
    /// Sample blocks emitted this cycle
    pub sampled: usize,
    /// Devices whose discovery or sampling was cut short by an error
    pub failed: usize,
    /// Devices ignored because their chart ids collide with another device
    pub skipped: usize,
}

/// Polls a [`DataSource`] and turns its devices into charts.
///
/// A device goes through discovery the first time it is enumerated: its
/// variables are listed and one chart is declared per catalog entry it
/// exposes. Every cycle, including the discovery one, each declared chart is
/// sampled. Output is buffered and handed to the sink once per cycle.
pub struct PollLoop<S> {
    source: S,
    registry: ChartRegistry,
    emitter: Emitter,
    discovered: HashSet<String>,
    /// Cleaned chart id prefix -> the device that owns it
    prefixes: HashMap<String, String>,
    /// Devices left out because their prefix belongs to another device
    conflicting: HashSet<String>,
    job_name: String,
    update_every: Duration,
}

impl<S: DataSource> PollLoop<S> {
    pub fn new(source: S, update_every: Duration, job_name: impl Into<String>) -> Self {
        Self {
            source,
            registry: ChartRegistry::new(),
            emitter: Emitter::new(update_every.as_secs().max(1)),
            discovered: HashSet::new(),
            prefixes: HashMap::new(),
            conflicting: HashSet::new(),
            job_name: job_name.into(),
            update_every,
        }
    }

    pub fn registry(&self) -> &ChartRegistry {
        &self.registry
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Run one cycle, leaving its output in the buffer.
    ///
    /// Fails only when the devices cannot be enumerated; per-device errors are
    /// logged and counted in [`CycleStats::failed`].
    pub async fn collect(&mut self) -> Result<CycleStats> {
        let rows = self.source.list_devices().await?;
        let devices = device_names(rows);

        let mut stats = CycleStats {
            devices: devices.len(),
            ..Default::default()
        };

        for device in &devices {
            if !self.claim_prefix(device) {
                stats.skipped += 1;
                continue;
            }

            if !self.discovered.contains(device) {
                match self.discover(device).await {
                    Ok(declared) => {
                        info!("discovered {}: {} charts", device, declared);
                        stats.declared += declared;
                        self.discovered.insert(device.clone());
                    }
                    Err(e) => {
                        warn!("discovery of {} failed, retrying next cycle: {}", device, e);
                        stats.failed += 1;
                        continue;
                    }
                }
            }

            match self.sample(device).await {
                Ok(sampled) => stats.sampled += sampled,
                Err((sampled, e)) => {
                    warn!(
                        "sampling {} failed, skipping its remaining charts this cycle: {}",
                        device, e
                    );
                    stats.sampled += sampled;
                    stats.failed += 1;
                }
            }
        }

        Ok(stats)
    }

    /// Reserve the device's chart id prefix.
    ///
    /// Returns `false` when another device already owns the same cleaned
    /// name; its charts would be indistinguishable at the agent.
    fn claim_prefix(&mut self, device: &str) -> bool {
        let prefix = clean_device_name(device);
        match self.prefixes.get(&prefix) {
            Some(owner) if owner != device => {
                if self.conflicting.insert(device.to_string()) {
                    warn!(
                        "device {:?} maps to chart prefix {:?} already used by {:?}, ignoring it",
                        device, prefix, owner
                    );
                }
                false
            }
            Some(_) => true,
            None => {
                self.prefixes.insert(prefix, device.to_string());
                true
            }
        }
    }

    /// Declare a chart for every catalog variable the device exposes.
    async fn discover(&mut self, device: &str) -> Result<usize> {
        let rows = self.source.list_variables(device).await?;
        let variables = device_variables(device, rows);
        let labels = DeviceLabels::from_variables(device, &self.job_name, &variables);

        let mut declared = 0;
        for descriptor in CATALOG {
            if !variables.contains_key(descriptor.variable)
                || self.registry.is_registered(device, descriptor.chart_id)
            {
                continue;
            }
            self.emitter.declare(device, descriptor, &labels);
            self.registry.mark_registered(device, descriptor.chart_id);
            declared += 1;
        }
        Ok(declared)
    }

    /// Emit one sample per declared chart of the device.
    ///
    /// On a transport or daemon error the remaining charts are skipped; the
    /// error is returned along with the number of samples already emitted.
    async fn sample(&mut self, device: &str) -> std::result::Result<usize, (usize, UpsdError)> {
        let mut sampled = 0;
        for descriptor in CATALOG {
            if !self.registry.is_registered(device, descriptor.chart_id) {
                continue;
            }
            match self.source.get_variable(device, descriptor.variable).await {
                Ok(value) => {
                    if self.emit_sample(device, descriptor, &value) {
                        sampled += 1;
                    }
                }
                Err(UpsdError::NotSupported { .. }) => {
                    debug!("{} no longer reports {}", device, descriptor.variable);
                }
                Err(e) => return Err((sampled, e)),
            }
        }
        Ok(sampled)
    }

    fn emit_sample(&mut self, device: &str, descriptor: &MetricDescriptor, value: &str) -> bool {
        if descriptor.is_status() {
            let flags = UpsStatusFlags::decode(value);
            self.emitter
                .sample(device, descriptor, &flags.dimension_values())
        } else {
            self.emitter.sample(device, descriptor, &[value])
        }
    }

    /// Hand the output of the current cycle to `out`.
    pub fn flush_to<W: Write>(&mut self, out: &mut W) -> Result<()> {
        self.emitter.flush_to(out)?;
        Ok(())
    }

    /// Collect every `update_every` until `cancel` fires, or once if `once` is set.
    ///
    /// Cancellation is only observed between cycles. The loop ends with an
    /// error only when `out` can no longer be written. The source is closed
    /// in every case.
    pub async fn run<W: Write>(
        &mut self,
        out: &mut W,
        cancel: &CancellationToken,
        once: bool,
    ) -> Result<()> {
        let mut interval = tokio::time::interval(self.update_every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let result = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break Ok(()),
                _ = interval.tick() => {}
            }

            match self.collect().await {
                Ok(stats) => debug!(
                    "cycle done: devices={}, declared={}, sampled={}, failed={}, skipped={}",
                    stats.devices, stats.declared, stats.sampled, stats.failed, stats.skipped
                ),
                Err(e) => warn!("failed to enumerate devices: {}", e),
            }

            if let Err(e) = self.flush_to(out) {
                break Err(e);
            }

            if once {
                break Ok(());
            }
        };

        self.source.close().await;
        result
    }
}

/// Device names from `LIST UPS` rows, without the end marker or malformed rows.
fn device_names(rows: Vec<ListRow>) -> Vec<String> {
    rows.into_iter()
        .filter(|row| !is_end_marker(row))
        .filter_map(|mut row| {
            if row.len() < 2 {
                debug!("ignoring malformed device row: {:?}", row);
                return None;
            }
            Some(row.swap_remove(1))
        })
        .collect()
}

/// Variables from `LIST VAR` rows, without the end marker or malformed rows.
fn device_variables(device: &str, rows: Vec<ListRow>) -> HashMap<String, String> {
    rows.into_iter()
        .filter(|row| !is_end_marker(row))
        .filter_map(|row| {
            let mut words = row.into_iter();
            match (words.next(), words.next(), words.next(), words.next()) {
                (Some(_), Some(_), Some(name), Some(value)) => Some((name, value)),
                (first, second, third, _) => {
                    debug!(
                        "ignoring malformed variable row for {}: {:?} {:?} {:?}",
                        device, first, second, third
                    );
                    None
                }
            }
        })
        .collect()
}
