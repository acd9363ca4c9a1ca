//! Tracks which charts have been declared to the agent, per device.

use std::collections::{HashMap, HashSet};

/// Registry of declared (device, chart) pairs.
///
/// Declaring a chart costs a CHART/CLABEL/DIMENSION block and happens once per
/// device for the lifetime of the process; sampling happens every cycle and is
/// only allowed for pairs present here. Entries are never removed.
#[derive(Debug, Default)]
pub struct ChartRegistry {
    charts: HashMap<String, HashSet<&'static str>>,
}

impl ChartRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_registered(&self, device: &str, chart_id: &str) -> bool {
        self.charts
            .get(device)
            .is_some_and(|charts| charts.contains(chart_id))
    }

    /// Mark a chart as declared. Returns `false` if it already was.
    pub fn mark_registered(&mut self, device: &str, chart_id: &'static str) -> bool {
        match self.charts.get_mut(device) {
            Some(charts) => charts.insert(chart_id),
            None => {
                self.charts
                    .insert(device.to_string(), HashSet::from([chart_id]));
                true
            }
        }
    }

    /// Number of charts declared for a device.
    pub fn chart_count(&self, device: &str) -> usize {
        self.charts.get(device).map_or(0, HashSet::len)
    }
}
