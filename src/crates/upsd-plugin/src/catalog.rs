//! Static mapping from NUT variable names to chart metadata.
//!
//! The catalog is data only: adding a metric means adding an entry here, the
//! decoder and the emission code never change.

/// Chart type supported by Netdata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChartType {
    #[default]
    Line,
    Area,
}

impl ChartType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartType::Line => "line",
            ChartType::Area => "area",
        }
    }
}

/// Chart metadata for a single NUT variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricDescriptor {
    /// NUT variable name (e.g. `battery.charge`), unique in the catalog
    pub variable: &'static str,
    /// Chart id, prefixed with the cleaned device name on output
    pub chart_id: &'static str,
    pub title: &'static str,
    pub units: &'static str,
    pub family: &'static str,
    pub context: &'static str,
    pub chart_type: ChartType,
    /// Priority for ordering (lower = higher priority)
    pub priority: u32,
    /// Dimension names, in emission order
    pub dimensions: &'static [&'static str],
}

impl MetricDescriptor {
    pub fn is_status(&self) -> bool {
        self.variable == STATUS_VARIABLE
    }
}

/// The aggregate status variable, decoded into one dimension per flag.
pub const STATUS_VARIABLE: &str = "ups.status";

/// Dimensions of the status chart, in the order of [`crate::UpsStatusFlags::DIMENSION_ORDER`].
pub const STATUS_DIMENSIONS: &[&str] = &[
    "on_line",
    "on_battery",
    "low_battery",
    "high_battery",
    "replace_battery",
    "charging",
    "discharging",
    "bypass",
    "calibration",
    "offline",
    "overloaded",
    "trim_input_voltage",
    "boost_input_voltage",
    "forced_shutdown",
    "other",
];

/// Device variables exported as chart labels: (NUT variable, label key).
pub const LABEL_VARIABLES: &[(&str, &str)] = &[
    ("battery.type", "battery_type"),
    ("device.model", "device_model"),
    ("device.serial", "device_serial"),
    ("device.mfr", "device_manufacturer"),
    ("device.type", "device_type"),
];

macro_rules! descriptor {
    ($variable:literal, $chart_id:literal, $title:literal, $units:literal, $family:literal,
     $context:literal, $chart_type:ident, $priority:literal, $dimensions:expr) => {
        MetricDescriptor {
            variable: $variable,
            chart_id: $chart_id,
            title: $title,
            units: $units,
            family: $family,
            context: $context,
            chart_type: ChartType::$chart_type,
            priority: $priority,
            dimensions: $dimensions,
        }
    };
}

/// Every chart the plugin knows about, in declaration order.
pub static CATALOG: &[MetricDescriptor] = &[
    descriptor!("ups.load", "load_percentage", "UPS load", "percentage", "ups",
        "upsd.ups_load", Area, 70000, &["load"]),
    // not a standard NUT variable, some drivers export it anyway
    descriptor!("ups.load_usage", "load_usage", "UPS load usage (power output)", "Watts", "ups",
        "upsd.ups_load_usage", Line, 70001, &["load_usage"]),
    descriptor!("ups.status", "status", "UPS status", "status", "ups",
        "upsd.ups_status", Line, 70002, STATUS_DIMENSIONS),
    descriptor!("ups.temperature", "temperature", "UPS temperature", "Celsius", "ups",
        "upsd.ups_temperature", Line, 70003, &["temperature"]),
    descriptor!("battery.charge", "battery_charge_percentage", "UPS Battery charge", "percentage", "battery",
        "upsd.ups_battery_charge", Area, 70004, &["charge"]),
    descriptor!("battery.runtime", "battery_estimated_runtime", "UPS Battery estimated runtime", "seconds", "battery",
        "upsd.ups_battery_estimated_runtime", Line, 70005, &["runtime"]),
    descriptor!("battery.voltage", "battery_voltage", "UPS Battery voltage", "Volts", "battery",
        "upsd.ups_battery_voltage", Line, 70006, &["voltage"]),
    descriptor!("battery.voltage.nominal", "battery_voltage_nominal", "UPS Battery voltage nominal", "Volts", "battery",
        "upsd.ups_battery_voltage_nominal", Line, 70007, &["nominal_voltage"]),
    descriptor!("input.voltage", "input_voltage", "UPS Input voltage", "Volts", "input",
        "upsd.ups_input_voltage", Line, 70008, &["voltage"]),
    descriptor!("input.voltage.nominal", "input_voltage_nominal", "UPS Input voltage nominal", "Volts", "input",
        "upsd.ups_input_voltage_nominal", Line, 70009, &["nominal_voltage"]),
    descriptor!("input.current", "input_current", "UPS Input current", "Ampere", "input",
        "upsd.ups_input_current", Line, 70010, &["current"]),
    descriptor!("input.current.nominal", "input_current_nominal", "UPS Input current nominal", "Ampere", "input",
        "upsd.ups_input_current_nominal", Line, 70011, &["nominal_current"]),
    descriptor!("input.frequency", "input_frequency", "UPS Input frequency", "Hz", "input",
        "upsd.ups_input_frequency", Line, 70012, &["frequency"]),
    descriptor!("input.frequency.nominal", "input_frequency_nominal", "UPS Input frequency nominal", "Hz", "input",
        "upsd.ups_input_frequency_nominal", Line, 70013, &["nominal_frequency"]),
    descriptor!("output.voltage", "output_voltage", "UPS Output voltage", "Volts", "output",
        "upsd.ups_output_voltage", Line, 70014, &["voltage"]),
    descriptor!("output.voltage.nominal", "output_voltage_nominal", "UPS Output voltage nominal", "Volts", "output",
        "upsd.ups_output_voltage_nominal", Line, 70015, &["nominal_voltage"]),
    descriptor!("output.current", "output_current", "UPS Output current", "Ampere", "output",
        "upsd.ups_output_current", Line, 70016, &["current"]),
    descriptor!("output.current.nominal", "output_current_nominal", "UPS Output current nominal", "Ampere", "output",
        "upsd.ups_output_current_nominal", Line, 70017, &["nominal_current"]),
    descriptor!("output.frequency", "output_frequency", "UPS Output frequency", "Hz", "output",
        "upsd.ups_output_frequency", Line, 70018, &["frequency"]),
    descriptor!("output.frequency.nominal", "output_frequency_nominal", "UPS Output frequency nominal", "Hz", "output",
        "upsd.ups_output_frequency_nominal", Line, 70019, &["nominal_frequency"]),
];

/// Find the chart descriptor for a NUT variable.
///
/// Absence is the common case: devices expose many variables we do not chart.
pub fn lookup(variable: &str) -> Option<&'static MetricDescriptor> {
    CATALOG.iter().find(|d| d.variable == variable)
}
