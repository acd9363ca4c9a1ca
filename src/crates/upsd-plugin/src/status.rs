//! Decoder for the NUT `ups.status` variable.
//!
//! Drivers report the device condition as a space-separated list of short
//! tokens, e.g. `OL CHRG` or `OB LB`. Tokens are compared as whole words:
//! several of them share a first letter (`BOOST`/`BYPASS`, `OB`/`OFF`/`OL`/`OVER`)
//! and must never be told apart by their prefix.
//!
//! See <https://networkupstools.org/docs/developer-guide.chunked/new-drivers.html#_status_data>

use bitflags::bitflags;

bitflags! {
    /// Conditions reported by a UPS. Flags are not mutually exclusive.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct UpsStatusFlags: u16 {
        /// On line (mains is present)
        const ON_LINE = 1 << 0;
        /// On battery
        const ON_BATTERY = 1 << 1;
        const LOW_BATTERY = 1 << 2;
        const HIGH_BATTERY = 1 << 3;
        /// The battery needs to be replaced
        const REPLACE_BATTERY = 1 << 4;
        const CHARGING = 1 << 5;
        /// The inverter is providing load power
        const DISCHARGING = 1 << 6;
        /// Bypass circuit is active, no battery protection is available
        const BYPASS = 1 << 7;
        /// Runtime calibration in progress
        const CALIBRATING = 1 << 8;
        /// Not supplying power to the load
        const OFFLINE = 1 << 9;
        const OVERLOADED = 1 << 10;
        /// Trimming incoming voltage ("buck" on some hardware)
        const TRIMMING = 1 << 11;
        /// Boosting incoming voltage
        const BOOSTING = 1 << 12;
        const FORCED_SHUTDOWN = 1 << 13;
        /// At least one token was not recognized
        const OTHER = 1 << 14;
    }
}

impl UpsStatusFlags {
    /// Flag order matching the dimensions of the status chart.
    pub const DIMENSION_ORDER: [UpsStatusFlags; 15] = [
        Self::ON_LINE,
        Self::ON_BATTERY,
        Self::LOW_BATTERY,
        Self::HIGH_BATTERY,
        Self::REPLACE_BATTERY,
        Self::CHARGING,
        Self::DISCHARGING,
        Self::BYPASS,
        Self::CALIBRATING,
        Self::OFFLINE,
        Self::OVERLOADED,
        Self::TRIMMING,
        Self::BOOSTING,
        Self::FORCED_SHUTDOWN,
        Self::OTHER,
    ];

    /// Map a single status token to its flag.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "OL" => Some(Self::ON_LINE),
            "OB" => Some(Self::ON_BATTERY),
            "LB" => Some(Self::LOW_BATTERY),
            "HB" => Some(Self::HIGH_BATTERY),
            "RB" => Some(Self::REPLACE_BATTERY),
            "CHRG" => Some(Self::CHARGING),
            "DISCHRG" => Some(Self::DISCHARGING),
            "BYPASS" => Some(Self::BYPASS),
            "CAL" => Some(Self::CALIBRATING),
            "OFF" => Some(Self::OFFLINE),
            "OVER" => Some(Self::OVERLOADED),
            "TRIM" => Some(Self::TRIMMING),
            "BOOST" => Some(Self::BOOSTING),
            "FSD" => Some(Self::FORCED_SHUTDOWN),
            _ => None,
        }
    }

    /// Decode a status string. Never fails: unknown tokens only raise [`Self::OTHER`].
    pub fn decode(status: &str) -> Self {
        status
            .split_whitespace()
            .map(|token| Self::from_token(token).unwrap_or(Self::OTHER))
            .fold(Self::empty(), |acc, flag| acc | flag)
    }

    /// Dimension values for the status chart: `"1"` for set flags, `"0"` otherwise.
    pub fn dimension_values(&self) -> [&'static str; 15] {
        Self::DIMENSION_ORDER.map(|flag| if self.contains(flag) { "1" } else { "0" })
    }
}
