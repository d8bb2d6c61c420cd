use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FanState {
    Off,
    On,
}

impl FanState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::On => "ON",
        }
    }

    pub fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConnectivityStatus {
    Connecting,
    Connected,
    Offline,
}

impl ConnectivityStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "CONNECTING",
            Self::Connected => "CONNECTED",
            Self::Offline => "OFFLINE",
        }
    }

    // Status-line marker: "+" while associated, "x" otherwise.
    pub fn glyph(self) -> &'static str {
        match self {
            Self::Connected => "+",
            Self::Connecting | Self::Offline => "x",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorReading {
    #[serde(rename = "temperatureF")]
    pub temperature_f: i16,
    #[serde(rename = "humidityPct")]
    pub humidity_pct: i16,
    pub valid: bool,
    #[serde(rename = "sampledAtSeconds")]
    pub sampled_at_seconds: u64,
}

impl Default for SensorReading {
    fn default() -> Self {
        Self {
            temperature_f: 0,
            humidity_pct: 0,
            valid: false,
            sampled_at_seconds: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalCalendar {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeReading {
    #[serde(rename = "epochSeconds")]
    pub epoch_seconds: u64,
    pub local: LocalCalendar,
    pub formatted: String,
}
