use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// DHT22 needs about two seconds between conversions.
pub const MIN_SAMPLE_INTERVAL_SECONDS: u64 = 2;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FanThresholds {
    pub on_temp_f: i16,
    pub off_temp_f: i16,
}

impl Default for FanThresholds {
    fn default() -> Self {
        Self {
            on_temp_f: 75,
            off_temp_f: 72,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkConfig {
    pub wifi_ssid: String,
    pub wifi_pass: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            wifi_ssid: String::new(),
            wifi_pass: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitorConfig {
    pub network: NetworkConfig,
    pub ntp_server: String,
    pub timezone: String,
    pub sample_interval_seconds: u64,
    pub clock_resync_seconds: u64,
    pub loop_pause_ms: u64,
    #[serde(default)]
    pub thresholds: FanThresholds,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            ntp_server: "pool.ntp.org".to_string(),
            timezone: "America/New_York".to_string(),
            sample_interval_seconds: 60,
            clock_resync_seconds: 3_600,
            loop_pause_ms: 700,
            thresholds: FanThresholds::default(),
        }
    }
}

impl FanThresholds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.on_temp_f > self.off_temp_f {
            Ok(())
        } else {
            Err(ConfigError::ThresholdsInverted {
                on_temp_f: self.on_temp_f,
                off_temp_f: self.off_temp_f,
            })
        }
    }
}

impl MonitorConfig {
    pub fn sanitize(&mut self) {
        if self.sample_interval_seconds < MIN_SAMPLE_INTERVAL_SECONDS {
            self.sample_interval_seconds = MIN_SAMPLE_INTERVAL_SECONDS;
        }
        self.clock_resync_seconds = self.clock_resync_seconds.clamp(60, 86_400);
        self.loop_pause_ms = self.loop_pause_ms.clamp(100, 10_000);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.thresholds.validate()?;
        if self.timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(ConfigError::UnknownTimezone(self.timezone.clone()));
        }
        Ok(())
    }
}
