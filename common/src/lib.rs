pub mod clock;
pub mod config;
pub mod display;
pub mod error;
pub mod schedule;
pub mod sensor;
pub mod thermostat;
pub mod types;

pub use clock::{ClockService, EpochSource, TIME_FORMAT};
pub use config::{FanThresholds, MonitorConfig, NetworkConfig, MIN_SAMPLE_INTERVAL_SECONDS};
pub use display::{
    render_splash, render_status, ScreenLines, StatusDisplay, CHARS_PER_LINE, LINE_COUNT,
};
pub use error::{
    ConfigError, DisplayError, ProbeError, RelayError, SampleError, SyncError, TaskError,
};
pub use schedule::{ScheduleEntry, SchedulerLoop, TaskFn, TickReport};
pub use sensor::{ProbeSample, SensorSampler, TempHumidityProbe};
pub use thermostat::{FanRelay, ThermostatController};
pub use types::{ConnectivityStatus, FanState, LocalCalendar, SensorReading, TimeReading};
