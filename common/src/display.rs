use crate::config::FanThresholds;
use crate::error::DisplayError;
use crate::types::{ConnectivityStatus, FanState, SensorReading, TimeReading};

pub const CHARS_PER_LINE: usize = 16;
pub const LINE_COUNT: usize = 4;

pub type ScreenLines = [String; LINE_COUNT];

pub trait StatusDisplay {
    fn show(&mut self, lines: &ScreenLines) -> Result<(), DisplayError>;
}

pub fn render_status(
    time: &TimeReading,
    sensor: &SensorReading,
    fan: FanState,
    network: ConnectivityStatus,
    thresholds: FanThresholds,
) -> ScreenLines {
    let (temp, humidity) = if sensor.valid {
        (
            sensor.temperature_f.to_string(),
            sensor.humidity_pct.to_string(),
        )
    } else {
        ("--".to_string(), "--".to_string())
    };

    [
        clip(&time.formatted),
        clip(&format!("T: {temp:>3} F  H: {humidity:>2}%")),
        clip(&format!("Fan: {:>3}  WiFi {}", fan.as_str(), network.glyph())),
        clip(&format!(
            "ON / OFF {} / {}",
            thresholds.on_temp_f, thresholds.off_temp_f
        )),
    ]
}

pub fn render_splash(message: &str) -> ScreenLines {
    let mut lines: ScreenLines = Default::default();
    for (slot, part) in lines.iter_mut().zip(message.lines()) {
        *slot = clip(part);
    }
    lines
}

fn clip(text: &str) -> String {
    text.chars().take(CHARS_PER_LINE).collect()
}
