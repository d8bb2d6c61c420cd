use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use tracing::{debug, info, warn};

use fancontrol_common::{
    render_splash, render_status, ClockService, ConnectivityStatus, DisplayError, EpochSource,
    FanRelay, FanState, MonitorConfig, ProbeError, ProbeSample, RelayError, SchedulerLoop,
    ScreenLines, SensorSampler, StatusDisplay, TaskError, TempHumidityProbe, ThermostatController,
};

const SENSOR_FAILURE_WARN_EVERY: u32 = 5;

// Triangle wave spanning 68..81 F so a simulation run crosses the on
// threshold going up and the off threshold coming back down.
struct WavingProbe {
    ticks: u64,
    fail_every: Option<u64>,
}

impl TempHumidityProbe for WavingProbe {
    fn sample(&mut self) -> Result<ProbeSample, ProbeError> {
        self.ticks = self.ticks.saturating_add(1);

        if let Some(every) = self.fail_every {
            if every > 0 && self.ticks % every == 0 {
                return Err(ProbeError::Timeout);
            }
        }

        let phase = self.ticks % 20;
        let offset = if phase < 10 { phase } else { 20 - phase };
        Ok(ProbeSample {
            temperature_f: 68.0 + offset as f32 * 1.4,
            humidity_pct: 52.0 + (self.ticks % 6) as f32 * 1.5,
        })
    }
}

struct SystemEpochSource;

impl EpochSource for SystemEpochSource {
    fn poll(&mut self) -> Option<u64> {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .ok()
            .map(|elapsed| elapsed.as_secs())
    }
}

struct ConsoleDisplay;

impl StatusDisplay for ConsoleDisplay {
    fn show(&mut self, lines: &ScreenLines) -> Result<(), DisplayError> {
        info!(target: "screen", "{}", lines.join(" | "));
        Ok(())
    }
}

struct LoggingRelay {
    last: Option<FanState>,
}

impl FanRelay for LoggingRelay {
    fn set_fan(&mut self, state: FanState) -> Result<(), RelayError> {
        if self.last != Some(state) {
            info!("fan relay -> {}", state.as_str());
            self.last = Some(state);
        }
        Ok(())
    }
}

struct HostMonitor {
    clock: ClockService,
    sampler: SensorSampler,
    controller: ThermostatController,
    probe: WavingProbe,
    epoch: SystemEpochSource,
    display: ConsoleDisplay,
    relay: LoggingRelay,
    connectivity: ConnectivityStatus,
}

fn sample_task(monitor: &mut HostMonitor, now_seconds: u64) -> Result<(), TaskError> {
    let reading = monitor.sampler.maybe_sample(now_seconds, &mut monitor.probe)?;
    debug!("sensor reading: {}F {}%", reading.temperature_f, reading.humidity_pct);
    Ok(())
}

fn control_task(monitor: &mut HostMonitor, _now_seconds: u64) -> Result<(), TaskError> {
    let reading = monitor.sampler.reading();
    let state = monitor.controller.evaluate(&reading);
    monitor.relay.set_fan(state)?;
    Ok(())
}

fn resync_task(monitor: &mut HostMonitor, _now_seconds: u64) -> Result<(), TaskError> {
    let reading = monitor.clock.sync(&mut monitor.epoch)?;
    debug!("clock re-synced at {}", reading.formatted);
    Ok(())
}

fn display_task(monitor: &mut HostMonitor, now_seconds: u64) -> Result<(), TaskError> {
    let time = monitor.clock.reading_for(now_seconds);
    let lines = render_status(
        &time,
        &monitor.sampler.reading(),
        monitor.controller.fan_state(),
        monitor.connectivity,
        monitor.controller.thresholds(),
    );
    monitor.display.show(&lines)?;
    Ok(())
}

fn load_config() -> anyhow::Result<MonitorConfig> {
    let mut config = MonitorConfig::default();

    if let Ok(path) = std::env::var("FANCTL_CONFIG") {
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file {path}"))?;
        config = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config file {path}"))?;
    }

    if let Some(interval) = std::env::var("FANCTL_SAMPLE_INTERVAL")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
    {
        config.sample_interval_seconds = interval;
    }

    config.sanitize();
    config.validate().context("invalid monitor configuration")?;
    Ok(config)
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = load_config()?;

    let fail_every = std::env::var("FANCTL_SIM_FAIL_EVERY")
        .ok()
        .and_then(|value| value.parse::<u64>().ok());

    let mut clock = ClockService::new(&config.timezone)?;
    let mut epoch = SystemEpochSource;
    let mut display = ConsoleDisplay;

    // Mirror the device boot screens so a simulated run reads the same.
    display.show(&render_splash("Connecting to WiFi"))?;
    info!("simulated network is always associated");

    display.show(&render_splash("Getting NTP Time"))?;
    let first = clock.sync(&mut epoch).context("initial time sync failed")?;
    display.show(&render_splash(&first.formatted))?;
    info!("time synced: {}", first.formatted);

    let mut scheduler = SchedulerLoop::new();
    scheduler.register("sensor-sample", config.sample_interval_seconds, sample_task);
    scheduler.register("fan-control", 0, control_task);
    scheduler.register("clock-resync", config.clock_resync_seconds, resync_task);
    scheduler.register("display-refresh", 0, display_task);

    let mut monitor = HostMonitor {
        clock,
        sampler: SensorSampler::new(config.sample_interval_seconds),
        controller: ThermostatController::new(config.thresholds)?,
        probe: WavingProbe {
            ticks: 0,
            fail_every,
        },
        epoch,
        display,
        relay: LoggingRelay { last: None },
        connectivity: ConnectivityStatus::Connected,
    };

    info!("monitor loop started (pause {} ms)", config.loop_pause_ms);

    let mut pause = tokio::time::interval(Duration::from_millis(config.loop_pause_ms));

    loop {
        pause.tick().await;

        let Some(now_seconds) = monitor.epoch.poll() else {
            warn!("system clock unavailable; skipping tick");
            continue;
        };

        let report = scheduler.tick(now_seconds, &mut monitor);
        for (name, err) in &report.failures {
            warn!("task {name} failed: {err}");
        }

        let failures = monitor.sampler.consecutive_failures();
        if failures > 0 && failures % SENSOR_FAILURE_WARN_EVERY == 0 {
            warn!("sensor has failed {failures} consecutive reads");
        }
    }
}
