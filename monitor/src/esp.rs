use std::{
    thread,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

use anyhow::{anyhow, Context};
use dht_sensor::{dht22, DhtError};
use embedded_graphics::{
    mono_font::{ascii::FONT_6X10, MonoTextStyle, MonoTextStyleBuilder},
    pixelcolor::BinaryColor,
    prelude::*,
    text::Text,
};
use embedded_svc::wifi::{AuthMethod, ClientConfiguration, Configuration};
use esp_idf_hal::{
    delay::{Ets, FreeRtos},
    gpio::{AnyIOPin, AnyOutputPin, IOPin, InputOutput, Output, OutputPin, PinDriver, Pull},
    i2c::{I2cConfig, I2cDriver},
    units::Hertz,
};
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::{modem::Modem, prelude::Peripherals},
    log::EspLogger,
    nvs::EspDefaultNvsPartition,
    sntp::{EspSntp, OperatingMode, SntpConf, SyncMode, SyncStatus},
    wifi::{BlockingWifi, EspWifi},
};
use log::{error, info, warn};
use ssd1306::{
    mode::BufferedGraphicsMode, prelude::*, size::DisplaySize128x64, I2CDisplayInterface, Ssd1306,
};

use fancontrol_common::{
    render_splash, render_status, ClockService, ConnectivityStatus, DisplayError, EpochSource,
    FanRelay, FanState, MonitorConfig, ProbeError, ProbeSample, RelayError, SchedulerLoop,
    ScreenLines, SensorSampler, StatusDisplay, TaskError, TempHumidityProbe, ThermostatController,
    TimeReading,
};

// DHT22 data on GPIO4, fan relay on GPIO16, SSD1306 on the standard
// I2C pins (SDA GPIO21, SCL GPIO22).
const DHT_PIN: i32 = 4;
const RELAY_PIN: i32 = 16;

const I2C_FREQ_HZ: u32 = 400_000;

const WATCHDOG_TIMEOUT_SEC: u32 = 90;
const WIFI_RETRY_DELAY_MS: u64 = 3_000;
const WIFI_RESTART_GRACE_MS: u64 = 300_000;
const SNTP_SYNC_TIMEOUT_MS: u64 = 20_000;
const SNTP_POLL_DELAY_MS: u32 = 250;
// Epochs before 2001-09-09 mean the clock is still running from reset.
const EPOCH_SANITY_FLOOR: u64 = 1_000_000_000;
const FATAL_RESTART_DELAY_MS: u32 = 10_000;
const SENSOR_FAILURE_WARN_EVERY: u32 = 5;

const WIFI_SSID: &str = match option_env!("FANCTL_WIFI_SSID") {
    Some(ssid) => ssid,
    None => "",
};
const WIFI_PASS: &str = match option_env!("FANCTL_WIFI_PASS") {
    Some(pass) => pass,
    None => "",
};

struct DhtProbe {
    pin: PinDriver<'static, AnyIOPin, InputOutput>,
    delay: Ets,
}

impl DhtProbe {
    fn new(pin: AnyIOPin) -> anyhow::Result<Self> {
        let mut pin = PinDriver::input_output_od(pin)?;
        pin.set_pull(Pull::Up)?;
        pin.set_high()?;
        Ok(Self { pin, delay: Ets })
    }
}

impl TempHumidityProbe for DhtProbe {
    fn sample(&mut self) -> Result<ProbeSample, ProbeError> {
        if let Err(err) = self.pin.set_high() {
            return Err(ProbeError::Bus(format!(
                "failed to raise DHT22 line on GPIO{DHT_PIN}: {err}"
            )));
        }

        match dht22::blocking::read(&mut self.delay, &mut self.pin) {
            Ok(reading) => Ok(ProbeSample {
                temperature_f: celsius_to_fahrenheit(reading.temperature),
                humidity_pct: reading.relative_humidity,
            }),
            Err(DhtError::Timeout) => Err(ProbeError::Timeout),
            Err(DhtError::ChecksumMismatch) => Err(ProbeError::Checksum),
            Err(err) => Err(ProbeError::Bus(format!("{err:?}"))),
        }
    }
}

type Oled = Ssd1306<
    I2CInterface<I2cDriver<'static>>,
    DisplaySize128x64,
    BufferedGraphicsMode<DisplaySize128x64>,
>;

struct OledStatus {
    display: Oled,
    style: MonoTextStyle<'static, BinaryColor>,
}

impl OledStatus {
    fn new(i2c: I2cDriver<'static>) -> anyhow::Result<Self> {
        let interface = I2CDisplayInterface::new(i2c);
        let mut display = Ssd1306::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
            .into_buffered_graphics_mode();
        display
            .init()
            .map_err(|err| anyhow!("display init failed: {err:?}"))?;

        let style = MonoTextStyleBuilder::new()
            .font(&FONT_6X10)
            .text_color(BinaryColor::On)
            .build();

        Ok(Self { display, style })
    }
}

impl StatusDisplay for OledStatus {
    fn show(&mut self, lines: &ScreenLines) -> Result<(), DisplayError> {
        self.display
            .clear(BinaryColor::Off)
            .map_err(|err| DisplayError(format!("{err:?}")))?;

        for (index, line) in lines.iter().enumerate() {
            let baseline = 12 + index as i32 * 16;
            Text::new(line, Point::new(5, baseline), self.style)
                .draw(&mut self.display)
                .map_err(|err| DisplayError(format!("{err:?}")))?;
        }

        self.display
            .flush()
            .map_err(|err| DisplayError(format!("{err:?}")))
    }
}

struct RelayPin {
    pin: PinDriver<'static, AnyOutputPin, Output>,
}

impl RelayPin {
    fn new(pin: AnyOutputPin) -> anyhow::Result<Self> {
        let mut pin = PinDriver::output(pin)?;
        // Fan stays off until the controller says otherwise.
        pin.set_low()?;
        Ok(Self { pin })
    }
}

impl FanRelay for RelayPin {
    fn set_fan(&mut self, state: FanState) -> Result<(), RelayError> {
        let result = match state {
            FanState::On => self.pin.set_high(),
            FanState::Off => self.pin.set_low(),
        };
        result.map_err(|err| RelayError(format!("GPIO{RELAY_PIN}: {err}")))
    }
}

struct SntpEpochSource {
    sntp: EspSntp<'static>,
    synced: bool,
}

impl SntpEpochSource {
    fn new(server: &str) -> anyhow::Result<Self> {
        let conf = SntpConf {
            servers: core::array::from_fn(|_| server),
            sync_mode: SyncMode::Immediate,
            operating_mode: OperatingMode::Poll,
        };
        let sntp = EspSntp::new(&conf)?;
        Ok(Self {
            sntp,
            synced: false,
        })
    }
}

impl EpochSource for SntpEpochSource {
    fn poll(&mut self) -> Option<u64> {
        if self.sntp.get_sync_status() == SyncStatus::Completed {
            self.synced = true;
        }

        let epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .ok()
            .map(|elapsed| elapsed.as_secs())?;

        if self.synced || epoch >= EPOCH_SANITY_FLOOR {
            Some(epoch)
        } else {
            None
        }
    }
}

struct EspMonitor {
    clock: ClockService,
    sampler: SensorSampler,
    controller: ThermostatController,
    probe: DhtProbe,
    epoch: SntpEpochSource,
    display: OledStatus,
    relay: RelayPin,
    connectivity: ConnectivityStatus,
}

fn sample_task(monitor: &mut EspMonitor, now_seconds: u64) -> Result<(), TaskError> {
    let reading = monitor.sampler.maybe_sample(now_seconds, &mut monitor.probe)?;
    info!("[DHT22] {}F {}%", reading.temperature_f, reading.humidity_pct);
    Ok(())
}

fn control_task(monitor: &mut EspMonitor, _now_seconds: u64) -> Result<(), TaskError> {
    let reading = monitor.sampler.reading();
    let state = monitor.controller.evaluate(&reading);
    monitor.relay.set_fan(state)?;
    Ok(())
}

fn resync_task(monitor: &mut EspMonitor, _now_seconds: u64) -> Result<(), TaskError> {
    let reading = monitor.clock.sync(&mut monitor.epoch)?;
    info!("clock re-synced at {}", reading.formatted);
    Ok(())
}

fn display_task(monitor: &mut EspMonitor, now_seconds: u64) -> Result<(), TaskError> {
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

pub fn run() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    EspLogger::initialize_default();

    if let Err(err) = boot_and_serve() {
        error!("fatal error, restarting: {err:#}");
        FreeRtos::delay_ms(FATAL_RESTART_DELAY_MS);
        unsafe { esp_idf_svc::sys::esp_restart() };
    }

    Ok(())
}

fn boot_and_serve() -> anyhow::Result<()> {
    let mut config = MonitorConfig::default();
    config.network.wifi_ssid = WIFI_SSID.to_string();
    config.network.wifi_pass = WIFI_PASS.to_string();
    config.sanitize();
    config.validate().context("invalid monitor configuration")?;

    let sys_loop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;
    let Peripherals {
        modem, pins, i2c0, ..
    } = Peripherals::take()?;

    let i2c = I2cDriver::new(
        i2c0,
        pins.gpio21,
        pins.gpio22,
        &I2cConfig::new().baudrate(Hertz(I2C_FREQ_HZ)),
    )
    .context("failed to open display i2c bus")?;
    let mut display = OledStatus::new(i2c).context("failed to initialize status display")?;

    splash(&mut display, "Connecting to WiFi");
    let esp_wifi = connect_wifi(modem, sys_loop, nvs_partition, &config)?;
    disable_wifi_power_save();

    let ip = esp_wifi.sta_netif().get_ip_info()?.ip;
    info!("wifi connected, ip {ip}");
    splash(&mut display, &format!("WiFi Connected\nIP Address:\n{ip}"));
    FreeRtos::delay_ms(2_000);

    splash(&mut display, "Getting NTP Time");
    let mut clock = ClockService::new(&config.timezone)?;
    let mut epoch =
        SntpEpochSource::new(&config.ntp_server).context("failed to start sntp client")?;
    let first = wait_initial_sync(&mut clock, &mut epoch).context("initial time sync failed")?;
    info!("time synced: {}", first.formatted);
    splash(&mut display, &first.formatted);
    FreeRtos::delay_ms(1_000);

    let probe =
        DhtProbe::new(pins.gpio4.downgrade()).context("failed to initialize DHT22 probe")?;
    let relay =
        RelayPin::new(pins.gpio16.downgrade_output()).context("failed to initialize fan relay")?;

    init_watchdog(WATCHDOG_TIMEOUT_SEC)?;
    add_current_task_to_watchdog()?;

    let mut scheduler = SchedulerLoop::new();
    scheduler.register("sensor-sample", config.sample_interval_seconds, sample_task);
    scheduler.register("fan-control", 0, control_task);
    scheduler.register("clock-resync", config.clock_resync_seconds, resync_task);
    scheduler.register("display-refresh", 0, display_task);

    let mut monitor = EspMonitor {
        clock,
        sampler: SensorSampler::new(config.sample_interval_seconds),
        controller: ThermostatController::new(config.thresholds)?,
        probe,
        epoch,
        display,
        relay,
        connectivity: ConnectivityStatus::Connected,
    };

    // Keep wifi alive for the program lifetime.
    let _wifi = esp_wifi;
    let mut wifi_disconnected_since: Option<Instant> = None;

    info!("monitor loop started (pause {} ms)", config.loop_pause_ms);

    loop {
        feed_watchdog();
        maintain_wifi_health(&mut wifi_disconnected_since);

        monitor.connectivity = if is_wifi_station_connected() {
            ConnectivityStatus::Connected
        } else {
            ConnectivityStatus::Offline
        };

        let now_seconds = match monitor.epoch.poll() {
            Some(now_seconds) => now_seconds,
            None => {
                warn!("device clock unavailable; skipping tick");
                FreeRtos::delay_ms(config.loop_pause_ms as u32);
                continue;
            }
        };

        let report = scheduler.tick(now_seconds, &mut monitor);
        for (name, err) in &report.failures {
            warn!("task {name} failed: {err}");
        }

        let failures = monitor.sampler.consecutive_failures();
        if failures > 0 && failures % SENSOR_FAILURE_WARN_EVERY == 0 {
            warn!("sensor has failed {failures} consecutive reads");
        }

        FreeRtos::delay_ms(config.loop_pause_ms as u32);
    }
}

fn splash(display: &mut OledStatus, message: &str) {
    if let Err(err) = display.show(&render_splash(message)) {
        warn!("splash failed: {err}");
    }
}

fn wait_initial_sync(
    clock: &mut ClockService,
    epoch: &mut SntpEpochSource,
) -> anyhow::Result<TimeReading> {
    let deadline = Instant::now() + Duration::from_millis(SNTP_SYNC_TIMEOUT_MS);

    loop {
        match clock.sync(epoch) {
            Ok(reading) => return Ok(reading),
            Err(err) => {
                if Instant::now() >= deadline {
                    return Err(err)
                        .context(format!("no sntp response within {SNTP_SYNC_TIMEOUT_MS} ms"));
                }
                FreeRtos::delay_ms(SNTP_POLL_DELAY_MS);
            }
        }
    }
}

fn connect_wifi(
    modem: Modem,
    sys_loop: EspSystemEventLoop,
    nvs_partition: EspDefaultNvsPartition,
    config: &MonitorConfig,
) -> anyhow::Result<EspWifi<'static>> {
    let network = &config.network;
    if network.wifi_ssid.is_empty() {
        return Err(anyhow!(
            "wifi ssid is empty; set FANCTL_WIFI_SSID at build time"
        ));
    }

    let mut esp_wifi = EspWifi::new(modem, sys_loop.clone(), Some(nvs_partition))?;
    let mut wifi = BlockingWifi::wrap(&mut esp_wifi, sys_loop)?;

    let auth_method = if network.wifi_pass.is_empty() {
        AuthMethod::None
    } else {
        AuthMethod::WPAWPA2Personal
    };

    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid: network
            .wifi_ssid
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("wifi ssid too long"))?,
        password: network
            .wifi_pass
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("wifi password too long"))?,
        auth_method,
        ..Default::default()
    }))?;

    wifi.start()?;
    info!("wifi started, connecting to `{}`", network.wifi_ssid);

    // No offline mode: boot blocks here until association succeeds.
    let mut attempt: u32 = 0;
    loop {
        attempt = attempt.saturating_add(1);
        info!("wifi connect attempt {attempt}");
        match wifi.connect() {
            Ok(()) => match wifi.wait_netif_up() {
                Ok(()) => {
                    info!("wifi connected and netif up on attempt {attempt}");
                    break;
                }
                Err(err) => warn!("wifi netif up failed on attempt {attempt}: {err:#}"),
            },
            Err(err) => warn!("wifi connect failed on attempt {attempt}: {err:#}"),
        }

        let _ = wifi.disconnect();
        thread::sleep(Duration::from_millis(WIFI_RETRY_DELAY_MS));
    }

    Ok(esp_wifi)
}

fn init_watchdog(timeout_sec: u32) -> anyhow::Result<()> {
    let config = esp_idf_svc::sys::esp_task_wdt_config_t {
        timeout_ms: timeout_sec.saturating_mul(1000),
        idle_core_mask: 0,
        trigger_panic: true,
    };
    let rc = unsafe { esp_idf_svc::sys::esp_task_wdt_init(&config) };
    if rc == esp_idf_svc::sys::ESP_OK || rc == esp_idf_svc::sys::ESP_ERR_INVALID_STATE {
        return Ok(());
    }
    Err(anyhow!("esp_task_wdt_init failed with code {}", rc))
}

fn add_current_task_to_watchdog() -> anyhow::Result<()> {
    let rc = unsafe { esp_idf_svc::sys::esp_task_wdt_add(core::ptr::null_mut()) };
    if rc == esp_idf_svc::sys::ESP_OK || rc == esp_idf_svc::sys::ESP_ERR_INVALID_STATE {
        return Ok(());
    }
    Err(anyhow!("esp_task_wdt_add failed with code {}", rc))
}

fn feed_watchdog() {
    let _ = unsafe { esp_idf_svc::sys::esp_task_wdt_reset() };
}

fn disable_wifi_power_save() {
    let rc = unsafe { esp_idf_svc::sys::esp_wifi_set_ps(0) };
    if rc == esp_idf_svc::sys::ESP_OK {
        info!("wifi power save disabled");
    } else {
        warn!("failed to disable wifi power save: esp_err_t={rc}");
    }
}

fn is_wifi_station_connected() -> bool {
    let mut ap_info = esp_idf_svc::sys::wifi_ap_record_t::default();
    let rc = unsafe { esp_idf_svc::sys::esp_wifi_sta_get_ap_info(&mut ap_info) };
    rc == esp_idf_svc::sys::ESP_OK
}

fn maintain_wifi_health(wifi_disconnected_since: &mut Option<Instant>) {
    if is_wifi_station_connected() {
        *wifi_disconnected_since = None;
        return;
    }

    match wifi_disconnected_since {
        Some(disconnected_since)
            if disconnected_since.elapsed().as_millis() as u64 >= WIFI_RESTART_GRACE_MS =>
        {
            warn!(
                "wifi disconnected for {}s; restarting device for recovery",
                WIFI_RESTART_GRACE_MS / 1000
            );
            thread::sleep(Duration::from_millis(100));
            unsafe { esp_idf_svc::sys::esp_restart() };
        }
        Some(_) => {}
        None => *wifi_disconnected_since = Some(Instant::now()),
    }
}

fn celsius_to_fahrenheit(temp_c: f32) -> f32 {
    temp_c * 9.0 / 5.0 + 32.0
}
