use crate::error::TaskError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub interval_seconds: u64,
    pub last_run_seconds: Option<u64>,
}

impl ScheduleEntry {
    pub fn new(interval_seconds: u64) -> Self {
        Self {
            interval_seconds,
            last_run_seconds: None,
        }
    }

    pub fn is_due(&self, now_seconds: u64) -> bool {
        match self.last_run_seconds {
            None => true,
            Some(last) => now_seconds.saturating_sub(last) >= self.interval_seconds,
        }
    }

    fn mark_attempt(&mut self, now_seconds: u64) {
        self.last_run_seconds = Some(now_seconds);
    }
}

pub type TaskFn<C> = fn(&mut C, u64) -> Result<(), TaskError>;

struct Task<C> {
    name: &'static str,
    entry: ScheduleEntry,
    run: TaskFn<C>,
}

#[derive(Debug, Default)]
pub struct TickReport {
    pub ran: Vec<&'static str>,
    pub failures: Vec<(&'static str, TaskError)>,
}

pub struct SchedulerLoop<C> {
    tasks: Vec<Task<C>>,
}

impl<C> SchedulerLoop<C> {
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    // Interval 0 means due on every tick. Tasks run in registration order.
    pub fn register(&mut self, name: &'static str, interval_seconds: u64, run: TaskFn<C>) {
        self.tasks.push(Task {
            name,
            entry: ScheduleEntry::new(interval_seconds),
            run,
        });
    }

    pub fn tick(&mut self, now_seconds: u64, ctx: &mut C) -> TickReport {
        let mut report = TickReport::default();

        for task in &mut self.tasks {
            if !task.entry.is_due(now_seconds) {
                continue;
            }

            // The attempt owns the slot: a task that fails waits out its
            // full interval before the next try, and a long stall never
            // produces a burst of catch-up runs.
            task.entry.mark_attempt(now_seconds);

            match (task.run)(ctx, now_seconds) {
                Ok(()) => report.ran.push(task.name),
                Err(err) => report.failures.push((task.name, err)),
            }
        }

        report
    }

    pub fn entries(&self) -> impl Iterator<Item = (&'static str, ScheduleEntry)> + '_ {
        self.tasks.iter().map(|task| (task.name, task.entry))
    }
}

impl<C> Default for SchedulerLoop<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ClockService;
    use crate::config::FanThresholds;
    use crate::display::{render_status, ScreenLines};
    use crate::error::{ProbeError, SyncError};
    use crate::sensor::{ProbeSample, SensorSampler, TempHumidityProbe};
    use crate::thermostat::ThermostatController;
    use crate::types::ConnectivityStatus;

    #[derive(Default)]
    struct Counters {
        sample: u32,
        refresh: u32,
        fail: u32,
    }

    fn count_sample(ctx: &mut Counters, _now_seconds: u64) -> Result<(), TaskError> {
        ctx.sample += 1;
        Ok(())
    }

    fn count_refresh(ctx: &mut Counters, _now_seconds: u64) -> Result<(), TaskError> {
        ctx.refresh += 1;
        Ok(())
    }

    fn always_fails(ctx: &mut Counters, _now_seconds: u64) -> Result<(), TaskError> {
        ctx.fail += 1;
        Err(TaskError::Sync(SyncError::Unavailable))
    }

    #[test]
    fn fresh_tasks_run_on_the_first_tick() {
        let mut scheduler = SchedulerLoop::new();
        scheduler.register("sensor-sample", 60, count_sample);
        scheduler.register("display-refresh", 0, count_refresh);

        let mut ctx = Counters::default();
        let report = scheduler.tick(1_000, &mut ctx);

        assert_eq!(ctx.sample, 1);
        assert_eq!(ctx.refresh, 1);
        assert_eq!(report.ran, vec!["sensor-sample", "display-refresh"]);
    }

    #[test]
    fn interval_is_respected_between_runs() {
        let mut scheduler = SchedulerLoop::new();
        scheduler.register("sensor-sample", 60, count_sample);

        let mut ctx = Counters::default();
        scheduler.tick(0, &mut ctx);
        scheduler.tick(30, &mut ctx);
        scheduler.tick(59, &mut ctx);
        assert_eq!(ctx.sample, 1);

        scheduler.tick(60, &mut ctx);
        assert_eq!(ctx.sample, 2);
    }

    #[test]
    fn long_stall_runs_the_task_once_not_in_a_burst() {
        let mut scheduler = SchedulerLoop::new();
        scheduler.register("sensor-sample", 60, count_sample);

        let mut ctx = Counters::default();
        scheduler.tick(0, &mut ctx);
        // Ten intervals pass in one jump.
        scheduler.tick(600, &mut ctx);

        assert_eq!(ctx.sample, 2);
    }

    #[test]
    fn zero_interval_runs_every_tick() {
        let mut scheduler = SchedulerLoop::new();
        scheduler.register("display-refresh", 0, count_refresh);

        let mut ctx = Counters::default();
        scheduler.tick(0, &mut ctx);
        scheduler.tick(0, &mut ctx);
        scheduler.tick(1, &mut ctx);

        assert_eq!(ctx.refresh, 3);
    }

    #[test]
    fn failing_task_does_not_stop_later_tasks() {
        let mut scheduler = SchedulerLoop::new();
        scheduler.register("clock-resync", 0, always_fails);
        scheduler.register("sensor-sample", 0, count_sample);

        let mut ctx = Counters::default();
        let report = scheduler.tick(5, &mut ctx);

        assert_eq!(ctx.fail, 1);
        assert_eq!(ctx.sample, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, "clock-resync");
        assert_eq!(report.ran, vec!["sensor-sample"]);
    }

    #[test]
    fn failed_attempt_waits_out_the_full_interval() {
        let mut scheduler = SchedulerLoop::new();
        scheduler.register("clock-resync", 60, always_fails);

        let mut ctx = Counters::default();
        scheduler.tick(0, &mut ctx);
        scheduler.tick(1, &mut ctx);
        scheduler.tick(30, &mut ctx);
        assert_eq!(ctx.fail, 1);

        scheduler.tick(60, &mut ctx);
        assert_eq!(ctx.fail, 2);
    }

    #[test]
    fn backward_time_jump_pauses_until_the_clock_catches_up() {
        let mut scheduler = SchedulerLoop::new();
        scheduler.register("sensor-sample", 60, count_sample);

        let mut ctx = Counters::default();
        scheduler.tick(1_000, &mut ctx);
        // Clock stepped back; elapsed saturates to zero, so nothing is due.
        scheduler.tick(500, &mut ctx);
        scheduler.tick(1_059, &mut ctx);
        assert_eq!(ctx.sample, 1);

        scheduler.tick(1_060, &mut ctx);
        assert_eq!(ctx.sample, 2);
    }

    #[test]
    fn sampling_cadence_never_exceeds_the_configured_period() {
        struct RunLog {
            times: Vec<u64>,
        }

        fn log_run(ctx: &mut RunLog, now_seconds: u64) -> Result<(), TaskError> {
            ctx.times.push(now_seconds);
            Ok(())
        }

        let mut scheduler = SchedulerLoop::new();
        scheduler.register("sensor-sample", 60, log_run);

        let mut ctx = RunLog { times: Vec::new() };
        for tick in 0..2_000u64 {
            // 700 ms pacing collapses to repeated whole seconds.
            let now_seconds = tick * 7 / 10;
            scheduler.tick(now_seconds, &mut ctx);
        }

        assert!(ctx.times.windows(2).all(|pair| pair[1] - pair[0] >= 60));
        assert!(ctx.times.len() > 20);
    }

    // Full loop wiring: probe, sampler, controller and renderer driven by
    // the scheduler the way the monitor binary drives them.

    struct RecoveringProbe {
        fail_first: u32,
        calls: u32,
    }

    impl TempHumidityProbe for RecoveringProbe {
        fn sample(&mut self) -> Result<ProbeSample, ProbeError> {
            self.calls += 1;
            if self.calls <= self.fail_first {
                Ok(ProbeSample {
                    temperature_f: f32::NAN,
                    humidity_pct: f32::NAN,
                })
            } else {
                Ok(ProbeSample {
                    temperature_f: 80.0,
                    humidity_pct: 60.0,
                })
            }
        }
    }

    struct MonitorCtx {
        clock: ClockService,
        sampler: SensorSampler,
        controller: ThermostatController,
        probe: RecoveringProbe,
        screen: ScreenLines,
    }

    fn sample_task(ctx: &mut MonitorCtx, now_seconds: u64) -> Result<(), TaskError> {
        ctx.sampler.maybe_sample(now_seconds, &mut ctx.probe)?;
        Ok(())
    }

    fn control_task(ctx: &mut MonitorCtx, _now_seconds: u64) -> Result<(), TaskError> {
        let reading = ctx.sampler.reading();
        ctx.controller.evaluate(&reading);
        Ok(())
    }

    fn display_task(ctx: &mut MonitorCtx, now_seconds: u64) -> Result<(), TaskError> {
        let time = ctx.clock.reading_for(now_seconds);
        ctx.screen = render_status(
            &time,
            &ctx.sampler.reading(),
            ctx.controller.fan_state(),
            ConnectivityStatus::Connected,
            ctx.controller.thresholds(),
        );
        Ok(())
    }

    #[test]
    fn loop_shows_placeholders_until_the_sensor_recovers() {
        const BASE_EPOCH: u64 = 1_631_817_000;

        let mut scheduler = SchedulerLoop::new();
        scheduler.register("sensor-sample", 60, sample_task);
        scheduler.register("fan-control", 0, control_task);
        scheduler.register("display-refresh", 0, display_task);

        let mut ctx = MonitorCtx {
            clock: ClockService::new("America/New_York").unwrap(),
            sampler: SensorSampler::new(60),
            controller: ThermostatController::new(FanThresholds::default()).unwrap(),
            probe: RecoveringProbe {
                fail_first: 1,
                calls: 0,
            },
            screen: Default::default(),
        };

        let report = scheduler.tick(BASE_EPOCH, &mut ctx);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, "sensor-sample");
        assert_eq!(ctx.screen[1], "T:  -- F  H: --%");
        assert_eq!(ctx.screen[2], "Fan: OFF  WiFi +");

        let report = scheduler.tick(BASE_EPOCH + 60, &mut ctx);
        assert!(report.failures.is_empty());
        assert_eq!(ctx.screen[1], "T:  80 F  H: 60%");
        assert_eq!(ctx.screen[2], "Fan:  ON  WiFi +");
    }
}
