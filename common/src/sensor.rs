use crate::config::MIN_SAMPLE_INTERVAL_SECONDS;
use crate::error::{ProbeError, SampleError};
use crate::types::SensorReading;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeSample {
    pub temperature_f: f32,
    pub humidity_pct: f32,
}

impl ProbeSample {
    pub fn is_finite(&self) -> bool {
        self.temperature_f.is_finite() && self.humidity_pct.is_finite()
    }
}

pub trait TempHumidityProbe {
    fn sample(&mut self) -> Result<ProbeSample, ProbeError>;
}

#[derive(Debug, Clone)]
pub struct SensorSampler {
    min_interval_seconds: u64,
    last_attempt_seconds: Option<u64>,
    reading: SensorReading,
    consecutive_failures: u32,
}

impl SensorSampler {
    pub fn new(min_interval_seconds: u64) -> Self {
        Self {
            min_interval_seconds: min_interval_seconds.max(MIN_SAMPLE_INTERVAL_SECONDS),
            last_attempt_seconds: None,
            reading: SensorReading::default(),
            consecutive_failures: 0,
        }
    }

    pub fn reading(&self) -> SensorReading {
        self.reading
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn is_due(&self, now_seconds: u64) -> bool {
        match self.last_attempt_seconds {
            None => true,
            Some(last) => now_seconds.saturating_sub(last) >= self.min_interval_seconds,
        }
    }

    pub fn maybe_sample<P>(
        &mut self,
        now_seconds: u64,
        probe: &mut P,
    ) -> Result<SensorReading, SampleError>
    where
        P: TempHumidityProbe + ?Sized,
    {
        if !self.is_due(now_seconds) {
            return Ok(self.reading);
        }

        // The attempt consumes the interval slot whether or not the read
        // works, so a flaky sensor is retried one interval later, not on
        // every tick.
        self.last_attempt_seconds = Some(now_seconds);

        let sample = match probe.sample() {
            Ok(sample) => sample,
            Err(err) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                return Err(SampleError::from(err));
            }
        };

        if !sample.is_finite() {
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
            return Err(SampleError::NotANumber);
        }

        self.reading = SensorReading {
            temperature_f: sample.temperature_f.round() as i16,
            humidity_pct: sample.humidity_pct.round() as i16,
            valid: true,
            sampled_at_seconds: now_seconds,
        };
        self.consecutive_failures = 0;
        Ok(self.reading)
    }
}
