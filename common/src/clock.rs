use std::str::FromStr;

use chrono::{DateTime, Datelike, Timelike, Utc};
use chrono_tz::Tz;

use crate::error::{ConfigError, SyncError};
use crate::types::{LocalCalendar, TimeReading};

pub const TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

pub trait EpochSource {
    fn poll(&mut self) -> Option<u64>;
}

#[derive(Debug, Clone)]
pub struct ClockService {
    tz: Tz,
    last_sync: Option<TimeReading>,
}

impl ClockService {
    pub fn new(timezone: &str) -> Result<Self, ConfigError> {
        let tz = Tz::from_str(timezone)
            .map_err(|_| ConfigError::UnknownTimezone(timezone.to_string()))?;
        Ok(Self {
            tz,
            last_sync: None,
        })
    }

    pub fn timezone(&self) -> &'static str {
        self.tz.name()
    }

    pub fn last_sync(&self) -> Option<&TimeReading> {
        self.last_sync.as_ref()
    }

    // Stores whatever the source reports, including epochs earlier than the
    // previous sync. The scheduler copes with backward jumps on its own.
    pub fn sync<S>(&mut self, source: &mut S) -> Result<TimeReading, SyncError>
    where
        S: EpochSource + ?Sized,
    {
        let epoch_seconds = source.poll().ok_or(SyncError::Unavailable)?;
        let reading = self.reading_for(epoch_seconds);
        self.last_sync = Some(reading.clone());
        Ok(reading)
    }

    pub fn reading_for(&self, epoch_seconds: u64) -> TimeReading {
        let utc = DateTime::<Utc>::from_timestamp(epoch_seconds as i64, 0)
            .unwrap_or(DateTime::UNIX_EPOCH);
        let local = utc.with_timezone(&self.tz);

        TimeReading {
            epoch_seconds,
            local: LocalCalendar {
                year: local.year(),
                month: local.month(),
                day: local.day(),
                hour: local.hour(),
                minute: local.minute(),
                second: local.second(),
            },
            formatted: local.format(TIME_FORMAT).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    struct FixedSource(Option<u64>);

    impl EpochSource for FixedSource {
        fn poll(&mut self) -> Option<u64> {
            self.0
        }
    }

    // 2021-09-16 18:30:05 UTC, inside US daylight saving.
    const SUMMER_EPOCH: u64 = 1_631_817_005;
    // 2021-01-16 18:30:05 UTC, outside it.
    const WINTER_EPOCH: u64 = 1_610_821_805;

    #[test]
    fn applies_daylight_and_standard_offsets() {
        let clock = ClockService::new("America/New_York").unwrap();

        let summer = clock.reading_for(SUMMER_EPOCH);
        assert_eq!(summer.formatted, "2021/09/16 14:30:05");
        assert_eq!(summer.local.hour, 14);

        let winter = clock.reading_for(WINTER_EPOCH);
        assert_eq!(winter.formatted, "2021/01/16 13:30:05");
        assert_eq!(winter.local.hour, 13);
    }

    #[test]
    fn sync_stores_reading_and_failure_keeps_it() {
        let mut clock = ClockService::new("America/New_York").unwrap();
        assert!(clock.last_sync().is_none());

        let reading = clock.sync(&mut FixedSource(Some(SUMMER_EPOCH))).unwrap();
        assert_eq!(reading.epoch_seconds, SUMMER_EPOCH);

        let err = clock.sync(&mut FixedSource(None)).unwrap_err();
        assert_eq!(err, SyncError::Unavailable);
        assert_eq!(clock.last_sync().unwrap().epoch_seconds, SUMMER_EPOCH);
    }

    #[test]
    fn backward_epoch_is_stored_as_reported() {
        let mut clock = ClockService::new("America/New_York").unwrap();

        clock.sync(&mut FixedSource(Some(SUMMER_EPOCH))).unwrap();
        clock.sync(&mut FixedSource(Some(WINTER_EPOCH))).unwrap();

        assert_eq!(clock.last_sync().unwrap().epoch_seconds, WINTER_EPOCH);
    }

    #[test]
    fn formatted_text_reparses_to_the_same_instant() {
        let clock = ClockService::new("America/New_York").unwrap();
        let reading = clock.reading_for(SUMMER_EPOCH);

        let parsed = NaiveDateTime::parse_from_str(&reading.formatted, TIME_FORMAT).unwrap();
        assert_eq!(parsed.year(), reading.local.year);
        assert_eq!(parsed.month(), reading.local.month);
        assert_eq!(parsed.day(), reading.local.day);
        assert_eq!(parsed.hour(), reading.local.hour);
        assert_eq!(parsed.minute(), reading.local.minute);
        assert_eq!(parsed.second(), reading.local.second);
    }

    #[test]
    fn unknown_timezone_rejected() {
        let err = ClockService::new("Mars/Olympus_Mons").unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownTimezone("Mars/Olympus_Mons".to_string())
        );
    }

    #[test]
    fn out_of_range_epoch_falls_back_to_epoch_zero() {
        let clock = ClockService::new("America/New_York").unwrap();
        let epoch = i64::MAX as u64;
        let reading = clock.reading_for(epoch);
        // UTC midnight 1970 lands the previous evening in New York.
        assert_eq!(reading.local.year, 1969);
        assert_eq!(reading.epoch_seconds, epoch);
    }
}
