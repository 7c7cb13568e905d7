use std::{str::FromStr, time::Duration};

use chrono::Local;
use croner::{errors::CronError, Cron};
use serde::{de, Deserialize, Deserializer};
use snafu::{ResultExt, Snafu};

/// When the watch loop polls next: a fixed interval or a cron expression.
#[derive(Debug)]
pub enum TimeSchedule {
    Interval(Duration),
    Cron { expression: String, cron: Cron },
}

impl TimeSchedule {
    pub fn get_duration_till_next_occurrence(&self) -> Result<Duration, ScheduleError> {
        match self {
            TimeSchedule::Interval(duration) => Ok(*duration),
            TimeSchedule::Cron { expression, cron } => {
                let now = Local::now();
                // Exclusive, so a poll finishing within the matching second does not fire twice.
                let next = cron.find_next_occurrence(&now, false).context(NoNextPollSnafu { expression })?;
                (next - now).to_std().context(NextPollInPastSnafu)
            }
        }
    }
}

impl FromStr for TimeSchedule {
    type Err = ScheduleError;

    /// A humantime interval ("30s", "2m") or a 5/6 field cron expression.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if let Ok(interval) = humantime::parse_duration(value) {
            return Ok(TimeSchedule::Interval(interval));
        }
        let cron = Cron::new(value).with_seconds_optional().parse().context(UnrecognisedSnafu { value })?;
        Ok(TimeSchedule::Cron { expression: value.to_owned(), cron })
    }
}

impl<'de> Deserialize<'de> for TimeSchedule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer)?.parse().map_err(de::Error::custom)
    }
}

// ////// //
// Errors //
// ////// //

#[derive(Debug, Snafu)]
pub enum ScheduleError {
    #[snafu(display("'{value}' is neither a poll interval nor a cron expression"))]
    Unrecognised { value: String, source: CronError },

    #[snafu(display("Cron expression '{expression}' has no upcoming poll"))]
    NoNextPoll { expression: String, source: CronError },

    #[snafu(display("Next poll lies in the past"))]
    NextPollInPast { source: chrono::OutOfRangeError },
}
