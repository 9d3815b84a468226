//! Local time handling. Meter readings and period boundaries are expressed in local civil time,
//! hourly prices are expressed as UTC instants.

use std::fmt::Display;

use chrono::{NaiveDate, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub type DateTime = chrono::DateTime<Utc>;

/// A local hour as numbered by Spanish distributors: hour `1` covers `00:00-01:00` and hour
/// `24` covers `23:00-24:00`. Hour `25` is the repeated `02:00-03:00` hour of the autumn clock
/// change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Hour(u8);

impl Hour {
    /// The extra hour of a day that is 25 hours long.
    pub const REPEATED: Hour = Hour(25);

    pub fn new(value: u8) -> Result<Self> {
        if (1..=25).contains(&value) {
            Ok(Self(value))
        } else {
            Err(Error::invalid(format!("hour {value} is outside 1..=25")))
        }
    }

    /// The hour starting at the given local clock hour, `0..=23`.
    pub fn starting_at(clock_hour: u32) -> Result<Self> {
        u8::try_from(clock_hour)
            .ok()
            .filter(|h| *h < 24)
            .map(|h| Self(h + 1))
            .ok_or_else(|| Error::invalid(format!("clock hour {clock_hour} is outside 0..=23")))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn is_repeated(self) -> bool {
        self == Self::REPEATED
    }

    /// The local clock hour at which this hour starts. The repeated hour starts at `02:00`.
    pub fn clock_start(self) -> u32 {
        if self.is_repeated() {
            2
        } else {
            u32::from(self.0) - 1
        }
    }
}

impl TryFrom<u8> for Hour {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Hour> for u8 {
    fn from(value: Hour) -> Self {
        value.0
    }
}

impl Display for Hour {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "H{:02}", self.0)
    }
}

/// Convert a unix timestamp in seconds to a UTC instant.
pub fn instant_from_timestamp(seconds: i64) -> Result<DateTime> {
    DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| Error::invalid(format!("timestamp {seconds} is out of range")))
}

/// The local date and clock hour of an instant.
pub fn local_date_hour(instant: DateTime, time_zone: Tz) -> (NaiveDate, u32) {
    let local = instant.with_timezone(&time_zone);
    (local.date_naive(), local.hour())
}

/// The length of the local day in hours, `None` if midnight does not exist in the time zone.
pub fn day_length_hours(date: NaiveDate, time_zone: Tz) -> Option<i64> {
    let start = local_midnight(date, time_zone)?;
    let end = local_midnight(date.succ_opt()?, time_zone)?;

    Some((end - start).num_hours())
}

fn local_midnight(date: NaiveDate, time_zone: Tz) -> Option<DateTime> {
    let midnight = date.and_hms_opt(0, 0, 0)?;
    time_zone
        .from_local_datetime(&midnight)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}
