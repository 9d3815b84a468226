use std::{fmt::Display, str::FromStr};

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::Error;

/// A recurring calendar day, written as `MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthDay {
    month: u32,
    day: u32,
}

impl MonthDay {
    pub fn new(month: u32, day: u32) -> Option<Self> {
        // 2024 is a leap year, so February 29th is accepted.
        NaiveDate::from_ymd_opt(2024, month, day).map(|_| Self { month, day })
    }

    pub fn matches(self, date: NaiveDate) -> bool {
        date.month() == self.month && date.day() == self.day
    }
}

impl FromStr for MonthDay {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::invalid(format!("`{s}` is not a day of the form MM-DD"));

        let (month, day) = s.trim().split_once('-').ok_or_else(invalid)?;
        let month = month.parse().map_err(|_| invalid())?;
        let day = day.parse().map_err(|_| invalid())?;

        Self::new(month, day).ok_or_else(invalid)
    }
}

impl<'de> Deserialize<'de> for MonthDay {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = <String as Deserialize>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl Serialize for MonthDay {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl Display for MonthDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}-{:02}", self.month, self.day)
    }
}

/// National holidays on which every hour is off-peak.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HolidayCalendar {
    /// Holidays falling on the same day every year.
    pub fixed: Vec<MonthDay>,
    /// Whether Good Friday counts as a holiday. It is a national holiday, but distributors do
    /// not apply it to the tariff periods.
    pub include_good_friday: bool,
}

impl Default for HolidayCalendar {
    fn default() -> Self {
        let fixed = [
            (1, 1),
            (1, 6),
            (5, 1),
            (8, 15),
            (10, 12),
            (11, 1),
            (12, 6),
            (12, 8),
            (12, 25),
        ]
        .into_iter()
        .filter_map(|(month, day)| MonthDay::new(month, day))
        .collect();

        Self {
            fixed,
            include_good_friday: false,
        }
    }
}

impl HolidayCalendar {
    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        if self.fixed.iter().any(|day| day.matches(date)) {
            return true;
        }

        self.include_good_friday && good_friday(date.year()) == Some(date)
    }

    /// Saturdays, Sundays and holidays.
    pub fn is_non_working_day(&self, date: NaiveDate) -> bool {
        matches!(date.weekday(), Weekday::Sat | Weekday::Sun) || self.is_holiday(date)
    }
}

/// Easter Sunday in the Gregorian calendar.
pub fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;

    NaiveDate::from_ymd_opt(year, u32::try_from(month).ok()?, u32::try_from(day).ok()?)
}

pub fn good_friday(year: i32) -> Option<NaiveDate> {
    easter_sunday(year)?.checked_sub_days(chrono::Days::new(2))
}

#[cfg(test)]
mod calendar_tests {
    use chrono::NaiveDate;

    use super::{easter_sunday, good_friday, HolidayCalendar, MonthDay};

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn easter_should_follow_computus() {
        assert_eq!(easter_sunday(2024), Some(date("2024-03-31")));
        assert_eq!(easter_sunday(2025), Some(date("2025-04-20")));
        assert_eq!(easter_sunday(2026), Some(date("2026-04-05")));
        assert_eq!(good_friday(2025), Some(date("2025-04-18")));
    }

    #[test]
    fn national_holidays_should_be_recognized() {
        let calendar = HolidayCalendar::default();

        assert!(calendar.is_holiday(date("2025-12-25")));
        assert!(calendar.is_holiday(date("2025-10-12")));
        assert!(!calendar.is_holiday(date("2025-12-24")));
        assert!(!calendar.is_holiday(date("2025-04-18")));
    }

    #[test]
    fn good_friday_should_be_opt_in() {
        let calendar = HolidayCalendar {
            include_good_friday: true,
            ..HolidayCalendar::default()
        };

        assert!(calendar.is_holiday(date("2025-04-18")));
    }

    #[test]
    fn weekends_should_not_be_working_days() {
        let calendar = HolidayCalendar::default();

        assert!(calendar.is_non_working_day(date("2025-06-14")));
        assert!(calendar.is_non_working_day(date("2025-06-15")));
        assert!(!calendar.is_non_working_day(date("2025-06-16")));
    }

    #[test]
    fn month_day_should_parse() {
        assert_eq!("08-15".parse::<MonthDay>().unwrap(), MonthDay::new(8, 15).unwrap());
        assert!("13-01".parse::<MonthDay>().is_err());
        assert!("0815".parse::<MonthDay>().is_err());
    }
}
