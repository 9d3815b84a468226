use std::{
    fmt::Display,
    ops::{Index, IndexMut},
};

use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::{
    calendar::HolidayCalendar,
    config::TariffConfig,
    fiscal::FiscalZone,
    types::time::{self, day_length_hours, DateTime, Hour},
    Error, Result,
};

/// The three time-of-use periods of the 2.0TD tariff, ordered from cheapest to most expensive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfUsePeriod {
    /// P3, nights, weekends and holidays.
    #[serde(alias = "P3")]
    OffPeak,
    /// P2
    #[serde(alias = "P2")]
    Standard,
    /// P1
    #[serde(alias = "P1")]
    Peak,
}

impl TimeOfUsePeriod {
    /// Every period, most expensive first.
    pub const ALL: [Self; 3] = [Self::Peak, Self::Standard, Self::OffPeak];

    /// The regulatory code of this period.
    pub fn code(self) -> &'static str {
        match self {
            Self::Peak => "P1",
            Self::Standard => "P2",
            Self::OffPeak => "P3",
        }
    }
}

impl Display for TimeOfUsePeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Peak => "peak",
            Self::Standard => "standard",
            Self::OffPeak => "off-peak",
        };

        write!(f, "{} ({name})", self.code())
    }
}

/// A value for each of the three periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct ByPeriod<T> {
    pub peak: T,
    pub standard: T,
    pub off_peak: T,
}

impl<T> ByPeriod<T> {
    pub fn new(peak: T, standard: T, off_peak: T) -> Self {
        Self {
            peak,
            standard,
            off_peak,
        }
    }

    /// The values paired with their period, most expensive period first.
    pub fn iter(&self) -> impl Iterator<Item = (TimeOfUsePeriod, &T)> {
        TimeOfUsePeriod::ALL
            .into_iter()
            .map(move |period| (period, &self[period]))
    }

    pub fn map<U>(&self, mut f: impl FnMut(TimeOfUsePeriod, &T) -> U) -> ByPeriod<U> {
        ByPeriod {
            peak: f(TimeOfUsePeriod::Peak, &self.peak),
            standard: f(TimeOfUsePeriod::Standard, &self.standard),
            off_peak: f(TimeOfUsePeriod::OffPeak, &self.off_peak),
        }
    }
}

impl<T> Index<TimeOfUsePeriod> for ByPeriod<T> {
    type Output = T;

    fn index(&self, period: TimeOfUsePeriod) -> &Self::Output {
        match period {
            TimeOfUsePeriod::Peak => &self.peak,
            TimeOfUsePeriod::Standard => &self.standard,
            TimeOfUsePeriod::OffPeak => &self.off_peak,
        }
    }
}

impl<T> IndexMut<TimeOfUsePeriod> for ByPeriod<T> {
    fn index_mut(&mut self, period: TimeOfUsePeriod) -> &mut Self::Output {
        match period {
            TimeOfUsePeriod::Peak => &mut self.peak,
            TimeOfUsePeriod::Standard => &mut self.standard,
            TimeOfUsePeriod::OffPeak => &mut self.off_peak,
        }
    }
}

/// A range of local clock hours, `start` inclusive and `end` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct HourRange {
    pub start: u32,
    pub end: u32,
}

impl HourRange {
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn contains(self, clock_hour: u32) -> bool {
        (self.start..self.end).contains(&clock_hour)
    }
}

/// Period boundaries of a working day. Hours that are neither peak nor off-peak are standard.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PeriodSchedule {
    pub peak: Vec<HourRange>,
    pub off_peak: Vec<HourRange>,
}

impl Default for PeriodSchedule {
    fn default() -> Self {
        Self {
            peak: vec![HourRange::new(10, 14), HourRange::new(18, 22)],
            off_peak: vec![HourRange::new(0, 8)],
        }
    }
}

impl PeriodSchedule {
    /// Ceuta and Melilla shift their peak hours one hour later.
    pub fn ceuta_melilla() -> Self {
        Self {
            peak: vec![HourRange::new(11, 15), HourRange::new(19, 23)],
            off_peak: vec![HourRange::new(0, 8)],
        }
    }

    /// The period of the working day hour starting at `clock_hour`.
    pub fn period_at(&self, clock_hour: u32) -> TimeOfUsePeriod {
        if self.peak.iter().any(|range| range.contains(clock_hour)) {
            TimeOfUsePeriod::Peak
        } else if self.off_peak.iter().any(|range| range.contains(clock_hour)) {
            TimeOfUsePeriod::OffPeak
        } else {
            TimeOfUsePeriod::Standard
        }
    }
}

/// Maps local dates and hours to their time-of-use period.
#[derive(Debug, Clone)]
pub struct Classifier {
    time_zone: Tz,
    schedule: PeriodSchedule,
    holidays: HolidayCalendar,
}

impl Classifier {
    pub fn new(time_zone: Tz, schedule: PeriodSchedule, holidays: HolidayCalendar) -> Self {
        Self {
            time_zone,
            schedule,
            holidays,
        }
    }

    /// The classifier for a fiscal zone, using the zone's time zone and schedule.
    pub fn for_zone(config: &TariffConfig, zone: FiscalZone) -> Self {
        let schedule = match zone {
            FiscalZone::CeutaMelilla => config.ceuta_melilla_schedule.clone(),
            FiscalZone::Peninsula | FiscalZone::Canarias => config.schedule.clone(),
        };

        Self::new(zone.time_zone(), schedule, config.holidays.clone())
    }

    pub fn time_zone(&self) -> Tz {
        self.time_zone
    }

    pub fn holidays(&self) -> &HolidayCalendar {
        &self.holidays
    }

    /// Classify the `hour` (`1..=25`) of a local `date`.
    ///
    /// Hour 25 only exists on the day the clocks go back and is treated as the repeated
    /// `02:00-03:00` hour.
    pub fn classify(&self, date: NaiveDate, hour: u8) -> Result<TimeOfUsePeriod> {
        let hour = Hour::new(hour)?;

        if hour.is_repeated() && !self.is_clock_change_day(date) {
            return Err(Error::invalid(format!(
                "hour 25 on {date}, which is not a clock change day"
            )));
        }

        Ok(self.classify_hour(date, hour))
    }

    /// Classify an instant by its local date and hour.
    pub fn classify_instant(&self, instant: DateTime) -> (NaiveDate, TimeOfUsePeriod) {
        let (date, clock_hour) = time::local_date_hour(instant, self.time_zone);
        (date, self.classify_clock_hour(date, clock_hour))
    }

    /// Whether the local day lasts 25 hours because the clocks go back.
    pub fn is_clock_change_day(&self, date: NaiveDate) -> bool {
        day_length_hours(date, self.time_zone) == Some(25)
    }

    pub(crate) fn classify_hour(&self, date: NaiveDate, hour: Hour) -> TimeOfUsePeriod {
        self.classify_clock_hour(date, hour.clock_start())
    }

    fn classify_clock_hour(&self, date: NaiveDate, clock_hour: u32) -> TimeOfUsePeriod {
        if self.holidays.is_non_working_day(date) {
            TimeOfUsePeriod::OffPeak
        } else {
            self.schedule.period_at(clock_hour)
        }
    }
}

#[cfg(test)]
mod classifier_tests {
    use chrono::NaiveDate;

    use super::{Classifier, TimeOfUsePeriod};
    use crate::{config::TariffConfig, fiscal::FiscalZone, types::time::instant_from_timestamp};

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn peninsula() -> Classifier {
        Classifier::for_zone(&TariffConfig::default(), FiscalZone::Peninsula)
    }

    #[test]
    fn working_day_hours_should_follow_schedule() {
        let classifier = peninsula();
        let monday = date("2025-06-16");

        let periods: Vec<_> = (1..=24)
            .map(|hour| classifier.classify(monday, hour).unwrap())
            .collect();

        assert!(periods[0..8].iter().all(|p| *p == TimeOfUsePeriod::OffPeak));
        assert!(periods[8..10].iter().all(|p| *p == TimeOfUsePeriod::Standard));
        assert!(periods[10..14].iter().all(|p| *p == TimeOfUsePeriod::Peak));
        assert!(periods[14..18].iter().all(|p| *p == TimeOfUsePeriod::Standard));
        assert!(periods[18..22].iter().all(|p| *p == TimeOfUsePeriod::Peak));
        assert!(periods[22..24].iter().all(|p| *p == TimeOfUsePeriod::Standard));
    }

    #[test]
    fn weekends_and_holidays_should_be_off_peak() {
        let classifier = peninsula();

        for day in ["2025-06-14", "2025-06-15", "2025-12-25"] {
            for hour in 1..=24 {
                assert_eq!(
                    classifier.classify(date(day), hour).unwrap(),
                    TimeOfUsePeriod::OffPeak
                );
            }
        }
    }

    #[test]
    fn hour_twenty_five_should_only_exist_on_autumn_clock_change() {
        let classifier = peninsula();

        assert_eq!(
            classifier.classify(date("2025-10-26"), 25).unwrap(),
            TimeOfUsePeriod::OffPeak
        );
        assert!(classifier.classify(date("2025-10-27"), 25).is_err());
        assert!(classifier.classify(date("2025-03-30"), 25).is_err());
    }

    #[test]
    fn out_of_range_hours_should_be_rejected() {
        let classifier = peninsula();

        assert!(classifier.classify(date("2025-06-16"), 0).is_err());
        assert!(classifier.classify(date("2025-06-16"), 26).is_err());
    }

    #[test]
    fn ceuta_melilla_peak_should_shift_one_hour() {
        let classifier = Classifier::for_zone(&TariffConfig::default(), FiscalZone::CeutaMelilla);
        let monday = date("2025-06-16");

        assert_eq!(classifier.classify(monday, 11).unwrap(), TimeOfUsePeriod::Standard);
        assert_eq!(classifier.classify(monday, 12).unwrap(), TimeOfUsePeriod::Peak);
        assert_eq!(classifier.classify(monday, 15).unwrap(), TimeOfUsePeriod::Peak);
        assert_eq!(classifier.classify(monday, 23).unwrap(), TimeOfUsePeriod::Peak);
    }

    #[test]
    fn instants_should_be_classified_in_local_time() {
        let classifier = peninsula();

        // 2025-06-16T08:30:00Z is 10:30 in Madrid.
        let (day, period) = classifier.classify_instant(instant_from_timestamp(1_750_062_600).unwrap());
        assert_eq!(day, date("2025-06-16"));
        assert_eq!(period, TimeOfUsePeriod::Peak);

        // The same instant is 09:30 in the Canary Islands.
        let canarias = Classifier::for_zone(&TariffConfig::default(), FiscalZone::Canarias);
        let (_, period) = canarias.classify_instant(instant_from_timestamp(1_750_062_600).unwrap());
        assert_eq!(period, TimeOfUsePeriod::Standard);
    }
}
