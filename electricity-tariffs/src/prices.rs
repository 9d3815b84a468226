use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    period::{ByPeriod, Classifier, TimeOfUsePeriod},
    types::{money::Money, number::Number, time::instant_from_timestamp},
    Error, Result,
};

/// The dynamic price of a single hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct HourlyPricePoint {
    /// Start of the hour, in seconds since the unix epoch.
    pub timestamp: i64,
    /// Price per kWh.
    pub price: Money,
}

/// A published dataset of hourly prices, grouped by day.
///
/// ```json
/// { "timezone": "Europe/Madrid", "days": { "2025-06-16": [[1750024800, 0.1342], ...] } }
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PriceDataset {
    #[serde(default)]
    pub timezone: Option<String>,
    pub days: BTreeMap<String, Vec<(i64, Money)>>,
}

impl PriceDataset {
    /// All points of the dataset, in day order.
    pub fn points(&self) -> Vec<HourlyPricePoint> {
        self.days
            .values()
            .flatten()
            .map(|&(timestamp, price)| HourlyPricePoint { timestamp, price })
            .collect()
    }
}

/// The average dynamic price of each period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodAverages {
    /// The mean price, `None` when no point fell in the period.
    pub averages: ByPeriod<Option<Money>>,
    /// The number of points that fell in each period.
    pub counts: ByPeriod<usize>,
}

impl PeriodAverages {
    pub fn average(&self, period: TimeOfUsePeriod) -> Option<Money> {
        self.averages[period]
    }
}

/// Averages hourly prices per time-of-use period in local time.
pub struct PriceAggregator<'a> {
    classifier: &'a Classifier,
}

impl<'a> PriceAggregator<'a> {
    pub fn new(classifier: &'a Classifier) -> Self {
        Self { classifier }
    }

    /// Average the points whose local date falls within `start..=end`.
    pub fn aggregate(
        &self,
        points: &[HourlyPricePoint],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PeriodAverages> {
        if start > end {
            return Err(Error::invalid(format!(
                "range start {start} is after range end {end}"
            )));
        }

        self.collect(points, |date| (start..=end).contains(&date))
    }

    /// Average every point.
    pub fn aggregate_all(&self, points: &[HourlyPricePoint]) -> Result<PeriodAverages> {
        self.collect(points, |_| true)
    }

    fn collect(
        &self,
        points: &[HourlyPricePoint],
        in_range: impl Fn(NaiveDate) -> bool,
    ) -> Result<PeriodAverages> {
        let mut sums = ByPeriod::<Money>::default();
        let mut counts = ByPeriod::<usize>::default();
        let mut skipped = 0_usize;

        for point in points {
            let instant = instant_from_timestamp(point.timestamp)?;
            let (date, period) = self.classifier.classify_instant(instant);

            if !in_range(date) {
                skipped += 1;
                continue;
            }

            sums[period] = sums[period]
                .checked_add(point.price)
                .ok_or(Error::NumericOverflow)?;
            counts[period] += 1;
        }

        if skipped > 0 {
            debug!(skipped, "Ignored price points outside of the range");
        }

        if counts.iter().all(|(_, count)| *count == 0) {
            return Err(Error::EmptyDataset);
        }

        let mut averages = ByPeriod::<Option<Money>>::default();
        for (period, sum) in sums.iter() {
            let count = counts[period];
            if count > 0 {
                let average = sum
                    .checked_div(Number::from(count))
                    .ok_or(Error::NumericOverflow)?;
                averages[period] = Some(average);
            }
        }

        Ok(PeriodAverages { averages, counts })
    }
}

#[cfg(test)]
mod aggregator_tests {
    use chrono::{NaiveDate, TimeZone, Timelike};
    use chrono_tz::Tz;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use super::{HourlyPricePoint, PriceAggregator, PriceDataset};
    use crate::{
        config::TariffConfig,
        fiscal::FiscalZone,
        period::{Classifier, TimeOfUsePeriod},
        types::money::Money,
        Error,
    };

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    /// One point per hour of the local `day` in `time_zone`, priced by `price(clock_hour)`.
    ///
    /// Clock change days get 23 or 25 points.
    fn zone_day_points(
        time_zone: Tz,
        day: &str,
        price: impl Fn(u32) -> Money,
    ) -> Vec<HourlyPricePoint> {
        let midnight = |day: NaiveDate| {
            time_zone
                .from_local_datetime(&day.and_hms_opt(0, 0, 0).unwrap())
                .earliest()
                .unwrap()
                .timestamp()
        };
        let day = date(day);
        let (start, end) = (midnight(day), midnight(day.succ_opt().unwrap()));

        (start..end)
            .step_by(3600)
            .map(|timestamp| {
                let local = time_zone.timestamp_opt(timestamp, 0).unwrap();
                HourlyPricePoint {
                    timestamp,
                    price: price(local.hour()),
                }
            })
            .collect()
    }

    fn day_points(day: &str, price: impl Fn(u32) -> Money) -> Vec<HourlyPricePoint> {
        zone_day_points(Tz::Europe__Madrid, day, price)
    }

    /// Priced by the period of a working day: 0.30 peak, 0.20 standard and 0.10 off-peak.
    fn working_day_price(clock_hour: u32) -> Money {
        match clock_hour {
            10..=13 | 18..=21 => Money::from(dec!(0.30)),
            0..=7 => Money::from(dec!(0.10)),
            _ => Money::from(dec!(0.20)),
        }
    }

    /// A cent more for every clock hour, so a missing or repeated hour shows in the average.
    fn hourly_ramp(clock_hour: u32) -> Money {
        Money::from(dec!(0.01) * Decimal::from(clock_hour + 1))
    }

    fn peninsula() -> Classifier {
        Classifier::for_zone(&TariffConfig::default(), FiscalZone::Peninsula)
    }

    fn canarias() -> Classifier {
        Classifier::for_zone(&TariffConfig::default(), FiscalZone::Canarias)
    }

    #[test]
    fn constant_prices_should_average_to_themselves() {
        let classifier = peninsula();
        let points = day_points("2025-06-16", |_| Money::from(dec!(0.1234)));

        let averages = PriceAggregator::new(&classifier)
            .aggregate(&points, date("2025-06-16"), date("2025-06-16"))
            .unwrap();

        for period in TimeOfUsePeriod::ALL {
            assert_eq!(averages.average(period), Some(Money::from(dec!(0.1234))));
        }
        assert_eq!(averages.counts.peak, 8);
        assert_eq!(averages.counts.standard, 8);
        assert_eq!(averages.counts.off_peak, 8);
    }

    #[test]
    fn prices_should_be_grouped_by_local_hour() {
        let classifier = peninsula();
        let monday = date("2025-06-16");
        let price = |clock_hour: u32| {
            let hour = u8::try_from(clock_hour + 1).unwrap();
            match classifier.classify(monday, hour).unwrap() {
                TimeOfUsePeriod::Peak => Money::from(dec!(0.30)),
                TimeOfUsePeriod::Standard => Money::from(dec!(0.20)),
                TimeOfUsePeriod::OffPeak => Money::from(dec!(0.10)),
            }
        };
        let points = day_points("2025-06-16", price);

        let averages = PriceAggregator::new(&classifier)
            .aggregate_all(&points)
            .unwrap();

        assert_eq!(averages.average(TimeOfUsePeriod::Peak), Some(Money::from(dec!(0.30))));
        assert_eq!(averages.average(TimeOfUsePeriod::Standard), Some(Money::from(dec!(0.20))));
        assert_eq!(averages.average(TimeOfUsePeriod::OffPeak), Some(Money::from(dec!(0.10))));
    }

    #[test]
    fn weekend_should_leave_peak_without_average() {
        let classifier = peninsula();
        let points = day_points("2025-06-15", |_| Money::from(dec!(0.05)));

        let averages = PriceAggregator::new(&classifier)
            .aggregate(&points, date("2025-06-15"), date("2025-06-15"))
            .unwrap();

        assert_eq!(averages.average(TimeOfUsePeriod::Peak), None);
        assert_eq!(averages.average(TimeOfUsePeriod::Standard), None);
        assert_eq!(averages.average(TimeOfUsePeriod::OffPeak), Some(Money::from(dec!(0.05))));
    }

    #[test]
    fn points_outside_range_should_be_ignored() {
        let classifier = peninsula();
        let mut points = day_points("2025-06-16", |_| Money::from(dec!(0.10)));
        points.extend(day_points("2025-06-17", |_| Money::from(dec!(0.90))));

        let averages = PriceAggregator::new(&classifier)
            .aggregate(&points, date("2025-06-16"), date("2025-06-16"))
            .unwrap();

        assert_eq!(averages.average(TimeOfUsePeriod::Peak), Some(Money::from(dec!(0.10))));
    }

    #[test]
    fn empty_range_should_be_an_error() {
        let classifier = peninsula();
        let points = day_points("2025-06-16", |_| Money::from(dec!(0.10)));

        let err = PriceAggregator::new(&classifier)
            .aggregate(&points, date("2025-07-01"), date("2025-07-31"))
            .unwrap_err();

        assert_eq!(err, Error::EmptyDataset);
    }

    #[test]
    fn short_clock_change_day_should_skip_an_hour() {
        // Madrid skips 02:00 and the Canary Islands skip 01:00, both on a Sunday.
        for (zone, ramp_sum) in [
            (FiscalZone::Peninsula, dec!(2.97)),
            (FiscalZone::Canarias, dec!(2.98)),
        ] {
            let classifier = Classifier::for_zone(&TariffConfig::default(), zone);
            let points = zone_day_points(zone.time_zone(), "2025-03-30", hourly_ramp);
            assert_eq!(points.len(), 23, "{zone}");

            let averages = PriceAggregator::new(&classifier)
                .aggregate(&points, date("2025-03-30"), date("2025-03-30"))
                .unwrap();

            assert_eq!(averages.counts.off_peak, 23, "{zone}");
            assert_eq!(averages.counts.peak + averages.counts.standard, 0, "{zone}");
            assert_eq!(
                averages.average(TimeOfUsePeriod::OffPeak),
                Some(Money::from(ramp_sum / Decimal::from(23_u32))),
                "{zone}"
            );
        }
    }

    #[test]
    fn long_clock_change_day_should_count_the_repeated_hour() {
        // A full ramp sums to 3.00, plus the repeated 02:00 in Madrid or 01:00 in the Canaries.
        for (zone, average) in [
            (FiscalZone::Peninsula, dec!(0.1212)),
            (FiscalZone::Canarias, dec!(0.1208)),
        ] {
            let classifier = Classifier::for_zone(&TariffConfig::default(), zone);
            let points = zone_day_points(zone.time_zone(), "2025-10-26", hourly_ramp);
            assert_eq!(points.len(), 25, "{zone}");

            let averages = PriceAggregator::new(&classifier)
                .aggregate(&points, date("2025-10-26"), date("2025-10-26"))
                .unwrap();

            assert_eq!(averages.counts.off_peak, 25, "{zone}");
            assert_eq!(
                averages.average(TimeOfUsePeriod::OffPeak),
                Some(Money::from(average)),
                "{zone}"
            );
        }
    }

    #[test]
    fn monday_after_clock_change_should_use_the_new_offset() {
        let classifier = peninsula();

        for (sunday, monday, sunday_hours) in [
            ("2025-03-30", "2025-03-31", 23),
            ("2025-10-26", "2025-10-27", 25),
        ] {
            let mut points = day_points(sunday, |_| Money::from(dec!(0.05)));
            points.extend(day_points(monday, working_day_price));

            let aggregator = PriceAggregator::new(&classifier);

            let averages = aggregator
                .aggregate(&points, date(monday), date(monday))
                .unwrap();
            assert_eq!(averages.counts.peak, 8, "{monday}");
            assert_eq!(averages.counts.standard, 8, "{monday}");
            assert_eq!(averages.counts.off_peak, 8, "{monday}");
            assert_eq!(
                averages.average(TimeOfUsePeriod::Peak),
                Some(Money::from(dec!(0.30))),
                "{monday}"
            );
            assert_eq!(
                averages.average(TimeOfUsePeriod::Standard),
                Some(Money::from(dec!(0.20))),
                "{monday}"
            );
            assert_eq!(
                averages.average(TimeOfUsePeriod::OffPeak),
                Some(Money::from(dec!(0.10))),
                "{monday}"
            );

            let both = aggregator.aggregate_all(&points).unwrap();
            assert_eq!(both.counts.off_peak, sunday_hours + 8, "{sunday}");
            assert_eq!(both.counts.peak, 8, "{sunday}");
        }
    }

    #[test]
    fn canarias_prices_should_follow_canary_clock() {
        let points = zone_day_points(Tz::Atlantic__Canary, "2025-06-16", working_day_price);

        let averages = PriceAggregator::new(&canarias())
            .aggregate(&points, date("2025-06-16"), date("2025-06-16"))
            .unwrap();

        assert_eq!(averages.counts.peak, 8);
        assert_eq!(averages.counts.standard, 8);
        assert_eq!(averages.counts.off_peak, 8);
        assert_eq!(averages.average(TimeOfUsePeriod::Peak), Some(Money::from(dec!(0.30))));
        assert_eq!(averages.average(TimeOfUsePeriod::Standard), Some(Money::from(dec!(0.20))));
        assert_eq!(averages.average(TimeOfUsePeriod::OffPeak), Some(Money::from(dec!(0.10))));

        // Read on the peninsula clock every peak block starts an hour early, at 0.20.
        let shifted = PriceAggregator::new(&peninsula())
            .aggregate_all(&points)
            .unwrap();
        assert_eq!(shifted.counts.peak, 8);
        assert_eq!(shifted.average(TimeOfUsePeriod::Peak), Some(Money::from(dec!(0.275))));
    }

    #[test]
    fn overflowing_sum_should_be_reported() {
        let classifier = peninsula();
        let points = day_points("2025-06-15", |_| Money::from(Decimal::MAX));

        let err = PriceAggregator::new(&classifier)
            .aggregate_all(&points)
            .unwrap_err();

        assert_eq!(err, Error::NumericOverflow);
    }

    #[test]
    fn dataset_should_flatten_days() {
        let dataset: PriceDataset = serde_json::from_str(
            r#"{
                "timezone": "Europe/Madrid",
                "days": {
                    "2025-06-16": [[1750024800, 0.1342], [1750028400, 0.1211]],
                    "2025-06-17": [[1750111200, 0.1]]
                }
            }"#,
        )
        .unwrap();

        let points = dataset.points();
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].timestamp, 1_750_024_800);
        assert_eq!(points[1].price, Money::from(dec!(0.1211)));
    }
}
