mod matrix;
mod parse;
mod reading;

use std::{collections::BTreeSet, fmt::Display};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use self::{matrix::MatrixColumns, reading::ReadingColumns};
use crate::{
    period::{ByPeriod, Classifier, TimeOfUsePeriod},
    types::{electricity::Kwh, time::Hour},
    Error, Result,
};

/// The matrix header may be preceded by a title and a few lines of metadata.
const MATRIX_HEADER_SEARCH_ROWS: usize = 10;
const READING_HEADER_SEARCH_ROWS: usize = 5;

/// The supported column layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportFormat {
    /// One row for every hourly reading.
    ReadingPerRow,
    /// One row for every day, with a column for each of its 24 hours.
    DailyMatrix,
}

impl Display for ImportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadingPerRow => f.write_str("reading per row"),
            Self::DailyMatrix => f.write_str("daily matrix"),
        }
    }
}

/// How the distributor obtained a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingMethod {
    Real,
    Estimated,
}

impl ReadingMethod {
    /// Distributors flag real readings with `R` or `Real`, anything else is estimated,
    /// including an empty flag. Exports without a method column only carry real readings.
    fn from_flag(flag: &str) -> Self {
        let flag = flag.trim();
        if flag.eq_ignore_ascii_case("r") || flag.eq_ignore_ascii_case("real") {
            Self::Real
        } else {
            Self::Estimated
        }
    }
}

/// A single hourly reading, classified into its period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsumptionReading {
    pub meter: Option<String>,
    pub date: NaiveDate,
    pub hour: Hour,
    pub energy: Kwh,
    /// Energy fed back into the grid during this hour.
    pub exported: Kwh,
    pub method: ReadingMethod,
    pub period: TimeOfUsePeriod,
}

/// Structure containing the totals of an imported consumption export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// The layout that was detected or requested.
    pub format: ImportFormat,
    /// Consumption per period.
    pub totals: ByPeriod<Kwh>,
    /// Energy fed back into the grid per period.
    pub exported: ByPeriod<Kwh>,
    /// The number of distinct dates with readings.
    pub day_count: usize,
    pub first_day: Option<NaiveDate>,
    pub last_day: Option<NaiveDate>,
    pub real_readings: usize,
    pub estimated_readings: usize,
    pub readings: Vec<ConsumptionReading>,
}

impl ImportSummary {
    /// Consumption over all periods.
    pub fn total(&self) -> Kwh {
        self.totals.iter().map(|(_, kwh)| *kwh).sum()
    }
}

#[derive(Debug)]
enum Layout {
    Reading(ReadingColumns),
    Matrix(MatrixColumns),
}

impl Layout {
    fn format(&self) -> ImportFormat {
        match self {
            Self::Reading(_) => ImportFormat::ReadingPerRow,
            Self::Matrix(_) => ImportFormat::DailyMatrix,
        }
    }
}

/// Turns rows of a consumption export into totals per period.
///
/// The rows are already split into cells. Every row is either fully valid or the whole import
/// fails, pointing at the offending row.
pub struct Importer<'a> {
    classifier: &'a Classifier,
}

impl<'a> Importer<'a> {
    pub fn new(classifier: &'a Classifier) -> Self {
        Self { classifier }
    }

    /// Import the rows, detecting the layout from the header.
    pub fn import(&self, rows: &[Vec<String>]) -> Result<ImportSummary> {
        self.import_with(rows, None)
    }

    /// Import the rows, only accepting the given layout.
    pub fn import_as(&self, rows: &[Vec<String>], format: ImportFormat) -> Result<ImportSummary> {
        self.import_with(rows, Some(format))
    }

    fn import_with(
        &self,
        rows: &[Vec<String>],
        format: Option<ImportFormat>,
    ) -> Result<ImportSummary> {
        if rows.iter().all(|row| parse::is_blank_row(row)) {
            return Err(Error::EmptyDataset);
        }

        let (header_index, layout) = detect_layout(rows, format).ok_or(Error::UnsupportedShape)?;

        debug!(format = %layout.format(), header_row = header_index + 1, "Detected consumption layout");

        let mut builder = SummaryBuilder::new(layout.format());

        for (index, row) in rows.iter().enumerate().skip(header_index + 1) {
            if parse::is_blank_row(row) {
                continue;
            }

            let row_number = index + 1;
            match &layout {
                Layout::Reading(columns) => self
                    .push_reading(&mut builder, columns, row)
                    .map_err(|err| err.at_row(row_number))?,
                Layout::Matrix(columns) => self
                    .push_day(&mut builder, columns, row)
                    .map_err(|err| err.at_row(row_number))?,
            }
        }

        let summary = builder.build()?;

        debug!(
            days = summary.day_count,
            readings = summary.readings.len(),
            total = %summary.total(),
            "Imported consumption"
        );

        Ok(summary)
    }

    fn push_reading(
        &self,
        builder: &mut SummaryBuilder,
        columns: &ReadingColumns,
        row: &[String],
    ) -> Result<()> {
        let raw = columns.parse(row)?;
        let period = self.classifier.classify(raw.date, raw.hour.get())?;

        builder.push(ConsumptionReading {
            meter: raw.meter,
            date: raw.date,
            hour: raw.hour,
            energy: raw.energy,
            exported: raw.exported,
            method: raw.method,
            period,
        });

        Ok(())
    }

    fn push_day(
        &self,
        builder: &mut SummaryBuilder,
        columns: &MatrixColumns,
        row: &[String],
    ) -> Result<()> {
        let (date, energy) = columns.parse(row)?;

        for (hour, energy) in (1..).zip(energy) {
            let hour = Hour::new(hour)?;

            builder.push(ConsumptionReading {
                meter: None,
                date,
                hour,
                energy,
                exported: Kwh::zero(),
                method: ReadingMethod::Real,
                period: self.classifier.classify_hour(date, hour),
            });
        }

        Ok(())
    }
}

/// Find the header row, matrix layouts take precedence.
fn detect_layout(rows: &[Vec<String>], format: Option<ImportFormat>) -> Option<(usize, Layout)> {
    let wants = |wanted: ImportFormat| format.map_or(true, |format| format == wanted);

    let matrix = wants(ImportFormat::DailyMatrix)
        .then(|| {
            rows.iter()
                .take(MATRIX_HEADER_SEARCH_ROWS)
                .enumerate()
                .find_map(|(index, row)| Some((index, Layout::Matrix(MatrixColumns::detect(row)?))))
        })
        .flatten();

    matrix.or_else(|| {
        wants(ImportFormat::ReadingPerRow)
            .then(|| {
                rows.iter()
                    .take(READING_HEADER_SEARCH_ROWS)
                    .enumerate()
                    .find_map(|(index, row)| {
                        Some((index, Layout::Reading(ReadingColumns::detect(row)?)))
                    })
            })
            .flatten()
    })
}

struct SummaryBuilder {
    format: ImportFormat,
    totals: ByPeriod<Kwh>,
    exported: ByPeriod<Kwh>,
    days: BTreeSet<NaiveDate>,
    real_readings: usize,
    estimated_readings: usize,
    readings: Vec<ConsumptionReading>,
}

impl SummaryBuilder {
    fn new(format: ImportFormat) -> Self {
        Self {
            format,
            totals: ByPeriod::default(),
            exported: ByPeriod::default(),
            days: BTreeSet::new(),
            real_readings: 0,
            estimated_readings: 0,
            readings: Vec::new(),
        }
    }

    fn push(&mut self, reading: ConsumptionReading) {
        let period = reading.period;

        self.totals[period] = self.totals[period].saturating_add(reading.energy);
        self.exported[period] = self.exported[period].saturating_add(reading.exported);
        self.days.insert(reading.date);

        match reading.method {
            ReadingMethod::Real => self.real_readings += 1,
            ReadingMethod::Estimated => self.estimated_readings += 1,
        }

        self.readings.push(reading);
    }

    fn build(self) -> Result<ImportSummary> {
        if self.readings.is_empty() {
            return Err(Error::EmptyDataset);
        }

        Ok(ImportSummary {
            format: self.format,
            totals: self.totals,
            exported: self.exported,
            day_count: self.days.len(),
            first_day: self.days.first().copied(),
            last_day: self.days.last().copied(),
            real_readings: self.real_readings,
            estimated_readings: self.estimated_readings,
            readings: self.readings,
        })
    }
}
