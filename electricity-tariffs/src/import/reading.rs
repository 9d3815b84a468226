//! The row-per-reading layout: one row for every hour, as distributors export it.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::{
    parse::{self, cell},
    ReadingMethod,
};
use crate::{
    types::{electricity::Kwh, number::Number, time::Hour},
    Error, Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EnergyUnit {
    Kwh,
    Wh,
}

impl EnergyUnit {
    fn from_header(token: &str) -> Self {
        if !token.contains("kwh") && token.contains("wh") {
            Self::Wh
        } else {
            Self::Kwh
        }
    }

    fn to_kwh(self, value: Decimal) -> Kwh {
        match self {
            Self::Kwh => Kwh::from(value),
            Self::Wh => Kwh::from_watt_hours(Number::from(value)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Meter,
    Date,
    DateTime,
    Hour,
    Energy(EnergyUnit),
    Exported(EnergyUnit),
    Method,
}

impl Column {
    fn from_header(token: &str) -> Option<Self> {
        let column = match token {
            "cups" | "meter" => Self::Meter,
            "fecha-hora" | "fecha_hora" | "fecha hora" | "datetime" => Self::DateTime,
            "fecha" | "date" => Self::Date,
            "hora" | "hour" => Self::Hour,
            "metodo_obtencion" | "metodo" | "method" | "real/estimado" | "estado" => Self::Method,
            _ if token.starts_with("as_")
                || token.starts_with("energiavertida")
                || token.starts_with("generacion")
                || token.starts_with("exported") =>
            {
                Self::Exported(EnergyUnit::from_header(token))
            }
            _ if token.starts_with("ae_")
                || token.starts_with("consumo")
                || token.starts_with("energy")
                || token == "kwh" =>
            {
                Self::Energy(EnergyUnit::from_header(token))
            }
            _ => return None,
        };

        Some(column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum When {
    Split { date: usize, hour: usize },
    Combined(usize),
}

/// A single parsed row, not yet classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct RawReading {
    pub(super) meter: Option<String>,
    pub(super) date: NaiveDate,
    pub(super) hour: Hour,
    pub(super) energy: Kwh,
    pub(super) exported: Kwh,
    pub(super) method: ReadingMethod,
}

/// The positions of the recognized columns of a header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct ReadingColumns {
    meter: Option<usize>,
    when: When,
    energy: (usize, EnergyUnit),
    exported: Option<(usize, EnergyUnit)>,
    method: Option<usize>,
}

impl ReadingColumns {
    /// Recognize the header row. Both a date with an hour and the energy must be present.
    pub(super) fn detect(header: &[String]) -> Option<Self> {
        let mut meter = None;
        let mut date = None;
        let mut date_time = None;
        let mut hour = None;
        let mut energy = None;
        let mut exported = None;
        let mut method = None;

        for (index, cell) in header.iter().enumerate() {
            let Some(column) = Column::from_header(&parse::header_token(cell)) else {
                continue;
            };

            // The first matching column wins.
            match column {
                Column::Meter => meter = meter.or(Some(index)),
                Column::Date => date = date.or(Some(index)),
                Column::DateTime => date_time = date_time.or(Some(index)),
                Column::Hour => hour = hour.or(Some(index)),
                Column::Energy(unit) => energy = energy.or(Some((index, unit))),
                Column::Exported(unit) => exported = exported.or(Some((index, unit))),
                Column::Method => method = method.or(Some(index)),
            }
        }

        let when = match (date, hour, date_time) {
            (Some(date), Some(hour), _) => When::Split { date, hour },
            (_, _, Some(date_time)) => When::Combined(date_time),
            _ => return None,
        };

        Some(Self {
            meter,
            when,
            energy: energy?,
            exported,
            method,
        })
    }

    pub(super) fn parse(&self, row: &[String]) -> Result<RawReading> {
        let (date, hour) = match self.when {
            When::Split { date, hour } => {
                (parse::parse_date(cell(row, date))?, parse::parse_hour(cell(row, hour))?)
            }
            When::Combined(index) => parse::parse_date_time(cell(row, index))?,
        };

        let (index, unit) = self.energy;
        let energy = unit.to_kwh(parse::parse_number(cell(row, index))?);
        if energy.is_negative() {
            return Err(Error::invalid(format!(
                "consumption {energy} is negative"
            )));
        }

        let exported = match self.exported {
            Some((index, unit)) if !cell(row, index).is_empty() => {
                unit.to_kwh(parse::parse_number(cell(row, index))?)
            }
            _ => Kwh::zero(),
        };

        let method = self
            .method
            .map_or(ReadingMethod::Real, |index| ReadingMethod::from_flag(cell(row, index)));

        let meter = self
            .meter
            .map(|index| cell(row, index))
            .filter(|meter| !meter.is_empty())
            .map(str::to_owned);

        Ok(RawReading {
            meter,
            date,
            hour,
            energy,
            exported,
            method,
        })
    }
}
