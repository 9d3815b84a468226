//! The row-per-day layout: a date followed by 24 hourly columns `H01..H24`.

use chrono::NaiveDate;

use super::parse::{self, cell};
use crate::{types::electricity::Kwh, Error, Result};

pub(super) const HOURS_PER_DAY: usize = 24;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct MatrixColumns {
    date: usize,
    /// Column of every hour, hour `1` first.
    hours: [usize; HOURS_PER_DAY],
}

impl MatrixColumns {
    /// Recognize a header with every column from `H01` to `H24`.
    pub(super) fn detect(header: &[String]) -> Option<Self> {
        let mut hours = [None; HOURS_PER_DAY];
        let mut date = None;

        for (index, cell) in header.iter().enumerate() {
            let token = parse::header_token(cell);

            match hour_number(&token) {
                Some(hour) => hours[hour - 1] = hours[hour - 1].or(Some(index)),
                None if matches!(token.as_str(), "fecha" | "date" | "dia") => {
                    date = date.or(Some(index));
                }
                None => {}
            }
        }

        let mut columns = [0; HOURS_PER_DAY];
        for (slot, hour) in columns.iter_mut().zip(hours) {
            *slot = hour?;
        }

        // Without a named date column the first column that is not an hour holds the date.
        let date = date.or_else(|| (0..header.len()).find(|index| !columns.contains(index)))?;

        Some(Self {
            date,
            hours: columns,
        })
    }

    /// Parse the date and the consumption of every hour. An empty cell is no consumption.
    pub(super) fn parse(&self, row: &[String]) -> Result<(NaiveDate, [Kwh; HOURS_PER_DAY])> {
        let date = parse::parse_date(cell(row, self.date))?;

        let mut energy = [Kwh::zero(); HOURS_PER_DAY];
        for (value, &index) in energy.iter_mut().zip(&self.hours) {
            let raw = cell(row, index);
            if raw.is_empty() {
                continue;
            }

            *value = Kwh::from(parse::parse_number(raw)?);
            if value.is_negative() {
                return Err(Error::invalid(format!(
                    "consumption {value} is negative"
                )));
            }
        }

        Ok((date, energy))
    }
}

/// `h01` to `h24`, also without the leading zero.
fn hour_number(token: &str) -> Option<usize> {
    let number = token.strip_prefix('h')?.parse::<usize>().ok()?;
    (1..=HOURS_PER_DAY).contains(&number).then_some(number)
}
