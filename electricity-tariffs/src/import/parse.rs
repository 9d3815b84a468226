//! Lenient parsing of cells exported by distributors and spreadsheets.

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::{types::time::Hour, Error, Result};

const BOM: char = '\u{feff}';

const DATE_FORMATS: [&str; 4] = ["%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d", "%Y-%m-%d"];

/// Trim whitespace, a leading byte order mark and surrounding quotes.
pub(super) fn clean(cell: &str) -> &str {
    let cell = cell.trim().trim_start_matches(BOM).trim();

    cell.strip_prefix('"')
        .and_then(|c| c.strip_suffix('"'))
        .or_else(|| cell.strip_prefix('\'').and_then(|c| c.strip_suffix('\'')))
        .unwrap_or(cell)
        .trim()
}

pub(super) fn header_token(cell: &str) -> String {
    clean(cell).to_lowercase()
}

pub(super) fn cell(row: &[String], index: usize) -> &str {
    row.get(index).map_or("", |c| clean(c))
}

pub(super) fn is_blank_row(row: &[String]) -> bool {
    row.iter().all(|c| clean(c).is_empty())
}

/// Parse a number written with either Spanish (`1.234,56`) or English (`1,234.56`) separators.
///
/// When both separators are present the last one is the decimal separator. A single
/// separator is a decimal separator, a repeated one groups thousands.
pub(super) fn parse_number(cell: &str) -> Result<Decimal> {
    let invalid = || Error::invalid(format!("`{cell}` is not a number"));

    let raw: String = clean(cell).chars().filter(|c| !c.is_whitespace()).collect();
    if raw.is_empty() {
        return Err(invalid());
    }

    let last_comma = raw.rfind(',');
    let last_dot = raw.rfind('.');

    let normalized = match (last_comma, last_dot) {
        (Some(comma), Some(dot)) if comma > dot => raw.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => raw.replace(',', ""),
        (Some(_), None) if raw.matches(',').count() > 1 => raw.replace(',', ""),
        (Some(_), None) => raw.replace(',', "."),
        (None, Some(_)) if raw.matches('.').count() > 1 => raw.replace('.', ""),
        (None, _) => raw,
    };

    Decimal::from_str(&normalized).map_err(|_| invalid())
}

/// Parse a date, ignoring a trailing time.
pub(super) fn parse_date(cell: &str) -> Result<NaiveDate> {
    let token = clean(cell).split_whitespace().next().unwrap_or_default();

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(token, format).ok())
        .ok_or_else(|| Error::invalid(format!("`{cell}` is not a date")))
}

/// Parse a date with the clock time the hour starts at, such as `2025/06/16 10:00`.
pub(super) fn parse_date_time(cell: &str) -> Result<(NaiveDate, Hour)> {
    let invalid = || Error::invalid(format!("`{cell}` is not a date and time"));

    let mut tokens = clean(cell).split_whitespace();
    let date = parse_date(tokens.next().ok_or_else(invalid)?)?;
    let time = tokens.next().ok_or_else(invalid)?;

    let clock_hour = time
        .split(':')
        .next()
        .and_then(|h| h.parse::<u32>().ok())
        .ok_or_else(invalid)?;

    Ok((date, Hour::starting_at(clock_hour)?))
}

/// Parse an hour number, `1..=25`.
pub(super) fn parse_hour(cell: &str) -> Result<Hour> {
    let value = clean(cell)
        .parse::<u8>()
        .map_err(|_| Error::invalid(format!("`{cell}` is not an hour")))?;

    Hour::new(value)
}
