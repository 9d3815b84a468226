//! # Electricity tariffs library
//!
//! Functionality to estimate and compare household electricity bills under Spanish 2.0TD
//! time-of-use tariffs. Use the [`pricer::Pricer`] to price a catalog of tariffs, or the
//! individual calculators for a single concern:
//!
//! - [`period::Classifier`] maps a local date and hour to a [`period::TimeOfUsePeriod`].
//! - [`prices::PriceAggregator`] averages hourly dynamic prices per period.
//! - [`fiscal::FiscalCalculator`] composes a bill under the applicable tax regime.
//! - [`discount::DiscountCalculator`] prorates the means-tested discount.
//! - [`import::Importer`] classifies raw meter readings into period totals.

use std::fmt;

/// Calendar rules: national holidays and clock changes.
pub mod calendar;

/// Regulated values that change over time, such as tax rates and discount percentages.
pub mod config;

/// The means-tested discount.
pub mod discount;

/// Module for generating a human readable bill breakdown.
pub mod explain;

/// Tax regime selection and bill composition.
pub mod fiscal;

/// Normalization of raw consumption exports into period totals.
pub mod import;

/// Warnings about likely mistakes in a catalog of tariffs.
pub mod lint;

/// Time-of-use periods and their classification.
pub mod period;

/// Hourly dynamic prices and their aggregation per period.
pub mod prices;

/// Module containing the functionality to price a catalog of tariffs.
pub mod pricer;

/// Tariff candidates as offered by retailers.
pub mod tariff;

/// Numeric types used for calculations, serializing and deserializing.
pub mod types;

pub use period::TimeOfUsePeriod;

type Result<T> = std::result::Result<T, Error>;

/// Possible errors when evaluating tariffs or importing consumption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A value provided by the caller is malformed or out of range. For example an hour outside
    /// `1..=25`, hour 25 on a day without a clock change or a number that cannot be parsed.
    InvalidInput(InvalidInput),
    /// The importer could not recognize the column layout of the provided rows.
    UnsupportedShape,
    /// There are no rows to import, or no price points inside the requested range.
    EmptyDataset,
    /// A dynamic tariff was priced while no average price exists for a period that has
    /// consumption.
    MissingPeriodPrice(TimeOfUsePeriod),
    /// A numeric overflow occurred during calculation.
    NumericOverflow,
}

/// Details of an [`Error::InvalidInput`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidInput {
    /// The 1-based row of the input that caused the error, if the input was tabular.
    pub row: Option<usize>,
    /// Description of what is wrong with the value.
    pub reason: String,
}

impl Error {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidInput(InvalidInput {
            row: None,
            reason: reason.into(),
        })
    }

    /// Attach the row number to an `InvalidInput` error. Other errors are returned unchanged.
    #[must_use]
    pub(crate) fn at_row(self, row: usize) -> Self {
        match self {
            Self::InvalidInput(InvalidInput { reason, .. }) => Self::InvalidInput(InvalidInput {
                row: Some(row),
                reason,
            }),
            other => other,
        }
    }
}

impl From<rust_decimal::Error> for Error {
    fn from(_: rust_decimal::Error) -> Self {
        Self::NumericOverflow
    }
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput(InvalidInput {
                row: Some(row),
                reason,
            }) => write!(f, "Invalid input at row {row}: {reason}"),
            Self::InvalidInput(InvalidInput { row: None, reason }) => {
                write!(f, "Invalid input: {reason}")
            }
            Self::UnsupportedShape => {
                f.write_str("No usable columns: the column layout was not recognized")
            }
            Self::EmptyDataset => f.write_str("No valid data was found in the provided dataset"),
            Self::MissingPeriodPrice(period) => {
                write!(f, "No price is available for period {period}")
            }
            Self::NumericOverflow => f.write_str("A numeric overflow occurred during calculation"),
        }
    }
}
