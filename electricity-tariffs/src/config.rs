use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::{
    calendar::HolidayCalendar,
    period::PeriodSchedule,
    types::{
        electricity::Kw,
        money::{Money, Percentage},
    },
};

/// The regulated values used to compose a bill. The defaults are the values in force for
/// 2026. Every field can be overridden when deserializing, missing fields keep their default.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TariffConfig {
    /// Label of the regulatory period these values belong to.
    pub version: String,
    /// Surcharge financing the social discount, per year.
    pub social_financing_per_year: Money,
    pub electricity_tax: ElectricityTax,
    /// Rental of the metering equipment, per month.
    pub metering_rental_per_month: Money,
    pub peninsula: PeninsulaTaxes,
    pub canarias: CanariasTaxes,
    pub ceuta_melilla: CeutaMelillaTaxes,
    pub discount: DiscountRates,
    /// Dynamic tariffs can only be contracted up to this power.
    pub dynamic_max_power: Kw,
    /// Period boundaries on working days.
    pub schedule: PeriodSchedule,
    /// Period boundaries on working days in Ceuta and Melilla.
    pub ceuta_melilla_schedule: PeriodSchedule,
    pub holidays: HolidayCalendar,
}

impl Default for TariffConfig {
    fn default() -> Self {
        Self {
            version: "2026".to_owned(),
            social_financing_per_year: Money::from(dec!(6.979247)),
            electricity_tax: ElectricityTax::default(),
            metering_rental_per_month: Money::from(dec!(0.81)),
            peninsula: PeninsulaTaxes::default(),
            canarias: CanariasTaxes::default(),
            ceuta_melilla: CeutaMelillaTaxes::default(),
            discount: DiscountRates::default(),
            dynamic_max_power: Kw::from(dec!(10)),
            schedule: PeriodSchedule::default(),
            ceuta_melilla_schedule: PeriodSchedule::ceuta_melilla(),
            holidays: HolidayCalendar::default(),
        }
    }
}

/// The special tax on electricity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ElectricityTax {
    pub percentage: Percentage,
    /// The tax is never lower than this amount per consumed kWh.
    pub minimum_per_kwh: Money,
}

impl Default for ElectricityTax {
    fn default() -> Self {
        Self {
            percentage: Percentage::from(dec!(5.11269632)),
            minimum_per_kwh: Money::from(dec!(0.001)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PeninsulaTaxes {
    /// VAT, applied to the whole bill.
    pub vat: Percentage,
}

impl Default for PeninsulaTaxes {
    fn default() -> Self {
        Self {
            vat: Percentage::from(dec!(21)),
        }
    }
}

/// IGIC rates of the Canary Islands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CanariasTaxes {
    /// Rate on energy for dwellings that qualify for the reduced rate.
    pub reduced_dwelling_energy: Percentage,
    /// Rate on energy for every other supply.
    pub other_energy: Percentage,
    /// Rate on the metering rental, regardless of the supply.
    pub metering: Percentage,
    /// Dwellings qualify for the reduced rate up to this contracted power.
    pub reduced_rate_max_power: Kw,
}

impl Default for CanariasTaxes {
    fn default() -> Self {
        Self {
            reduced_dwelling_energy: Percentage::from(dec!(0)),
            other_energy: Percentage::from(dec!(3)),
            metering: Percentage::from(dec!(7)),
            reduced_rate_max_power: Kw::from(dec!(10)),
        }
    }
}

/// IPSI rates of Ceuta and Melilla.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CeutaMelillaTaxes {
    pub energy: Percentage,
    pub metering: Percentage,
}

impl Default for CeutaMelillaTaxes {
    fn default() -> Self {
        Self {
            energy: Percentage::from(dec!(1)),
            metering: Percentage::from(dec!(4)),
        }
    }
}

/// Percentages of the means-tested discount per beneficiary tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscountRates {
    pub vulnerable: Percentage,
    pub severe: Percentage,
}

impl Default for DiscountRates {
    fn default() -> Self {
        Self {
            vulnerable: Percentage::from(dec!(35)),
            severe: Percentage::from(dec!(50)),
        }
    }
}
