use serde::{Deserialize, Serialize};

use crate::{
    period::ByPeriod,
    prices::PeriodAverages,
    types::{electricity::Kwh, money::Money},
    Error, Result,
};

/// A catalog of tariffs, published as a JSON array of candidates.
pub type TariffCatalog = Vec<TariffCandidate>;

/// A tariff offered by a retailer, or the dynamic regulated tariff.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TariffCandidate {
    pub name: String,
    /// Price of the contracted power, per day.
    pub fixed_term_per_day: Money,
    /// Price per kWh consumed in each period. Ignored for dynamic tariffs, which take the
    /// averaged hourly prices instead.
    #[serde(default)]
    pub peak_energy_price: Money,
    #[serde(default)]
    pub standard_energy_price: Money,
    #[serde(default)]
    pub off_peak_energy_price: Money,
    #[serde(default)]
    pub is_dynamic: bool,
    /// Price paid per kWh fed back into the grid. Without it exported energy is not
    /// compensated.
    #[serde(default)]
    pub surplus_price: Option<Money>,
    /// Surplus that exceeds the energy term is banked and spent on later bills.
    #[serde(default)]
    pub virtual_battery: bool,
    /// Entered by the user rather than taken from a published catalog.
    #[serde(default)]
    pub custom: bool,
}

impl TariffCandidate {
    pub fn energy_prices(&self) -> ByPeriod<Money> {
        ByPeriod::new(
            self.peak_energy_price,
            self.standard_energy_price,
            self.off_peak_energy_price,
        )
    }

    /// This tariff with its energy prices replaced by the averaged dynamic prices.
    ///
    /// A period without an average price is priced at zero when nothing was consumed in it,
    /// otherwise the tariff cannot be priced.
    pub fn with_dynamic_prices(
        &self,
        averages: &PeriodAverages,
        consumption: &ByPeriod<Kwh>,
    ) -> Result<Self> {
        let mut prices = ByPeriod::<Money>::default();

        for (period, average) in averages.averages.iter() {
            prices[period] = match average {
                Some(price) => *price,
                None if consumption[period].is_zero() => Money::zero(),
                None => return Err(Error::MissingPeriodPrice(period)),
            };
        }

        Ok(Self {
            peak_energy_price: prices.peak,
            standard_energy_price: prices.standard,
            off_peak_energy_price: prices.off_peak,
            ..self.clone()
        })
    }
}
