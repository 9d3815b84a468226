use std::{cmp::Reverse, fmt::Display};

use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    config::TariffConfig,
    discount::{DiscountCalculator, DiscountContext},
    fiscal::{BillResult, FiscalCalculator, FiscalContext, SolarContext},
    period::{ByPeriod, TimeOfUsePeriod},
    prices::PeriodAverages,
    tariff::TariffCandidate,
    types::{
        electricity::{Kw, Kwh},
        money::Money,
        number::Number,
    },
    Error, Result,
};

/// Pricer that encapsulates the consumption of a household and prices a catalog of tariffs
/// for it. To run the pricer call `build_report`. The resulting report ranks the tariffs from
/// cheapest to most expensive.
///
/// ```ignore
/// let pricer = Pricer::new(&config, fiscal, consumption, 30)
///     .with_dynamic_prices(averages)
///     .with_discount(discount);
/// let report = pricer.build_report(&catalog)?;
/// ```
pub struct Pricer<'a> {
    config: &'a TariffConfig,
    fiscal: FiscalContext,
    discount: DiscountContext,
    consumption: ByPeriod<Kwh>,
    days: u32,
    dynamic_prices: Option<PeriodAverages>,
    solar: SolarContext,
}

impl<'a> Pricer<'a> {
    /// Instantiate the pricer for the consumption per period over `days` billed days.
    pub fn new(
        config: &'a TariffConfig,
        fiscal: FiscalContext,
        consumption: ByPeriod<Kwh>,
        days: u32,
    ) -> Self {
        Self {
            config,
            fiscal,
            discount: DiscountContext::disabled(),
            consumption,
            days,
            dynamic_prices: None,
            solar: SolarContext::default(),
        }
    }

    /// Apply the means-tested discount to dynamic tariffs.
    #[must_use]
    pub fn with_discount(mut self, discount: DiscountContext) -> Self {
        self.discount = discount;
        self
    }

    /// Price dynamic tariffs with these averaged hourly prices. Without them dynamic tariffs
    /// are reported as unavailable.
    #[must_use]
    pub fn with_dynamic_prices(mut self, averages: PeriodAverages) -> Self {
        self.dynamic_prices = Some(averages);
        self
    }

    /// Compensate exported energy at the surplus price of each tariff, and spend the virtual
    /// battery balance on tariffs that have one.
    #[must_use]
    pub fn with_solar(mut self, solar: SolarContext) -> Self {
        self.solar = solar;
        self
    }

    /// Price every tariff of the catalog and rank them.
    pub fn build_report(&self, catalog: &[TariffCandidate]) -> Result<Report> {
        let mut entries = catalog
            .iter()
            .map(|tariff| {
                Ok(ReportEntry {
                    position: 0,
                    name: tariff.name.clone(),
                    is_dynamic: tariff.is_dynamic,
                    custom: tariff.custom,
                    outcome: self.price(tariff)?,
                    difference_to_cheapest: None,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        // Equal totals rank the larger banked balance first, then keep their catalog order.
        entries.sort_by_key(|entry| match &entry.outcome {
            Outcome::Priced(bill) => (false, bill.total_final, Reverse(bill.banked_balance())),
            Outcome::Unavailable(_) => (true, Money::zero(), Reverse(Money::zero())),
        });

        let totals: Vec<Money> = entries
            .iter()
            .filter_map(ReportEntry::bill)
            .map(|bill| bill.total_final)
            .collect();

        let cheapest_total = totals.first().copied();

        for (index, entry) in entries.iter_mut().enumerate() {
            entry.position = index + 1;
            entry.difference_to_cheapest = entry
                .bill()
                .zip(cheapest_total)
                .map(|(bill, cheapest)| bill.total_final - cheapest);
        }

        let average_total = if totals.is_empty() {
            None
        } else {
            totals
                .iter()
                .copied()
                .sum::<Money>()
                .checked_div(Number::from(totals.len()))
                .map(Money::round_cents)
        };

        let cheapest = entries
            .first()
            .filter(|entry| entry.bill().is_some())
            .map(|entry| entry.name.clone());

        Ok(Report {
            days: self.days,
            consumption: self.consumption,
            solar: self.solar,
            cheapest,
            min_total: cheapest_total,
            max_total: totals.last().copied(),
            average_total,
            entries,
        })
    }

    fn price(&self, tariff: &TariffCandidate) -> Result<Outcome> {
        let calculator = FiscalCalculator::new(self.config);

        let compute = |tariff: &TariffCandidate| {
            calculator.compute_bill_with_solar(
                tariff,
                &self.consumption,
                self.days,
                &self.fiscal,
                &self.solar,
            )
        };

        if !tariff.is_dynamic {
            return Ok(Outcome::Priced(compute(tariff)?));
        }

        if self.fiscal.contracted_power > self.config.dynamic_max_power {
            debug!(tariff = %tariff.name, "Contracted power is above the dynamic tariff limit");
            return Ok(Outcome::Unavailable(Unavailable::PowerAboveLimit(
                self.config.dynamic_max_power,
            )));
        }

        let Some(averages) = &self.dynamic_prices else {
            warn!(tariff = %tariff.name, "No dynamic prices available");
            return Ok(Outcome::Unavailable(Unavailable::NoDynamicPrices));
        };

        let tariff = match tariff.with_dynamic_prices(averages, &self.consumption) {
            Ok(tariff) => tariff,
            Err(Error::MissingPeriodPrice(period)) => {
                warn!(tariff = %tariff.name, %period, "No dynamic price for a period with consumption");
                return Ok(Outcome::Unavailable(Unavailable::MissingPeriodPrice(period)));
            }
            Err(err) => return Err(err),
        };

        let bill = compute(&tariff)?;

        if !self.discount.enabled {
            return Ok(Outcome::Priced(bill));
        }

        let discount =
            DiscountCalculator::new(&self.config.discount).compute_discount(&bill, &self.discount)?;

        Ok(Outcome::Priced(calculator.apply_discount(&bill, &discount)))
    }
}

/// Structure containing the ranked tariffs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    /// The number of billed days.
    pub days: u32,
    /// The consumption every tariff was priced for.
    pub consumption: ByPeriod<Kwh>,
    /// The exported energy and banked balance every tariff was priced for.
    pub solar: SolarContext,
    /// Every tariff of the catalog, cheapest first. Tariffs that could not be priced come last.
    pub entries: Vec<ReportEntry>,
    /// Name of the cheapest tariff.
    pub cheapest: Option<String>,
    /// Lowest total over the priced tariffs.
    pub min_total: Option<Money>,
    /// Highest total over the priced tariffs.
    pub max_total: Option<Money>,
    /// Average total over the priced tariffs, rounded to cents.
    pub average_total: Option<Money>,
}

/// A single ranked tariff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    /// Position in the ranking, starting at one.
    pub position: usize,
    pub name: String,
    pub is_dynamic: bool,
    pub custom: bool,
    pub outcome: Outcome,
    /// How much more this tariff costs than the cheapest one.
    pub difference_to_cheapest: Option<Money>,
}

impl ReportEntry {
    pub fn bill(&self) -> Option<&BillResult> {
        match &self.outcome {
            Outcome::Priced(bill) => Some(bill),
            Outcome::Unavailable(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Priced(BillResult),
    Unavailable(Unavailable),
}

/// Why a tariff could not be priced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Unavailable {
    /// A dynamic tariff was requested but no hourly prices were supplied.
    NoDynamicPrices,
    /// The contracted power is above the limit for dynamic tariffs.
    PowerAboveLimit(Kw),
    /// No hourly price fell in a period that has consumption.
    MissingPeriodPrice(TimeOfUsePeriod),
}

impl Display for Unavailable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoDynamicPrices => f.write_str("no dynamic prices available"),
            Self::PowerAboveLimit(limit) => {
                write!(f, "only available up to {limit} of contracted power")
            }
            Self::MissingPeriodPrice(period) => write!(f, "no price for period {period}"),
        }
    }
}
