use std::fmt::Display;

use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    config::TariffConfig,
    discount::Discount,
    period::ByPeriod,
    tariff::TariffCandidate,
    types::{
        electricity::{Kw, Kwh},
        money::Money,
        number::Number,
    },
    Error, Result,
};

const DAYS_PER_YEAR: u32 = 365;
const MONTHS_PER_YEAR: u32 = 12;

/// The regions with their own indirect tax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FiscalZone {
    Peninsula,
    Canarias,
    CeutaMelilla,
}

impl FiscalZone {
    /// The civil time zone used to classify hours in this zone.
    pub fn time_zone(self) -> Tz {
        match self {
            Self::Peninsula | Self::CeutaMelilla => Tz::Europe__Madrid,
            Self::Canarias => Tz::Atlantic__Canary,
        }
    }
}

impl Display for FiscalZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Peninsula => "Peninsula and Balearic Islands",
            Self::Canarias => "Canary Islands",
            Self::CeutaMelilla => "Ceuta and Melilla",
        };

        f.write_str(name)
    }
}

/// The supply point facts that decide which tax regime applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct FiscalContext {
    pub zone: FiscalZone,
    pub contracted_power: Kw,
    /// Whether the supply is a dwelling that qualifies for the reduced rate. Only meaningful in
    /// the Canary Islands.
    #[serde(default)]
    pub reduced_rate_dwelling: bool,
}

/// Solar self-consumption facts of the billed supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct SolarContext {
    /// Energy fed back into the grid over the billed days.
    #[serde(default)]
    pub exported: Kwh,
    /// Euros banked in a virtual battery by earlier bills. Only tariffs with a virtual battery
    /// spend it.
    #[serde(default)]
    pub battery_balance: Money,
}

/// The indirect tax regime a bill was computed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FiscalRegime {
    /// VAT over the whole bill.
    Iva,
    /// IGIC, with a zero rate on energy for qualifying dwellings.
    CanariasReducedDwelling,
    /// IGIC at the general energy rate.
    CanariasOther,
    /// The Ceuta and Melilla tax on production, services and imports.
    Ipsi,
}

impl FiscalRegime {
    /// The name of the indirect tax of this regime.
    pub fn tax_name(self) -> &'static str {
        match self {
            Self::Iva => "IVA",
            Self::CanariasReducedDwelling | Self::CanariasOther => "IGIC",
            Self::Ipsi => "IPSI",
        }
    }
}

impl Display for FiscalRegime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Iva => "IVA",
            Self::CanariasReducedDwelling => "IGIC reduced dwelling",
            Self::CanariasOther => "IGIC",
            Self::Ipsi => "IPSI",
        };

        f.write_str(name)
    }
}

/// The virtual battery of a bill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct VirtualBattery {
    /// Balance banked by earlier bills.
    pub opening_balance: Money,
    /// The part of the opening balance spent on this bill.
    pub credit: Money,
    /// Balance carried to the next bill: what was left of the opening balance plus the surplus
    /// this bill could not compensate.
    pub closing_balance: Money,
}

/// Structure containing the composed bill of a single tariff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BillResult {
    /// The regime that was used to levy the indirect taxes.
    pub regime: FiscalRegime,
    /// The number of billed days.
    pub days: u32,
    /// Total consumption over all periods.
    pub consumption: Kwh,

    /// Fixed term, the daily power price times the billed days.
    pub power_cost: Money,
    /// Variable term, the consumption of each period times its price.
    pub energy_cost: Money,
    /// Exported energy paid at the surplus price, at most the energy term.
    pub surplus_compensation: Money,
    /// The value of the exported energy above the energy term. Lost unless the tariff has a
    /// virtual battery.
    pub surplus_leftover: Money,
    /// Surcharge financing the social discount.
    pub social_financing: Money,
    /// The means-tested discount, zero when none applies.
    pub discount_amount: Money,
    /// The part of the energy term that was eligible for the discount.
    pub covered_ratio: Decimal,

    /// Special tax on electricity.
    pub electricity_tax: Money,
    /// Rental of the metering equipment.
    pub metering_rental: Money,
    /// Base of the VAT, only under the VAT regime.
    pub vat_base: Option<Money>,
    /// Base of the IPSI on energy, only under the IPSI regime.
    pub ipsi_base: Option<Money>,
    /// Indirect tax on the energy related charges. Under the VAT regime this is the VAT of the
    /// whole bill.
    pub energy_tax: Money,
    /// Indirect tax on the metering rental. Zero under the VAT regime, where the rental is
    /// part of the VAT base.
    pub metering_tax: Money,

    /// Only for tariffs with a virtual battery.
    pub virtual_battery: Option<VirtualBattery>,

    /// The total as if no discount was applied.
    pub total_before_discount: Money,
    /// The amount to pay.
    pub total_final: Money,
}

impl BillResult {
    /// The charges the electricity tax is levied on.
    pub fn energy_base(&self) -> Money {
        self.charges().energy_base(self.discount_amount)
    }

    /// The virtual battery balance carried to the next bill, zero without a virtual battery.
    pub fn banked_balance(&self) -> Money {
        self.virtual_battery
            .map_or(Money::zero(), |battery| battery.closing_balance)
    }

    /// The energy term after the surplus compensation.
    pub fn net_energy_cost(&self) -> Money {
        self.energy_cost - self.surplus_compensation
    }

    fn charges(&self) -> Charges {
        Charges {
            consumption: self.consumption,
            power_cost: self.power_cost,
            energy_cost: self.energy_cost,
            surplus_compensation: self.surplus_compensation,
            social_financing: self.social_financing,
            metering_rental: self.metering_rental,
        }
    }
}

/// The charges of a bill before any tax.
#[derive(Debug, Clone, Copy)]
struct Charges {
    consumption: Kwh,
    power_cost: Money,
    energy_cost: Money,
    surplus_compensation: Money,
    social_financing: Money,
    metering_rental: Money,
}

impl Charges {
    fn energy_base(&self, discount: Money) -> Money {
        self.power_cost + self.energy_cost - self.surplus_compensation + self.social_financing
            - discount
    }
}

/// Exported energy valued at the surplus price of a tariff.
#[derive(Debug, Clone, Copy)]
struct Surplus {
    compensation: Money,
    leftover: Money,
}

impl Surplus {
    fn none() -> Self {
        Self {
            compensation: Money::zero(),
            leftover: Money::zero(),
        }
    }
}

/// The taxes levied on a set of charges.
#[derive(Debug, Clone, Copy)]
struct Levy {
    electricity_tax: Money,
    vat_base: Option<Money>,
    ipsi_base: Option<Money>,
    energy_tax: Money,
    metering_tax: Money,
    total: Money,
}

/// Composes bills under the tax regime of the supply.
pub struct FiscalCalculator<'a> {
    config: &'a TariffConfig,
}

impl<'a> FiscalCalculator<'a> {
    pub fn new(config: &'a TariffConfig) -> Self {
        Self { config }
    }

    /// Decide which regime applies to the supply.
    ///
    /// The reduced dwelling regime requires both the dwelling flag and a contracted power above
    /// zero and not exceeding the configured limit. When the power is too high the supply falls
    /// back to the general Canary Islands regime.
    pub fn select_regime(&self, context: &FiscalContext) -> Result<FiscalRegime> {
        if context.contracted_power.is_negative() {
            return Err(Error::invalid(format!(
                "contracted power {} is negative",
                context.contracted_power
            )));
        }

        let regime = match context.zone {
            FiscalZone::Peninsula => FiscalRegime::Iva,
            FiscalZone::CeutaMelilla => FiscalRegime::Ipsi,
            FiscalZone::Canarias => {
                let power_qualifies = context.contracted_power.is_positive()
                    && context.contracted_power <= self.config.canarias.reduced_rate_max_power;

                if context.reduced_rate_dwelling && power_qualifies {
                    FiscalRegime::CanariasReducedDwelling
                } else {
                    FiscalRegime::CanariasOther
                }
            }
        };

        debug!(zone = ?context.zone, power = %context.contracted_power, ?regime, "Selected fiscal regime");

        Ok(regime)
    }

    /// Compose the bill of `tariff` for the given consumption per period, without any discount.
    pub fn compute_bill(
        &self,
        tariff: &TariffCandidate,
        consumption: &ByPeriod<Kwh>,
        days: u32,
        context: &FiscalContext,
    ) -> Result<BillResult> {
        self.compute_bill_with_solar(tariff, consumption, days, context, &SolarContext::default())
    }

    /// Compose the bill of `tariff` for a supply that also feeds energy back into the grid.
    ///
    /// The exported energy is paid at the surplus price of the tariff and subtracted from the
    /// energy term before any tax, but never more than the energy term. With a virtual battery
    /// the banked balance pays for the taxed total and the uncompensated surplus is banked.
    pub fn compute_bill_with_solar(
        &self,
        tariff: &TariffCandidate,
        consumption: &ByPeriod<Kwh>,
        days: u32,
        context: &FiscalContext,
        solar: &SolarContext,
    ) -> Result<BillResult> {
        if days == 0 {
            return Err(Error::invalid("a bill must cover at least one day"));
        }

        if let Some((period, _)) = consumption.iter().find(|(_, kwh)| kwh.is_negative()) {
            return Err(Error::invalid(format!(
                "consumption in period {period} is negative"
            )));
        }

        if solar.exported.is_negative() {
            return Err(Error::invalid(format!(
                "exported energy {} is negative",
                solar.exported
            )));
        }

        if solar.battery_balance.is_negative() {
            return Err(Error::invalid(format!(
                "virtual battery balance {} is negative",
                solar.battery_balance
            )));
        }

        let regime = self.select_regime(context)?;
        let mut charges = self.charges(tariff, consumption, days)?;
        let surplus = surplus(tariff, solar.exported, charges.energy_cost)?;
        charges.surplus_compensation = surplus.compensation;

        let levy = self.levy(regime, &charges, Money::zero());
        let opening_balance = tariff
            .virtual_battery
            .then_some(solar.battery_balance.round_cents());
        let (total, virtual_battery) = settle(levy.total, surplus.leftover, opening_balance);

        Ok(BillResult {
            regime,
            days,
            consumption: charges.consumption,
            power_cost: charges.power_cost,
            energy_cost: charges.energy_cost,
            surplus_compensation: surplus.compensation,
            surplus_leftover: surplus.leftover,
            social_financing: charges.social_financing,
            discount_amount: Money::zero(),
            covered_ratio: Decimal::ZERO,
            electricity_tax: levy.electricity_tax,
            metering_rental: charges.metering_rental,
            vat_base: levy.vat_base,
            ipsi_base: levy.ipsi_base,
            energy_tax: levy.energy_tax,
            metering_tax: levy.metering_tax,
            virtual_battery,
            total_before_discount: total,
            total_final: total,
        })
    }

    /// Recompute the taxes of `bill` with the discount subtracted from the energy base.
    ///
    /// The electricity tax and the indirect taxes are levied on the discounted charges, the
    /// total before discount is kept.
    pub fn apply_discount(&self, bill: &BillResult, discount: &Discount) -> BillResult {
        let levy = self.levy(bill.regime, &bill.charges(), discount.amount);
        let opening_balance = bill.virtual_battery.map(|battery| battery.opening_balance);
        let (total, virtual_battery) = settle(levy.total, bill.surplus_leftover, opening_balance);

        BillResult {
            discount_amount: discount.amount,
            covered_ratio: discount.covered_ratio,
            electricity_tax: levy.electricity_tax,
            vat_base: levy.vat_base,
            ipsi_base: levy.ipsi_base,
            energy_tax: levy.energy_tax,
            metering_tax: levy.metering_tax,
            virtual_battery,
            total_final: total,
            ..bill.clone()
        }
    }

    fn charges(
        &self,
        tariff: &TariffCandidate,
        consumption: &ByPeriod<Kwh>,
        days: u32,
    ) -> Result<Charges> {
        let day_count = Number::from(days);
        let prices = tariff.energy_prices();

        let energy_cost: Money = consumption
            .iter()
            .map(|(period, kwh)| *kwh * prices[period])
            .sum();

        let social_financing = (self.config.social_financing_per_year * day_count)
            .checked_div(Number::from(DAYS_PER_YEAR))
            .ok_or(Error::NumericOverflow)?;

        let metering_rental = (self.config.metering_rental_per_month
            * day_count
            * Number::from(MONTHS_PER_YEAR))
        .checked_div(Number::from(DAYS_PER_YEAR))
        .ok_or(Error::NumericOverflow)?;

        Ok(Charges {
            consumption: consumption.iter().map(|(_, kwh)| *kwh).sum(),
            power_cost: (tariff.fixed_term_per_day * day_count).round_cents(),
            energy_cost: energy_cost.round_cents(),
            surplus_compensation: Money::zero(),
            social_financing: social_financing.round_cents(),
            metering_rental: metering_rental.round_cents(),
        })
    }

    fn levy(&self, regime: FiscalRegime, charges: &Charges, discount: Money) -> Levy {
        let config = self.config;
        let energy_base = charges.energy_base(discount);

        let proportional = config.electricity_tax.percentage.of(energy_base);
        let minimum = config.electricity_tax.minimum_per_kwh * charges.consumption;
        let electricity_tax = proportional.max(minimum).round_cents();

        let taxed_energy = energy_base + electricity_tax;

        match regime {
            FiscalRegime::Iva => {
                let vat_base = taxed_energy + charges.metering_rental;
                let energy_tax = config.peninsula.vat.of(vat_base).round_cents();

                Levy {
                    electricity_tax,
                    vat_base: Some(vat_base),
                    ipsi_base: None,
                    energy_tax,
                    metering_tax: Money::zero(),
                    total: (vat_base + energy_tax).round_cents(),
                }
            }
            FiscalRegime::CanariasReducedDwelling | FiscalRegime::CanariasOther => {
                let energy_rate = if regime == FiscalRegime::CanariasReducedDwelling {
                    config.canarias.reduced_dwelling_energy
                } else {
                    config.canarias.other_energy
                };
                let energy_tax = energy_rate.of(taxed_energy).round_cents();
                let metering_tax = config
                    .canarias
                    .metering
                    .of(charges.metering_rental)
                    .round_cents();

                Levy {
                    electricity_tax,
                    vat_base: None,
                    ipsi_base: None,
                    energy_tax,
                    metering_tax,
                    total: (taxed_energy + charges.metering_rental + energy_tax + metering_tax)
                        .round_cents(),
                }
            }
            FiscalRegime::Ipsi => {
                let energy_tax = config.ceuta_melilla.energy.of(taxed_energy).round_cents();
                let metering_tax = config
                    .ceuta_melilla
                    .metering
                    .of(charges.metering_rental)
                    .round_cents();

                Levy {
                    electricity_tax,
                    vat_base: None,
                    ipsi_base: Some(taxed_energy),
                    energy_tax,
                    metering_tax,
                    total: (taxed_energy + charges.metering_rental + energy_tax + metering_tax)
                        .round_cents(),
                }
            }
        }
    }
}

fn surplus(tariff: &TariffCandidate, exported: Kwh, energy_cost: Money) -> Result<Surplus> {
    let Some(price) = tariff.surplus_price else {
        return Ok(Surplus::none());
    };

    if price.is_negative() {
        return Err(Error::invalid(format!(
            "surplus price {price} of tariff `{}` is negative",
            tariff.name
        )));
    }

    let value = (exported * price).round_cents();
    let compensation = value.min(energy_cost);

    debug!(tariff = %tariff.name, %exported, %value, %compensation, "Compensated surplus");

    Ok(Surplus {
        compensation,
        leftover: value - compensation,
    })
}

/// Spend the virtual battery, if any, on the taxed total.
fn settle(
    total: Money,
    leftover: Money,
    opening_balance: Option<Money>,
) -> (Money, Option<VirtualBattery>) {
    let Some(opening_balance) = opening_balance else {
        return (total, None);
    };

    let credit = opening_balance.min(total);
    let battery = VirtualBattery {
        opening_balance,
        credit,
        closing_balance: opening_balance - credit + leftover,
    };

    (total - credit, Some(battery))
}
