use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    config::DiscountRates,
    fiscal::BillResult,
    types::{
        electricity::Kwh,
        money::{Money, Percentage},
        number::Number,
    },
    Error, Result,
};

const DAYS_PER_YEAR: u32 = 365;

/// Beneficiary tiers of the means-tested discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountTier {
    Vulnerable,
    Severe,
}

/// Whether and how the means-tested discount applies to a household.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct DiscountContext {
    pub enabled: bool,
    pub tier: DiscountTier,
    /// The yearly consumption eligible for the discount.
    pub annual_cap: Kwh,
}

impl DiscountContext {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            tier: DiscountTier::Vulnerable,
            annual_cap: Kwh::zero(),
        }
    }
}

/// The outcome of the discount computation for a single bill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Discount {
    /// The amount subtracted from the bill, rounded to cents.
    pub amount: Money,
    /// The share of the energy term that is eligible, `1` when consumption stays under the cap
    /// and `0` when the discount does not apply.
    pub covered_ratio: Decimal,
    /// The charges the discount rate was applied to.
    pub eligible_base: Money,
    /// The cap for the billed days.
    pub prorated_cap: Kwh,
    pub rate: Percentage,
}

impl Discount {
    pub fn none() -> Self {
        Self {
            amount: Money::zero(),
            covered_ratio: Decimal::ZERO,
            eligible_base: Money::zero(),
            prorated_cap: Kwh::zero(),
            rate: Percentage::default(),
        }
    }
}

/// Computes the means-tested discount of a bill.
pub struct DiscountCalculator<'a> {
    rates: &'a DiscountRates,
}

impl<'a> DiscountCalculator<'a> {
    pub fn new(rates: &'a DiscountRates) -> Self {
        Self { rates }
    }

    pub fn rate(&self, tier: DiscountTier) -> Percentage {
        match tier {
            DiscountTier::Vulnerable => self.rates.vulnerable,
            DiscountTier::Severe => self.rates.severe,
        }
    }

    /// Compute the discount of a bill that has no discount applied yet. The consumption and
    /// the billed days are taken from the bill.
    ///
    /// The annual cap is prorated to the billed days. The fixed term and the social financing
    /// surcharge are always eligible, the energy term net of surplus compensation only for the
    /// share of the consumption that stays under the prorated cap.
    pub fn compute_discount(
        &self,
        bill: &BillResult,
        context: &DiscountContext,
    ) -> Result<Discount> {
        if !context.enabled {
            return Ok(Discount::none());
        }

        if context.annual_cap.is_negative() {
            return Err(Error::invalid("the annual discount cap is negative"));
        }

        if bill.days == 0 {
            return Err(Error::invalid("a bill must cover at least one day"));
        }

        let prorated_cap = (Number::from(context.annual_cap) * Number::from(bill.days))
            .checked_div(Number::from(DAYS_PER_YEAR))
            .map(Kwh::from)
            .ok_or(Error::NumericOverflow)?;

        let covered_ratio = if bill.consumption <= prorated_cap {
            Number::one()
        } else {
            prorated_cap
                .ratio_of(bill.consumption)
                .ok_or(Error::NumericOverflow)?
        };

        let eligible_base =
            bill.power_cost + bill.social_financing + bill.net_energy_cost() * covered_ratio;
        let rate = self.rate(context.tier);
        let amount = rate.of(eligible_base).round_cents().min(eligible_base);

        Ok(Discount {
            amount,
            covered_ratio: covered_ratio.into(),
            eligible_base,
            prorated_cap,
            rate,
        })
    }
}

#[cfg(test)]
mod discount_tests {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use super::{DiscountCalculator, DiscountContext, DiscountTier};
    use crate::{
        config::DiscountRates,
        fiscal::{BillResult, FiscalRegime},
        types::{electricity::Kwh, money::Money},
        Error,
    };

    fn bill(consumption: Decimal, days: u32) -> BillResult {
        BillResult {
            regime: FiscalRegime::Iva,
            days,
            consumption: Kwh::from(consumption),
            power_cost: Money::from(dec!(10.00)),
            energy_cost: Money::from(dec!(40.00)),
            surplus_compensation: Money::zero(),
            surplus_leftover: Money::zero(),
            social_financing: Money::from(dec!(0.57)),
            discount_amount: Money::zero(),
            covered_ratio: Decimal::ZERO,
            electricity_tax: Money::zero(),
            metering_rental: Money::zero(),
            vat_base: None,
            ipsi_base: None,
            energy_tax: Money::zero(),
            metering_tax: Money::zero(),
            virtual_battery: None,
            total_before_discount: Money::from(dec!(50.57)),
            total_final: Money::from(dec!(50.57)),
        }
    }

    fn context(tier: DiscountTier, cap: Decimal) -> DiscountContext {
        DiscountContext {
            enabled: true,
            tier,
            annual_cap: Kwh::from(cap),
        }
    }

    #[test]
    fn consumption_above_cap_should_prorate_energy_term() {
        let rates = DiscountRates::default();
        let discount = DiscountCalculator::new(&rates)
            .compute_discount(&bill(dec!(300), 30), &context(DiscountTier::Vulnerable, dec!(365)))
            .unwrap();

        assert_eq!(discount.prorated_cap, Kwh::from(dec!(30)));
        assert_eq!(discount.covered_ratio, dec!(0.1));
        // 10.00 + 0.57 + 40.00 * 0.1
        assert_eq!(discount.eligible_base, Money::from(dec!(14.57)));
        assert_eq!(discount.amount, Money::from(dec!(5.10)));
    }

    #[test]
    fn consumption_under_cap_should_be_fully_covered() {
        let rates = DiscountRates::default();
        let discount = DiscountCalculator::new(&rates)
            .compute_discount(&bill(dec!(100), 30), &context(DiscountTier::Severe, dec!(1587)))
            .unwrap();

        assert_eq!(discount.covered_ratio, Decimal::ONE);
        assert_eq!(discount.eligible_base, Money::from(dec!(50.57)));
        assert_eq!(discount.amount, Money::from(dec!(25.29)));
    }

    #[test]
    fn compensated_energy_should_not_be_discounted() {
        let rates = DiscountRates::default();
        let bill = BillResult {
            surplus_compensation: Money::from(dec!(15.00)),
            ..bill(dec!(100), 30)
        };

        let discount = DiscountCalculator::new(&rates)
            .compute_discount(&bill, &context(DiscountTier::Severe, dec!(1587)))
            .unwrap();

        // 10.00 + 0.57 + (40.00 - 15.00)
        assert_eq!(discount.eligible_base, Money::from(dec!(35.57)));
        assert_eq!(discount.amount, Money::from(dec!(17.79)));
    }

    #[test]
    fn severe_tier_should_discount_more_than_vulnerable() {
        let rates = DiscountRates::default();
        let calculator = DiscountCalculator::new(&rates);
        let bill = bill(dec!(200), 30);

        let vulnerable = calculator
            .compute_discount(&bill, &context(DiscountTier::Vulnerable, dec!(1200)))
            .unwrap();
        let severe = calculator
            .compute_discount(&bill, &context(DiscountTier::Severe, dec!(1200)))
            .unwrap();

        assert!(severe.amount > vulnerable.amount);
    }

    #[test]
    fn disabled_discount_should_be_zero() {
        let rates = DiscountRates::default();
        let discount = DiscountCalculator::new(&rates)
            .compute_discount(&bill(dec!(300), 30), &DiscountContext::disabled())
            .unwrap();

        assert_eq!(discount.amount, Money::zero());
        assert_eq!(discount.covered_ratio, Decimal::ZERO);
    }

    #[test]
    fn discount_should_never_exceed_eligible_base() {
        let rates = DiscountRates {
            vulnerable: dec!(150).into(),
            severe: dec!(150).into(),
        };
        let discount = DiscountCalculator::new(&rates)
            .compute_discount(&bill(dec!(100), 30), &context(DiscountTier::Severe, dec!(1587)))
            .unwrap();

        assert_eq!(discount.amount, discount.eligible_base);
    }

    #[test]
    fn zero_cap_should_only_cover_fixed_charges() {
        let rates = DiscountRates::default();
        let discount = DiscountCalculator::new(&rates)
            .compute_discount(&bill(dec!(100), 30), &context(DiscountTier::Vulnerable, dec!(0)))
            .unwrap();

        assert_eq!(discount.covered_ratio, Decimal::ZERO);
        assert_eq!(discount.eligible_base, Money::from(dec!(10.57)));
    }

    #[test]
    fn negative_cap_should_be_rejected() {
        let rates = DiscountRates::default();
        let err = DiscountCalculator::new(&rates)
            .compute_discount(&bill(dec!(100), 30), &context(DiscountTier::Vulnerable, dec!(-1)))
            .unwrap_err();

        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
