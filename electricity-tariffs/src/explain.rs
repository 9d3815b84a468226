use serde::Serialize;

use crate::{
    fiscal::{BillResult, FiscalRegime},
    types::money::Money,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Explain {
    pub lines: Vec<ExplainLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExplainLine {
    pub label: String,
    pub amount: Money,
}

impl ExplainLine {
    fn new(label: impl Into<String>, amount: Money) -> Self {
        Self {
            label: label.into(),
            amount,
        }
    }
}

/// Break the bill down into the lines of an invoice, in invoice order.
pub fn explain(bill: &BillResult) -> Explain {
    let mut lines = vec![
        ExplainLine::new("Power term", bill.power_cost),
        ExplainLine::new("Energy term", bill.energy_cost),
    ];

    if !bill.surplus_compensation.is_zero() {
        lines.push(ExplainLine::new(
            "Surplus compensation",
            Money::zero() - bill.surplus_compensation,
        ));
    }

    lines.push(ExplainLine::new("Social financing", bill.social_financing));

    if !bill.discount_amount.is_zero() {
        lines.push(ExplainLine::new(
            "Means-tested discount",
            Money::zero() - bill.discount_amount,
        ));
    }

    lines.push(ExplainLine::new("Electricity tax", bill.electricity_tax));
    lines.push(ExplainLine::new("Metering rental", bill.metering_rental));

    let tax = bill.regime.tax_name();
    match bill.regime {
        FiscalRegime::Iva => {
            if let Some(base) = bill.vat_base {
                lines.push(ExplainLine::new(format!("{tax} base"), base));
            }
            lines.push(ExplainLine::new(tax, bill.energy_tax));
        }
        FiscalRegime::CanariasReducedDwelling | FiscalRegime::CanariasOther => {
            lines.push(ExplainLine::new(format!("{tax} on energy"), bill.energy_tax));
            lines.push(ExplainLine::new(format!("{tax} on metering"), bill.metering_tax));
        }
        FiscalRegime::Ipsi => {
            if let Some(base) = bill.ipsi_base {
                lines.push(ExplainLine::new(format!("{tax} base"), base));
            }
            lines.push(ExplainLine::new(format!("{tax} on energy"), bill.energy_tax));
            lines.push(ExplainLine::new(format!("{tax} on metering"), bill.metering_tax));
        }
    }

    if bill.total_before_discount != bill.total_final {
        lines.push(ExplainLine::new(
            "Total before discount",
            bill.total_before_discount,
        ));
    }

    if let Some(battery) = &bill.virtual_battery {
        if !battery.credit.is_zero() {
            lines.push(ExplainLine::new(
                "Virtual battery",
                Money::zero() - battery.credit,
            ));
        }
    }

    lines.push(ExplainLine::new("Total", bill.total_final));

    // After the total, it is not part of the amount to pay.
    if let Some(battery) = &bill.virtual_battery {
        lines.push(ExplainLine::new(
            "Virtual battery balance",
            battery.closing_balance,
        ));
    }

    Explain { lines }
}

#[cfg(test)]
mod explain_tests {
    use rust_decimal_macros::dec;

    use super::explain;
    use crate::{
        config::TariffConfig,
        fiscal::{FiscalCalculator, FiscalContext, FiscalZone, SolarContext},
        period::ByPeriod,
        tariff::TariffCandidate,
        types::{
            electricity::{Kw, Kwh},
            money::Money,
        },
    };

    fn tariff() -> TariffCandidate {
        TariffCandidate {
            name: "Flat".to_owned(),
            fixed_term_per_day: Money::from(dec!(0.1)),
            peak_energy_price: Money::from(dec!(0.15)),
            standard_energy_price: Money::from(dec!(0.15)),
            off_peak_energy_price: Money::from(dec!(0.15)),
            is_dynamic: false,
            surplus_price: None,
            virtual_battery: false,
            custom: false,
        }
    }

    fn consumption() -> ByPeriod<Kwh> {
        ByPeriod::new(
            Kwh::from(dec!(10)),
            Kwh::from(dec!(10)),
            Kwh::from(dec!(10)),
        )
    }

    fn context(zone: FiscalZone) -> FiscalContext {
        FiscalContext {
            zone,
            contracted_power: Kw::from(dec!(3.3)),
            reduced_rate_dwelling: false,
        }
    }

    fn bill(zone: FiscalZone) -> crate::fiscal::BillResult {
        let config = TariffConfig::default();

        FiscalCalculator::new(&config)
            .compute_bill(&tariff(), &consumption(), 30, &context(zone))
            .unwrap()
    }

    #[test]
    fn vat_bill_should_end_with_total() {
        let bill = bill(FiscalZone::Peninsula);
        let explained = explain(&bill);

        let labels: Vec<_> = explained.lines.iter().map(|l| l.label.as_str()).collect();
        assert_eq!(
            labels,
            [
                "Power term",
                "Energy term",
                "Social financing",
                "Electricity tax",
                "Metering rental",
                "IVA base",
                "IVA",
                "Total"
            ]
        );
        assert_eq!(explained.lines.last().unwrap().amount, bill.total_final);
    }

    #[test]
    fn ipsi_bill_should_show_both_taxes() {
        let explained = explain(&bill(FiscalZone::CeutaMelilla));

        assert!(explained.lines.iter().any(|l| l.label == "IPSI on metering"));
        assert!(explained.lines.iter().any(|l| l.label == "IPSI base"));
    }

    #[test]
    fn virtual_battery_should_show_credit_and_balance() {
        let config = TariffConfig::default();
        let tariff = TariffCandidate {
            surplus_price: Some(Money::from(dec!(0.06))),
            virtual_battery: true,
            ..tariff()
        };
        let solar = SolarContext {
            exported: Kwh::from(dec!(100)),
            battery_balance: Money::from(dec!(1.50)),
        };

        let bill = FiscalCalculator::new(&config)
            .compute_bill_with_solar(
                &tariff,
                &consumption(),
                30,
                &context(FiscalZone::Peninsula),
                &solar,
            )
            .unwrap();
        let explained = explain(&bill);

        let labels: Vec<_> = explained.lines.iter().map(|l| l.label.as_str()).collect();
        assert_eq!(
            labels,
            [
                "Power term",
                "Energy term",
                "Surplus compensation",
                "Social financing",
                "Electricity tax",
                "Metering rental",
                "IVA base",
                "IVA",
                "Virtual battery",
                "Total",
                "Virtual battery balance"
            ]
        );

        // 100 kWh at 0.06 exceeds the 4.50 energy term by 1.50, the old balance is spent.
        assert_eq!(explained.lines[2].amount, Money::from(dec!(-4.50)));
        assert_eq!(explained.lines[8].amount, Money::from(dec!(-1.50)));
        assert_eq!(
            explained.lines.last().unwrap().amount,
            Money::from(dec!(1.50))
        );
    }
}
