use std::{
    fs::{read_dir, read_to_string, File},
    path::{Path, PathBuf},
};

use electricity_tariffs::{
    discount::{DiscountCalculator, DiscountContext},
    fiscal::{FiscalCalculator, FiscalContext, FiscalRegime, SolarContext, VirtualBattery},
    period::ByPeriod,
    tariff::TariffCandidate,
    types::{electricity::Kwh, money::Money},
};
use serde::Deserialize;

/// A bill scenario and the amounts it is expected to produce.
#[derive(Debug, Clone, Deserialize)]
pub struct BillScenario {
    #[allow(dead_code)]
    pub description: String,
    pub fiscal: FiscalContext,
    pub tariff: TariffCandidate,
    pub consumption: ByPeriod<Kwh>,
    pub days: u32,
    #[serde(default)]
    pub solar: SolarContext,
    pub discount: Option<DiscountContext>,
    pub expected: ExpectedBill,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExpectedBill {
    pub regime: FiscalRegime,
    pub power_cost: Money,
    pub energy_cost: Money,
    #[serde(default)]
    pub surplus_compensation: Money,
    pub social_financing: Money,
    pub discount_amount: Money,
    pub electricity_tax: Money,
    pub metering_rental: Money,
    pub energy_tax: Money,
    pub metering_tax: Money,
    #[serde(default)]
    pub virtual_battery: Option<VirtualBattery>,
    pub total_before_discount: Money,
    pub total_final: Money,
}

pub fn resource(path: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("resources")
        .join(path)
}

pub fn collect_bill_scenarios() -> Result<Vec<(String, BillScenario)>, Box<dyn std::error::Error>> {
    let mut scenarios = Vec::new();

    for json_file in read_dir(resource("bills"))? {
        let file_path = json_file?.path();

        if file_path.extension().unwrap() != "json" {
            continue;
        }

        let name = file_path.file_stem().unwrap().to_string_lossy().to_string();
        scenarios.push((name, serde_json::from_reader(File::open(file_path)?)?));
    }

    scenarios.sort_by(|(a, _), (b, _)| a.cmp(b));

    Ok(scenarios)
}

/// Split a semicolon separated export into rows of cells.
pub fn read_rows(path: &str) -> Vec<Vec<String>> {
    read_to_string(resource(path))
        .unwrap()
        .lines()
        .map(|line| line.split(';').map(str::to_owned).collect())
        .collect()
}

pub fn validate_bill(scenario: BillScenario) -> Result<(), electricity_tariffs::Error> {
    let config = electricity_tariffs::config::TariffConfig::default();
    let calculator = FiscalCalculator::new(&config);

    let mut bill = calculator.compute_bill_with_solar(
        &scenario.tariff,
        &scenario.consumption,
        scenario.days,
        &scenario.fiscal,
        &scenario.solar,
    )?;

    if let Some(context) = scenario.discount.filter(|context| context.enabled) {
        let discount = DiscountCalculator::new(&config.discount).compute_discount(&bill, &context)?;
        bill = calculator.apply_discount(&bill, &discount);
    }

    let expected = scenario.expected;

    assert_eq!(expected.regime, bill.regime, "regime");
    assert_eq!(expected.power_cost, bill.power_cost, "power_cost");
    assert_eq!(expected.energy_cost, bill.energy_cost, "energy_cost");
    assert_eq!(
        expected.surplus_compensation, bill.surplus_compensation,
        "surplus_compensation"
    );
    assert_eq!(
        expected.social_financing, bill.social_financing,
        "social_financing"
    );
    assert_eq!(
        expected.discount_amount, bill.discount_amount,
        "discount_amount"
    );
    assert_eq!(
        expected.electricity_tax, bill.electricity_tax,
        "electricity_tax"
    );
    assert_eq!(
        expected.metering_rental, bill.metering_rental,
        "metering_rental"
    );
    assert_eq!(expected.energy_tax, bill.energy_tax, "energy_tax");
    assert_eq!(expected.metering_tax, bill.metering_tax, "metering_tax");
    assert_eq!(
        expected.virtual_battery, bill.virtual_battery,
        "virtual_battery"
    );
    assert_eq!(
        expected.total_before_discount, bill.total_before_discount,
        "total_before_discount"
    );
    assert_eq!(expected.total_final, bill.total_final, "total_final");

    Ok(())
}
