use std::{collections::HashMap, fmt::Display};

use crate::{period::TimeOfUsePeriod, tariff::TariffCandidate, types::money::Money};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    DuplicateName {
        name: String,
        tariff_indices: Vec<usize>,
    },
    NegativePrice {
        tariff_index: usize,
    },
    PeriodPricesOutOfOrder {
        tariff_index: usize,
        cheaper: TimeOfUsePeriod,
        pricier: TimeOfUsePeriod,
    },
    NoEnergyPrice {
        tariff_index: usize,
    },
    BatteryWithoutSurplusPrice {
        tariff_index: usize,
    },
}

impl Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateName {
                name,
                tariff_indices,
            } => write!(
                f,
                "Tariffs at indices {tariff_indices:?} share the name `{name}`, consider renaming them."
            ),
            Self::NegativePrice { tariff_index } => {
                write!(f, "Tariff at `$[{tariff_index}]` has a negative price.")
            }
            Self::PeriodPricesOutOfOrder {
                tariff_index,
                cheaper,
                pricier,
            } => write!(
                f,
                "Tariff at `$[{tariff_index}]` charges more in {cheaper} than in {pricier}."
            ),
            Self::NoEnergyPrice { tariff_index } => write!(
                f,
                "Tariff at `$[{tariff_index}]` is not dynamic and has no energy price, \
                 consider adding one."
            ),
            Self::BatteryWithoutSurplusPrice { tariff_index } => write!(
                f,
                "Tariff at `$[{tariff_index}]` has a virtual battery but no surplus price, \
                 nothing will be banked."
            ),
        }
    }
}

/// Lint the provided catalog and produce a set of relevant warnings.
pub fn lint(catalog: &[TariffCandidate]) -> Vec<Warning> {
    let mut warnings = Vec::new();

    let mut by_name: HashMap<&str, Vec<usize>> = HashMap::new();
    for (tariff_index, tariff) in catalog.iter().enumerate() {
        by_name
            .entry(tariff.name.trim())
            .or_default()
            .push(tariff_index);
    }

    let mut duplicates: Vec<_> = by_name
        .into_iter()
        .filter(|(_, indices)| indices.len() > 1)
        .collect();
    duplicates.sort_by_key(|(_, indices)| indices[0]);

    warnings.extend(
        duplicates
            .into_iter()
            .map(|(name, tariff_indices)| Warning::DuplicateName {
                name: name.to_owned(),
                tariff_indices,
            }),
    );

    for (tariff_index, tariff) in catalog.iter().enumerate() {
        let prices = tariff.energy_prices();

        if tariff.fixed_term_per_day.is_negative()
            || prices.iter().any(|(_, p)| p.is_negative())
            || tariff.surplus_price.is_some_and(Money::is_negative)
        {
            warnings.push(Warning::NegativePrice { tariff_index });
        }

        if tariff.virtual_battery && tariff.surplus_price.is_none() {
            warnings.push(Warning::BatteryWithoutSurplusPrice { tariff_index });
        }

        // The prices of dynamic tariffs come from the hourly prices.
        if tariff.is_dynamic {
            continue;
        }

        if prices.iter().all(|(_, p)| p.is_zero()) {
            warnings.push(Warning::NoEnergyPrice { tariff_index });
            continue;
        }

        // `ALL` is ordered from most expensive period to cheapest.
        for pair in TimeOfUsePeriod::ALL.windows(2) {
            let (pricier, cheaper) = (pair[0], pair[1]);

            if prices[cheaper] > prices[pricier] {
                warnings.push(Warning::PeriodPricesOutOfOrder {
                    tariff_index,
                    cheaper,
                    pricier,
                });
            }
        }
    }

    warnings
}
