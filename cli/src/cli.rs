use std::{
    path::{Path, PathBuf},
    process::exit,
};

use chrono::NaiveDate;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use console::style;
use electricity_tariffs::{
    config::TariffConfig,
    discount::{DiscountContext, DiscountTier},
    explain::explain,
    fiscal::{FiscalContext, FiscalZone, SolarContext},
    import::{ImportFormat, ImportSummary, Importer},
    lint::lint,
    period::{ByPeriod, Classifier},
    pricer::{Outcome, Pricer, Report},
    prices::{PeriodAverages, PriceAggregator, PriceDataset},
    tariff::TariffCatalog,
    types::{
        electricity::{Kw, Kwh},
        money::Money,
    },
};
use rust_decimal::Decimal;
use tabled::{settings::Style, Table, Tabled};
use tracing::{level_filters::LevelFilter, warn};

use crate::{
    error::Error,
    load::{dataset_time_zone, Input},
    Result,
};

#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Cli {
    /// Log more details to standard error, repeat for even more.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[clap(subcommand)]
    command: Command,
}

impl Cli {
    pub fn run(self) {
        init_tracing(self.verbose);

        if let Err(err) = self.command.run() {
            eprintln!("{} {}", style("error:").red().bold(), err);
            exit(1);
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Import a consumption export of a distributor and show the consumption per period.
    ///
    /// Both the export with one row for every hourly reading and the export with one row per
    /// day and a column for every hour are recognized.
    Import(Import),
    /// Average the hourly prices of a dynamic price dataset per period.
    Prices(Prices),
    /// Price a catalog of tariffs for a consumption and rank them from cheap to expensive.
    Compare(Compare),
    /// Check a catalog of tariffs for likely mistakes.
    Lint(Lint),
}

impl Command {
    fn run(self) -> Result<()> {
        match self {
            Self::Import(args) => args.run(),
            Self::Prices(args) => args.run(),
            Self::Compare(args) => args.run(),
            Self::Lint(args) => args.run(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum Zone {
    #[default]
    Peninsula,
    Canarias,
    CeutaMelilla,
}

impl From<Zone> for FiscalZone {
    fn from(zone: Zone) -> Self {
        match zone {
            Zone::Peninsula => Self::Peninsula,
            Zone::Canarias => Self::Canarias,
            Zone::CeutaMelilla => Self::CeutaMelilla,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Tier {
    Vulnerable,
    Severe,
}

impl From<Tier> for DiscountTier {
    fn from(tier: Tier) -> Self {
        match tier {
            Tier::Vulnerable => Self::Vulnerable,
            Tier::Severe => Self::Severe,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Readings,
    Matrix,
}

impl From<Format> for ImportFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Readings => Self::ReadingPerRow,
            Format::Matrix => Self::DailyMatrix,
        }
    }
}

#[derive(Debug, Args)]
pub struct ZoneArgs {
    /// The fiscal zone of the supply. Determines the time zone, the period schedule and the
    /// taxes.
    #[arg(short = 'z', long, value_enum, default_value_t = Zone::Peninsula)]
    zone: Zone,
    /// A path to a json file overriding the regulated values, such as tax rates.
    ///
    /// Values missing from the file keep their default.
    #[arg(long)]
    config: Option<PathBuf>,
}

impl ZoneArgs {
    fn load_config(&self) -> Result<TariffConfig> {
        match &self.config {
            Some(path) => Input::new(Some(path.as_path())).json("configuration"),
            None => Ok(TariffConfig::default()),
        }
    }

    fn classifier(&self, config: &TariffConfig) -> Classifier {
        Classifier::for_zone(config, self.zone.into())
    }
}

fn load_prices(path: &Path, classifier: &Classifier) -> Result<PriceDataset> {
    let dataset: PriceDataset = Input::new(Some(path)).json("price dataset")?;

    if let Some(time_zone) = dataset_time_zone(&dataset)? {
        if time_zone != classifier.time_zone() {
            warn!(
                dataset = %time_zone,
                zone = %classifier.time_zone(),
                "Price dataset is published for another time zone, prices are classified in the zone's local time"
            );
        }
    }

    Ok(dataset)
}

fn aggregate(
    dataset: &PriceDataset,
    classifier: &Classifier,
    range: Option<(NaiveDate, NaiveDate)>,
) -> Result<PeriodAverages> {
    let points = dataset.points();
    let aggregator = PriceAggregator::new(classifier);

    let averages = match range {
        Some((start, end)) => aggregator.aggregate(&points, start, end)?,
        None => aggregator.aggregate_all(&points)?,
    };

    Ok(averages)
}

#[derive(Debug, Parser)]
pub struct Import {
    /// A path to the consumption export in csv format.
    ///
    /// If no path is provided the export is read from standard in.
    file: Option<PathBuf>,
    /// Skip the detection of the layout.
    #[arg(short = 'f', long, value_enum)]
    format: Option<Format>,
    /// Also list every reading.
    #[arg(long)]
    readings: bool,
    #[command(flatten)]
    zone: ZoneArgs,
}

#[derive(Debug, Tabled)]
struct PeriodRow {
    period: String,
    consumption: String,
    exported: String,
}

#[derive(Debug, Tabled)]
struct ReadingRow {
    date: NaiveDate,
    hour: String,
    period: String,
    energy: String,
    method: String,
}

impl Import {
    fn run(self) -> Result<()> {
        let config = self.zone.load_config()?;
        let classifier = self.zone.classifier(&config);
        let input = Input::new(self.file.as_deref());

        let rows = input.rows()?;
        let importer = Importer::new(&classifier);
        let summary = match self.format {
            Some(format) => importer.import_as(&rows, format.into())?,
            None => importer.import(&rows)?,
        };

        println!(
            "{} `{}` as {}",
            style("Imported").green(),
            input.name(),
            summary.format
        );

        print_summary(&summary);

        if self.readings {
            let rows = summary.readings.iter().map(|reading| ReadingRow {
                date: reading.date,
                hour: reading.hour.to_string(),
                period: reading.period.code().to_owned(),
                energy: reading.energy.to_string(),
                method: format!("{:?}", reading.method).to_lowercase(),
            });

            println!("{}", Table::new(rows).with(Style::modern()));
        }

        Ok(())
    }
}

fn print_summary(summary: &ImportSummary) {
    let mut rows: Vec<_> = summary
        .totals
        .iter()
        .map(|(period, kwh)| PeriodRow {
            period: period.to_string(),
            consumption: kwh.to_string(),
            exported: summary.exported[period].to_string(),
        })
        .collect();

    rows.push(PeriodRow {
        period: style("Total").bold().to_string(),
        consumption: summary.total().to_string(),
        exported: summary
            .exported
            .iter()
            .map(|(_, kwh)| *kwh)
            .sum::<Kwh>()
            .to_string(),
    });

    println!("{}", Table::new(rows).with(Style::modern()));

    if let Some((first, last)) = summary.first_day.zip(summary.last_day) {
        println!("{} days, from {first} to {last}", summary.day_count);
    }

    if summary.estimated_readings > 0 {
        println!(
            "{}",
            style(format!(
                "{} of {} readings are estimated",
                summary.estimated_readings,
                summary.readings.len()
            ))
            .yellow()
        );
    }
}

#[derive(Debug, Parser)]
pub struct Prices {
    /// A path to the hourly price dataset in json format.
    file: PathBuf,
    /// First local date to include, `YYYY-MM-DD`. Defaults to the whole dataset.
    #[arg(long, requires = "to")]
    from: Option<NaiveDate>,
    /// Last local date to include, `YYYY-MM-DD`.
    #[arg(long, requires = "from")]
    to: Option<NaiveDate>,
    #[command(flatten)]
    zone: ZoneArgs,
}

#[derive(Debug, Tabled)]
struct AverageRow {
    period: String,
    average: String,
    hours: usize,
}

impl Prices {
    fn run(self) -> Result<()> {
        let config = self.zone.load_config()?;
        let classifier = self.zone.classifier(&config);

        let dataset = load_prices(&self.file, &classifier)?;
        let averages = aggregate(&dataset, &classifier, self.from.zip(self.to))?;

        println!(
            "{} `{}`",
            style("Averaged").green(),
            self.file.to_string_lossy()
        );

        let rows = averages.averages.iter().map(|(period, average)| AverageRow {
            period: period.to_string(),
            average: average.map_or("-".to_owned(), |price| format!("{price} €/kWh")),
            hours: averages.counts[period],
        });

        println!("{}", Table::new(rows).with(Style::modern()));

        Ok(())
    }
}

#[derive(Debug, Parser)]
pub struct Compare {
    /// A path to the catalog of tariffs in json format.
    #[arg(short = 'c', long)]
    catalog: PathBuf,
    /// A path to a consumption export in csv format. The billed days are the days of the
    /// export.
    #[arg(long, conflicts_with_all = ["peak", "standard", "off_peak", "days"])]
    consumption: Option<PathBuf>,
    /// Consumption in the peak period, in kWh.
    #[arg(long, default_value = "0")]
    peak: Decimal,
    /// Consumption in the standard period, in kWh.
    #[arg(long, default_value = "0")]
    standard: Decimal,
    /// Consumption in the off-peak period, in kWh.
    #[arg(long, default_value = "0")]
    off_peak: Decimal,
    /// The number of billed days.
    #[arg(long, required_unless_present = "consumption")]
    days: Option<u32>,
    /// Energy fed back into the grid, in kWh. Defaults to the exported energy of the
    /// consumption export.
    #[arg(long)]
    exported: Option<Decimal>,
    /// The balance of the virtual battery before this bill, in euros.
    #[arg(long, default_value = "0")]
    battery_balance: Decimal,
    /// A path to the hourly price dataset used to price dynamic tariffs.
    #[arg(short = 'p', long)]
    prices: Option<PathBuf>,
    /// The contracted power, in kW.
    #[arg(long, default_value = "4.6")]
    power: Decimal,
    /// The supply is a dwelling eligible for the reduced rate in the Canary Islands.
    #[arg(long)]
    reduced_dwelling: bool,
    /// Apply the means-tested discount of this tier to dynamic tariffs.
    #[arg(long, value_enum, requires = "discount_cap")]
    discount: Option<Tier>,
    /// The yearly consumption eligible for the discount, in kWh.
    #[arg(long, requires = "discount")]
    discount_cap: Option<Decimal>,
    /// Show the breakdown of every priced tariff.
    #[arg(long)]
    explain: bool,
    /// Print the report as json instead of tables.
    #[arg(long)]
    json: bool,
    #[command(flatten)]
    zone: ZoneArgs,
}

#[derive(Debug, Tabled)]
struct RankRow {
    #[tabled(rename = "#")]
    position: usize,
    tariff: String,
    total: String,
    difference: String,
    notes: String,
}

impl Compare {
    fn run(self) -> Result<()> {
        let config = self.zone.load_config()?;
        let classifier = self.zone.classifier(&config);

        let usage = self.load_consumption(&classifier)?;

        let catalog: TariffCatalog = Input::new(Some(self.catalog.as_path())).json("tariff catalog")?;

        let fiscal = FiscalContext {
            zone: self.zone.zone.into(),
            contracted_power: Kw::from(self.power),
            reduced_rate_dwelling: self.reduced_dwelling,
        };

        let solar = SolarContext {
            exported: self.exported.map_or(usage.exported, Kwh::from),
            battery_balance: Money::from(self.battery_balance),
        };

        let mut pricer =
            Pricer::new(&config, fiscal, usage.consumption, usage.days).with_solar(solar);

        if let Some(path) = &self.prices {
            let dataset = load_prices(path, &classifier)?;
            pricer = pricer.with_dynamic_prices(aggregate(&dataset, &classifier, usage.range)?);
        }

        if let Some((tier, cap)) = self.discount.zip(self.discount_cap) {
            pricer = pricer.with_discount(DiscountContext {
                enabled: true,
                tier: tier.into(),
                annual_cap: Kwh::from(cap),
            });
        }

        let report = pricer.build_report(&catalog)?;

        if self.json {
            let json = serde_json::to_string_pretty(&report).map_err(Error::Serialize)?;
            println!("{json}");
            return Ok(());
        }

        print_report(&report, self.explain);

        Ok(())
    }

    fn load_consumption(&self, classifier: &Classifier) -> Result<Usage> {
        let Some(path) = &self.consumption else {
            return Ok(Usage {
                consumption: ByPeriod::new(
                    Kwh::from(self.peak),
                    Kwh::from(self.standard),
                    Kwh::from(self.off_peak),
                ),
                exported: Kwh::zero(),
                // Presence is enforced by clap.
                days: self.days.unwrap_or_default(),
                range: None,
            });
        };

        let input = Input::new(Some(path.as_path()));
        let summary = Importer::new(classifier).import(&input.rows()?)?;

        let days = u32::try_from(summary.day_count)
            .map_err(|_| electricity_tariffs::Error::NumericOverflow)?;

        Ok(Usage {
            consumption: summary.totals,
            exported: summary.exported.iter().map(|(_, kwh)| *kwh).sum(),
            days,
            range: summary.first_day.zip(summary.last_day),
        })
    }
}

/// What the household used and fed back over the compared days.
struct Usage {
    consumption: ByPeriod<Kwh>,
    exported: Kwh,
    days: u32,
    /// The local dates of the export, when read from one.
    range: Option<(NaiveDate, NaiveDate)>,
}

fn print_report(report: &Report, show_breakdown: bool) {
    println!(
        "{} {} tariffs for {} kWh over {} days",
        style("Compared").green(),
        report.entries.len(),
        report.consumption.iter().map(|(_, kwh)| *kwh).sum::<Kwh>(),
        report.days
    );

    if !report.solar.exported.is_zero() {
        println!("{} kWh fed back into the grid", report.solar.exported);
    }

    let rows = report.entries.iter().map(|entry| {
        let mut notes = Vec::new();
        if entry.is_dynamic {
            notes.push("dynamic".to_owned());
        }
        if entry.custom {
            notes.push("custom".to_owned());
        }

        let total = match &entry.outcome {
            Outcome::Priced(bill) => {
                if !bill.discount_amount.is_zero() {
                    notes.push(format!("discount {} €", bill.discount_amount));
                }
                if !bill.surplus_compensation.is_zero() {
                    notes.push(format!("surplus {} €", bill.surplus_compensation));
                }
                if let Some(battery) = &bill.virtual_battery {
                    notes.push(format!("battery {} €", battery.closing_balance));
                }
                format!("{} €", bill.total_final)
            }
            Outcome::Unavailable(reason) => {
                notes.push(reason.to_string());
                "-".to_owned()
            }
        };

        let row = RankRow {
            position: entry.position,
            tariff: entry.name.clone(),
            total,
            difference: entry
                .difference_to_cheapest
                .map_or("-".to_owned(), |diff| format!("+{diff} €")),
            notes: notes.join(", "),
        };

        if entry.position == 1 && entry.bill().is_some() {
            RankRow {
                tariff: style(row.tariff).green().bold().to_string(),
                ..row
            }
        } else if entry.bill().is_none() {
            RankRow {
                tariff: style(row.tariff).dim().to_string(),
                ..row
            }
        } else {
            row
        }
    });

    println!("{}", Table::new(rows).with(Style::modern()));

    if let (Some(min), Some(max), Some(average)) =
        (report.min_total, report.max_total, report.average_total)
    {
        println!("min {min} €, max {max} €, average {average} €");
    }

    if !show_breakdown {
        return;
    }

    for entry in &report.entries {
        let Some(bill) = entry.bill() else {
            continue;
        };

        println!(
            "\n{} {} ({})",
            style(entry.position).bold(),
            style(&entry.name).bold(),
            bill.regime
        );

        let lines = explain(bill).lines.into_iter().map(|line| BreakdownRow {
            line: line.label,
            amount: format!("{} €", line.amount),
        });

        println!("{}", Table::new(lines).with(Style::modern()));
    }
}

#[derive(Debug, Tabled)]
struct BreakdownRow {
    line: String,
    amount: String,
}

#[derive(Debug, Parser)]
pub struct Lint {
    /// A path to the catalog of tariffs in json format.
    ///
    /// If no path is provided the catalog is read from standard in.
    #[arg(short = 'c', long)]
    catalog: Option<PathBuf>,
}

impl Lint {
    fn run(self) -> Result<()> {
        let input = Input::new(self.catalog.as_deref());
        let catalog: TariffCatalog = input.json("tariff catalog")?;

        let warnings = lint(&catalog);

        if warnings.is_empty() {
            println!(
                "{} `{}` has no warnings",
                style("Checked").green(),
                input.name()
            );
            return Ok(());
        }

        for warning in &warnings {
            println!("{} {warning}", style("warning:").yellow().bold());
        }

        Ok(())
    }
}
