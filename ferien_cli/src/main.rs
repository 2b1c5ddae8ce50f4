use std::{env, path::PathBuf, sync::Arc};

use anyhow::{bail, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use ferien_core::{
    config::{Provider, RegionSettings, Settings},
    facts::Upcoming,
    refresh::{RefreshOutcome, Refresher, Snapshot},
    region::Region,
};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Debug, Parser)]
pub struct Arguments {
    /// the region codes, e.g. BY or NW
    #[arg(required = true)]
    pub regions: Vec<Region>,
    /// exclude nationwide public holidays
    #[arg(long)]
    pub no_national: bool,
    /// exclude public holidays of the region only
    #[arg(long)]
    pub no_regional: bool,
    /// the directory the YAML files are written to
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,
    /// how many years after the current one are requested
    #[arg(long, default_value_t = 3)]
    pub years_ahead: u32,
    /// read from ferien-api.de and date.nager.at instead of openholidaysapi.org
    #[arg(long)]
    pub legacy: bool,
    /// the date to derive the facts for, defaults to today
    #[arg(long)]
    pub today: Option<NaiveDate>,
}

impl From<&Arguments> for Settings {
    fn from(value: &Arguments) -> Self {
        Settings {
            output_dir: value.output_dir.clone(),
            years_ahead: value.years_ahead,
            provider: if value.legacy {
                Provider::Legacy
            } else {
                Provider::OpenHolidays
            },
            regions: value
                .regions
                .iter()
                .map(|code| RegionSettings {
                    code: *code,
                    national: !value.no_national,
                    regional: !value.no_regional,
                })
                .collect(),
            ..Default::default()
        }
    }
}

fn format_upcoming(upcoming: &Option<Upcoming>) -> String {
    match upcoming {
        Some(upcoming) => format!(
            "{} on {} (in {} days)",
            upcoming.name, upcoming.date, upcoming.days_until
        ),
        None => String::from("-"),
    }
}

fn print_snapshot(snapshot: &Snapshot) {
    let facts = &snapshot.facts;
    println!("{} ({})", snapshot.region.name(), snapshot.region.code());
    println!("  file:            {}", snapshot.export_path.display());
    println!(
        "  current period:  {}",
        facts.current_period.as_deref().unwrap_or("-")
    );
    println!("  next period:     {}", format_upcoming(&facts.next_period));
    if snapshot.days_enabled {
        println!("  next holiday:    {}", format_upcoming(&facts.next_day));
    }
    println!(
        "  today is free:   {}",
        facts.today_reason.as_deref().unwrap_or("no")
    );
    if !snapshot.result.missing_years_periods.is_empty() {
        println!(
            "  missing years (school holidays): {:?}",
            snapshot.result.missing_years_periods
        );
    }
    if !snapshot.result.missing_years_days.is_empty() {
        println!(
            "  missing years (public holidays): {:?}",
            snapshot.result.missing_years_days
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    FmtSubscriber::builder()
        .with_max_level(
            env::var("RUST_LOG")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(Level::INFO),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Arguments::parse();
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());
    let settings = Settings::from(&args);
    let source = settings.source()?;
    for region_settings in &settings.regions {
        let refresher = Refresher::new(region_settings, &settings, Arc::clone(&source));
        match refresher.refresh_on(today).await? {
            RefreshOutcome::Completed(snapshot) => print_snapshot(&snapshot),
            RefreshOutcome::Coalesced => bail!("refresh of {} did not run", region_settings.code),
        }
    }
    Ok(())
}
