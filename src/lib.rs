pub mod cli;
pub mod core;
pub mod providers;

use crate::core::config::AppConfig;
use crate::core::{InsightKind, Metric, TransactionTable};
use crate::providers::{DataLoader, OpenAiInsightProvider};
use anyhow::Result;
use chrono::NaiveDate;
use std::path::PathBuf;
use tracing::{debug, info};

pub enum AppCommand {
    Generate {
        rows: Option<usize>,
        seed: Option<u64>,
        output: Option<PathBuf>,
    },
    Overview {
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },
    Sales {
        top: usize,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },
    Customers {
        top: usize,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },
    Forecast {
        months: Option<usize>,
        metric: Metric,
    },
    Insight {
        kind: InsightKind,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("Salesight starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    match command {
        AppCommand::Generate { rows, seed, output } => {
            let mut settings = config.synthetic.clone();
            settings.rows = rows.unwrap_or(settings.rows);
            settings.seed = seed.unwrap_or(settings.seed);
            let output = match output {
                Some(path) => path,
                None => config.data_file()?,
            };
            cli::generate::run(&settings, &output)
        }
        AppCommand::Overview { start, end } => {
            cli::overview::run(&load_table(&config)?, &config.currency, start, end)
        }
        AppCommand::Sales { top, start, end } => {
            let table = load_period(&config, start, end)?;
            cli::sales::run(&table, &config.currency, top)
        }
        AppCommand::Customers { top, start, end } => {
            let table = load_period(&config, start, end)?;
            cli::customers::run(&table, &config.currency, top)
        }
        AppCommand::Forecast { months, metric } => cli::forecast::run(
            &load_table(&config)?,
            metric,
            months.unwrap_or(config.forecast.horizon),
            &config.forecast,
            &config.currency,
        ),
        AppCommand::Insight { kind, start, end } => {
            let table = load_period(&config, start, end)?;
            let provider = OpenAiInsightProvider::from_config(config.insight.as_ref())?;
            cli::insight::run(kind, &table, &config.forecast, &provider)
                .await
                .map(|_| ())
        }
    }
}

fn load_table(config: &AppConfig) -> Result<TransactionTable> {
    let loader = DataLoader::from_config(config)?;
    let table = loader.load()?;
    debug!(
        "Loaded {} transactions from {}",
        table.len(),
        loader.path().display()
    );
    Ok(table)
}

/// Loads the table and keeps only orders between `start` and `end`.
fn load_period(
    config: &AppConfig,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<TransactionTable> {
    let table = load_table(config)?;
    let selected = cli::overview::select_period(&table, start, end)?;
    debug!("Selected {} of {} transactions", selected.len(), table.len());
    Ok(selected)
}
