use anyhow::Result;
use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand};
use salesight::core::log::init_logging;
use salesight::core::{InsightKind, Metric};
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for salesight::AppCommand {
    fn from(cmd: Commands) -> salesight::AppCommand {
        match cmd {
            Commands::Generate { rows, seed, output } => {
                salesight::AppCommand::Generate { rows, seed, output }
            }
            Commands::Overview { start, end } => salesight::AppCommand::Overview { start, end },
            Commands::Sales { top, start, end } => salesight::AppCommand::Sales { top, start, end },
            Commands::Customers { top, start, end } => {
                salesight::AppCommand::Customers { top, start, end }
            }
            Commands::Forecast { months, metric } => {
                salesight::AppCommand::Forecast {
                    months: months.map(|m| m as usize),
                    metric,
                }
            }
            Commands::Insight { kind, start, end } => {
                salesight::AppCommand::Insight { kind, start, end }
            }
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Write a synthetic transaction dataset
    Generate {
        /// Number of transactions (defaults to the configured value)
        #[arg(long)]
        rows: Option<usize>,
        /// Random seed (defaults to the configured value)
        #[arg(long)]
        seed: Option<u64>,
        /// Output CSV (defaults to the configured data file)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Display KPIs, growth and category split
    Overview {
        /// First order date to include (YYYY-MM-DD)
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Last order date to include (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,
    },
    /// Display region, monthly, product and discount breakdowns
    Sales {
        #[arg(long, default_value_t = 10)]
        top: usize,
        /// First order date to include (YYYY-MM-DD)
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Last order date to include (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,
    },
    /// Display the biggest customers by spend
    Customers {
        #[arg(long, default_value_t = 10)]
        top: usize,
        /// First order date to include (YYYY-MM-DD)
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Last order date to include (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,
    },
    /// Forecast a monthly metric
    Forecast {
        /// Months ahead (defaults to the configured horizon)
        #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
        months: Option<u32>,
        /// sales, profit or quantity
        #[arg(long, default_value = "sales")]
        metric: Metric,
    },
    /// Ask the insight service to interpret the data
    Insight {
        /// One of: executive-summary, trend-summary, region-performance,
        /// anomaly-detection, forecast-interpretation, category-insights,
        /// discount-causality, customer-segments, growth-explanation, root-cause
        kind: InsightKind,
        /// First order date to include (YYYY-MM-DD)
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Last order date to include (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => salesight::cli::setup::setup(),
        Some(cmd) => salesight::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forecast_months_must_be_positive() {
        assert!(Cli::try_parse_from(["salesight", "forecast", "--months", "0"]).is_err());

        let cli = Cli::try_parse_from(["salesight", "forecast", "-m", "3"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Forecast {
                months: Some(3),
                ..
            })
        ));
    }

    #[test]
    fn test_period_flags_reach_sales_command() {
        let cli = Cli::try_parse_from([
            "salesight", "sales", "--start", "2023-01-01", "--end", "2023-03-31",
        ])
        .unwrap();
        let Some(command) = cli.command else {
            panic!("expected a subcommand");
        };
        let salesight::AppCommand::Sales { top, start, end } = salesight::AppCommand::from(command) else {
            panic!("expected the sales command");
        };
        assert_eq!(top, 10);
        assert_eq!(start, NaiveDate::from_ymd_opt(2023, 1, 1));
        assert_eq!(end, NaiveDate::from_ymd_opt(2023, 3, 31));
    }
}
