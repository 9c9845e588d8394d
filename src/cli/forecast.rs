use super::ui;
use crate::core::forecast::{self, ForecastPoint, ForecastSettings, TrendPoint};
use crate::core::series::{Granularity, Metric, prepare_series};
use crate::core::TransactionTable;
use anyhow::{Context, Result, bail};
use comfy_table::{Cell, Table};
use std::collections::BTreeMap;
use tracing::info;

fn forecast_table(
    seasonal: &[ForecastPoint],
    trend: &[TrendPoint],
    metric: Metric,
    currency: &str,
) -> Table {
    let amount = |v: f64| match metric {
        Metric::Quantity => format!("{v:.0}"),
        Metric::Sales | Metric::Profit => ui::format_money(v, currency),
    };

    let mut periods: BTreeMap<_, (Option<&ForecastPoint>, Option<f64>)> = BTreeMap::new();
    for point in seasonal {
        periods.entry(point.period).or_default().0 = Some(point);
    }
    for point in trend {
        periods.entry(point.period).or_default().1 = Some(point.value);
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Month"),
        ui::header_cell("Forecast"),
        ui::header_cell("Lower CI"),
        ui::header_cell("Upper CI"),
        ui::header_cell("Linear Trend"),
    ]);
    for (period, (point, trend_value)) in periods {
        table.add_row(vec![
            Cell::new(period.format("%Y-%m")),
            ui::format_optional_cell(point.map(|p| p.predicted), amount),
            ui::format_optional_cell(point.map(|p| p.lower_ci), amount),
            ui::format_optional_cell(point.map(|p| p.upper_ci), amount),
            ui::format_optional_cell(trend_value, amount),
        ]);
    }
    table
}

/// Fits both forecasters on the monthly `metric` series and renders them side
/// by side. An unavailable forecaster shows up as N/A cells.
pub fn render(
    table: &TransactionTable,
    metric: Metric,
    months: usize,
    settings: &ForecastSettings,
    currency: &str,
) -> Result<String> {
    if months == 0 {
        bail!("Forecast horizon must be at least 1 month");
    }
    let series = prepare_series(table, metric, Granularity::Monthly)
        .with_context(|| format!("Failed to prepare the monthly {metric} series"))?;

    let pb = ui::new_spinner(&format!("Fitting forecast on {} months", series.len()));
    let seasonal = forecast::seasonal_forecast_with(&series, months, settings);
    let trend = forecast::linear_trend(&series, months);
    pb.finish_and_clear();
    info!(
        "Forecast {} months of {metric}: {} seasonal, {} trend points",
        months,
        seasonal.len(),
        trend.len()
    );

    let mut output = format!(
        "{}\n",
        ui::style_text(
            &format!("{months}-Month {metric} Forecast"),
            ui::StyleType::Title
        )
    );
    if seasonal.is_empty() {
        output.push_str(&ui::style_text(
            "Seasonal model unavailable for this history; showing the linear trend only.\n",
            ui::StyleType::Error,
        ));
    }
    if seasonal.is_empty() && trend.is_empty() {
        output.push_str(&ui::style_text(
            "Not enough monthly history to forecast.",
            ui::StyleType::Subtle,
        ));
        return Ok(output);
    }
    output.push_str(&forecast_table(&seasonal, &trend, metric, currency).to_string());
    Ok(output)
}

pub fn run(
    table: &TransactionTable,
    metric: Metric,
    months: usize,
    settings: &ForecastSettings,
    currency: &str,
) -> Result<()> {
    println!("{}", render(table, metric, months, settings, currency)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Transaction;
    use chrono::NaiveDate;

    fn monthly_table(values: &[f64]) -> TransactionTable {
        let rows = values
            .iter()
            .enumerate()
            .map(|(i, &sales)| {
                let date = Granularity::Monthly
                    .advance(NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(), i as u32)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap();
                Transaction::new(&format!("O{i}"), date, sales, sales / 10.0)
            })
            .collect();
        TransactionTable::new(rows)
    }

    #[test]
    fn test_render_seasonal_and_trend() {
        let values: Vec<f64> = (0..36).map(|t| 1000.0 + 50.0 * (t % 12) as f64).collect();
        let output = render(
            &monthly_table(&values),
            Metric::Sales,
            6,
            &ForecastSettings::default(),
            "$",
        )
        .unwrap();

        assert!(output.contains("6-Month sales Forecast"));
        assert!(output.contains("2024-01"));
        assert!(output.contains("2024-06"));
        assert!(!output.contains("2024-07"));
        assert!(!output.contains("unavailable"));
    }

    #[test]
    fn test_render_falls_back_to_trend_on_short_history() {
        let output = render(
            &monthly_table(&[100.0, 120.0, 140.0]),
            Metric::Profit,
            2,
            &ForecastSettings::default(),
            "$",
        )
        .unwrap();

        assert!(output.contains("unavailable"));
        assert!(output.contains("2021-04"));
        assert!(output.contains("N/A"));
    }

    #[test]
    fn test_render_without_history() {
        let output = render(
            &monthly_table(&[]),
            Metric::Sales,
            3,
            &ForecastSettings::default(),
            "$",
        )
        .unwrap();
        assert!(output.contains("Not enough monthly history"));
    }

    #[test]
    fn test_render_rejects_zero_horizon() {
        let err = render(
            &monthly_table(&[100.0, 120.0, 140.0]),
            Metric::Sales,
            0,
            &ForecastSettings::default(),
            "$",
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Forecast horizon must be at least 1 month");
    }
}
