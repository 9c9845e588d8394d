use super::ui;
use crate::core::forecast::{self, ForecastSettings};
use crate::core::series::{Granularity, Metric, prepare_series};
use crate::core::{InsightKind, InsightProvider, TransactionTable, metrics};
use anyhow::{Context, Result};
use serde_json::{Value, json};
use tracing::debug;

const CUSTOMER_SAMPLE: usize = 10;

/// Serializes the figures an insight of `kind` is about into a compact JSON
/// document for the prompt.
pub fn build_context(
    kind: InsightKind,
    table: &TransactionTable,
    settings: &ForecastSettings,
) -> Result<String> {
    let value: Value = match kind {
        InsightKind::ExecutiveSummary => json!({
            "kpis": metrics::calculate_kpis(table)?,
            "growth": metrics::calculate_growth(table)?,
        }),
        InsightKind::TrendSummary => {
            json!(prepare_series(table, Metric::Sales, Granularity::Monthly)?.points)
        }
        InsightKind::RegionPerformance => json!(metrics::get_region_performance(table)?),
        InsightKind::AnomalyDetection => json!(metrics::monthly_summary(table)?),
        InsightKind::ForecastInterpretation => {
            let series = prepare_series(table, Metric::Sales, Granularity::Monthly)?;
            let points = forecast::seasonal_forecast_with(&series, settings.horizon, settings);
            let average = if points.is_empty() {
                None
            } else {
                Some(points.iter().map(|p| p.predicted).sum::<f64>() / points.len() as f64)
            };
            json!({
                "horizon_months": settings.horizon,
                "average_predicted_sales": average,
                "forecast": points,
            })
        }
        InsightKind::CategoryInsights => json!(metrics::category_sales(table)?),
        InsightKind::DiscountCausality => json!(metrics::discount_correlation(table)?),
        InsightKind::CustomerSegments => json!(metrics::top_customers(table, CUSTOMER_SAMPLE)?),
        InsightKind::GrowthExplanation => json!(metrics::calculate_growth(table)?),
        InsightKind::RootCause => json!({
            "monthly": metrics::monthly_summary(table)?,
            "regions": metrics::get_region_performance(table)?,
        }),
    };
    serde_json::to_string(&value).context("Failed to serialize insight context")
}

pub async fn run(
    kind: InsightKind,
    table: &TransactionTable,
    settings: &ForecastSettings,
    provider: &dyn InsightProvider,
) -> Result<String> {
    let context = build_context(kind, table, settings)
        .with_context(|| format!("Failed to build context for {kind}"))?;
    debug!("Insight context for {kind}: {} bytes", context.len());

    let pb = ui::new_spinner("Analyzing data...");
    let result = provider.generate(kind, &context).await;
    pb.finish_and_clear();
    let insight = result?;

    println!(
        "{}\n{insight}",
        ui::style_text(&format!("AI Analysis: {kind}"), ui::StyleType::Title)
    );
    Ok(insight)
}
