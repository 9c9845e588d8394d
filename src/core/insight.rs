//! Natural-language summaries of computed results.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InsightKind {
    ExecutiveSummary,
    TrendSummary,
    RegionPerformance,
    AnomalyDetection,
    ForecastInterpretation,
    CategoryInsights,
    DiscountCausality,
    CustomerSegments,
    GrowthExplanation,
    RootCause,
}

impl InsightKind {
    pub const ALL: [InsightKind; 10] = [
        InsightKind::ExecutiveSummary,
        InsightKind::TrendSummary,
        InsightKind::RegionPerformance,
        InsightKind::AnomalyDetection,
        InsightKind::ForecastInterpretation,
        InsightKind::CategoryInsights,
        InsightKind::DiscountCausality,
        InsightKind::CustomerSegments,
        InsightKind::GrowthExplanation,
        InsightKind::RootCause,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            InsightKind::ExecutiveSummary => "executive-summary",
            InsightKind::TrendSummary => "trend-summary",
            InsightKind::RegionPerformance => "region-performance",
            InsightKind::AnomalyDetection => "anomaly-detection",
            InsightKind::ForecastInterpretation => "forecast-interpretation",
            InsightKind::CategoryInsights => "category-insights",
            InsightKind::DiscountCausality => "discount-causality",
            InsightKind::CustomerSegments => "customer-segments",
            InsightKind::GrowthExplanation => "growth-explanation",
            InsightKind::RootCause => "root-cause",
        }
    }

    /// The user prompt for this kind with `context` appended.
    pub fn prompt(&self, context: &str) -> String {
        let instruction = match self {
            InsightKind::ExecutiveSummary => {
                "Analyze this sales data summary and provide a concise executive summary for stakeholders"
            }
            InsightKind::TrendSummary => {
                "Analyze these sales trends and identify key patterns"
            }
            InsightKind::RegionPerformance => {
                "Compare regional performance and suggest improvements"
            }
            InsightKind::AnomalyDetection => {
                "Identify any anomalies or outliers in this data"
            }
            InsightKind::ForecastInterpretation => {
                "Interpret this sales forecast and potential risks"
            }
            InsightKind::CategoryInsights => {
                "Provide insights on product category performance"
            }
            InsightKind::DiscountCausality => {
                "Analyze the relationship between discounts and sales volume/profit"
            }
            InsightKind::CustomerSegments => {
                "Suggest marketing strategies for these customer segments"
            }
            InsightKind::GrowthExplanation => {
                "Explain the Month-over-Month and Year-over-Year growth figures"
            }
            InsightKind::RootCause => {
                "Hypothesize root causes for the observed performance dips"
            }
        };
        format!("{instruction}: {context}")
    }
}

impl Display for InsightKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for InsightKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        InsightKind::ALL
            .into_iter()
            .find(|k| k.key() == normalized)
            .ok_or_else(|| anyhow::anyhow!("Invalid insight kind: {}", s))
    }
}

#[async_trait]
pub trait InsightProvider: Send + Sync {
    /// Returns a short narrative for `context`, which the caller has already
    /// rendered to text.
    async fn generate(&self, kind: InsightKind, context: &str) -> Result<String>;
}
