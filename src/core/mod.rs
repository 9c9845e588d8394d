//! Analytic core: pure metric and forecast functions over a transaction table,
//! plus the configuration and logging shared by the rest of the crate.

pub mod config;
pub mod error;
pub mod forecast;
pub mod insight;
pub mod log;
pub mod metrics;
pub mod sarima;
pub mod series;
pub mod table;

// Re-export main types for cleaner imports
pub use error::AnalyticsError;
pub use forecast::{ForecastPoint, ForecastSettings, TrendPoint};
pub use insight::{InsightKind, InsightProvider};
pub use series::{Granularity, Metric, TimeSeries};
pub use table::{Column, Transaction, TransactionTable};
