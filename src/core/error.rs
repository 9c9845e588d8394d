use thiserror::Error;

use super::table::Column;

/// Failures raised by the analytic core.
///
/// Only `InvalidInput` ever reaches callers of the metric functions. The
/// other two are produced inside the forecasters and folded into empty or
/// zero results before returning.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalyticsError {
    #[error("Required column '{column}' is missing from the transaction table")]
    InvalidInput { column: Column },

    #[error("Not enough data to perform calculation: {0}")]
    InsufficientData(String),

    #[error("Model fitting failed: {0}")]
    ModelFitting(String),
}
