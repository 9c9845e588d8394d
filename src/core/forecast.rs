//! Forecasters over a prepared [`TimeSeries`].
//!
//! Neither forecaster keeps state: each call fits from scratch on the series
//! it is given. Failures never propagate; an empty result means "forecast
//! unavailable".
use super::error::AnalyticsError;
use super::sarima::{self, SarimaOrder};
use super::series::TimeSeries;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub period: NaiveDate,
    pub predicted: f64,
    pub lower_ci: f64,
    pub upper_ci: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendPoint {
    pub period: NaiveDate,
    pub value: f64,
}

fn default_horizon() -> usize {
    12
}

fn default_order() -> [usize; 3] {
    [1, 1, 1]
}

fn default_seasonal_order() -> [usize; 4] {
    [1, 1, 1, 12]
}

fn default_confidence() -> f64 {
    0.95
}

/// Model settings for the seasonal forecaster.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ForecastSettings {
    #[serde(default = "default_horizon")]
    pub horizon: usize,
    #[serde(default = "default_order")]
    pub order: [usize; 3],
    #[serde(default = "default_seasonal_order")]
    pub seasonal_order: [usize; 4],
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        ForecastSettings {
            horizon: default_horizon(),
            order: default_order(),
            seasonal_order: default_seasonal_order(),
            confidence: default_confidence(),
        }
    }
}

impl ForecastSettings {
    pub fn sarima_order(&self) -> SarimaOrder {
        SarimaOrder::new(self.order, self.seasonal_order)
    }
}

/// SARIMA(1,1,1)(1,1,1,12) forecast with 95% intervals.
pub fn seasonal_forecast(series: &TimeSeries, horizon: usize) -> Vec<ForecastPoint> {
    seasonal_forecast_with(series, horizon, &ForecastSettings::default())
}

pub fn seasonal_forecast_with(
    series: &TimeSeries,
    horizon: usize,
    settings: &ForecastSettings,
) -> Vec<ForecastPoint> {
    match try_seasonal_forecast(series, horizon, settings) {
        Ok(points) => points,
        Err(e @ AnalyticsError::InsufficientData(_)) => {
            warn!("Seasonal forecast unavailable: {e}");
            Vec::new()
        }
        Err(e) => {
            error!("Seasonal forecast failed: {e}");
            Vec::new()
        }
    }
}

fn try_seasonal_forecast(
    series: &TimeSeries,
    horizon: usize,
    settings: &ForecastSettings,
) -> Result<Vec<ForecastPoint>, AnalyticsError> {
    let model = sarima::fit(&series.values(), settings.sarima_order())?;
    let forecast = model.forecast(horizon, settings.confidence)?;
    let periods = series
        .future_periods(horizon)
        .ok_or_else(|| AnalyticsError::ModelFitting("future periods out of range".to_string()))?;

    debug!(
        "Seasonal forecast of {} periods from {:?}",
        horizon,
        series.last_period()
    );
    Ok(periods
        .into_iter()
        .enumerate()
        .map(|(h, period)| ForecastPoint {
            period,
            predicted: forecast.mean[h],
            lower_ci: forecast.lower[h],
            upper_ci: forecast.upper[h],
        })
        .collect())
}

/// Projects an ordinary least squares line through the history, using the
/// day number of each period as the regressor.
pub fn linear_trend(series: &TimeSeries, horizon: usize) -> Vec<TrendPoint> {
    if series.len() < 2 {
        warn!(
            "Linear trend unavailable: {} observations, at least 2 required",
            series.len()
        );
        return Vec::new();
    }

    let ordinal = |d: NaiveDate| f64::from(d.num_days_from_ce());
    let n = series.len() as f64;
    let mean_x = series.points.iter().map(|p| ordinal(p.period)).sum::<f64>() / n;
    let mean_y = series.points.iter().map(|p| p.value).sum::<f64>() / n;

    let (sxy, sxx) = series.points.iter().fold((0.0, 0.0), |(sxy, sxx), p| {
        let dx = ordinal(p.period) - mean_x;
        (sxy + dx * (p.value - mean_y), sxx + dx * dx)
    });
    if sxx == 0.0 {
        error!("Linear trend failed: all observations share one period");
        return Vec::new();
    }
    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    debug!(slope, intercept, "Fitted linear trend");

    let Some(periods) = series.future_periods(horizon) else {
        error!("Linear trend failed: future periods out of range");
        return Vec::new();
    };
    periods
        .into_iter()
        .map(|period| TrendPoint {
            period,
            value: intercept + slope * ordinal(period),
        })
        .collect()
}
