//! Seasonal ARIMA estimation and forecasting.
//!
//! The model is written in backshift polynomials:
//!
//! ```text
//! phi(B) Phi(B^s) (1-B)^d (1-B^s)^D y_t = theta(B) Theta(B^s) e_t
//! ```
//!
//! Coefficients are estimated by conditional sum of squares on the
//! differenced series (pre-sample values and innovations taken as zero),
//! searched with Nelder-Mead over `tanh`-bounded parameters so every factor
//! stays stationary and invertible.
use super::error::AnalyticsError;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use tracing::debug;

const INITIAL_STEP: f64 = 0.5;
const TOLERANCE: f64 = 1e-10;
const ITERATIONS_PER_PARAMETER: usize = 250;
/// Relative floor on the innovation standard deviation.
const MIN_RELATIVE_SIGMA: f64 = 1e-3;

/// Orders `(p, d, q)` and seasonal orders `(P, D, Q, s)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SarimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    pub seasonal_p: usize,
    pub seasonal_d: usize,
    pub seasonal_q: usize,
    pub period: usize,
}

impl Default for SarimaOrder {
    fn default() -> Self {
        Self::new([1, 1, 1], [1, 1, 1, 12])
    }
}

impl SarimaOrder {
    pub const fn new(order: [usize; 3], seasonal_order: [usize; 4]) -> Self {
        Self {
            p: order[0],
            d: order[1],
            q: order[2],
            seasonal_p: seasonal_order[0],
            seasonal_d: seasonal_order[1],
            seasonal_q: seasonal_order[2],
            period: seasonal_order[3],
        }
    }

    pub fn is_seasonal(&self) -> bool {
        self.seasonal_p + self.seasonal_d + self.seasonal_q > 0
    }

    pub fn parameter_count(&self) -> usize {
        self.p + self.q + self.seasonal_p + self.seasonal_q
    }

    /// Observations lost to differencing.
    pub fn differencing_lag(&self) -> usize {
        self.d + self.period * self.seasonal_d
    }

    /// Shortest history accepted by [`fit`]: two full seasons, and at least a
    /// couple of differenced points per estimated coefficient.
    pub fn min_observations(&self) -> usize {
        let by_parameters = self.differencing_lag() + self.parameter_count() + 2;
        if self.is_seasonal() {
            by_parameters.max(2 * self.period)
        } else {
            by_parameters
        }
    }

    fn split<'a>(&self, params: &'a [f64]) -> (&'a [f64], &'a [f64], &'a [f64], &'a [f64]) {
        let (ar, rest) = params.split_at(self.p);
        let (seasonal_ar, rest) = rest.split_at(self.seasonal_p);
        let (ma, seasonal_ma) = rest.split_at(self.q);
        (ar, seasonal_ar, ma, seasonal_ma)
    }

    /// `phi(B) Phi(B^s)` as coefficients of `B^0, B^1, ...`.
    fn ar_polynomial(&self, params: &[f64]) -> Vec<f64> {
        let (ar, seasonal_ar, _, _) = self.split(params);
        poly_mul(
            &lag_polynomial(ar, 1, -1.0),
            &lag_polynomial(seasonal_ar, self.period, -1.0),
        )
    }

    /// `theta(B) Theta(B^s)`.
    fn ma_polynomial(&self, params: &[f64]) -> Vec<f64> {
        let (_, _, ma, seasonal_ma) = self.split(params);
        poly_mul(
            &lag_polynomial(ma, 1, 1.0),
            &lag_polynomial(seasonal_ma, self.period, 1.0),
        )
    }

    /// `(1-B)^d (1-B^s)^D`.
    fn difference_polynomial(&self) -> Vec<f64> {
        let mut poly = vec![1.0];
        for _ in 0..self.d {
            poly = poly_mul(&poly, &lag_polynomial(&[1.0], 1, -1.0));
        }
        for _ in 0..self.seasonal_d {
            poly = poly_mul(&poly, &lag_polynomial(&[1.0], self.period, -1.0));
        }
        poly
    }
}

/// `1 + sign * (c_1 B^lag + c_2 B^{2 lag} + ...)`.
fn lag_polynomial(coefficients: &[f64], lag: usize, sign: f64) -> Vec<f64> {
    let mut poly = vec![0.0; coefficients.len() * lag + 1];
    poly[0] = 1.0;
    for (i, c) in coefficients.iter().enumerate() {
        poly[(i + 1) * lag] += sign * c;
    }
    poly
}

fn poly_mul(a: &[f64], b: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

/// Conditional residuals of an ARMA model `ar(B) w_t = ma(B) e_t`.
fn css_residuals(w: &[f64], ar: &[f64], ma: &[f64]) -> Vec<f64> {
    let mut residuals = Vec::with_capacity(w.len());
    for t in 0..w.len() {
        let mut e = 0.0;
        for (i, a) in ar.iter().enumerate().take(t + 1) {
            e += a * w[t - i];
        }
        for (j, m) in ma.iter().enumerate().skip(1).take(t) {
            e -= m * residuals[t - j];
        }
        residuals.push(e);
    }
    residuals
}

/// MA(inf) weights of `ar(B) y_t = ma(B) e_t` up to `count` terms.
fn psi_weights(ar: &[f64], ma: &[f64], count: usize) -> Vec<f64> {
    let mut psi: Vec<f64> = Vec::with_capacity(count);
    for j in 0..count {
        let mut value = ma.get(j).copied().unwrap_or(0.0);
        for i in 1..=j.min(ar.len().saturating_sub(1)) {
            value -= ar[i] * psi[j - i];
        }
        psi.push(value);
    }
    psi
}

/// Minimizes `objective` starting at `start`. Returns the best point found
/// and its value.
fn nelder_mead<F>(objective: F, start: &[f64], max_iterations: usize) -> (Vec<f64>, f64)
where
    F: Fn(&[f64]) -> f64,
{
    let dim = start.len();
    let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(dim + 1);
    simplex.push((start.to_vec(), objective(start)));
    for i in 0..dim {
        let mut vertex = start.to_vec();
        vertex[i] += INITIAL_STEP;
        let value = objective(&vertex);
        simplex.push((vertex, value));
    }

    for _ in 0..max_iterations {
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
        let best = simplex[0].1;
        let worst = simplex[dim].1;
        if (worst - best).abs() <= TOLERANCE * (best.abs() + TOLERANCE) {
            break;
        }

        let centroid: Vec<f64> = (0..dim)
            .map(|j| simplex[..dim].iter().map(|(x, _)| x[j]).sum::<f64>() / dim as f64)
            .collect();
        let worst_vertex = simplex[dim].0.clone();
        // c + coef * (worst - c)
        let towards_worst = |coef: f64| -> Vec<f64> {
            centroid
                .iter()
                .zip(&worst_vertex)
                .map(|(c, w)| c + coef * (w - c))
                .collect()
        };

        let reflected = towards_worst(-1.0);
        let reflected_value = objective(&reflected);

        if reflected_value < best {
            let expanded = towards_worst(-2.0);
            let expanded_value = objective(&expanded);
            simplex[dim] = if expanded_value < reflected_value {
                (expanded, expanded_value)
            } else {
                (reflected, reflected_value)
            };
            continue;
        }
        if reflected_value < simplex[dim - 1].1 {
            simplex[dim] = (reflected, reflected_value);
            continue;
        }

        let (contracted, accept_below) = if reflected_value < worst {
            (towards_worst(-0.5), reflected_value)
        } else {
            (towards_worst(0.5), worst)
        };
        let contracted_value = objective(&contracted);
        if contracted_value < accept_below {
            simplex[dim] = (contracted, contracted_value);
            continue;
        }

        let best_vertex = simplex[0].0.clone();
        for vertex in simplex.iter_mut().skip(1) {
            let shrunk: Vec<f64> = best_vertex
                .iter()
                .zip(&vertex.0)
                .map(|(b, x)| b + 0.5 * (x - b))
                .collect();
            let value = objective(&shrunk);
            *vertex = (shrunk, value);
        }
    }

    simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
    simplex.swap_remove(0)
}

fn bounded(raw: &[f64]) -> Vec<f64> {
    raw.iter().map(|x| x.tanh()).collect()
}

/// A fitted seasonal ARIMA model, holding what is needed to forecast.
#[derive(Debug, Clone)]
pub struct SarimaFit {
    pub order: SarimaOrder,
    pub params: Vec<f64>,
    pub sigma2: f64,
    history: Vec<f64>,
    differenced: Vec<f64>,
    residuals: Vec<f64>,
    ar: Vec<f64>,
    ma: Vec<f64>,
    difference: Vec<f64>,
}

/// Point forecasts with a two-sided interval at the requested confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct SarimaForecast {
    pub mean: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

pub fn fit(series: &[f64], order: SarimaOrder) -> Result<SarimaFit, AnalyticsError> {
    if order.is_seasonal() && order.period < 2 {
        return Err(AnalyticsError::ModelFitting(format!(
            "seasonal period must be at least 2, got {}",
            order.period
        )));
    }
    let required = order.min_observations();
    if series.len() < required {
        return Err(AnalyticsError::InsufficientData(format!(
            "{} observations available, {} required",
            series.len(),
            required
        )));
    }
    if series.iter().any(|v| !v.is_finite()) {
        return Err(AnalyticsError::ModelFitting(
            "series contains non-finite values".to_string(),
        ));
    }

    let difference = order.difference_polynomial();
    let lag = difference.len() - 1;
    let differenced: Vec<f64> = (lag..series.len())
        .map(|t| {
            difference
                .iter()
                .enumerate()
                .map(|(i, c)| c * series[t - i])
                .sum()
        })
        .collect();

    let sum_of_squares = |raw: &[f64]| -> f64 {
        let params = bounded(raw);
        let residuals = css_residuals(
            &differenced,
            &order.ar_polynomial(&params),
            &order.ma_polynomial(&params),
        );
        let sse: f64 = residuals.iter().map(|e| e * e).sum();
        if sse.is_finite() { sse } else { f64::INFINITY }
    };

    let k = order.parameter_count();
    let (raw, sse) = if k == 0 {
        (Vec::new(), sum_of_squares(&[]))
    } else {
        nelder_mead(sum_of_squares, &vec![0.0; k], ITERATIONS_PER_PARAMETER * k)
    };
    if !sse.is_finite() {
        return Err(AnalyticsError::ModelFitting(
            "sum of squares did not converge to a finite value".to_string(),
        ));
    }

    let params = bounded(&raw);
    let ar = order.ar_polynomial(&params);
    let ma = order.ma_polynomial(&params);
    let residuals = css_residuals(&differenced, &ar, &ma);

    let scale = series.iter().map(|v| v.abs()).sum::<f64>() / series.len() as f64;
    let sigma_floor = (MIN_RELATIVE_SIGMA * scale).max(f64::EPSILON);
    let sigma2 = (sse / differenced.len() as f64).max(sigma_floor * sigma_floor);

    debug!(?params, sse, sigma2, "Fitted seasonal ARIMA model");
    Ok(SarimaFit {
        order,
        params,
        sigma2,
        history: series.to_vec(),
        differenced,
        residuals,
        ar,
        ma,
        difference,
    })
}

impl SarimaFit {
    pub fn forecast(&self, steps: usize, confidence: f64) -> Result<SarimaForecast, AnalyticsError> {
        if !(confidence > 0.0 && confidence < 1.0) {
            return Err(AnalyticsError::ModelFitting(format!(
                "confidence level must be in (0, 1), got {confidence}"
            )));
        }
        let normal = Normal::new(0.0, 1.0)
            .map_err(|e| AnalyticsError::ModelFitting(format!("normal distribution: {e}")))?;
        let z = normal.inverse_cdf(0.5 + confidence / 2.0);

        // ARMA recursion on the differenced scale, future innovations zero.
        let mut w = self.differenced.clone();
        let observed = w.len();
        for t in observed..observed + steps {
            let mut value = 0.0;
            for (i, a) in self.ar.iter().enumerate().skip(1) {
                if i <= t {
                    value -= a * w[t - i];
                }
            }
            for (j, m) in self.ma.iter().enumerate().skip(1) {
                if j <= t && t - j < observed {
                    value += m * self.residuals[t - j];
                }
            }
            w.push(value);
        }

        // Undo the differencing.
        let mut y = self.history.clone();
        let start = y.len();
        for h in 0..steps {
            let t = start + h;
            let mut value = w[observed + h];
            for (i, c) in self.difference.iter().enumerate().skip(1) {
                value -= c * y[t - i];
            }
            y.push(value);
        }
        let mean = y.split_off(start);

        let integrated_ar = poly_mul(&self.ar, &self.difference);
        let psi = psi_weights(&integrated_ar, &self.ma, steps);
        let mut cumulative = 0.0;
        let mut lower = Vec::with_capacity(steps);
        let mut upper = Vec::with_capacity(steps);
        for (m, p) in mean.iter().zip(&psi) {
            cumulative += p * p;
            let half_width = z * (self.sigma2 * cumulative).sqrt();
            lower.push(m - half_width);
            upper.push(m + half_width);
        }

        if mean.iter().chain(&lower).chain(&upper).any(|v| !v.is_finite()) {
            return Err(AnalyticsError::ModelFitting(
                "forecast diverged to non-finite values".to_string(),
            ));
        }
        Ok(SarimaForecast { mean, lower, upper })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_order() {
        let order = SarimaOrder::default();
        assert_eq!(order.parameter_count(), 4);
        assert_eq!(order.differencing_lag(), 13);
        assert_eq!(order.min_observations(), 24);
        assert_eq!(SarimaOrder::new([1, 1, 0], [0, 0, 0, 0]).min_observations(), 4);
    }

    #[test]
    fn test_polynomials() {
        let order = SarimaOrder::new([1, 0, 1], [1, 0, 1, 4]);
        // phi = 0.5, Phi = 0.2, theta = 0.3, Theta = 0.1
        let params = [0.5, 0.2, 0.3, 0.1];
        assert_eq!(
            order.ar_polynomial(&params),
            vec![1.0, -0.5, 0.0, 0.0, -0.2, 0.1]
        );
        let ma = order.ma_polynomial(&params);
        assert!((ma[1] - 0.3).abs() < 1e-12);
        assert!((ma[4] - 0.1).abs() < 1e-12);
        assert!((ma[5] - 0.03).abs() < 1e-12);

        let diff = SarimaOrder::new([0, 1, 0], [0, 1, 0, 3]).difference_polynomial();
        assert_eq!(diff, vec![1.0, -1.0, 0.0, -1.0, 1.0]);
    }

    #[test]
    fn test_psi_weights_of_random_walk() {
        let psi = psi_weights(&[1.0, -1.0], &[1.0], 5);
        assert_eq!(psi, vec![1.0; 5]);

        // AR(1) with phi = 0.5: psi_j = 0.5^j
        let psi = psi_weights(&[1.0, -0.5], &[1.0], 4);
        assert_eq!(psi, vec![1.0, 0.5, 0.25, 0.125]);
    }

    #[test]
    fn test_css_residuals_recover_innovations() {
        // w_t = 0.5 w_{t-1} + e_t
        let innovations = [1.0, -0.5, 0.25, 2.0, 0.0];
        let mut w = Vec::new();
        for (t, e) in innovations.iter().enumerate() {
            let prev = if t == 0 { 0.0 } else { w[t - 1] };
            w.push(0.5 * prev + e);
        }
        let residuals = css_residuals(&w, &[1.0, -0.5], &[1.0]);
        for (r, e) in residuals.iter().zip(innovations) {
            assert!((r - e).abs() < 1e-12);
        }
    }

    #[test]
    fn test_nelder_mead_finds_quadratic_minimum() {
        let (x, value) = nelder_mead(
            |p| (p[0] - 1.0).powi(2) + (p[1] + 2.0).powi(2) + 3.0,
            &[0.0, 0.0],
            1000,
        );
        assert!((x[0] - 1.0).abs() < 1e-3);
        assert!((x[1] + 2.0).abs() < 1e-3);
        assert!((value - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_fit_rejects_short_series() {
        let result = fit(&[1.0; 23], SarimaOrder::default());
        assert!(matches!(result, Err(AnalyticsError::InsufficientData(_))));
        assert!(matches!(
            fit(&[], SarimaOrder::default()),
            Err(AnalyticsError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_fit_rejects_non_finite_values() {
        let mut series = vec![10.0; 30];
        series[7] = f64::NAN;
        assert!(matches!(
            fit(&series, SarimaOrder::default()),
            Err(AnalyticsError::ModelFitting(_))
        ));
    }

    #[test]
    fn test_constant_series_forecasts_the_constant() {
        let model = fit(&[500.0; 24], SarimaOrder::default()).unwrap();
        let forecast = model.forecast(12, 0.95).unwrap();

        assert_eq!(forecast.mean.len(), 12);
        for ((m, lo), hi) in forecast.mean.iter().zip(&forecast.lower).zip(&forecast.upper) {
            assert!((m - 500.0).abs() < 1e-6);
            assert!(hi - lo > 0.0);
            assert!(lo < m && m < hi);
        }
    }

    #[test]
    fn test_trend_plus_seasonality_is_continued_exactly() {
        let pattern = [5.0, 3.0, 8.0, 1.0, 0.0, 4.0, 9.0, 2.0, 6.0, 7.0, 3.0, 5.0];
        let value = |t: usize| 100.0 + 2.0 * t as f64 + 10.0 * pattern[t % 12];
        let series: Vec<f64> = (0..36).map(value).collect();

        let forecast = fit(&series, SarimaOrder::default())
            .unwrap()
            .forecast(6, 0.95)
            .unwrap();
        for (h, m) in forecast.mean.iter().enumerate() {
            assert!((m - value(36 + h)).abs() < 1e-6, "step {h}: {m}");
        }
    }

    #[test]
    fn test_interval_widens_with_horizon() {
        let series: Vec<f64> = (0..48)
            .map(|t| 200.0 + 30.0 * ((t % 12) as f64).sin() + ((t * 7919) % 13) as f64)
            .collect();
        let forecast = fit(&series, SarimaOrder::default())
            .unwrap()
            .forecast(12, 0.95)
            .unwrap();

        let widths: Vec<f64> = forecast
            .upper
            .iter()
            .zip(&forecast.lower)
            .map(|(u, l)| u - l)
            .collect();
        assert!(widths.windows(2).all(|w| w[1] >= w[0] - 1e-9));

        let narrower = fit(&series, SarimaOrder::default())
            .unwrap()
            .forecast(12, 0.8)
            .unwrap();
        assert!(narrower.upper[0] - narrower.lower[0] < widths[0]);
    }

    #[test]
    fn test_forecast_rejects_invalid_confidence() {
        let model = fit(&[1.0; 24], SarimaOrder::default()).unwrap();
        assert!(model.forecast(3, 1.0).is_err());
        assert!(model.forecast(3, 0.0).is_err());
    }

    #[test]
    fn test_non_seasonal_order() {
        let series: Vec<f64> = (0..20).map(|t| 10.0 + 3.0 * t as f64).collect();
        let forecast = fit(&series, SarimaOrder::new([0, 1, 0], [0, 0, 0, 0]))
            .unwrap()
            .forecast(2, 0.95)
            .unwrap();
        // Random walk: forecast holds the last value.
        assert!((forecast.mean[0] - 67.0).abs() < 1e-9);
        assert!((forecast.mean[1] - 67.0).abs() < 1e-9);
    }
}
