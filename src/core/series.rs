//! Period bucketing of a transaction table into contiguous time series.

use super::error::AnalyticsError;
use super::table::{Column, Transaction, TransactionTable};
use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Granularity {
    Daily,
    Weekly,
    #[default]
    Monthly,
    Quarterly,
}

impl Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Granularity::Daily => "daily",
                Granularity::Weekly => "weekly",
                Granularity::Monthly => "monthly",
                Granularity::Quarterly => "quarterly",
            }
        )
    }
}

impl FromStr for Granularity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "d" | "daily" => Ok(Granularity::Daily),
            "w" | "weekly" => Ok(Granularity::Weekly),
            "m" | "monthly" => Ok(Granularity::Monthly),
            "q" | "quarterly" => Ok(Granularity::Quarterly),
            _ => Err(anyhow::anyhow!("Invalid granularity: {}", s)),
        }
    }
}

impl Granularity {
    /// First day of the period containing `date`. Weeks start on Monday.
    pub fn period_start(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Daily => date,
            Granularity::Weekly => {
                date - Days::new(u64::from(date.weekday().num_days_from_monday()))
            }
            Granularity::Monthly => date.with_day(1).unwrap_or(date),
            Granularity::Quarterly => {
                let month = (date.month0() / 3) * 3 + 1;
                NaiveDate::from_ymd_opt(date.year(), month, 1).unwrap_or(date)
            }
        }
    }

    /// Moves a period start forward by `n` periods.
    pub fn advance(&self, period: NaiveDate, n: u32) -> Option<NaiveDate> {
        match self {
            Granularity::Daily => period.checked_add_days(Days::new(u64::from(n))),
            Granularity::Weekly => period.checked_add_days(Days::new(7 * u64::from(n))),
            Granularity::Monthly => period.checked_add_months(Months::new(n)),
            Granularity::Quarterly => period.checked_add_months(Months::new(3 * n)),
        }
    }
}

/// The numeric column summed into each bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    #[default]
    Sales,
    Profit,
    Quantity,
}

impl Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.column())
    }
}

impl FromStr for Metric {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sales" => Ok(Metric::Sales),
            "profit" => Ok(Metric::Profit),
            "quantity" => Ok(Metric::Quantity),
            _ => Err(anyhow::anyhow!("Invalid metric: {}", s)),
        }
    }
}

impl Metric {
    pub fn column(&self) -> Column {
        match self {
            Metric::Sales => Column::Sales,
            Metric::Profit => Column::Profit,
            Metric::Quantity => Column::Quantity,
        }
    }

    pub fn value(&self, row: &Transaction) -> f64 {
        match self {
            Metric::Sales => row.sales,
            Metric::Profit => row.profit,
            Metric::Quantity => f64::from(row.quantity),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub period: NaiveDate,
    pub value: f64,
}

/// A chronologically ordered, gap-free sequence of period totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeries {
    pub granularity: Granularity,
    pub points: Vec<SeriesPoint>,
}

impl TimeSeries {
    pub fn new(granularity: Granularity, points: Vec<SeriesPoint>) -> Self {
        Self {
            granularity,
            points,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn last_period(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.period)
    }

    /// Period starts following the last observation, one granularity unit apart.
    pub fn future_periods(&self, horizon: usize) -> Option<Vec<NaiveDate>> {
        let last = self.last_period()?;
        (1..=horizon)
            .map(|h| self.granularity.advance(last, u32::try_from(h).ok()?))
            .collect()
    }
}

/// Sums `metric` per period of `granularity`, emitting zero-valued buckets
/// for periods without transactions so positional lookups stay aligned with
/// the calendar.
pub fn prepare_series(
    table: &TransactionTable,
    metric: Metric,
    granularity: Granularity,
) -> Result<TimeSeries, AnalyticsError> {
    table.require(&[Column::OrderDate, metric.column()])?;

    let mut buckets: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for row in table.rows() {
        let period = granularity.period_start(row.order_date.date());
        *buckets.entry(period).or_insert(0.0) += metric.value(row);
    }

    let (Some((&first, _)), Some((&last, _))) = (buckets.first_key_value(), buckets.last_key_value())
    else {
        return Ok(TimeSeries::new(granularity, Vec::new()));
    };

    let mut points = Vec::with_capacity(buckets.len());
    let mut period = first;
    while period <= last {
        points.push(SeriesPoint {
            period,
            value: buckets.get(&period).copied().unwrap_or(0.0),
        });
        match granularity.advance(period, 1) {
            Some(next) => period = next,
            None => break,
        }
    }

    debug!(
        "Prepared {} {} buckets of {} ({} observed)",
        points.len(),
        granularity,
        metric,
        buckets.len()
    );
    Ok(TimeSeries::new(granularity, points))
}
