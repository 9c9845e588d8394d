//! Provides the aggregate business metrics derived from a transaction table.
//!
//! Every function here is pure: it reads the table, never mutates it, and
//! recomputes its result from scratch on each call.
use super::error::AnalyticsError;
use super::series::{Granularity, Metric, prepare_series};
use super::table::{Column, TransactionTable};
use chrono::{Datelike, Month, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::debug;

/// Headline KPIs of a table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpis {
    pub total_sales: f64,
    pub total_profit: f64,
    pub total_orders: usize,
    pub avg_order_value: f64,
    pub profit_margin: f64,
}

/// Period-over-period sales growth, in percent.
///
/// Both figures are 0 when there is not enough monthly history.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Growth {
    pub mom_growth: f64,
    pub yoy_growth: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionPerformance {
    pub region: String,
    pub sales: f64,
    pub profit: f64,
    pub performance_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlySummary {
    pub period: NaiveDate,
    pub sales: f64,
    pub profit: f64,
    pub quantity: u64,
    pub orders: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySales {
    pub category: String,
    pub sales: f64,
    pub profit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductSales {
    pub product_name: String,
    pub sales: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerStats {
    pub customer_name: String,
    pub total_spend: f64,
    pub frequency: usize,
    pub last_order: NaiveDateTime,
}

/// Pairwise Pearson correlation between discount, sales and profit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub variables: Vec<String>,
    pub coefficients: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn get(&self, row: &str, col: &str) -> Option<f64> {
        let i = self.variables.iter().position(|v| v == row)?;
        let j = self.variables.iter().position(|v| v == col)?;
        Some(self.coefficients[i][j])
    }
}

/// Total profit per category (rows) and region (columns). A combination
/// with no transactions is `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfitPivot {
    pub categories: Vec<String>,
    pub regions: Vec<String>,
    pub profit: Vec<Vec<Option<f64>>>,
}

impl ProfitPivot {
    pub fn get(&self, category: &str, region: &str) -> Option<f64> {
        let i = self.categories.iter().position(|c| c == category)?;
        let j = self.regions.iter().position(|r| r == region)?;
        self.profit[i][j]
    }
}

/// Mean transaction sales for one calendar month, pooled across years.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthSeasonality {
    pub month: u32,
    pub month_name: String,
    pub average_sales: f64,
    pub transactions: usize,
}

/// Divides `numerator` by `denominator`, yielding `default` when the
/// denominator is zero.
pub fn safe_divide(numerator: f64, denominator: f64, default: f64) -> f64 {
    if denominator == 0.0 {
        default
    } else {
        numerator / denominator
    }
}

fn percent_change(current: f64, previous: f64) -> f64 {
    safe_divide(current - previous, previous, 0.0) * 100.0
}

pub fn calculate_kpis(table: &TransactionTable) -> Result<Kpis, AnalyticsError> {
    table.require(&[Column::OrderId, Column::Sales, Column::Profit])?;

    let total_sales: f64 = table.rows().iter().map(|r| r.sales).sum();
    let total_profit: f64 = table.rows().iter().map(|r| r.profit).sum();
    let total_orders = table
        .rows()
        .iter()
        .map(|r| r.order_id.as_str())
        .collect::<HashSet<_>>()
        .len();

    Ok(Kpis {
        total_sales,
        total_profit,
        total_orders,
        avg_order_value: safe_divide(total_sales, total_orders as f64, 0.0),
        profit_margin: safe_divide(total_profit, total_sales, 0.0) * 100.0,
    })
}

/// Month-over-month and year-over-year sales growth.
///
/// Months are contiguous (a month without orders is a zero bucket), so the
/// year-ago bucket is always exactly twelve months before the latest one.
pub fn calculate_growth(table: &TransactionTable) -> Result<Growth, AnalyticsError> {
    let monthly = prepare_series(table, Metric::Sales, Granularity::Monthly)?.values();

    let n = monthly.len();
    if n < 2 {
        debug!("Only {n} monthly buckets, reporting zero growth");
        return Ok(Growth::default());
    }

    let current = monthly[n - 1];
    let mom_growth = percent_change(current, monthly[n - 2]);
    let yoy_growth = if n > 12 {
        percent_change(current, monthly[n - 13])
    } else {
        0.0
    };

    Ok(Growth {
        mom_growth,
        yoy_growth,
    })
}

/// Ranks regions by a composite of their sales and profit relative to the
/// best region: `sales/max_sales * 50 + profit/max_profit * 50`.
///
/// Each half is clamped to `[0, 50]`. When the maximum of a component is not
/// positive (all regions flat or loss-making) that half contributes 0.
pub fn get_region_performance(
    table: &TransactionTable,
) -> Result<Vec<RegionPerformance>, AnalyticsError> {
    table.require(&[Column::Region, Column::Sales, Column::Profit])?;

    let mut totals: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
    for row in table.rows() {
        let entry = totals.entry(row.region.as_str()).or_insert((0.0, 0.0));
        entry.0 += row.sales;
        entry.1 += row.profit;
    }

    let max_sales = totals.values().map(|t| t.0).fold(f64::NEG_INFINITY, f64::max);
    let max_profit = totals.values().map(|t| t.1).fold(f64::NEG_INFINITY, f64::max);

    let component = |value: f64, max: f64| {
        if max > 0.0 {
            (value / max).clamp(0.0, 1.0) * 50.0
        } else {
            0.0
        }
    };

    let mut regions: Vec<RegionPerformance> = totals
        .into_iter()
        .map(|(region, (sales, profit))| RegionPerformance {
            region: region.to_string(),
            sales,
            profit,
            performance_score: component(sales, max_sales) + component(profit, max_profit),
        })
        .collect();

    regions.sort_by(|a, b| {
        b.performance_score
            .total_cmp(&a.performance_score)
            .then_with(|| a.region.cmp(&b.region))
    });
    Ok(regions)
}

/// Sales, profit, units and distinct orders per calendar month, gap months
/// included as zero rows.
pub fn monthly_summary(table: &TransactionTable) -> Result<Vec<MonthlySummary>, AnalyticsError> {
    table.require(&[
        Column::OrderDate,
        Column::OrderId,
        Column::Sales,
        Column::Profit,
        Column::Quantity,
    ])?;

    let granularity = Granularity::Monthly;
    let mut buckets: BTreeMap<NaiveDate, (f64, f64, u64, HashSet<&str>)> = BTreeMap::new();
    for row in table.rows() {
        let entry = buckets
            .entry(granularity.period_start(row.order_date.date()))
            .or_default();
        entry.0 += row.sales;
        entry.1 += row.profit;
        entry.2 += u64::from(row.quantity);
        entry.3.insert(row.order_id.as_str());
    }

    let (Some(&first), Some(&last)) = (buckets.keys().next(), buckets.keys().next_back()) else {
        return Ok(Vec::new());
    };

    let mut summary = Vec::new();
    let mut period = first;
    while period <= last {
        let row = match buckets.get(&period) {
            Some((sales, profit, quantity, orders)) => MonthlySummary {
                period,
                sales: *sales,
                profit: *profit,
                quantity: *quantity,
                orders: orders.len(),
            },
            None => MonthlySummary {
                period,
                sales: 0.0,
                profit: 0.0,
                quantity: 0,
                orders: 0,
            },
        };
        summary.push(row);
        match granularity.advance(period, 1) {
            Some(next) => period = next,
            None => break,
        }
    }
    Ok(summary)
}

/// Sales and profit per category, highest sales first.
pub fn category_sales(table: &TransactionTable) -> Result<Vec<CategorySales>, AnalyticsError> {
    table.require(&[Column::Category, Column::Sales, Column::Profit])?;

    let mut totals: HashMap<&str, (f64, f64)> = HashMap::new();
    for row in table.rows() {
        let entry = totals.entry(row.category.as_str()).or_default();
        entry.0 += row.sales;
        entry.1 += row.profit;
    }

    let mut categories: Vec<CategorySales> = totals
        .into_iter()
        .map(|(category, (sales, profit))| CategorySales {
            category: category.to_string(),
            sales,
            profit,
        })
        .collect();
    categories.sort_by(|a, b| b.sales.total_cmp(&a.sales).then_with(|| a.category.cmp(&b.category)));
    Ok(categories)
}

/// The `n` best-selling products by total sales.
pub fn top_products(table: &TransactionTable, n: usize) -> Result<Vec<ProductSales>, AnalyticsError> {
    table.require(&[Column::ProductName, Column::Sales])?;

    let mut totals: HashMap<&str, f64> = HashMap::new();
    for row in table.rows() {
        *totals.entry(row.product_name.as_str()).or_default() += row.sales;
    }

    let mut products: Vec<ProductSales> = totals
        .into_iter()
        .map(|(name, sales)| ProductSales {
            product_name: name.to_string(),
            sales,
        })
        .collect();
    products.sort_by(|a, b| {
        b.sales
            .total_cmp(&a.sales)
            .then_with(|| a.product_name.cmp(&b.product_name))
    });
    products.truncate(n);
    Ok(products)
}

/// Recency/frequency/spend per customer for the `n` biggest spenders.
pub fn top_customers(table: &TransactionTable, n: usize) -> Result<Vec<CustomerStats>, AnalyticsError> {
    table.require(&[
        Column::CustomerName,
        Column::OrderId,
        Column::OrderDate,
        Column::Sales,
    ])?;

    let mut stats: HashMap<&str, (f64, HashSet<&str>, NaiveDateTime)> = HashMap::new();
    for row in table.rows() {
        let entry = stats
            .entry(row.customer_name.as_str())
            .or_insert_with(|| (0.0, HashSet::new(), row.order_date));
        entry.0 += row.sales;
        entry.1.insert(row.order_id.as_str());
        entry.2 = entry.2.max(row.order_date);
    }

    let mut customers: Vec<CustomerStats> = stats
        .into_iter()
        .map(|(name, (spend, orders, last_order))| CustomerStats {
            customer_name: name.to_string(),
            total_spend: spend,
            frequency: orders.len(),
            last_order,
        })
        .collect();
    customers.sort_by(|a, b| {
        b.total_spend
            .total_cmp(&a.total_spend)
            .then_with(|| a.customer_name.cmp(&b.customer_name))
    });
    customers.truncate(n);
    Ok(customers)
}

fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len() as f64;
    if xs.len() < 2 {
        return 0.0;
    }
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    safe_divide(cov, (var_x * var_y).sqrt(), 0.0)
}

/// Correlation matrix of discount, sales and profit. A coefficient involving
/// a constant column is reported as 0.
pub fn discount_correlation(table: &TransactionTable) -> Result<CorrelationMatrix, AnalyticsError> {
    table.require(&[Column::Discount, Column::Sales, Column::Profit])?;

    let columns: [(&str, Vec<f64>); 3] = [
        ("discount", table.rows().iter().map(|r| r.discount).collect()),
        ("sales", table.rows().iter().map(|r| r.sales).collect()),
        ("profit", table.rows().iter().map(|r| r.profit).collect()),
    ];

    let coefficients = columns
        .iter()
        .map(|(_, xs)| {
            columns
                .iter()
                .map(|(_, ys)| pearson(xs, ys))
                .collect::<Vec<_>>()
        })
        .collect();

    Ok(CorrelationMatrix {
        variables: columns.iter().map(|(name, _)| name.to_string()).collect(),
        coefficients,
    })
}

/// Pivots total profit by category and region, both sorted by name.
pub fn category_region_profit(table: &TransactionTable) -> Result<ProfitPivot, AnalyticsError> {
    table.require(&[Column::Category, Column::Region, Column::Profit])?;

    let mut totals: BTreeMap<(&str, &str), f64> = BTreeMap::new();
    for row in table.rows() {
        *totals
            .entry((row.category.as_str(), row.region.as_str()))
            .or_insert(0.0) += row.profit;
    }

    let categories: BTreeSet<&str> = totals.keys().map(|(c, _)| *c).collect();
    let regions: BTreeSet<&str> = totals.keys().map(|(_, r)| *r).collect();
    let profit = categories
        .iter()
        .map(|c| {
            regions
                .iter()
                .map(|r| totals.get(&(*c, *r)).copied())
                .collect::<Vec<_>>()
        })
        .collect();

    Ok(ProfitPivot {
        categories: categories.into_iter().map(str::to_string).collect(),
        regions: regions.into_iter().map(str::to_string).collect(),
        profit,
    })
}

/// Average sales per transaction by calendar month (January first), over
/// every year in the table. Months without transactions are omitted.
pub fn monthly_seasonality(table: &TransactionTable) -> Result<Vec<MonthSeasonality>, AnalyticsError> {
    table.require(&[Column::OrderDate, Column::Sales])?;

    let mut by_month: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
    for row in table.rows() {
        let entry = by_month.entry(row.order_date.month()).or_insert((0.0, 0));
        entry.0 += row.sales;
        entry.1 += 1;
    }

    Ok(by_month
        .into_iter()
        .map(|(month, (sales, count))| MonthSeasonality {
            month,
            month_name: Month::try_from(month as u8)
                .map(|m| m.name().to_string())
                .unwrap_or_default(),
            average_sales: safe_divide(sales, count as f64, 0.0),
            transactions: count,
        })
        .collect())
}
