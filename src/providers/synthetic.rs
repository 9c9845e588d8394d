//! Seeded generator of Superstore-like transaction data.

use crate::core::config::SyntheticConfig;
use crate::core::table::{Transaction, TransactionTable};
use anyhow::{Context, Result};
use chrono::{Days, NaiveDate};
use rand::distributions::WeightedIndex;
use rand::prelude::Distribution;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::info;

const REGIONS: [&str; 4] = ["North", "South", "East", "West"];
const SHIP_MODES: [&str; 4] = ["Standard Class", "Second Class", "First Class", "Same Day"];
const SEGMENTS: [&str; 3] = ["Consumer", "Corporate", "Home Office"];
const DISCOUNTS: [f64; 5] = [0.0, 0.1, 0.2, 0.3, 0.5];
const DISCOUNT_WEIGHTS: [f64; 5] = [0.5, 0.2, 0.15, 0.1, 0.05];
const CATEGORIES: [(&str, &[&str]); 3] = [
    ("Furniture", &["Bookcases", "Chairs", "Tables", "Furnishings"]),
    (
        "Office Supplies",
        &["Labels", "Storage", "Art", "Binders", "Appliances", "Paper"],
    ),
    ("Technology", &["Phones", "Accessories", "Copiers", "Machines"]),
];

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn pick<'a>(rng: &mut StdRng, options: &[&'a str]) -> &'a str {
    options.choose(rng).copied().unwrap_or_default()
}

/// Generates `settings.rows` transactions dated 2021-01-01 to 2024-12-30.
/// The same seed always yields the same table.
pub fn generate(settings: &SyntheticConfig) -> Result<TransactionTable> {
    info!(
        "Generating {} synthetic transactions (seed {})",
        settings.rows, settings.seed
    );
    let mut rng = StdRng::seed_from_u64(settings.seed);

    let start = NaiveDate::from_ymd_opt(2021, 1, 1).context("Invalid start date")?;
    let end = NaiveDate::from_ymd_opt(2024, 12, 31).context("Invalid end date")?;
    let span_days = (end - start).num_days() as u64;
    let discount_index =
        WeightedIndex::new(DISCOUNT_WEIGHTS).context("Invalid discount weights")?;

    let mut rows = Vec::with_capacity(settings.rows);
    for _ in 0..settings.rows {
        let order_date = start
            .checked_add_days(Days::new(rng.gen_range(0..span_days)))
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .context("Generated order date out of range")?;
        let ship_date = order_date.checked_add_days(Days::new(rng.gen_range(2..7)));

        let (category, sub_categories) = CATEGORIES[rng.gen_range(0..CATEGORIES.len())];
        let sub_category = pick(&mut rng, sub_categories);
        let region = pick(&mut rng, &REGIONS);
        let sales: f64 = rng.gen_range(10.0..5000.0);
        let quantity = rng.gen_range(1..15);
        let discount = DISCOUNTS[discount_index.sample(&mut rng)];
        let profit = sales * rng.gen_range(-0.2..0.4);

        rows.push(Transaction {
            order_id: format!("ORD-{}", rng.gen_range(10000..99999)),
            order_date,
            ship_date,
            ship_mode: pick(&mut rng, &SHIP_MODES).to_string(),
            customer_id: format!("CUST-{}", rng.gen_range(1000..9999)),
            customer_name: format!("Customer {}", rng.gen_range(1..1000)),
            segment: pick(&mut rng, &SEGMENTS).to_string(),
            region: region.to_string(),
            product_id: format!("PROD-{}-{}", &category[..3], rng.gen_range(1000..9999)),
            category: category.to_string(),
            sub_category: sub_category.to_string(),
            product_name: format!("{sub_category} Product {}", rng.gen_range(1..100)),
            sales: round_cents(sales),
            quantity,
            discount,
            profit: round_cents(profit),
        });
    }

    Ok(TransactionTable::new(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metrics;

    fn settings(rows: usize, seed: u64) -> SyntheticConfig {
        SyntheticConfig { rows, seed }
    }

    #[test]
    fn test_generate_is_deterministic_per_seed() {
        let a = generate(&settings(200, 7)).unwrap();
        let b = generate(&settings(200, 7)).unwrap();
        let c = generate(&settings(200, 8)).unwrap();

        assert_eq!(a.rows(), b.rows());
        assert_ne!(a.rows(), c.rows());
    }

    #[test]
    fn test_generated_rows_respect_the_schema_ranges() {
        let table = generate(&settings(500, 42)).unwrap();
        assert_eq!(table.len(), 500);

        let (min, max) = table.date_range().unwrap();
        assert!(min >= NaiveDate::from_ymd_opt(2021, 1, 1).unwrap());
        assert!(max <= NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());

        for row in table.rows() {
            assert!((10.0..=5000.0).contains(&row.sales));
            assert!((1..15).contains(&row.quantity));
            assert!(DISCOUNTS.contains(&row.discount));
            assert!(row.profit >= -0.2 * row.sales - 0.01);
            assert!(row.profit <= 0.4 * row.sales + 0.01);
            assert!(REGIONS.contains(&row.region.as_str()));
            assert!(row.product_name.starts_with(&row.sub_category));
            assert!(row.ship_date.unwrap() > row.order_date);
        }
    }

    #[test]
    fn test_generated_data_feeds_the_engines() {
        let table = generate(&settings(2000, 42)).unwrap();
        let regions = metrics::get_region_performance(&table).unwrap();
        assert_eq!(regions.len(), 4);

        let series = crate::core::series::prepare_series(
            &table,
            crate::core::Metric::Sales,
            crate::core::Granularity::Monthly,
        )
        .unwrap();
        assert_eq!(series.len(), 48);
    }
}
