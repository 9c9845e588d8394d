use super::ui;
use crate::core::TransactionTable;
use crate::core::metrics::{self, CategorySales, Growth, Kpis};
use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use comfy_table::{Cell, Table};
use tracing::info;

fn kpi_table(kpis: &Kpis, growth: &Growth, currency: &str) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Metric"), ui::header_cell("Value")]);
    table.add_row(vec![
        Cell::new("Total Sales"),
        ui::money_cell(kpis.total_sales, currency),
    ]);
    table.add_row(vec![
        Cell::new("Total Profit"),
        ui::money_cell(kpis.total_profit, currency),
    ]);
    table.add_row(vec![
        Cell::new("Total Orders"),
        ui::number_cell(kpis.total_orders),
    ]);
    table.add_row(vec![
        Cell::new("Avg Order Value"),
        ui::money_cell(kpis.avg_order_value, currency),
    ]);
    table.add_row(vec![
        Cell::new("Profit Margin"),
        ui::number_cell(format!("{:.2}%", kpis.profit_margin)),
    ]);
    table.add_row(vec![
        Cell::new("MoM Growth"),
        ui::change_cell(growth.mom_growth),
    ]);
    table.add_row(vec![
        Cell::new("YoY Growth"),
        ui::change_cell(growth.yoy_growth),
    ]);
    table
}

fn category_table(categories: &[CategorySales], currency: &str) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Category"),
        ui::header_cell("Sales"),
        ui::header_cell("Profit"),
    ]);
    for category in categories {
        table.add_row(vec![
            Cell::new(&category.category),
            ui::money_cell(category.sales, currency),
            ui::money_cell(category.profit, currency),
        ]);
    }
    table
}

/// Narrows the table to `[start, end]`; a missing bound defaults to the
/// table's own first or last date. Shared by every command that takes
/// `--start`/`--end`.
pub fn select_period(
    table: &TransactionTable,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<TransactionTable> {
    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            bail!("Start date must be before end date.");
        }
    }
    Ok(match (start, end, table.date_range()) {
        (None, None, _) | (_, _, None) => table.clone(),
        (start, end, Some((first, last))) => {
            table.filter_by_date(start.unwrap_or(first), end.unwrap_or(last))
        }
    })
}

/// Renders the headline KPIs, growth and category split as text.
pub fn render(table: &TransactionTable, currency: &str) -> Result<String> {
    let kpis = metrics::calculate_kpis(table).context("Failed to calculate KPIs")?;
    let growth = metrics::calculate_growth(table).context("Failed to calculate growth")?;
    let categories = metrics::category_sales(table).context("Failed to group categories")?;

    let period = table.date_range().map_or_else(
        || "no transactions".to_string(),
        |(first, last)| format!("{first} to {last}"),
    );
    Ok(format!(
        "{}\n{}\n\n{}\n{}",
        ui::style_text(&format!("Overview ({period})"), ui::StyleType::Title),
        kpi_table(&kpis, &growth, currency),
        ui::style_text("Sales by Category", ui::StyleType::Title),
        category_table(&categories, currency)
    ))
}

pub fn run(
    table: &TransactionTable,
    currency: &str,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<()> {
    let selected = select_period(table, start, end)?;
    info!(
        "Overview over {} of {} transactions",
        selected.len(),
        table.len()
    );
    println!("{}", render(&selected, currency)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Transaction;

    fn sample_table() -> TransactionTable {
        let at = |m: u32, d: u32| {
            NaiveDate::from_ymd_opt(2023, m, d)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        };
        let mut rows = vec![
            Transaction::new("O1", at(1, 5), 100.0, 10.0),
            Transaction::new("O2", at(2, 5), 200.0, 20.0),
            Transaction::new("O3", at(3, 5), 300.0, -30.0),
        ];
        rows[0].category = "Furniture".to_string();
        rows[1].category = "Technology".to_string();
        rows[2].category = "Technology".to_string();
        TransactionTable::new(rows)
    }

    #[test]
    fn test_select_period_defaults_missing_bounds() {
        let table = sample_table();
        let from_feb = select_period(&table, NaiveDate::from_ymd_opt(2023, 2, 1), None).unwrap();
        assert_eq!(from_feb.len(), 2);

        let until_feb = select_period(&table, None, NaiveDate::from_ymd_opt(2023, 2, 5)).unwrap();
        assert_eq!(until_feb.len(), 2);

        assert_eq!(select_period(&table, None, None).unwrap().len(), 3);
    }

    #[test]
    fn test_select_period_rejects_reversed_bounds() {
        let table = sample_table();
        let err = select_period(
            &table,
            NaiveDate::from_ymd_opt(2023, 3, 1),
            NaiveDate::from_ymd_opt(2023, 1, 1),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Start date must be before end date.");

        // A single-day window is fine.
        let day = NaiveDate::from_ymd_opt(2023, 2, 5);
        assert_eq!(select_period(&table, day, day).unwrap().len(), 1);
    }

    #[test]
    fn test_render_lists_kpis_and_categories() {
        let output = render(&sample_table(), "$").unwrap();
        assert!(output.contains("Total Sales"));
        assert!(output.contains("$600.00"));
        assert!(output.contains("MoM Growth"));
        // March over February: (300 - 200) / 200
        assert!(output.contains("50.00%"));
        assert!(output.contains("Technology"));
        assert!(output.contains("$500.00"));
    }

    #[test]
    fn test_render_rejects_tables_without_sales() {
        let table = TransactionTable::with_columns(Vec::new(), [crate::core::Column::OrderDate]);
        let err = render(&table, "$").unwrap_err();
        assert_eq!(err.to_string(), "Failed to calculate KPIs");
    }
}
