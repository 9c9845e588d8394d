use super::ui;
use crate::core::TransactionTable;
use crate::core::metrics::{
    self, CorrelationMatrix, MonthSeasonality, MonthlySummary, ProductSales, ProfitPivot,
    RegionPerformance,
};
use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

fn region_table(regions: &[RegionPerformance], currency: &str) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Region"),
        ui::header_cell("Sales"),
        ui::header_cell("Profit"),
        ui::header_cell("Score"),
    ]);
    for region in regions {
        table.add_row(vec![
            Cell::new(&region.region),
            ui::money_cell(region.sales, currency),
            ui::money_cell(region.profit, currency),
            ui::number_cell(format!("{:.1}", region.performance_score)),
        ]);
    }
    table
}

fn monthly_table(months: &[MonthlySummary], currency: &str) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Month"),
        ui::header_cell("Orders"),
        ui::header_cell("Units"),
        ui::header_cell("Sales"),
        ui::header_cell("Profit"),
    ]);
    for month in months {
        table.add_row(vec![
            Cell::new(month.period.format("%Y-%m")),
            ui::number_cell(month.orders),
            ui::number_cell(month.quantity),
            ui::money_cell(month.sales, currency),
            ui::money_cell(month.profit, currency),
        ]);
    }
    table
}

fn product_table(products: &[ProductSales], currency: &str) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("#"),
        ui::header_cell("Product"),
        ui::header_cell("Sales"),
    ]);
    for (rank, product) in products.iter().enumerate() {
        table.add_row(vec![
            ui::number_cell(rank + 1),
            Cell::new(&product.product_name),
            ui::money_cell(product.sales, currency),
        ]);
    }
    table
}

fn seasonality_table(months: &[MonthSeasonality], currency: &str) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Month"),
        ui::header_cell("Transactions"),
        ui::header_cell("Avg Sale"),
    ]);
    for month in months {
        table.add_row(vec![
            Cell::new(&month.month_name),
            ui::number_cell(month.transactions),
            ui::money_cell(month.average_sales, currency),
        ]);
    }
    table
}

/// Categories down, regions across. Empty combinations show as N/A.
fn pivot_table(pivot: &ProfitPivot, currency: &str) -> Table {
    let mut table = ui::new_styled_table();
    let mut header = vec![ui::header_cell("Category")];
    header.extend(pivot.regions.iter().map(|r| ui::header_cell(r)));
    table.set_header(header);

    for (category, profits) in pivot.categories.iter().zip(&pivot.profit) {
        let mut cells = vec![Cell::new(category)];
        cells.extend(profits.iter().map(|p| match p {
            Some(value) => ui::money_cell(*value, currency),
            None => ui::na_cell(),
        }));
        table.add_row(cells);
    }
    table
}

fn correlation_table(matrix: &CorrelationMatrix) -> Table {
    let mut table = ui::new_styled_table();
    let mut header = vec![ui::header_cell("")];
    header.extend(matrix.variables.iter().map(|v| ui::header_cell(v)));
    table.set_header(header);

    for row in &matrix.variables {
        let mut cells = vec![Cell::new(row)];
        cells.extend(
            matrix
                .variables
                .iter()
                .map(|col| ui::format_optional_cell(matrix.get(row, col), |c| format!("{c:.3}"))),
        );
        table.add_row(cells);
    }
    table
}

/// Renders region ranking, the monthly breakdown, calendar-month seasonality,
/// the `top` products, profit by category and region, and the discount
/// correlation matrix.
pub fn render(table: &TransactionTable, currency: &str, top: usize) -> Result<String> {
    let regions = metrics::get_region_performance(table).context("Failed to rank regions")?;
    let months = metrics::monthly_summary(table).context("Failed to summarize months")?;
    let seasonality =
        metrics::monthly_seasonality(table).context("Failed to compute seasonality")?;
    let products = metrics::top_products(table, top).context("Failed to rank products")?;
    let pivot =
        metrics::category_region_profit(table).context("Failed to pivot profit by region")?;
    let correlation =
        metrics::discount_correlation(table).context("Failed to correlate discounts")?;

    let sections = [
        ("Region Performance".to_string(), region_table(&regions, currency)),
        ("Monthly Sales".to_string(), monthly_table(&months, currency)),
        ("Seasonality".to_string(), seasonality_table(&seasonality, currency)),
        (format!("Top {top} Products"), product_table(&products, currency)),
        ("Profit by Category and Region".to_string(), pivot_table(&pivot, currency)),
        ("Discount Correlation".to_string(), correlation_table(&correlation)),
    ];
    Ok(sections
        .iter()
        .map(|(title, t)| format!("{}\n{t}", ui::style_text(title, ui::StyleType::Title)))
        .collect::<Vec<_>>()
        .join("\n\n"))
}

pub fn run(table: &TransactionTable, currency: &str, top: usize) -> Result<()> {
    println!("{}", render(table, currency, top)?);
    Ok(())
}
