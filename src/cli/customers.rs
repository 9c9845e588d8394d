use super::ui;
use crate::core::TransactionTable;
use crate::core::metrics::{self, CustomerStats};
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use comfy_table::{Cell, Table};

/// Spend, order count, and days since the last order relative to `as_of`.
fn customer_table(customers: &[CustomerStats], as_of: NaiveDateTime, currency: &str) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("#"),
        ui::header_cell("Customer"),
        ui::header_cell("Total Spend"),
        ui::header_cell("Orders"),
        ui::header_cell("Last Order"),
        ui::header_cell("Recency (days)"),
    ]);
    for (rank, customer) in customers.iter().enumerate() {
        table.add_row(vec![
            ui::number_cell(rank + 1),
            Cell::new(&customer.customer_name),
            ui::money_cell(customer.total_spend, currency),
            ui::number_cell(customer.frequency),
            Cell::new(customer.last_order.date()),
            ui::number_cell((as_of - customer.last_order).num_days()),
        ]);
    }
    table
}

pub fn render(table: &TransactionTable, currency: &str, top: usize) -> Result<String> {
    let customers = metrics::top_customers(table, top).context("Failed to rank customers")?;
    let Some(as_of) = table.rows().iter().map(|r| r.order_date).max() else {
        return Ok(ui::style_text("No customer orders found.", ui::StyleType::Subtle));
    };

    Ok(format!(
        "{}\n{}",
        ui::style_text(&format!("Top {top} Customers"), ui::StyleType::Title),
        customer_table(&customers, as_of, currency)
    ))
}

pub fn run(table: &TransactionTable, currency: &str, top: usize) -> Result<()> {
    println!("{}", render(table, currency, top)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Column, Transaction};
    use chrono::NaiveDate;

    fn order(id: &str, customer: &str, day: u32, sales: f64) -> Transaction {
        let date = NaiveDate::from_ymd_opt(2023, 5, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let mut row = Transaction::new(id, date, sales, 0.0);
        row.customer_name = customer.to_string();
        row
    }

    #[test]
    fn test_render_ranks_by_spend_with_recency() {
        let table = TransactionTable::new(vec![
            order("O1", "Ada", 1, 50.0),
            order("O2", "Ada", 11, 70.0),
            order("O3", "Grace", 21, 500.0),
        ]);
        let output = render(&table, "$", 5).unwrap();

        let grace = output.find("Grace").unwrap();
        let ada = output.find("Ada").unwrap();
        assert!(grace < ada);
        assert!(output.contains("$120.00"));
        assert!(output.contains("2023-05-11"));
    }

    #[test]
    fn test_render_selected_period_drops_later_customers() {
        let table = TransactionTable::new(vec![
            order("O1", "Ada", 1, 50.0),
            order("O2", "Ada", 11, 70.0),
            order("O3", "Grace", 21, 500.0),
        ]);
        let until_mid_may = crate::cli::overview::select_period(
            &table,
            None,
            NaiveDate::from_ymd_opt(2023, 5, 15),
        )
        .unwrap();
        let output = render(&until_mid_may, "$", 5).unwrap();

        assert!(output.contains("Ada"));
        assert!(!output.contains("Grace"));
        assert!(!output.contains("$500.00"));
    }

    #[test]
    fn test_render_empty_table() {
        let output = render(&TransactionTable::default(), "$", 5);
        // An empty table declares no columns.
        assert!(output.is_err());

        let empty = TransactionTable::with_columns(Vec::new(), Column::ALL);
        assert!(render(&empty, "$", 5).unwrap().contains("No customer orders"));
    }
}
