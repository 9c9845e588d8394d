//! Transaction records and the immutable table the engines operate on.

use super::error::AnalyticsError;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Display;
use std::str::FromStr;

/// A named column of the transaction schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Column {
    OrderId,
    OrderDate,
    ShipDate,
    ShipMode,
    CustomerId,
    CustomerName,
    Segment,
    Region,
    ProductId,
    Category,
    SubCategory,
    ProductName,
    Sales,
    Quantity,
    Discount,
    Profit,
}

impl Column {
    pub const ALL: [Column; 16] = [
        Column::OrderId,
        Column::OrderDate,
        Column::ShipDate,
        Column::ShipMode,
        Column::CustomerId,
        Column::CustomerName,
        Column::Segment,
        Column::Region,
        Column::ProductId,
        Column::Category,
        Column::SubCategory,
        Column::ProductName,
        Column::Sales,
        Column::Quantity,
        Column::Discount,
        Column::Profit,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Column::OrderId => "order_id",
            Column::OrderDate => "order_date",
            Column::ShipDate => "ship_date",
            Column::ShipMode => "ship_mode",
            Column::CustomerId => "customer_id",
            Column::CustomerName => "customer_name",
            Column::Segment => "segment",
            Column::Region => "region",
            Column::ProductId => "product_id",
            Column::Category => "category",
            Column::SubCategory => "sub_category",
            Column::ProductName => "product_name",
            Column::Sales => "sales",
            Column::Quantity => "quantity",
            Column::Discount => "discount",
            Column::Profit => "profit",
        }
    }
}

impl Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Column {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        Column::ALL
            .into_iter()
            .find(|c| c.name() == normalized)
            .ok_or_else(|| anyhow::anyhow!("Unknown column: {}", s))
    }
}

/// One line item of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub order_id: String,
    pub order_date: NaiveDateTime,
    pub ship_date: Option<NaiveDateTime>,
    pub ship_mode: String,
    pub customer_id: String,
    pub customer_name: String,
    pub segment: String,
    pub region: String,
    pub product_id: String,
    pub category: String,
    pub sub_category: String,
    pub product_name: String,
    pub sales: f64,
    pub quantity: u32,
    pub discount: f64,
    pub profit: f64,
}

impl Transaction {
    /// Builds a record with the fields every engine reads. The remaining
    /// labels start empty and can be set directly.
    pub fn new(order_id: &str, order_date: NaiveDateTime, sales: f64, profit: f64) -> Self {
        Self {
            order_id: order_id.to_string(),
            order_date,
            ship_date: None,
            ship_mode: String::new(),
            customer_id: String::new(),
            customer_name: String::new(),
            segment: String::new(),
            region: String::new(),
            product_id: String::new(),
            category: String::new(),
            sub_category: String::new(),
            product_name: String::new(),
            sales,
            quantity: 1,
            discount: 0.0,
            profit,
        }
    }

    pub fn with_region(mut self, region: &str) -> Self {
        self.region = region.to_string();
        self
    }
}

/// An ordered collection of transactions plus the columns it actually carries.
#[derive(Debug, Clone, Default)]
pub struct TransactionTable {
    rows: Vec<Transaction>,
    columns: BTreeSet<Column>,
}

impl TransactionTable {
    /// A table carrying the full schema.
    pub fn new(rows: Vec<Transaction>) -> Self {
        Self::with_columns(rows, Column::ALL)
    }

    /// A table that only declares a subset of the schema, e.g. a CSV that
    /// lacked some headers.
    pub fn with_columns(rows: Vec<Transaction>, columns: impl IntoIterator<Item = Column>) -> Self {
        Self {
            rows,
            columns: columns.into_iter().collect(),
        }
    }

    pub fn rows(&self) -> &[Transaction] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> &BTreeSet<Column> {
        &self.columns
    }

    pub fn has_column(&self, column: Column) -> bool {
        self.columns.contains(&column)
    }

    /// Fails with `InvalidInput` on the first required column that is absent.
    pub fn require(&self, required: &[Column]) -> Result<(), AnalyticsError> {
        match required.iter().find(|c| !self.columns.contains(c)) {
            Some(&column) => Err(AnalyticsError::InvalidInput { column }),
            None => Ok(()),
        }
    }

    /// Earliest and latest order date, or `None` for an empty table.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let min = self.rows.iter().map(|r| r.order_date.date()).min()?;
        let max = self.rows.iter().map(|r| r.order_date.date()).max()?;
        Some((min, max))
    }

    /// Rows whose order date falls within `[start, end]`, both inclusive.
    pub fn filter_by_date(&self, start: NaiveDate, end: NaiveDate) -> TransactionTable {
        let rows = self
            .rows
            .iter()
            .filter(|r| {
                let date = r.order_date.date();
                date >= start && date <= end
            })
            .cloned()
            .collect();
        TransactionTable {
            rows,
            columns: self.columns.clone(),
        }
    }
}
