//! CSV ingestion of transaction tables.
//!
//! Column names are matched case-insensitively (`Order Date`, `order_date`
//! and `order-date` are the same column). Missing `sales` cells are imputed
//! with the column mean and missing `profit` cells with zero, so the engines
//! never see gaps.

use super::synthetic;
use crate::core::config::{AppConfig, SyntheticConfig};
use crate::core::table::{Column, Transaction, TransactionTable};
use anyhow::{Context, Result, anyhow};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];

/// One CSV row before imputation.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRecord {
    order_id: String,
    order_date: String,
    ship_date: String,
    ship_mode: String,
    customer_id: String,
    customer_name: String,
    segment: String,
    region: String,
    product_id: String,
    category: String,
    sub_category: String,
    product_name: String,
    sales: Option<f64>,
    quantity: Option<u32>,
    discount: Option<f64>,
    profit: Option<f64>,
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(value, f).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(value, f).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Reads a transaction table from CSV. `order_date` is mandatory; any other
/// absent column is left out of the table's declared columns.
pub fn read_csv<R: Read>(reader: R) -> Result<TransactionTable> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut columns = BTreeSet::new();
    let mut normalized_headers = Vec::new();
    for header in csv_reader.headers().context("Failed to read CSV header")? {
        match header.parse::<Column>() {
            Ok(column) => {
                columns.insert(column);
                normalized_headers.push(column.name().to_string());
            }
            Err(_) => {
                debug!("Ignoring unknown column '{header}'");
                normalized_headers.push(header.to_string());
            }
        }
    }
    if !columns.contains(&Column::OrderDate) {
        return Err(anyhow!("CSV is missing the required 'order_date' column"));
    }
    csv_reader.set_headers(csv::StringRecord::from(normalized_headers));

    let mut raw_records = Vec::new();
    for (line_num, result) in csv_reader.deserialize().enumerate() {
        let record: RawRecord =
            result.with_context(|| format!("CSV parse error at line {}", line_num + 2))?;
        raw_records.push(record);
    }

    let known_sales: Vec<f64> = raw_records.iter().filter_map(|r| r.sales).collect();
    let mean_sales = if known_sales.is_empty() {
        0.0
    } else {
        known_sales.iter().sum::<f64>() / known_sales.len() as f64
    };
    let missing_sales = raw_records.len() - known_sales.len();
    let missing_profit = raw_records.iter().filter(|r| r.profit.is_none()).count();
    if columns.contains(&Column::Sales) && missing_sales > 0 {
        warn!("Imputed {missing_sales} missing sales values with the mean {mean_sales:.2}");
    }
    if columns.contains(&Column::Profit) && missing_profit > 0 {
        warn!("Imputed {missing_profit} missing profit values with 0");
    }

    let mut rows = Vec::with_capacity(raw_records.len());
    for (i, raw) in raw_records.into_iter().enumerate() {
        let order_date = parse_timestamp(&raw.order_date).ok_or_else(|| {
            anyhow!(
                "Invalid order_date '{}' at line {}",
                raw.order_date,
                i + 2
            )
        })?;
        let ship_date = if raw.ship_date.trim().is_empty() {
            None
        } else {
            Some(parse_timestamp(&raw.ship_date).ok_or_else(|| {
                anyhow!("Invalid ship_date '{}' at line {}", raw.ship_date, i + 2)
            })?)
        };

        rows.push(Transaction {
            order_id: raw.order_id,
            order_date,
            ship_date,
            ship_mode: raw.ship_mode,
            customer_id: raw.customer_id,
            customer_name: raw.customer_name,
            segment: raw.segment,
            region: raw.region,
            product_id: raw.product_id,
            category: raw.category,
            sub_category: raw.sub_category,
            product_name: raw.product_name,
            sales: raw.sales.unwrap_or(mean_sales),
            quantity: raw.quantity.unwrap_or(0),
            discount: raw.discount.unwrap_or(0.0),
            profit: raw.profit.unwrap_or(0.0),
        });
    }

    debug!("Loaded {} rows with columns {:?}", rows.len(), columns);
    Ok(TransactionTable::with_columns(rows, columns))
}

pub fn read_csv_file<P: AsRef<Path>>(path: P) -> Result<TransactionTable> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open '{}'", path.display()))?;
    read_csv(file).with_context(|| format!("Failed to load '{}'", path.display()))
}

/// Writes every row with the full schema, dates in ISO 8601.
pub fn write_csv<W: Write>(table: &TransactionTable, writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in table.rows() {
        csv_writer.serialize(row).context("Failed to write CSV row")?;
    }
    csv_writer.flush().context("Failed to flush CSV output")?;
    Ok(())
}

pub fn write_csv_file<P: AsRef<Path>>(table: &TransactionTable, path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create '{}'", path.display()))?;
    write_csv(table, file)
}

/// Loads the configured CSV, generating and saving synthetic data first when
/// the file does not exist yet.
pub struct DataLoader {
    path: PathBuf,
    synthetic: SyntheticConfig,
}

impl DataLoader {
    pub fn new<P: Into<PathBuf>>(path: P, synthetic: SyntheticConfig) -> Self {
        Self {
            path: path.into(),
            synthetic,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self::new(config.data_file()?, config.synthetic.clone()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<TransactionTable> {
        if !self.path.exists() {
            info!(
                "No data at {}, generating synthetic data",
                self.path.display()
            );
            let table = synthetic::generate(&self.synthetic)?;
            write_csv_file(&table, &self.path)?;
            info!("Synthetic data saved to {}", self.path.display());
            return Ok(table);
        }
        read_csv_file(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE_CSV: &str = "\
Order ID,Order Date,Region,Sales,Profit,Postal Code
O1,2023-01-01,North,100,10,12345
O2,2023-01-02 14:30:00,North,,20,12345
O3,02/01/2023,South,300,,12345
O4,2023-02-02T08:00:00,South,500,40,12345
";

    #[test]
    fn test_read_csv_normalizes_and_imputes() {
        let table = read_csv(SAMPLE_CSV.as_bytes()).unwrap();

        assert_eq!(table.len(), 4);
        assert!(table.has_column(Column::OrderId));
        assert!(table.has_column(Column::Sales));
        assert!(!table.has_column(Column::Quantity));
        assert!(!table.has_column(Column::CustomerName));

        let rows = table.rows();
        assert_eq!(rows[1].sales, 300.0); // mean of 100, 300, 500
        assert_eq!(rows[2].profit, 0.0);
        assert_eq!(
            rows[1].order_date,
            NaiveDate::from_ymd_opt(2023, 1, 2)
                .unwrap()
                .and_hms_opt(14, 30, 0)
                .unwrap()
        );
        assert_eq!(
            rows[2].order_date.date(),
            NaiveDate::from_ymd_opt(2023, 2, 1).unwrap()
        );
        assert!(rows[0].ship_date.is_none());
    }

    #[test]
    fn test_read_csv_requires_order_date() {
        let err = read_csv("order_id,sales\nO1,10\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("order_date"));
    }

    #[test]
    fn test_read_csv_reports_bad_dates_with_line() {
        let err = read_csv("order_id,order_date,sales\nO1,2023-01-01,1\nO2,yesterday,2\n".as_bytes())
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid order_date 'yesterday' at line 3");
    }

    #[test]
    fn test_write_then_read_keeps_rows() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("nested").join("sales.csv");
        let table = synthetic::generate(&SyntheticConfig { rows: 25, seed: 3 })?;

        write_csv_file(&table, &path)?;
        let loaded = read_csv_file(&path)?;

        assert_eq!(loaded.rows(), table.rows());
        assert_eq!(loaded.columns(), table.columns());
        Ok(())
    }

    #[test]
    fn test_loader_generates_missing_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("superstore.csv");
        let loader = DataLoader::new(&path, SyntheticConfig { rows: 50, seed: 42 });

        let generated = loader.load()?;
        assert!(path.exists());
        assert_eq!(generated.len(), 50);

        // Second load reads the saved file back.
        let reloaded = loader.load()?;
        assert_eq!(reloaded.rows(), generated.rows());
        Ok(())
    }
}
