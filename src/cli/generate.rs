use super::ui;
use crate::core::config::SyntheticConfig;
use crate::providers::{loader, synthetic};
use anyhow::Result;
use std::path::Path;
use tracing::info;

/// Generates a synthetic dataset and writes it to `output`, replacing any
/// existing file.
pub fn run(settings: &SyntheticConfig, output: &Path) -> Result<()> {
    let table = synthetic::generate(settings)?;
    loader::write_csv_file(&table, output)?;
    info!("Wrote {} rows to {}", table.len(), output.display());

    let (first, last) = table.date_range().unzip();
    println!(
        "{} {} transactions ({} to {}) written to {}",
        ui::style_text("Generated", ui::StyleType::TotalLabel),
        ui::style_text(&table.len().to_string(), ui::StyleType::TotalValue),
        first.map_or_else(|| "-".to_string(), |d| d.to_string()),
        last.map_or_else(|| "-".to_string(), |d| d.to_string()),
        output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_generate_overwrites_output() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let output = temp_dir.path().join("sales.csv");
        std::fs::write(&output, "stale")?;

        run(&SyntheticConfig { rows: 30, seed: 1 }, &output)?;

        let table = loader::read_csv_file(&output)?;
        assert_eq!(table.len(), 30);
        Ok(())
    }
}
