// Spreadsheet module - the tab interface the updater writes through

pub mod google;
pub mod grid;
pub mod memory;
pub mod workbook;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

pub use google::GoogleSheets;
pub use grid::{column_letter, find_row, first_empty_column, Grid};
pub use memory::MemorySpreadsheet;
pub use workbook::CsvWorkbook;

/// Value written into a single cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Text(String),
    Number(Decimal),
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(text) => f.write_str(text),
            CellValue::Number(number) => write!(f, "{}", number.normalize()),
        }
    }
}

/// A spreadsheet holding one tab per trade side.
///
/// Rows and columns are 1-based.
#[async_trait]
pub trait Spreadsheet: Send + Sync {
    /// All cell values of a tab as displayed, trailing empties trimmed
    async fn get_all_values(&self, tab: &str) -> Result<Grid>;

    async fn update_cell(&self, tab: &str, row: usize, column: usize, value: CellValue)
        -> Result<()>;

    /// Row holding `key` in the key column; fails with `RatesError::RowNotFound`
    async fn find_row(&self, tab: &str, key: &str) -> Result<usize> {
        let grid = self.get_all_values(tab).await?;
        Ok(grid::find_row(&grid, key)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_cell_value_display() {
        assert_eq!(CellValue::Text("2024-01-01".into()).to_string(), "2024-01-01");
        assert_eq!(CellValue::Number(dec!(4.20)).to_string(), "4.2");
        assert_eq!(CellValue::Number(dec!(129)).to_string(), "129");
    }
}
