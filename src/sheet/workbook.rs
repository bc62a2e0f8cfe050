// Local workbook backend: one CSV file per tab inside a directory
//
// Useful for running the updater offline and for end-to-end tests. Rows may
// be ragged, exactly like the grids the Sheets API returns.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

use super::memory::{check_position, put_cell};
use super::{CellValue, Grid, Spreadsheet};
use crate::error::RatesError;

/// Directory of `<tab>.csv` files
#[derive(Debug, Clone)]
pub struct CsvWorkbook {
    dir: PathBuf,
}

impl CsvWorkbook {
    /// Open an existing workbook directory
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(RatesError::SpreadsheetAccess(format!(
                "workbook directory {} does not exist",
                dir.display()
            ))
            .into());
        }
        Ok(Self { dir })
    }

    fn tab_path(&self, tab: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", tab))
    }

    fn read_tab(&self, tab: &str) -> Result<Grid> {
        let path = self.tab_path(tab);
        if !path.exists() {
            return Err(RatesError::SpreadsheetAccess(format!(
                "no tab named {:?} in {}",
                tab,
                self.dir.display()
            ))
            .into());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;

        // One record per line: csv skips blank lines, but here a blank line
        // is an empty row and must keep the rows below it in place
        let mut grid = Grid::new();
        for (index, line) in content.lines().enumerate() {
            let mut row = parse_row(line).with_context(|| {
                format!("Failed to read {} line {}", path.display(), index + 1)
            })?;
            // Match the Sheets API, which drops trailing empty cells
            while row.last().is_some_and(|c| c.is_empty()) {
                row.pop();
            }
            grid.push(row);
        }
        while grid.last().is_some_and(|r| r.is_empty()) {
            grid.pop();
        }

        debug!("Read {} rows from {}", grid.len(), path.display());
        Ok(grid)
    }

    fn write_tab(&self, tab: &str, grid: &Grid) -> Result<()> {
        let path = self.tab_path(tab);
        let tmp_path = self.dir.join(format!("{}.csv.tmp", tab));

        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_path(&tmp_path)
            .with_context(|| format!("Failed to create {}", tmp_path.display()))?;
        for row in grid {
            if row.is_empty() {
                // csv refuses empty records; keep the row as a single blank cell
                writer.write_record([""])?;
            } else {
                writer.write_record(row)?;
            }
        }
        writer.flush().context("Failed to flush workbook tab")?;
        drop(writer);

        fs::rename(&tmp_path, &path)
            .with_context(|| format!("Failed to finalize {}", path.display()))?;
        Ok(())
    }
}

fn parse_row(line: &str) -> csv::Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());
    match reader.records().next() {
        Some(record) => Ok(record?.iter().map(str::to_string).collect()),
        None => Ok(Vec::new()),
    }
}

#[async_trait]
impl Spreadsheet for CsvWorkbook {
    async fn get_all_values(&self, tab: &str) -> Result<Grid> {
        self.read_tab(tab)
    }

    async fn update_cell(
        &self,
        tab: &str,
        row: usize,
        column: usize,
        value: CellValue,
    ) -> Result<()> {
        check_position(row, column)?;
        let mut grid = self.read_tab(tab)?;
        put_cell(&mut grid, row, column, value.to_string());
        self.write_tab(tab, &grid)
    }
}
