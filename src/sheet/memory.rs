use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{CellValue, Grid, Spreadsheet};
use crate::error::RatesError;

/// Spreadsheet held entirely in memory.
///
/// Used for dry runs, where the real tabs are snapshotted and the run writes
/// here instead, and as the test double for the updater.
#[derive(Debug, Default)]
pub struct MemorySpreadsheet {
    tabs: Mutex<BTreeMap<String, Grid>>,
}

impl MemorySpreadsheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a tab
    pub fn with_tab(self, name: &str, grid: Grid) -> Self {
        self.insert_tab(name, grid);
        self
    }

    pub fn insert_tab(&self, name: &str, grid: Grid) {
        self.tabs.lock().unwrap().insert(name.to_string(), grid);
    }

    /// Copy of a tab's current cells
    pub fn tab(&self, name: &str) -> Option<Grid> {
        self.tabs.lock().unwrap().get(name).cloned()
    }

    /// Cell at a 1-based position, `None` when outside the written area
    pub fn cell(&self, name: &str, row: usize, column: usize) -> Option<String> {
        let tabs = self.tabs.lock().unwrap();
        tabs.get(name)?
            .get(row.checked_sub(1)?)?
            .get(column.checked_sub(1)?)
            .cloned()
    }
}

/// Write `value` at a 1-based position, padding rows and columns as needed
pub(crate) fn put_cell(grid: &mut Grid, row: usize, column: usize, value: String) {
    if grid.len() < row {
        grid.resize_with(row, Vec::new);
    }
    let cells = &mut grid[row - 1];
    if cells.len() < column {
        cells.resize(column, String::new());
    }
    cells[column - 1] = value;
}

pub(crate) fn check_position(row: usize, column: usize) -> Result<(), RatesError> {
    if row == 0 || column == 0 {
        return Err(RatesError::InvalidArgument(format!(
            "cell position ({}, {}) is not 1-based",
            row, column
        )));
    }
    Ok(())
}

#[async_trait]
impl Spreadsheet for MemorySpreadsheet {
    async fn get_all_values(&self, tab: &str) -> Result<Grid> {
        self.tab(tab)
            .ok_or_else(|| RatesError::SpreadsheetAccess(format!("no tab named {:?}", tab)).into())
    }

    async fn update_cell(
        &self,
        tab: &str,
        row: usize,
        column: usize,
        value: CellValue,
    ) -> Result<()> {
        check_position(row, column)?;
        let mut tabs = self.tabs.lock().unwrap();
        let grid = tabs
            .get_mut(tab)
            .ok_or_else(|| RatesError::SpreadsheetAccess(format!("no tab named {:?}", tab)))?;
        put_cell(grid, row, column, value.to_string());
        Ok(())
    }
}
