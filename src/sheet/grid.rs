//! Column and row arithmetic over a snapshot of a tab's cell values.
//!
//! A grid is what `get_all_values` returns: rows of strings, possibly ragged.
//! Rows and columns are 1-based at this boundary, the same way the
//! spreadsheet backends address cells.

use crate::error::RatesError;

/// Rows of cell strings, as read from a tab
pub type Grid = Vec<Vec<String>>;

/// Column holding the currency codes
pub const KEY_COLUMN: usize = 1;

fn cell_is_empty(row: &[String], column: usize) -> bool {
    row.get(column - 1).map_or(true, |cell| cell.trim().is_empty())
}

/// Return the 1-based index of the first column where every row is empty.
///
/// Rows shorter than a column count as empty there, and whitespace-only cells
/// are empty. An empty grid yields column 1.
pub fn first_empty_column(grid: &[Vec<String>]) -> usize {
    if grid.is_empty() {
        return 1;
    }

    let widest = grid.iter().map(Vec::len).max().unwrap_or(0);

    (1..=widest + 1)
        .find(|&column| grid.iter().all(|row| cell_is_empty(row, column)))
        .unwrap_or(widest + 1)
}

/// Spreadsheet-style label for a 1-based column index (1 → A, 27 → AA).
///
/// Display only; cells are always addressed by index.
pub fn column_letter(column: usize) -> Result<String, RatesError> {
    if column == 0 {
        return Err(RatesError::InvalidArgument(
            "column index must be at least 1".to_string(),
        ));
    }

    let mut letters = Vec::new();
    let mut n = column;
    while n > 0 {
        let remainder = (n - 1) % 26;
        letters.push(b'A' + remainder as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();

    Ok(String::from_utf8_lossy(&letters).into_owned())
}

/// Find the 1-based row whose key column exactly matches `key`.
///
/// The first match in row order wins when a key appears more than once.
pub fn find_row(grid: &[Vec<String>], key: &str) -> Result<usize, RatesError> {
    grid.iter()
        .position(|row| row.get(KEY_COLUMN - 1).map(String::as_str) == Some(key))
        .map(|index| index + 1)
        .ok_or_else(|| RatesError::RowNotFound {
            key: key.to_string(),
        })
}
