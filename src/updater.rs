//! Daily rate update
//!
//! One run claims the first empty column of each tab (BUY, then SELL), stamps
//! the run date into its header cell and fills in the median price of every
//! configured currency. A currency that cannot be priced, located or written
//! is logged and skipped; only failing to read a tab or to write its header
//! aborts the run.
//!
//! Because the column is chosen as "first empty" rather than "today's column",
//! running twice on the same day produces two columns.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::RatesError;
use crate::pricing::{PriceSource, TradeSide};
use crate::sheet::{self, CellValue, Grid, Spreadsheet};

/// What happened to one currency's cell
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CurrencyOutcome {
    Written { row: usize, price: Decimal },
    /// The source had no numeric offers
    NoPrice,
    FetchFailed { error: String },
    RowNotFound,
    WriteFailed { row: usize, price: Decimal, error: String },
}

impl CurrencyOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, CurrencyOutcome::Written { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            CurrencyOutcome::Written { .. } => "written",
            CurrencyOutcome::NoPrice => "no price",
            CurrencyOutcome::FetchFailed { .. } => "fetch failed",
            CurrencyOutcome::RowNotFound => "row not found",
            CurrencyOutcome::WriteFailed { .. } => "write failed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CurrencyResult {
    pub currency: String,
    #[serde(flatten)]
    pub outcome: CurrencyOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct TabReport {
    pub tab: String,
    pub side: TradeSide,
    pub column: usize,
    pub column_letter: String,
    pub results: Vec<CurrencyResult>,
}

impl TabReport {
    pub fn written(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_written()).count()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub date: NaiveDate,
    pub source: String,
    pub tabs: Vec<TabReport>,
}

impl RunReport {
    pub fn written(&self) -> usize {
        self.tabs.iter().map(TabReport::written).sum()
    }

    pub fn skipped(&self) -> usize {
        self.tabs.iter().map(|t| t.results.len()).sum::<usize>() - self.written()
    }
}

/// Runs one update against a spreadsheet with a price source
pub struct RateUpdater<'a> {
    sheet: &'a dyn Spreadsheet,
    prices: &'a dyn PriceSource,
    config: &'a Config,
}

impl<'a> RateUpdater<'a> {
    pub fn new(
        sheet: &'a dyn Spreadsheet,
        prices: &'a dyn PriceSource,
        config: &'a Config,
    ) -> Self {
        Self {
            sheet,
            prices,
            config,
        }
    }

    /// Update both tabs for `date`, buy tab first
    pub async fn run(&self, date: NaiveDate) -> Result<RunReport> {
        info!(
            "Updating {} currencies for {} using {}",
            self.config.currencies.len(),
            date,
            self.prices.name()
        );

        // Read every tab before writing anything, so an unreachable tab
        // aborts the run with the spreadsheet untouched
        let mut snapshots = Vec::new();
        for (tab, side) in self.config.tabs.ordered() {
            let grid = self
                .sheet
                .get_all_values(tab)
                .await
                .with_context(|| format!("Failed to read tab {}", tab))?;
            snapshots.push((tab, side, grid));
        }

        let mut tabs = Vec::new();
        for (tab, side, grid) in snapshots {
            tabs.push(self.update_tab(tab, side, &grid, date).await?);
        }

        let report = RunReport {
            date,
            source: self.prices.name().to_string(),
            tabs,
        };
        info!(
            "Data retrieval and update complete: {} written, {} skipped",
            report.written(),
            report.skipped()
        );
        Ok(report)
    }

    async fn update_tab(
        &self,
        tab: &str,
        side: TradeSide,
        grid: &Grid,
        date: NaiveDate,
    ) -> Result<TabReport> {
        let column = sheet::first_empty_column(grid);
        let column_letter = sheet::column_letter(column)?;
        info!("Tab {}: writing {} prices into column {}", tab, side, column_letter);

        self.sheet
            .update_cell(tab, 1, column, CellValue::Text(date.format("%Y-%m-%d").to_string()))
            .await
            .with_context(|| format!("Failed to write date header in tab {}", tab))?;

        let mut results = Vec::with_capacity(self.config.currencies.len());
        for currency in &self.config.currencies {
            info!("Processing {} sheet for {}...", tab, currency);
            let outcome = self.update_currency(tab, side, grid, column, currency).await;
            results.push(CurrencyResult {
                currency: currency.clone(),
                outcome,
            });
        }

        Ok(TabReport {
            tab: tab.to_string(),
            side,
            column,
            column_letter,
            results,
        })
    }

    /// Price, locate and write one currency; never fails the run
    async fn update_currency(
        &self,
        tab: &str,
        side: TradeSide,
        grid: &Grid,
        column: usize,
        currency: &str,
    ) -> CurrencyOutcome {
        let price = match self.prices.median_price(currency, side).await {
            Ok(Some(price)) => price,
            Ok(None) => {
                warn!("No valid data to update for {}.", currency);
                return CurrencyOutcome::NoPrice;
            }
            Err(e) => {
                let error = RatesError::PriceSource(format!("{:#}", e));
                warn!("Error fetching data for {}: {}", currency, error);
                return CurrencyOutcome::FetchFailed {
                    error: error.to_string(),
                };
            }
        };

        // Rows never move during a run, so the snapshot taken for the column
        // lookup is good for locating currencies as well
        let row = match sheet::find_row(grid, currency) {
            Ok(row) => row,
            Err(e) => {
                warn!("Currency {} not found in the {} sheet: {}", currency, tab, e);
                return CurrencyOutcome::RowNotFound;
            }
        };

        match self
            .sheet
            .update_cell(tab, row, column, CellValue::Number(price))
            .await
        {
            Ok(()) => {
                info!("Updated {} with median price {}.", currency, price);
                CurrencyOutcome::Written { row, price }
            }
            Err(e) => {
                warn!("Failed to write {} price for {}: {:#}", tab, currency, e);
                CurrencyOutcome::WriteFailed {
                    row,
                    price,
                    error: format!("{:#}", e),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::MemorySpreadsheet;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Canned prices; currencies not listed fail to fetch
    struct FixedPrices {
        prices: HashMap<(String, TradeSide), Option<Decimal>>,
        calls: Mutex<Vec<(String, TradeSide)>>,
    }

    impl FixedPrices {
        fn new(entries: &[(&str, TradeSide, Option<Decimal>)]) -> Self {
            Self {
                prices: entries
                    .iter()
                    .map(|(c, s, p)| ((c.to_string(), *s), *p))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PriceSource for FixedPrices {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn median_price(&self, currency: &str, side: TradeSide) -> Result<Option<Decimal>> {
            self.calls.lock().unwrap().push((currency.to_string(), side));
            self.prices
                .get(&(currency.to_string(), side))
                .copied()
                .ok_or_else(|| anyhow!("connection reset"))
        }
    }

    fn tab(rows: &[&[&str]]) -> Grid {
        rows.iter()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    fn config_for(currencies: &[&str]) -> Config {
        Config {
            currencies: currencies.iter().map(|c| c.to_string()).collect(),
            ..Config::default()
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
    }

    #[tokio::test]
    async fn test_absent_price_skips_cell_and_run_completes() {
        let sheet = MemorySpreadsheet::new()
            .with_tab("BUY", tab(&[&["", "2024-01-01"], &["EGP", "50"], &["KES", "4.0"]]))
            .with_tab("SELL", tab(&[&["", "2024-01-01"], &["EGP", "51"], &["KES", "4.1"]]));
        let prices = FixedPrices::new(&[
            ("EGP", TradeSide::Buy, None),
            ("KES", TradeSide::Buy, Some(dec!(4.2))),
            ("EGP", TradeSide::Sell, None),
            ("KES", TradeSide::Sell, Some(dec!(4.3))),
        ]);
        let config = config_for(&["EGP", "KES"]);

        let report = RateUpdater::new(&sheet, &prices, &config)
            .run(date())
            .await
            .unwrap();

        assert_eq!(sheet.cell("BUY", 1, 3).as_deref(), Some("2024-01-02"));
        assert_eq!(sheet.cell("BUY", 2, 3), None);
        assert_eq!(sheet.cell("BUY", 3, 3).as_deref(), Some("4.2"));
        assert_eq!(sheet.cell("SELL", 3, 3).as_deref(), Some("4.3"));

        let buy = &report.tabs[0];
        assert_eq!(buy.tab, "BUY");
        assert_eq!(buy.column, 3);
        assert_eq!(buy.column_letter, "C");
        assert_eq!(buy.results[0].outcome, CurrencyOutcome::NoPrice);
        assert_eq!(
            buy.results[1].outcome,
            CurrencyOutcome::Written {
                row: 3,
                price: dec!(4.2)
            }
        );
        assert_eq!(report.written(), 2);
        assert_eq!(report.skipped(), 2);
    }

    #[tokio::test]
    async fn test_fetch_error_and_missing_row_are_isolated() {
        let sheet = MemorySpreadsheet::new()
            .with_tab("BUY", tab(&[&[""], &["ETB"], &["KES"]]))
            .with_tab("SELL", tab(&[&[""], &["ETB"], &["KES"]]));
        let prices = FixedPrices::new(&[
            ("NGN", TradeSide::Buy, Some(dec!(1500))),
            ("KES", TradeSide::Buy, Some(dec!(129))),
            ("NGN", TradeSide::Sell, Some(dec!(1490))),
            ("KES", TradeSide::Sell, Some(dec!(128))),
        ]);
        let config = config_for(&["ETB", "NGN", "KES"]);

        let report = RateUpdater::new(&sheet, &prices, &config)
            .run(date())
            .await
            .unwrap();

        for tab_report in &report.tabs {
            let outcomes: Vec<&str> = tab_report
                .results
                .iter()
                .map(|r| r.outcome.label())
                .collect();
            assert_eq!(outcomes, vec!["fetch failed", "row not found", "written"]);
            assert_eq!(tab_report.column, 2);
        }
        assert_eq!(sheet.cell("BUY", 3, 2).as_deref(), Some("129"));
        assert_eq!(sheet.cell("SELL", 3, 2).as_deref(), Some("128"));
    }

    #[tokio::test]
    async fn test_fixed_processing_order() {
        let sheet = MemorySpreadsheet::new()
            .with_tab("BUY", tab(&[&[""], &["ETB"], &["KES"]]))
            .with_tab("SELL", tab(&[&[""], &["ETB"], &["KES"]]));
        let prices = FixedPrices::new(&[]);
        let config = config_for(&["KES", "ETB"]);

        RateUpdater::new(&sheet, &prices, &config)
            .run(date())
            .await
            .unwrap();

        let calls = prices.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                ("KES".to_string(), TradeSide::Buy),
                ("ETB".to_string(), TradeSide::Buy),
                ("KES".to_string(), TradeSide::Sell),
                ("ETB".to_string(), TradeSide::Sell),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_tab_aborts_run() {
        let sheet = MemorySpreadsheet::new().with_tab("BUY", tab(&[&[""], &["KES"]]));
        let prices = FixedPrices::new(&[("KES", TradeSide::Buy, Some(dec!(129)))]);
        let config = config_for(&["KES"]);

        let err = RateUpdater::new(&sheet, &prices, &config)
            .run(date())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("SELL"));
        assert!(matches!(
            err.downcast_ref::<RatesError>(),
            Some(RatesError::SpreadsheetAccess(_))
        ));
        assert_eq!(sheet.tab("BUY").unwrap(), tab(&[&[""], &["KES"]]));
        assert!(prices.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_two_runs_same_day_use_two_columns() {
        let sheet = MemorySpreadsheet::new()
            .with_tab("BUY", tab(&[&[""], &["KES"]]))
            .with_tab("SELL", tab(&[&[""], &["KES"]]));
        let prices = FixedPrices::new(&[
            ("KES", TradeSide::Buy, Some(dec!(129))),
            ("KES", TradeSide::Sell, Some(dec!(128))),
        ]);
        let config = config_for(&["KES"]);
        let updater = RateUpdater::new(&sheet, &prices, &config);

        let first = updater.run(date()).await.unwrap();
        let second = updater.run(date()).await.unwrap();

        assert_eq!(first.tabs[0].column, 2);
        assert_eq!(second.tabs[0].column, 3);
        assert_eq!(
            sheet.tab("BUY").unwrap()[0],
            vec!["", "2024-01-02", "2024-01-02"]
        );
    }
}
