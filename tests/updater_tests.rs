//! Integration tests for the rate updater
//!
//! These drive a full run against a CSV workbook on disk with a canned price
//! source:
//! - first empty column resolution on a real tab
//! - absent prices leave cells empty without failing the run
//! - repeated runs on the same day append new columns

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use p2p_rates::config::Config;
use p2p_rates::pricing::{PriceSource, TradeSide};
use p2p_rates::sheet::{first_empty_column, CsvWorkbook, Spreadsheet};
use p2p_rates::updater::{CurrencyOutcome, RateUpdater};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use tempfile::TempDir;

/// Price source answering from a table; unknown currencies fail to fetch
struct TablePrices(HashMap<(&'static str, TradeSide), Option<Decimal>>);

#[async_trait]
impl PriceSource for TablePrices {
    fn name(&self) -> &'static str {
        "table"
    }

    async fn median_price(&self, currency: &str, side: TradeSide) -> Result<Option<Decimal>> {
        self.0
            .iter()
            .find(|((c, s), _)| *c == currency && *s == side)
            .map(|(_, price)| *price)
            .ok_or_else(|| anyhow!("no route to host"))
    }
}

fn create_workbook(tab_content: &str) -> Result<(TempDir, CsvWorkbook)> {
    let dir = TempDir::new()?;
    std::fs::write(dir.path().join("BUY.csv"), tab_content)?;
    std::fs::write(dir.path().join("SELL.csv"), tab_content)?;
    let workbook = CsvWorkbook::open(dir.path())?;
    Ok((dir, workbook))
}

fn config_for(currencies: &[&str]) -> Config {
    Config {
        currencies: currencies.iter().map(|c| c.to_string()).collect(),
        ..Config::default()
    }
}

fn run_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
}

#[tokio::test]
async fn test_first_empty_column_of_dated_tab() -> Result<()> {
    let (_dir, workbook) = create_workbook(",2024-01-01\nETB,5.0\n")?;
    let grid = workbook.get_all_values("BUY").await?;
    assert_eq!(first_empty_column(&grid), 3);
    Ok(())
}

#[tokio::test]
async fn test_absent_price_is_skipped_and_present_price_written() -> Result<()> {
    let (dir, workbook) = create_workbook(",2024-01-01\nEGP,48.9\nKES,4.1\n")?;
    let prices = TablePrices(HashMap::from([
        (("EGP", TradeSide::Buy), None),
        (("KES", TradeSide::Buy), Some(dec!(4.2))),
        (("EGP", TradeSide::Sell), None),
        (("KES", TradeSide::Sell), Some(dec!(4.3))),
    ]));
    let config = config_for(&["EGP", "KES"]);

    let report = RateUpdater::new(&workbook, &prices, &config)
        .run(run_date())
        .await?;

    let buy = workbook.get_all_values("BUY").await?;
    assert_eq!(buy[0], vec!["", "2024-01-01", "2024-01-02"]);
    assert_eq!(buy[1], vec!["EGP", "48.9"]);
    assert_eq!(buy[2], vec!["KES", "4.1", "4.2"]);

    let sell = std::fs::read_to_string(dir.path().join("SELL.csv"))?;
    assert!(sell.contains("KES,4.1,4.3"));

    assert_eq!(report.tabs[0].results[0].outcome, CurrencyOutcome::NoPrice);
    assert!(report.tabs[0].results[1].outcome.is_written());
    assert_eq!(report.written(), 2);
    Ok(())
}

#[tokio::test]
async fn test_unknown_currency_and_fetch_error_do_not_stop_the_run() -> Result<()> {
    let (_dir, workbook) = create_workbook(",2024-01-01\nETB,5.0\nKES,129\n")?;
    let prices = TablePrices(HashMap::from([
        (("ZAR", TradeSide::Buy), Some(dec!(18.7))),
        (("KES", TradeSide::Buy), Some(dec!(130))),
        (("ZAR", TradeSide::Sell), Some(dec!(18.5))),
        (("KES", TradeSide::Sell), Some(dec!(128))),
    ]));
    let config = config_for(&["ETB", "ZAR", "KES"]);

    let report = RateUpdater::new(&workbook, &prices, &config)
        .run(run_date())
        .await?;

    let buy = &report.tabs[0];
    assert!(matches!(
        buy.results[0].outcome,
        CurrencyOutcome::FetchFailed { .. }
    ));
    assert_eq!(buy.results[1].outcome, CurrencyOutcome::RowNotFound);
    assert_eq!(
        buy.results[2].outcome,
        CurrencyOutcome::Written {
            row: 3,
            price: dec!(130)
        }
    );

    let grid = workbook.get_all_values("SELL").await?;
    assert_eq!(grid[2], vec!["KES", "129", "128"]);
    Ok(())
}

#[tokio::test]
async fn test_same_day_reruns_append_columns() -> Result<()> {
    let (_dir, workbook) = create_workbook(",2024-01-01\nKES,129\n")?;
    let prices = TablePrices(HashMap::from([
        (("KES", TradeSide::Buy), Some(dec!(130))),
        (("KES", TradeSide::Sell), Some(dec!(128))),
    ]));
    let config = config_for(&["KES"]);
    let updater = RateUpdater::new(&workbook, &prices, &config);

    let first = updater.run(run_date()).await?;
    let second = updater.run(run_date()).await?;

    assert_eq!(first.tabs[0].column_letter, "C");
    assert_eq!(second.tabs[0].column_letter, "D");

    let grid = workbook.get_all_values("BUY").await?;
    assert_eq!(grid[0], vec!["", "2024-01-01", "2024-01-02", "2024-01-02"]);
    assert_eq!(grid[1], vec!["KES", "129", "130", "130"]);
    Ok(())
}

#[tokio::test]
async fn test_custom_tab_names() -> Result<()> {
    let dir = TempDir::new()?;
    std::fs::write(dir.path().join("Compra.csv"), ",\nKES,\n")?;
    std::fs::write(dir.path().join("Venda.csv"), ",\nKES,\n")?;
    let workbook = CsvWorkbook::open(dir.path())?;

    let mut config = config_for(&["KES"]);
    config.tabs.buy = "Compra".to_string();
    config.tabs.sell = "Venda".to_string();
    let prices = TablePrices(HashMap::from([
        (("KES", TradeSide::Buy), Some(dec!(130))),
        (("KES", TradeSide::Sell), Some(dec!(128))),
    ]));

    let report = RateUpdater::new(&workbook, &prices, &config)
        .run(run_date())
        .await?;

    assert_eq!(report.tabs[0].tab, "Compra");
    assert_eq!(report.tabs[1].tab, "Venda");
    assert_eq!(report.tabs[1].side, TradeSide::Sell);
    assert_eq!(workbook.get_all_values("Venda").await?[1], vec!["KES", "128"]);
    Ok(())
}
