//! Command dispatcher that routes parsed CLI commands to the library.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use colored::Colorize;
use p2p_rates::config::Config;
use p2p_rates::error::RatesError;
use p2p_rates::pricing::{self, SourceKind, TradeSide};
use p2p_rates::sheet::{self, CsvWorkbook, GoogleSheets, MemorySpreadsheet, Spreadsheet};
use p2p_rates::updater::RateUpdater;
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

use crate::cli::{formatters, Commands, SheetCommands};

/// Route a parsed command to its handler
pub async fn dispatch_command(command: Commands, config: Config, json_output: bool) -> Result<()> {
    match command {
        Commands::Update {
            source,
            workbook,
            date,
            dry_run,
        } => dispatch_update(&config, source, workbook, date, dry_run, json_output).await,
        Commands::Fetch {
            currency,
            side,
            source,
        } => dispatch_fetch(&config, &currency, side, source, json_output).await,
        Commands::Sheet { action } => dispatch_sheet(&config, action, json_output).await,
        Commands::Currencies => {
            if json_output {
                println!("{}", serde_json::to_string_pretty(&config.currencies)?);
            } else {
                for (i, code) in config.currencies.iter().enumerate() {
                    println!("{:>3}. {}", i + 1, code);
                }
            }
            Ok(())
        }
        Commands::Config => {
            if json_output {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                print!("{}", toml::to_string_pretty(&config)?);
            }
            Ok(())
        }
    }
}

fn parse_date(date: Option<&str>) -> Result<NaiveDate> {
    match date {
        Some(d) => NaiveDate::parse_from_str(d, "%Y-%m-%d").map_err(|_| {
            RatesError::InvalidArgument(format!("invalid date {:?}, expected YYYY-MM-DD", d)).into()
        }),
        None => Ok(Local::now().date_naive()),
    }
}

/// Open the spreadsheet a command works on
async fn open_spreadsheet(
    config: &Config,
    workbook: Option<PathBuf>,
) -> Result<Box<dyn Spreadsheet>> {
    match workbook {
        Some(dir) => {
            info!("Using local workbook {}", dir.display());
            Ok(Box::new(CsvWorkbook::open(dir)?))
        }
        None => {
            info!("Setting up credentials and spreadsheet...");
            let sheets = GoogleSheets::open(&config.spreadsheet)
                .await
                .context("Failed to open spreadsheet")?;
            Ok(Box::new(sheets))
        }
    }
}

async fn dispatch_update(
    config: &Config,
    source: Option<SourceKind>,
    workbook: Option<PathBuf>,
    date: Option<String>,
    dry_run: bool,
    json_output: bool,
) -> Result<()> {
    let date = parse_date(date.as_deref())?;

    // Spreadsheet first: credential problems should fail before Chrome starts
    let spreadsheet = open_spreadsheet(config, workbook).await?;
    let prices = pricing::build_source(config, source.unwrap_or(config.source))?;

    let report = if dry_run {
        let snapshot = MemorySpreadsheet::new();
        for (tab, _) in config.tabs.ordered() {
            let grid = spreadsheet
                .get_all_values(tab)
                .await
                .with_context(|| format!("Failed to read tab {}", tab))?;
            snapshot.insert_tab(tab, grid);
        }
        RateUpdater::new(&snapshot, prices.as_ref(), config)
            .run(date)
            .await?
    } else {
        RateUpdater::new(spreadsheet.as_ref(), prices.as_ref(), config)
            .run(date)
            .await?
    };

    // Dropping the source here shuts down the browser, if one was launched
    drop(prices);

    if json_output {
        println!("{}", formatters::format_run_json(&report));
    } else {
        print!("{}", formatters::format_run_table(&report, dry_run));
    }
    Ok(())
}

async fn dispatch_fetch(
    config: &Config,
    currency: &str,
    side: TradeSide,
    source: Option<SourceKind>,
    json_output: bool,
) -> Result<()> {
    let prices = pricing::build_source(config, source.unwrap_or(config.source))?;
    let median = prices
        .median_price(currency, side)
        .await
        .map_err(|e| RatesError::PriceSource(format!("{:#}", e)))?;

    if json_output {
        let value = json!({
            "currency": currency,
            "side": side,
            "asset": config.asset,
            "median": median,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        match median {
            Some(price) => println!(
                "{} {} {}/{} median: {}",
                "✓".green().bold(),
                side,
                config.asset,
                currency,
                price.normalize()
            ),
            None => println!(
                "{} No numeric {} offers for {}/{}",
                "ℹ".blue().bold(),
                side,
                config.asset,
                currency
            ),
        }
    }
    Ok(())
}

async fn dispatch_sheet(config: &Config, action: SheetCommands, json_output: bool) -> Result<()> {
    match action {
        SheetCommands::NextColumn { tab, workbook } => {
            let spreadsheet = open_spreadsheet(config, workbook).await?;
            let grid = spreadsheet.get_all_values(&tab).await?;
            let column = sheet::first_empty_column(&grid);
            let letter = sheet::column_letter(column)?;
            if json_output {
                let value = json!({ "tab": tab, "column": column, "column_letter": letter });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("{}: next column {} ({})", tab, column, letter);
            }
            Ok(())
        }
        SheetCommands::Find { key, tab, workbook } => {
            let spreadsheet = open_spreadsheet(config, workbook).await?;
            let row = spreadsheet.find_row(&tab, &key).await?;
            if json_output {
                let value = json!({ "tab": tab, "key": key, "row": row });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("{}: {} is in row {}", tab, key, row);
            }
            Ok(())
        }
        SheetCommands::Letter { column } => {
            let letter = sheet::column_letter(column)?;
            if json_output {
                println!("{}", json!({ "column": column, "column_letter": letter }));
            } else {
                println!("{}", letter);
            }
            Ok(())
        }
    }
}
