use clap::{Parser, Subcommand};
use p2p_rates::pricing::{SourceKind, TradeSide};
use std::path::PathBuf;

pub mod formatters;

#[derive(Parser)]
#[command(name = "p2p-rates")]
#[command(
    version,
    about = "Record daily Binance P2P USDT rates for African currencies in a spreadsheet"
)]
#[command(
    long_about = "Fetch the median of the top P2P offers for each configured currency, buy and sell side, and write them into the first empty column of the BUY and SELL tabs of a shared spreadsheet."
)]
pub struct Cli {
    /// Disable colorized/ANSI output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Output results in JSON format
    #[arg(long = "json", global = true)]
    pub json: bool,

    /// Config file (default: <config dir>/p2p-rates/config.toml)
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch all prices and write them into a new dated column
    Update {
        /// Price source (overrides config)
        #[arg(short, long, value_enum)]
        source: Option<SourceKind>,

        /// Use a directory of <TAB>.csv files instead of Google Sheets
        #[arg(short, long)]
        workbook: Option<PathBuf>,

        /// Column date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,

        /// Run against a snapshot of the tabs and print what would be written
        #[arg(short = 'n', long)]
        dry_run: bool,
    },

    /// Fetch the median price for one currency without touching the sheet
    Fetch {
        /// Fiat currency code (e.g., KES)
        currency: String,

        #[arg(long, value_enum, default_value_t = TradeSide::Buy)]
        side: TradeSide,

        /// Price source (overrides config)
        #[arg(short, long, value_enum)]
        source: Option<SourceKind>,
    },

    /// Inspect spreadsheet tabs
    Sheet {
        #[command(subcommand)]
        action: SheetCommands,
    },

    /// List configured currencies in processing order
    Currencies,

    /// Print the effective configuration as TOML
    Config,
}

#[derive(Subcommand)]
pub enum SheetCommands {
    /// Show the column the next update would write into
    NextColumn {
        /// Tab name (e.g., BUY)
        #[arg(short, long)]
        tab: String,

        /// Use a directory of <TAB>.csv files instead of Google Sheets
        #[arg(short, long)]
        workbook: Option<PathBuf>,
    },

    /// Show the row holding a currency code
    Find {
        /// Currency code in the key column
        key: String,

        #[arg(short, long)]
        tab: String,

        /// Use a directory of <TAB>.csv files instead of Google Sheets
        #[arg(short, long)]
        workbook: Option<PathBuf>,
    },

    /// Convert a 1-based column number to its letter label
    Letter {
        column: usize,
    },
}
