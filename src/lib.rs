//! p2p-rates - daily P2P exchange rates into a shared spreadsheet
//!
//! This library fetches median USDT buy/sell prices for a list of fiat
//! currencies from Binance P2P (REST API or headless browser) and records
//! them in a dated column of a spreadsheet, one tab per trade side.

pub mod config;
pub mod error;
pub mod pricing;
pub mod scraping;
pub mod sheet;
pub mod updater;
