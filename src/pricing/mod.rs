// Pricing module - median P2P offer prices per currency and side

pub mod binance;

use anyhow::Result;
use async_trait::async_trait;
use clap::ValueEnum;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use binance::BinanceP2pApi;

use crate::config::Config;
use crate::scraping::BinanceP2pBrowser;

/// Plain decimal number once thousands separators are removed
static PRICE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+(\.\d*)?$").expect("price pattern is valid"));

/// Which side of the order book a price belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "buy",
            TradeSide::Sell => "sell",
        }
    }

    /// Name used by the P2P API `tradeType` field
    pub fn api_name(&self) -> &'static str {
        match self {
            TradeSide::Buy => "BUY",
            TradeSide::Sell => "SELL",
        }
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Price backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// P2P REST endpoint
    Api,
    /// Headless Chrome scrape of the trade page
    Browser,
}

/// Something that can quote a median P2P price.
///
/// `Ok(None)` means the source answered but had no usable numeric offers;
/// `Err` means the fetch itself failed.
#[async_trait]
pub trait PriceSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn median_price(&self, currency: &str, side: TradeSide) -> Result<Option<Decimal>>;
}

/// Build the configured backend.
///
/// The browser backend owns a Chrome process that is shut down when the
/// returned box is dropped.
pub fn build_source(config: &Config, kind: SourceKind) -> Result<Box<dyn PriceSource>> {
    match kind {
        SourceKind::Api => Ok(Box::new(BinanceP2pApi::new(config)?)),
        SourceKind::Browser => Ok(Box::new(BinanceP2pBrowser::launch(config)?)),
    }
}

/// Parse an advertised price like `"1,234.50"`; anything else is `None`
pub fn parse_advertised_price(text: &str) -> Option<Decimal> {
    let cleaned = text.trim().replace(',', "");
    if !PRICE_PATTERN.is_match(&cleaned) {
        return None;
    }
    Decimal::from_str(cleaned.trim_end_matches('.')).ok()
}

/// Median of a set of prices; the mean of the two middle values when even
pub fn median(prices: &[Decimal]) -> Option<Decimal> {
    if prices.is_empty() {
        return None;
    }
    let mut sorted = prices.to_vec();
    sorted.sort();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        let (low, high) = (sorted[mid - 1], sorted[mid]);
        // The sum only overflows when both share a sign, and then the
        // difference cannot
        let mean = low
            .checked_add(high)
            .map(|sum| sum / Decimal::TWO)
            .unwrap_or_else(|| low + (high - low) / Decimal::TWO);
        Some(mean)
    }
}

/// Median over the first `sample_size` listed offers that parse as prices
pub fn median_of_offers<I, S>(offers: I, sample_size: usize) -> Option<Decimal>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let prices: Vec<Decimal> = offers
        .into_iter()
        .take(sample_size)
        .filter_map(|text| parse_advertised_price(text.as_ref()))
        .collect();
    median(&prices)
}
