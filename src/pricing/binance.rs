use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use super::{median_of_offers, PriceSource, TradeSide};
use crate::config::Config;

/// Binance P2P advert search request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    asset: &'a str,
    fiat: &'a str,
    trade_type: &'a str,
    page: u32,
    rows: usize,
    pay_types: Vec<String>,
    publisher_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    code: Option<String>,
    message: Option<String>,
    data: Option<Vec<AdvertEntry>>,
}

#[derive(Debug, Deserialize)]
struct AdvertEntry {
    adv: Advert,
}

#[derive(Debug, Deserialize)]
struct Advert {
    price: String,
}

/// Price source backed by the P2P advert search endpoint
pub struct BinanceP2pApi {
    client: Client,
    endpoint: String,
    asset: String,
    sample_size: usize,
}

impl BinanceP2pApi {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .user_agent("Mozilla/5.0 (compatible; P2pRatesBot/1.0)")
            .timeout(Duration::from_secs(config.api.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: config.api.endpoint.clone(),
            asset: config.asset.clone(),
            sample_size: config.sample_size,
        })
    }

    /// Advertised prices of the top listed offers, in listing order
    pub async fn fetch_offer_prices(&self, fiat: &str, side: TradeSide) -> Result<Vec<String>> {
        info!(
            "Fetching {} {} offers for {} from Binance P2P API",
            side, self.asset, fiat
        );

        let request = SearchRequest {
            asset: &self.asset,
            fiat,
            trade_type: side.api_name(),
            page: 1,
            rows: self.sample_size,
            pay_types: Vec::new(),
            publisher_type: None,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Binance P2P")?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Binance P2P returned error status: {}",
                response.status()
            ));
        }

        let body: SearchResponse = response
            .json()
            .await
            .context("Failed to parse Binance P2P response")?;

        let prices = extract_prices(body)?;
        debug!("{} {} offers: {:?}", fiat, side, prices);
        Ok(prices)
    }
}

fn extract_prices(body: SearchResponse) -> Result<Vec<String>> {
    match body.data {
        Some(entries) => Ok(entries.into_iter().map(|e| e.adv.price).collect()),
        None => Err(anyhow!(
            "Binance P2P API error: {} - {}",
            body.code.unwrap_or_default(),
            body.message.unwrap_or_default()
        )),
    }
}

#[async_trait]
impl PriceSource for BinanceP2pApi {
    fn name(&self) -> &'static str {
        "binance-p2p-api"
    }

    async fn median_price(&self, currency: &str, side: TradeSide) -> Result<Option<Decimal>> {
        let offers = self.fetch_offer_prices(currency, side).await?;
        Ok(median_of_offers(&offers, self.sample_size))
    }
}
