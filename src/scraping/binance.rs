// Scraper for p2p.binance.com trade pages
//
// Loads the trade page for one fiat and side in headless Chrome, waits for
// the offer list to render and reads the advertised prices from the DOM.
// The Chrome process belongs to `BinanceP2pBrowser` and is killed when the
// scraper is dropped.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions};
use rust_decimal::Decimal;
use scraper::{Html, Selector};
use std::ffi::OsStr;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::pricing::{median_of_offers, PriceSource, TradeSide};

/// Price source that scrapes the P2P website
///
/// Clones share the same Chrome process.
#[derive(Clone)]
pub struct BinanceP2pBrowser {
    browser: Browser,
    base_url: String,
    asset: String,
    price_selector: String,
    wait: Duration,
    sample_size: usize,
}

impl BinanceP2pBrowser {
    /// Launch headless Chrome for the lifetime of this scraper
    pub fn launch(config: &Config) -> Result<Self> {
        info!("Launching headless Chrome browser");

        // Fail on a bad selector before paying for a browser launch
        parse_selector(&config.browser.price_selector)?;

        let options = LaunchOptions {
            headless: true,
            sandbox: config.browser.sandbox,
            window_size: Some((1200, 1200)),
            args: vec![
                OsStr::new("--disable-blink-features=AutomationControlled"),
                OsStr::new("--user-agent=Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"),
                OsStr::new("--disable-dev-shm-usage"),
            ],
            ..Default::default()
        };

        let browser = Browser::new(options)
            .context("Failed to launch headless Chrome. Is Chrome/Chromium installed?")?;

        Ok(Self {
            browser,
            base_url: config.browser.base_url.trim_end_matches('/').to_string(),
            asset: config.asset.clone(),
            price_selector: config.browser.price_selector.clone(),
            wait: Duration::from_secs(config.browser.wait_secs),
            sample_size: config.sample_size,
        })
    }

    /// Trade page listing offers for one fiat and side
    pub fn trade_url(base_url: &str, asset: &str, side: TradeSide, fiat: &str) -> String {
        format!(
            "{}/trade/{}/{}?fiat={}&payment=all-payments",
            base_url.trim_end_matches('/'),
            side.as_str(),
            asset,
            fiat
        )
    }

    /// Scrape advertised prices from the trade page, in listing order
    pub fn scrape_offer_prices(&self, fiat: &str, side: TradeSide) -> Result<Vec<String>> {
        let url = Self::trade_url(&self.base_url, &self.asset, side, fiat);
        info!("Scraping {} offers for {} from: {}", side, fiat, url);

        let tab = self
            .browser
            .new_tab()
            .context("Failed to create new browser tab")?;

        let html = close_after(
            || {
                tab.navigate_to(&url).context("Failed to navigate to URL")?;
                tab.wait_for_element_with_custom_timeout(&self.price_selector, self.wait)
                    .with_context(|| format!("Timed out waiting for offers for {}", fiat))?;
                tab.get_content().context("Failed to get page content")
            },
            || tab.close(true).map(|_| ()).map_err(anyhow::Error::from),
        )?;

        let prices = parse_offer_prices(&html, &self.price_selector)?;
        debug!("{} {} offers: {:?}", fiat, side, prices);
        Ok(prices)
    }
}

/// Run `load`, then `close` whatever `load` returned.
///
/// A failed close is only logged; the load result wins.
fn close_after<T>(
    load: impl FnOnce() -> Result<T>,
    close: impl FnOnce() -> Result<()>,
) -> Result<T> {
    let result = load();
    if let Err(e) = close() {
        warn!("Failed to close browser tab: {}", e);
    }
    result
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| anyhow!("Invalid price selector {:?}: {:?}", selector, e))
}

/// Text of every element matching `selector`, trimmed, in document order
pub fn parse_offer_prices(html: &str, selector: &str) -> Result<Vec<String>> {
    let selector = parse_selector(selector)?;
    let document = Html::parse_document(html);

    Ok(document
        .select(&selector)
        .map(|element| element.text().collect::<String>().trim().to_string())
        .collect())
}

#[async_trait]
impl PriceSource for BinanceP2pBrowser {
    fn name(&self) -> &'static str {
        "binance-p2p-browser"
    }

    async fn median_price(&self, currency: &str, side: TradeSide) -> Result<Option<Decimal>> {
        // headless_chrome blocks; keep it off the runtime thread
        let scraper = self.clone();
        let currency = currency.to_string();

        let offers =
            tokio::task::spawn_blocking(move || scraper.scrape_offer_prices(&currency, side))
                .await
                .context("Browser scrape task panicked")??;

        Ok(median_of_offers(&offers, self.sample_size))
    }
}
