// Web scraping module for reading offers off the P2P trade pages
// Uses headless Chrome since the offer list is rendered client-side

pub mod binance;

pub use binance::BinanceP2pBrowser;
