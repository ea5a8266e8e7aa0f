use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{Rawfloat, Trade};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Depth {
    #[serde(default)]
    pub amount: Rawfloat,
    #[serde(default)]
    pub price: Rawfloat,
}

/// Order book of a pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketDepths {
    #[serde(default)]
    pub pair: String,
    #[serde(default)]
    pub asks: Vec<Depth>,
    #[serde(default)]
    pub bids: Vec<Depth>,
}

impl MarketDepths {
    pub fn ask_by_price(&self, price: Rawfloat) -> Option<&Depth> {
        self.asks.iter().find(|d| d.price == price)
    }

    pub fn bid_by_price(&self, price: Rawfloat) -> Option<&Depth> {
        self.bids.iter().find(|d| d.price == price)
    }

    pub fn best_ask(&self) -> Option<&Depth> {
        self.asks.iter().min_by_key(|d| d.price)
    }

    pub fn best_bid(&self) -> Option<&Depth> {
        self.bids.iter().max_by_key(|d| d.price)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketInfo {
    #[serde(default)]
    pub price_minimum: Rawfloat,
    #[serde(default)]
    pub amount_minimum: Rawfloat,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub coin_asset: String,
    #[serde(default)]
    pub base_asset: String,
    #[serde(default)]
    pub price_precision: u32,
    #[serde(default)]
    pub amount_precision: u32,
    #[serde(default)]
    pub is_active: bool,
}

/// Latest price per pair.
pub type MarketPrices = HashMap<String, Rawfloat>;

/// 24 hour ticker of a pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    #[serde(default)]
    pub pair: String,
    #[serde(default)]
    pub bid: Rawfloat,
    #[serde(default)]
    pub ask: Rawfloat,
    #[serde(default)]
    pub high: Rawfloat,
    #[serde(default)]
    pub low: Rawfloat,
    #[serde(default)]
    pub last_price: Rawfloat,
    #[serde(default)]
    pub volume_base: Rawfloat,
    #[serde(default)]
    pub volume_coin: Rawfloat,
}

pub type MarketTicker = Tick;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketSummaries {
    #[serde(default)]
    pub prices: HashMap<String, Rawfloat>,
    #[serde(default)]
    pub prices_24h: HashMap<String, Rawfloat>,
    #[serde(default)]
    pub prices_7d: HashMap<String, Rawfloat>,
    #[serde(default)]
    pub prices_changes: HashMap<String, Rawfloat>,
    #[serde(default)]
    pub tickers: HashMap<String, Tick>,
}

/// Completed trades of a pair, grouped by side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketTrades {
    #[serde(default)]
    pub asks: Vec<Trade>,
    #[serde(default)]
    pub bids: Vec<Trade>,
}

/// Open trades grouped by side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradesOpen {
    #[serde(default)]
    pub asks: Vec<Trade>,
    #[serde(default)]
    pub bids: Vec<Trade>,
}

impl TradesOpen {
    pub fn len(&self) -> usize {
        self.asks.len() + self.bids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub type PairTradesOpen = HashMap<String, TradesOpen>;

/// Topics a public WebSocket connection is subscribed to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicSubscription {
    #[serde(default)]
    pub depths: Vec<String>,
    #[serde(default)]
    pub ticker: Vec<String>,
    #[serde(default)]
    pub trades: Vec<String>,
    #[serde(default)]
    pub summaries: bool,
}
