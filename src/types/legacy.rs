//! Response models of the v1 trade API.
//!
//! v1 payloads carry most numbers as strings and name several keys after the
//! assets involved (`vol_ten`, `receive_btc`, `remain_ten`, ...), so the
//! dynamic types below are decoded from a raw JSON object.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::warn;

use super::{Order, Pair, Rawfloat, TradeMethod, TradeResponse, TradeType, User, UserAssets};
use crate::error::ClientError;

type Object = Map<String, Value>;

/// `{"success":1,"return":...}` wrapper of private calls.
#[derive(Debug, Deserialize)]
pub(crate) struct LegacyEnvelope<T> {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub success: i64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub error: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub error_code: String,
    #[serde(rename = "return")]
    pub data: Option<T>,
}

pub(crate) const LEGACY_SUCCESS: i64 = 1;

/// 24 hour ticker of a pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Object")]
pub struct LegacyTicker {
    pub name: String,
    pub high: Rawfloat,
    pub low: Rawfloat,
    pub last: Rawfloat,
    pub buy: Rawfloat,
    pub sell: Rawfloat,
    /// Traded volume keyed by asset, from the `vol_<asset>` fields.
    pub volumes: HashMap<String, Rawfloat>,
}

impl LegacyTicker {
    pub fn volume(&self, asset: &str) -> Rawfloat {
        self.volumes.get(asset).copied().unwrap_or_default()
    }

    pub fn coin_volume(&self) -> Rawfloat {
        self.pair()
            .map(|p| self.volume(p.coin()))
            .unwrap_or_default()
    }

    pub fn base_volume(&self) -> Rawfloat {
        self.pair()
            .map(|p| self.volume(p.base()))
            .unwrap_or_default()
    }

    fn pair(&self) -> Option<Pair> {
        self.name.parse().ok()
    }
}

impl TryFrom<Object> for LegacyTicker {
    type Error = ClientError;

    fn try_from(object: Object) -> Result<Self, Self::Error> {
        let mut ticker = LegacyTicker::default();
        for (key, value) in &object {
            let key = key.to_lowercase();
            match key.as_str() {
                "name" => ticker.name = value_string(value),
                "high" => ticker.high = value_rawfloat(&key, value)?,
                "low" => ticker.low = value_rawfloat(&key, value)?,
                "last" => ticker.last = value_rawfloat(&key, value)?,
                "buy" => ticker.buy = value_rawfloat(&key, value)?,
                "sell" => ticker.sell = value_rawfloat(&key, value)?,
                _ => {
                    let Some(asset) = key.strip_prefix("vol_") else {
                        continue;
                    };
                    if asset.is_empty() || asset.contains('_') {
                        continue;
                    }
                    ticker
                        .volumes
                        .insert(asset.to_string(), value_rawfloat(&key, value)?);
                }
            }
        }
        Ok(ticker)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct LegacyTickerEnvelope {
    pub ticker: LegacyTicker,
}

/// Tickers of every pair plus historical prices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacySummary {
    #[serde(default, alias = "pairs")]
    pub tickers: HashMap<String, LegacyTicker>,
    #[serde(default, deserialize_with = "lenient_prices")]
    pub prices_24h: HashMap<String, Rawfloat>,
    #[serde(default, deserialize_with = "lenient_prices")]
    pub prices_7d: HashMap<String, Rawfloat>,
}

impl LegacySummary {
    /// Names every ticker after its map key when the payload left it empty.
    pub(crate) fn propagate(&mut self) {
        for (name, ticker) in self.tickers.iter_mut() {
            if ticker.name.is_empty() || ticker.name.parse::<Pair>().is_err() {
                ticker.name = name.to_lowercase();
            }
        }
    }
}

/// A completed trade in the public trade list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyTrade {
    #[serde(rename = "tid", default, deserialize_with = "lenient_i64")]
    pub id: i64,
    #[serde(rename = "type", default, deserialize_with = "lenient_string")]
    pub trade_type: String,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub date: i64,
    #[serde(default)]
    pub amount: Rawfloat,
    #[serde(default)]
    pub price: Rawfloat,
}

/// One price level, sent as `[price, amount]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(Rawfloat, Rawfloat)", into = "(Rawfloat, Rawfloat)")]
pub struct LegacyDepth {
    pub price: Rawfloat,
    pub amount: Rawfloat,
}

impl From<(Rawfloat, Rawfloat)> for LegacyDepth {
    fn from((price, amount): (Rawfloat, Rawfloat)) -> Self {
        Self { price, amount }
    }
}

impl From<LegacyDepth> for (Rawfloat, Rawfloat) {
    fn from(depth: LegacyDepth) -> Self {
        (depth.price, depth.amount)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyOrderBook {
    #[serde(rename = "buy", default)]
    pub buys: Vec<LegacyDepth>,
    #[serde(rename = "sell", default)]
    pub sells: Vec<LegacyDepth>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyPrecision {
    #[serde(default)]
    pub price: u32,
    #[serde(default)]
    pub amount: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyMinimum {
    #[serde(default)]
    pub min: Rawfloat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyLimits {
    #[serde(default)]
    pub amount: LegacyMinimum,
    #[serde(default)]
    pub price: LegacyMinimum,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyMarketInfo {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub base: String,
    #[serde(default)]
    pub quote: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub precision: LegacyPrecision,
    #[serde(default)]
    pub limits: LegacyLimits,
}

/// Result of `getInfo`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Object")]
pub struct LegacyUserInfo {
    pub user_id: String,
    pub name: String,
    pub email: String,
    /// Deposit address per asset; assets without one are left out.
    pub address: HashMap<String, String>,
    pub balance: HashMap<String, Rawfloat>,
    pub balance_hold: HashMap<String, Rawfloat>,
}

impl LegacyUserInfo {
    pub fn to_user(&self) -> User {
        User {
            assets: UserAssets {
                balances: self.balance.clone(),
                frozen_balances: self.balance_hold.clone(),
            },
            wallets: self.address.clone(),
            email: self.email.clone(),
            full_name: self.name.clone(),
            id: self.user_id.parse().unwrap_or_default(),
            ..Default::default()
        }
    }
}

impl TryFrom<Object> for LegacyUserInfo {
    type Error = ClientError;

    fn try_from(object: Object) -> Result<Self, Self::Error> {
        let mut info = LegacyUserInfo::default();
        for (key, value) in &object {
            let key = key.to_lowercase();
            match key.as_str() {
                "user_id" => info.user_id = value_string(value),
                "name" => info.name = value_string(value),
                "email" => info.email = value_string(value),
                "address" => {
                    for (asset, addr) in value_object(&key, value)? {
                        let addr = value_string(addr);
                        if !addr.is_empty() {
                            info.address.insert(asset.to_lowercase(), addr);
                        }
                    }
                }
                "balance" => info.balance = value_balances(&key, value)?,
                "balance_hold" => info.balance_hold = value_balances(&key, value)?,
                _ => {}
            }
        }
        Ok(info)
    }
}

/// Result of placing an order with method `trade`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Object")]
pub struct LegacyTradeResponse {
    pub order_id: i64,
    pub receive_asset: String,
    pub receive: Rawfloat,
    /// From `sold_<coin>` on an ask or `spend_<base>` on a bid.
    pub filled_asset: String,
    pub filled: Rawfloat,
    pub remain_asset: String,
    pub remain: Rawfloat,
    pub balances: HashMap<String, Rawfloat>,
}

impl LegacyTradeResponse {
    /// Converts to the v2 model, filling what v1 leaves out from the request.
    pub fn to_trade_response(
        &self,
        trade_type: TradeType,
        method: TradeMethod,
        amount: Rawfloat,
        price: Rawfloat,
    ) -> TradeResponse {
        let mut order = Order {
            id: self.order_id,
            order_type: Some(trade_type),
            method: Some(method),
            price,
            amount_coin: amount,
            ..Default::default()
        };
        match trade_type {
            TradeType::Buy => {
                order.amount_base = amount.checked_mul(price).unwrap_or_else(|| {
                    warn!("Order {} base amount {} * {} overflows", self.order_id, amount, price);
                    Rawfloat::ZERO
                });
                order.filled_coin = self.receive;
                order.filled_base = self.filled;
                order.remain_base = self.remain;
            }
            TradeType::Sell => {
                order.amount_base = self.receive;
                order.filled_coin = self.filled;
                order.remain_coin = self.remain;
            }
        }

        TradeResponse {
            order: Some(order),
            user: User {
                assets: split_frozen(&self.balances),
                ..Default::default()
            },
            deals: Vec::new(),
        }
    }
}

impl TryFrom<Object> for LegacyTradeResponse {
    type Error = ClientError;

    fn try_from(object: Object) -> Result<Self, Self::Error> {
        let mut res = LegacyTradeResponse::default();
        for (key, value) in &object {
            let key = key.to_lowercase();
            match key.as_str() {
                "order_id" => res.order_id = value_i64(&key, value)?,
                "balance" => res.balances = value_balances(&key, value)?,
                "success" | "is_error" | "error" | "error_code" => {}
                _ => {
                    if let Some(asset) = key.strip_prefix("receive_") {
                        res.receive_asset = asset.to_string();
                        res.receive = value_rawfloat(&key, value)?;
                    } else if let Some(asset) = key
                        .strip_prefix("sold_")
                        .or_else(|| key.strip_prefix("spend_"))
                    {
                        res.filled_asset = asset.to_string();
                        res.filled = value_rawfloat(&key, value)?;
                    } else if let Some(asset) = key.strip_prefix("remain_") {
                        res.remain_asset = asset.to_string();
                        res.remain = value_rawfloat(&key, value)?;
                    }
                }
            }
        }
        Ok(res)
    }
}

/// Result of `cancelOrder`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Object")]
pub struct LegacyCancelOrder {
    pub order_id: i64,
    #[serde(rename = "type")]
    pub order_type: String,
    pub pair: String,
    pub balance: HashMap<String, Rawfloat>,
}

impl LegacyCancelOrder {
    pub fn to_trade_response(&self) -> TradeResponse {
        TradeResponse {
            order: Some(Order {
                id: self.order_id,
                order_type: self.order_type.parse().ok(),
                status: super::TRADE_STATUS_CANCELLED.to_string(),
                ..Default::default()
            }),
            user: User {
                assets: split_frozen(&self.balance),
                ..Default::default()
            },
            deals: Vec::new(),
        }
    }
}

impl TryFrom<Object> for LegacyCancelOrder {
    type Error = ClientError;

    fn try_from(object: Object) -> Result<Self, Self::Error> {
        let mut res = LegacyCancelOrder::default();
        for (key, value) in &object {
            let key = key.to_lowercase();
            match key.as_str() {
                "order_id" => res.order_id = value_i64(&key, value)?,
                "type" => res.order_type = value_string(value),
                "pair" => res.pair = value_string(value),
                "balance" => res.balance = value_balances(&key, value)?,
                _ => {}
            }
        }
        Ok(res)
    }
}

/// An open or historical order of the user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Object")]
pub struct LegacyOrder {
    pub pair: String,
    pub order_id: i64,
    #[serde(rename = "type")]
    pub order_type: String,
    pub price: Rawfloat,
    pub submit_time: i64,
    pub finish_time: i64,
    pub method: String,
    pub status: String,
    /// Asset and amount from the `order_<asset>` field.
    pub order_asset: String,
    pub order_amount: Rawfloat,
    /// Asset and amount from the `remain_<asset>` field.
    pub remain_asset: String,
    pub remain: Rawfloat,
}

impl TryFrom<Object> for LegacyOrder {
    type Error = ClientError;

    fn try_from(object: Object) -> Result<Self, Self::Error> {
        let mut order = LegacyOrder::default();
        for (key, value) in &object {
            let key = key.to_lowercase();
            match key.as_str() {
                "pair" => order.pair = value_string(value),
                "order_id" => order.order_id = value_i64(&key, value)?,
                "type" => order.order_type = value_string(value),
                "price" => order.price = value_rawfloat(&key, value)?,
                "submit_time" => order.submit_time = value_i64(&key, value)?,
                "finish_time" => order.finish_time = value_i64(&key, value)?,
                "method" => order.method = value_string(value),
                "status" => order.status = value_string(value),
                _ => {
                    if let Some(asset) = key.strip_prefix("order_") {
                        order.order_asset = asset.to_string();
                        order.order_amount = value_rawfloat(&key, value)?;
                    } else if let Some(asset) = key.strip_prefix("remain_") {
                        order.remain_asset = asset.to_string();
                        order.remain = value_rawfloat(&key, value)?;
                    }
                }
            }
        }
        Ok(order)
    }
}

/// Open orders keyed by pair.
pub type LegacyOpenOrders = HashMap<String, Vec<LegacyOrder>>;

#[derive(Debug, Deserialize)]
pub(crate) struct LegacyOrderEnvelope {
    pub order: LegacyOrder,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LegacyOrdersEnvelope<T> {
    #[serde(default)]
    pub orders: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LegacyTradesEnvelope {
    #[serde(default)]
    pub trades: Vec<LegacyTradeHistory>,
}

/// One fill of the user, from `tradeHistory`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Object")]
pub struct LegacyTradeHistory {
    pub trade_id: i64,
    pub order_id: i64,
    #[serde(rename = "type")]
    pub trade_type: String,
    /// Traded asset, the only key named after an asset.
    pub asset: String,
    pub amount: Rawfloat,
    pub base_currency: String,
    pub base_currency_price: Rawfloat,
    pub price: Rawfloat,
    pub trade_time: i64,
    pub trade_time_print: String,
}

impl TryFrom<Object> for LegacyTradeHistory {
    type Error = ClientError;

    fn try_from(object: Object) -> Result<Self, Self::Error> {
        let mut trade = LegacyTradeHistory::default();
        for (key, value) in &object {
            let key = key.to_lowercase();
            match key.as_str() {
                "trade_id" => trade.trade_id = value_i64(&key, value)?,
                "order_id" => trade.order_id = value_i64(&key, value)?,
                "type" => trade.trade_type = value_string(value),
                "base_currency" => trade.base_currency = value_string(value),
                "base_currency_price" => trade.base_currency_price = value_rawfloat(&key, value)?,
                "price" => trade.price = value_rawfloat(&key, value)?,
                "trade_time" => trade.trade_time = value_i64(&key, value)?,
                "trade_time_print" => trade.trade_time_print = value_string(value),
                _ => {
                    trade.amount = value_rawfloat(&key, value)?;
                    trade.asset = key;
                }
            }
        }
        Ok(trade)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyDeposit {
    #[serde(default, deserialize_with = "lenient_string")]
    pub deposit_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub asset: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub amount: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub final_amount: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub success_time: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyWithdraw {
    #[serde(default, deserialize_with = "lenient_string")]
    pub withdraw_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub asset: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub amount: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub fee: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub final_amount: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub submit_time: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub success_time: String,
}

/// Deposits and withdrawals of every asset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyTransactionHistory {
    #[serde(default)]
    pub deposit: HashMap<String, Vec<LegacyDeposit>>,
    #[serde(default)]
    pub withdraw: HashMap<String, Vec<LegacyWithdraw>>,
}

/// Result of `withdrawCoin`; unlike other calls it is not wrapped in `return`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyWithdrawResponse {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub success: i64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub error: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub error_code: String,
    #[serde(rename = "withdraw_id", default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub txid: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: String,
    #[serde(rename = "withdraw_currency", default, deserialize_with = "lenient_string")]
    pub currency: String,
    #[serde(rename = "withdraw_address", default, deserialize_with = "lenient_string")]
    pub address: String,
    #[serde(rename = "withdraw_amount", default, deserialize_with = "lenient_string")]
    pub amount: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub fee: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub amount_after_fee: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub submit_time: String,
    #[serde(rename = "withdraw_memo", default, deserialize_with = "lenient_string")]
    pub memo: String,
}

/// Splits a v1 balance map into free and `frozen_<asset>` balances.
fn split_frozen(balances: &HashMap<String, Rawfloat>) -> UserAssets {
    let mut assets = UserAssets::default();
    for (key, value) in balances {
        match key.strip_prefix("frozen_") {
            Some(asset) => assets.frozen_balances.insert(asset.to_string(), *value),
            None => assets.balances.insert(key.clone(), *value),
        };
    }
    assets
}

fn invalid(key: &str, value: &Value) -> ClientError {
    ClientError::InvalidResponse(format!("invalid {:?} value {}", key, value))
}

fn value_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn value_i64(key: &str, value: &Value) -> Result<i64, ClientError> {
    match value {
        Value::Null => Ok(0),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| invalid(key, value)),
        Value::String(s) if s.is_empty() => Ok(0),
        Value::String(s) => s.trim().parse().map_err(|_| invalid(key, value)),
        _ => Err(invalid(key, value)),
    }
}

fn value_rawfloat(key: &str, value: &Value) -> Result<Rawfloat, ClientError> {
    match value {
        Value::Null => Ok(Rawfloat::ZERO),
        Value::String(s) if s.trim().is_empty() => Ok(Rawfloat::ZERO),
        Value::String(s) => Ok(Rawfloat::parse(s.trim())?),
        Value::Number(n) => Ok(Rawfloat::parse(&n.to_string())?),
        _ => Err(invalid(key, value)),
    }
}

fn value_object<'a>(key: &str, value: &'a Value) -> Result<&'a Object, ClientError> {
    value.as_object().ok_or_else(|| invalid(key, value))
}

fn value_balances(key: &str, value: &Value) -> Result<HashMap<String, Rawfloat>, ClientError> {
    if value.is_null() {
        return Ok(HashMap::new());
    }
    value_object(key, value)?
        .iter()
        .map(|(asset, v)| Ok((asset.to_lowercase(), value_rawfloat(asset, v)?)))
        .collect()
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value_string(&value))
}

fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    value_i64("", &value).map_err(serde::de::Error::custom)
}

fn lenient_prices<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<HashMap<String, Rawfloat>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    value_balances("prices", &value).map_err(serde::de::Error::custom)
}
