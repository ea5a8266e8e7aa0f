use serde::{Deserialize, Serialize};

use super::{Rawfloat, SortOrder, TimeInForce, TradeMethod, TradeType};
use crate::auth::Params;
use crate::error::RequestError;

pub const DEFAULT_LIMIT: i64 = 100;

pub mod names {
    pub const ADDRESS: &str = "address";
    pub const AMOUNT: &str = "amount";
    pub const ASSET: &str = "asset";
    pub const ID_AFTER: &str = "id_after";
    pub const ID_BEFORE: &str = "id_before";
    pub const LIMIT: &str = "limit";
    pub const MEMO: &str = "memo";
    pub const METHOD: &str = "method";
    pub const NETWORK: &str = "network";
    pub const OFFSET: &str = "offset";
    pub const ORDER_ID: &str = "order_id";
    pub const ORDER_METHOD: &str = "order_method";
    pub const PAIR: &str = "pair";
    pub const POST_ONLY: &str = "post_only";
    pub const PRICE: &str = "price";
    pub const REQUEST_ID: &str = "request_id";
    pub const SORT: &str = "sort";
    pub const TIME_AFTER: &str = "time_after";
    pub const TIME_BEFORE: &str = "time_before";
    pub const TIME_IN_FORCE: &str = "time_in_force";
    pub const TRADE_ID: &str = "trade_id";
    pub const TRADE_METHOD: &str = "trade_method";
    pub const TYPE: &str = "type";
}

/// Order to be placed through REST or WebSocket.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradeRequest {
    pub trade_type: Option<TradeType>,
    pub method: TradeMethod,
    pub pair: String,
    pub amount: Rawfloat,
    pub price: Rawfloat,
    /// Only for limit orders: reject instead of matching immediately.
    pub post_only: bool,
    pub time_in_force: Option<TimeInForce>,
}

impl TradeRequest {
    pub fn limit(pair: impl Into<String>, amount: Rawfloat, price: Rawfloat) -> Self {
        Self {
            method: TradeMethod::Limit,
            pair: pair.into(),
            amount,
            price,
            ..Default::default()
        }
    }

    pub fn market(pair: impl Into<String>, amount: Rawfloat) -> Self {
        Self {
            method: TradeMethod::Market,
            pair: pair.into(),
            amount,
            ..Default::default()
        }
    }

    pub fn with_type(mut self, trade_type: TradeType) -> Self {
        self.trade_type = Some(trade_type);
        self
    }

    pub fn post_only(mut self) -> Self {
        self.post_only = true;
        self
    }

    pub fn fill_or_kill(mut self) -> Self {
        self.time_in_force = Some(TimeInForce::FOK);
        self
    }

    /// Validates the order and renders it as form parameters and as
    /// WebSocket parameters.
    pub fn pack(&self) -> Result<(Params, WebSocketParams), RequestError> {
        if self.pair.is_empty() {
            return Err(RequestError::InvalidPair);
        }
        if !self.amount.is_positive() {
            return Err(RequestError::InvalidAmount);
        }
        if self.method == TradeMethod::Limit && !self.price.is_positive() {
            return Err(RequestError::InvalidPrice);
        }

        let mut params = Params::new();
        params.insert(names::TRADE_METHOD.into(), self.method.as_str().into());
        params.insert(names::PAIR.into(), self.pair.clone());
        params.insert(names::AMOUNT.into(), self.amount.to_string());
        if self.method == TradeMethod::Limit {
            params.insert(names::PRICE.into(), self.price.to_string());
        }
        params.insert(names::POST_ONLY.into(), self.post_only.to_string());
        if let Some(tif) = self.time_in_force {
            params.insert(names::TIME_IN_FORCE.into(), tif.as_str().into());
        }

        let ws = WebSocketParams {
            trade_type: self.trade_type,
            method: Some(self.method),
            pair: self.pair.clone(),
            amount: self.amount,
            price: if self.method == TradeMethod::Limit {
                self.price
            } else {
                Rawfloat::ZERO
            },
            post_only: self.post_only,
            time_in_force: self.time_in_force,
            ..Default::default()
        };

        Ok((params, ws))
    }
}

/// Filters for listing a user's trades.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListTradeParams {
    pub pair: String,
    pub sort: SortOrder,
    pub offset: i64,
    /// Outside `1..=100` the default of 100 is sent.
    pub limit: i64,
    pub id_after: i64,
    pub id_before: i64,
    pub time_after: i64,
    pub time_before: i64,
}

impl ListTradeParams {
    pub fn new(pair: impl Into<String>) -> Self {
        Self {
            pair: pair.into(),
            ..Default::default()
        }
    }

    pub fn effective_limit(&self) -> i64 {
        if self.limit <= 0 || self.limit > DEFAULT_LIMIT {
            DEFAULT_LIMIT
        } else {
            self.limit
        }
    }

    pub fn pack(&self) -> Result<Params, RequestError> {
        if self.pair.is_empty() {
            return Err(RequestError::InvalidPair);
        }

        let mut params = Params::new();
        params.insert(names::PAIR.into(), self.pair.clone());
        params.insert(names::SORT.into(), self.sort.as_str().into());
        params.insert(names::LIMIT.into(), self.effective_limit().to_string());

        let optional = [
            (names::OFFSET, self.offset),
            (names::ID_AFTER, self.id_after),
            (names::ID_BEFORE, self.id_before),
            (names::TIME_AFTER, self.time_after),
            (names::TIME_BEFORE, self.time_before),
        ];
        for (name, value) in optional {
            if value > 0 {
                params.insert(name.into(), value.to_string());
            }
        }

        Ok(params)
    }
}

/// Withdrawal of an asset to an external address.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WithdrawRequest {
    /// Idempotency key echoed back by the exchange callback.
    pub request_id: String,
    pub asset: String,
    pub network: String,
    pub address: String,
    pub memo: String,
    pub amount: Rawfloat,
}

impl WithdrawRequest {
    pub fn new(asset: impl Into<String>, address: impl Into<String>, amount: Rawfloat) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            asset: asset.into(),
            address: address.into(),
            amount,
            ..Default::default()
        }
    }

    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = network.into();
        self
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }

    pub fn pack(&self) -> Result<Params, RequestError> {
        if self.request_id.is_empty() {
            return Err(RequestError::InvalidRequestId);
        }
        if self.asset.is_empty() {
            return Err(RequestError::InvalidAsset);
        }
        if self.address.is_empty() {
            return Err(RequestError::WalletAddress);
        }
        if !self.amount.is_positive() {
            return Err(RequestError::InvalidAmount);
        }

        let mut params = Params::new();
        params.insert(names::REQUEST_ID.into(), self.request_id.clone());
        params.insert(names::ASSET.into(), self.asset.clone());
        params.insert(names::NETWORK.into(), self.network.clone());
        params.insert(names::ADDRESS.into(), self.address.clone());
        params.insert(names::MEMO.into(), self.memo.clone());
        params.insert(names::AMOUNT.into(), self.amount.to_string());
        Ok(params)
    }
}

/// JSON body of a WebSocket request, base64 encoded on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebSocketParams {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub trade_type: Option<TradeType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<TradeMethod>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pair: String,
    #[serde(default, skip_serializing_if = "Rawfloat::is_zero")]
    pub amount: Rawfloat,
    #[serde(default, skip_serializing_if = "Rawfloat::is_zero")]
    pub price: Rawfloat,
    #[serde(default, skip_serializing_if = "is_false")]
    pub post_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_in_force: Option<TimeInForce>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub address: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub asset: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub id_after: i64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub id_before: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_sort_by: Option<SortOrder>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub limit: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub memo: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub offset: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub request_id: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub time_after: i64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub time_before: i64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub trade_id: i64,

    // Subscription topics of the public channel.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depths: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ticker: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trades: Vec<String>,
}

impl WebSocketParams {
    pub fn for_pair(pair: impl Into<String>) -> Self {
        Self {
            pair: pair.into(),
            ..Default::default()
        }
    }

    pub fn for_trade(pair: impl Into<String>, trade_id: i64) -> Self {
        Self {
            pair: pair.into(),
            trade_id,
            ..Default::default()
        }
    }

    pub fn pack(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn unpack(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

fn is_false(v: &bool) -> bool {
    !*v
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_limit_trade_pack() {
        let req = TradeRequest::limit("ten_btc", Rawfloat::new(dec!(150)), Rawfloat::new(dec!(0.00001234)))
            .with_type(TradeType::Sell);
        let (params, ws) = req.pack().unwrap();

        assert_eq!(params["trade_method"], "limit");
        assert_eq!(params["pair"], "ten_btc");
        assert_eq!(params["amount"], "150");
        assert_eq!(params["price"], "0.00001234");
        assert_eq!(params["post_only"], "false");
        assert!(!params.contains_key("time_in_force"));

        assert_eq!(
            serde_json::to_value(&ws).unwrap(),
            serde_json::json!({
                "type": "sell",
                "method": "limit",
                "pair": "ten_btc",
                "amount": "150",
                "price": "0.00001234"
            })
        );
    }

    #[test]
    fn test_market_trade_skips_price() {
        let req = TradeRequest::market("eth_btc", Rawfloat::new(dec!(0.5))).fill_or_kill();
        let (params, ws) = req.pack().unwrap();
        assert!(!params.contains_key("price"));
        assert_eq!(params["trade_method"], "market");
        assert_eq!(params["time_in_force"], "FOK");
        assert!(ws.price.is_zero());
        assert_eq!(ws.time_in_force, Some(TimeInForce::FOK));
    }

    #[test]
    fn test_trade_pack_validation() {
        let zero = TradeRequest::limit("ten_btc", Rawfloat::ZERO, Rawfloat::new(dec!(1)));
        assert_eq!(zero.pack().unwrap_err(), RequestError::InvalidAmount);

        let no_price = TradeRequest::limit("ten_btc", Rawfloat::new(dec!(1)), Rawfloat::ZERO);
        assert_eq!(no_price.pack().unwrap_err(), RequestError::InvalidPrice);

        let no_pair = TradeRequest::market("", Rawfloat::new(dec!(1)));
        assert_eq!(no_pair.pack().unwrap_err(), RequestError::InvalidPair);

        let post_only = TradeRequest::limit("ten_btc", Rawfloat::new(dec!(1)), Rawfloat::new(dec!(2))).post_only();
        assert_eq!(post_only.pack().unwrap().0["post_only"], "true");
    }

    #[test]
    fn test_list_trade_params_defaults() {
        let params = ListTradeParams::new("ten_btc").pack().unwrap();
        assert_eq!(params["sort"], "desc");
        assert_eq!(params["limit"], "100");
        assert!(!params.contains_key("offset"));
        assert!(!params.contains_key("id_after"));
    }

    #[test]
    fn test_list_trade_params_filters() {
        let list = ListTradeParams {
            pair: "ten_btc".into(),
            sort: SortOrder::Asc,
            offset: 20,
            limit: 500,
            id_after: 3,
            time_before: 1574423788,
            ..Default::default()
        };
        let params = list.pack().unwrap();
        assert_eq!(params["sort"], "asc");
        assert_eq!(params["limit"], "100");
        assert_eq!(params["offset"], "20");
        assert_eq!(params["id_after"], "3");
        assert_eq!(params["time_before"], "1574423788");
        assert!(!params.contains_key("time_after"));

        let small = ListTradeParams { limit: 5, ..list };
        assert_eq!(small.effective_limit(), 5);
    }

    #[test]
    fn test_withdraw_request() {
        let req = WithdrawRequest::new("btc", "1BoatSLRHtKNngkdXEeobR76b53LETtpyT", Rawfloat::new(dec!(0.01)))
            .with_network("bitcoin");
        assert!(uuid::Uuid::parse_str(&req.request_id).is_ok());

        let params = req.pack().unwrap();
        assert_eq!(params["amount"], "0.01");
        assert_eq!(params["network"], "bitcoin");
        assert_eq!(params["memo"], "");

        let missing_id = WithdrawRequest { request_id: String::new(), ..req.clone() };
        assert_eq!(missing_id.pack().unwrap_err(), RequestError::InvalidRequestId);
        let missing_address = WithdrawRequest { address: String::new(), ..req.clone() };
        assert_eq!(missing_address.pack().unwrap_err(), RequestError::WalletAddress);
        let missing_asset = WithdrawRequest { asset: String::new(), ..req.clone() };
        assert_eq!(missing_asset.pack().unwrap_err(), RequestError::InvalidAsset);
        let zero = WithdrawRequest { amount: Rawfloat::ZERO, ..req };
        assert_eq!(zero.pack().unwrap_err(), RequestError::InvalidAmount);
    }

    #[test]
    fn test_websocket_params_unpack() {
        let ws = WebSocketParams::for_trade("ten_btc", 12);
        let bytes = ws.pack().unwrap();
        assert_eq!(bytes, br#"{"pair":"ten_btc","trade_id":12}"#.to_vec());
        assert_eq!(WebSocketParams::unpack(&bytes).unwrap(), ws);

        let sub = WebSocketParams {
            depths: vec!["ten_btc".into()],
            ..Default::default()
        };
        assert_eq!(sub.pack().unwrap(), br#"{"depths":["ten_btc"]}"#.to_vec());
    }
}
