use serde::{Deserialize, Serialize};

use super::{Rawfloat, TradeMethod, TradeType, User};

/// Order as returned after placing or cancelling a trade.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub order_type: Option<TradeType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<TradeMethod>,
    #[serde(default)]
    pub submit_time: i64,
    #[serde(default, skip_serializing_if = "is_zero_time")]
    pub finish_time: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,
    #[serde(default, skip_serializing_if = "Rawfloat::is_zero")]
    pub price: Rawfloat,
    #[serde(default, skip_serializing_if = "Rawfloat::is_zero")]
    pub amount_base: Rawfloat,
    #[serde(default, skip_serializing_if = "Rawfloat::is_zero")]
    pub remain_base: Rawfloat,
    #[serde(default, skip_serializing_if = "Rawfloat::is_zero")]
    pub filled_base: Rawfloat,
    #[serde(default, skip_serializing_if = "Rawfloat::is_zero")]
    pub amount_coin: Rawfloat,
    #[serde(default, skip_serializing_if = "Rawfloat::is_zero")]
    pub remain_coin: Rawfloat,
    #[serde(default, skip_serializing_if = "Rawfloat::is_zero")]
    pub filled_coin: Rawfloat,
}

/// Open, closed or cancelled trade of a user or of the market.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    #[serde(default, skip_serializing_if = "is_zero_id")]
    pub id: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pair: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub trade_type: Option<TradeType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<TradeMethod>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,
    #[serde(default, skip_serializing_if = "Rawfloat::is_zero")]
    pub price: Rawfloat,
    #[serde(default, skip_serializing_if = "Rawfloat::is_zero")]
    pub fee: Rawfloat,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub base_asset: String,
    #[serde(default, skip_serializing_if = "Rawfloat::is_zero")]
    pub base_amount: Rawfloat,
    #[serde(default, skip_serializing_if = "Rawfloat::is_zero")]
    pub base_remain: Rawfloat,
    #[serde(default, skip_serializing_if = "Rawfloat::is_zero")]
    pub base_filled: Rawfloat,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub coin_asset: String,
    #[serde(default, skip_serializing_if = "Rawfloat::is_zero")]
    pub coin_amount: Rawfloat,
    #[serde(default, skip_serializing_if = "Rawfloat::is_zero")]
    pub coin_remain: Rawfloat,
    #[serde(default, skip_serializing_if = "Rawfloat::is_zero")]
    pub coin_filled: Rawfloat,

    #[serde(default)]
    pub submit_time: i64,
    #[serde(default, skip_serializing_if = "is_zero_time")]
    pub finish_time: i64,
}

impl Trade {
    pub fn is_open(&self) -> bool {
        self.finish_time == 0 && self.status.is_empty()
    }
}

/// A fill against an order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradePrice {
    pub id: i64,
    #[serde(default)]
    pub trade_time: i64,
    #[serde(default)]
    pub amount: Rawfloat,
    #[serde(default)]
    pub amount_coin: Rawfloat,
    #[serde(default)]
    pub price: Rawfloat,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeResponse {
    #[serde(default)]
    pub order: Option<Order>,
    #[serde(default)]
    pub user: User,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deals: Vec<TradePrice>,
}

fn is_zero_time(t: &i64) -> bool {
    *t == 0
}

fn is_zero_id(id: &i64) -> bool {
    *id == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_trade_from_json() {
        let body = r#"{
            "id": 1201,
            "pair": "ten_btc",
            "type": "sell",
            "method": "limit",
            "price": "0.00001234",
            "base_asset": "btc",
            "coin_asset": "ten",
            "coin_amount": 150,
            "coin_remain": "150",
            "submit_time": 1574423788
        }"#;
        let trade: Trade = serde_json::from_str(body).unwrap();
        assert_eq!(trade.id, 1201);
        assert_eq!(trade.trade_type, Some(TradeType::Sell));
        assert_eq!(trade.method, Some(TradeMethod::Limit));
        assert_eq!(trade.price.as_decimal(), dec!(0.00001234));
        assert_eq!(trade.coin_amount, trade.coin_remain);
        assert!(trade.is_open());
    }

    #[test]
    fn test_trade_omits_empty_fields() {
        let trade = Trade {
            pair: "ten_btc".to_string(),
            price: Rawfloat::new(dec!(0.5)),
            ..Default::default()
        };
        let json = serde_json::to_value(&trade).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"pair": "ten_btc", "price": "0.5", "submit_time": 0})
        );
    }

    #[test]
    fn test_trade_response_with_deals() {
        let body = r#"{
            "order": {"id": 7, "method": "market", "submit_time": 10, "filled_coin": "2"},
            "user": {"balances": {"btc": "0.5"}, "id": 3},
            "deals": [{"id": 1, "trade_time": 11, "amount": "1", "amount_coin": "2", "price": "0.5"}]
        }"#;
        let res: TradeResponse = serde_json::from_str(body).unwrap();
        let order = res.order.unwrap();
        assert_eq!(order.id, 7);
        assert_eq!(order.filled_coin.to_string(), "2");
        assert_eq!(res.deals.len(), 1);
        assert_eq!(res.user.id, 3);
    }
}
