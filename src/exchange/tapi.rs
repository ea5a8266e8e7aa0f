use chrono::{DateTime, Utc};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use super::endpoints::v1 as api;
use super::transport::{HttpMethod, HttpRequest, HttpResponse, ReqwestTransport, Transport};
use crate::auth::{sign_request, Credentials, Params, TimestampPolicy};
use crate::config::Environment;
use crate::error::{ApiError, ClientError, RequestError, Result, ResultExt};
use crate::types::legacy::{
    LegacyEnvelope, LegacyOrderEnvelope, LegacyOrdersEnvelope, LegacyTickerEnvelope,
    LegacyTradesEnvelope, LEGACY_SUCCESS,
};
use crate::types::params::names;
use crate::types::{
    LegacyCancelOrder, LegacyMarketInfo, LegacyOpenOrders, LegacyOrder, LegacyOrderBook,
    LegacySummary, LegacyTicker, LegacyTrade, LegacyTradeHistory, LegacyTradeResponse,
    LegacyTransactionHistory, LegacyUserInfo, LegacyWithdrawResponse, Pair, SortOrder,
    TradeMethod, TradeRequest, TradeResponse, TradeType, WithdrawRequest,
};

/// Code given to calls the v1 API rejects with `success` other than 1.
const REJECTED_CODE: i64 = 400;

/// Filters of `tradeHistory`; zero and `None` fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TradeHistoryParams {
    pub pair: String,
    /// Server default is 1000.
    pub count: i64,
    pub from_id: i64,
    pub end_id: i64,
    pub order: Option<SortOrder>,
    pub since: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TradeHistoryParams {
    pub fn new(pair: impl Into<String>) -> Self {
        Self {
            pair: pair.into(),
            ..Default::default()
        }
    }

    pub fn pack(&self) -> std::result::Result<Params, RequestError> {
        if self.pair.is_empty() {
            return Err(RequestError::InvalidPair);
        }
        let mut params = Params::new();
        params.insert(names::PAIR.into(), self.pair.clone());
        if self.count > 0 {
            params.insert("count".into(), self.count.to_string());
        }
        if self.from_id > 0 {
            params.insert("from_id".into(), self.from_id.to_string());
        }
        if self.end_id > 0 {
            params.insert("end_id".into(), self.end_id.to_string());
        }
        if let Some(order) = self.order {
            params.insert("order".into(), order.as_str().into());
        }
        if let Some(since) = self.since {
            params.insert("since".into(), since.timestamp().to_string());
        }
        if let Some(end) = self.end {
            params.insert("end".into(), end.timestamp().to_string());
        }
        Ok(params)
    }
}

/// Client for the v1 trade API.
///
/// Private calls are form-encoded `POST /tapi` requests naming the call in
/// `method` and signed with a millisecond `nonce`.
pub struct TokenomyV1Client {
    env: Environment,
    credentials: Credentials,
    transport: Arc<dyn Transport>,
}

impl TokenomyV1Client {
    pub fn new(env: Environment) -> Result<Self> {
        let transport = ReqwestTransport::new(&env)?;
        Ok(Self::with_transport(env, Arc::new(transport)))
    }

    pub fn with_transport(env: Environment, transport: Arc<dyn Transport>) -> Self {
        let credentials = env.credentials();
        Self {
            env,
            credentials,
            transport,
        }
    }

    pub async fn authenticate(&self) -> Result<LegacyUserInfo> {
        let info = self.user_info().await.context("authenticate")?;
        info!("Authenticated as {} ({})", info.name, info.user_id);
        Ok(info)
    }

    pub async fn market_summaries(&self) -> Result<LegacySummary> {
        let mut summary: LegacySummary = self
            .call_public("market_summaries", api::MARKET_SUMMARIES)
            .await?;
        summary.propagate();
        Ok(summary)
    }

    pub async fn market_ticker(&self, pair: &str) -> Result<LegacyTicker> {
        require_pair(pair)?;
        let env: LegacyTickerEnvelope = self
            .call_public("market_ticker", &api::market_ticker(pair))
            .await?;
        let mut ticker = env.ticker;
        ticker.name = pair.to_string();
        Ok(ticker)
    }

    pub async fn market_trades(&self, pair: &str) -> Result<Vec<LegacyTrade>> {
        require_pair(pair)?;
        self.call_public("market_trades", &api::market_trades(pair))
            .await
    }

    /// Public order book of the pair.
    pub async fn market_orders_open(&self, pair: &str) -> Result<LegacyOrderBook> {
        require_pair(pair)?;
        self.call_public("market_orders_open", &api::market_depth(pair))
            .await
    }

    pub async fn market_info(&self) -> Result<Vec<LegacyMarketInfo>> {
        self.call_public("market_info", api::MARKET_INFO).await
    }

    pub async fn user_info(&self) -> Result<LegacyUserInfo> {
        self.call_private("user_info", api::METHOD_USER_INFO, Params::new())
            .await
    }

    pub async fn user_order(&self, pair: &str, order_id: i64) -> Result<LegacyOrder> {
        let params = order_params(pair, order_id)?;
        let env: LegacyOrderEnvelope = self
            .call_private("user_order", api::METHOD_USER_ORDER, params)
            .await?;
        Ok(env.order)
    }

    /// Open orders keyed by pair. An empty `pair` lists every pair.
    pub async fn user_orders_open(&self, pair: &str) -> Result<LegacyOpenOrders> {
        let mut params = Params::new();
        if !pair.is_empty() {
            params.insert(names::PAIR.into(), pair.to_string());
        }
        let env: LegacyOrdersEnvelope<Value> = self
            .call_private("user_orders_open", api::METHOD_USER_ORDERS_OPEN, params)
            .await?;

        // A single pair comes back as a list, all pairs as a map.
        let orders = match env.orders {
            Value::Null => LegacyOpenOrders::new(),
            Value::Array(list) => {
                let list: Vec<LegacyOrder> =
                    serde_json::from_value(Value::Array(list)).context("user_orders_open")?;
                LegacyOpenOrders::from([(pair.to_string(), list)])
            }
            other => serde_json::from_value(other).context("user_orders_open")?,
        };
        Ok(orders)
    }

    /// Closed and cancelled orders of the pair.
    pub async fn user_orders_closed(
        &self,
        pair: &str,
        count: i64,
        from_id: i64,
    ) -> Result<Vec<LegacyOrder>> {
        require_pair(pair)?;
        let mut params = Params::new();
        params.insert(names::PAIR.into(), pair.to_string());
        if count > 0 {
            params.insert("count".into(), count.to_string());
        }
        if from_id > 0 {
            params.insert("from".into(), from_id.to_string());
        }
        let env: LegacyOrdersEnvelope<Vec<LegacyOrder>> = self
            .call_private("user_orders_closed", api::METHOD_USER_ORDER_HISTORY, params)
            .await?;
        Ok(env.orders)
    }

    pub async fn user_trades(&self, filter: &TradeHistoryParams) -> Result<Vec<LegacyTradeHistory>> {
        let params = filter.pack()?;
        let env: LegacyTradesEnvelope = self
            .call_private("user_trades", api::METHOD_USER_TRADE_HISTORY, params)
            .await?;
        Ok(env.trades)
    }

    pub async fn user_transactions(&self) -> Result<LegacyTransactionHistory> {
        self.call_private(
            "user_transactions",
            api::METHOD_USER_TRANS_HISTORY,
            Params::new(),
        )
        .await
    }

    pub async fn trade_bid(&self, req: &TradeRequest) -> Result<TradeResponse> {
        self.trade("trade_bid", TradeType::Buy, req).await
    }

    pub async fn trade_ask(&self, req: &TradeRequest) -> Result<TradeResponse> {
        self.trade("trade_ask", TradeType::Sell, req).await
    }

    pub async fn trade_cancel_bid(&self, pair: &str, order_id: i64) -> Result<TradeResponse> {
        self.cancel("trade_cancel_bid", TradeType::Buy, pair, order_id)
            .await
    }

    pub async fn trade_cancel_ask(&self, pair: &str, order_id: i64) -> Result<TradeResponse> {
        self.cancel("trade_cancel_ask", TradeType::Sell, pair, order_id)
            .await
    }

    /// Requests a withdrawal through `withdrawCoin`. The reply is not wrapped
    /// in `return`.
    pub async fn user_withdraw(&self, req: &WithdrawRequest) -> Result<LegacyWithdrawResponse> {
        req.pack()?;

        let mut params = Params::new();
        params.insert("currency".into(), req.asset.clone());
        params.insert("withdraw_address".into(), req.address.clone());
        params.insert("withdraw_amount".into(), req.amount.to_string());
        params.insert("withdraw_memo".into(), req.memo.clone());
        params.insert(names::REQUEST_ID.into(), req.request_id.clone());

        let response = self
            .send_private("user_withdraw", api::METHOD_USER_WITHDRAW, params)
            .await?;
        check_status(&response).context("user_withdraw")?;

        let res: LegacyWithdrawResponse =
            serde_json::from_str(&response.body).context("user_withdraw")?;
        if res.success != LEGACY_SUCCESS {
            return Err(ApiError::new(REJECTED_CODE, res.error, res.error_code)).context("user_withdraw");
        }
        Ok(res)
    }

    async fn trade(
        &self,
        operation: &'static str,
        trade_type: TradeType,
        req: &TradeRequest,
    ) -> Result<TradeResponse> {
        req.pack()?;
        let pair: Pair = req.pair.parse()?;

        // Market buys spend the base asset, everything else is sized in the coin.
        let amount_asset = match (req.method, trade_type) {
            (TradeMethod::Market, TradeType::Buy) => pair.base(),
            _ => pair.coin(),
        };

        let mut params = Params::new();
        params.insert(names::ORDER_METHOD.into(), req.method.as_str().into());
        params.insert(names::PAIR.into(), pair.to_string());
        params.insert(names::TYPE.into(), trade_type.as_str().into());
        if req.method == TradeMethod::Limit {
            params.insert(names::PRICE.into(), req.price.to_string());
        }
        params.insert(amount_asset.to_string(), req.amount.to_string());

        let res: LegacyTradeResponse = self
            .call_private(operation, api::METHOD_TRADE, params)
            .await?;
        Ok(res.to_trade_response(trade_type, req.method, req.amount, req.price))
    }

    async fn cancel(
        &self,
        operation: &'static str,
        trade_type: TradeType,
        pair: &str,
        order_id: i64,
    ) -> Result<TradeResponse> {
        let mut params = order_params(pair, order_id)?;
        params.insert(names::TYPE.into(), trade_type.as_str().into());

        let res: LegacyCancelOrder = self
            .call_private(operation, api::METHOD_CANCEL_ORDER, params)
            .await?;
        Ok(res.to_trade_response())
    }

    async fn call_public<T: DeserializeOwned>(&self, operation: &'static str, path: &str) -> Result<T> {
        let request = HttpRequest::new(HttpMethod::Post, &self.env.v1_address, path, "");
        debug!("{}: {} {}", operation, request.method, request.url);

        let response = self.transport.send(request).await.context(operation)?;
        check_status(&response).context(operation)?;
        serde_json::from_str(&response.body).context(operation)
    }

    async fn send_private(
        &self,
        operation: &'static str,
        method: &'static str,
        mut params: Params,
    ) -> Result<HttpResponse> {
        params.insert(names::METHOD.into(), method.into());
        let signed = sign_request(&self.credentials, params, TimestampPolicy::V1).context(operation)?;
        let request = HttpRequest::new(HttpMethod::Post, &self.env.v1_address, api::PRIVATE, &signed.payload)
            .with_headers(signed.headers());
        if self.env.logs_bodies() {
            debug!("{}: {}", operation, signed.payload);
        } else {
            debug!("{}: {}", operation, method);
        }

        self.transport.send(request).await.context(operation)
    }

    async fn call_private<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        method: &'static str,
        params: Params,
    ) -> Result<T> {
        let response = self.send_private(operation, method, params).await?;
        decode_legacy(method, response).context(operation)
    }
}

fn check_status(response: &HttpResponse) -> Result<()> {
    if !response.is_error() {
        return Ok(());
    }
    let (message, name) = match serde_json::from_str::<LegacyEnvelope<IgnoredAny>>(&response.body) {
        Ok(env) if !env.error.is_empty() => (env.error, env.error_code),
        _ => (response.body.trim().to_string(), String::new()),
    };
    Err(ApiError::new(i64::from(response.status), message, name).into())
}

fn decode_legacy<T: DeserializeOwned>(method: &str, response: HttpResponse) -> Result<T> {
    check_status(&response)?;

    let env: LegacyEnvelope<T> = serde_json::from_str(&response.body)?;
    if env.success != LEGACY_SUCCESS {
        return Err(ApiError::new(REJECTED_CODE, env.error, env.error_code).into());
    }
    env.data
        .ok_or_else(|| ClientError::InvalidResponse(format!("{} reply without return", method)))
}

fn require_pair(pair: &str) -> std::result::Result<(), RequestError> {
    if pair.is_empty() {
        return Err(RequestError::InvalidPair);
    }
    Ok(())
}

fn order_params(pair: &str, order_id: i64) -> std::result::Result<Params, RequestError> {
    require_pair(pair)?;
    if order_id <= 0 {
        return Err(RequestError::InvalidTradeId);
    }
    let mut params = Params::new();
    params.insert(names::PAIR.into(), pair.to_string());
    params.insert(names::ORDER_ID.into(), order_id.to_string());
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::sign;
    use crate::exchange::transport::MockTransport;
    use crate::types::Rawfloat;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn client(mock: MockTransport) -> TokenomyV1Client {
        let env = Environment::new("v1-key", "secr3t").with_v1_address("https://v1.example.com");
        TokenomyV1Client::with_transport(env, Arc::new(mock))
    }

    fn ok(body: &'static str) -> Result<HttpResponse> {
        Ok(HttpResponse::new(200, body))
    }

    #[tokio::test]
    async fn test_private_call_is_signed_post() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .withf(|req: &HttpRequest| {
                let body = req.body.as_deref().unwrap_or("");
                req.method == HttpMethod::Post
                    && req.url == "https://v1.example.com/tapi"
                    && body.starts_with("method=getInfo&nonce=")
                    && req.header("Key") == Some("v1-key")
                    && req.header("Sign") == Some(sign(body, "secr3t").as_str())
            })
            .times(1)
            .returning(|_| {
                ok(r#"{"success":1,"return":{"user_id":"17","name":"Ten","balance":{"btc":"0.5","ten":"100"},"balance_hold":{"btc":"0.1"},"address":{"btc":"1abc","ten":""}}}"#)
            });

        let info = client(mock).user_info().await.unwrap();
        assert_eq!(info.user_id, "17");
        assert_eq!(info.address.len(), 1);
        let user = info.to_user();
        assert_eq!(user.id, 17);
        assert_eq!(user.assets.frozen("btc").to_string(), "0.1");
    }

    #[tokio::test]
    async fn test_nonce_is_milliseconds() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .withf(|req: &HttpRequest| {
                let nonce = req
                    .payload()
                    .split('&')
                    .find_map(|kv| kv.strip_prefix("nonce="))
                    .and_then(|n| n.parse::<i64>().ok())
                    .unwrap_or(0);
                nonce > Utc::now().timestamp() * 100
            })
            .returning(|_| ok(r#"{"success":1,"return":{"deposit":{},"withdraw":{}}}"#));

        let history = client(mock).user_transactions().await.unwrap();
        assert!(history.deposit.is_empty());
    }

    #[tokio::test]
    async fn test_unauthenticated_never_sends() {
        let mut mock = MockTransport::new();
        mock.expect_send().times(0);
        let cl = TokenomyV1Client::with_transport(Environment::default(), Arc::new(mock));

        assert!(cl.user_info().await.unwrap_err().is_unauthenticated());
        assert!(cl.trade_cancel_bid("ten_btc", 1).await.unwrap_err().is_unauthenticated());
    }

    #[tokio::test]
    async fn test_rejected_call() {
        let mut mock = MockTransport::new();
        mock.expect_send().returning(|_| {
            ok(r#"{"success":0,"error":"Invalid credentials. Bad sign.","error_code":"invalid_credentials"}"#)
        });

        let err = client(mock).user_info().await.unwrap_err();
        let api = err.api().unwrap();
        assert_eq!(api.code, REJECTED_CODE);
        assert_eq!(api.name, "invalid_credentials");
        assert_eq!(api.message, "Invalid credentials. Bad sign.");
    }

    #[tokio::test]
    async fn test_limit_bid_params() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .withf(|req: &HttpRequest| {
                let body = req.payload();
                body.starts_with("method=trade&nonce=")
                    && body.ends_with("&order_method=limit&pair=ten_btc&price=0.0000121&ten=1000&type=buy")
            })
            .times(1)
            .returning(|_| {
                ok(r#"{"success":1,"return":{"receive_ten":"0","spend_btc":"0","remain_btc":"0.0121","order_id":55,"balance":{"btc":"0.4879","frozen_btc":"0.0121"}}}"#)
            });

        let req = TradeRequest::limit("ten_btc", Rawfloat::new(dec!(1000)), Rawfloat::new(dec!(0.0000121)));
        let res = client(mock).trade_bid(&req).await.unwrap();
        let order = res.order.unwrap();
        assert_eq!(order.id, 55);
        assert_eq!(order.order_type, Some(TradeType::Buy));
        assert_eq!(order.remain_base.to_string(), "0.0121");
        assert_eq!(res.user.assets.frozen("btc").to_string(), "0.0121");
    }

    #[tokio::test]
    async fn test_huge_limit_bid_keeps_accepted_order() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .withf(|req: &HttpRequest| {
                req.payload()
                    .ends_with("&price=1000000000000000&ten=1000000000000000&type=buy")
            })
            .times(1)
            .returning(|_| ok(r#"{"success":1,"return":{"receive_ten":"0","spend_btc":"0","order_id":58}}"#));

        let huge = Rawfloat::from(1_000_000_000_000_000i64);
        let req = TradeRequest::limit("ten_btc", huge, huge);
        let res = client(mock).trade_bid(&req).await;
        tokio_test::assert_ok!(&res);

        let order = res.unwrap().order.unwrap();
        assert_eq!(order.id, 58);
        assert_eq!(order.amount_coin, huge);
        assert!(order.amount_base.is_zero());
    }

    #[tokio::test]
    async fn test_market_order_amount_asset() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .withf(|req: &HttpRequest| {
                let body = req.payload();
                body.contains("btc=0.01&method=trade") && !body.contains("price=")
            })
            .times(1)
            .returning(|_| ok(r#"{"success":1,"return":{"receive_ten":"800","spend_btc":"0.01","order_id":56}}"#));
        mock.expect_send()
            .withf(|req: &HttpRequest| req.payload().contains("&ten=500&type=sell"))
            .times(1)
            .returning(|_| ok(r#"{"success":1,"return":{"receive_btc":"0.006","sold_ten":"500","order_id":57}}"#));

        let cl = client(mock);
        let bid = TradeRequest::market("ten_btc", Rawfloat::new(dec!(0.01)));
        let res = cl.trade_bid(&bid).await.unwrap();
        assert_eq!(res.order.unwrap().filled_coin.to_string(), "800");

        let ask = TradeRequest::market("ten_btc", Rawfloat::new(dec!(500)));
        let res = cl.trade_ask(&ask).await.unwrap();
        assert_eq!(res.order.unwrap().amount_base.to_string(), "0.006");
    }

    #[tokio::test]
    async fn test_cancel_ask() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .withf(|req: &HttpRequest| {
                req.payload().contains("method=cancelOrder")
                    && req.payload().ends_with("&order_id=9&pair=ten_btc&type=sell")
            })
            .returning(|_| {
                ok(r#"{"success":1,"return":{"order_id":9,"type":"sell","pair":"ten_btc","balance":{"ten":"500"}}}"#)
            });

        let res = client(mock).trade_cancel_ask("ten_btc", 9).await.unwrap();
        let order = res.order.unwrap();
        assert_eq!(order.order_type, Some(TradeType::Sell));
        assert_eq!(order.status, "cancelled");
    }

    #[tokio::test]
    async fn test_open_orders_single_pair_list() {
        let mut mock = MockTransport::new();
        mock.expect_send().returning(|_| {
            ok(r#"{"success":1,"return":{"orders":[{"order_id":"3","submit_time":"1574423788","price":"0.0000121","type":"buy","order_btc":"0.01","remain_btc":"0.01"}]}}"#)
        });

        let orders = client(mock).user_orders_open("ten_btc").await.unwrap();
        let list = &orders["ten_btc"];
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].order_id, 3);
        assert_eq!(list[0].remain_asset, "btc");
    }

    #[test]
    fn test_trade_history_params() {
        let filter = TradeHistoryParams {
            count: 10,
            order: Some(SortOrder::Asc),
            since: Some(Utc.timestamp_opt(1574423788, 0).unwrap()),
            ..TradeHistoryParams::new("ten_btc")
        };
        let params = filter.pack().unwrap();
        assert_eq!(params["count"], "10");
        assert_eq!(params["order"], "asc");
        assert_eq!(params["since"], "1574423788");
        assert!(!params.contains_key("from_id"));

        assert_eq!(TradeHistoryParams::default().pack(), Err(RequestError::InvalidPair));
    }

    #[tokio::test]
    async fn test_withdraw_flat_response() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .withf(|req: &HttpRequest| {
                let body = req.payload();
                body.starts_with("currency=btc&method=withdrawCoin&nonce=")
                    && body.contains("&withdraw_address=1abc&withdraw_amount=0.5&withdraw_memo=")
            })
            .returning(|_| {
                ok(r#"{"success":1,"status":"approved","withdraw_currency":"btc","withdraw_address":"1abc","withdraw_amount":"0.5","fee":"0.0005","withdraw_id":"88"}"#)
            });

        let req = WithdrawRequest::new("btc", "1abc", Rawfloat::new(dec!(0.5)));
        let res = client(mock).user_withdraw(&req).await.unwrap();
        assert_eq!(res.id, "88");
        assert_eq!(res.fee, "0.0005");
    }

    #[tokio::test]
    async fn test_public_ticker_named_after_pair() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .withf(|req: &HttpRequest| {
                req.method == HttpMethod::Post
                    && req.url == "https://v1.example.com/api/ten_btc/ticker"
                    && req.headers.is_empty()
            })
            .returning(|_| ok(r#"{"ticker":{"high":"0.0000130","vol_ten":"15000","vol_btc":"0.18","last":"0.0000121"}}"#));

        let ticker = client(mock).market_ticker("ten_btc").await.unwrap();
        assert_eq!(ticker.name, "ten_btc");
        assert_eq!(ticker.coin_volume().to_string(), "15000");
    }

    #[tokio::test]
    async fn test_public_http_error() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .returning(|_| Ok(HttpResponse::new(404, "Not Found")));

        let err = client(mock).market_trades("xxx_btc").await.unwrap_err();
        assert_eq!(err.api().unwrap().code, 404);
        assert!(matches!(err, ClientError::Operation { operation: "market_trades", .. }));

        let err = client(MockTransport::new()).market_orders_open("").await.unwrap_err();
        assert!(matches!(err, ClientError::Request(RequestError::InvalidPair)));
    }
}
