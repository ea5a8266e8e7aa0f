use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

use super::endpoints::v2 as api;
use super::transport::{HttpMethod, HttpRequest, HttpResponse, ReqwestTransport, Transport};
use crate::auth::{canonicalize_params, sign_request, Credentials, Params, TimestampPolicy};
use crate::config::Environment;
use crate::error::{ApiError, ClientError, RequestError, Result, ResultExt};
use crate::types::params::names;
use crate::types::{
    AssetTransactions, ListTradeParams, MarketDepths, MarketInfo, MarketPrices, MarketSummaries,
    MarketTicker, MarketTrades, Order, PairTradesOpen, Trade, TradeRequest, TradeResponse,
    TradeType, TradesOpen, User, WithdrawItem, WithdrawRequest, DEFAULT_LIMIT,
};

/// `{"code","message","name","data"}` wrapper of every v2 response.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    message: String,
    #[serde(default)]
    name: String,
    data: Option<T>,
}

/// Maps HTTP errors to [`ApiError`] and unwraps `data` otherwise.
pub(crate) fn decode_response<T: DeserializeOwned + Default>(response: HttpResponse) -> Result<T> {
    if response.is_error() {
        let (message, name) = match serde_json::from_str::<Envelope<IgnoredAny>>(&response.body) {
            Ok(env) => (env.message, env.name),
            Err(_) => (response.body.trim().to_string(), String::new()),
        };
        return Err(ApiError::new(i64::from(response.status), message, name).into());
    }

    let env: Envelope<T> = serde_json::from_str(&response.body)?;
    Ok(env.data.unwrap_or_default())
}

/// REST client for API v2.
///
/// Public market endpoints work without credentials; every `user_*` and
/// `trade_*` call is signed and fails with `Unauthenticated` before any I/O
/// when the token or secret is missing.
pub struct TokenomyClient {
    env: Environment,
    credentials: Credentials,
    transport: Arc<dyn Transport>,
}

impl TokenomyClient {
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

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Checks the API key by fetching the user information.
    pub async fn authenticate(&self) -> Result<User> {
        let user = self.user_info().await.context("authenticate")?;
        info!("Authenticated as user {}", user.id);
        Ok(user)
    }

    pub async fn market_depths(&self, pair: &str) -> Result<MarketDepths> {
        let params = pair_params(pair)?;
        self.public_request("market_depths", api::MARKET_DEPTHS, params)
            .await
    }

    pub async fn market_info(&self) -> Result<Vec<MarketInfo>> {
        self.public_request("market_info", api::MARKET_INFO, Params::new())
            .await
    }

    /// Open asks and bids of the pair.
    pub async fn market_trades_open(&self, pair: &str) -> Result<TradesOpen> {
        let params = pair_params(pair)?;
        self.public_request("market_trades_open", api::MARKET_TRADES_OPEN, params)
            .await
    }

    pub async fn market_prices(&self) -> Result<MarketPrices> {
        self.public_request("market_prices", api::MARKET_PRICES, Params::new())
            .await
    }

    pub async fn market_ticker(&self, pair: &str) -> Result<MarketTicker> {
        let params = pair_params(pair)?;
        self.public_request("market_ticker", api::MARKET_TICKER, params)
            .await
    }

    /// Completed trades of the pair, grouped by side.
    pub async fn market_trades(&self, pair: &str, offset: i64, limit: i64) -> Result<MarketTrades> {
        let mut params = pair_params(pair)?;
        params.insert(names::OFFSET.into(), offset.max(0).to_string());
        params.insert(names::LIMIT.into(), limit.to_string());
        self.public_request("market_trades", api::MARKET_TRADES, params)
            .await
    }

    pub async fn market_summaries(&self) -> Result<MarketSummaries> {
        self.public_request("market_summaries", api::MARKET_SUMMARIES, Params::new())
            .await
    }

    pub async fn user_info(&self) -> Result<User> {
        self.secure_request("user_info", HttpMethod::Get, api::USER_INFO, Params::new())
            .await
    }

    /// Trade history of the user, latest first unless sorted ascending.
    pub async fn user_trades(&self, list: &ListTradeParams) -> Result<Vec<Trade>> {
        let params = list.pack()?;
        self.secure_request("user_trades", HttpMethod::Get, api::USER_TRADES, params)
            .await
    }

    /// Closed orders submitted between `time_after` and `time_before`; the
    /// server picks the last hour when both are zero.
    pub async fn user_orders_closed(
        &self,
        pair: &str,
        time_after: i64,
        time_before: i64,
    ) -> Result<Vec<Trade>> {
        let mut params = pair_params(pair)?;
        params.insert(names::TIME_AFTER.into(), time_after.to_string());
        params.insert(names::TIME_BEFORE.into(), time_before.to_string());
        self.secure_request(
            "user_orders_closed",
            HttpMethod::Get,
            api::USER_ORDERS_CLOSED,
            params,
        )
        .await
    }

    pub async fn user_orders_open(&self, pair: &str) -> Result<PairTradesOpen> {
        let params = pair_params(pair)?;
        self.secure_request("user_orders_open", HttpMethod::Get, api::USER_ORDERS_OPEN, params)
            .await
    }

    pub async fn user_order_info(&self, pair: &str, trade_id: i64) -> Result<Trade> {
        let params = trade_id_params(pair, trade_id)?;
        self.secure_request("user_order_info", HttpMethod::Get, api::USER_ORDER_INFO, params)
            .await
    }

    /// Deposits and withdrawals, optionally of one asset. `limit` is only sent
    /// when it is within `1..=100`.
    pub async fn user_transactions(&self, asset: &str, limit: i64) -> Result<AssetTransactions> {
        let mut params = Params::new();
        if !asset.is_empty() {
            params.insert(names::ASSET.into(), asset.to_string());
        }
        if limit > 0 && limit <= DEFAULT_LIMIT {
            params.insert(names::LIMIT.into(), limit.to_string());
        }
        self.secure_request(
            "user_transactions",
            HttpMethod::Get,
            api::USER_TRANSACTIONS,
            params,
        )
        .await
    }

    /// Requests a withdrawal. Needs the "withdraw" permission and a callback
    /// URL registered with the API key.
    pub async fn user_withdraw(&self, req: &WithdrawRequest) -> Result<WithdrawItem> {
        let params = req.pack()?;
        self.secure_request("user_withdraw", HttpMethod::Post, api::USER_WITHDRAW, params)
            .await
    }

    /// Sells `amount` of the coin.
    pub async fn trade_ask(&self, req: &TradeRequest) -> Result<TradeResponse> {
        let (params, _) = req.pack()?;
        self.secure_request("trade_ask", HttpMethod::Post, api::TRADE_ASK, params)
            .await
    }

    /// Buys `amount` of the coin.
    pub async fn trade_bid(&self, req: &TradeRequest) -> Result<TradeResponse> {
        let (params, _) = req.pack()?;
        self.secure_request("trade_bid", HttpMethod::Post, api::TRADE_BID, params)
            .await
    }

    /// Cancels an open trade using its id, pair and type.
    pub async fn trade_cancel(&self, trade: &Trade) -> Result<Order> {
        if trade.id <= 0 {
            return Err(RequestError::InvalidTradeId.into());
        }
        let res = match trade.trade_type {
            Some(TradeType::Sell) => self.trade_cancel_ask(&trade.pair, trade.id).await?,
            Some(TradeType::Buy) => self.trade_cancel_bid(&trade.pair, trade.id).await?,
            None => return Err(RequestError::InvalidTradeType.into()),
        };
        res.order
            .ok_or_else(|| ClientError::InvalidResponse("cancel response without order".into()))
    }

    /// Cancels every open ask and bid of the user.
    pub async fn trade_cancel_all(&self) -> Result<Vec<Trade>> {
        self.secure_request(
            "trade_cancel_all",
            HttpMethod::Delete,
            api::TRADE_CANCEL_ALL,
            Params::new(),
        )
        .await
    }

    pub async fn trade_cancel_ask(&self, pair: &str, trade_id: i64) -> Result<TradeResponse> {
        let params = trade_id_params(pair, trade_id)?;
        self.secure_request("trade_cancel_ask", HttpMethod::Delete, api::TRADE_CANCEL_ASK, params)
            .await
    }

    pub async fn trade_cancel_bid(&self, pair: &str, trade_id: i64) -> Result<TradeResponse> {
        let params = trade_id_params(pair, trade_id)?;
        self.secure_request("trade_cancel_bid", HttpMethod::Delete, api::TRADE_CANCEL_BID, params)
            .await
    }

    async fn public_request<T: DeserializeOwned + Default>(
        &self,
        operation: &'static str,
        path: &str,
        params: Params,
    ) -> Result<T> {
        let payload = canonicalize_params(&params);
        let request = HttpRequest::new(HttpMethod::Get, &self.env.address, path, &payload);
        debug!("{}: {} {}", operation, request.method, request.url);

        let response = self.transport.send(request).await.context(operation)?;
        decode_response(response).context(operation)
    }

    async fn secure_request<T: DeserializeOwned + Default>(
        &self,
        operation: &'static str,
        method: HttpMethod,
        path: &str,
        params: Params,
    ) -> Result<T> {
        let signed = sign_request(&self.credentials, params, TimestampPolicy::V2).context(operation)?;
        let request = HttpRequest::new(method, &self.env.address, path, &signed.payload)
            .with_headers(signed.headers());
        if self.env.logs_bodies() {
            debug!("{}: {} {} {}", operation, method, path, signed.payload);
        } else {
            debug!("{}: {} {}", operation, method, path);
        }

        let response = self.transport.send(request).await.context(operation)?;
        decode_response(response).context(operation)
    }
}

fn pair_params(pair: &str) -> std::result::Result<Params, RequestError> {
    if pair.is_empty() {
        return Err(RequestError::InvalidPair);
    }
    let mut params = Params::new();
    params.insert(names::PAIR.into(), pair.to_string());
    Ok(params)
}

fn trade_id_params(pair: &str, trade_id: i64) -> std::result::Result<Params, RequestError> {
    let mut params = pair_params(pair)?;
    if trade_id <= 0 {
        return Err(RequestError::InvalidTradeId);
    }
    params.insert(names::TRADE_ID.into(), trade_id.to_string());
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::sign;
    use crate::exchange::transport::MockTransport;
    use crate::types::Rawfloat;
    use rust_decimal_macros::dec;

    const ADDRESS: &str = "https://api.example.com";

    fn env(token: &str, secret: &str) -> Environment {
        Environment::new(token, secret).with_address(ADDRESS)
    }

    fn client(mock: MockTransport) -> TokenomyClient {
        TokenomyClient::with_transport(env("my-key", "secr3t"), Arc::new(mock))
    }

    fn ok(body: &'static str) -> Result<HttpResponse> {
        Ok(HttpResponse::new(200, body))
    }

    #[tokio::test]
    async fn test_private_call_without_credentials_never_sends() {
        let mut mock = MockTransport::new();
        mock.expect_send().times(0);
        let cl = TokenomyClient::with_transport(env("", ""), Arc::new(mock));

        let err = cl.user_info().await.unwrap_err();
        assert!(err.is_unauthenticated());

        let req = TradeRequest::limit("ten_btc", Rawfloat::new(dec!(1)), Rawfloat::new(dec!(0.1)));
        assert!(cl.trade_bid(&req).await.unwrap_err().is_unauthenticated());
        assert!(cl.trade_cancel_all().await.unwrap_err().is_unauthenticated());

        let key_only = TokenomyClient::with_transport(env("my-key", ""), Arc::new(MockTransport::new()));
        assert!(key_only.user_info().await.unwrap_err().is_unauthenticated());
    }

    #[tokio::test]
    async fn test_signed_get_request() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .withf(|req: &HttpRequest| {
                let payload = req.payload();
                req.method == HttpMethod::Get
                    && req.url.starts_with("https://api.example.com/v2/user/order?")
                    && req.body.is_none()
                    && payload.starts_with("pair=ten_btc&timestamp=")
                    && payload.ends_with("&trade_id=42")
                    && req.header("Key") == Some("my-key")
                    && req.header("Sign") == Some(sign(payload, "secr3t").as_str())
            })
            .times(1)
            .returning(|_| ok(r#"{"code":200,"data":{"id":42,"pair":"ten_btc","type":"buy","price":"0.0000121"}}"#));

        let trade = client(mock).user_order_info("ten_btc", 42).await.unwrap();
        assert_eq!(trade.id, 42);
        assert_eq!(trade.trade_type, Some(TradeType::Buy));
        assert_eq!(trade.price.to_string(), "0.0000121");
    }

    #[tokio::test]
    async fn test_trade_bid_posts_form() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .withf(|req: &HttpRequest| {
                let body = req.body.as_deref().unwrap_or("");
                req.method == HttpMethod::Post
                    && req.url == "https://api.example.com/v2/trade/bid"
                    && body.starts_with("amount=150&pair=ten_btc&post_only=false&price=0.00001234&timestamp=")
                    && body.ends_with("&trade_method=limit")
            })
            .times(1)
            .returning(|_| {
                ok(r#"{"data":{"order":{"id":9,"type":"buy","method":"limit","submit_time":1,"remain_coin":"150"},"user":{"balances":{"btc":"0.5"}}}}"#)
            });

        let req = TradeRequest::limit("ten_btc", Rawfloat::new(dec!(150)), Rawfloat::new(dec!(0.00001234)));
        let res = client(mock).trade_bid(&req).await.unwrap();
        assert_eq!(res.order.unwrap().remain_coin.to_string(), "150");
        assert_eq!(res.user.assets.balance("btc").to_string(), "0.5");
    }

    #[tokio::test]
    async fn test_api_error_from_status() {
        let mut mock = MockTransport::new();
        mock.expect_send().times(1).returning(|_| {
            Ok(HttpResponse::new(
                401,
                r#"{"code":401,"message":"invalid signature","name":"ERR_INVALID_SIGNATURE"}"#,
            ))
        });

        let err = client(mock).user_info().await.unwrap_err();
        let api = err.api().unwrap();
        assert_eq!(api.code, 401);
        assert_eq!(api.message, "invalid signature");
        assert!(api.is("ERR_INVALID_SIGNATURE"));
        assert!(err.to_string().starts_with("user_info: "));
    }

    #[tokio::test]
    async fn test_api_error_with_plain_body() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .returning(|_| Ok(HttpResponse::new(502, "Bad Gateway\n")));

        let err = client(mock).market_prices().await.unwrap_err();
        assert_eq!(err.api().unwrap(), &ApiError::new(502, "Bad Gateway", ""));
    }

    #[tokio::test]
    async fn test_transport_error_carries_operation() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .returning(|_| Err(ClientError::WebSocket("connection reset".into())));

        let err = client(mock).market_summaries().await.unwrap_err();
        assert!(matches!(err, ClientError::Operation { operation: "market_summaries", .. }));
    }

    #[tokio::test]
    async fn test_validation_happens_before_io() {
        let mut mock = MockTransport::new();
        mock.expect_send().times(0);
        let cl = client(mock);

        let err = cl.trade_cancel_ask("ten_btc", 0).await.unwrap_err();
        assert!(matches!(err, ClientError::Request(RequestError::InvalidTradeId)));
        let err = cl.market_depths("").await.unwrap_err();
        assert!(matches!(err, ClientError::Request(RequestError::InvalidPair)));

        let untyped = Trade {
            id: 3,
            pair: "ten_btc".into(),
            ..Default::default()
        };
        let err = cl.trade_cancel(&untyped).await.unwrap_err();
        assert!(matches!(err, ClientError::Request(RequestError::InvalidTradeType)));

        let withdraw = WithdrawRequest::new("btc", "", Rawfloat::new(dec!(1)));
        let err = cl.user_withdraw(&withdraw).await.unwrap_err();
        assert!(matches!(err, ClientError::Request(RequestError::WalletAddress)));
    }

    #[tokio::test]
    async fn test_trade_cancel_dispatches_on_type() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .withf(|req: &HttpRequest| {
                req.method == HttpMethod::Delete
                    && req.url.starts_with("https://api.example.com/v2/trade/cancel/ask?")
                    && req.payload().contains("trade_id=77")
            })
            .times(1)
            .returning(|_| ok(r#"{"data":{"order":{"id":77,"type":"sell","submit_time":5,"finish_time":6,"status":"cancelled"}}}"#));

        let trade = Trade {
            id: 77,
            pair: "ten_btc".into(),
            trade_type: Some(TradeType::Sell),
            ..Default::default()
        };
        let order = client(mock).trade_cancel(&trade).await.unwrap();
        assert_eq!(order.id, 77);
        assert_eq!(order.status, "cancelled");
    }

    #[tokio::test]
    async fn test_public_market_depths() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .withf(|req: &HttpRequest| {
                req.url == "https://api.example.com/v2/market/depths?pair=ten_btc" && req.headers.is_empty()
            })
            .returning(|_| {
                ok(r#"{"code":200,"data":{"pair":"ten_btc","asks":[{"amount":"10","price":"0.0000125"}],"bids":[]}}"#)
            });

        let depths = client(mock).market_depths("ten_btc").await.unwrap();
        assert_eq!(depths.asks.len(), 1);
        assert!(depths.bids.is_empty());
    }

    #[tokio::test]
    async fn test_user_transactions_limit_filter() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .withf(|req: &HttpRequest| {
                let payload = req.payload();
                payload.contains("asset=btc") && !payload.contains("limit=")
            })
            .times(1)
            .returning(|_| ok(r#"{"data":{"deposit":{},"withdraw":{}}}"#));

        let trans = client(mock).user_transactions("btc", 500).await.unwrap();
        assert!(trans.deposit.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_all_with_null_data() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .returning(|_| ok(r#"{"code":200,"message":"","data":null}"#));

        let canceled = client(mock).trade_cancel_all().await;
        tokio_test::assert_ok!(&canceled);
        assert!(canceled.unwrap().is_empty());
    }
}
