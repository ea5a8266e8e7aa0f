//! Paths of the REST and WebSocket APIs.

use url::Url;

use crate::error::{ClientError, Result};

pub mod v2 {
    pub const MARKET_DEPTHS: &str = "/v2/market/depths";
    pub const MARKET_INFO: &str = "/v2/market/info";
    pub const MARKET_TRADES_OPEN: &str = "/v2/market/trades/open";
    pub const MARKET_PRICES: &str = "/v2/market/prices";
    pub const MARKET_TICKER: &str = "/v2/market/ticker";
    pub const MARKET_TRADES: &str = "/v2/market/trades";
    pub const MARKET_SUMMARIES: &str = "/v2/market/summaries";

    pub const USER_INFO: &str = "/v2/user/info";
    pub const USER_TRADES: &str = "/v2/user/trades";
    pub const USER_ORDERS_CLOSED: &str = "/v2/user/orders/closed";
    pub const USER_ORDERS_OPEN: &str = "/v2/user/orders/open";
    pub const USER_ORDER_INFO: &str = "/v2/user/order";
    pub const USER_TRANSACTIONS: &str = "/v2/user/transactions";
    pub const USER_WITHDRAW: &str = "/v2/user/withdraw";

    pub const TRADE_ASK: &str = "/v2/trade/ask";
    pub const TRADE_BID: &str = "/v2/trade/bid";
    pub const TRADE_CANCEL_ALL: &str = "/v2/trade/cancel/all";
    pub const TRADE_CANCEL_ASK: &str = "/v2/trade/cancel/ask";
    pub const TRADE_CANCEL_BID: &str = "/v2/trade/cancel/bid";

    pub const WS_PRIVATE: &str = "/v2/user/ws";
    pub const WS_PUBLIC: &str = "/v2/ws";
    pub const WS_PUBLIC_SUBSCRIPTION: &str = "/v2/ws/subscription";
}

pub mod v1 {
    pub const PRIVATE: &str = "/tapi";

    pub const MARKET_SUMMARIES: &str = "/api/summaries";
    pub const MARKET_INFO: &str = "/api/market_info";

    pub fn market_ticker(pair: &str) -> String {
        format!("/api/{}/ticker", pair)
    }

    pub fn market_trades(pair: &str) -> String {
        format!("/api/{}/trades", pair)
    }

    pub fn market_depth(pair: &str) -> String {
        format!("/api/{}/depth", pair)
    }

    pub const METHOD_TRADE: &str = "trade";
    pub const METHOD_CANCEL_ORDER: &str = "cancelOrder";
    pub const METHOD_USER_INFO: &str = "getInfo";
    pub const METHOD_USER_ORDER: &str = "getOrder";
    pub const METHOD_USER_ORDERS_OPEN: &str = "openOrders";
    pub const METHOD_USER_ORDER_HISTORY: &str = "orderHistory";
    pub const METHOD_USER_TRADE_HISTORY: &str = "tradeHistory";
    pub const METHOD_USER_TRANS_HISTORY: &str = "transHistory";
    pub const METHOD_USER_WITHDRAW: &str = "withdrawCoin";
}

/// Broadcast topics pushed by the server with request id 0.
pub mod topics {
    pub const USER_ORDERS_CLOSED: &str = "/v2/user/orders/closed";
    pub const MARKET_TRADES: &str = "/v2/market/trades";
    pub const MARKET_TRADES_OPEN: &str = "/v2/market/trades/open";
    pub const MARKET_DEPTHS: &str = "/v2/market/depths";
}

/// Joins `path` to the HTTP address and switches the scheme to `ws`/`wss`.
pub fn websocket_url(address: &str, path: &str) -> Result<Url> {
    let mut url = Url::parse(address)
        .map_err(|e| ClientError::InvalidResponse(format!("invalid address {:?}: {}", address, e)))?;

    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(ClientError::InvalidResponse(format!(
                "unsupported scheme {:?} in {:?}",
                other, address
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| ClientError::InvalidResponse(format!("cannot use {} for {:?}", scheme, address)))?;
    url.set_path(path);
    url.set_query(None);
    Ok(url)
}
