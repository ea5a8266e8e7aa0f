use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::endpoints::{topics, v2 as api, websocket_url};
use super::transport::HttpMethod;
use super::websocket::{
    signed_handshake, BroadcastHandler, Handshake, WsConnection, WsResponse, BROADCAST_QUEUE,
};
use crate::auth::{sign_request, Params, TimestampPolicy};
use crate::config::Environment;
use crate::error::{ClientError, RequestError, Result, ResultExt};
use crate::types::{
    Order, PairTradesOpen, Trade, TradeRequest, TradeResponse, TradeType, User, WebSocketParams,
};

/// Authenticated WebSocket channel for trading and account queries.
///
/// The upgrade request is signed like a v2 REST call (`timestamp` query plus
/// Key/Sign headers) and signed again on every reconnect. Orders of the user
/// that close in the market are pushed to the receiver returned by
/// [`connect`](Self::connect).
pub struct PrivateWebSocket {
    conn: WsConnection,
}

impl PrivateWebSocket {
    pub async fn connect(env: &Environment) -> Result<(Self, mpsc::Receiver<Trade>)> {
        let credentials = env.credentials();
        if !credentials.is_configured() {
            return Err(ClientError::Unauthenticated).context("private_ws_connect");
        }

        let url = websocket_url(&env.address, api::WS_PRIVATE)?;
        let handshake: Handshake = Box::new(move || {
            let signed = sign_request(&credentials, Params::new(), TimestampPolicy::V2)?;
            signed_handshake(&url, &signed)
        });

        let (tx, rx) = mpsc::channel(BROADCAST_QUEUE);
        let handler: BroadcastHandler = Arc::new(move |res: WsResponse| on_broadcast(&tx, res));

        let conn = WsConnection::connect(handshake, handler, env.timeout(), env.reconnect_delay())
            .await
            .context("private_ws_connect")?;
        Ok((Self { conn }, rx))
    }

    pub async fn trade_ask(&self, req: &TradeRequest) -> Result<TradeResponse> {
        let (_, params) = req.pack()?;
        self.conn
            .send(HttpMethod::Post, api::TRADE_ASK, Some(&params))
            .await
            .context("trade_ask")
    }

    pub async fn trade_bid(&self, req: &TradeRequest) -> Result<TradeResponse> {
        let (_, params) = req.pack()?;
        self.conn
            .send(HttpMethod::Post, api::TRADE_BID, Some(&params))
            .await
            .context("trade_bid")
    }

    /// Cancels an open trade using its id, pair and type.
    pub async fn trade_cancel(&self, trade: &Trade) -> Result<Order> {
        if trade.id <= 0 {
            return Err(RequestError::InvalidTradeId.into());
        }
        if trade.pair.is_empty() {
            return Err(RequestError::InvalidPair.into());
        }
        let res = match trade.trade_type {
            Some(TradeType::Sell) => self.trade_cancel_ask(&trade.pair, trade.id).await?,
            Some(TradeType::Buy) => self.trade_cancel_bid(&trade.pair, trade.id).await?,
            None => return Err(RequestError::InvalidTradeType.into()),
        };
        res.order
            .ok_or_else(|| ClientError::InvalidResponse("cancel response without order".into()))
    }

    pub async fn trade_cancel_all(&self) -> Result<Vec<Trade>> {
        self.conn
            .send(HttpMethod::Delete, api::TRADE_CANCEL_ALL, None)
            .await
            .context("trade_cancel_all")
    }

    pub async fn trade_cancel_ask(&self, pair: &str, trade_id: i64) -> Result<TradeResponse> {
        let params = trade_params(pair, trade_id)?;
        self.conn
            .send(HttpMethod::Delete, api::TRADE_CANCEL_ASK, Some(&params))
            .await
            .context("trade_cancel_ask")
    }

    pub async fn trade_cancel_bid(&self, pair: &str, trade_id: i64) -> Result<TradeResponse> {
        let params = trade_params(pair, trade_id)?;
        self.conn
            .send(HttpMethod::Delete, api::TRADE_CANCEL_BID, Some(&params))
            .await
            .context("trade_cancel_bid")
    }

    pub async fn user_info(&self) -> Result<User> {
        self.conn
            .send(HttpMethod::Get, api::USER_INFO, None)
            .await
            .context("user_info")
    }

    pub async fn user_order_info(&self, pair: &str, trade_id: i64) -> Result<Trade> {
        if pair.is_empty() {
            return Err(RequestError::InvalidPair.into());
        }
        let params = WebSocketParams::for_trade(pair, trade_id);
        self.conn
            .send(HttpMethod::Get, api::USER_ORDER_INFO, Some(&params))
            .await
            .context("user_order_info")
    }

    pub async fn user_orders_open(&self, pair: &str) -> Result<PairTradesOpen> {
        let params = WebSocketParams::for_pair(pair);
        self.conn
            .send(HttpMethod::Get, api::USER_ORDERS_OPEN, Some(&params))
            .await
            .context("user_orders_open")
    }

    pub async fn close(&self) {
        self.conn.close().await;
    }
}

fn trade_params(pair: &str, trade_id: i64) -> std::result::Result<WebSocketParams, RequestError> {
    if pair.is_empty() {
        return Err(RequestError::InvalidPair);
    }
    if trade_id <= 0 {
        return Err(RequestError::InvalidTradeId);
    }
    Ok(WebSocketParams::for_trade(pair, trade_id))
}

fn on_broadcast(tx: &mpsc::Sender<Trade>, res: WsResponse) {
    if res.topic() != topics::USER_ORDERS_CLOSED {
        debug!("Ignoring private broadcast {}", res.topic());
        return;
    }
    let trade: Trade = match res.decode() {
        Ok(trade) => trade,
        Err(e) => {
            warn!("Invalid {} broadcast: {}", topics::USER_ORDERS_CLOSED, e);
            return;
        }
    };
    if let Err(e) = tx.try_send(trade) {
        warn!("Dropping closed order notification: {}", e);
    }
}
