use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use super::endpoints::{topics, v2 as api, websocket_url};
use super::transport::HttpMethod;
use super::websocket::{
    plain_handshake, BroadcastHandler, Handshake, WsConnection, WsResponse, BROADCAST_QUEUE,
};
use crate::config::Environment;
use crate::error::{RequestError, Result, ResultExt};
use crate::types::{
    MarketDepths, MarketPrices, MarketTicker, MarketTrades, PublicSubscription, Trade,
    WebSocketParams,
};

/// Market data pushed on the public channel.
#[derive(Debug, Clone, PartialEq)]
pub enum PublicEvent {
    /// Opened, closed or cancelled order of a subscribed pair.
    Trade(Trade),
    Depths(MarketDepths),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Topic {
    Depths,
    Trades,
}

/// Unauthenticated WebSocket channel for market data and subscriptions.
pub struct PublicWebSocket {
    conn: WsConnection,
    subs: Mutex<PublicSubscription>,
}

impl PublicWebSocket {
    /// Connects and returns the receiver of subscribed market events.
    pub async fn connect(env: &Environment) -> Result<(Self, mpsc::Receiver<PublicEvent>)> {
        let url = websocket_url(&env.address, api::WS_PUBLIC)?;
        let handshake: Handshake = Box::new(move || plain_handshake(&url));

        let (tx, rx) = mpsc::channel(BROADCAST_QUEUE);
        let handler: BroadcastHandler = Arc::new(move |res: WsResponse| on_broadcast(&tx, res));

        let conn = WsConnection::connect(handshake, handler, env.timeout(), env.reconnect_delay())
            .await
            .context("public_ws_connect")?;
        let ws = Self {
            conn,
            subs: Mutex::new(PublicSubscription::default()),
        };
        Ok((ws, rx))
    }

    pub async fn market_depths(&self, pair: &str) -> Result<MarketDepths> {
        let params = pair_params(pair)?;
        self.conn
            .send(HttpMethod::Get, api::MARKET_DEPTHS, Some(&params))
            .await
            .context("market_depths")
    }

    pub async fn market_prices(&self) -> Result<MarketPrices> {
        self.conn
            .send(HttpMethod::Get, api::MARKET_PRICES, None)
            .await
            .context("market_prices")
    }

    pub async fn market_ticker(&self, pair: &str) -> Result<MarketTicker> {
        let params = pair_params(pair)?;
        self.conn
            .send(HttpMethod::Get, api::MARKET_TICKER, Some(&params))
            .await
            .context("market_ticker")
    }

    pub async fn market_trades(&self, pair: &str, offset: i64, limit: i64) -> Result<MarketTrades> {
        let mut params = pair_params(pair)?;
        params.offset = offset;
        params.limit = limit;
        self.conn
            .send(HttpMethod::Get, api::MARKET_TRADES, Some(&params))
            .await
            .context("market_trades")
    }

    /// Current subscription as reported by the server.
    pub async fn subscription(&self) -> Result<PublicSubscription> {
        let subs: PublicSubscription = self
            .conn
            .send(HttpMethod::Get, api::WS_PUBLIC_SUBSCRIPTION, None)
            .await
            .context("subscription")?;
        *self.subs.lock().await = subs.clone();
        Ok(subs)
    }

    /// Adds market depth updates of `pairs`. Earlier pairs stay subscribed.
    pub async fn subscribe_depths(&self, pairs: &[&str]) -> Result<PublicSubscription> {
        self.subscribe(Topic::Depths, pairs)
            .await
            .context("subscribe_depths")
    }

    /// Adds order updates of `pairs`, delivered as [`PublicEvent::Trade`].
    pub async fn subscribe_trades(&self, pairs: &[&str]) -> Result<PublicSubscription> {
        self.subscribe(Topic::Trades, pairs)
            .await
            .context("subscribe_trades")
    }

    /// Stops depth updates of `pairs`, or of every subscribed pair when empty.
    pub async fn unsubscribe_depths(&self, pairs: &[&str]) -> Result<PublicSubscription> {
        self.unsubscribe(Topic::Depths, pairs)
            .await
            .context("unsubscribe_depths")
    }

    /// Stops order updates of `pairs`, or of every subscribed pair when empty.
    pub async fn unsubscribe_trades(&self, pairs: &[&str]) -> Result<PublicSubscription> {
        self.unsubscribe(Topic::Trades, pairs)
            .await
            .context("unsubscribe_trades")
    }

    pub async fn close(&self) {
        self.conn.close().await;
    }

    async fn subscribe(&self, topic: Topic, pairs: &[&str]) -> Result<PublicSubscription> {
        if pairs.is_empty() {
            return Ok(self.subs.lock().await.clone());
        }
        let pairs = pairs.iter().map(|p| p.to_string()).collect();
        self.update(HttpMethod::Post, topic_params(topic, pairs))
            .await
    }

    async fn unsubscribe(&self, topic: Topic, pairs: &[&str]) -> Result<PublicSubscription> {
        let pairs: Vec<String> = if pairs.is_empty() {
            let subs = self.subs.lock().await;
            match topic {
                Topic::Depths => subs.depths.clone(),
                Topic::Trades => subs.trades.clone(),
            }
        } else {
            pairs.iter().map(|p| p.to_string()).collect()
        };
        if pairs.is_empty() {
            return Ok(self.subs.lock().await.clone());
        }
        self.update(HttpMethod::Delete, topic_params(topic, pairs))
            .await
    }

    async fn update(&self, method: HttpMethod, params: WebSocketParams) -> Result<PublicSubscription> {
        let subs: PublicSubscription = self
            .conn
            .send(method, api::WS_PUBLIC_SUBSCRIPTION, Some(&params))
            .await?;
        debug!("Public subscription: {:?}", subs);
        *self.subs.lock().await = subs.clone();
        Ok(subs)
    }
}

fn pair_params(pair: &str) -> std::result::Result<WebSocketParams, RequestError> {
    if pair.is_empty() {
        return Err(RequestError::InvalidPair);
    }
    Ok(WebSocketParams::for_pair(pair))
}

fn topic_params(topic: Topic, pairs: Vec<String>) -> WebSocketParams {
    match topic {
        Topic::Depths => WebSocketParams {
            depths: pairs,
            ..Default::default()
        },
        Topic::Trades => WebSocketParams {
            trades: pairs,
            ..Default::default()
        },
    }
}

fn on_broadcast(tx: &mpsc::Sender<PublicEvent>, res: WsResponse) {
    let event = match res.topic() {
        topics::MARKET_TRADES | topics::MARKET_TRADES_OPEN => res.decode().map(PublicEvent::Trade),
        topics::MARKET_DEPTHS => res.decode().map(PublicEvent::Depths),
        other => {
            debug!("Ignoring public broadcast {}", other);
            return;
        }
    };

    match event {
        Ok(event) => {
            if tx.try_send(event).is_err() {
                warn!("Public event queue full or closed, dropping {}", res.topic());
            }
        }
        Err(e) => warn!("Invalid {} broadcast: {}", res.topic(), e),
    }
}
