use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request as ClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use url::Url;

use super::transport::HttpMethod;
use crate::auth::SignedRequest;
use crate::error::{ApiError, ClientError, Result};
use crate::types::WebSocketParams;

/// Request id of server pushed messages.
pub const BROADCAST_ID: u64 = 0;

/// Capacity of the broadcast receivers; events beyond it are dropped.
pub const BROADCAST_QUEUE: usize = 256;

const STATUS_OK: i64 = 200;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Builds the upgrade request; called again on every reconnect.
pub type Handshake = Box<dyn Fn() -> Result<ClientRequest> + Send + Sync>;

/// Receives every message with id [`BROADCAST_ID`].
pub type BroadcastHandler = Arc<dyn Fn(WsResponse) + Send + Sync>;

/// Request frame. `body` is the base64 of the JSON parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WsRequest {
    pub id: u64,
    pub method: String,
    pub target: String,
    #[serde(default)]
    pub body: String,
}

impl WsRequest {
    pub fn new(
        id: u64,
        method: HttpMethod,
        target: &str,
        params: Option<&WebSocketParams>,
    ) -> Result<Self> {
        let body = match params {
            Some(params) => STANDARD.encode(params.pack()?),
            None => String::new(),
        };
        Ok(Self {
            id,
            method: method.as_str().to_string(),
            target: target.to_string(),
            body,
        })
    }

    pub fn params(&self) -> Result<WebSocketParams> {
        if self.body.is_empty() {
            return Ok(WebSocketParams::default());
        }
        Ok(WebSocketParams::unpack(&STANDARD.decode(&self.body)?)?)
    }
}

/// Reply or broadcast frame. Broadcasts carry their topic in `message`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WsResponse {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub body: String,
}

impl WsResponse {
    pub fn reply<T: Serialize>(id: u64, value: &T) -> Result<Self> {
        Ok(Self {
            id,
            code: STATUS_OK,
            message: String::new(),
            body: STANDARD.encode(serde_json::to_vec(value)?),
        })
    }

    pub fn broadcast<T: Serialize>(topic: &str, value: &T) -> Result<Self> {
        Ok(Self {
            id: BROADCAST_ID,
            message: topic.to_string(),
            ..Self::reply(BROADCAST_ID, value)?
        })
    }

    pub fn is_broadcast(&self) -> bool {
        self.id == BROADCAST_ID
    }

    pub fn topic(&self) -> &str {
        &self.message
    }

    /// Fails with an [`ApiError`] unless the code is 200.
    pub fn into_result(self) -> Result<Self> {
        if self.code != STATUS_OK {
            return Err(ApiError::new(self.code, self.message, "").into());
        }
        Ok(self)
    }

    /// Decodes the body; an empty body gives the default value.
    pub fn decode<T: DeserializeOwned + Default>(&self) -> Result<T> {
        if self.body.is_empty() {
            return Ok(T::default());
        }
        let bytes = STANDARD.decode(&self.body)?;
        if bytes.is_empty() {
            return Ok(T::default());
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

type Pending = oneshot::Sender<Result<WsResponse>>;

/// Pending requests keyed by correlation id.
pub struct RequestTable {
    next_id: AtomicU64,
    pending: Mutex<HashMap<u64, Pending>>,
}

impl RequestTable {
    pub fn new() -> Self {
        let seed = Utc::now().timestamp_nanos_opt().unwrap_or_default() as u64;
        Self {
            next_id: AtomicU64::new(seed.max(1)),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Monotonic and never [`BROADCAST_ID`].
    pub fn next_id(&self) -> u64 {
        loop {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            if id != BROADCAST_ID {
                return id;
            }
        }
    }

    pub async fn register(&self, id: u64) -> oneshot::Receiver<Result<WsResponse>> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);
        rx
    }

    /// Hands the reply to its caller. False when nobody waits for it.
    pub async fn resolve(&self, res: WsResponse) -> bool {
        let Some(tx) = self.pending.lock().await.remove(&res.id) else {
            return false;
        };
        tx.send(Ok(res)).is_ok()
    }

    pub async fn cancel(&self, id: u64) {
        self.pending.lock().await.remove(&id);
    }

    /// Wakes every pending caller with `ConnectionClosed`.
    pub async fn fail_all(&self) {
        let drained: Vec<Pending> = self.pending.lock().await.drain().map(|(_, tx)| tx).collect();
        if !drained.is_empty() {
            debug!("Failing {} pending WebSocket requests", drained.len());
        }
        for tx in drained {
            let _ = tx.send(Err(ClientError::ConnectionClosed));
        }
    }

    pub async fn len(&self) -> usize {
        self.pending.lock().await.len()
    }
}

impl Default for RequestTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Upgrade request for `url` carrying the signed query and the Key/Sign
/// headers.
pub fn signed_handshake(url: &Url, signed: &SignedRequest) -> Result<ClientRequest> {
    let mut url = url.clone();
    url.set_query(Some(&signed.payload));

    let mut request = url.as_str().into_client_request()?;
    for (name, value) in signed.headers() {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ClientError::WebSocket(e.to_string()))?;
        let value =
            HeaderValue::from_str(&value).map_err(|e| ClientError::WebSocket(e.to_string()))?;
        request.headers_mut().insert(name, value);
    }
    Ok(request)
}

/// Upgrade request without authentication.
pub fn plain_handshake(url: &Url) -> Result<ClientRequest> {
    Ok(url.as_str().into_client_request()?)
}

/// A request/response WebSocket connection that reconnects by itself.
///
/// A background task owns the socket: it writes queued frames, routes
/// replies to their callers by id and broadcasts to the handler. When the
/// socket drops, pending callers fail with `ConnectionClosed` and the
/// handshake is rebuilt after the reconnect delay.
pub struct WsConnection {
    outgoing: mpsc::UnboundedSender<String>,
    requests: Arc<RequestTable>,
    shutdown: watch::Sender<bool>,
    timeout: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl WsConnection {
    pub async fn connect(
        handshake: Handshake,
        handler: BroadcastHandler,
        timeout: Duration,
        reconnect_delay: Duration,
    ) -> Result<Self> {
        let stream = open(&handshake).await?;
        info!("WebSocket connected");

        let requests = Arc::new(RequestTable::new());
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let driver = Driver {
            handshake,
            handler,
            requests: requests.clone(),
            outgoing: outgoing_rx,
            shutdown: shutdown_rx,
            reconnect_delay,
        };
        let task = tokio::spawn(driver.run(stream));

        Ok(Self {
            outgoing: outgoing_tx,
            requests,
            shutdown: shutdown_tx,
            timeout,
            task: Mutex::new(Some(task)),
        })
    }

    /// Sends one request and waits for the reply with the same id.
    pub async fn request(
        &self,
        method: HttpMethod,
        target: &str,
        params: Option<&WebSocketParams>,
    ) -> Result<WsResponse> {
        if self.is_closed() {
            return Err(ClientError::ConnectionClosed);
        }

        let id = self.requests.next_id();
        let frame = serde_json::to_string(&WsRequest::new(id, method, target, params)?)?;
        let reply = self.requests.register(id).await;

        debug!("WebSocket >>> {} {} id={}", method, target, id);
        if self.outgoing.send(frame).is_err() {
            self.requests.cancel(id).await;
            return Err(ClientError::ConnectionClosed);
        }

        match tokio::time::timeout(self.timeout, reply).await {
            Ok(Ok(res)) => res?.into_result(),
            Ok(Err(_)) => Err(ClientError::ConnectionClosed),
            Err(_) => {
                self.requests.cancel(id).await;
                Err(ClientError::Timeout)
            }
        }
    }

    /// [`request`](Self::request) followed by decoding of the reply body.
    pub async fn send<T: DeserializeOwned + Default>(
        &self,
        method: HttpMethod,
        target: &str,
        params: Option<&WebSocketParams>,
    ) -> Result<T> {
        self.request(method, target, params).await?.decode()
    }

    pub fn is_closed(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Stops the driver and fails every pending request. Idempotent.
    pub async fn close(&self) {
        if self.shutdown.send_replace(true) {
            return;
        }
        self.requests.fail_all().await;
        if let Some(task) = self.task.lock().await.take() {
            let _ = task.await;
        }
        info!("WebSocket closed");
    }
}

impl Drop for WsConnection {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

async fn open(handshake: &Handshake) -> Result<WsStream> {
    let request = handshake()?;
    debug!("WebSocket connecting to {}", request.uri());
    let (stream, _) = connect_async(request).await?;
    Ok(stream)
}

enum Exit {
    Shutdown,
    Disconnected(String),
}

struct Driver {
    handshake: Handshake,
    handler: BroadcastHandler,
    requests: Arc<RequestTable>,
    outgoing: mpsc::UnboundedReceiver<String>,
    shutdown: watch::Receiver<bool>,
    reconnect_delay: Duration,
}

impl Driver {
    async fn run(mut self, mut stream: WsStream) {
        loop {
            let exit = self.pump(stream).await;
            self.requests.fail_all().await;

            match exit {
                Exit::Shutdown => {
                    debug!("WebSocket driver stopped");
                    return;
                }
                Exit::Disconnected(reason) => {
                    warn!("WebSocket disconnected: {}, reconnecting...", reason);
                }
            }

            stream = match self.reconnect().await {
                Some(stream) => stream,
                None => return,
            };
        }
    }

    async fn reconnect(&mut self) -> Option<WsStream> {
        loop {
            if *self.shutdown.borrow() {
                return None;
            }
            tokio::select! {
                _ = self.shutdown.changed() => return None,
                _ = tokio::time::sleep(self.reconnect_delay) => {}
            }

            match open(&self.handshake).await {
                Ok(stream) => {
                    info!("WebSocket reconnected");
                    return Some(stream);
                }
                Err(e) => error!("WebSocket reconnect failed: {}", e),
            }
        }
    }

    async fn pump(&mut self, stream: WsStream) -> Exit {
        let (mut write, mut read) = stream.split();

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Exit::Shutdown;
                }
                frame = self.outgoing.recv() => match frame {
                    Some(text) => {
                        if let Err(e) = write.send(Message::Text(text)).await {
                            return Exit::Disconnected(e.to_string());
                        }
                    }
                    None => {
                        let _ = write.send(Message::Close(None)).await;
                        return Exit::Shutdown;
                    }
                },
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        dispatch(&self.requests, &self.handler, &text).await;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        return Exit::Disconnected(format!("closed by server {:?}", frame));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Exit::Disconnected(e.to_string()),
                    None => return Exit::Disconnected("stream ended".to_string()),
                },
            }
        }
    }
}

async fn dispatch(requests: &RequestTable, handler: &BroadcastHandler, text: &str) {
    let res: WsResponse = match serde_json::from_str(text) {
        Ok(res) => res,
        Err(e) => {
            warn!("Unparsable WebSocket message {:?}: {}", text, e);
            return;
        }
    };

    if res.is_broadcast() {
        debug!("WebSocket broadcast {}", res.topic());
        handler(res);
        return;
    }

    let id = res.id;
    if !requests.resolve(res).await {
        debug!("WebSocket reply {} has no pending request", id);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

    pub(crate) type Reply = Arc<dyn Fn(&WsRequest) -> Vec<WsResponse> + Send + Sync>;
    pub(crate) type OnHandshake = Arc<dyn Fn(&Request) + Send + Sync>;

    /// Serves every connection on a loopback port and answers each request
    /// with the frames `reply` returns. Gives the `http://` address.
    pub(crate) async fn serve(reply: Reply) -> String {
        serve_with_handshake(reply, Arc::new(|_: &Request| {})).await
    }

    pub(crate) async fn serve_with_handshake(reply: Reply, on_handshake: OnHandshake) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let reply = reply.clone();
                let on_handshake = on_handshake.clone();
                tokio::spawn(async move {
                    let callback = move |req: &Request, resp: Response| {
                        on_handshake(req);
                        Ok::<Response, ErrorResponse>(resp)
                    };
                    let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
                        return;
                    };
                    while let Some(Ok(msg)) = ws.next().await {
                        let Message::Text(text) = msg else { continue };
                        let Ok(req) = serde_json::from_str::<WsRequest>(&text) else {
                            continue;
                        };
                        for res in reply(&req) {
                            let frame = serde_json::to_string(&res).unwrap();
                            if ws.send(Message::Text(frame)).await.is_err() {
                                return;
                            }
                        }
                    }
                });
            }
        });

        format!("http://{}", addr)
    }

    /// Echoes the request body back with code 200.
    pub(crate) fn echo() -> Reply {
        Arc::new(|req: &WsRequest| {
            vec![WsResponse {
                id: req.id,
                code: 200,
                message: String::new(),
                body: req.body.clone(),
            }]
        })
    }
}
