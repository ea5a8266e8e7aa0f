pub mod endpoints;
pub mod private_ws;
pub mod public_ws;
pub mod tapi;
pub mod tokenomy;
pub mod transport;
pub mod websocket;

pub use private_ws::PrivateWebSocket;
pub use public_ws::{PublicEvent, PublicWebSocket};
pub use tapi::{TokenomyV1Client, TradeHistoryParams};
pub use tokenomy::TokenomyClient;
pub use transport::{HttpMethod, HttpRequest, HttpResponse, ReqwestTransport, Transport};
pub use websocket::{WsRequest, WsResponse};
