//! Client library for the Tokenomy exchange.
//!
//! [`TokenomyClient`] talks to the v2 REST API, [`TokenomyV1Client`] to the
//! legacy trade API, and [`PrivateWebSocket`] / [`PublicWebSocket`] to the
//! v2 WebSocket channels. Every client is built from an [`Environment`].

pub mod auth;
pub mod config;
pub mod error;
pub mod exchange;
pub mod types;

pub use auth::{sign, Credentials};
pub use config::Environment;
pub use error::{ApiError, ClientError, RequestError, Result};
pub use exchange::{
    PrivateWebSocket, PublicEvent, PublicWebSocket, TokenomyClient, TokenomyV1Client,
};
pub use types::Rawfloat;
