use thiserror::Error;

use crate::types::ParseError;

pub type Result<T> = std::result::Result<T, ClientError>;

pub const ERR_ASSET_KYC_REQUIRED: &str = "ERR_ASSET_KYC_REQUIRED";
pub const ERR_ASSET_COUNTRY_BLACKLISTED: &str = "ERR_ASSET_COUNTRY_BLACKLISTED";
pub const ERR_ASSET_TERMS_REQUIRED: &str = "ERR_ASSET_TERMS_REQUIRED";
pub const ERR_TRADE_FILL_OR_KILL: &str = "ERR_TRADE_FILL_OR_KILL";

#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("unauthenticated connection: API key and secret are required")]
    Unauthenticated,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid base64 body: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("connection closed before a reply was received")]
    ConnectionClosed,

    #[error("request timed out")]
    Timeout,

    #[error("{operation}: {source}")]
    Operation {
        operation: &'static str,
        #[source]
        source: Box<ClientError>,
    },
}

impl ClientError {
    /// Innermost error, skipping operation context.
    pub fn root(&self) -> &ClientError {
        match self {
            ClientError::Operation { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn api(&self) -> Option<&ApiError> {
        match self.root() {
            ClientError::Api(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_unauthenticated(&self) -> bool {
        matches!(self.root(), ClientError::Unauthenticated)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ClientError::WebSocket(err.to_string())
    }
}

/// Error reported by the exchange.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code} {name}: {message}")]
pub struct ApiError {
    pub code: i64,
    pub message: String,
    pub name: String,
}

impl ApiError {
    pub fn new(code: i64, message: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            name: name.into(),
        }
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }
}

/// Request rejected locally before anything is sent.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestError {
    #[error("invalid or empty amount parameter")]
    InvalidAmount,
    #[error("invalid or empty asset parameter")]
    InvalidAsset,
    #[error("invalid or empty pair parameter")]
    InvalidPair,
    #[error("invalid or empty price parameter")]
    InvalidPrice,
    #[error("invalid or empty request ID")]
    InvalidRequestId,
    #[error("invalid sort-by parameter, its either \"asc\" or \"desc\"")]
    InvalidSortBy,
    #[error("invalid trade ID")]
    InvalidTradeId,
    #[error("invalid or empty trade method, its either \"limit\" or \"market\"")]
    InvalidTradeMethod,
    #[error("invalid or empty trade type, its either \"buy\" or \"sell\"")]
    InvalidTradeType,
    #[error("invalid or empty wallet address")]
    WalletAddress,
}

impl RequestError {
    pub fn code(&self) -> u16 {
        400
    }

    pub fn name(&self) -> &'static str {
        match self {
            RequestError::InvalidAmount => "ERR_INVALID_AMOUNT",
            RequestError::InvalidAsset => "ERR_INVALID_ASSET",
            RequestError::InvalidPair => "ERR_INVALID_PAIR",
            RequestError::InvalidPrice => "ERR_INVALID_PRICE",
            RequestError::InvalidRequestId => "ERR_INVALID_REQUEST_ID",
            RequestError::InvalidSortBy => "ERR_INVALID_SORT_BY",
            RequestError::InvalidTradeId => "ERR_INVALID_TRADE_ID",
            RequestError::InvalidTradeMethod => "ERR_INVALID_TRADE_METHOD",
            RequestError::InvalidTradeType => "ERR_INVALID_TRADE_TYPE",
            RequestError::WalletAddress => "ERR_WALLET_ADDRESS",
        }
    }
}

pub trait ResultExt<T> {
    /// Tags the error with the name of the operation that produced it.
    fn context(self, operation: &'static str) -> Result<T>;
}

impl<T, E: Into<ClientError>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, operation: &'static str) -> Result<T> {
        self.map_err(|err| ClientError::Operation {
            operation,
            source: Box::new(err.into()),
        })
    }
}
