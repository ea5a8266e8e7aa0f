pub mod legacy;
pub mod market;
pub mod order;
pub mod params;
pub mod rawfloat;
pub mod trading;
pub mod user;

pub use legacy::*;
pub use market::*;
pub use order::*;
pub use params::{ListTradeParams, TradeRequest, WebSocketParams, WithdrawRequest, DEFAULT_LIMIT};
pub use rawfloat::{format_f64, parse_f64, ParseError, Rawfloat, MAX_PRECISION};
pub use trading::*;
pub use user::*;
