use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RequestError;

pub mod assets {
    pub const ACHAIN: &str = "achain";
    pub const AVALANCHE: &str = "avax";
    pub const BALANCER: &str = "bal";
    pub const BINANCECHAIN: &str = "bnb";
    pub const BITCOIN: &str = "btc";
    pub const BITCOIN_CASH: &str = "bch";
    pub const CARDANO: &str = "ada";
    pub const CHAINLINK: &str = "link";
    pub const COMPOUND: &str = "comp";
    pub const DAI: &str = "dai";
    pub const EOS: &str = "eos";
    pub const ETHEREUM: &str = "eth";
    pub const ETHEREUM_CLASSIC: &str = "etc";
    pub const HARA: &str = "hart";
    pub const IDK: &str = "idk";
    pub const INMAX: &str = "inx";
    pub const LITECOIN: &str = "ltc";
    pub const NEO: &str = "neo";
    pub const POLKADOT: &str = "dot";
    pub const SOLANA: &str = "sol";
    pub const STELLAR: &str = "xlm";
    pub const TETHER: &str = "usdt";
    pub const TEZOS: &str = "xtz";
    pub const TOKENOMY: &str = "ten";
    pub const USDC: &str = "usdc";
    pub const VEXANIUM: &str = "vex";
    pub const XANPOOL: &str = "xlp";
}

/// Pairs listed on the exchange, `<coin>_<base>`.
pub const KNOWN_PAIRS: &[&str] = &[
    "bch_btc", "eos_btc", "eth_btc", "ltc_btc", "dot_btc", "sol_btc", "xlm_btc", "ten_btc",
    "usdc_btc", "vex_btc", "btc_idk", "ada_idk", "link_idk", "comp_idk", "dai_idk", "eth_idk",
    "dot_idk", "sol_idk", "usdt_idk", "xtz_idk", "ten_idk", "ada_usdt", "btc_usdt", "eth_usdt",
    "idk_usdt", "dot_usdt", "sol_usdt", "ten_usdt", "xtz_usdt",
];

/// Market pair such as `ten_btc`: `ten` is traded, priced in `btc`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pair {
    name: String,
    split: usize,
}

impl Pair {
    pub fn new(coin: &str, base: &str) -> Result<Self, RequestError> {
        format!("{}_{}", coin, base).parse()
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }

    pub fn coin(&self) -> &str {
        &self.name[..self.split]
    }

    pub fn base(&self) -> &str {
        &self.name[self.split + 1..]
    }

    pub fn is_known(&self) -> bool {
        KNOWN_PAIRS.contains(&self.name.as_str())
    }
}

impl FromStr for Pair {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        let mut parts = name.split('_');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(coin), Some(base), None) if !coin.is_empty() && !base.is_empty() => Ok(Self {
                split: coin.len(),
                name,
            }),
            _ => Err(RequestError::InvalidPair),
        }
    }
}

impl TryFrom<String> for Pair {
    type Error = RequestError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Pair> for String {
    fn from(pair: Pair) -> Self {
        pair.name
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeType {
    /// Bid.
    Buy,
    /// Ask.
    Sell,
}

impl TradeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeType::Buy => "buy",
            TradeType::Sell => "sell",
        }
    }
}

impl FromStr for TradeType {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "buy" | "bid" => Ok(TradeType::Buy),
            "sell" | "ask" => Ok(TradeType::Sell),
            _ => Err(RequestError::InvalidTradeType),
        }
    }
}

impl fmt::Display for TradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeMethod {
    #[default]
    Limit,
    Market,
}

impl TradeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeMethod::Limit => "limit",
            TradeMethod::Market => "market",
        }
    }
}

impl FromStr for TradeMethod {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "" | "limit" => Ok(TradeMethod::Limit),
            "market" => Ok(TradeMethod::Market),
            _ => Err(RequestError::InvalidTradeMethod),
        }
    }
}

impl fmt::Display for TradeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl FromStr for SortOrder {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "" | "desc" => Ok(SortOrder::Desc),
            _ => Err(RequestError::InvalidSortBy),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Fill or Kill
    FOK,
}

impl TimeInForce {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeInForce::FOK => "FOK",
        }
    }
}

pub const TRADE_STATUS_CANCELLED: &str = "cancelled";
pub const TRADE_STATUS_FILLED: &str = "filled";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_parts() {
        let pair: Pair = "TEN_BTC".parse().unwrap();
        assert_eq!(pair.as_str(), "ten_btc");
        assert_eq!(pair.coin(), "ten");
        assert_eq!(pair.base(), "btc");
        assert!(pair.is_known());
        assert_eq!(Pair::new("eth", "usdt").unwrap().to_string(), "eth_usdt");
    }

    #[test]
    fn test_pair_rejects_malformed() {
        assert_eq!("".parse::<Pair>(), Err(RequestError::InvalidPair));
        assert_eq!("tenbtc".parse::<Pair>(), Err(RequestError::InvalidPair));
        assert_eq!("a_b_c".parse::<Pair>(), Err(RequestError::InvalidPair));
        assert_eq!("_btc".parse::<Pair>(), Err(RequestError::InvalidPair));
    }

    #[test]
    fn test_pair_serde() {
        let pair: Pair = serde_json::from_str("\"eth_btc\"").unwrap();
        assert_eq!(serde_json::to_string(&pair).unwrap(), "\"eth_btc\"");
        assert!(serde_json::from_str::<Pair>("\"eth\"").is_err());
    }

    #[test]
    fn test_trade_method_defaults_to_limit() {
        assert_eq!("".parse::<TradeMethod>(), Ok(TradeMethod::Limit));
        assert_eq!("MARKET".parse::<TradeMethod>(), Ok(TradeMethod::Market));
        assert_eq!(
            "stop".parse::<TradeMethod>(),
            Err(RequestError::InvalidTradeMethod)
        );
    }

    #[test]
    fn test_sort_and_type_parsing() {
        assert_eq!("".parse::<SortOrder>(), Ok(SortOrder::Desc));
        assert_eq!("ASC".parse::<SortOrder>(), Ok(SortOrder::Asc));
        assert_eq!("up".parse::<SortOrder>(), Err(RequestError::InvalidSortBy));
        assert_eq!("bid".parse::<TradeType>(), Ok(TradeType::Buy));
        assert_eq!("x".parse::<TradeType>(), Err(RequestError::InvalidTradeType));
    }
}
