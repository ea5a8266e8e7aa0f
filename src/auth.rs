use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha512;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{ClientError, Result};

type HmacSha512 = Hmac<Sha512>;

pub const HEADER_KEY: &str = "Key";
pub const HEADER_SIGN: &str = "Sign";
pub const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";

/// Request parameters; iteration order is the canonical (sorted) order.
pub type Params = BTreeMap<String, String>;

/// HMAC-SHA512 of `payload` keyed with `secret`, lowercase hex.
pub fn sign(payload: &str, secret: &str) -> String {
    let mut mac =
        HmacSha512::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Form-encodes the parameters with keys in lexicographic order.
pub fn canonicalize_params<I, K, V>(params: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut pairs: Vec<(K, V)> = params.into_iter().collect();
    pairs.sort_by(|a, b| a.0.as_ref().cmp(b.0.as_ref()));

    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in &pairs {
        serializer.append_pair(key.as_ref(), value.as_ref());
    }
    serializer.finish()
}

#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub key: String,
    pub secret: String,
}

impl Credentials {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.key.is_empty() && !self.secret.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampUnit {
    Seconds,
    Milliseconds,
}

impl TimestampUnit {
    pub fn now(&self) -> i64 {
        let now = Utc::now();
        match self {
            TimestampUnit::Seconds => now.timestamp(),
            TimestampUnit::Milliseconds => now.timestamp_millis(),
        }
    }
}

/// Name and unit of the freshness parameter injected into signed requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampPolicy {
    pub param: &'static str,
    pub unit: TimestampUnit,
}

impl TimestampPolicy {
    /// REST v2 and WebSocket: `timestamp` in seconds.
    pub const V2: TimestampPolicy = TimestampPolicy {
        param: "timestamp",
        unit: TimestampUnit::Seconds,
    };

    /// Trade API v1: `nonce` in milliseconds.
    pub const V1: TimestampPolicy = TimestampPolicy {
        param: "nonce",
        unit: TimestampUnit::Milliseconds,
    };
}

/// Payload to transmit plus the two authentication headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    pub payload: String,
    pub key: String,
    pub signature: String,
}

impl SignedRequest {
    pub fn headers(&self) -> Vec<(String, String)> {
        vec![
            (HEADER_KEY.to_string(), self.key.clone()),
            (HEADER_SIGN.to_string(), self.signature.clone()),
        ]
    }
}

pub fn sign_request(
    credentials: &Credentials,
    params: Params,
    policy: TimestampPolicy,
) -> Result<SignedRequest> {
    sign_request_at(credentials, params, policy, policy.unit.now())
}

pub fn sign_request_at(
    credentials: &Credentials,
    mut params: Params,
    policy: TimestampPolicy,
    timestamp: i64,
) -> Result<SignedRequest> {
    if !credentials.is_configured() {
        return Err(ClientError::Unauthenticated);
    }

    params.insert(policy.param.to_string(), timestamp.to_string());
    let payload = canonicalize_params(&params);
    let signature = sign(&payload, &credentials.secret);

    Ok(SignedRequest {
        payload,
        key: credentials.key.clone(),
        signature,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "secr3t";

    #[test]
    fn test_sign_vectors() {
        assert_eq!(
            sign("timestamp=1574423788&pair=ten_btc", SECRET),
            "db068236b2cbc0084946de7be9dce15f2ac271ddae83e6d9181f25b397d09f10d128f4e710dbf1aa7b15c13bb2032b9673d549829e7455fe3ef0ddb95a0dc1a5"
        );
        assert_eq!(
            sign("timestamp=1574423788&pair=ten_btc&trade_id=1", SECRET),
            "5befb7f8236bf55c685c2b163e9f755c7dc6fd29c64cf30bfba5820917221dce5e5b8051216c0345f5cccd704f4a351a7b4374fc19959572b087ad6213760dc0"
        );
    }

    #[test]
    fn test_sign_is_deterministic() {
        let a = sign("pair=eth_btc", "k");
        let b = sign("pair=eth_btc", "k");
        assert_eq!(a, b);
        assert_eq!(a.len(), 128);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(a, sign("pair=eth_btc", "other"));
    }

    #[test]
    fn test_canonicalize_sorts_keys() {
        let a = canonicalize_params([("pair", "ten_btc"), ("timestamp", "1574423788")]);
        let b = canonicalize_params([("timestamp", "1574423788"), ("pair", "ten_btc")]);
        assert_eq!(a, b);
        assert_eq!(a, "pair=ten_btc&timestamp=1574423788");
    }

    #[test]
    fn test_canonicalize_escapes() {
        let s = canonicalize_params([("memo", "a b&c"), ("address", "x=y")]);
        assert_eq!(s, "address=x%3Dy&memo=a+b%26c");
        assert_eq!(canonicalize_params(Vec::<(String, String)>::new()), "");
    }

    #[test]
    fn test_sign_request_requires_credentials() {
        let params = Params::new();
        let err = sign_request(&Credentials::new("key", ""), params.clone(), TimestampPolicy::V2)
            .unwrap_err();
        assert!(matches!(err, ClientError::Unauthenticated));
        assert!(sign_request(&Credentials::default(), params, TimestampPolicy::V1).is_err());
    }

    #[test]
    fn test_sign_request_injects_timestamp() {
        let creds = Credentials::new("my-key", SECRET);
        let mut params = Params::new();
        params.insert("pair".to_string(), "ten_btc".to_string());

        let signed = sign_request_at(&creds, params.clone(), TimestampPolicy::V2, 1574423788).unwrap();
        assert_eq!(signed.payload, "pair=ten_btc&timestamp=1574423788");
        assert_eq!(signed.signature, sign(&signed.payload, SECRET));
        assert_eq!(
            signed.headers(),
            vec![
                ("Key".to_string(), "my-key".to_string()),
                ("Sign".to_string(), signed.signature.clone()),
            ]
        );

        let legacy = sign_request_at(&creds, params, TimestampPolicy::V1, 1574423788000).unwrap();
        assert_eq!(legacy.payload, "nonce=1574423788000&pair=ten_btc");
    }

    #[test]
    fn test_credentials_debug_hides_secret() {
        let creds = Credentials::new("visible", "hidden");
        let shown = format!("{:?}", creds);
        assert!(shown.contains("visible"));
        assert!(!shown.contains("hidden"));
    }

    #[test]
    fn test_timestamp_units() {
        let secs = TimestampUnit::Seconds.now();
        let millis = TimestampUnit::Milliseconds.now();
        assert!(millis / 1000 - secs <= 1);
    }
}
