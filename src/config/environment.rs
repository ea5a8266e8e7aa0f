use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::auth::Credentials;
use crate::error::Result;
use crate::types::KNOWN_PAIRS;

pub const DEFAULT_ADDRESS: &str = "https://api.tokenomy.com";
pub const DEFAULT_V1_ADDRESS: &str = "https://exchange.tokenomy.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_RECONNECT_DELAY_SECS: u64 = 5;
pub const ENV_PREFIX: &str = "TOKENOMY";

/// Connection settings shared by every client.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Environment {
    /// REST v2 and WebSocket server.
    pub address: String,
    /// Trade API v1 server.
    pub v1_address: String,
    /// Public part of the API key.
    pub token: String,
    /// Private part of the API key.
    pub secret: String,
    pub timeout_secs: u64,
    /// Accept self-signed certificates. Testing only.
    pub insecure: bool,
    pub reconnect_delay_secs: u64,
    /// 1 makes the CLI log the configuration. 2 also logs signed payloads and
    /// HTTP response bodies at `debug` level.
    pub debug: u8,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            v1_address: DEFAULT_V1_ADDRESS.to_string(),
            token: String::new(),
            secret: String::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            insecure: false,
            reconnect_delay_secs: DEFAULT_RECONNECT_DELAY_SECS,
            debug: 0,
        }
    }
}

impl Environment {
    pub fn new(token: impl Into<String>, secret: impl Into<String>) -> Self {
        Self::default().with_credentials(token, secret)
    }

    /// Reads the optional file at `path`, then `TOKENOMY_*` variables such as
    /// `TOKENOMY_TOKEN`, `TOKENOMY_SECRET` and `TOKENOMY_ADDRESS`.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::with_name(path).required(false));
        }
        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX).try_parsing(true),
        );

        let mut env: Environment = builder.build()?.try_deserialize()?;
        env.normalize();
        Ok(env)
    }

    pub fn with_credentials(mut self, token: impl Into<String>, secret: impl Into<String>) -> Self {
        self.token = token.into();
        self.secret = secret.into();
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self.normalize();
        self
    }

    pub fn with_v1_address(mut self, address: impl Into<String>) -> Self {
        self.v1_address = address.into();
        self.normalize();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs().max(1);
        self
    }

    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay_secs = delay.as_secs();
        self
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.token.clone(), self.secret.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.credentials().is_configured()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Signed payloads and response bodies are logged only from level 2.
    pub fn logs_bodies(&self) -> bool {
        self.debug >= 2
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    pub fn is_valid_pair_name(&self, pair: &str) -> bool {
        KNOWN_PAIRS.contains(&pair)
    }

    fn normalize(&mut self) {
        if self.address.is_empty() {
            self.address = DEFAULT_ADDRESS.to_string();
        }
        if self.v1_address.is_empty() {
            self.v1_address = DEFAULT_V1_ADDRESS.to_string();
        }
        while self.address.ends_with('/') {
            self.address.pop();
        }
        while self.v1_address.ends_with('/') {
            self.v1_address.pop();
        }
        if self.timeout_secs == 0 {
            self.timeout_secs = DEFAULT_TIMEOUT_SECS;
        }
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("address", &self.address)
            .field("v1_address", &self.v1_address)
            .field("token", &self.token)
            .field("secret", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .field("insecure", &self.insecure)
            .field("reconnect_delay_secs", &self.reconnect_delay_secs)
            .field("debug", &self.debug)
            .finish()
    }
}
