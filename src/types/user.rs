use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::Rawfloat;

/// Account owner together with balances.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(flatten)]
    pub assets: UserAssets,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notifications: Option<UserNotifications>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub wallets: UserWallets,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserAssets {
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub balances: HashMap<String, Rawfloat>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub frozen_balances: HashMap<String, Rawfloat>,
}

impl UserAssets {
    pub fn balance(&self, asset: &str) -> Rawfloat {
        self.balances.get(asset).copied().unwrap_or_default()
    }

    pub fn frozen(&self, asset: &str) -> Rawfloat {
        self.frozen_balances.get(asset).copied().unwrap_or_default()
    }

    /// Balance plus the part locked in open orders.
    pub fn total(&self, asset: &str) -> Rawfloat {
        self.balance(asset) + self.frozen(asset)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserNotifications {
    #[serde(default)]
    pub deposit: bool,
    #[serde(default)]
    pub login: bool,
    #[serde(default)]
    pub trade: bool,
    #[serde(default)]
    pub withdraw: bool,
}

/// Deposit address per asset.
pub type UserWallets = HashMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WithdrawItem {
    #[serde(default, skip_serializing_if = "Rawfloat::is_zero")]
    pub amount: Rawfloat,
    #[serde(default, skip_serializing_if = "Rawfloat::is_zero")]
    pub fee: Rawfloat,
    #[serde(default, skip_serializing_if = "Rawfloat::is_zero")]
    pub final_amount: Rawfloat,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub request_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub requester_ip: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub asset: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub network: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub address: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub address_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub memo: String,

    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub submit_time: i64,
    #[serde(default)]
    pub success_time: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DepositItem {
    #[serde(default)]
    pub amount: Rawfloat,
    #[serde(default)]
    pub final_amount: Rawfloat,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub asset: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub success_time: i64,
}

/// Deposit and withdrawal history grouped by asset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetTransactions {
    #[serde(default)]
    pub deposit: HashMap<String, Vec<DepositItem>>,
    #[serde(default)]
    pub withdraw: HashMap<String, Vec<WithdrawItem>>,
}
