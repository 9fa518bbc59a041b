//! Account and token result types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A signed-in principal as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// `<object id>.<tenant id>`.
    pub home_account_id: String,
    /// Authority host, e.g. `login.microsoftonline.com`.
    pub environment: String,
    pub tenant_id: String,
    /// The user principal name.
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// The outcome of a successful token acquisition.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthenticationResult {
    pub access_token: String,
    pub expires_on: DateTime<Utc>,
    /// `None` for app-only tokens.
    pub account: Option<Account>,
    pub scopes: Vec<String>,
}

impl std::fmt::Debug for AuthenticationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticationResult")
            .field("access_token", &"***")
            .field("expires_on", &self.expires_on)
            .field("account", &self.account)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// What `auth status` reports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthStatus {
    pub authenticated: bool,
    /// The signed-in account, or the last known one when the token can no
    /// longer be renewed.
    pub account: Option<Account>,
    pub expires_on: Option<DateTime<Utc>>,
}

impl AuthStatus {
    /// Not authenticated, no known account.
    pub fn signed_out() -> Self {
        Self::default()
    }
}
