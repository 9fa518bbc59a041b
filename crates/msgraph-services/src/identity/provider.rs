//! IdentityProvider trait definition.
//!
//! An [`IdentityProvider`] performs the OAuth 2.0 exchanges against the
//! identity platform. It holds no cache: the
//! [`IdentityClient`](super::client::IdentityClient) decides when a network
//! exchange is needed and persists what comes back.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::config::AuthConfig;
use super::types::Account;
use crate::error::GraphResult;

/// A boxed future for object-safe async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Callback receiving the device code prompt before polling starts.
pub type DeviceCodeCallback<'a> = &'a (dyn Fn(&DeviceCodeInfo) + Send + Sync);

/// What the user needs to complete a device code sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCodeInfo {
    pub user_code: String,
    pub device_code: String,
    pub verification_uri: String,
    /// Seconds until the device code expires.
    pub expires_in: u64,
    /// Minimum seconds between polls.
    pub interval: u64,
    /// Human-readable instructions from the identity platform.
    pub message: String,
}

/// Tokens returned by a successful exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub expires_on: DateTime<Utc>,
    pub refresh_token: Option<String>,
    pub scopes: Vec<String>,
    /// The signed-in user; `None` for app-only grants.
    pub account: Option<Account>,
}

impl std::fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"***")
            .field("expires_on", &self.expires_on)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "***"))
            .field("scopes", &self.scopes)
            .field("account", &self.account)
            .finish()
    }
}

/// Which flavour of provider handle to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientKind {
    /// Public client used by the device code and refresh token flows.
    Interactive,
    /// Confidential client used by the client credentials flow.
    AppOnly,
}

impl ClientKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Interactive => "interactive",
            Self::AppOnly => "app-only",
        }
    }
}

/// OAuth exchanges against the identity platform.
///
/// Each method returns `Ok(None)` when the platform answered successfully
/// but handed back no token.
pub trait IdentityProvider: Send + Sync {
    /// Runs the device code flow, calling `on_code` once the code is known.
    fn acquire_by_device_code<'a>(
        &'a self,
        scopes: &'a [String],
        on_code: DeviceCodeCallback<'a>,
    ) -> BoxFuture<'a, GraphResult<Option<TokenGrant>>>;

    /// Runs the client credentials flow.
    fn acquire_by_client_credentials<'a>(
        &'a self,
        client_secret: &'a str,
        scopes: &'a [String],
    ) -> BoxFuture<'a, GraphResult<Option<TokenGrant>>>;

    /// Redeems a refresh token.
    fn acquire_by_refresh_token<'a>(
        &'a self,
        refresh_token: &'a str,
        scopes: &'a [String],
    ) -> BoxFuture<'a, GraphResult<Option<TokenGrant>>>;
}

/// Builds provider handles for a configuration.
pub trait IdentityConnector: Send + Sync {
    /// Builds a handle of the given kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle cannot be constructed, e.g. an
    /// app-only handle without a client secret.
    fn connect(
        &self,
        config: &AuthConfig,
        kind: ClientKind,
    ) -> GraphResult<Arc<dyn IdentityProvider>>;
}
