//! Authentication against the Microsoft identity platform.
//!
//! - [`IdentityClient`]: device code, client credentials and silent flows
//! - [`AzureIdentityProvider`]: the OAuth 2.0 exchanges over HTTP
//! - [`FileCredentialStore`]: the on-disk token cache

mod azure;
mod cache;
mod client;
mod config;
mod provider;
mod store;
mod types;

pub use azure::{AzureConnector, AzureIdentityProvider};
pub use cache::{CachedToken, TokenCache};
pub use client::IdentityClient;
pub use config::{
    APP_ONLY_SCOPE, AuthConfig, AuthSettings, DEFAULT_AUTHORITY_HOST, DEFAULT_SCOPES,
    GRAPH_RESOURCE, parse_scopes,
};
pub use provider::{
    BoxFuture, ClientKind, DeviceCodeCallback, DeviceCodeInfo, IdentityConnector,
    IdentityProvider, TokenGrant,
};
pub use store::{
    CONFIG_DIR_NAME, CredentialStore, FileCredentialStore, TOKEN_CACHE_FILE, default_config_dir,
    write_private,
};
pub use types::{Account, AuthStatus, AuthenticationResult};
