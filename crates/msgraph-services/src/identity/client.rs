//! The identity client.
//!
//! [`IdentityClient`] is built once per process and passed by reference to
//! everything that needs a token. It owns the credential store and two lazily
//! built provider handles, one per [`ClientKind`]. The token cache is read
//! from the store before every acquisition and written back only when it
//! changed.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use super::cache::{CachedToken, TokenCache};
use super::config::{APP_ONLY_SCOPE, AuthConfig, AuthSettings};
use super::provider::{ClientKind, DeviceCodeCallback, IdentityConnector, IdentityProvider, TokenGrant};
use super::store::CredentialStore;
use super::types::{Account, AuthStatus, AuthenticationResult};
use crate::error::{ErrorKind, GraphError, GraphResult};

/// A cached token must stay valid at least this long to be reused.
const EXPIRY_MARGIN_MINUTES: i64 = 5;

/// Added to delegated requests so the platform returns an id token and a
/// refresh token.
const INTERACTIVE_EXTRA_SCOPES: &[&str] = &["openid", "profile", "offline_access"];

const NO_ACCOUNTS: &str = "No cached accounts found. Please run \"d-msgraph auth login\" first.";
const TOKEN_EXPIRED: &str = "Token expired or invalid. Please run \"d-msgraph auth login\" again.";
const MISSING_SECRET: &str = "Client secret is required for client credentials flow. \
                              Set AZURE_CLIENT_SECRET environment variable.";

type ProviderSlot = Mutex<Option<Arc<dyn IdentityProvider>>>;

/// Acquires, caches and clears tokens.
pub struct IdentityClient {
    settings: AuthSettings,
    store: Arc<dyn CredentialStore>,
    connector: Arc<dyn IdentityConnector>,
    interactive: ProviderSlot,
    app_only: ProviderSlot,
}

impl std::fmt::Debug for IdentityClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityClient")
            .field("settings", &self.settings.client_id)
            .finish_non_exhaustive()
    }
}

impl IdentityClient {
    /// Creates a client. Nothing is validated or built until first use.
    pub fn new(
        settings: AuthSettings,
        store: Arc<dyn CredentialStore>,
        connector: Arc<dyn IdentityConnector>,
    ) -> Self {
        Self {
            settings,
            store,
            connector,
            interactive: Mutex::new(None),
            app_only: Mutex::new(None),
        }
    }

    /// Returns the unvalidated settings.
    pub fn settings(&self) -> &AuthSettings {
        &self.settings
    }

    /// Signs a user in with the device code flow.
    ///
    /// `on_code` receives the prompt to show before polling begins.
    ///
    /// # Errors
    ///
    /// Returns `DeviceCodeFlowFailed` if the flow completed without a token,
    /// or the provider error if it was rejected.
    pub async fn login_with_device_code(
        &self,
        on_code: DeviceCodeCallback<'_>,
    ) -> GraphResult<AuthenticationResult> {
        let config = self.settings.resolve()?;
        let provider = self.provider(&config, ClientKind::Interactive)?;
        let mut cache = self.load_cache()?;

        let scopes = interactive_scopes(&config);
        let grant = provider
            .acquire_by_device_code(&scopes, on_code)
            .await?
            .ok_or_else(|| {
                GraphError::new(
                    ErrorKind::DeviceCodeFlowFailed,
                    "Device code authentication failed. No token received.",
                )
            })?;

        let result = remember_user_grant(&mut cache, grant, None)?;
        self.save_cache(&mut cache)?;
        if let Some(account) = &result.account {
            info!("signed in as {}", account.username);
        }
        Ok(result)
    }

    /// Acquires an app-only token with the configured client secret.
    ///
    /// # Errors
    ///
    /// Returns `MissingClientSecret` without touching the network when no
    /// secret is configured.
    pub async fn login_with_client_credentials(&self) -> GraphResult<AuthenticationResult> {
        let config = self.settings.resolve()?;
        let Some(secret) = config.client_secret.clone() else {
            return Err(GraphError::new(ErrorKind::MissingClientSecret, MISSING_SECRET));
        };
        let provider = self.provider(&config, ClientKind::AppOnly)?;
        let mut cache = self.load_cache()?;

        let scopes = vec![APP_ONLY_SCOPE.to_string()];
        let grant = provider
            .acquire_by_client_credentials(&secret, &scopes)
            .await?
            .ok_or_else(|| {
                GraphError::new(
                    ErrorKind::ClientCredentialsFlowFailed,
                    "Client credentials authentication failed. No token received.",
                )
            })?;

        cache.store_app_token(
            &config.client_id,
            CachedToken {
                secret: grant.access_token.clone(),
                expires_on: grant.expires_on,
                scopes: grant.scopes.clone(),
            },
        );
        self.save_cache(&mut cache)?;
        info!("acquired app-only token for client {}", config.client_id);

        Ok(AuthenticationResult {
            access_token: grant.access_token,
            expires_on: grant.expires_on,
            account: None,
            scopes: grant.scopes,
        })
    }

    /// Returns a token for the first cached account without user interaction.
    ///
    /// # Errors
    ///
    /// Returns `AuthenticationRequired` when no account is cached, or when
    /// the cached token cannot be reused or renewed. In the latter case the
    /// underlying error is kept as the source.
    pub async fn acquire_token_silent(&self) -> GraphResult<AuthenticationResult> {
        let config = self.settings.resolve()?;
        let mut cache = self.load_cache().map_err(token_expired)?;

        let Some(account) = cache.first_account().cloned() else {
            debug!("no cached accounts");
            return Err(GraphError::authentication_required(NO_ACCOUNTS));
        };

        self.silent_for(&config, &mut cache, account)
            .await
            .map_err(token_expired)
    }

    /// Removes all cached credentials and drops the provider handles.
    ///
    /// Returns `true` if a stored cache was removed.
    pub fn logout(&self) -> GraphResult<bool> {
        let removed = self.store.clear()?;
        for slot in [&self.interactive, &self.app_only] {
            *slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        }
        info!("signed out");
        Ok(removed)
    }

    /// Reports whether a token can be obtained silently. Never fails.
    pub async fn status(&self) -> AuthStatus {
        let config = match self.settings.resolve() {
            Ok(config) => config,
            Err(e) => {
                debug!("status: configuration incomplete: {}", e);
                return AuthStatus::signed_out();
            }
        };
        if let Err(e) = self.provider(&config, ClientKind::Interactive) {
            debug!("status: identity client unavailable: {}", e);
            return AuthStatus::signed_out();
        }

        let account = match self.load_cache() {
            Ok(cache) => cache.first_account().cloned(),
            Err(e) => {
                debug!("status: cache unavailable: {}", e);
                None
            }
        };
        let Some(account) = account else {
            return AuthStatus::signed_out();
        };

        match self.acquire_token_silent().await {
            Ok(result) => AuthStatus {
                authenticated: true,
                account: result.account.or(Some(account)),
                expires_on: Some(result.expires_on),
            },
            Err(e) => {
                debug!("status: silent acquisition failed: {}", e);
                AuthStatus {
                    authenticated: false,
                    account: Some(account),
                    expires_on: None,
                }
            }
        }
    }

    async fn silent_for(
        &self,
        config: &AuthConfig,
        cache: &mut TokenCache,
        account: Account,
    ) -> GraphResult<AuthenticationResult> {
        let margin = Duration::minutes(EXPIRY_MARGIN_MINUTES);
        if let Some(token) = cache.access_token(&account.home_account_id) {
            if token.covers(&config.scopes) && token.is_valid_at(Utc::now(), margin) {
                debug!("using cached access token for {}", account.username);
                return Ok(AuthenticationResult {
                    access_token: token.secret.clone(),
                    expires_on: token.expires_on,
                    account: Some(account),
                    scopes: token.scopes.clone(),
                });
            }
        }

        let refresh_token = cache
            .refresh_token(&account.home_account_id)
            .map(str::to_string)
            .ok_or_else(|| GraphError::authentication_required("no refresh token cached"))?;

        debug!("refreshing access token for {}", account.username);
        let provider = self.provider(config, ClientKind::Interactive)?;
        let scopes = interactive_scopes(config);
        let grant = provider
            .acquire_by_refresh_token(&refresh_token, &scopes)
            .await?
            .ok_or_else(|| GraphError::identity("refresh returned no token"))?;

        let result = remember_user_grant(cache, grant, Some(account))?;
        self.save_cache(cache)?;
        Ok(result)
    }

    fn slot(&self, kind: ClientKind) -> &ProviderSlot {
        match kind {
            ClientKind::Interactive => &self.interactive,
            ClientKind::AppOnly => &self.app_only,
        }
    }

    /// Returns the handle for `kind`, building it on first use.
    fn provider(&self, config: &AuthConfig, kind: ClientKind) -> GraphResult<Arc<dyn IdentityProvider>> {
        let mut slot = self.slot(kind).lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(provider) = slot.as_ref() {
            return Ok(Arc::clone(provider));
        }
        let provider = self.connector.connect(config, kind)?;
        *slot = Some(Arc::clone(&provider));
        Ok(provider)
    }

    fn load_cache(&self) -> GraphResult<TokenCache> {
        let Some(bytes) = self.store.load()? else {
            return Ok(TokenCache::new());
        };
        match TokenCache::from_slice(&bytes) {
            Ok(cache) => Ok(cache),
            Err(e) => {
                warn!("ignoring unreadable token cache: {}", e);
                Ok(TokenCache::new())
            }
        }
    }

    fn save_cache(&self, cache: &mut TokenCache) -> GraphResult<()> {
        if !cache.has_changed() {
            return Ok(());
        }
        self.store.save(&cache.to_vec()?)?;
        cache.mark_persisted();
        Ok(())
    }
}

fn token_expired(source: GraphError) -> GraphError {
    GraphError::authentication_required(TOKEN_EXPIRED).with_source(source)
}

fn interactive_scopes(config: &AuthConfig) -> Vec<String> {
    let mut scopes = config.scopes.clone();
    for extra in INTERACTIVE_EXTRA_SCOPES {
        if !scopes.iter().any(|s| s.eq_ignore_ascii_case(extra)) {
            scopes.push(extra.to_string());
        }
    }
    scopes
}

/// Stores a delegated grant under its account. `fallback` is used when the
/// grant does not identify the account, as on some refreshes.
fn remember_user_grant(
    cache: &mut TokenCache,
    grant: TokenGrant,
    fallback: Option<Account>,
) -> GraphResult<AuthenticationResult> {
    let account = grant.account.or(fallback).ok_or_else(|| {
        GraphError::invalid_response("token response did not identify the signed-in account")
    })?;

    cache.store_account_tokens(
        account.clone(),
        CachedToken {
            secret: grant.access_token.clone(),
            expires_on: grant.expires_on,
            scopes: grant.scopes.clone(),
        },
        grant.refresh_token,
    );

    Ok(AuthenticationResult {
        access_token: grant.access_token,
        expires_on: grant.expires_on,
        account: Some(account),
        scopes: grant.scopes,
    })
}
