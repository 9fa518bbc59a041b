//! In-memory token cache and its serialized form.
//!
//! The cache is loaded from the [`CredentialStore`](super::store::CredentialStore)
//! before each acquisition and written back only when [`TokenCache::has_changed`]
//! reports a modification.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::config::GRAPH_RESOURCE;
use super::types::Account;
use crate::error::{GraphError, GraphResult};

const CACHE_VERSION: u32 = 1;

/// Scopes the identity provider adds on its own; never required of a token.
const RESERVED_SCOPES: &[&str] = &["openid", "profile", "offline_access", "email"];

/// A cached access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedToken {
    pub secret: String,
    pub expires_on: DateTime<Utc>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl CachedToken {
    /// Returns true if the token stays valid for at least `margin` after `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.expires_on - margin > now
    }

    /// Returns true if every non-reserved scope in `required` was granted.
    ///
    /// Comparison ignores case and the Graph resource prefix, so
    /// `https://graph.microsoft.com/Mail.Read` covers `mail.read`.
    pub fn covers(&self, required: &[String]) -> bool {
        let granted: Vec<String> = self.scopes.iter().map(|s| normalize_scope(s)).collect();
        required
            .iter()
            .map(|s| normalize_scope(s))
            .filter(|s| !RESERVED_SCOPES.contains(&s.as_str()))
            .all(|s| granted.contains(&s))
    }
}

fn normalize_scope(scope: &str) -> String {
    let prefix = format!("{}/", GRAPH_RESOURCE);
    scope
        .strip_prefix(&prefix)
        .unwrap_or(scope)
        .to_ascii_lowercase()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AccountEntry {
    account: Account,
    #[serde(default)]
    access_token: Option<CachedToken>,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AppEntry {
    client_id: String,
    token: CachedToken,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheData {
    #[serde(default = "current_version")]
    version: u32,
    #[serde(default)]
    accounts: Vec<AccountEntry>,
    #[serde(default)]
    app_tokens: Vec<AppEntry>,
}

fn current_version() -> u32 {
    CACHE_VERSION
}

impl Default for CacheData {
    fn default() -> Self {
        Self {
            version: CACHE_VERSION,
            accounts: Vec::new(),
            app_tokens: Vec::new(),
        }
    }
}

/// Accounts, their tokens, and app-only tokens.
#[derive(Debug, Clone, Default)]
pub struct TokenCache {
    data: CacheData,
    changed: bool,
}

impl TokenCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a serialized cache.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the bytes are not a valid cache document.
    pub fn from_slice(bytes: &[u8]) -> GraphResult<Self> {
        let data: CacheData = serde_json::from_slice(bytes).map_err(|e| {
            GraphError::storage(format!("failed to parse token cache: {}", e)).with_source(e)
        })?;
        Ok(Self {
            data,
            changed: false,
        })
    }

    /// Serializes the cache.
    pub fn to_vec(&self) -> GraphResult<Vec<u8>> {
        serde_json::to_vec_pretty(&self.data).map_err(|e| {
            GraphError::storage(format!("failed to serialize token cache: {}", e)).with_source(e)
        })
    }

    /// Returns true if the cache was modified since it was loaded or last
    /// persisted.
    pub fn has_changed(&self) -> bool {
        self.changed
    }

    /// Records that the current state has been persisted.
    pub fn mark_persisted(&mut self) {
        self.changed = false;
    }

    /// Returns all cached accounts in insertion order.
    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.data.accounts.iter().map(|e| &e.account)
    }

    /// Returns the first cached account.
    pub fn first_account(&self) -> Option<&Account> {
        self.accounts().next()
    }

    /// Returns the cached access token for an account.
    pub fn access_token(&self, home_account_id: &str) -> Option<&CachedToken> {
        self.entry(home_account_id)
            .and_then(|e| e.access_token.as_ref())
    }

    /// Returns the cached refresh token for an account.
    pub fn refresh_token(&self, home_account_id: &str) -> Option<&str> {
        self.entry(home_account_id)
            .and_then(|e| e.refresh_token.as_deref())
    }

    /// Inserts or replaces the tokens of `account`.
    ///
    /// An existing refresh token is kept when `refresh_token` is `None`.
    pub fn store_account_tokens(
        &mut self,
        account: Account,
        access_token: CachedToken,
        refresh_token: Option<String>,
    ) {
        match self
            .data
            .accounts
            .iter_mut()
            .find(|e| e.account.home_account_id == account.home_account_id)
        {
            Some(entry) => {
                entry.account = account;
                entry.access_token = Some(access_token);
                if refresh_token.is_some() {
                    entry.refresh_token = refresh_token;
                }
            }
            None => self.data.accounts.push(AccountEntry {
                account,
                access_token: Some(access_token),
                refresh_token,
            }),
        }
        self.changed = true;
    }

    /// Returns the app-only token for a client id.
    pub fn app_token(&self, client_id: &str) -> Option<&CachedToken> {
        self.data
            .app_tokens
            .iter()
            .find(|e| e.client_id == client_id)
            .map(|e| &e.token)
    }

    /// Inserts or replaces the app-only token for a client id.
    pub fn store_app_token(&mut self, client_id: &str, token: CachedToken) {
        match self
            .data
            .app_tokens
            .iter_mut()
            .find(|e| e.client_id == client_id)
        {
            Some(entry) => entry.token = token,
            None => self.data.app_tokens.push(AppEntry {
                client_id: client_id.to_string(),
                token,
            }),
        }
        self.changed = true;
    }

    fn entry(&self, home_account_id: &str) -> Option<&AccountEntry> {
        self.data
            .accounts
            .iter()
            .find(|e| e.account.home_account_id == home_account_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    fn account(oid: &str, username: &str) -> Account {
        Account {
            home_account_id: format!("{}.tenant", oid),
            environment: "login.microsoftonline.com".into(),
            tenant_id: "tenant".into(),
            username: username.into(),
            name: None,
        }
    }

    fn token(secret: &str, expires_on: DateTime<Utc>, scopes: &[&str]) -> CachedToken {
        CachedToken {
            secret: secret.into(),
            expires_on,
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    mod cached_token {
        use super::*;

        #[test]
        fn validity_honours_margin() {
            let t = token("a", utc(2025, 6, 15, 12, 0, 0), &[]);
            let margin = Duration::minutes(5);
            assert!(t.is_valid_at(utc(2025, 6, 15, 11, 54, 0), margin));
            assert!(!t.is_valid_at(utc(2025, 6, 15, 11, 55, 0), margin));
            assert!(!t.is_valid_at(utc(2025, 6, 15, 13, 0, 0), margin));
        }

        #[test]
        fn covers_ignores_case_prefix_and_reserved() {
            let t = token(
                "a",
                utc(2025, 6, 15, 12, 0, 0),
                &["https://graph.microsoft.com/Mail.Read", "User.Read", "openid"],
            );
            assert!(t.covers(&strings(&["mail.read", "User.Read", "offline_access"])));
            assert!(!t.covers(&strings(&["Mail.Send"])));
        }
    }

    mod accounts {
        use super::*;

        #[test]
        fn empty_cache() {
            let cache = TokenCache::new();
            assert!(cache.first_account().is_none());
            assert!(!cache.has_changed());
        }

        #[test]
        fn first_account_is_insertion_order() {
            let mut cache = TokenCache::new();
            let expiry = utc(2025, 6, 15, 12, 0, 0);
            cache.store_account_tokens(account("a", "alice@contoso.com"), token("t1", expiry, &[]), None);
            cache.store_account_tokens(account("b", "bob@contoso.com"), token("t2", expiry, &[]), None);

            assert_eq!(cache.first_account().unwrap().username, "alice@contoso.com");
            assert_eq!(cache.accounts().count(), 2);
            assert!(cache.has_changed());
        }

        #[test]
        fn replacing_keeps_refresh_token() {
            let mut cache = TokenCache::new();
            let expiry = utc(2025, 6, 15, 12, 0, 0);
            let alice = account("a", "alice@contoso.com");
            cache.store_account_tokens(alice.clone(), token("t1", expiry, &[]), Some("r1".into()));
            cache.store_account_tokens(alice.clone(), token("t2", expiry, &[]), None);

            assert_eq!(cache.accounts().count(), 1);
            assert_eq!(cache.access_token(&alice.home_account_id).unwrap().secret, "t2");
            assert_eq!(cache.refresh_token(&alice.home_account_id), Some("r1"));
        }
    }

    mod serialization {
        use super::*;

        #[test]
        fn round_trip_resets_change_flag() {
            let mut cache = TokenCache::new();
            let expiry = utc(2025, 6, 15, 12, 0, 0);
            cache.store_account_tokens(
                account("a", "alice@contoso.com"),
                token("t1", expiry, &["Mail.Read"]),
                Some("r1".into()),
            );
            cache.store_app_token("client", token("app", expiry, &[".default"]));

            let bytes = cache.to_vec().unwrap();
            let loaded = TokenCache::from_slice(&bytes).unwrap();
            assert!(!loaded.has_changed());
            assert_eq!(loaded.first_account().unwrap().username, "alice@contoso.com");
            assert_eq!(loaded.refresh_token("a.tenant"), Some("r1"));
            assert_eq!(loaded.app_token("client").unwrap().secret, "app");
        }

        #[test]
        fn mark_persisted_clears_flag() {
            let mut cache = TokenCache::new();
            cache.store_app_token("client", token("app", utc(2025, 6, 15, 12, 0, 0), &[]));
            assert!(cache.has_changed());
            cache.mark_persisted();
            assert!(!cache.has_changed());
        }

        #[test]
        fn empty_object_is_empty_cache() {
            let cache = TokenCache::from_slice(b"{}").unwrap();
            assert!(cache.first_account().is_none());
        }

        #[test]
        fn garbage_is_storage_error() {
            let err = TokenCache::from_slice(b"not json").unwrap_err();
            assert_eq!(err.kind(), crate::error::ErrorKind::Storage);
        }
    }
}
