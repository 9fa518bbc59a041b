//! Azure AD (Microsoft identity platform) provider.
//!
//! Talks to the v2.0 endpoints of a tenant:
//!
//! - `POST {host}/{tenant}/oauth2/v2.0/devicecode` to start a device code flow
//! - `POST {host}/{tenant}/oauth2/v2.0/token` for the `device_code`,
//!   `client_credentials` and `refresh_token` grants
//!
//! Account details are taken from the unverified `id_token` claims; the token
//! came straight from the token endpoint over TLS.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info};

use super::config::{AuthConfig, DEFAULT_AUTHORITY_HOST};
use super::provider::{
    BoxFuture, ClientKind, DeviceCodeCallback, DeviceCodeInfo, IdentityConnector,
    IdentityProvider, TokenGrant,
};
use super::types::Account;
use crate::error::{GraphError, GraphResult};

const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Lifetime assumed when the token response omits `expires_in`.
const DEFAULT_EXPIRES_IN: i64 = 3600;

/// Poll interval assumed when the device code response omits `interval`.
const DEFAULT_POLL_INTERVAL: u64 = 5;

/// Added to the poll interval on `slow_down`.
const SLOW_DOWN_STEP: u64 = 5;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct DeviceCodeResponse {
    user_code: String,
    device_code: String,
    verification_uri: String,
    expires_in: u64,
    #[serde(default)]
    interval: Option<u64>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OAuthErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct IdTokenClaims {
    #[serde(default)]
    oid: Option<String>,
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    tid: Option<String>,
    #[serde(default)]
    preferred_username: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

/// Reply of the token endpoint.
enum TokenReply {
    Granted(TokenResponse),
    Rejected(OAuthErrorResponse, u16),
}

/// What to do after a rejected device code poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollAction {
    Wait,
    SlowDown,
    Fail,
}

fn poll_action(error: &str) -> PollAction {
    match error {
        "authorization_pending" => PollAction::Wait,
        "slow_down" => PollAction::SlowDown,
        _ => PollAction::Fail,
    }
}

fn oauth_error(err: OAuthErrorResponse, status: u16) -> GraphError {
    let message = match &err.error_description {
        Some(description) => format!("{}: {}", err.error, description),
        None => err.error.clone(),
    };
    GraphError::identity(message)
        .with_code(err.error)
        .with_status(status)
}

/// Identity provider backed by the Microsoft identity platform.
#[derive(Debug)]
pub struct AzureIdentityProvider {
    config: AuthConfig,
    kind: ClientKind,
    authority_host: String,
    http_client: reqwest::Client,
}

impl AzureIdentityProvider {
    /// Creates a provider for `config` against `authority_host`.
    pub fn new(
        config: AuthConfig,
        kind: ClientKind,
        authority_host: impl Into<String>,
        timeout: Duration,
    ) -> GraphResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                GraphError::configuration(format!("failed to create HTTP client: {}", e))
                    .with_source(e)
            })?;

        Ok(Self {
            config,
            kind,
            authority_host: authority_host.into(),
            http_client,
        })
    }

    fn endpoint(&self, name: &str) -> String {
        format!(
            "{}/oauth2/v2.0/{}",
            self.config.authority(&self.authority_host),
            name
        )
    }

    fn environment(&self) -> String {
        url::Url::parse(&self.authority_host)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| self.authority_host.clone())
    }

    async fn post_form(&self, endpoint: &str, params: &[(&str, &str)]) -> GraphResult<(u16, String)> {
        debug!(kind = self.kind.as_str(), "POST {}", endpoint);
        let response = self
            .http_client
            .post(endpoint)
            .form(params)
            .send()
            .await
            .map_err(|e| {
                GraphError::network(format!("identity request failed: {}", e)).with_source(e)
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            GraphError::network(format!("failed to read response: {}", e)).with_source(e)
        })?;
        Ok((status, body))
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> GraphResult<TokenReply> {
        let (status, body) = self.post_form(&self.endpoint("token"), params).await?;

        if (200..300).contains(&status) {
            let token: TokenResponse = serde_json::from_str(&body).map_err(|e| {
                GraphError::invalid_response(format!("invalid token response: {}", e))
                    .with_source(e)
            })?;
            return Ok(TokenReply::Granted(token));
        }

        match serde_json::from_str::<OAuthErrorResponse>(&body) {
            Ok(err) => Ok(TokenReply::Rejected(err, status)),
            Err(_) => Err(GraphError::identity(format!(
                "token request failed ({}): {}",
                status, body
            ))
            .with_status(status)),
        }
    }

    async fn grant_or_error(&self, params: &[(&str, &str)], scopes: &[String]) -> GraphResult<Option<TokenGrant>> {
        match self.token_request(params).await? {
            TokenReply::Granted(token) => Ok(self.grant_from(token, scopes)),
            TokenReply::Rejected(err, status) => Err(oauth_error(err, status)),
        }
    }

    fn grant_from(&self, token: TokenResponse, requested: &[String]) -> Option<TokenGrant> {
        let access_token = token.access_token.filter(|t| !t.is_empty())?;
        let expires_in = token.expires_in.unwrap_or(DEFAULT_EXPIRES_IN);
        let scopes = match token.scope {
            Some(scope) if !scope.trim().is_empty() => {
                scope.split_whitespace().map(str::to_string).collect()
            }
            _ => requested.to_vec(),
        };
        let account = token
            .id_token
            .as_deref()
            .and_then(|id_token| self.account_from_id_token(id_token));

        Some(TokenGrant {
            access_token,
            expires_on: Utc::now() + chrono::Duration::seconds(expires_in),
            refresh_token: token.refresh_token,
            scopes,
            account,
        })
    }

    fn account_from_id_token(&self, id_token: &str) -> Option<Account> {
        let payload = id_token.split('.').nth(1)?;
        let bytes = match URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!("ignoring undecodable id_token: {}", e);
                return None;
            }
        };
        let claims: IdTokenClaims = serde_json::from_slice(&bytes).ok()?;

        let tenant_id = claims
            .tid
            .unwrap_or_else(|| self.config.tenant_id.clone());
        let object_id = claims.oid.or(claims.sub)?;

        Some(Account {
            home_account_id: format!("{}.{}", object_id, tenant_id),
            environment: self.environment(),
            tenant_id,
            username: claims.preferred_username.unwrap_or_default(),
            name: claims.name,
        })
    }

    async fn device_code_flow(
        &self,
        scopes: &[String],
        on_code: DeviceCodeCallback<'_>,
    ) -> GraphResult<Option<TokenGrant>> {
        let scope = scopes.join(" ");
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("scope", scope.as_str()),
        ];
        let (status, body) = self.post_form(&self.endpoint("devicecode"), &params).await?;
        if !(200..300).contains(&status) {
            return Err(match serde_json::from_str::<OAuthErrorResponse>(&body) {
                Ok(err) => oauth_error(err, status),
                Err(_) => GraphError::identity(format!(
                    "device code request failed ({}): {}",
                    status, body
                ))
                .with_status(status),
            });
        }

        let response: DeviceCodeResponse = serde_json::from_str(&body).map_err(|e| {
            GraphError::invalid_response(format!("invalid device code response: {}", e))
                .with_source(e)
        })?;

        let info = DeviceCodeInfo {
            message: response.message.unwrap_or_else(|| {
                format!(
                    "To sign in, use a web browser to open the page {} and enter the code {} to authenticate.",
                    response.verification_uri, response.user_code
                )
            }),
            user_code: response.user_code,
            device_code: response.device_code,
            verification_uri: response.verification_uri,
            expires_in: response.expires_in,
            interval: response.interval.unwrap_or(DEFAULT_POLL_INTERVAL),
        };
        on_code(&info);

        let deadline = tokio::time::Instant::now() + Duration::from_secs(info.expires_in);
        let mut interval = info.interval;
        let poll_params = [
            ("grant_type", DEVICE_CODE_GRANT),
            ("client_id", self.config.client_id.as_str()),
            ("device_code", info.device_code.as_str()),
        ];

        loop {
            tokio::time::sleep(Duration::from_secs(interval)).await;
            if tokio::time::Instant::now() >= deadline {
                return Err(GraphError::identity(
                    "The device code expired before sign-in completed.",
                )
                .with_code("expired_token"));
            }

            match self.token_request(&poll_params).await? {
                TokenReply::Granted(token) => {
                    info!("device code sign-in completed");
                    return Ok(self.grant_from(token, scopes));
                }
                TokenReply::Rejected(err, status) => match poll_action(&err.error) {
                    PollAction::Wait => debug!("authorization pending"),
                    PollAction::SlowDown => {
                        interval += SLOW_DOWN_STEP;
                        debug!("slowing down polling to {}s", interval);
                    }
                    PollAction::Fail => return Err(oauth_error(err, status)),
                },
            }
        }
    }
}

impl IdentityProvider for AzureIdentityProvider {
    fn acquire_by_device_code<'a>(
        &'a self,
        scopes: &'a [String],
        on_code: DeviceCodeCallback<'a>,
    ) -> BoxFuture<'a, GraphResult<Option<TokenGrant>>> {
        Box::pin(self.device_code_flow(scopes, on_code))
    }

    fn acquire_by_client_credentials<'a>(
        &'a self,
        client_secret: &'a str,
        scopes: &'a [String],
    ) -> BoxFuture<'a, GraphResult<Option<TokenGrant>>> {
        Box::pin(async move {
            let scope = scopes.join(" ");
            let params = [
                ("grant_type", "client_credentials"),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", client_secret),
                ("scope", scope.as_str()),
            ];
            let grant = self.grant_or_error(&params, scopes).await?;
            if grant.is_some() {
                info!("acquired app-only token");
            }
            Ok(grant)
        })
    }

    fn acquire_by_refresh_token<'a>(
        &'a self,
        refresh_token: &'a str,
        scopes: &'a [String],
    ) -> BoxFuture<'a, GraphResult<Option<TokenGrant>>> {
        Box::pin(async move {
            let scope = scopes.join(" ");
            let params = [
                ("grant_type", "refresh_token"),
                ("client_id", self.config.client_id.as_str()),
                ("refresh_token", refresh_token),
                ("scope", scope.as_str()),
            ];
            let grant = self.grant_or_error(&params, scopes).await?;
            if grant.is_some() {
                debug!("refreshed access token");
            }
            Ok(grant)
        })
    }
}

/// Builds [`AzureIdentityProvider`] handles.
#[derive(Debug, Clone)]
pub struct AzureConnector {
    authority_host: String,
    timeout: Duration,
}

impl AzureConnector {
    /// Creates a connector for the public cloud authority.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the authority host.
    pub fn with_authority_host(mut self, host: impl Into<String>) -> Self {
        self.authority_host = host.into();
        self
    }

    /// Sets the HTTP timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for AzureConnector {
    fn default() -> Self {
        Self {
            authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl IdentityConnector for AzureConnector {
    fn connect(
        &self,
        config: &AuthConfig,
        kind: ClientKind,
    ) -> GraphResult<Arc<dyn IdentityProvider>> {
        debug!(kind = kind.as_str(), "building identity provider for tenant {}", config.tenant_id);
        let provider =
            AzureIdentityProvider::new(config.clone(), kind, self.authority_host.clone(), self.timeout)?;
        Ok(Arc::new(provider))
    }
}
