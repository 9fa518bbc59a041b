//! Identity configuration.

use crate::error::{GraphError, GraphResult};

/// Delegated scopes requested by the device code flow unless overridden.
pub const DEFAULT_SCOPES: &[&str] = &["User.Read", "Mail.Read", "Mail.Send", "Calendars.ReadWrite"];

/// Resource identifier of Microsoft Graph.
pub const GRAPH_RESOURCE: &str = "https://graph.microsoft.com";

/// Scope requested by the client credentials flow.
pub const APP_ONLY_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Default Azure AD authority host.
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

const MISSING_CONFIG: &str = "Missing required configuration. Set AZURE_CLIENT_ID and \
                              AZURE_TENANT_ID environment variables or run configuration setup.";

/// Settings gathered from flags, environment and config file, not yet
/// validated.
///
/// Validation is deferred to [`AuthSettings::resolve`] so that commands such
/// as `auth status` can still run when the configuration is incomplete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthSettings {
    pub client_id: Option<String>,
    pub tenant_id: Option<String>,
    pub client_secret: Option<String>,
    /// Empty means [`DEFAULT_SCOPES`].
    pub scopes: Vec<String>,
}

impl AuthSettings {
    /// Validates the settings into an [`AuthConfig`].
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the client id or tenant id is missing.
    pub fn resolve(&self) -> GraphResult<AuthConfig> {
        let non_empty = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let (Some(client_id), Some(tenant_id)) =
            (non_empty(&self.client_id), non_empty(&self.tenant_id))
        else {
            return Err(GraphError::configuration(MISSING_CONFIG));
        };

        let scopes = if self.scopes.is_empty() {
            DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect()
        } else {
            self.scopes.clone()
        };

        Ok(AuthConfig {
            client_id,
            tenant_id,
            client_secret: non_empty(&self.client_secret),
            scopes,
        })
    }
}

/// Validated identity configuration, immutable for the process lifetime.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub client_id: String,
    pub tenant_id: String,
    pub client_secret: Option<String>,
    pub scopes: Vec<String>,
}

impl AuthConfig {
    /// Returns the authority URL for `host`, e.g.
    /// `https://login.microsoftonline.com/<tenant>`.
    pub fn authority(&self, host: &str) -> String {
        format!("{}/{}", host.trim_end_matches('/'), self.tenant_id)
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("client_id", &self.client_id)
            .field("tenant_id", &self.tenant_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "***"))
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Splits a comma separated scope list, dropping blanks.
pub fn parse_scopes(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
