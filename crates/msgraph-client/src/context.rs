//! Per-process command context.

use std::sync::Arc;

use msgraph_core::{OutputFormat, OutputFormatter};
use msgraph_services::{
    AzureConnector, CalendarService, FileCredentialStore, GraphClient, IdentityClient, MailService,
};
use tracing::debug;

use crate::config::{CliOverrides, ConfigFile, Resolver, process_env};
use crate::error::ClientResult;

/// Everything a command needs: the identity client, the Graph client built
/// on top of it, and the output settings.
pub struct AppContext {
    identity: Arc<IdentityClient>,
    graph: GraphClient,
    formatter: OutputFormatter,
    format: OutputFormat,
    verbose: bool,
    /// Zone used when a command has no `--timezone`.
    default_time_zone: String,
}

impl AppContext {
    /// Builds the context from flags, the environment and the config file.
    ///
    /// No network call or credential validation happens here.
    pub fn new(
        overrides: &CliOverrides,
        file: &ConfigFile,
        format: OutputFormat,
        verbose: bool,
    ) -> ClientResult<Self> {
        let resolver = Resolver::new(file, process_env);
        let settings = resolver.auth_settings(overrides)?;
        let default_time_zone = resolver.time_zone(None);
        debug!(
            client_id = ?settings.client_id,
            tenant_id = ?settings.tenant_id,
            time_zone = %default_time_zone,
            "resolved settings"
        );

        let store = FileCredentialStore::default_location()?;
        debug!("token cache at {}", store.path().display());
        let identity = Arc::new(IdentityClient::new(
            settings,
            Arc::new(store),
            Arc::new(AzureConnector::new()),
        ));
        let graph = GraphClient::new(identity.clone())?;

        Ok(Self {
            identity,
            graph,
            formatter: OutputFormatter::local(),
            format,
            verbose,
            default_time_zone,
        })
    }

    pub fn identity(&self) -> &IdentityClient {
        &self.identity
    }

    pub fn mail(&self) -> MailService<'_> {
        MailService::new(&self.graph)
    }

    pub fn calendar(&self) -> CalendarService<'_> {
        CalendarService::new(&self.graph)
    }

    pub fn formatter(&self) -> &OutputFormatter {
        &self.formatter
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Returns `flag` if given, else the configured zone.
    pub fn time_zone(&self, flag: Option<&str>) -> String {
        flag.map(str::trim)
            .filter(|tz| !tz.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.default_time_zone.clone())
    }
}
