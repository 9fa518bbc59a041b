//! Log setup for the `d-msgraph` binary.
//!
//! Logs always go to stderr so that command output on stdout (notably
//! `--format json`) stays machine-readable. By default only this
//! workspace's crates log; `RUST_LOG` replaces that filter entirely.
//!
//! ```ignore
//! use msgraph_core::tracing::{init_tracing, TracingConfig};
//!
//! let config = if verbose { TracingConfig::cli_debug() } else { TracingConfig::cli() };
//! init_tracing(config)?;
//! ```

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

/// Crates whose events pass the default filter.
const OWN_TARGETS: &[&str] = &["d_msgraph", "msgraph_client", "msgraph_services", "msgraph_core"];

/// Why logging could not be set up.
#[derive(Debug, Error)]
pub enum TracingError {
    #[error("a global tracing subscriber is already installed: {0}")]
    AlreadyInstalled(#[from] tracing::subscriber::SetGlobalDefaultError),

    #[error("invalid log filter: {0}")]
    InvalidFilter(#[from] tracing_subscriber::filter::ParseError),
}

/// Line layout of log records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TracingOutputFormat {
    /// Multi-line, for reading by eye.
    Pretty,
    #[default]
    Compact,
    /// One JSON object per line.
    Json,
}

/// How the subscriber is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    /// Level for [`OWN_TARGETS`] when neither `filter` nor `RUST_LOG` is set.
    pub level: Level,
    pub format: TracingOutputFormat,
    /// Adds timestamps, module targets, source locations and span close
    /// timings to every record.
    pub detailed: bool,
    /// Explicit filter directive; takes precedence over `RUST_LOG`.
    pub filter: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::cli()
    }
}

impl TracingConfig {
    /// Warnings only, terse records.
    #[must_use]
    pub fn cli() -> Self {
        Self {
            level: Level::WARN,
            format: TracingOutputFormat::Compact,
            detailed: false,
            filter: None,
        }
    }

    /// Debug records with full detail, for `--verbose`.
    #[must_use]
    pub fn cli_debug() -> Self {
        Self {
            level: Level::DEBUG,
            detailed: true,
            ..Self::cli()
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: TracingOutputFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_filter(mut self, directive: impl Into<String>) -> Self {
        self.filter = Some(directive.into());
        self
    }

    /// Returns `msgraph_core=<level>,...` for every crate of the workspace.
    pub fn default_directive(&self) -> String {
        let level = self.level.to_string().to_ascii_lowercase();
        OWN_TARGETS
            .iter()
            .map(|target| format!("{}={}", target, level))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Builds the filter: `filter`, else `RUST_LOG`, else the default
    /// directive.
    pub fn env_filter(&self) -> Result<EnvFilter, TracingError> {
        if let Some(directive) = &self.filter {
            return Ok(EnvFilter::try_new(directive)?);
        }
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => Ok(EnvFilter::try_new(self.default_directive())?),
        }
    }

    fn fmt_layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let base = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(self.detailed)
            .with_file(self.detailed)
            .with_line_number(self.detailed)
            .with_span_events(if self.detailed {
                FmtSpan::CLOSE
            } else {
                FmtSpan::NONE
            });

        match (self.format, self.detailed) {
            (TracingOutputFormat::Pretty, _) => base.pretty().boxed(),
            (TracingOutputFormat::Json, _) => base.json().boxed(),
            (TracingOutputFormat::Compact, true) => base.compact().boxed(),
            (TracingOutputFormat::Compact, false) => base.compact().without_time().boxed(),
        }
    }
}

/// Installs the global subscriber. Call once, before any command runs.
///
/// # Errors
///
/// Fails if the filter directive does not parse or a subscriber is already
/// installed.
pub fn init_tracing(config: TracingConfig) -> Result<(), TracingError> {
    let filter = config.env_filter()?;
    let subscriber = tracing_subscriber::registry()
        .with(config.fmt_layer())
        .with(filter);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
