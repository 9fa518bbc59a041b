//! Client error types and the error reporter.

use std::error::Error as _;
use std::fmt;

use colored::Colorize;
use msgraph_core::TimeSpecError;
use msgraph_services::GraphError;

use crate::secret::SecretError;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug)]
pub enum ClientError {
    /// Configuration file or key problem.
    Config(String),
    /// A secret reference in the configuration could not be resolved.
    Secret { key: String, source: SecretError },
    /// Identity or Graph failure.
    Graph(GraphError),
    /// A `--start`/`--end` value could not be parsed.
    TimeSpec(TimeSpecError),
    /// Command arguments that clap cannot reject on its own.
    Usage(String),
    /// Output could not be rendered.
    Render(serde_json::Error),
    /// IO error.
    Io(std::io::Error),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
            Self::Secret { key, source } => write!(f, "cannot resolve {}: {}", key, source),
            Self::Graph(err) => write!(f, "{}", err),
            Self::TimeSpec(err) => write!(f, "{}", err),
            Self::Usage(msg) => write!(f, "{}", msg),
            Self::Render(err) => write!(f, "failed to render output: {}", err),
            Self::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Secret { source, .. } => Some(source),
            Self::Graph(err) => Some(err),
            Self::TimeSpec(err) => Some(err),
            Self::Render(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Config(_) | Self::Usage(_) => None,
        }
    }
}

impl From<GraphError> for ClientError {
    fn from(err: GraphError) -> Self {
        Self::Graph(err)
    }
}

impl From<TimeSpecError> for ClientError {
    fn from(err: TimeSpecError) -> Self {
        Self::TimeSpec(err)
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Render(err)
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl ClientError {
    /// The message shown after `Error:`.
    pub fn headline(&self) -> String {
        match self {
            Self::Graph(err) => err.user_message().to_string(),
            other => other.to_string(),
        }
    }
}

/// Returns the report for `err`: the headline, then under `verbose` the
/// code, status, details and cause chain as indented lines.
pub fn describe(err: &ClientError, verbose: bool) -> Vec<String> {
    let mut lines = vec![err.headline()];
    if !verbose {
        return lines;
    }

    if let ClientError::Graph(graph) = err {
        lines.push(format!("  Code: {}", graph.code()));
        if let Some(status) = graph.status() {
            lines.push(format!("  Status: {}", status));
        }
        if graph.user_message() != graph.message() {
            lines.push(format!("  Message: {}", graph.message()));
        }
        if let Some(details) = graph.details() {
            let pretty = serde_json::to_string_pretty(details).unwrap_or_else(|_| details.to_string());
            lines.push("  Details:".to_string());
            lines.extend(pretty.lines().map(|line| format!("    {}", line)));
        }
    }

    // The wrapped error is already the headline.
    let mut cause = err.source().and_then(|inner| inner.source());
    while let Some(e) = cause {
        lines.push(format!("  Caused by: {}", e));
        cause = e.source();
    }
    lines
}

/// Prints `err` to stderr.
pub fn report(err: &ClientError, verbose: bool) {
    let mut lines = describe(err, verbose).into_iter();
    if let Some(headline) = lines.next() {
        eprintln!("{} {}", "Error:".red().bold(), headline.red());
    }
    for line in lines {
        eprintln!("{}", line.dimmed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use msgraph_services::ErrorKind;
    use serde_json::json;

    #[test]
    fn graph_errors_show_friendly_text() {
        let err = ClientError::from(GraphError::api("ErrorAccessDenied", "Access is denied."));
        assert_eq!(describe(&err, false), vec!["Access denied. Check your permissions."]);
    }

    #[test]
    fn verbose_report_adds_code_status_details() {
        let err = ClientError::from(
            GraphError::api("ErrorItemNotFound", "Not found in store.")
                .with_status(404)
                .with_details(json!({"error": {"code": "ErrorItemNotFound"}})),
        );
        let lines = describe(&err, true);
        assert_eq!(lines[0], "The specified item was not found.");
        assert_eq!(lines[1], "  Code: ErrorItemNotFound");
        assert_eq!(lines[2], "  Status: 404");
        assert_eq!(lines[3], "  Message: Not found in store.");
        assert_eq!(lines[4], "  Details:");
        assert_eq!(lines[5], "    {");
        assert!(lines.contains(&"        \"code\": \"ErrorItemNotFound\"".to_string()));
    }

    #[test]
    fn verbose_report_walks_cause_chain() {
        let io = std::io::Error::other("connection reset");
        let err = ClientError::from(GraphError::network("Graph request failed").with_source(io));
        let lines = describe(&err, true);
        assert_eq!(lines[0], "Graph request failed");
        assert_eq!(lines[1], "  Code: NetworkError");
        assert_eq!(lines.last().unwrap(), "  Caused by: connection reset");
    }

    #[test]
    fn non_graph_errors_use_display() {
        let err = ClientError::Config("unknown configuration key \"foo\"".into());
        assert_eq!(
            describe(&err, true),
            vec!["configuration error: unknown configuration key \"foo\""]
        );

        let err = ClientError::Secret {
            key: "clientSecret".into(),
            source: SecretError::EnvNotSet("MISSING".into()),
        };
        assert_eq!(
            err.headline(),
            "cannot resolve clientSecret: environment variable `MISSING` is not set"
        );
    }

    #[test]
    fn authentication_required_has_remediation() {
        let err = ClientError::from(GraphError::new(
            ErrorKind::AuthenticationRequired,
            "No cached accounts found.",
        ));
        assert_eq!(
            err.headline(),
            "Authentication is required. Please run \"d-msgraph auth login\"."
        );
    }
}
