//! Error types for identity and Graph operations.
//!
//! Every failure crossing this crate's boundary is a [`GraphError`] carrying an
//! [`ErrorKind`]. API failures additionally keep the upstream Graph error
//! code, the HTTP status and the parsed error body so that verbose output can
//! show them.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// Upstream error codes with a friendlier explanation.
const FRIENDLY_MESSAGES: &[(&str, &str)] = &[
    (
        "InvalidAuthenticationToken",
        "Authentication token is invalid or expired. Please run \"d-msgraph auth login\" again.",
    ),
    (
        "Authorization_RequestDenied",
        "Access denied. You do not have permission to perform this operation.",
    ),
    (
        "Request_ResourceNotFound",
        "The requested resource was not found.",
    ),
    ("ErrorItemNotFound", "The specified item was not found."),
    ("ErrorAccessDenied", "Access denied. Check your permissions."),
    (
        "ErrorInvalidRecipients",
        "One or more recipients are invalid.",
    ),
    (
        "ErrorSendAsDenied",
        "You do not have permission to send as this user.",
    ),
    (
        "ErrorMailboxNotEnabledForRESTAPI",
        "The mailbox is not enabled for REST API access.",
    ),
    (
        "ErrorMailboxMoveInProgress",
        "The mailbox is currently being moved. Please try again later.",
    ),
    (
        "AuthenticationRequiredError",
        "Authentication is required. Please run \"d-msgraph auth login\".",
    ),
];

/// Returns the friendly explanation for a known error code.
pub fn friendly_message(code: &str) -> Option<&'static str> {
    FRIENDLY_MESSAGES
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, message)| *message)
}

/// The category of a [`GraphError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Client id or tenant id missing, or another configuration problem.
    Configuration,
    /// No usable cached token; the user must log in.
    AuthenticationRequired,
    /// Client credentials flow requested without a secret.
    MissingClientSecret,
    /// Device code flow completed without a token.
    DeviceCodeFlowFailed,
    /// Client credentials flow completed without a token.
    ClientCredentialsFlowFailed,
    /// The identity provider rejected a request.
    Identity,
    /// Empty or malformed event id.
    InvalidEventId,
    /// Empty or malformed message id.
    InvalidMessageId,
    /// Recipient or attendee address is not an email address.
    InvalidRecipient,
    /// No calendar matches the requested name.
    CalendarNotFound,
    /// Several calendars match the requested name.
    AmbiguousCalendar,
    /// A `--since` value could not be parsed.
    InvalidTimeSpec,
    /// Graph returned an error response.
    Api,
    /// Connection failed, timeout, DNS resolution, etc.
    Network,
    /// Response body could not be understood.
    InvalidResponse,
    /// The credential store could not be read or written.
    Storage,
}

impl ErrorKind {
    /// Returns the stable machine-readable code for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "ConfigurationError",
            Self::AuthenticationRequired => "AuthenticationRequiredError",
            Self::MissingClientSecret => "MissingClientSecret",
            Self::DeviceCodeFlowFailed => "DeviceCodeFlowFailed",
            Self::ClientCredentialsFlowFailed => "ClientCredentialsFlowFailed",
            Self::Identity => "IdentityError",
            Self::InvalidEventId => "InvalidEventId",
            Self::InvalidMessageId => "InvalidMessageId",
            Self::InvalidRecipient => "InvalidRecipient",
            Self::CalendarNotFound => "CalendarNotFound",
            Self::AmbiguousCalendar => "AmbiguousCalendar",
            Self::InvalidTimeSpec => "InvalidTimeSpec",
            Self::Api => "UnknownGraphError",
            Self::Network => "NetworkError",
            Self::InvalidResponse => "InvalidResponse",
            Self::Storage => "StorageError",
        }
    }

    /// Returns true for errors the user fixes by logging in again.
    pub fn is_authentication(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationRequired
                | Self::MissingClientSecret
                | Self::DeviceCodeFlowFailed
                | Self::ClientCredentialsFlowFailed
                | Self::Identity
        )
    }

    /// Returns true for input rejected before any network call.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidEventId
                | Self::InvalidMessageId
                | Self::InvalidRecipient
                | Self::CalendarNotFound
                | Self::AmbiguousCalendar
                | Self::InvalidTimeSpec
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error from the identity client or a Graph service.
#[derive(Debug, Error)]
pub struct GraphError {
    kind: ErrorKind,
    message: String,
    /// Upstream code, e.g. `ErrorItemNotFound` or `invalid_grant`.
    code: Option<String>,
    status: Option<u16>,
    details: Option<Value>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl GraphError {
    /// Creates a new error with the given kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: None,
            status: None,
            details: None,
            source: None,
        }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Creates an authentication-required error.
    pub fn authentication_required(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AuthenticationRequired, message)
    }

    /// Creates an identity provider error.
    pub fn identity(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Identity, message)
    }

    /// Creates a Graph API error for an upstream code.
    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Api, message).with_code(code)
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    /// Creates an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidResponse, message)
    }

    /// Creates a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Storage, message)
    }

    /// Sets the upstream error code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Sets the HTTP status.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Attaches the structured error body.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Sets the source error for this error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the upstream code if set, else the kind's code.
    pub fn code(&self) -> &str {
        self.code.as_deref().unwrap_or(self.kind.as_str())
    }

    /// Returns the HTTP status, if the error came from a response.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Returns the structured error body, if any.
    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    /// Returns the text to show the user: the friendly explanation for a
    /// known code, else the raw message.
    pub fn user_message(&self) -> &str {
        friendly_message(self.code()).unwrap_or(self.message.as_str())
    }
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<msgraph_core::TimeSpecError> for GraphError {
    fn from(err: msgraph_core::TimeSpecError) -> Self {
        Self::new(ErrorKind::InvalidTimeSpec, err.to_string()).with_source(err)
    }
}

/// A specialized Result type for identity and Graph operations.
pub type GraphResult<T> = Result<T, GraphError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_codes() {
        assert_eq!(
            ErrorKind::AuthenticationRequired.as_str(),
            "AuthenticationRequiredError"
        );
        assert_eq!(ErrorKind::MissingClientSecret.as_str(), "MissingClientSecret");
        assert_eq!(ErrorKind::InvalidRecipient.to_string(), "InvalidRecipient");
    }

    #[test]
    fn kind_categories() {
        assert!(ErrorKind::MissingClientSecret.is_authentication());
        assert!(!ErrorKind::Api.is_authentication());
        assert!(ErrorKind::AmbiguousCalendar.is_validation());
        assert!(ErrorKind::InvalidTimeSpec.is_validation());
        assert!(!ErrorKind::Network.is_validation());
    }

    #[test]
    fn api_error_prefers_friendly_text() {
        let err = GraphError::api("ErrorItemNotFound", "The specified object was not found in the store.")
            .with_status(404)
            .with_details(json!({"error": {"code": "ErrorItemNotFound"}}));
        assert_eq!(err.kind(), ErrorKind::Api);
        assert_eq!(err.code(), "ErrorItemNotFound");
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.user_message(), "The specified item was not found.");
        assert_eq!(err.to_string(), "The specified object was not found in the store.");
    }

    #[test]
    fn unknown_code_falls_back_to_message() {
        let err = GraphError::api("ErrorQuotaExceeded", "Mailbox is full");
        assert_eq!(err.user_message(), "Mailbox is full");
    }

    #[test]
    fn kind_code_is_used_without_upstream_code() {
        let err = GraphError::authentication_required("No cached accounts found.");
        assert_eq!(err.code(), "AuthenticationRequiredError");
        assert_eq!(
            err.user_message(),
            "Authentication is required. Please run \"d-msgraph auth login\"."
        );

        let invalid = GraphError::new(ErrorKind::InvalidEventId, "Event ID cannot be empty.");
        assert_eq!(invalid.user_message(), "Event ID cannot be empty.");
    }

    #[test]
    fn time_spec_conversion_keeps_source() {
        use std::error::Error;
        let parse_err = msgraph_core::parse_time_spec_at("nope", chrono::Utc::now()).unwrap_err();
        let err = GraphError::from(parse_err);
        assert_eq!(err.kind(), ErrorKind::InvalidTimeSpec);
        assert!(err.message().starts_with("Invalid --since value: \"nope\""));
        assert!(err.source().is_some());
    }
}
