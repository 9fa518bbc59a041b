//! Identity, token cache and Microsoft Graph mail/calendar services.
//!
//! The [`IdentityClient`] obtains bearer tokens and keeps them in a
//! [`CredentialStore`]. [`GraphClient`] sends requests with those tokens, and
//! [`MailService`] and [`CalendarService`] build the requests for each
//! operation.

pub mod calendar;
pub mod error;
pub mod graph;
pub mod identity;
pub mod mail;

pub use calendar::{
    CalendarService, DEFAULT_DAYS_AHEAD, DEFAULT_TIME_ZONE, EventQuery, EventUpdate, NewEvent,
    match_calendar,
};
pub use error::{ErrorKind, GraphError, GraphResult, friendly_message};
pub use graph::{AccessTokenSource, GraphClient, GraphRequest, GraphTransport, StaticToken};
pub use identity::{
    Account, AuthSettings, AuthStatus, AuthenticationResult, AzureConnector, CredentialStore,
    DeviceCodeInfo, FileCredentialStore, IdentityClient,
};
pub use mail::{DEFAULT_TOP, ListMessagesOptions, MailService};
