//! Command-line interface definition.

use clap::{Args, Parser, Subcommand, ValueEnum};
use msgraph_core::OutputFormat;

use crate::config::CliOverrides;

/// d-msgraph - Microsoft Graph CLI for mail and calendar
#[derive(Debug, Parser)]
#[command(name = "d-msgraph")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Show error codes, response details and debug logs
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = FormatArg::Table, global = true)]
    pub format: FormatArg,

    // --- Identity overrides ---
    /// Azure AD application (client) id [env: AZURE_CLIENT_ID]
    #[arg(long, global = true)]
    pub client_id: Option<String>,

    /// Azure AD tenant id [env: AZURE_TENANT_ID]
    #[arg(long, global = true)]
    pub tenant_id: Option<String>,

    /// Client secret for the client credentials flow [env: AZURE_CLIENT_SECRET]
    #[arg(long, global = true)]
    pub client_secret: Option<String>,

    /// Comma separated delegated scopes [env: GRAPH_SCOPES]
    #[arg(long, global = true)]
    pub scopes: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Returns the identity values given on the command line.
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            client_id: self.client_id.clone(),
            tenant_id: self.tenant_id.clone(),
            client_secret: self.client_secret.clone(),
            scopes: self.scopes.clone(),
        }
    }
}

/// `--format` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Table,
    Json,
    Text,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Table => Self::Table,
            FormatArg::Json => Self::Json,
            FormatArg::Text => Self::Text,
        }
    }
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Authentication management
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },

    /// Mail operations
    Mail {
        #[command(subcommand)]
        action: MailAction,
    },

    /// Calendar operations
    Calendar {
        #[command(subcommand)]
        action: CalendarAction,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Authentication actions.
#[derive(Debug, Subcommand)]
pub enum AuthAction {
    /// Login to Microsoft Graph
    Login {
        /// Use the client credentials flow instead of the device code flow
        #[arg(long)]
        client_credentials: bool,
    },

    /// Logout and clear cached tokens
    Logout,

    /// Show current authentication status
    Status,
}

/// Mail actions.
#[derive(Debug, Subcommand)]
pub enum MailAction {
    /// List mail messages
    List(MailListArgs),

    /// Read a specific mail message
    Read {
        /// Message id
        message_id: String,
    },

    /// Send a mail message
    Send(MailSendArgs),
}

#[derive(Debug, Args)]
pub struct MailListArgs {
    /// Number of messages to show
    #[arg(
        long,
        short = 'n',
        default_value_t = msgraph_services::DEFAULT_TOP,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub top: u32,

    /// Only messages received since: last60min, last6hours, last7days,
    /// yesterday, today, or an ISO date
    #[arg(long)]
    pub since: Option<String>,

    /// Raw OData filter, combined with --since
    #[arg(long)]
    pub filter: Option<String>,

    /// Free-text search
    #[arg(long)]
    pub search: Option<String>,

    /// Folder id or well-known name (inbox, sentitems, ...)
    #[arg(long)]
    pub folder: Option<String>,
}

#[derive(Debug, Args)]
pub struct MailSendArgs {
    /// Recipient addresses, comma separated
    #[arg(long, short = 't')]
    pub to: String,

    /// Mail subject
    #[arg(long, short = 's')]
    pub subject: String,

    /// Mail body
    #[arg(long, short = 'b', default_value = "")]
    pub body: String,

    /// Send the body as HTML
    #[arg(long)]
    pub html: bool,
}

/// Calendar actions.
#[derive(Debug, Subcommand)]
pub enum CalendarAction {
    /// List calendar events
    List(CalendarListArgs),

    /// Get a specific calendar event
    Get {
        /// Event id
        event_id: String,

        /// Time zone for event times
        #[arg(long)]
        timezone: Option<String>,
    },

    /// Create a new calendar event
    Add(CalendarAddArgs),

    /// Edit an existing calendar event
    Edit(CalendarEditArgs),

    /// List available calendars
    Calendars,
}

#[derive(Debug, Args)]
pub struct CalendarListArgs {
    /// Start of the window (ISO 8601 or a time spec such as `today`);
    /// defaults to the start of today
    #[arg(long)]
    pub start: Option<String>,

    /// End of the window; defaults to the end of the 7th day from today
    #[arg(long)]
    pub end: Option<String>,

    /// Maximum number of events
    #[arg(long, short = 'n', value_parser = clap::value_parser!(u32).range(1..))]
    pub top: Option<u32>,

    /// Time zone for event times
    #[arg(long)]
    pub timezone: Option<String>,

    /// Calendar name (partial match)
    #[arg(long)]
    pub calendar: Option<String>,
}

#[derive(Debug, Args)]
pub struct CalendarAddArgs {
    /// Event subject
    #[arg(long, short = 's')]
    pub subject: String,

    /// Start date and time (ISO 8601)
    #[arg(long)]
    pub start: String,

    /// End date and time (ISO 8601)
    #[arg(long)]
    pub end: String,

    /// Event body
    #[arg(long)]
    pub body: Option<String>,

    /// Event location
    #[arg(long)]
    pub location: Option<String>,

    /// Attendee addresses, comma separated
    #[arg(long)]
    pub attendees: Option<String>,

    /// Create as an online meeting
    #[arg(long)]
    pub online: bool,

    /// Create as an all-day event
    #[arg(long)]
    pub all_day: bool,

    /// Time zone of --start and --end
    #[arg(long)]
    pub timezone: Option<String>,

    /// Calendar name (partial match)
    #[arg(long)]
    pub calendar: Option<String>,
}

#[derive(Debug, Args)]
pub struct CalendarEditArgs {
    /// Event id
    pub event_id: String,

    /// New subject
    #[arg(long, short = 's')]
    pub subject: Option<String>,

    /// New start date and time (ISO 8601)
    #[arg(long)]
    pub start: Option<String>,

    /// New end date and time (ISO 8601)
    #[arg(long)]
    pub end: Option<String>,

    /// New body
    #[arg(long)]
    pub body: Option<String>,

    /// New location
    #[arg(long)]
    pub location: Option<String>,

    /// Replace the attendees, comma separated
    #[arg(long)]
    pub attendees: Option<String>,

    /// Turn the online meeting on or off
    #[arg(long, value_name = "BOOL")]
    pub online: Option<bool>,

    /// Time zone of --start and --end
    #[arg(long)]
    pub timezone: Option<String>,
}

impl CalendarEditArgs {
    /// Returns true if at least one field would change.
    pub fn has_changes(&self) -> bool {
        self.subject.is_some()
            || self.start.is_some()
            || self.end.is_some()
            || self.body.is_some()
            || self.location.is_some()
            || self.attendees.is_some()
            || self.online.is_some()
    }
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Show the configuration file contents
    Show,

    /// Set a configuration value (clientId, tenantId, clientSecret, scopes, timezone)
    Set { key: String, value: String },

    /// Remove a configuration value
    Unset { key: String },

    /// Show the configuration file path
    Path,
}

/// Splits a comma separated address list.
pub fn split_addresses(list: &str) -> Vec<String> {
    list.split(',').map(|a| a.trim().to_string()).collect()
}
