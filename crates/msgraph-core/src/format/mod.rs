//! Output formatting for mail and calendar resources.
//!
//! This module renders Graph resources in the three output formats the CLI
//! offers:
//! - **Table**: aligned columns, one row per item
//! - **Text**: multi-line blocks, one per item
//! - **JSON**: pretty-printed and lossless
//!
//! # Example
//!
//! ```rust
//! use msgraph_core::format::{OutputFormat, OutputFormatter};
//! use msgraph_core::model::MailMessage;
//!
//! let formatter = OutputFormatter::new(chrono::Utc);
//! let output = formatter.mail_list(&[MailMessage::default()], OutputFormat::Text).unwrap();
//! assert!(output.starts_with("#1 "));
//! ```

mod table;

use std::borrow::Cow;
use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::{BodyType, Calendar, CalendarEvent, ItemBody, MailMessage};

pub use table::Table;

const NO_SUBJECT: &str = "(No Subject)";
const RULE_WIDTH: usize = 60;

/// The output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Aligned columns.
    #[default]
    Table,
    /// Pretty-printed JSON.
    Json,
    /// Multi-line human-readable blocks.
    Text,
}

impl OutputFormat {
    /// Returns the name used on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Json => "json",
            Self::Text => "text",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Renders resources, showing instants in a fixed timezone.
#[derive(Debug, Clone)]
pub struct OutputFormatter<Tz: TimeZone = Local> {
    tz: Tz,
}

impl OutputFormatter<Local> {
    /// Creates a formatter for the system timezone.
    pub fn local() -> Self {
        Self { tz: Local }
    }
}

impl<Tz> OutputFormatter<Tz>
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    /// Creates a formatter that shows instants in `tz`.
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    // -----------------------------------------------------------------------
    // Mail
    // -----------------------------------------------------------------------

    /// Renders a list of messages.
    pub fn mail_list(
        &self,
        messages: &[MailMessage],
        format: OutputFormat,
    ) -> serde_json::Result<String> {
        match format {
            OutputFormat::Json => serde_json::to_string_pretty(messages),
            OutputFormat::Text => Ok(messages
                .iter()
                .enumerate()
                .map(|(i, m)| self.mail_block(i + 1, m))
                .collect::<Vec<_>>()
                .join("\n\n")),
            OutputFormat::Table => {
                let mut table = Table::new(["Date", "From", "Subject", "Read"]);
                for m in messages {
                    let from = m
                        .from
                        .as_ref()
                        .map(|r| r.email_address.label())
                        .unwrap_or("");
                    table.push([
                        self.format_timestamp(m.received_date_time.as_deref().unwrap_or("")),
                        truncate(from, 25).into_owned(),
                        truncate(subject_or_default(m.subject.as_deref()), 37).into_owned(),
                        yes_no(m.is_read.unwrap_or(false)).to_string(),
                    ]);
                }
                Ok(table.render())
            }
        }
    }

    /// Renders a single message with its body.
    pub fn mail_detail(
        &self,
        message: &MailMessage,
        format: OutputFormat,
    ) -> serde_json::Result<String> {
        if format == OutputFormat::Json {
            return serde_json::to_string_pretty(message);
        }

        let from = message
            .from
            .as_ref()
            .map(|r| r.email_address.mailbox())
            .unwrap_or_else(|| " <>".to_string());
        let to = message
            .to_recipients
            .iter()
            .flatten()
            .map(|r| r.email_address.mailbox())
            .collect::<Vec<_>>()
            .join(", ");
        let body = body_text(message.body.as_ref())
            .or_else(|| message.body_preview.clone())
            .unwrap_or_default();

        let lines = [
            format!("Subject: {}", subject_or_default(message.subject.as_deref())),
            format!("From:    {}", from),
            format!("To:      {}", to),
            format!(
                "Date:    {}",
                self.format_timestamp(message.received_date_time.as_deref().unwrap_or(""))
            ),
            format!("Read:    {}", yes_no(message.is_read.unwrap_or(false))),
            format!("Attach:  {}", yes_no(message.has_attachments.unwrap_or(false))),
            format!("ID:      {}", message.id),
            String::new(),
            rule(),
            String::new(),
            body,
        ];
        Ok(lines.join("\n"))
    }

    fn mail_block(&self, index: usize, message: &MailMessage) -> String {
        let mut flags = String::new();
        if !message.is_read.unwrap_or(true) {
            flags.push_str("[Unread] ");
        }
        if message.has_attachments.unwrap_or(false) {
            flags.push_str("[Attach] ");
        }
        let from = message
            .from
            .as_ref()
            .map(|r| r.email_address.mailbox())
            .unwrap_or_else(|| " <>".to_string());

        [
            format!(
                "#{} {}{}",
                index,
                flags,
                subject_or_default(message.subject.as_deref())
            ),
            format!("  From: {}", from),
            format!(
                "  Date: {}",
                self.format_timestamp(message.received_date_time.as_deref().unwrap_or(""))
            ),
            format!("  ID:   {}", message.id),
        ]
        .join("\n")
    }

    // -----------------------------------------------------------------------
    // Calendar
    // -----------------------------------------------------------------------

    /// Renders a list of events.
    pub fn event_list(
        &self,
        events: &[CalendarEvent],
        format: OutputFormat,
    ) -> serde_json::Result<String> {
        match format {
            OutputFormat::Json => serde_json::to_string_pretty(events),
            OutputFormat::Text => Ok(events
                .iter()
                .enumerate()
                .map(|(i, e)| self.event_block(i + 1, e))
                .collect::<Vec<_>>()
                .join("\n\n")),
            OutputFormat::Table => {
                let mut table = Table::new(["Start", "End", "Subject", "Location"]);
                for e in events {
                    table.push([
                        self.event_time(e.start.as_ref().map(|t| t.date_time.as_str())),
                        self.event_time(e.end.as_ref().map(|t| t.date_time.as_str())),
                        truncate(subject_or_default(e.subject.as_deref()), 32).into_owned(),
                        truncate(e.location_name().unwrap_or(""), 17).into_owned(),
                    ]);
                }
                Ok(table.render())
            }
        }
    }

    /// Renders a single event with attendees and body.
    pub fn event_detail(
        &self,
        event: &CalendarEvent,
        format: OutputFormat,
    ) -> serde_json::Result<String> {
        if format == OutputFormat::Json {
            return serde_json::to_string_pretty(event);
        }

        let zone = |t: Option<&crate::model::DateTimeTimeZone>| {
            t.map(|t| t.time_zone.clone()).unwrap_or_default()
        };
        let organizer = event
            .organizer
            .as_ref()
            .map(|r| r.email_address.mailbox())
            .unwrap_or_else(|| " <>".to_string());

        let mut lines = vec![
            format!("Subject:   {}", subject_or_default(event.subject.as_deref())),
            format!(
                "Start:     {} ({})",
                self.event_time(event.start.as_ref().map(|t| t.date_time.as_str())),
                zone(event.start.as_ref())
            ),
            format!(
                "End:       {} ({})",
                self.event_time(event.end.as_ref().map(|t| t.date_time.as_str())),
                zone(event.end.as_ref())
            ),
            format!("Location:  {}", event.location_name().unwrap_or("N/A")),
            format!("Organizer: {}", organizer),
            format!("Online:    {}", yes_no(event.is_online_meeting.unwrap_or(false))),
        ];

        if let Some(url) = event.online_meeting_url.as_deref().filter(|u| !u.is_empty()) {
            lines.push(format!("Meet URL:  {}", url));
        }
        lines.push(format!("ID:        {}", event.id));

        let attendees = event.attendees.as_deref().unwrap_or_default();
        if !attendees.is_empty() {
            lines.push(String::new());
            lines.push("Attendees:".to_string());
            for a in attendees {
                lines.push(format!(
                    "  - {} ({})",
                    a.email_address.mailbox(),
                    a.kind.as_deref().unwrap_or("required")
                ));
            }
        }

        if let Some(body) = body_text(event.body.as_ref()).filter(|b| !b.is_empty()) {
            lines.push(String::new());
            lines.push(rule());
            lines.push(String::new());
            lines.push(body);
        }

        Ok(lines.join("\n"))
    }

    fn event_block(&self, index: usize, event: &CalendarEvent) -> String {
        let online = if event.is_online_meeting.unwrap_or(false) {
            " [Online]"
        } else {
            ""
        };
        [
            format!(
                "#{} {}{}",
                index,
                subject_or_default(event.subject.as_deref()),
                online
            ),
            format!(
                "  Start:    {}",
                self.event_time(event.start.as_ref().map(|t| t.date_time.as_str()))
            ),
            format!(
                "  End:      {}",
                self.event_time(event.end.as_ref().map(|t| t.date_time.as_str()))
            ),
            format!("  Location: {}", event.location_name().unwrap_or("N/A")),
            format!("  ID:       {}", event.id),
        ]
        .join("\n")
    }

    /// Renders the list of calendars.
    pub fn calendar_list(
        &self,
        calendars: &[Calendar],
        format: OutputFormat,
    ) -> serde_json::Result<String> {
        match format {
            OutputFormat::Json => serde_json::to_string_pretty(calendars),
            OutputFormat::Text => Ok(calendars
                .iter()
                .enumerate()
                .map(|(i, c)| {
                    let default = if c.is_default_calendar.unwrap_or(false) {
                        " [Default]"
                    } else {
                        ""
                    };
                    [
                        format!("#{} {}{}", i + 1, c.name.as_deref().unwrap_or(""), default),
                        format!(
                            "  Owner:    {}",
                            c.owner.as_ref().map(|o| o.mailbox()).unwrap_or_default()
                        ),
                        format!("  Can Edit: {}", yes_no(c.can_edit.unwrap_or(false))),
                        format!("  ID:       {}", c.id),
                    ]
                    .join("\n")
                })
                .collect::<Vec<_>>()
                .join("\n\n")),
            OutputFormat::Table => {
                let mut table = Table::new(["Name", "Owner", "Default", "Can Edit"]);
                for c in calendars {
                    table.push([
                        c.name.clone().unwrap_or_default(),
                        c.owner
                            .as_ref()
                            .map(|o| o.label().to_string())
                            .unwrap_or_default(),
                        if c.is_default_calendar.unwrap_or(false) {
                            "Yes".to_string()
                        } else {
                            String::new()
                        },
                        yes_no(c.can_edit.unwrap_or(false)).to_string(),
                    ]);
                }
                Ok(table.render())
            }
        }
    }

    // -----------------------------------------------------------------------
    // Time display
    // -----------------------------------------------------------------------

    /// Formats an RFC 3339 instant in this formatter's timezone.
    ///
    /// Values without an offset are shown as-is (Graph already expressed
    /// them in the requested zone). Unparseable input is returned unchanged.
    pub fn format_timestamp(&self, raw: &str) -> String {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return dt
                .with_timezone(&self.tz)
                .format("%Y-%m-%d %H:%M")
                .to_string();
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
            return naive.format("%Y-%m-%d %H:%M").to_string();
        }
        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return date.format("%Y-%m-%d").to_string();
        }
        raw.to_string()
    }

    fn event_time(&self, raw: Option<&str>) -> String {
        raw.map(|r| self.format_timestamp(r)).unwrap_or_default()
    }
}

fn subject_or_default(subject: Option<&str>) -> &str {
    subject.filter(|s| !s.is_empty()).unwrap_or(NO_SUBJECT)
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "Yes" } else { "No" }
}

fn rule() -> String {
    "─".repeat(RULE_WIDTH)
}

fn body_text(body: Option<&ItemBody>) -> Option<String> {
    body.map(|b| match b.content_type {
        BodyType::Html => strip_html(&b.content),
        BodyType::Text => b.content.clone(),
    })
}

static STYLE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style[^>]*>.*?</style>").expect("Invalid style regex"));
static SCRIPT_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script[^>]*>.*?</script>").expect("Invalid script regex")
});
static LINE_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</p>|</div>|</li>").expect("Invalid line break regex")
});
static ANY_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("Invalid tag regex"));
static BLANK_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("Invalid blank line regex"));

/// Converts an HTML body to readable plain text.
///
/// Drops `<style>` and `<script>` blocks, turns block ends and `<br>` into
/// newlines, removes remaining tags, decodes the common entities and
/// collapses runs of blank lines.
pub fn strip_html(html: &str) -> String {
    let text = STYLE_BLOCK.replace_all(html, "");
    let text = SCRIPT_BLOCK.replace_all(&text, "");
    let text = LINE_BREAK.replace_all(&text, "\n");
    let text = ANY_TAG.replace_all(&text, "");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    BLANK_RUN.replace_all(&text, "\n\n").trim().to_string()
}

/// Truncates a string with ellipsis if it exceeds the given length.
pub fn truncate(s: &str, max_len: usize) -> Cow<'_, str> {
    if max_len == 0 {
        return Cow::Borrowed("");
    }

    if s.chars().count() <= max_len {
        return Cow::Borrowed(s);
    }

    let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
    Cow::Owned(format!("{}...", truncated))
}
