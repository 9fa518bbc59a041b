//! Core types: time ranges, Graph resources, formatting, tracing

pub mod format;
pub mod model;
pub mod time;
pub mod tracing;

pub use format::{OutputFormat, OutputFormatter, Table, strip_html, truncate};
pub use model::{
    Attendee, BodyType, Calendar, CalendarEvent, DateTimeTimeZone, EmailAddress, ItemBody,
    Location, MailMessage, Recipient,
};
pub use time::{TimeRange, TimeSpecError, format_instant, parse_time_spec, parse_time_spec_at};
pub use self::tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
