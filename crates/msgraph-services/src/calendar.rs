//! Calendar operations on the signed-in user's calendars.
//!
//! Event times are requested in an explicit time zone through the
//! `Prefer: outlook.timezone` header, so the `start`/`end` wall-clock values
//! Graph returns can be shown as-is.

use chrono::{Days, NaiveDate};
use msgraph_core::{BodyType, Calendar, CalendarEvent, TimeRange};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::error::{ErrorKind, GraphError, GraphResult};
use crate::graph::{GraphCollection, GraphRequest, GraphTransport, decode};

const EVENT_SELECT: &str =
    "id,subject,start,end,location,organizer,isOnlineMeeting,onlineMeetingUrl,attendees,body";

/// Days after today covered by `calendar list` without `--end`.
pub const DEFAULT_DAYS_AHEAD: u64 = 7;

/// Time zone used when neither configuration nor the system names one.
pub const DEFAULT_TIME_ZONE: &str = "UTC";

/// A calendar view query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQuery {
    /// ISO 8601 start of the window.
    pub start: String,
    /// ISO 8601 end of the window.
    pub end: String,
    pub top: Option<u32>,
    pub time_zone: String,
    /// Calendar to read; the default calendar when `None`.
    pub calendar_id: Option<String>,
}

impl EventQuery {
    /// Creates a query covering `range`; an open range ends where it starts.
    pub fn for_range(range: &TimeRange, time_zone: impl Into<String>) -> Self {
        Self {
            start: range.start_iso(),
            end: range.end_iso().unwrap_or_else(|| range.start_iso()),
            top: None,
            time_zone: time_zone.into(),
            calendar_id: None,
        }
    }
}

/// A new event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewEvent {
    pub subject: String,
    pub start: String,
    pub end: String,
    pub time_zone: String,
    pub body: Option<String>,
    pub location: Option<String>,
    pub attendees: Vec<String>,
    pub is_online_meeting: bool,
    pub is_all_day: bool,
}

/// Changes to an existing event. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventUpdate {
    pub event_id: String,
    pub subject: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    /// Zone of `start` and `end`.
    pub time_zone: String,
    pub body: Option<String>,
    pub location: Option<String>,
    pub attendees: Option<Vec<String>>,
    pub is_online_meeting: Option<bool>,
}

/// Calendar service over a [`GraphTransport`].
pub struct CalendarService<'a> {
    transport: &'a dyn GraphTransport,
}

impl<'a> CalendarService<'a> {
    pub fn new(transport: &'a dyn GraphTransport) -> Self {
        Self { transport }
    }

    /// Lists event occurrences in a window, ordered by start.
    pub async fn list_events(&self, query: &EventQuery) -> GraphResult<Vec<CalendarEvent>> {
        let body = self.transport.send(list_events_request(query)).await?;
        let page: GraphCollection<CalendarEvent> = decode(body, "event list")?;
        debug!("fetched {} events", page.value.len());
        Ok(page.value)
    }

    /// Fetches one event.
    pub async fn get_event(&self, event_id: &str, time_zone: &str) -> GraphResult<CalendarEvent> {
        let event_id = require_event_id(event_id)?;
        let request = GraphRequest::get(format!("/me/events/{}", urlencoding::encode(event_id)))
            .header("Prefer", prefer_time_zone(time_zone));
        decode(self.transport.send(request).await?, "event")
    }

    /// Creates an event in the default calendar or in `calendar_id`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRecipient` before any request if an attendee address
    /// has no `@`.
    pub async fn create_event(
        &self,
        event: &NewEvent,
        calendar_id: Option<&str>,
    ) -> GraphResult<CalendarEvent> {
        let payload = new_event_payload(event)?;
        let path = match calendar_id {
            Some(id) => format!("/me/calendars/{}/events", urlencoding::encode(id)),
            None => "/me/events".to_string(),
        };
        let created: CalendarEvent =
            decode(self.transport.send(GraphRequest::post(path, payload)).await?, "event")?;
        debug!("created event {}", created.id);
        Ok(created)
    }

    /// Updates the given fields of an event.
    pub async fn update_event(&self, update: &EventUpdate) -> GraphResult<CalendarEvent> {
        let event_id = require_event_id(&update.event_id)?;
        let payload = event_update_payload(update)?;
        let path = format!("/me/events/{}", urlencoding::encode(event_id));
        let updated: CalendarEvent =
            decode(self.transport.send(GraphRequest::patch(path, payload)).await?, "event")?;
        debug!("updated event {}", updated.id);
        Ok(updated)
    }

    /// Lists the user's calendars.
    pub async fn list_calendars(&self) -> GraphResult<Vec<Calendar>> {
        let body = self.transport.send(GraphRequest::get("/me/calendars")).await?;
        let page: GraphCollection<Calendar> = decode(body, "calendar list")?;
        Ok(page.value)
    }

    /// Resolves a calendar name to its id.
    ///
    /// # Errors
    ///
    /// Returns `CalendarNotFound` or `AmbiguousCalendar`.
    pub async fn resolve_calendar_id(&self, name: &str) -> GraphResult<String> {
        require_calendar_name(name)?;
        let calendars = self.list_calendars().await?;
        let calendar = match_calendar(&calendars, name)?;
        debug!("resolved calendar {:?} to {}", name, calendar.id);
        Ok(calendar.id.clone())
    }
}

/// Picks the calendar named `name`.
///
/// Matching ignores case. An exact name match wins; otherwise the name may
/// match part of exactly one calendar name. A blank name matches nothing.
pub fn match_calendar<'c>(calendars: &'c [Calendar], name: &str) -> GraphResult<&'c Calendar> {
    let needle = require_calendar_name(name)?.to_lowercase();
    let name_of = |c: &Calendar| c.name.as_deref().unwrap_or("").to_lowercase();

    let exact: Vec<&Calendar> = calendars.iter().filter(|c| name_of(*c) == needle).collect();
    let candidates = if exact.is_empty() {
        calendars
            .iter()
            .filter(|c| name_of(*c).contains(&needle))
            .collect()
    } else {
        exact
    };

    match candidates.as_slice() {
        [only] => Ok(*only),
        [] => Err(GraphError::new(
            ErrorKind::CalendarNotFound,
            format!(
                "Calendar not found: \"{}\". Available calendars: {}",
                name,
                join_names(calendars.iter())
            ),
        )),
        matches => Err(GraphError::new(
            ErrorKind::AmbiguousCalendar,
            format!(
                "Multiple calendars match \"{}\": {}. Please be more specific.",
                name,
                join_names(matches.iter().copied())
            ),
        )),
    }
}

fn require_calendar_name(name: &str) -> GraphResult<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(GraphError::new(
            ErrorKind::CalendarNotFound,
            "Calendar name must not be empty.",
        ));
    }
    Ok(name)
}

fn join_names<'c>(calendars: impl Iterator<Item = &'c Calendar>) -> String {
    calendars
        .map(|c| c.name.as_deref().unwrap_or(""))
        .collect::<Vec<_>>()
        .join(", ")
}

fn prefer_time_zone(time_zone: &str) -> String {
    format!("outlook.timezone=\"{}\"", time_zone)
}

fn require_event_id(event_id: &str) -> GraphResult<&str> {
    let event_id = event_id.trim();
    if event_id.is_empty() {
        return Err(GraphError::new(
            ErrorKind::InvalidEventId,
            "Event ID cannot be empty.",
        ));
    }
    Ok(event_id)
}

pub(crate) fn list_events_request(query: &EventQuery) -> GraphRequest {
    let path = match query.calendar_id.as_deref() {
        Some(id) => format!("/me/calendars/{}/calendarView", urlencoding::encode(id)),
        None => "/me/calendarView".to_string(),
    };
    GraphRequest::get(path)
        .query("startDateTime", query.start.as_str())
        .query("endDateTime", query.end.as_str())
        .query("$select", EVENT_SELECT)
        .query("$orderby", "start/dateTime")
        .query_opt("$top", query.top.map(|t| t.to_string()))
        .header("Prefer", prefer_time_zone(&query.time_zone))
}

fn attendees_payload(addresses: &[String]) -> GraphResult<Value> {
    let attendees = addresses
        .iter()
        .map(|address| {
            let address = address.trim();
            if !address.contains('@') {
                return Err(GraphError::new(
                    ErrorKind::InvalidRecipient,
                    format!("Invalid attendee email address: \"{}\"", address),
                ));
            }
            Ok(json!({"emailAddress": {"address": address}, "type": "required"}))
        })
        .collect::<GraphResult<Vec<_>>>()?;
    Ok(Value::Array(attendees))
}

fn text_body(content: &str) -> Value {
    json!({"contentType": BodyType::Text.as_graph_str(), "content": content})
}

fn date_time(value: &str, time_zone: &str) -> Value {
    json!({"dateTime": value, "timeZone": time_zone})
}

/// Reduces `start` and `end` to midnight of their dates. An end on or before
/// the start date moves to the following day, since all-day ends are
/// exclusive.
fn all_day_bounds(start: &str, end: &str) -> (String, String) {
    let date_part = |s: &str| s.get(..10).unwrap_or(s).to_string();
    let (start_date, mut end_date) = (date_part(start), date_part(end));

    if let (Ok(s), Ok(e)) = (
        NaiveDate::parse_from_str(&start_date, "%Y-%m-%d"),
        NaiveDate::parse_from_str(&end_date, "%Y-%m-%d"),
    ) {
        if e <= s {
            if let Some(next) = s.checked_add_days(Days::new(1)) {
                end_date = next.format("%Y-%m-%d").to_string();
            }
        }
    }

    (
        format!("{}T00:00:00", start_date),
        format!("{}T00:00:00", end_date),
    )
}

pub(crate) fn new_event_payload(event: &NewEvent) -> GraphResult<Value> {
    let mut payload = Map::new();
    payload.insert("subject".into(), json!(event.subject));

    let (start, end) = if event.is_all_day {
        all_day_bounds(&event.start, &event.end)
    } else {
        (event.start.clone(), event.end.clone())
    };
    payload.insert("start".into(), date_time(&start, &event.time_zone));
    payload.insert("end".into(), date_time(&end, &event.time_zone));

    if let Some(body) = event.body.as_deref().filter(|b| !b.is_empty()) {
        payload.insert("body".into(), text_body(body));
    }
    if let Some(location) = event.location.as_deref().filter(|l| !l.is_empty()) {
        payload.insert("location".into(), json!({"displayName": location}));
    }
    if !event.attendees.is_empty() {
        payload.insert("attendees".into(), attendees_payload(&event.attendees)?);
    }
    if event.is_online_meeting {
        payload.insert("isOnlineMeeting".into(), Value::Bool(true));
    }
    if event.is_all_day {
        payload.insert("isAllDay".into(), Value::Bool(true));
    }
    Ok(Value::Object(payload))
}

pub(crate) fn event_update_payload(update: &EventUpdate) -> GraphResult<Value> {
    let mut payload = Map::new();
    if let Some(subject) = &update.subject {
        payload.insert("subject".into(), json!(subject));
    }
    if let Some(body) = &update.body {
        payload.insert("body".into(), text_body(body));
    }
    if let Some(start) = &update.start {
        payload.insert("start".into(), date_time(start, &update.time_zone));
    }
    if let Some(end) = &update.end {
        payload.insert("end".into(), date_time(end, &update.time_zone));
    }
    if let Some(location) = &update.location {
        payload.insert("location".into(), json!({"displayName": location}));
    }
    if let Some(attendees) = update.attendees.as_deref().filter(|a| !a.is_empty()) {
        payload.insert("attendees".into(), attendees_payload(attendees)?);
    }
    if let Some(online) = update.is_online_meeting {
        payload.insert("isOnlineMeeting".into(), Value::Bool(online));
    }
    Ok(Value::Object(payload))
}
