//! Calendar commands.

use chrono::{DateTime, Local, TimeZone};
use colored::Colorize;
use msgraph_core::{CalendarEvent, OutputFormat, TimeRange, parse_time_spec_at};
use msgraph_services::{
    CalendarService, DEFAULT_DAYS_AHEAD, EventQuery, EventUpdate, GraphResult, NewEvent,
};

use super::{print_count, print_empty, success, with_spinner};
use crate::cli::{CalendarAddArgs, CalendarEditArgs, CalendarListArgs, split_addresses};
use crate::context::AppContext;
use crate::error::{ClientError, ClientResult};

const NOTHING_TO_UPDATE: &str = "Nothing to update. Provide at least one of --subject, --start, \
                                 --end, --body, --location, --attendees or --online.";

pub async fn list(ctx: &AppContext, args: CalendarListArgs) -> ClientResult<()> {
    let (start, end) = window(args.start.as_deref(), args.end.as_deref(), Local::now())?;
    let calendar = ctx.calendar();

    let events = with_spinner(
        "Fetching calendar events...",
        Some("Failed to fetch calendar events."),
        async {
            let query = EventQuery {
                start,
                end,
                top: args.top,
                time_zone: ctx.time_zone(args.timezone.as_deref()),
                calendar_id: resolve_calendar(&calendar, args.calendar.as_deref()).await?,
            };
            calendar.list_events(&query).await
        },
    )
    .await?;

    if events.is_empty() {
        print_empty(ctx.format(), "No events found for the specified period.");
        return Ok(());
    }
    println!("{}", ctx.formatter().event_list(&events, ctx.format())?);
    print_count(ctx.format(), events.len(), "event");
    Ok(())
}

pub async fn get(ctx: &AppContext, event_id: &str, timezone: Option<&str>) -> ClientResult<()> {
    let time_zone = ctx.time_zone(timezone);
    let event = with_spinner(
        "Fetching event details...",
        Some("Failed to fetch event details."),
        ctx.calendar().get_event(event_id, &time_zone),
    )
    .await?;
    println!("{}", ctx.formatter().event_detail(&event, ctx.format())?);
    Ok(())
}

pub async fn add(ctx: &AppContext, args: CalendarAddArgs) -> ClientResult<()> {
    let event = NewEvent {
        subject: args.subject,
        start: args.start,
        end: args.end,
        time_zone: ctx.time_zone(args.timezone.as_deref()),
        body: args.body,
        location: args.location,
        attendees: args
            .attendees
            .as_deref()
            .map(split_addresses)
            .unwrap_or_default(),
        is_online_meeting: args.online,
        is_all_day: args.all_day,
    };
    let calendar = ctx.calendar();

    let created = with_spinner(
        "Creating calendar event...",
        Some("Failed to create calendar event."),
        async {
            let calendar_id = resolve_calendar(&calendar, args.calendar.as_deref()).await?;
            calendar.create_event(&event, calendar_id.as_deref()).await
        },
    )
    .await?;

    report_saved(ctx, "Event created", &created)
}

pub async fn edit(ctx: &AppContext, args: CalendarEditArgs) -> ClientResult<()> {
    if !args.has_changes() {
        return Err(ClientError::Usage(NOTHING_TO_UPDATE.to_string()));
    }

    let update = EventUpdate {
        time_zone: ctx.time_zone(args.timezone.as_deref()),
        event_id: args.event_id,
        subject: args.subject,
        start: args.start,
        end: args.end,
        body: args.body,
        location: args.location,
        attendees: args.attendees.as_deref().map(split_addresses),
        is_online_meeting: args.online,
    };

    let updated = with_spinner(
        "Updating calendar event...",
        Some("Failed to update calendar event."),
        ctx.calendar().update_event(&update),
    )
    .await?;

    report_saved(ctx, "Event updated", &updated)
}

pub async fn calendars(ctx: &AppContext) -> ClientResult<()> {
    let calendars = with_spinner(
        "Fetching calendars...",
        Some("Failed to fetch calendars."),
        ctx.calendar().list_calendars(),
    )
    .await?;

    if calendars.is_empty() {
        print_empty(ctx.format(), "No calendars found.");
        return Ok(());
    }
    println!("{}", ctx.formatter().calendar_list(&calendars, ctx.format())?);
    print_count(ctx.format(), calendars.len(), "calendar");
    Ok(())
}

async fn resolve_calendar(
    calendar: &CalendarService<'_>,
    name: Option<&str>,
) -> GraphResult<Option<String>> {
    match name {
        Some(name) => calendar.resolve_calendar_id(name).await.map(Some),
        None => Ok(None),
    }
}

/// Prints a created or updated event: the full event for JSON output,
/// otherwise a success line, plus id and times under `--verbose`.
fn report_saved(ctx: &AppContext, what: &str, event: &CalendarEvent) -> ClientResult<()> {
    if ctx.format() == OutputFormat::Json {
        println!("{}", ctx.formatter().event_detail(event, OutputFormat::Json)?);
        return Ok(());
    }

    success(&format!(
        "{}: {}",
        what,
        event.subject.as_deref().unwrap_or("(No Subject)")
    ));
    if ctx.verbose() {
        println!("{}", format!("  ID: {}", event.id).dimmed());
        if let Some(start) = &event.start {
            println!("{}", format!("  Start: {}", start.date_time).dimmed());
        }
        if let Some(end) = &event.end {
            println!("{}", format!("  End: {}", end.date_time).dimmed());
        }
    }
    Ok(())
}

/// Resolves `--start`/`--end` to ISO instants. Missing bounds default to
/// the start of today and the end of the day [`DEFAULT_DAYS_AHEAD`] days
/// later.
fn window<Tz: TimeZone>(
    start: Option<&str>,
    end: Option<&str>,
    now: DateTime<Tz>,
) -> ClientResult<(String, String)> {
    let default = TimeRange::days_ahead(&now, DEFAULT_DAYS_AHEAD);
    let bound = |spec: &str| -> ClientResult<String> {
        Ok(parse_time_spec_at(spec, now.clone())?.start_iso())
    };

    let start = match start {
        Some(spec) => bound(spec)?,
        None => default.start_iso(),
    };
    let end = match end {
        Some(spec) => bound(spec)?,
        None => default.end_iso().unwrap_or_else(|| default.start_iso()),
    };
    Ok((start, end))
}
