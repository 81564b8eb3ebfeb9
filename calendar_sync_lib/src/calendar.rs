use log::debug;
use stack_string::StackString;
use time::OffsetDateTime;
use uuid::Uuid;

use gcal_lib::{
    datetimetype::convert_str_to_date,
    gcal_event::{Event, EventDateTime},
};

use crate::{models::InsertWorkspaceCalendarEvent, timezone::TimeZone};

pub const UNTITLED_EVENT: &str = "Untitled Event";

/// Named color for a Google `colorId`.
#[must_use]
pub fn color_from_google_color_id(color_id: &str) -> Option<&'static str> {
    let color = match color_id.trim() {
        "1" | "3" => "PURPLE",
        "2" | "10" => "GREEN",
        "4" => "PINK",
        "5" => "YELLOW",
        "6" => "ORANGE",
        "7" => "CYAN",
        "8" => "GRAY",
        "9" => "BLUE",
        "11" => "RED",
        _ => return None,
    };
    Some(color)
}

fn non_empty(s: Option<&StackString>) -> Option<&StackString> {
    s.filter(|s| !s.is_empty())
}

/// Resolve a start or end to an instant. All-day values start at midnight in
/// the event's own zone, then `default_tz`, then UTC.
fn event_time(edt: &EventDateTime, default_tz: Option<TimeZone>) -> Option<OffsetDateTime> {
    if let Some(dt) = edt.date_time {
        return Some(*dt);
    }
    let date = edt.date.as_ref()?;
    let date = match convert_str_to_date(date) {
        Ok(date) => date,
        Err(e) => {
            debug!("unparseable all-day date {date}: {e}");
            return None;
        }
    };
    let tz = edt
        .time_zone
        .as_ref()
        .and_then(|tz| tz.parse().ok())
        .or(default_tz)
        .unwrap_or_else(TimeZone::utc);
    Some(tz.local_midnight(date))
}

/// Map an external event onto the stored row shape. Returns `None` when the
/// event has no id or neither a start nor an end.
#[must_use]
pub fn format_event_for_db(
    event: &Event,
    ws_id: Uuid,
    calendar_id: &str,
    default_tz: Option<TimeZone>,
) -> Option<InsertWorkspaceCalendarEvent> {
    let google_event_id = non_empty(event.id.as_ref())?.clone();

    let start = event
        .start
        .as_ref()
        .and_then(|s| event_time(s, default_tz));
    let end = event.end.as_ref().and_then(|e| event_time(e, default_tz));
    let (start_at, end_at) = match (start, end) {
        (Some(start), Some(end)) => (start, end),
        (Some(start), None) => (start, start),
        (None, Some(end)) => (end, end),
        (None, None) => {
            debug!("event {google_event_id} has no usable start or end");
            return None;
        }
    };

    Some(InsertWorkspaceCalendarEvent {
        ws_id,
        google_event_id,
        google_calendar_id: calendar_id.into(),
        title: non_empty(event.summary.as_ref())
            .cloned()
            .unwrap_or_else(|| UNTITLED_EVENT.into()),
        description: event.description.clone().unwrap_or_default(),
        start_at,
        end_at,
        location: non_empty(event.location.as_ref()).cloned(),
        color: event
            .color_id
            .as_ref().map(StackString::as_str)
            .and_then(|c| color_from_google_color_id(c))
            .map(Into::into),
    })
}

#[cfg(test)]
mod tests {
    use anyhow::Error;
    use gcal_lib::{
        datetimetype::DateTimeType,
        gcal_event::{Event, EventDateTime, EventStatus},
    };
    use stack_string::StackString;
    use time::macros::datetime;
    use uuid::Uuid;

    use crate::{
        calendar::{UNTITLED_EVENT, color_from_google_color_id, format_event_for_db},
        timezone::TimeZone,
    };

    fn timed(dt: time::OffsetDateTime) -> Option<EventDateTime> {
        Some(EventDateTime {
            date_time: Some(DateTimeType::from(dt)),
            ..EventDateTime::default()
        })
    }

    fn all_day(date: &str, time_zone: Option<&str>) -> Option<EventDateTime> {
        Some(EventDateTime {
            date: Some(date.into()),
            time_zone: time_zone.map(Into::into),
            ..EventDateTime::default()
        })
    }

    #[test]
    fn test_format_timed_event() {
        let ws_id = Uuid::new_v4();
        let event = Event {
            id: Some("evt-1".into()),
            status: Some(EventStatus::Confirmed),
            summary: Some("Planning".into()),
            description: Some("Quarterly".into()),
            location: Some("Room 4".into()),
            color_id: Some("11".into()),
            start: timed(datetime!(2024-05-01 15:00:00 UTC)),
            end: timed(datetime!(2024-05-01 16:00:00 UTC)),
            ..Event::default()
        };
        let row = format_event_for_db(&event, ws_id, "primary", None).unwrap();
        assert_eq!(row.ws_id, ws_id);
        assert_eq!(row.google_event_id.as_str(), "evt-1");
        assert_eq!(row.google_calendar_id.as_str(), "primary");
        assert_eq!(row.title.as_str(), "Planning");
        assert_eq!(row.description.as_str(), "Quarterly");
        assert_eq!(row.location.as_ref().map(StackString::as_str), Some("Room 4"));
        assert_eq!(row.color.as_ref().map(StackString::as_str), Some("RED"));
        assert_eq!(row.start_at, datetime!(2024-05-01 15:00:00 UTC));
        assert_eq!(row.end_at, datetime!(2024-05-01 16:00:00 UTC));
    }

    #[test]
    fn test_format_defaults() {
        let event = Event {
            id: Some("evt-2".into()),
            summary: Some(String::new().into()),
            start: timed(datetime!(2024-05-01 15:00:00 UTC)),
            ..Event::default()
        };
        let row = format_event_for_db(&event, Uuid::nil(), "primary", None).unwrap();
        assert_eq!(row.title.as_str(), UNTITLED_EVENT);
        assert_eq!(row.description.as_str(), "");
        assert_eq!(row.location, None);
        assert_eq!(row.color, None);
        assert_eq!(row.end_at, row.start_at);
    }

    #[test]
    fn test_format_all_day_event() -> Result<(), Error> {
        let event = Event {
            id: Some("holiday".into()),
            start: all_day("2024-07-04", Some("America/New_York")),
            end: all_day("2024-07-05", None),
            ..Event::default()
        };
        let default_tz: TimeZone = "Europe/Berlin".parse()?;
        let row = format_event_for_db(&event, Uuid::nil(), "primary", Some(default_tz)).unwrap();
        assert_eq!(row.start_at, datetime!(2024-07-04 04:00:00 UTC));
        assert_eq!(row.end_at, datetime!(2024-07-04 22:00:00 UTC));

        let row = format_event_for_db(&event, Uuid::nil(), "primary", None).unwrap();
        assert_eq!(row.end_at, datetime!(2024-07-05 00:00:00 UTC));
        Ok(())
    }

    #[test]
    fn test_format_unstorable_events() {
        let no_id = Event {
            start: timed(datetime!(2024-05-01 15:00:00 UTC)),
            ..Event::default()
        };
        assert!(format_event_for_db(&no_id, Uuid::nil(), "primary", None).is_none());

        let no_times = Event {
            id: Some("evt-3".into()),
            ..Event::default()
        };
        assert!(format_event_for_db(&no_times, Uuid::nil(), "primary", None).is_none());

        let end_only = Event {
            id: Some("evt-4".into()),
            end: timed(datetime!(2024-05-01 16:00:00 UTC)),
            ..Event::default()
        };
        let row = format_event_for_db(&end_only, Uuid::nil(), "primary", None).unwrap();
        assert_eq!(row.start_at, datetime!(2024-05-01 16:00:00 UTC));
    }

    #[test]
    fn test_color_mapping() {
        assert_eq!(color_from_google_color_id("1"), Some("PURPLE"));
        assert_eq!(color_from_google_color_id("9"), Some("BLUE"));
        assert_eq!(color_from_google_color_id("12"), None);
        assert_eq!(color_from_google_color_id(""), None);
    }
}
