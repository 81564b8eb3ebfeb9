use serde::{Deserialize, Serialize};
use stack_string::StackString;

use crate::datetimetype::DateTimeType;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Confirmed,
    Tentative,
    Cancelled,
    #[serde(other)]
    Unknown,
}

/// Start or end of an event. Timed events carry `dateTime`, all-day events
/// carry `date`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<StackString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_time: Option<DateTimeType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<StackString>,
}

/// Event resource as returned by `events.list`. Cancelled events in an
/// incremental listing usually carry nothing but `id` and `status`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<StackString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EventStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<StackString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<StackString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<StackString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_id: Option<StackString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<EventDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<EventDateTime>,
}

impl Event {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.status == Some(EventStatus::Cancelled)
    }
}

/// One page of an `events.list` response.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Events {
    #[serde(default)]
    pub items: Vec<Event>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<StackString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_sync_token: Option<StackString>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct GoogleErrorResponse {
    pub error: GoogleErrorBody,
}

#[derive(Deserialize, Debug)]
pub(crate) struct GoogleErrorBody {
    #[serde(default)]
    pub message: StackString,
}

#[cfg(test)]
mod tests {
    use anyhow::Error;
    use stack_string::StackString;
    use time::macros::datetime;

    use crate::gcal_event::{EventStatus, Events};

    #[test]
    fn test_deserialize_events_page() -> Result<(), Error> {
        let body = r#"{
            "kind": "calendar#events",
            "items": [
                {
                    "id": "evt-1",
                    "status": "confirmed",
                    "summary": "Standup",
                    "colorId": "9",
                    "start": {"dateTime": "2024-01-08T09:00:00-05:00", "timeZone": "America/New_York"},
                    "end": {"dateTime": "2024-01-08T09:15:00-05:00"}
                },
                {"id": "evt-2", "status": "cancelled"},
                {"id": "evt-3", "status": "somethingNew", "start": {"date": "2024-01-09"}},
                {"id": "evt-4"}
            ],
            "nextSyncToken": "sync-abc"
        }"#;
        let page: Events = serde_json::from_str(body)?;
        assert_eq!(page.items.len(), 4);
        assert_eq!(page.next_page_token, None);
        assert_eq!(page.next_sync_token.as_ref().map(StackString::as_str), Some("sync-abc"));

        let first = &page.items[0];
        assert_eq!(first.color_id.as_ref().map(StackString::as_str), Some("9"));
        let start = first.start.as_ref().and_then(|s| s.date_time).unwrap();
        assert_eq!(*start, datetime!(2024-01-08 14:00:00 UTC));

        assert!(page.items[1].is_cancelled());
        assert_eq!(page.items[2].status, Some(EventStatus::Unknown));
        assert!(!page.items[2].is_cancelled());
        assert_eq!(page.items[3].status, None);
        assert!(!page.items[3].is_cancelled());
        Ok(())
    }

    #[test]
    fn test_deserialize_empty_page() -> Result<(), Error> {
        let page: Events = serde_json::from_str(r#"{"nextSyncToken": "t"}"#)?;
        assert!(page.items.is_empty());
        Ok(())
    }
}
