#![allow(clippy::must_use_candidate)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::similar_names)]
#![allow(clippy::shadow_unrelated)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::used_underscore_binding)]
#![allow(clippy::default_trait_access)]

pub mod app;
pub mod errors;
pub mod routes;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use stack_string::StackString;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use calendar_sync_lib::{
    calendar_sync::SyncOutcome,
    models::{SyncLog, SyncToken, WorkspaceCalendarEvent},
    sync_metrics::SyncMetrics,
};
use gcal_lib::datetimetype::DateTimeType;

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequestBody {
    pub user_id: Option<Uuid>,
    pub calendar_id: Option<StackString>,
    /// Start of the window listed when no sync token is stored
    #[schema(value_type = Option<String>, format = DateTime)]
    pub start_date: Option<DateTimeType>,
    #[schema(value_type = Option<String>, format = DateTime)]
    pub end_date: Option<DateTimeType>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncMetricsWrapper {
    pub token_operations_ms: u64,
    pub google_api_fetch_ms: u64,
    pub event_processing_ms: u64,
    pub database_writes_ms: u64,
    pub total_ms: u64,
    pub api_calls_count: u64,
    pub pages_fetched: u64,
    pub retry_count: u64,
    pub events_fetched_total: u64,
    pub events_filtered_out: u64,
    pub batch_count: u64,
    pub sync_token_used: bool,
}

impl From<SyncMetrics> for SyncMetricsWrapper {
    fn from(item: SyncMetrics) -> Self {
        Self {
            token_operations_ms: item.token_operations_ms,
            google_api_fetch_ms: item.google_api_fetch_ms,
            event_processing_ms: item.event_processing_ms,
            database_writes_ms: item.database_writes_ms,
            total_ms: item.total_ms,
            api_calls_count: item.api_calls_count,
            pages_fetched: item.pages_fetched,
            retry_count: item.retry_count,
            events_fetched_total: item.events_fetched_total,
            events_filtered_out: item.events_filtered_out,
            batch_count: item.batch_count,
            sync_token_used: item.sync_token_used,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcomeWrapper {
    pub events_inserted: usize,
    pub events_updated: usize,
    pub events_deleted: usize,
    pub metrics: SyncMetricsWrapper,
}

impl From<SyncOutcome> for SyncOutcomeWrapper {
    fn from(item: SyncOutcome) -> Self {
        Self {
            events_inserted: item.events_inserted,
            events_updated: item.events_updated,
            events_deleted: item.events_deleted,
            metrics: item.metrics.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncTokenStatus {
    pub ws_id: StackString,
    pub has_token: bool,
    pub sync_token: Option<StackString>,
    #[schema(value_type = Option<String>, format = DateTime)]
    pub updated_at: Option<DateTimeType>,
}

impl SyncTokenStatus {
    pub fn new(ws_id: &str, token: Option<SyncToken>) -> Self {
        Self {
            ws_id: ws_id.into(),
            has_token: token.is_some(),
            updated_at: token.as_ref().map(|t| t.updated_at.into()),
            sync_token: token.map(|t| t.token),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct ClearTokenResponse {
    pub cleared: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncLogWrapper {
    pub id: Uuid,
    pub ws_id: Uuid,
    pub user_id: Uuid,
    pub calendar_id: StackString,
    pub sync_type: StackString,
    pub status: StackString,
    pub events_inserted: i32,
    pub events_updated: i32,
    pub events_deleted: i32,
    #[schema(value_type = Object)]
    pub metrics: Value,
    pub error_message: Option<StackString>,
    #[schema(value_type = String, format = DateTime)]
    pub started_at: DateTimeType,
    #[schema(value_type = String, format = DateTime)]
    pub finished_at: DateTimeType,
}

impl From<SyncLog> for SyncLogWrapper {
    fn from(item: SyncLog) -> Self {
        Self {
            id: item.id,
            ws_id: item.ws_id,
            user_id: item.user_id,
            calendar_id: item.calendar_id,
            sync_type: item.sync_type,
            status: item.status,
            events_inserted: item.events_inserted,
            events_updated: item.events_updated,
            events_deleted: item.events_deleted,
            metrics: item.metrics,
            error_message: item.error_message,
            started_at: item.started_at.into(),
            finished_at: item.finished_at.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEventWrapper {
    pub id: Uuid,
    pub ws_id: Uuid,
    pub google_event_id: Option<StackString>,
    pub google_calendar_id: Option<StackString>,
    pub title: StackString,
    pub description: StackString,
    #[schema(value_type = String, format = DateTime)]
    pub start_at: DateTimeType,
    #[schema(value_type = String, format = DateTime)]
    pub end_at: DateTimeType,
    pub location: Option<StackString>,
    pub color: Option<StackString>,
    pub locked: bool,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: DateTimeType,
}

impl From<WorkspaceCalendarEvent> for CalendarEventWrapper {
    fn from(item: WorkspaceCalendarEvent) -> Self {
        Self {
            id: item.id,
            ws_id: item.ws_id,
            google_event_id: item.google_event_id,
            google_calendar_id: item.google_calendar_id,
            title: item.title,
            description: item.description,
            start_at: item.start_at.into(),
            end_at: item.end_at.into(),
            location: item.location,
            color: item.color,
            locked: item.locked,
            created_at: item.created_at.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SyncLogsQuery {
    /// Maximum number of runs returned (1-100, default 20)
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EventsQuery {
    /// Earliest time (defaults to the configured sync window)
    #[param(value_type = Option<String>, format = DateTime)]
    pub start: Option<DateTimeType>,
    /// Latest time
    #[param(value_type = Option<String>, format = DateTime)]
    pub end: Option<DateTimeType>,
}

#[cfg(test)]
mod tests {
    use anyhow::Error;
    use serde_json::json;
    use stack_string::StackString;
    use time::macros::datetime;

    use calendar_sync_lib::models::SyncToken;

    use crate::{SyncRequestBody, SyncTokenStatus};

    #[test]
    fn test_sync_request_body() -> Result<(), Error> {
        let body: SyncRequestBody = serde_json::from_value(json!({
            "userId": "67e55044-10b1-426f-9247-bb680e5fe0c8",
            "startDate": "2024-01-01T00:00:00Z",
            "endDate": "2024-02-01T00:00:00.000Z"
        }))?;
        assert!(body.user_id.is_some());
        assert_eq!(body.calendar_id, None);
        assert_eq!(
            body.start_date.map(Into::into),
            Some(datetime!(2024-01-01 00:00:00 UTC))
        );
        assert_eq!(
            body.end_date.map(Into::into),
            Some(datetime!(2024-02-01 00:00:00 UTC))
        );
        Ok(())
    }

    #[test]
    fn test_sync_token_status() -> Result<(), Error> {
        let status = SyncTokenStatus::new("ws", None);
        assert_eq!(
            serde_json::to_value(&status)?,
            json!({"wsId": "ws", "hasToken": false, "syncToken": null, "updatedAt": null})
        );
        let token = SyncToken {
            ws_id: uuid::Uuid::nil(),
            token: "abc".into(),
            updated_at: datetime!(2024-01-01 12:00:00 UTC),
        };
        let status = SyncTokenStatus::new("ws", Some(token));
        assert!(status.has_token);
        assert_eq!(status.sync_token.as_ref().map(StackString::as_str), Some("abc"));
        assert_eq!(
            serde_json::to_value(&status)?["updatedAt"],
            json!("2024-01-01T12:00:00+00:00")
        );
        Ok(())
    }
}
