use axum::extract::{Json, Path, Query, State};
use log::info;
use stack_string::StackString;
use utoipa::OpenApi;
use utoipa_axum::{router::OpenApiRouter, routes};

use calendar_sync_lib::calendar_sync::SyncRequest;

use crate::{
    CalendarEventWrapper, ClearTokenResponse, EventsQuery, SyncLogWrapper, SyncLogsQuery,
    SyncOutcomeWrapper, SyncRequestBody, SyncTokenStatus, app::AppState,
    errors::ServiceError as Error,
};

pub type HttpResult<T> = Result<T, Error>;

const DEFAULT_LOG_LIMIT: i64 = 20;
const MAX_LOG_LIMIT: i64 = 100;

#[utoipa::path(
    post,
    path = "/api/v1/workspaces/{ws_id}/calendar/sync",
    params(("ws_id" = String, Path, description = "Workspace Id")),
    request_body = SyncRequestBody,
    responses(
        (status = OK, description = "Sync Outcome", body = SyncOutcomeWrapper),
        Error,
    )
)]
/// Incrementally sync a workspace calendar with Google
async fn sync_calendar(
    State(data): State<AppState>,
    Path(ws_id): Path<StackString>,
    Json(payload): Json<SyncRequestBody>,
) -> HttpResult<Json<SyncOutcomeWrapper>> {
    let Some(user_id) = payload.user_id else {
        return Err(Error::Unauthorized("User not authenticated".into()));
    };
    let (Some(start_date), Some(end_date)) = (payload.start_date, payload.end_date) else {
        return Err(Error::BadRequest(
            "startDate and endDate are required".into(),
        ));
    };
    if end_date <= start_date {
        return Err(Error::BadRequest("startDate must be before endDate".into()));
    }
    let request = SyncRequest {
        ws_id,
        user_id,
        calendar_id: payload.calendar_id,
        start_date: start_date.into(),
        end_date: end_date.into(),
    };
    info!("sync requested for {} by {user_id}", request.ws_id);
    let outcome = data.cal_sync.perform_incremental_sync(&request).await?;
    Ok(Json(outcome.into()))
}

#[utoipa::path(
    get,
    path = "/api/v1/workspaces/{ws_id}/calendar/sync-token",
    params(("ws_id" = String, Path, description = "Workspace Id")),
    responses(
        (status = OK, description = "Sync Token Status", body = SyncTokenStatus),
        Error,
    )
)]
/// Show whether an incremental sync token is stored
async fn get_sync_token(
    State(data): State<AppState>,
    Path(ws_id): Path<StackString>,
) -> HttpResult<Json<SyncTokenStatus>> {
    let token = data.cal_sync.get_sync_token(&ws_id).await?;
    Ok(Json(SyncTokenStatus::new(&ws_id, token)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/workspaces/{ws_id}/calendar/sync-token",
    params(("ws_id" = String, Path, description = "Workspace Id")),
    responses(
        (status = OK, description = "Sync Token Cleared", body = ClearTokenResponse),
        Error,
    )
)]
/// Drop the stored sync token so the next sync lists the date range
async fn delete_sync_token(
    State(data): State<AppState>,
    Path(ws_id): Path<StackString>,
) -> HttpResult<Json<ClearTokenResponse>> {
    let cleared = data.cal_sync.clear_sync_token(&ws_id).await?;
    Ok(Json(ClearTokenResponse { cleared }))
}

#[utoipa::path(
    get,
    path = "/api/v1/workspaces/{ws_id}/calendar/sync-logs",
    params(("ws_id" = String, Path, description = "Workspace Id"), SyncLogsQuery),
    responses(
        (status = OK, description = "Recent Sync Runs", body = [SyncLogWrapper]),
        Error,
    )
)]
/// List recent sync runs
async fn get_sync_logs(
    State(data): State<AppState>,
    Path(ws_id): Path<StackString>,
    Query(query): Query<SyncLogsQuery>,
) -> HttpResult<Json<Vec<SyncLogWrapper>>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LOG_LIMIT)
        .clamp(1, MAX_LOG_LIMIT);
    let logs = data
        .cal_sync
        .get_sync_logs(&ws_id, limit)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(Json(logs))
}

#[utoipa::path(
    get,
    path = "/api/v1/workspaces/{ws_id}/calendar/events",
    params(("ws_id" = String, Path, description = "Workspace Id"), EventsQuery),
    responses(
        (status = OK, description = "Stored Events", body = [CalendarEventWrapper]),
        Error,
    )
)]
/// List stored events overlapping a time range
async fn list_events(
    State(data): State<AppState>,
    Path(ws_id): Path<StackString>,
    Query(query): Query<EventsQuery>,
) -> HttpResult<Json<Vec<CalendarEventWrapper>>> {
    let (default_start, default_end) = data.cal_sync.default_sync_window();
    let start = query.start.map_or(default_start, Into::into);
    let end = query.end.map_or(default_end, Into::into);
    if end <= start {
        return Err(Error::BadRequest("start must be before end".into()));
    }
    let events = data
        .cal_sync
        .list_events(&ws_id, start, end)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(Json(events))
}

pub fn get_calendar_path(app: &AppState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(sync_calendar))
        .routes(routes!(get_sync_token, delete_sync_token))
        .routes(routes!(get_sync_logs))
        .routes(routes!(list_events))
        .with_state(app.clone())
}

#[derive(OpenApi)]
#[openapi(info(
    title = "Calendar Sync",
    description = "Incremental Google Calendar sync for workspaces",
))]
pub struct ApiDoc;
