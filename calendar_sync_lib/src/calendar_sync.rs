use log::{debug, error, info, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stack_string::{StackString, format_sstr};
use std::{collections::HashSet, time::Instant};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use gcal_lib::{
    errors::GCalError,
    gcal_event::Event,
    gcal_instance::{CalendarEventSource, ListMode},
};

use crate::{
    calendar::format_event_for_db,
    config::Config,
    errors::{AuthFailure, SyncError},
    event_filter::{ClassifiedEvents, filter_events_by_status},
    gcal_connector::{CalendarConnector, GCalConnector},
    models::{CalendarAuthToken, SyncLog, SyncToken, WorkspaceCalendarEvent},
    pgpool::PgPool,
    sync_metrics::{SyncMetrics, elapsed_ms},
    sync_store::{SyncCommit, SyncStore},
    timezone::TimeZone,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    pub ws_id: StackString,
    pub user_id: Uuid,
    pub calendar_id: Option<StackString>,
    /// Window listed when no usable sync token exists.
    pub start_date: OffsetDateTime,
    pub end_date: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub events_inserted: usize,
    pub events_updated: usize,
    pub events_deleted: usize,
    pub metrics: SyncMetrics,
}

#[derive(Clone)]
pub struct CalendarSync<S, C> {
    pub config: Config,
    pub store: S,
    pub connector: C,
}

pub type PgCalendarSync = CalendarSync<PgPool, GCalConnector>;

impl CalendarSync<PgPool, GCalConnector> {
    #[must_use]
    pub fn new(config: Config, pool: PgPool) -> Self {
        let connector = GCalConnector::new(Client::new(), &config.gcal_api_base_url);
        Self {
            config,
            store: pool,
            connector,
        }
    }
}

impl<C> CalendarSync<PgPool, C> {
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.store
    }

    /// # Errors
    /// Returns error if `ws_id` is invalid or the db query fails
    pub async fn get_sync_token(&self, ws_id: &str) -> Result<Option<SyncToken>, SyncError> {
        let ws_id = parse_ws_id(ws_id, Uuid::nil())?;
        SyncToken::get_by_ws_id(ws_id, &self.store)
            .await
            .map_err(Into::into)
    }

    /// Forget the stored token so the next run lists the fallback window.
    /// Returns whether a token was removed.
    /// # Errors
    /// Returns error if `ws_id` is invalid or the db query fails
    pub async fn clear_sync_token(&self, ws_id: &str) -> Result<bool, SyncError> {
        let ws_id = parse_ws_id(ws_id, Uuid::nil())?;
        let removed = SyncToken::clear(ws_id, &self.store).await?;
        info!("cleared sync token for {ws_id}: {removed}");
        Ok(removed > 0)
    }

    /// # Errors
    /// Returns error if `ws_id` is invalid or the db query fails
    pub async fn list_events(
        &self,
        ws_id: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<WorkspaceCalendarEvent>, SyncError> {
        let ws_id = parse_ws_id(ws_id, Uuid::nil())?;
        WorkspaceCalendarEvent::get_by_ws_id_range(ws_id, start, end, &self.store)
            .await
            .map_err(Into::into)
    }

    /// # Errors
    /// Returns error if `ws_id` is invalid or the db query fails
    pub async fn get_sync_logs(&self, ws_id: &str, limit: i64) -> Result<Vec<SyncLog>, SyncError> {
        let ws_id = parse_ws_id(ws_id, Uuid::nil())?;
        SyncLog::get_recent(ws_id, limit, &self.store)
            .await
            .map_err(Into::into)
    }
}

fn parse_ws_id(ws_id: &str, user_id: Uuid) -> Result<Uuid, SyncError> {
    let ws_id = ws_id.trim();
    if ws_id.is_empty() {
        return Err(SyncError::MissingWorkspace { user_id });
    }
    Uuid::parse_str(ws_id).map_err(|_| SyncError::InvalidWorkspace {
        ws_id: ws_id.into(),
        user_id,
    })
}

/// Keep only the last occurrence of each event id, in order of last
/// appearance. Events without an id pass through.
fn latest_by_id(events: Vec<Event>) -> Vec<Event> {
    let mut seen = HashSet::new();
    let mut latest: Vec<_> = events
        .into_iter()
        .rev()
        .filter(|e| e.id.as_ref().is_none_or(|id| seen.insert(id.clone())))
        .collect();
    latest.reverse();
    latest
}

struct FetchedEvents {
    items: Vec<Event>,
    next_sync_token: Option<StackString>,
}

impl<S, C> CalendarSync<S, C>
where
    S: SyncStore,
    C: CalendarConnector,
{
    pub fn with_parts(config: Config, store: S, connector: C) -> Self {
        Self {
            config,
            store,
            connector,
        }
    }

    fn default_time_zone(&self) -> Option<TimeZone> {
        self.config.default_time_zone
    }

    /// Fallback window around today: `sync_days_before` days back to
    /// `sync_days_after` days ahead, at local midnight.
    #[must_use]
    pub fn default_sync_window(&self) -> (OffsetDateTime, OffsetDateTime) {
        let tz = self.default_time_zone().unwrap_or_else(TimeZone::utc);
        let today = OffsetDateTime::now_utc().date();
        let midnight = tz.local_midnight(today);
        (
            midnight - Duration::days(self.config.sync_days_before),
            midnight + Duration::days(self.config.sync_days_after),
        )
    }

    /// Sync one calendar of a workspace and record the run in the sync log.
    /// # Errors
    /// Returns error if validation, authentication, the calendar API or the
    /// commit fails
    pub async fn perform_incremental_sync(
        &self,
        request: &SyncRequest,
    ) -> Result<SyncOutcome, SyncError> {
        let started_at = OffsetDateTime::now_utc();
        let start = Instant::now();

        let ws_id = parse_ws_id(&request.ws_id, request.user_id).inspect_err(|e| {
            error!("rejecting sync for user {}: {e}", request.user_id);
        })?;
        let calendar_id = request
            .calendar_id
            .clone()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| self.config.default_calendar_id.clone());

        let mut metrics = SyncMetrics::default();
        let result = self
            .sync_workspace(ws_id, request, &calendar_id, &mut metrics)
            .await;
        metrics.total_ms = elapsed_ms(start);

        let outcome = result.map(|mut outcome| {
            outcome.metrics = metrics;
            outcome
        });
        self.record_sync_log(
            ws_id,
            request.user_id,
            &calendar_id,
            &outcome,
            metrics,
            started_at,
        )
        .await;
        outcome
    }

    async fn sync_workspace(
        &self,
        ws_id: Uuid,
        request: &SyncRequest,
        calendar_id: &str,
        metrics: &mut SyncMetrics,
    ) -> Result<SyncOutcome, SyncError> {
        let token_start = Instant::now();
        let auth = self.authenticate(request.user_id, ws_id).await?;
        metrics.token_operations_ms += elapsed_ms(token_start);

        let source = self.connector.connect(&auth)?;
        self.run_sync(
            &source,
            ws_id,
            calendar_id,
            request.start_date,
            request.end_date,
            metrics,
        )
        .await
        .map_err(|e| match e {
            SyncError::GCal(GCalError::Unauthorized(message)) => {
                warn!("google rejected access token for {ws_id}: {message}");
                SyncError::NotAuthenticated {
                    user_id: request.user_id,
                    reason: AuthFailure::Rejected,
                    has_refresh_token: auth.has_refresh_token(),
                }
            }
            e => e,
        })
    }

    /// Look up the access token the user stored for this workspace.
    /// # Errors
    /// Returns `NotAuthenticated` if there is no usable token, or the lookup
    /// error
    pub async fn authenticate(
        &self,
        user_id: Uuid,
        ws_id: Uuid,
    ) -> Result<CalendarAuthToken, SyncError> {
        let auth = self
            .store
            .get_auth_token(user_id, ws_id)
            .await
            .inspect_err(|e| error!("auth token lookup failed for {user_id}: {e}"))?;
        let Some(auth) = auth else {
            error!("no calendar tokens for user {user_id} in {ws_id}");
            return Err(SyncError::NotAuthenticated {
                user_id,
                reason: AuthFailure::NoTokenRow,
                has_refresh_token: false,
            });
        };
        if auth.access_token.trim().is_empty() {
            error!("empty access token for user {user_id} in {ws_id}");
            return Err(SyncError::NotAuthenticated {
                user_id,
                reason: AuthFailure::EmptyAccessToken,
                has_refresh_token: auth.has_refresh_token(),
            });
        }
        Ok(auth)
    }

    /// Fetch changes from `source`, then classify, format and commit them.
    /// Uses the stored sync token when there is one, otherwise lists
    /// `[start_date, end_date)`.
    /// # Errors
    /// Returns error if the calendar API or the store fails
    pub async fn run_sync(
        &self,
        source: &impl CalendarEventSource,
        ws_id: Uuid,
        calendar_id: &str,
        start_date: OffsetDateTime,
        end_date: OffsetDateTime,
        metrics: &mut SyncMetrics,
    ) -> Result<SyncOutcome, SyncError> {
        let token_start = Instant::now();
        let stored = self.store.get_sync_token(ws_id).await?;
        metrics.token_operations_ms += elapsed_ms(token_start);
        metrics.sync_token_used = stored.is_some();

        let mut expected_token_updated_at = stored.as_ref().map(|t| t.updated_at);
        let date_range = ListMode::DateRange {
            time_min: start_date,
            time_max: end_date,
        };
        let mode = stored.map_or_else(|| date_range.clone(), |t| ListMode::Incremental(t.token));

        let fetched = self
            .fetch_events(
                source,
                ws_id,
                calendar_id,
                mode,
                date_range,
                &mut expected_token_updated_at,
                metrics,
            )
            .await?;

        let process_start = Instant::now();
        metrics.events_fetched_total = fetched.items.len() as u64;
        let ClassifiedEvents {
            events_to_upsert,
            events_to_delete,
        } = filter_events_by_status(latest_by_id(fetched.items));
        let delete_ids: Vec<StackString> =
            events_to_delete.into_iter().filter_map(|e| e.id).collect();
        let tz = self.default_time_zone();
        let upserts: Vec<_> = events_to_upsert
            .iter()
            .filter_map(|e| format_event_for_db(e, ws_id, calendar_id, tz))
            .collect();
        metrics.events_filtered_out = metrics
            .events_fetched_total
            .saturating_sub((upserts.len() + delete_ids.len()) as u64);
        metrics.event_processing_ms += elapsed_ms(process_start);
        debug!(
            "{ws_id}/{calendar_id}: {} to upsert, {} to delete, {} filtered out",
            upserts.len(),
            delete_ids.len(),
            metrics.events_filtered_out
        );

        let db_start = Instant::now();
        let commit = SyncCommit {
            ws_id,
            delete_ids,
            upserts,
            next_sync_token: fetched.next_sync_token,
            expected_token_updated_at,
        };
        let outcome = self
            .store
            .commit_sync(&commit)
            .await
            .inspect_err(|e| error!("commit failed for {ws_id}: {e}"))?;
        metrics.database_writes_ms += elapsed_ms(db_start);
        metrics.batch_count = outcome.batch_count as u64;

        Ok(SyncOutcome {
            events_inserted: outcome.inserted,
            events_updated: outcome.updated,
            events_deleted: outcome.deleted,
            metrics: *metrics,
        })
    }

    /// Page through `events.list`. A 410 on an incremental listing clears the
    /// stored token and retries the same page over `date_range`.
    #[allow(clippy::too_many_arguments)]
    async fn fetch_events(
        &self,
        source: &impl CalendarEventSource,
        ws_id: Uuid,
        calendar_id: &str,
        mut mode: ListMode,
        date_range: ListMode,
        expected_token_updated_at: &mut Option<OffsetDateTime>,
        metrics: &mut SyncMetrics,
    ) -> Result<FetchedEvents, SyncError> {
        let mut items = Vec::new();
        let mut page_token: Option<StackString> = None;
        let mut next_sync_token = None;

        loop {
            let fetch_start = Instant::now();
            metrics.api_calls_count += 1;
            let result = source
                .list_events(calendar_id, &mode, page_token.as_ref().map(StackString::as_str))
                .await;
            metrics.google_api_fetch_ms += elapsed_ms(fetch_start);

            let page = match result {
                Ok(page) => page,
                Err(GCalError::SyncTokenExpired(message)) if mode.is_incremental() => {
                    warn!("sync token expired for {ws_id}, falling back to date range: {message}");
                    metrics.retry_count += 1;
                    metrics.sync_token_used = false;
                    let token_start = Instant::now();
                    match self.store.clear_sync_token(ws_id).await {
                        Ok(()) => *expected_token_updated_at = None,
                        Err(e) => error!("failed to clear expired sync token for {ws_id}: {e}"),
                    }
                    metrics.token_operations_ms += elapsed_ms(token_start);
                    mode = date_range.clone();
                    continue;
                }
                Err(e) => {
                    error!("events.list failed for {ws_id}/{calendar_id}: {e}");
                    return Err(e.into());
                }
            };

            metrics.pages_fetched += 1;
            debug!(
                "{ws_id}/{calendar_id} page {}: {} events",
                metrics.pages_fetched,
                page.items.len()
            );
            items.extend(page.items);
            if page.next_sync_token.is_some() {
                next_sync_token = page.next_sync_token;
            }
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(FetchedEvents {
            items,
            next_sync_token,
        })
    }

    async fn record_sync_log(
        &self,
        ws_id: Uuid,
        user_id: Uuid,
        calendar_id: &str,
        outcome: &Result<SyncOutcome, SyncError>,
        metrics: SyncMetrics,
        started_at: OffsetDateTime,
    ) {
        let sync_type = if metrics.sync_token_used {
            "incremental"
        } else {
            "full"
        };
        let counts = outcome.as_ref().map_or_else(|_| SyncOutcome::default(), |o| *o);
        let log = SyncLog {
            id: Uuid::new_v4(),
            ws_id,
            user_id,
            calendar_id: calendar_id.into(),
            sync_type: sync_type.into(),
            status: if outcome.is_ok() { "success" } else { "failed" }.into(),
            events_inserted: i32::try_from(counts.events_inserted).unwrap_or(i32::MAX),
            events_updated: i32::try_from(counts.events_updated).unwrap_or(i32::MAX),
            events_deleted: i32::try_from(counts.events_deleted).unwrap_or(i32::MAX),
            metrics: serde_json::to_value(metrics).unwrap_or(Value::Null),
            error_message: outcome.as_ref().err().map(|e| format_sstr!("{e}")),
            started_at,
            finished_at: OffsetDateTime::now_utc(),
        };
        if let Err(e) = self.store.insert_sync_log(&log).await {
            warn!("failed to record sync log for {ws_id}: {e}");
        }
    }
}
