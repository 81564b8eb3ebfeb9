use anyhow::Error;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stack_string::StackString;
use time::OffsetDateTime;
use tokio_postgres::Row;
use uuid::Uuid;

use crate::pgpool::PgPool;

/// Continuation token for incremental listing, one per workspace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncToken {
    pub ws_id: Uuid,
    pub token: StackString,
    pub updated_at: OffsetDateTime,
}

impl SyncToken {
    fn from_row(row: &Row) -> Result<Self, tokio_postgres::Error> {
        Ok(Self {
            ws_id: row.try_get("ws_id")?,
            token: row.try_get("sync_token")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    /// # Errors
    /// Return error if db query fails
    pub async fn get_by_ws_id(ws_id: Uuid, pool: &PgPool) -> Result<Option<Self>, Error> {
        let conn = pool.get().await?;
        let row = conn
            .query_opt(
                "SELECT ws_id, sync_token, updated_at FROM calendar_sync_tokens WHERE ws_id = $1",
                &[&ws_id],
            )
            .await?;
        row.as_ref().map(Self::from_row).transpose().map_err(Into::into)
    }

    /// Returns the number of rows removed.
    /// # Errors
    /// Return error if db query fails
    pub async fn clear(ws_id: Uuid, pool: &PgPool) -> Result<u64, Error> {
        let conn = pool.get().await?;
        conn.execute("DELETE FROM calendar_sync_tokens WHERE ws_id = $1", &[&ws_id])
            .await
            .map_err(Into::into)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CalendarAuthToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub ws_id: Uuid,
    pub access_token: StackString,
    pub refresh_token: Option<StackString>,
    pub created_at: OffsetDateTime,
}

impl CalendarAuthToken {
    /// # Errors
    /// Return error if db query fails
    pub async fn get_by_user_ws(
        user_id: Uuid,
        ws_id: Uuid,
        pool: &PgPool,
    ) -> Result<Option<Self>, Error> {
        let query = r"
            SELECT id, user_id, ws_id, access_token, refresh_token, created_at
            FROM calendar_auth_tokens
            WHERE user_id = $1 AND ws_id = $2
        ";
        let conn = pool.get().await?;
        let row = conn.query_opt(query, &[&user_id, &ws_id]).await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            ws_id: row.try_get("ws_id")?,
            access_token: row
                .try_get::<_, Option<StackString>>("access_token")?
                .unwrap_or_default(),
            refresh_token: row.try_get("refresh_token")?,
            created_at: row.try_get("created_at")?,
        }))
    }

    #[must_use]
    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token
            .as_ref()
            .is_some_and(|t| !t.trim().is_empty())
    }
}

/// Stored copy of a calendar event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceCalendarEvent {
    pub id: Uuid,
    pub ws_id: Uuid,
    pub google_event_id: Option<StackString>,
    pub google_calendar_id: Option<StackString>,
    pub title: StackString,
    pub description: StackString,
    pub start_at: OffsetDateTime,
    pub end_at: OffsetDateTime,
    pub location: Option<StackString>,
    pub color: Option<StackString>,
    pub locked: bool,
    pub created_at: OffsetDateTime,
}

impl WorkspaceCalendarEvent {
    fn from_row(row: &Row) -> Result<Self, tokio_postgres::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            ws_id: row.try_get("ws_id")?,
            google_event_id: row.try_get("google_event_id")?,
            google_calendar_id: row.try_get("google_calendar_id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            start_at: row.try_get("start_at")?,
            end_at: row.try_get("end_at")?,
            location: row.try_get("location")?,
            color: row.try_get("color")?,
            locked: row.try_get("locked")?,
            created_at: row.try_get("created_at")?,
        })
    }

    /// Events overlapping `[start, end)`, ordered by start.
    /// # Errors
    /// Return error if db query fails
    pub async fn get_by_ws_id_range(
        ws_id: Uuid,
        start: OffsetDateTime,
        end: OffsetDateTime,
        pool: &PgPool,
    ) -> Result<Vec<Self>, Error> {
        let query = r"
            SELECT id, ws_id, google_event_id, google_calendar_id, title, description,
                   start_at, end_at, location, color, locked, created_at
            FROM workspace_calendar_events
            WHERE ws_id = $1 AND start_at < $3 AND end_at > $2
            ORDER BY start_at, google_event_id
        ";
        let conn = pool.get().await?;
        conn.query(query, &[&ws_id, &start, &end])
            .await?
            .iter()
            .map(|row| Self::from_row(row).map_err(Into::into))
            .collect()
    }
}

/// Row shape produced by the formatter and written by the upsert.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertWorkspaceCalendarEvent {
    pub ws_id: Uuid,
    pub google_event_id: StackString,
    pub google_calendar_id: StackString,
    pub title: StackString,
    pub description: StackString,
    pub start_at: OffsetDateTime,
    pub end_at: OffsetDateTime,
    pub location: Option<StackString>,
    pub color: Option<StackString>,
}

/// Record of one sync run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SyncLog {
    pub id: Uuid,
    pub ws_id: Uuid,
    pub user_id: Uuid,
    pub calendar_id: StackString,
    pub sync_type: StackString,
    pub status: StackString,
    pub events_inserted: i32,
    pub events_updated: i32,
    pub events_deleted: i32,
    pub metrics: Value,
    pub error_message: Option<StackString>,
    pub started_at: OffsetDateTime,
    pub finished_at: OffsetDateTime,
}

impl SyncLog {
    fn from_row(row: &Row) -> Result<Self, tokio_postgres::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            ws_id: row.try_get("ws_id")?,
            user_id: row.try_get("user_id")?,
            calendar_id: row.try_get("calendar_id")?,
            sync_type: row.try_get("sync_type")?,
            status: row.try_get("status")?,
            events_inserted: row.try_get("events_inserted")?,
            events_updated: row.try_get("events_updated")?,
            events_deleted: row.try_get("events_deleted")?,
            metrics: row.try_get("metrics")?,
            error_message: row.try_get("error_message")?,
            started_at: row.try_get("started_at")?,
            finished_at: row.try_get("finished_at")?,
        })
    }

    /// # Errors
    /// Return error if db query fails
    pub async fn insert(&self, pool: &PgPool) -> Result<(), Error> {
        let query = r"
            INSERT INTO calendar_sync_logs (
                id, ws_id, user_id, calendar_id, sync_type, status,
                events_inserted, events_updated, events_deleted, metrics,
                error_message, started_at, finished_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        ";
        let conn = pool.get().await?;
        conn.execute(
            query,
            &[
                &self.id,
                &self.ws_id,
                &self.user_id,
                &self.calendar_id,
                &self.sync_type,
                &self.status,
                &self.events_inserted,
                &self.events_updated,
                &self.events_deleted,
                &self.metrics,
                &self.error_message,
                &self.started_at,
                &self.finished_at,
            ],
        )
        .await?;
        Ok(())
    }

    /// Most recent runs first.
    /// # Errors
    /// Return error if db query fails
    pub async fn get_recent(ws_id: Uuid, limit: i64, pool: &PgPool) -> Result<Vec<Self>, Error> {
        let query = r"
            SELECT id, ws_id, user_id, calendar_id, sync_type, status,
                   events_inserted, events_updated, events_deleted, metrics,
                   error_message, started_at, finished_at
            FROM calendar_sync_logs
            WHERE ws_id = $1
            ORDER BY started_at DESC
            LIMIT $2
        ";
        let conn = pool.get().await?;
        conn.query(query, &[&ws_id, &limit])
            .await?
            .iter()
            .map(|row| Self::from_row(row).map_err(Into::into))
            .collect()
    }
}
