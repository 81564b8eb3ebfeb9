use anyhow::Error;
use async_trait::async_trait;
use log::{debug, info};
use stack_string::StackString;
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    errors::SyncError,
    models::{CalendarAuthToken, InsertWorkspaceCalendarEvent, SyncLog, SyncToken},
    pgpool::{PgPool, PgTransaction},
};

pub const UPSERT_BATCH_SIZE: usize = 500;

/// Everything one run writes, applied atomically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncCommit {
    pub ws_id: Uuid,
    pub delete_ids: Vec<StackString>,
    pub upserts: Vec<InsertWorkspaceCalendarEvent>,
    pub next_sync_token: Option<StackString>,
    /// `updated_at` of the token row as observed when the run started,
    /// `None` if there was no row. The commit is rejected if it moved.
    pub expected_token_updated_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitOutcome {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    pub batch_count: usize,
}

#[async_trait]
pub trait SyncStore: Send + Sync {
    async fn get_auth_token(
        &self,
        user_id: Uuid,
        ws_id: Uuid,
    ) -> Result<Option<CalendarAuthToken>, SyncError>;

    async fn get_sync_token(&self, ws_id: Uuid) -> Result<Option<SyncToken>, SyncError>;

    async fn clear_sync_token(&self, ws_id: Uuid) -> Result<(), SyncError>;

    async fn commit_sync(&self, commit: &SyncCommit) -> Result<CommitOutcome, SyncError>;

    async fn insert_sync_log(&self, log: &SyncLog) -> Result<(), SyncError>;
}

#[async_trait]
impl<T> SyncStore for Arc<T>
where
    T: SyncStore + ?Sized,
{
    async fn get_auth_token(
        &self,
        user_id: Uuid,
        ws_id: Uuid,
    ) -> Result<Option<CalendarAuthToken>, SyncError> {
        (**self).get_auth_token(user_id, ws_id).await
    }

    async fn get_sync_token(&self, ws_id: Uuid) -> Result<Option<SyncToken>, SyncError> {
        (**self).get_sync_token(ws_id).await
    }

    async fn clear_sync_token(&self, ws_id: Uuid) -> Result<(), SyncError> {
        (**self).clear_sync_token(ws_id).await
    }

    async fn commit_sync(&self, commit: &SyncCommit) -> Result<CommitOutcome, SyncError> {
        (**self).commit_sync(commit).await
    }

    async fn insert_sync_log(&self, log: &SyncLog) -> Result<(), SyncError> {
        (**self).insert_sync_log(log).await
    }
}

fn database_error(e: &Error) -> SyncError {
    match e.downcast_ref::<tokio_postgres::Error>() {
        Some(e) => SyncError::database(e),
        None => SyncError::Database(StackString::from_display(e)),
    }
}

async fn lock_workspace(tran: &PgTransaction<'_>, ws_id: Uuid) -> Result<(), SyncError> {
    tran.execute(
        "SELECT pg_advisory_xact_lock(hashtext($1::uuid::text))",
        &[&ws_id],
    )
    .await?;
    Ok(())
}

async fn check_token_unchanged(
    tran: &PgTransaction<'_>,
    ws_id: Uuid,
    expected: Option<OffsetDateTime>,
) -> Result<(), SyncError> {
    let current: Option<OffsetDateTime> = tran
        .query_opt(
            "SELECT updated_at FROM calendar_sync_tokens WHERE ws_id = $1 FOR UPDATE",
            &[&ws_id],
        )
        .await?
        .map(|row| row.try_get("updated_at"))
        .transpose()?;
    if current == expected {
        Ok(())
    } else {
        info!("sync token for {ws_id} moved from {expected:?} to {current:?}");
        Err(SyncError::ConcurrentSync(ws_id))
    }
}

async fn delete_events(
    tran: &PgTransaction<'_>,
    ws_id: Uuid,
    google_event_ids: &[StackString],
) -> Result<u64, SyncError> {
    if google_event_ids.is_empty() {
        return Ok(0);
    }
    let query = r"
        DELETE FROM workspace_calendar_events
        WHERE ws_id = $1 AND google_event_id = ANY($2)
    ";
    tran.execute(query, &[&ws_id, &google_event_ids])
        .await
        .map_err(Into::into)
}

/// Upsert one batch. Returns `(inserted, updated)`; rows whose stored values
/// already match are left alone and counted as neither.
async fn upsert_events(
    tran: &PgTransaction<'_>,
    ws_id: Uuid,
    events: &[InsertWorkspaceCalendarEvent],
) -> Result<(usize, usize), SyncError> {
    let query = r"
        INSERT INTO workspace_calendar_events (
            ws_id, google_event_id, google_calendar_id, title, description,
            start_at, end_at, location, color
        )
        SELECT $1::uuid, e.*
        FROM unnest(
            $2::text[], $3::text[], $4::text[], $5::text[],
            $6::timestamptz[], $7::timestamptz[], $8::text[], $9::text[]
        ) AS e
        ON CONFLICT (ws_id, google_event_id) DO UPDATE SET
            google_calendar_id = EXCLUDED.google_calendar_id,
            title = EXCLUDED.title,
            description = EXCLUDED.description,
            start_at = EXCLUDED.start_at,
            end_at = EXCLUDED.end_at,
            location = EXCLUDED.location,
            color = EXCLUDED.color
        WHERE (
            workspace_calendar_events.google_calendar_id,
            workspace_calendar_events.title,
            workspace_calendar_events.description,
            workspace_calendar_events.start_at,
            workspace_calendar_events.end_at,
            workspace_calendar_events.location,
            workspace_calendar_events.color
        ) IS DISTINCT FROM (
            EXCLUDED.google_calendar_id,
            EXCLUDED.title,
            EXCLUDED.description,
            EXCLUDED.start_at,
            EXCLUDED.end_at,
            EXCLUDED.location,
            EXCLUDED.color
        )
        RETURNING (xmax = 0) AS inserted
    ";
    let google_event_ids: Vec<_> = events.iter().map(|e| &e.google_event_id).collect();
    let calendar_ids: Vec<_> = events.iter().map(|e| &e.google_calendar_id).collect();
    let titles: Vec<_> = events.iter().map(|e| &e.title).collect();
    let descriptions: Vec<_> = events.iter().map(|e| &e.description).collect();
    let starts: Vec<_> = events.iter().map(|e| e.start_at).collect();
    let ends: Vec<_> = events.iter().map(|e| e.end_at).collect();
    let locations: Vec<_> = events.iter().map(|e| e.location.as_ref()).collect();
    let colors: Vec<_> = events.iter().map(|e| e.color.as_ref()).collect();

    let rows = tran
        .query(
            query,
            &[
                &ws_id,
                &google_event_ids,
                &calendar_ids,
                &titles,
                &descriptions,
                &starts,
                &ends,
                &locations,
                &colors,
            ],
        )
        .await?;
    let mut inserted = 0;
    for row in &rows {
        if row.try_get::<_, bool>("inserted")? {
            inserted += 1;
        }
    }
    Ok((inserted, rows.len() - inserted))
}

async fn write_sync_token(
    tran: &PgTransaction<'_>,
    ws_id: Uuid,
    token: &StackString,
) -> Result<(), SyncError> {
    let query = r"
        INSERT INTO calendar_sync_tokens (ws_id, sync_token, updated_at)
        VALUES ($1, $2, clock_timestamp())
        ON CONFLICT (ws_id) DO UPDATE SET
            sync_token = EXCLUDED.sync_token,
            updated_at = EXCLUDED.updated_at
    ";
    tran.execute(query, &[&ws_id, token]).await?;
    Ok(())
}

#[async_trait]
impl SyncStore for PgPool {
    async fn get_auth_token(
        &self,
        user_id: Uuid,
        ws_id: Uuid,
    ) -> Result<Option<CalendarAuthToken>, SyncError> {
        CalendarAuthToken::get_by_user_ws(user_id, ws_id, self)
            .await
            .map_err(|e| {
                let db = e.downcast_ref::<tokio_postgres::Error>();
                SyncError::TokenLookup {
                    user_id,
                    message: db
                        .and_then(tokio_postgres::Error::as_db_error)
                        .map_or_else(
                            || StackString::from_display(&e),
                            |db| db.message().into(),
                        ),
                    code: db
                        .and_then(tokio_postgres::Error::code)
                        .map(|c| c.code().into()),
                }
            })
    }

    async fn get_sync_token(&self, ws_id: Uuid) -> Result<Option<SyncToken>, SyncError> {
        SyncToken::get_by_ws_id(ws_id, self)
            .await
            .map_err(|e| database_error(&e))
    }

    async fn clear_sync_token(&self, ws_id: Uuid) -> Result<(), SyncError> {
        let removed = SyncToken::clear(ws_id, self)
            .await
            .map_err(|e| database_error(&e))?;
        debug!("cleared {removed} sync token(s) for {ws_id}");
        Ok(())
    }

    async fn commit_sync(&self, commit: &SyncCommit) -> Result<CommitOutcome, SyncError> {
        let ws_id = commit.ws_id;
        let mut conn = self.get().await.map_err(|e| database_error(&e))?;
        let tran = conn.transaction().await?;

        lock_workspace(&tran, ws_id).await?;
        check_token_unchanged(&tran, ws_id, commit.expected_token_updated_at).await?;

        let removed = delete_events(&tran, ws_id, &commit.delete_ids).await?;
        debug!(
            "removed {removed} of {} cancelled events for {ws_id}",
            commit.delete_ids.len()
        );

        let mut outcome = CommitOutcome {
            deleted: commit.delete_ids.len(),
            ..CommitOutcome::default()
        };
        for batch in commit.upserts.chunks(UPSERT_BATCH_SIZE) {
            let (inserted, updated) = upsert_events(&tran, ws_id, batch).await?;
            outcome.inserted += inserted;
            outcome.updated += updated;
            outcome.batch_count += 1;
        }

        if let Some(token) = &commit.next_sync_token {
            write_sync_token(&tran, ws_id, token).await?;
        }
        tran.commit().await?;

        info!(
            "committed sync for {ws_id}: inserted {} updated {} deleted {} in {} batches",
            outcome.inserted, outcome.updated, outcome.deleted, outcome.batch_count
        );
        Ok(outcome)
    }

    async fn insert_sync_log(&self, log: &SyncLog) -> Result<(), SyncError> {
        log.insert(self).await.map_err(|e| database_error(&e))
    }
}
