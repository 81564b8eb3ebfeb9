use anyhow::Error as AnyhowError;
use derive_more::Display;
use stack_string::StackString;
use thiserror::Error;
use uuid::Uuid;

use gcal_lib::errors::GCalError;

/// Why a user could not be authenticated against the calendar API.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    #[display("No tokens found in database")]
    NoTokenRow,
    #[display("Access token is empty")]
    EmptyAccessToken,
    #[display("Google rejected the access token")]
    Rejected,
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Missing workspace ID")]
    MissingWorkspace { user_id: Uuid },
    #[error("Invalid workspace ID {ws_id}")]
    InvalidWorkspace { ws_id: StackString, user_id: Uuid },
    #[error("Not authenticated: {reason}")]
    NotAuthenticated {
        user_id: Uuid,
        reason: AuthFailure,
        has_refresh_token: bool,
    },
    #[error("Database error: {message}")]
    TokenLookup {
        user_id: Uuid,
        message: StackString,
        code: Option<StackString>,
    },
    #[error("Database error: {0}")]
    Database(StackString),
    #[error("Sync token for workspace {0} changed during sync")]
    ConcurrentSync(Uuid),
    #[error("GCal error {0}")]
    GCal(#[from] GCalError),
    #[error("Anyhow error {0}")]
    Anyhow(#[from] AnyhowError),
}

impl SyncError {
    /// HTTP status the sync endpoint answers with for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::MissingWorkspace { .. } | Self::InvalidWorkspace { .. } => 400,
            Self::NotAuthenticated { .. } => 401,
            Self::ConcurrentSync(_) => 409,
            Self::GCal(GCalError::Unauthorized(_)) => 401,
            _ => 500,
        }
    }

    /// Turn a database error into `Database`, keeping the server message.
    #[must_use]
    pub fn database(e: &tokio_postgres::Error) -> Self {
        let message = e
            .as_db_error()
            .map_or_else(|| e.to_string(), |db| db.message().to_string());
        Self::Database(message.into())
    }
}

impl From<tokio_postgres::Error> for SyncError {
    fn from(e: tokio_postgres::Error) -> Self {
        Self::database(&e)
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use gcal_lib::errors::GCalError;

    use crate::errors::{AuthFailure, SyncError};

    #[test]
    fn test_status_code() {
        let user_id = Uuid::new_v4();
        assert_eq!(SyncError::MissingWorkspace { user_id }.status_code(), 400);
        let e = SyncError::NotAuthenticated {
            user_id,
            reason: AuthFailure::EmptyAccessToken,
            has_refresh_token: true,
        };
        assert_eq!(e.status_code(), 401);
        assert_eq!(e.to_string(), "Not authenticated: Access token is empty");
        assert_eq!(SyncError::ConcurrentSync(Uuid::nil()).status_code(), 409);
        assert_eq!(SyncError::Database("boom".into()).status_code(), 500);
        assert_eq!(
            SyncError::GCal(GCalError::Api {
                status: 403,
                message: "rate limited".into()
            })
            .status_code(),
            500
        );
    }

    #[test]
    fn test_auth_failure_display() {
        assert_eq!(
            AuthFailure::NoTokenRow.to_string(),
            "No tokens found in database"
        );
    }
}
