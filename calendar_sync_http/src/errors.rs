use anyhow::Error as AnyhowError;
use axum::{
    extract::Json,
    http::{StatusCode, header::InvalidHeaderName},
    response::{IntoResponse, Response},
};
use log::error;
use serde::Serialize;
use serde_json::Error as SerdeJsonError;
use stack_string::{StackString, format_sstr};
use std::{fmt::Debug, net::AddrParseError};
use thiserror::Error;
use utoipa::{
    IntoResponses, PartialSchema, ToSchema,
    openapi::{
        content::ContentBuilder,
        response::{ResponseBuilder, ResponsesBuilder},
    },
};
use uuid::Uuid;

use calendar_sync_lib::errors::SyncError;

pub const SYNC_FAILED: &str = "Failed to fetch Google Calendar events";

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("AddrParseError {0}")]
    AddrParseError(#[from] AddrParseError),
    #[error("SerdeJsonError {0}")]
    SerdeJsonError(#[from] SerdeJsonError),
    #[error("InvalidHeaderName {0}")]
    InvalidHeaderName(#[from] InvalidHeaderName),
    #[error("BadRequest: {0}")]
    BadRequest(StackString),
    #[error("Unauthorized: {0}")]
    Unauthorized(StackString),
    #[error("SyncError {0}")]
    SyncError(#[from] SyncError),
    #[error("Anyhow error {0}")]
    AnyhowError(#[from] AnyhowError),
    #[error("io Error {0}")]
    IoError(#[from] std::io::Error),
}

#[derive(Serialize, ToSchema)]
pub struct ErrorMessage {
    error: StackString,
}

impl IntoResponse for ErrorMessage {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

#[derive(Serialize, Default, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncErrorDetails {
    has_access_token: bool,
    has_refresh_token: bool,
    user_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<StackString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    token_error: Option<StackString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<StackString>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncErrorBody {
    error: StackString,
    status_code: u16,
    google_error: StackString,
    details: SyncErrorDetails,
}

impl IntoResponse for SyncErrorBody {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

impl From<SyncError> for SyncErrorBody {
    fn from(e: SyncError) -> Self {
        let status_code = e.status_code();
        let (google_error, details) = match e {
            SyncError::MissingWorkspace { user_id } => (
                "Missing workspace ID".into(),
                SyncErrorDetails {
                    user_id: Some(user_id),
                    reason: Some("No workspace ID provided".into()),
                    ..SyncErrorDetails::default()
                },
            ),
            SyncError::InvalidWorkspace { ws_id, user_id } => (
                "Invalid workspace ID".into(),
                SyncErrorDetails {
                    user_id: Some(user_id),
                    reason: Some(format_sstr!("{ws_id} is not a workspace ID")),
                    ..SyncErrorDetails::default()
                },
            ),
            SyncError::NotAuthenticated {
                user_id,
                reason,
                has_refresh_token,
            } => (
                "Google Calendar not authenticated".into(),
                SyncErrorDetails {
                    has_refresh_token,
                    user_id: Some(user_id),
                    reason: Some(StackString::from_display(reason)),
                    ..SyncErrorDetails::default()
                },
            ),
            SyncError::TokenLookup {
                user_id,
                message,
                code,
            } => (
                "Database error".into(),
                SyncErrorDetails {
                    user_id: Some(user_id),
                    token_error: Some(message),
                    error_code: code,
                    ..SyncErrorDetails::default()
                },
            ),
            e => (
                StackString::from_display(&e),
                SyncErrorDetails {
                    has_access_token: true,
                    ..SyncErrorDetails::default()
                },
            ),
        };
        Self {
            error: SYNC_FAILED.into(),
            status_code,
            google_error,
            details,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(s) => {
                (StatusCode::BAD_REQUEST, ErrorMessage { error: s }).into_response()
            }
            Self::Unauthorized(s) => {
                (StatusCode::UNAUTHORIZED, ErrorMessage { error: s }).into_response()
            }
            Self::SyncError(e) => {
                error!("sync failed: {e}");
                SyncErrorBody::from(e).into_response()
            }
            e => {
                error!("internal error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorMessage {
                        error: format_sstr!("Internal Server Error: {e}"),
                    },
                )
                    .into_response()
            }
        }
    }
}

impl IntoResponses for ServiceError {
    fn responses() -> std::collections::BTreeMap<
        String,
        utoipa::openapi::RefOr<utoipa::openapi::response::Response>,
    > {
        let error_message_content = ContentBuilder::new()
            .schema(Some(ErrorMessage::schema()))
            .build();
        let sync_error_content = ContentBuilder::new()
            .schema(Some(SyncErrorBody::schema()))
            .build();
        ResponsesBuilder::new()
            .response(
                StatusCode::BAD_REQUEST.as_str(),
                ResponseBuilder::new()
                    .description("Bad Request")
                    .content("application/json", error_message_content.clone()),
            )
            .response(
                StatusCode::UNAUTHORIZED.as_str(),
                ResponseBuilder::new()
                    .description("Not Authorized")
                    .content("application/json", sync_error_content.clone()),
            )
            .response(
                StatusCode::CONFLICT.as_str(),
                ResponseBuilder::new()
                    .description("Concurrent Sync")
                    .content("application/json", sync_error_content.clone()),
            )
            .response(
                StatusCode::INTERNAL_SERVER_ERROR.as_str(),
                ResponseBuilder::new()
                    .description("Internal Server Error")
                    .content("application/json", sync_error_content),
            )
            .build()
            .into()
    }
}

#[cfg(test)]
mod test {
    use anyhow::Error;
    use axum::{body::to_bytes, http::StatusCode, response::IntoResponse};
    use serde_json::{Value, json};
    use uuid::Uuid;

    use calendar_sync_lib::errors::{AuthFailure, SyncError};
    use gcal_lib::errors::GCalError;

    use crate::errors::ServiceError;

    async fn render(e: ServiceError) -> Result<(StatusCode, Value), Error> {
        let response = e.into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        Ok((status, serde_json::from_slice(&body)?))
    }

    #[tokio::test]
    async fn test_bad_request_and_unauthorized() -> Result<(), Error> {
        let (status, body) =
            render(ServiceError::BadRequest("startDate and endDate are required".into())).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "startDate and endDate are required"}));

        let (status, body) =
            render(ServiceError::Unauthorized("User not authenticated".into())).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({"error": "User not authenticated"}));
        Ok(())
    }

    #[tokio::test]
    async fn test_sync_error_bodies() -> Result<(), Error> {
        let user_id = Uuid::nil();

        let (status, body) = render(SyncError::MissingWorkspace { user_id }.into()).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            json!({
                "error": "Failed to fetch Google Calendar events",
                "statusCode": 400,
                "googleError": "Missing workspace ID",
                "details": {
                    "hasAccessToken": false,
                    "hasRefreshToken": false,
                    "userId": "00000000-0000-0000-0000-000000000000",
                    "reason": "No workspace ID provided"
                }
            })
        );

        let e = SyncError::NotAuthenticated {
            user_id,
            reason: AuthFailure::EmptyAccessToken,
            has_refresh_token: true,
        };
        let (status, body) = render(e.into()).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["googleError"], "Google Calendar not authenticated");
        assert_eq!(body["details"]["reason"], "Access token is empty");
        assert_eq!(body["details"]["hasRefreshToken"], true);

        let e = SyncError::TokenLookup {
            user_id,
            message: "connection refused".into(),
            code: Some("08006".into()),
        };
        let (status, body) = render(e.into()).await?;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["googleError"], "Database error");
        assert_eq!(body["details"]["tokenError"], "connection refused");
        assert_eq!(body["details"]["errorCode"], "08006");

        let (status, body) = render(SyncError::ConcurrentSync(user_id).into()).await?;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["statusCode"], 409);

        let e = SyncError::GCal(GCalError::Api {
            status: 403,
            message: "Rate Limit Exceeded".into(),
        });
        let (status, body) = render(e.into()).await?;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(
            body["googleError"]
                .as_str()
                .is_some_and(|s| s.contains("Rate Limit Exceeded"))
        );
        Ok(())
    }
}
