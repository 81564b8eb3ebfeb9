use async_trait::async_trait;
use log::debug;
use reqwest::{Client, StatusCode};
use stack_string::{StackString, format_sstr};
use std::sync::Arc;
use time::OffsetDateTime;
use url::Url;

use crate::{
    datetimetype::convert_datetime_to_str,
    errors::GCalError,
    gcal_event::{Events, GoogleErrorResponse},
};

pub const GCAL_API_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";
pub const MAX_RESULTS: usize = 2500;

/// How a listing selects events: changes since a sync token, or everything
/// inside a time window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListMode {
    Incremental(StackString),
    DateRange {
        time_min: OffsetDateTime,
        time_max: OffsetDateTime,
    },
}

impl ListMode {
    #[must_use]
    pub fn is_incremental(&self) -> bool {
        matches!(self, Self::Incremental(_))
    }

    fn query_params(&self) -> Result<Vec<(&'static str, StackString)>, GCalError> {
        match self {
            Self::Incremental(sync_token) => Ok(vec![("syncToken", sync_token.clone())]),
            Self::DateRange { time_min, time_max } => Ok(vec![
                ("timeMin", convert_datetime_to_str(*time_min)?),
                ("timeMax", convert_datetime_to_str(*time_max)?),
            ]),
        }
    }
}

#[async_trait]
pub trait CalendarEventSource: Send + Sync {
    /// Fetch a single page of events.
    async fn list_events(
        &self,
        calendar_id: &str,
        mode: &ListMode,
        page_token: Option<&str>,
    ) -> Result<Events, GCalError>;
}

#[async_trait]
impl<T> CalendarEventSource for Arc<T>
where
    T: CalendarEventSource + ?Sized,
{
    async fn list_events(
        &self,
        calendar_id: &str,
        mode: &ListMode,
        page_token: Option<&str>,
    ) -> Result<Events, GCalError> {
        (**self).list_events(calendar_id, mode, page_token).await
    }
}

#[derive(Clone)]
pub struct GCalendarInstance {
    client: Client,
    base_url: Url,
    access_token: StackString,
}

impl GCalendarInstance {
    /// # Errors
    /// Returns error if `base_url` is not a valid url
    pub fn new(client: Client, base_url: &str, access_token: &str) -> Result<Self, GCalError> {
        let base_url: Url = base_url.parse()?;
        if base_url.cannot_be_a_base() {
            return Err(GCalError::InvalidBaseUrl(base_url.as_str().into()));
        }
        Ok(Self {
            client,
            base_url,
            access_token: access_token.into(),
        })
    }

    fn events_url(&self, calendar_id: &str) -> Result<Url, GCalError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| GCalError::InvalidBaseUrl(self.base_url.as_str().into()))?
            .pop_if_empty()
            .extend(&["calendars", calendar_id, "events"]);
        Ok(url)
    }

    async fn gcal_events(
        &self,
        calendar_id: &str,
        mode: &ListMode,
        page_token: Option<&str>,
    ) -> Result<Events, GCalError> {
        let url = self.events_url(calendar_id)?;
        let mut params: Vec<(&str, StackString)> = vec![
            ("showDeleted", "true".into()),
            ("singleEvents", "true".into()),
            ("maxResults", StackString::from_display(MAX_RESULTS)),
        ];
        params.extend(mode.query_params()?);
        if let Some(page_token) = page_token {
            params.push(("pageToken", page_token.into()));
        }
        debug!(
            "events.list {calendar_id} incremental={} page_token={page_token:?}",
            mode.is_incremental()
        );

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .query(&params)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return response.json().await.map_err(Into::into);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<GoogleErrorResponse>(&body)
            .map_or_else(|_| body.as_str().into(), |e| e.error.message);

        match status {
            StatusCode::GONE => Err(GCalError::SyncTokenExpired(message)),
            StatusCode::UNAUTHORIZED => Err(GCalError::Unauthorized(message)),
            status => Err(GCalError::Api {
                status: status.as_u16(),
                message: if message.is_empty() {
                    format_sstr!("{status}")
                } else {
                    message
                },
            }),
        }
    }
}

#[async_trait]
impl CalendarEventSource for GCalendarInstance {
    async fn list_events(
        &self,
        calendar_id: &str,
        mode: &ListMode,
        page_token: Option<&str>,
    ) -> Result<Events, GCalError> {
        self.gcal_events(calendar_id, mode, page_token).await
    }
}
