use reqwest::Client;
use stack_string::StackString;

use gcal_lib::gcal_instance::{CalendarEventSource, GCalendarInstance};

use crate::{errors::SyncError, models::CalendarAuthToken};

/// Builds a calendar client for an authenticated user.
pub trait CalendarConnector: Send + Sync {
    type Source: CalendarEventSource;

    /// # Errors
    /// Returns error if the client cannot be constructed
    fn connect(&self, auth: &CalendarAuthToken) -> Result<Self::Source, SyncError>;
}

#[derive(Clone, Debug)]
pub struct GCalConnector {
    client: Client,
    base_url: StackString,
}

impl GCalConnector {
    #[must_use]
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

impl CalendarConnector for GCalConnector {
    type Source = GCalendarInstance;

    fn connect(&self, auth: &CalendarAuthToken) -> Result<Self::Source, SyncError> {
        GCalendarInstance::new(self.client.clone(), &self.base_url, &auth.access_token)
            .map_err(Into::into)
    }
}
