//! An authorized calendar session.

use quickcal_core::EventPayload;

use crate::client::GoogleCalendarClient;
use crate::error::GoogleResult;
use crate::service::{BoxFuture, CalendarService, InsertedEvent};
use crate::tokens::Credential;

/// A calendar client bound to a valid credential.
///
/// Obtained from [`acquire_session`](crate::acquire_session). The credential
/// is not refreshed during the session's lifetime.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    client: GoogleCalendarClient,
    credential: Credential,
}

impl SessionHandle {
    pub(crate) fn new(client: GoogleCalendarClient, credential: Credential) -> Self {
        Self { client, credential }
    }

    /// The credential the session was built from.
    pub fn credential(&self) -> &Credential {
        &self.credential
    }
}

impl CalendarService for SessionHandle {
    fn insert_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event: &'a EventPayload,
    ) -> BoxFuture<'a, GoogleResult<InsertedEvent>> {
        Box::pin(self.client.insert_event(calendar_id, event))
    }
}
