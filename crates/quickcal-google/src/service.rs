//! The calendar service seam.
//!
//! [`CalendarService`] is what the event submitter talks to. The real
//! implementation is [`SessionHandle`](crate::SessionHandle); tests use mocks.

use std::future::Future;
use std::pin::Pin;

use quickcal_core::EventPayload;
use serde::Deserialize;

use crate::error::GoogleResult;

/// A boxed future for async trait methods.
///
/// Keeps the traits object-safe so callers can hold `&dyn CalendarService`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The calendar that events are inserted into.
pub const PRIMARY_CALENDAR: &str = "primary";

/// An event as returned by the insert call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertedEvent {
    /// Identifier assigned by the service.
    pub id: Option<String>,
    /// Link to the event in the Google Calendar web UI.
    pub html_link: Option<String>,
}

/// Something that can create events in a calendar.
pub trait CalendarService: Send + Sync {
    /// Inserts `event` into the calendar identified by `calendar_id`.
    fn insert_event<'a>(
        &'a self,
        calendar_id: &'a str,
        event: &'a EventPayload,
    ) -> BoxFuture<'a, GoogleResult<InsertedEvent>>;
}
