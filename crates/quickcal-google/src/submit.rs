//! Event submission.

use chrono::NaiveDateTime;
use quickcal_core::EventRecord;
use tracing::{debug, info};

use crate::error::{GoogleError, SubmitError};
use crate::service::{CalendarService, PRIMARY_CALENDAR};

/// Creates one event in the primary calendar and returns its web link.
///
/// Times are sent as local date-times in the default time zone. Nothing is
/// validated here (not even `start < end`); the service decides.
pub async fn add_event(
    session: &dyn CalendarService,
    title: &str,
    start: NaiveDateTime,
    end: NaiveDateTime,
    description: Option<&str>,
) -> Result<String, SubmitError> {
    let record = EventRecord::new(title, start, end)
        .with_optional_description(description.map(str::to_string));
    submit_event(session, &record).await
}

/// Submits a prepared event record to the primary calendar.
pub async fn submit_event(
    session: &dyn CalendarService,
    record: &EventRecord,
) -> Result<String, SubmitError> {
    let payload = record.to_payload();
    debug!(
        "submitting event {:?} ({} to {}, {})",
        record.title, payload.start.date_time, payload.end.date_time, record.time_zone
    );

    let inserted = session.insert_event(PRIMARY_CALENDAR, &payload).await?;

    let link = inserted
        .html_link
        .filter(|l| !l.is_empty())
        .ok_or_else(|| GoogleError::invalid_response("created event has no htmlLink"))?;

    info!("created event {}", inserted.id.as_deref().unwrap_or("<unknown>"));
    Ok(link)
}
