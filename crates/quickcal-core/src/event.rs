//! Event record types.
//!
//! This module provides the value types used to create a calendar event:
//! - [`EventRecord`]: the caller-facing description of an event to create
//! - [`EventPayload`]: the JSON body sent to the calendar service
//! - [`EventDateTime`]: a local date-time annotated with an IANA time zone

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Time zone attached to every event unless overridden.
pub const DEFAULT_TIME_ZONE: &str = "Asia/Tokyo";

/// Wire format for local date-times (ISO-8601 without offset).
pub const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Formats accepted when parsing user-supplied date-times.
const INPUT_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Errors produced while building an event record.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventError {
    /// The date-time string matched none of the accepted formats.
    #[error("invalid date-time '{input}': expected YYYY-MM-DDTHH:MM[:SS]")]
    InvalidDateTime { input: String },
}

/// Parses a local date-time such as `2024-06-01T10:00` or `2024-06-01 10:00:00`.
pub fn parse_date_time(input: &str) -> Result<NaiveDateTime, EventError> {
    let trimmed = input.trim();
    INPUT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .ok_or_else(|| EventError::InvalidDateTime {
            input: input.to_string(),
        })
}

/// An event to be created in a calendar.
///
/// Start and end are wall-clock times in [`EventRecord::time_zone`]. No
/// ordering between them is enforced here; the calendar service decides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    /// Event title (the `summary` field on the wire).
    pub title: String,
    /// Local start date-time.
    pub start: NaiveDateTime,
    /// Local end date-time.
    pub end: NaiveDateTime,
    /// IANA time zone identifier for `start` and `end`.
    pub time_zone: String,
    /// Optional free-form description.
    pub description: Option<String>,
}

impl EventRecord {
    /// Creates a record in the default time zone with no description.
    pub fn new(title: impl Into<String>, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            title: title.into(),
            start,
            end,
            time_zone: DEFAULT_TIME_ZONE.to_string(),
            description: None,
        }
    }

    /// Builder method to set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Builder method to set an optional description.
    pub fn with_optional_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    /// Builder method to override the time zone.
    pub fn with_time_zone(mut self, time_zone: impl Into<String>) -> Self {
        self.time_zone = time_zone.into();
        self
    }

    /// Renders the record as the JSON body expected by the events insert call.
    pub fn to_payload(&self) -> EventPayload {
        EventPayload {
            summary: self.title.clone(),
            description: self.description.clone(),
            start: EventDateTime::new(self.start, &self.time_zone),
            end: EventDateTime::new(self.end, &self.time_zone),
        }
    }
}

/// Body of an events insert request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start: EventDateTime,
    pub end: EventDateTime,
}

/// A local date-time with its time zone, as the calendar API expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    pub date_time: String,
    pub time_zone: String,
}

impl EventDateTime {
    /// Formats `at` as an ISO-8601 local date-time in `time_zone`.
    pub fn new(at: NaiveDateTime, time_zone: impl Into<String>) -> Self {
        Self {
            date_time: at.format(DATE_TIME_FORMAT).to_string(),
            time_zone: time_zone.into(),
        }
    }
}
