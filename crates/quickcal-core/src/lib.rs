//! Core types: event records, wire payloads, tracing setup

pub mod event;
pub mod tracing;

pub use event::{
    DATE_TIME_FORMAT, DEFAULT_TIME_ZONE, EventDateTime, EventError, EventPayload, EventRecord,
    parse_date_time,
};
pub use self::tracing::{LogFormat, TracingConfig, TracingError, init_tracing};
