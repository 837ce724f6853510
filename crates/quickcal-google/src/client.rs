//! Google Calendar API client.
//!
//! This module provides a low-level HTTP client for the Google Calendar API,
//! handling authentication, request building, and response parsing.

use std::time::Duration;

use quickcal_core::EventPayload;
use serde::Deserialize;
use tracing::debug;

use crate::error::{GoogleError, GoogleResult};
use crate::service::InsertedEvent;

/// Service name and version the client is bound to.
pub const SERVICE_NAME: &str = "calendar";
pub const API_VERSION: &str = "v3";

/// Google Calendar API client.
#[derive(Debug, Clone)]
pub struct GoogleCalendarClient {
    http_client: reqwest::Client,
    access_token: String,
    base_url: String,
}

impl GoogleCalendarClient {
    /// Creates a client for the access token against `api_root`.
    ///
    /// Fails if the underlying HTTP client cannot be constructed.
    pub fn with_api_root(
        access_token: impl Into<String>,
        timeout: Duration,
        api_root: &str,
    ) -> GoogleResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(format!("quickcal/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                GoogleError::internal(format!("failed to create HTTP client: {}", e)).with_source(e)
            })?;

        Ok(Self {
            http_client,
            access_token: access_token.into(),
            base_url: format!(
                "{}/{}/{}",
                api_root.trim_end_matches('/'),
                SERVICE_NAME,
                API_VERSION
            ),
        })
    }

    /// Returns the versioned service URL, e.g. `https://www.googleapis.com/calendar/v3`.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Inserts an event into a calendar.
    ///
    /// # Arguments
    ///
    /// * `calendar_id` - The calendar identifier (e.g., "primary")
    /// * `event` - The event body
    pub async fn insert_event(
        &self,
        calendar_id: &str,
        event: &EventPayload,
    ) -> GoogleResult<InsertedEvent> {
        let url = format!(
            "{}/calendars/{}/events",
            self.base_url,
            urlencoding::encode(calendar_id)
        );

        debug!("inserting event into calendar {}", calendar_id);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(event)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GoogleError::network("request timeout")
                } else if e.is_connect() {
                    GoogleError::network(format!("connection failed: {}", e))
                } else {
                    GoogleError::network(format!("request failed: {}", e))
                }
            })?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());

        let body = response
            .text()
            .await
            .map_err(|e| GoogleError::network(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(status_error(status, &body, retry_after));
        }

        let event: InsertedEvent = serde_json::from_str(&body).map_err(|e| {
            GoogleError::invalid_response(format!("failed to parse response: {}", e))
        })?;

        debug!("created event {:?}", event.id);
        Ok(event)
    }
}

/// Maps a non-success status to an error, keeping the API's own message.
fn status_error(status: reqwest::StatusCode, body: &str, retry_after: Option<u64>) -> GoogleError {
    let detail = serde_json::from_str::<ApiErrorResponse>(body)
        .ok()
        .map(|r| r.error.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.trim().to_string());

    match status {
        reqwest::StatusCode::UNAUTHORIZED => {
            GoogleError::authentication(format!("access token expired or invalid: {}", detail))
        }
        reqwest::StatusCode::FORBIDDEN => {
            GoogleError::authorization(format!("access denied to calendar: {}", detail))
        }
        reqwest::StatusCode::NOT_FOUND => {
            GoogleError::not_found(format!("calendar not found: {}", detail))
        }
        reqwest::StatusCode::BAD_REQUEST => {
            GoogleError::bad_request(format!("invalid event: {}", detail))
        }
        reqwest::StatusCode::TOO_MANY_REQUESTS => GoogleError::rate_limited(format!(
            "rate limit exceeded{}: {}",
            retry_after
                .map(|s| format!(", retry after {} seconds", s))
                .unwrap_or_default(),
            detail
        )),
        s if s.is_server_error() => GoogleError::server(format!("API error ({}): {}", s, detail)),
        s => GoogleError::invalid_response(format!("unexpected status ({}): {}", s, detail)),
    }
}

/// Error envelope returned by Google APIs.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}
