//! The `add` command.

use quickcal_core::{EventRecord, parse_date_time};
use quickcal_google::{GoogleConfig, acquire_session, submit_event};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Adds one event to the primary calendar and prints its link.
pub async fn add(
    title: String,
    start: &str,
    end: &str,
    description: Option<String>,
    config: &ClientConfig,
    google: &GoogleConfig,
) -> ClientResult<()> {
    let time_zone = config
        .google
        .validate_time_zone()
        .map_err(ClientError::Config)?;
    google.validate().map_err(ClientError::Config)?;
    let record = build_record(title, start, end, description, time_zone.name())?;
    debug!("event: {:?}", record);

    let session = acquire_session(google).await?;
    let link = submit_event(&session, &record).await?;

    println!("{}", link);
    Ok(())
}

/// Parses the command-line times into an event record.
fn build_record(
    title: String,
    start: &str,
    end: &str,
    description: Option<String>,
    time_zone: &str,
) -> ClientResult<EventRecord> {
    let start = parse_date_time(start)?;
    let end = parse_date_time(end)?;

    Ok(EventRecord::new(title, start, end)
        .with_optional_description(description)
        .with_time_zone(time_zone))
}
