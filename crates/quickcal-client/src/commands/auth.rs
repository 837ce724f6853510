//! Authentication commands.

use quickcal_google::{GoogleConfig, SessionError, TokenStore, acquire_session};
use tracing::info;

use crate::error::{ClientError, ClientResult};

/// Ensures a usable token is stored, running the browser flow if needed.
///
/// With `force`, the stored token is discarded first.
pub async fn auth(google: &GoogleConfig, force: bool) -> ClientResult<()> {
    google.validate().map_err(ClientError::Config)?;

    if force {
        TokenStore::new(&google.token_path)
            .clear()
            .map_err(|e| ClientError::Session(SessionError::Storage(e)))?;
    }

    println!("Checking Google Calendar authorization...");
    println!("If a browser window opens, grant access to your calendar.");
    println!();

    let session = acquire_session(google).await?;

    info!("Google authorization successful");
    println!("Authorized.");
    println!("Token stored at {}", google.token_path.display());
    if let Some(remaining) = session.credential().time_until_expiry() {
        println!(
            "Access token valid for {} more minutes.",
            remaining.num_minutes().max(0)
        );
    }

    Ok(())
}
