//! Google OAuth credential lifecycle and Calendar event insertion.
//!
//! This crate provides the two operations the `quickcal` CLI is built on:
//!
//! - [`acquire_session`] - Load, refresh or interactively obtain a credential
//!   and bind it to a Calendar API client
//! - [`add_event`] - Insert one event into the primary calendar and return its link
//!
//! # Authentication Flow
//!
//! 1. The token file is loaded and bound to the calendar scope
//! 2. An expired token with a refresh token is refreshed; if the refresh fails
//!    the credential is dropped
//! 3. Without a usable token, the operator's client secret file starts an
//!    OAuth PKCE flow with a loopback redirect on an ephemeral port
//! 4. Any new or refreshed credential is written back to the token file
//!
//! # Example
//!
//! ```ignore
//! use quickcal_google::{GoogleConfig, acquire_session, add_event};
//!
//! let session = acquire_session(&GoogleConfig::from_env()).await?;
//! let link = add_event(&session, "Meeting", start, end, Some("agenda")).await?;
//! println!("{link}");
//! ```

pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod oauth;
pub mod service;
pub mod session;
pub mod submit;
pub mod tokens;

pub use client::GoogleCalendarClient;
pub use config::{GoogleConfig, GoogleEndpoints, OAuthCredentials};
pub use credentials::{CredentialManager, CredentialState, acquire_session};
pub use error::{GoogleError, GoogleErrorCode, GoogleResult, SessionError, SubmitError};
pub use oauth::{Authorizer, OAuthClient, PkceFlow, TokenRefresher};
pub use service::{BoxFuture, CalendarService, InsertedEvent, PRIMARY_CALENDAR};
pub use session::SessionHandle;
pub use submit::{add_event, submit_event};
pub use tokens::{Credential, RefreshedToken, TokenStore};
