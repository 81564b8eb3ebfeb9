use anyhow::Error as AnyhowError;
use reqwest::Error as ReqwestError;
use stack_string::StackString;
use thiserror::Error;
use url::ParseError as UrlParseError;

#[derive(Error, Debug)]
pub enum GCalError {
    #[error("Sync token is no longer valid (410): {0}")]
    SyncTokenExpired(StackString),
    #[error("Google Calendar rejected credentials (401): {0}")]
    Unauthorized(StackString),
    #[error("Google Calendar API error {status}: {message}")]
    Api { status: u16, message: StackString },
    #[error("Base url cannot be a base: {0}")]
    InvalidBaseUrl(StackString),
    #[error("Reqwest error {0}")]
    ReqwestError(#[from] ReqwestError),
    #[error("Url parse error {0}")]
    UrlParseError(#[from] UrlParseError),
    #[error("Anyhow error {0}")]
    AnyhowError(#[from] AnyhowError),
}
