//!
//! src/errors.rs
//!
//! Defines enums and methods of error conversion
//! for errors the client uses
//!
//!

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("config error: {0}")]
    Config(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("parse error: {0}")]
    Parse(String),
    #[error("request cancelled")]
    Cancelled,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error)
}

impl ClientError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ClientError::Cancelled)
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ClientError::Parse(e.to_string())
        } else {
            ClientError::Http(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self { ClientError::Parse(e.to_string()) }
}

impl From<url::ParseError> for ClientError {
    fn from(e: url::ParseError) -> Self { ClientError::Config(e.to_string()) }
}
