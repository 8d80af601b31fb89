//! Engine Error Types

use thiserror::Error;

use crate::membership::Strategy;

/// The client-credentials exchange failed
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Token request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Token endpoint rejected the client credentials (HTTP {status}, {code})")]
    Rejected { status: u16, code: String },

    #[error("Invalid token response: {0}")]
    InvalidResponse(String),
}

/// A single directory call failed at the request level
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("Directory request timed out")]
    Timeout,

    #[error("Directory request failed: {0}")]
    Transport(String),

    #[error("Directory returned HTTP {status}")]
    Status { status: u16, body: String },

    #[error("Unexpected directory response: {0}")]
    InvalidResponse(String),

    #[error("Member listing exceeded {0} pages")]
    TooManyPages(u32),
}

impl RequestError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RequestError::Status { status: 404, .. })
    }

    /// Error raised while reading or decoding a response body
    pub(crate) fn from_body(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RequestError::Timeout
        } else {
            RequestError::InvalidResponse(e.to_string())
        }
    }
}

impl From<reqwest::Error> for RequestError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RequestError::Timeout
        } else {
            RequestError::Transport(e.to_string())
        }
    }
}

/// A directory reference that carries no recognizable identifier
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Cannot normalize directory reference: {reference}")]
pub struct NormalizationError {
    pub reference: String,
}

/// One failed attempt of the membership cascade
#[derive(Debug)]
pub struct StrategyFailure {
    pub strategy: Strategy,
    pub error: RequestError,
}

#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("Identity lookup failed: {0}")]
    IdentityLookup(#[source] RequestError),

    #[error("Directory returned an invalid identity record: {0}")]
    InvalidIdentity(String),

    #[error("All membership strategies failed: {}", summarize(.0))]
    StrategiesExhausted(Vec<StrategyFailure>),
}

fn summarize(failures: &[StrategyFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.strategy, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Identity not found")]
    NotFound,

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// Failure of the externally visible authorization check
#[derive(Error, Debug)]
pub enum AuthorizationError {
    #[error("{message}")]
    Validation { message: String },

    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),
}

impl AuthorizationError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

pub type Result<T> = std::result::Result<T, AuthorizationError>;
