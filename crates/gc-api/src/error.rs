//! Error to HTTP response mapping

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gc_directory::AuthorizationError;
use tracing::{error, warn};

use crate::model::{ErrorResponse, MSG_INTERNAL};

/// An error ready to be rendered as a JSON response
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorResponse::new(message),
        }
    }

    /// Map an engine failure. Details reach the body only in diagnostics mode.
    pub fn from_authorization(err: AuthorizationError, diagnostics: bool) -> Self {
        if err.is_validation() {
            return Self::bad_request(err.to_string());
        }

        error!(error = %err, "Authorization check failed");
        let body = ErrorResponse::new(MSG_INTERNAL);
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: if diagnostics { body.with_error(err.to_string()) } else { body },
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        warn!(status = rejection.status().as_u16(), "Rejected request body");
        Self::bad_request(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gc_directory::{CredentialError, DirectoryError, RequestError};

    #[test]
    fn test_validation_is_bad_request() {
        let err = ApiError::from_authorization(AuthorizationError::validation("Email is required"), false);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.body.message, "Email is required");
        assert!(err.body.error.is_none());
    }

    #[test]
    fn test_internal_detail_only_in_diagnostics() {
        let make = || {
            AuthorizationError::from(DirectoryError::IdentityLookup(RequestError::Status {
                status: 503,
                body: "upstream".to_string(),
            }))
        };

        let quiet = ApiError::from_authorization(make(), false);
        assert_eq!(quiet.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(quiet.body.message, MSG_INTERNAL);
        assert!(quiet.body.error.is_none());

        let verbose = ApiError::from_authorization(make(), true);
        assert_eq!(
            verbose.body.error.as_deref(),
            Some("Directory error: Identity lookup failed: Directory returned HTTP 503")
        );
    }

    #[test]
    fn test_credential_failure_is_internal() {
        let err = AuthorizationError::from(CredentialError::Rejected {
            status: 401,
            code: "invalid_client".to_string(),
        });
        let api = ApiError::from_authorization(err, false);
        assert_eq!(api.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
