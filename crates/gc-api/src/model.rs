//! Request and response bodies

use gc_common::{Identity, MembershipResult};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const MSG_AUTHORIZED: &str = "User is authorized and is a member of the group";
pub const MSG_NOT_AUTHORIZED: &str = "User is not authorized or not a member of the group";
pub const MSG_NOT_FOUND: &str = "User not found with the provided identifier";
pub const MSG_INTERNAL: &str = "Internal server error. Please try again later.";

/// Authorization check request. Which field is read depends on the deployment.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckAuthorizationRequest {
    /// Email address of the user (email deployments)
    #[serde(default)]
    pub email: Option<String>,

    /// Directory object id of the user (user id deployments)
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Resolved directory user
#[derive(Debug, Serialize, ToSchema)]
pub struct UserDetails {
    pub id: String,
    pub email: String,
}

impl From<Identity> for UserDetails {
    fn from(identity: Identity) -> Self {
        Self {
            id: identity.directory_id.to_string(),
            email: identity.email,
        }
    }
}

/// Authorization check result
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckAuthorizationResponse {
    pub success: bool,
    pub is_authorized: bool,
    pub user_details: Option<UserDetails>,
    pub message: String,
}

impl From<MembershipResult> for CheckAuthorizationResponse {
    fn from(result: MembershipResult) -> Self {
        let message = if result.is_identity_not_found() {
            MSG_NOT_FOUND
        } else if result.is_member {
            MSG_AUTHORIZED
        } else {
            MSG_NOT_AUTHORIZED
        };

        Self {
            success: true,
            is_authorized: result.is_member,
            user_details: result.identity.map(UserDetails::from),
            message: message.to_string(),
        }
    }
}

/// Error body for 4xx/5xx responses
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    /// Failure detail, present only when diagnostics are enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            error: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Liveness response
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub success: bool,
    pub message: String,
    /// RFC 3339 timestamp
    pub timestamp: String,
}
