//! GroupCheck API
//!
//! HTTP endpoints:
//! - `POST /api/checkAuthorization` - group membership check
//! - `GET  /api/health` - liveness
//! - `GET  /api-doc/openapi.json`, `/swagger-ui` - API documentation

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use gc_common::IdentifierKind;
use gc_directory::AuthorizationService;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod error;
pub mod model;

pub use error::ApiError;
use model::{CheckAuthorizationRequest, CheckAuthorizationResponse, ErrorResponse, HealthResponse, UserDetails};

/// Router options
#[derive(Debug, Clone, Default)]
pub struct ApiOptions {
    /// Include failure details in 500 responses
    pub diagnostics: bool,
    /// Allowed CORS origins; empty means any
    pub allowed_origins: Vec<String>,
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AuthorizationService>,
    pub diagnostics: bool,
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "GroupCheck API",
        version = "1.0.0",
        description = "Directory group membership authorization"
    ),
    tags(
        (name = "authorization", description = "Group membership checks"),
        (name = "health", description = "Liveness")
    ),
    paths(check_authorization, health),
    components(schemas(
        CheckAuthorizationRequest,
        CheckAuthorizationResponse,
        UserDetails,
        ErrorResponse,
        HealthResponse
    ))
)]
pub struct ApiDoc;

/// Check whether the user is a member of the configured group
#[utoipa::path(
    post,
    path = "/api/checkAuthorization",
    tag = "authorization",
    request_body = CheckAuthorizationRequest,
    responses(
        (status = 200, description = "Check completed", body = CheckAuthorizationResponse),
        (status = 400, description = "Invalid identifier or request body", body = ErrorResponse),
        (status = 500, description = "Directory or credential failure", body = ErrorResponse)
    )
)]
pub async fn check_authorization(
    State(state): State<AppState>,
    payload: Result<Json<CheckAuthorizationRequest>, JsonRejection>,
) -> Result<Json<CheckAuthorizationResponse>, ApiError> {
    let Json(request) = payload?;

    let raw = match state.service.identifier_kind() {
        IdentifierKind::Email => request.email,
        IdentifierKind::UserId => request.user_id,
    }
    .unwrap_or_default();

    let result = state
        .service
        .check_authorization(&raw)
        .await
        .map_err(|e| ApiError::from_authorization(e, state.diagnostics))?;

    Ok(Json(result.into()))
}

/// Liveness check
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "health",
    responses(
        (status = 200, description = "Server is running", body = HealthResponse)
    )
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        success: true,
        message: "Server is running".to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

async fn fallback() -> Response {
    (
        axum::http::StatusCode::NOT_FOUND,
        Json(ErrorResponse::new("Not found")),
    )
        .into_response()
}

/// CORS policy for the configured origins
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if allowed_origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

/// Build the API router
pub fn create_router(service: Arc<AuthorizationService>, options: ApiOptions) -> Router {
    info!(
        kind = %service.identifier_kind(),
        diagnostics = options.diagnostics,
        "Creating API router"
    );

    let state = AppState {
        service,
        diagnostics: options.diagnostics,
    };

    Router::new()
        .route("/api/checkAuthorization", post(check_authorization))
        .route("/api/health", get(health))
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .fallback(fallback)
        .layer(cors_layer(&options.allowed_origins))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
}
