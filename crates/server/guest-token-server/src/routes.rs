//! HTTP routes: the guest token endpoint, the embedding page's settings and
//! the static files.

use crate::config::{CorsConfig, ServerConfig};
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use superset_guest_token::{GuestTokenError, GuestTokenSource};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub guest_tokens: Arc<dyn GuestTokenSource>,
    pub embed: EmbedSettings,
}

impl AppState {
    pub fn new(guest_tokens: Arc<dyn GuestTokenSource>, embed: EmbedSettings) -> Self {
        Self {
            guest_tokens,
            embed,
        }
    }
}

/// `GET /embed-config` response, read by the embedding page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedSettings {
    pub superset_domain: String,
    pub dashboard_id: String,
}

/// Successful `GET /guest-token` response
#[derive(Debug, Serialize, Deserialize)]
pub struct GuestTokenBody {
    #[serde(rename = "guestToken")]
    pub guest_token: String,
}

/// Failure body relayed to the caller
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: String,
    pub step: Option<String>,
    /// Superset's own error payload, as JSON when it parses
    pub upstream: Option<serde_json::Value>,
}

/// A failed exchange, rendered at the HTTP boundary.
#[derive(Debug)]
pub struct ApiError(pub GuestTokenError);

impl From<GuestTokenError> for ApiError {
    fn from(err: GuestTokenError) -> Self {
        Self(err)
    }
}

/// Every failure kind currently collapses to one status; callers only see
/// the kind in the body.
pub fn status_for(_err: &GuestTokenError) -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let upstream = err.upstream_body().map(|body| {
            serde_json::from_str(body)
                .unwrap_or_else(|_| serde_json::Value::String(body.to_string()))
        });

        let body = ErrorBody {
            error: err.to_string(),
            kind: err.kind().to_string(),
            step: err.step().map(|step| step.to_string()),
            upstream,
        };

        (status_for(&err), Json(body)).into_response()
    }
}

/// Handler for `GET /guest-token`
pub async fn guest_token_handler(
    State(state): State<AppState>,
) -> Result<Json<GuestTokenBody>, ApiError> {
    match state.guest_tokens.request_guest_token().await {
        Ok(token) => Ok(Json(GuestTokenBody {
            guest_token: token.into_inner(),
        })),
        Err(err) => {
            error!(
                kind = err.kind(),
                step = ?err.step(),
                upstream = err.upstream_body().unwrap_or("-"),
                "Guest token request failed: {}",
                err
            );
            Err(err.into())
        }
    }
}

/// Handler for `GET /embed-config`
pub async fn embed_config_handler(State(state): State<AppState>) -> Json<EmbedSettings> {
    Json(state.embed)
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_headers(Any);

    if config.allow_any_origin {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

/// Build the application router
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    if !config.static_dir.is_dir() {
        warn!(
            "Static directory {} does not exist, only the API routes will be served",
            config.static_dir.display()
        );
    } else {
        info!("Serving static files from {}", config.static_dir.display());
    }

    Router::new()
        .route("/guest-token", get(guest_token_handler))
        .route("/embed-config", get(embed_config_handler))
        .fallback_service(ServeDir::new(&config.static_dir))
        .layer(cors_layer(&config.cors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
