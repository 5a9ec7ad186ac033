use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, FromRef},
    http::{HeaderValue, StatusCode},
    middleware,
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    db::{SeasonStore, SeriesStore},
    error::AppError,
    middleware::{
        auth::JwtVerifier,
        request_id::{make_span_with_request_id, request_id_middleware},
    },
    services::{catalog::SeasonCatalog, ProgressReconciler, ReconcileOptions, SeriesLibrary},
};

pub mod seasons;
pub mod series;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub reconciler: Arc<ProgressReconciler>,
    pub library: Arc<SeriesLibrary>,
    pub jwt: Arc<JwtVerifier>,
}

impl AppState {
    pub fn new(
        seasons: Arc<dyn SeasonStore>,
        series: Arc<dyn SeriesStore>,
        catalog: Arc<dyn SeasonCatalog>,
        options: ReconcileOptions,
        jwt: JwtVerifier,
    ) -> Self {
        Self {
            reconciler: Arc::new(ProgressReconciler::new(
                seasons,
                Arc::clone(&series),
                catalog,
                options,
            )),
            library: Arc::new(SeriesLibrary::new(series)),
            jwt: Arc::new(jwt),
        }
    }
}

impl FromRef<AppState> for Arc<JwtVerifier> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.jwt)
    }
}

/// Creates the application router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/seasons", season_routes())
        .nest("/api/series", series_routes())
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id)),
        )
        .with_state(state)
}

/// Season routes under /api/seasons
fn season_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(seasons::create))
        .route("/series/all", post(seasons::create_all))
        .route("/series/:id", get(seasons::distinct_by_series))
        .route("/series/:id/viewed", get(seasons::viewed_details))
        .route("/:id/series/:series_id/infos", get(seasons::infos))
        .route("/continue", get(seasons::to_continue))
        .route("/:id", patch(seasons::update).delete(seasons::delete))
}

/// Series routes under /api/series
fn series_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(series::create).get(series::list))
        .route("/titles/:title", get(series::by_title))
        .route("/:id/infos", get(series::infos))
        .route("/:id", axum::routing::delete(series::delete))
}

/// Permissive CORS unless a specific origin is configured
pub fn cors_layer(allow_origin: &str) -> CorsLayer {
    let origin = match allow_origin {
        "*" => AllowOrigin::any(),
        origin => match HeaderValue::from_str(origin) {
            Ok(value) => AllowOrigin::exact(value),
            Err(_) => {
                tracing::warn!(origin, "Invalid CORS origin, allowing any");
                AllowOrigin::any()
            }
        },
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

pub(crate) fn invalid_body(rejection: JsonRejection) -> AppError {
    AppError::InvalidInput(format!("Invalid data: {}", rejection.body_text()))
}

pub(crate) fn invalid_path(rejection: PathRejection) -> AppError {
    AppError::InvalidInput(format!("Invalid data: {}", rejection.body_text()))
}
