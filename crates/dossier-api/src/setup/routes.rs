//! Route configuration and setup

use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use dossier_core::{RecordKind, ServerConfig};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::handlers::{self, records};
use crate::state::AppState;
use crate::uploads::UPLOADS_PREFIX;

/// Setup all application routes
pub fn setup_routes(state: AppState) -> Router {
    let config = state.config.clone();

    let mut api = Router::new().route("/health", get(handlers::health));
    for kind in RecordKind::all() {
        api = api.merge(record_routes(kind));
    }

    let body_limit = config.max_upload_size_bytes();
    tracing::info!(
        max_upload_size_mb = config.max_upload_size_mb,
        http_concurrency_limit = config.concurrency_limit,
        upload_dir = %state.uploads.root().display(),
        "Routes configured"
    );

    api.nest_service(
        &format!("/{}", UPLOADS_PREFIX),
        ServeDir::new(state.uploads.root()),
    )
    .layer(DefaultBodyLimit::max(body_limit))
    .layer(ConcurrencyLimitLayer::new(config.concurrency_limit))
    .layer(RequestBodyLimitLayer::new(body_limit))
    .layer(setup_cors(&config))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

/// Fetch and submit routes for one record kind, at the paths its schema names.
fn record_routes(kind: RecordKind) -> Router<AppState> {
    let endpoints = kind.schema().endpoints;
    Router::new()
        .route(
            endpoints.fetch_path,
            get(
                move |state: State<AppState>, query: Query<records::UserQuery>| {
                    records::fetch_record(state, query, kind)
                },
            ),
        )
        .route(
            endpoints.submit_path,
            post(move |state: State<AppState>, multipart: Multipart| {
                records::submit_record(state, multipart, kind)
            }),
        )
}

/// Setup CORS configuration
fn setup_cors(config: &ServerConfig) -> CorsLayer {
    if config.cors_origins.iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(origin) => Some(origin),
                Err(_) => {
                    tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    }
}
