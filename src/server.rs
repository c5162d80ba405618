//! HTTP search server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/api/search?q=<text>&page=<n>` | Federated search over items, tags and comments |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Search response
//!
//! ```json
//! {
//!   "results": [
//!     { "_id": "i1", "name": "Brass sextant",
//!       "collectionId": { "_id": "c1", "name": "Instruments",
//!                         "user": { "_id": "u1", "username": "ada" } },
//!       "source": ["items", "tags"] }
//!   ],
//!   "currentPage": 1, "totalPages": 1, "totalResults": 1
//! }
//! ```
//!
//! `page` defaults to 1. A missing or blank `q` yields an empty page.
//!
//! # Error Contract
//!
//! | Status | Body | When |
//! |--------|------|------|
//! | 400 | `{ "error": "invalid_paging" }` | `page` is below 1, not an integer, or repeated |
//! | 500 | `{ "error": "search_results_fetch_failed" }` | any store call failed |
//!
//! The 500 body never carries the underlying error; it is logged instead.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the browser frontend
//! can call the API from another origin.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use collections_search_core::search::{self, SearchPage, SearchRequest};
use collections_search_core::store::ContentStore;
use collections_search_core::SearchError;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    store: Arc<dyn ContentStore>,
    page_size: usize,
}

/// Starts the HTTP server on `[server].bind`.
///
/// Runs until the process is terminated. Returns an error if the database
/// cannot be opened or the address cannot be bound.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    let store: Arc<dyn ContentStore> = Arc::new(SqliteStore::new(pool));
    let app = router(store, config.search.page_size);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(
        bind = %config.server.bind,
        db = %config.db.path.display(),
        "search server listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

/// Build the router over any [`ContentStore`].
///
/// Split from [`run_server`] so tests can serve an in-memory store on an
/// ephemeral port.
pub fn router(store: Arc<dyn ContentStore>, page_size: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/search", get(handle_search))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { store, page_size })
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: &'static str,
}

impl AppError {
    fn invalid_paging() -> Self {
        AppError {
            status: StatusCode::BAD_REQUEST,
            code: "invalid_paging",
        }
    }
}

impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        let status = if err.is_caller_error() {
            StatusCode::BAD_REQUEST
        } else {
            warn!(error = %format_chain(&err), "search failed");
            StatusCode::INTERNAL_SERVER_ERROR
        };
        AppError {
            status,
            code: err.code(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.code })).into_response()
    }
}

/// Render an error and its sources as `outer: inner: root`.
fn format_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /api/search ============

/// Query parameters of `GET /api/search`.
///
/// Collected from raw pairs so that every malformed `page` (non-integer or
/// repeated) maps to `invalid_paging` rather than Axum's own rejection.
/// A repeated `q` keeps its first value.
#[derive(Debug, Default, PartialEq)]
struct SearchParams {
    q: Option<String>,
    page: i64,
}

impl SearchParams {
    fn from_pairs(pairs: Vec<(String, String)>) -> Result<Self, AppError> {
        let mut q = None;
        let mut page = None;
        for (key, value) in pairs {
            match key.as_str() {
                "q" => {
                    q.get_or_insert(value);
                }
                "page" => {
                    if page.is_some() {
                        return Err(AppError::invalid_paging());
                    }
                    page = Some(value);
                }
                _ => {}
            }
        }
        Ok(SearchParams {
            q,
            page: parse_page(page.as_deref())?,
        })
    }
}

fn parse_page(raw: Option<&str>) -> Result<i64, AppError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(1),
        Some(s) => s.parse::<i64>().map_err(|_| AppError::invalid_paging()),
    }
}

async fn handle_search(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<SearchPage>, AppError> {
    let params = SearchParams::from_pairs(pairs)?;

    let mut request = SearchRequest::new(params.q.as_deref(), params.page);
    request.page_size = state.page_size;

    let result = search::search(state.store.as_ref(), &request).await?;
    Ok(Json(result))
}
