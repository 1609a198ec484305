//! HTTP server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/sites` | Configured sites (admin) |
//! | `GET`/`POST` | `/search` | Full-text search (`query`, `sites`, `order`, `limit`) |
//! | `POST` | `/reconcile` | Reconcile one site (`site`, `force`, `dry_run`) (admin) |
//!
//! Parameters come from the query string or a JSON body (see
//! [`crate::params`]).
//!
//! # Authorization
//!
//! When `server.admin_token_env` is set, `/sites` and `/reconcile` require
//! `Authorization: Bearer <admin token>`. A site with `read_token_env` can
//! only be searched with its read token or the admin token; a request
//! naming such a site without one is rejected with 401. Sites without a
//! read token are public.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "invalid_scope", "message": "unknown site(s) specified: x" } }
//! ```
//!
//! | Code | Status |
//! |------|--------|
//! | `bad_request`, `invalid_scope` | 400 |
//! | `unauthorized` | 401 |
//! | `source_error`, `partial_index_failure` | 502 |
//! | `transient` | 503 |
//! | `index_error`, `internal` | 500 |
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use anyhow::{bail, Context};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use docsync_core::error::SyncError;
use docsync_core::SyncReport;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::config::Config;
use crate::params::{ParamError, ParamResolver};
use crate::search::{self, SearchHit, SearchOrder};
use crate::{db, ingest, migrate, sites};

type HmacSha256 = Hmac<Sha256>;

const TOKEN_KEY: &[u8] = b"docsync bearer token";

/// Bearer tokens the server accepts, resolved once at startup.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    /// Required for `/sites` and `/reconcile` when set.
    pub admin: Option<String>,
    /// Site name → read token for `/search`.
    pub readers: HashMap<String, String>,
}

impl Credentials {
    /// Read every configured token from the environment. A configured
    /// variable that is missing or blank is an error.
    pub fn from_env(config: &Config) -> anyhow::Result<Self> {
        let admin = match &config.server.admin_token_env {
            Some(var) => Some(read_token("server.admin_token_env", var)?),
            None => None,
        };
        let mut readers = HashMap::new();
        for (name, site) in &config.sites {
            if let Some(var) = &site.read_token_env {
                let key = format!("sites.{}.read_token_env", name);
                readers.insert(name.clone(), read_token(&key, var)?);
            }
        }
        Ok(Self { admin, readers })
    }
}

fn read_token(key: &str, var: &str) -> anyhow::Result<String> {
    match std::env::var(var) {
        Ok(token) if !token.trim().is_empty() => Ok(token),
        _ => bail!("{} is set but {} is empty or missing", key, var),
    }
}

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    pool: SqlitePool,
    credentials: Arc<Credentials>,
}

impl AppState {
    pub fn new(config: Arc<Config>, pool: SqlitePool, credentials: Credentials) -> Self {
        Self {
            config,
            pool,
            credentials: Arc::new(credentials),
        }
    }
}

/// Starts the HTTP server on `[server].bind` and serves until the process
/// is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let credentials = Credentials::from_env(config)?;

    let pool = db::connect(config).await?;
    migrate::create_schema(&pool).await?;

    let bind_addr = config.server.bind.clone();
    let app = router(AppState::new(Arc::new(config.clone()), pool, credentials));

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    info!(addr = %bind_addr, sites = config.sites.len(), "server listening");
    println!("docsync server listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/sites", get(handle_sites))
        .route("/search", get(handle_search).post(handle_search))
        .route("/reconcile", post(handle_reconcile))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Error type that converts into an Axum HTTP response.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<ParamError> for AppError {
    fn from(e: ParamError) -> Self {
        AppError::new(StatusCode::BAD_REQUEST, "bad_request", e.to_string())
    }
}

impl From<&SyncError> for AppError {
    fn from(e: &SyncError) -> Self {
        let (status, code) = match e {
            SyncError::InvalidScope(_) => (StatusCode::BAD_REQUEST, "invalid_scope"),
            SyncError::TransientFetch { .. } => (StatusCode::SERVICE_UNAVAILABLE, "transient"),
            SyncError::PartialIndexFailure { .. } => (StatusCode::BAD_GATEWAY, "partial_index_failure"),
            SyncError::Source(_) => (StatusCode::BAD_GATEWAY, "source_error"),
            SyncError::Index(_) => (StatusCode::INTERNAL_SERVER_ERROR, "index_error"),
        };
        AppError::new(status, code, e.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        match e.downcast_ref::<SyncError>() {
            Some(sync_err) => AppError::from(sync_err),
            None => AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", format!("{:#}", e)),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============ GET /sites ============

#[derive(Serialize)]
struct SiteInfo {
    name: String,
    source: &'static str,
    location: String,
}

#[derive(Serialize)]
struct SitesResponse {
    sites: Vec<SiteInfo>,
}

async fn handle_sites(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<SitesResponse>, AppError> {
    authorize(&state, &headers)?;
    let sites = state
        .config
        .sites
        .iter()
        .map(|(name, site)| SiteInfo {
            name: name.clone(),
            source: site.source_kind().as_str(),
            location: site.location(),
        })
        .collect();
    Ok(Json(SitesResponse { sites }))
}

// ============ GET|POST /search ============

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<SearchHit>,
}

async fn handle_search(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SearchResponse>, AppError> {
    let params = ParamResolver::new(query, &body)?;
    let text = params.string("query")?.unwrap_or_else(|| "*".to_string());
    let sites = params.list("sites")?;
    if !sites.is_empty() {
        sites::ensure_known(&state.config, &sites).map_err(|e| AppError::from(&e))?;
        authorize_read(&state, &headers, &sites)?;
    }
    let order = match params.string("order")? {
        Some(o) => o.parse::<SearchOrder>().map_err(|e| AppError::from(&e))?,
        None => SearchOrder::default(),
    };
    let limit = params.int("limit")?.unwrap_or(search::DEFAULT_LIMIT);

    let results = search::search_documents(&state.config, &state.pool, &text, &sites, order, limit).await?;
    Ok(Json(SearchResponse { results }))
}

// ============ POST /reconcile ============

#[derive(Serialize)]
struct ReconcileResponse {
    site: String,
    #[serde(flatten)]
    report: SyncReport,
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Compare tokens in constant time.
fn token_matches(expected: &str, provided: &str) -> bool {
    let tag = |token: &str| HmacSha256::new_from_slice(TOKEN_KEY).map(|mac| mac.chain_update(token.as_bytes()));
    match (tag(expected), tag(provided)) {
        (Ok(expected), Ok(provided)) => provided.verify_slice(&expected.finalize().into_bytes()).is_ok(),
        _ => false,
    }
}

fn is_admin(state: &AppState, provided: Option<&str>) -> bool {
    match (&state.credentials.admin, provided) {
        (Some(expected), Some(provided)) => token_matches(expected, provided),
        _ => false,
    }
}

/// Admin-only endpoints. Open when no admin token is configured.
fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    if state.credentials.admin.is_none() || is_admin(state, bearer(headers)) {
        Ok(())
    } else {
        Err(AppError::new(StatusCode::UNAUTHORIZED, "unauthorized", "missing or invalid bearer token"))
    }
}

/// Every requested site must be public or readable with the presented
/// token.
fn authorize_read(state: &AppState, headers: &HeaderMap, sites: &[String]) -> Result<(), AppError> {
    let provided = bearer(headers);
    if is_admin(state, provided) {
        return Ok(());
    }
    let denied: Vec<&str> = sites
        .iter()
        .filter(|site| match state.credentials.readers.get(site.as_str()) {
            None => false,
            Some(expected) => !provided.is_some_and(|p| token_matches(expected, p)),
        })
        .map(String::as_str)
        .collect();
    if denied.is_empty() {
        return Ok(());
    }
    warn!(sites = %denied.join(", "), "search denied");
    Err(AppError::new(
        StatusCode::UNAUTHORIZED,
        "unauthorized",
        format!("not authorized to read site(s): {}", denied.join(", ")),
    ))
}

async fn handle_reconcile(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ReconcileResponse>, AppError> {
    authorize(&state, &headers)?;

    let params = ParamResolver::new(query, &body)?;
    let site = params
        .string("site")?
        .ok_or_else(|| AppError::new(StatusCode::BAD_REQUEST, "bad_request", "parameter 'site' is required"))?;
    let force = params.bool("force")?.unwrap_or(false);
    let dry_run = params.bool("dry_run")?.unwrap_or(false);

    let report = ingest::reconcile_site(&state.config, &state.pool, &site, force, dry_run)
        .await
        .map_err(|e| {
            warn!(site = %site, error = %e, "reconcile request failed");
            AppError::from(e)
        })?;
    Ok(Json(ReconcileResponse { site, report }))
}
