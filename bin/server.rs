// Tracker Import - Web Server
// REST API with Axum: one metadata snapshot, one store, bundles in over HTTP

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracker_import::{
    logging, ImporterConfig, MetadataSnapshot, SqliteTrackerStore, TrackerBundle, TrackerError,
    TrackerImporter, TrackerStatus,
};

/// Shared application state
#[derive(Clone)]
struct AppState {
    metadata: Arc<MetadataSnapshot>,
    store: Arc<Mutex<SqliteTrackerStore>>,
}

impl AppState {
    fn store(&self) -> Result<MutexGuard<'_, SqliteTrackerStore>, Response> {
        self.store
            .lock()
            .map_err(|_| {
                let message = "store lock poisoned".to_string();
                error_response(StatusCode::INTERNAL_SERVER_ERROR, message)
            })
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

fn error_response(status: StatusCode, message: String) -> Response {
    let body = ApiResponse {
        success: false,
        data: (),
        error: Some(message),
    };
    (status, Json(body)).into_response()
}

/// Malformed input is the caller's fault; everything else is ours
fn tracker_error_response(e: TrackerError) -> Response {
    match e {
        TrackerError::MalformedBundle(_) | TrackerError::Json(_) => {
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
        other => {
            error!(error = %other, "tracker request failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportParams {
    #[serde(default)]
    dry_run: bool,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// POST /api/tracker - Validate and commit a bundle (`?dryRun=true` validates only)
async fn import_bundle(
    State(state): State<AppState>,
    Query(params): Query<ImportParams>,
    Json(bundle): Json<TrackerBundle>,
) -> Response {
    let importer = TrackerImporter::new(&*state.metadata);

    let mut store = match state.store() {
        Ok(store) => store,
        Err(response) => return response,
    };

    if params.dry_run {
        return match importer.validate(&bundle, &*store) {
            Ok(report) => {
                let status = if report.is_valid() { StatusCode::OK } else { StatusCode::CONFLICT };
                (status, Json(ApiResponse::ok(report))).into_response()
            }
            Err(e) => tracker_error_response(e),
        };
    }

    match importer.import(bundle, &mut *store) {
        Ok(report) => {
            let rejected = report
                .bundle_report
                .as_ref()
                .map_or(true, |r| r.status() == TrackerStatus::Error);
            let status = if rejected { StatusCode::CONFLICT } else { StatusCode::OK };
            (status, Json(ApiResponse::ok(report))).into_response()
        }
        Err(e) => tracker_error_response(e),
    }
}

/// GET /api/tracker/counts - Stored rows per entity kind
async fn get_counts(State(state): State<AppState>) -> Response {
    let store = match state.store() {
        Ok(store) => store,
        Err(response) => return response,
    };

    match store.counts() {
        Ok(counts) => (StatusCode::OK, Json(ApiResponse::ok(counts))).into_response(),
        Err(e) => tracker_error_response(e),
    }
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var_os("TRACKER_CONFIG").map(std::path::PathBuf::from);
    let config = ImporterConfig::load(config_path.as_deref())?;
    logging::init(&config.log_filter);
    if let Some(path) = &config_path {
        info!(path = %path.display(), "loaded TOML configuration");
    }

    println!("🌐 Tracker Import - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let metadata = MetadataSnapshot::load(&config.metadata_path)
        .with_context(|| format!("loading metadata {}", config.metadata_path.display()))?;
    println!(
        "✓ Metadata loaded: {} org units, {} programs",
        metadata.org_unit_count(),
        metadata.program_count()
    );

    let store = SqliteTrackerStore::open(&config.database_path)
        .with_context(|| format!("opening {}", config.database_path.display()))?;
    println!("✓ Database opened: {}", config.database_path.display());

    // Create shared state
    let state = AppState {
        metadata: Arc::new(metadata),
        store: Arc::new(Mutex::new(store)),
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/tracker", post(import_bundle))
        .route("/tracker/counts", get(get_counts))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(config.bind_address.as_str())
        .await
        .with_context(|| format!("binding {}", config.bind_address))?;

    info!(address = %config.bind_address, "server listening");
    println!("\n🚀 Server running on http://{}", config.bind_address);
    println!("   POST http://{}/api/tracker", config.bind_address);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
