// Fleet Sync - Trigger Server
// POST /api/update runs the sync pipeline on demand (dashboard "refresh" button)

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use chrono::Local;
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeFile;
use tracing::{error, info, warn};

use fleet_sync::{logging, LogFormat, Pipeline, RunMode, RunReport, SyncConfig};

#[derive(Parser, Debug)]
#[command(name = "fleet-sync-server", version, about = "HTTP trigger for fleet-sync")]
struct Cli {
    /// Listen address
    #[arg(long = "listen", env = "FLEET_SYNC_LISTEN", default_value = "0.0.0.0:3000")]
    listen: String,

    /// Config file (default: fleet-sync.toml when present)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Triggered runs write locally only
    #[arg(long)]
    local: bool,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    config: Arc<SyncConfig>,
    mode: RunMode,
    /// Held for the duration of a run
    running: Arc<tokio::sync::Mutex<()>>,
    last_run: Arc<Mutex<Option<RunStatus>>>,
}

/// Outcome of the most recent triggered run
#[derive(Clone, Serialize)]
struct RunStatus {
    success: bool,
    finished: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<RunReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    message: String,
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(message: &str, data: T) -> Self {
        Self {
            success: true,
            message: message.to_string(),
            timestamp: Local::now().to_rfc3339(),
            data: Some(data),
            error: None,
        }
    }

    fn err(message: &str, error: String) -> Self {
        Self {
            success: false,
            message: message.to_string(),
            timestamp: Local::now().to_rfc3339(),
            data: None,
            error: Some(error),
        }
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK", fleet_sync::VERSION))
}

/// GET /api/status - Last triggered run
async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    let last = match state.last_run.lock() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    };
    let busy = state.running.try_lock().is_err();
    let message = if busy { "Update in progress" } else { "Idle" };
    Json(ApiResponse::ok(message, last))
}

/// POST /api/update - Run the pipeline now
async fn trigger_update(State(state): State<AppState>) -> impl IntoResponse {
    let Ok(_running) = state.running.clone().try_lock_owned() else {
        warn!("Update requested while a run is active");
        return (
            StatusCode::CONFLICT,
            Json(ApiResponse::<RunReport>::err(
                "Update already in progress",
                "busy".to_string(),
            )),
        );
    };

    info!("Update triggered");
    let config = SyncConfig::clone(&state.config);
    let mode = state.mode;
    let joined = tokio::task::spawn_blocking(move || -> fleet_sync::Result<RunReport> {
        let strict = config.strict_remote;
        let report = Pipeline::from_config(config, mode)?.run()?;
        match report.strict_failure(strict) {
            Some(err) => Err(err),
            None => Ok(report),
        }
    })
    .await;

    let finished = Local::now().to_rfc3339();
    let (status, response, record) = match joined {
        Ok(Ok(report)) => {
            report.log_summary();
            let record = RunStatus {
                success: true,
                finished,
                report: Some(report.clone()),
                error: None,
            };
            (
                StatusCode::OK,
                ApiResponse::ok("Data updated", report),
                record,
            )
        }
        Ok(Err(err)) => {
            error!("Update failed ({}): {}", err.kind(), err);
            let record = RunStatus {
                success: false,
                finished,
                report: None,
                error: Some(err.to_string()),
            };
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiResponse::err("Update failed", format!("{}: {}", err.kind(), err)),
                record,
            )
        }
        Err(join_err) => {
            error!("Update task aborted: {}", join_err);
            let record = RunStatus {
                success: false,
                finished,
                report: None,
                error: Some(join_err.to_string()),
            };
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiResponse::err("Update failed", join_err.to_string()),
                record,
            )
        }
    };

    match state.last_run.lock() {
        Ok(mut guard) => *guard = Some(record),
        Err(poisoned) => *poisoned.into_inner() = Some(record),
    }
    (status, Json(response))
}

fn build_router(state: AppState) -> Router {
    let document = state.config.resolved_output();

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/status", get(get_status))
        .route("/update", post(trigger_update))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .route_service("/data.json", ServeFile::new(document))
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logging::init(cli.log_format, "info");

    println!("🌐 Fleet Sync - Trigger Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = SyncConfig::load(cli.config.as_deref())?;
    config.validate()?;
    let mode = if cli.local {
        RunMode::LocalOnly
    } else {
        RunMode::Full
    };
    info!(
        "Serving {} ({:?} runs)",
        config.resolved_output().display(),
        mode
    );

    let state = AppState {
        config: Arc::new(config),
        mode,
        running: Arc::new(tokio::sync::Mutex::new(())),
        last_run: Arc::new(Mutex::new(None)),
    };
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&cli.listen)
        .await
        .with_context(|| format!("failed to bind {}", cli.listen))?;

    println!("\n🚀 Server running on http://{}", cli.listen);
    println!("   Trigger: POST /api/update");
    println!("   Data:    GET  /data.json");
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
