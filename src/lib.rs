pub mod types;
pub mod config;
pub mod error;
pub mod scoring;
pub mod bracket;
pub mod placement;
pub mod store;
pub mod locks;
pub mod events;
pub mod engine;
pub mod views;

use types::*;
use config::*;
use engine::CompetitionEngine;
use error::Error;
use store::InMemoryMatchStore;

use std::{fs, path::PathBuf, sync::Arc};

use axum::{
    extract::{Path as AxumPath, State as AxumState},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, get_service, post},
    Json, Router,
};
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// ── HTTP helpers ───────────────────────────────────────────────────────

fn error_status(err: &Error) -> StatusCode {
    match err {
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::Conflict(_) => StatusCode::CONFLICT,
        Error::Precondition(_) => StatusCode::PRECONDITION_FAILED,
        Error::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn json_no_store<T: serde::Serialize>(payload: &T) -> Response {
    let body = serde_json::to_string(payload).unwrap_or_else(|_| "{}".to_string());
    (
        [
            ("Content-Type", "application/json"),
            ("Cache-Control", "no-store"),
            ("Pragma", "no-cache"),
            ("Expires", "0"),
        ],
        body,
    )
        .into_response()
}

fn respond<T: serde::Serialize>(result: error::Result<T>) -> Response {
    match result {
        Ok(payload) => json_no_store(&payload),
        Err(err) => (error_status(&err), err.to_string()).into_response(),
    }
}

// ── Read-side handlers ─────────────────────────────────────────────────

async fn get_bracket_json(
    AxumPath(competition_id): AxumPath<String>,
    AxumState(engine): AxumState<SharedEngine>,
) -> Response {
    let result = engine.competition(&competition_id).and_then(|meta| {
        let matches = engine.matches(&competition_id)?;
        Ok(views::bracket_view(
            &competition_id,
            &meta.name,
            &matches,
            &meta.contestant_map(),
        ))
    });
    respond(result)
}

async fn get_leaderboard_json(
    AxumPath(competition_id): AxumPath<String>,
    AxumState(engine): AxumState<SharedEngine>,
) -> Response {
    let result = engine.competition(&competition_id).and_then(|meta| {
        let placements = engine.placements(&competition_id)?;
        Ok(views::leaderboard_view(
            &competition_id,
            &placements,
            &meta.contestant_map(),
        ))
    });
    respond(result)
}

async fn get_match_detail_json(
    AxumPath((competition_id, match_id)): AxumPath<(String, u64)>,
    AxumState(engine): AxumState<SharedEngine>,
) -> Response {
    let result = engine.competition(&competition_id).and_then(|meta| {
        let m = engine.get_match(&competition_id, match_id)?;
        Ok(views::match_detail_view(&m, &meta.contestant_map()))
    });
    respond(result)
}

// ── Judge and admin handlers ───────────────────────────────────────────

async fn post_run(
    AxumPath(competition_id): AxumPath<String>,
    AxumState(engine): AxumState<SharedEngine>,
    Json(input): Json<RunInput>,
) -> Response {
    let result = match engine.record_run(&competition_id, input).await {
        Ok(m) => engine
            .competition(&competition_id)
            .map(|meta| views::match_detail_view(&m, &meta.contestant_map())),
        Err(err) => Err(err),
    };
    respond(result)
}

async fn post_winner_override(
    AxumPath((competition_id, match_id)): AxumPath<(String, u64)>,
    AxumState(engine): AxumState<SharedEngine>,
    Json(input): Json<WinnerOverrideInput>,
) -> Response {
    let result = match engine
        .override_winner(&competition_id, match_id, input.winner_id)
        .await
    {
        Ok(m) => engine
            .competition(&competition_id)
            .map(|meta| views::match_detail_view(&m, &meta.contestant_map())),
        Err(err) => Err(err),
    };
    respond(result)
}

async fn post_rebuild(
    AxumPath(competition_id): AxumPath<String>,
    AxumState(engine): AxumState<SharedEngine>,
) -> Response {
    let result = engine.rebuild_bracket(&competition_id).and_then(|matches| {
        let meta = engine.competition(&competition_id)?;
        Ok(views::bracket_view(
            &competition_id,
            &meta.name,
            &matches,
            &meta.contestant_map(),
        ))
    });
    respond(result)
}

// ── Routers and servers ────────────────────────────────────────────────

fn api_router(engine: SharedEngine) -> Router {
    Router::new()
        .route("/competitions/:competition_id/bracket.json", get(get_bracket_json))
        .route(
            "/competitions/:competition_id/leaderboard.json",
            get(get_leaderboard_json),
        )
        .route(
            "/competitions/:competition_id/matches/:match_id",
            get(get_match_detail_json),
        )
        .route("/competitions/:competition_id/runs", post(post_run))
        .route(
            "/competitions/:competition_id/matches/:match_id/winner",
            post(post_winner_override),
        )
        .route("/competitions/:competition_id/rebuild", post(post_rebuild))
        .with_state(engine)
}

/// Read-only surface for OBS pages: the static overlay files plus the same
/// no-store JSON projections they poll.
fn overlay_router(engine: SharedEngine, static_dir: PathBuf) -> Router {
    let static_files = get_service(ServeDir::new(static_dir));
    Router::new()
        .route("/competitions/:competition_id/bracket.json", get(get_bracket_json))
        .route(
            "/competitions/:competition_id/leaderboard.json",
            get(get_leaderboard_json),
        )
        .nest_service("/", static_files)
        .with_state(engine)
}

async fn start_server(app: Router, addr: String, label: &'static str) {
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("{label} server failed to bind {addr}: {e}");
            return;
        }
    };
    info!("{label} server listening at http://{addr}/");
    if let Err(e) = axum::serve(listener, app).await {
        error!("{label} server error: {e}");
    }
}

fn seed_competition_from_roster(engine: &SharedEngine, roster: RosterConfig) {
    let competition_id = roster.competition_id.clone();
    let contestants: Vec<Contestant> = roster
        .contestants
        .into_iter()
        .map(|c| c.into_contestant())
        .collect();
    if let Err(e) = engine.register_competition(&competition_id, &roster.name, contestants) {
        error!("Failed to register competition {competition_id}: {e}");
        return;
    }
    match engine.build_bracket(&competition_id) {
        Ok(matches) => info!(
            "Seeded {competition_id} with {} first-round matches",
            matches.len()
        ),
        Err(e) => error!("Failed to build bracket for {competition_id}: {e}"),
    }
}

// ── Entry point ────────────────────────────────────────────────────────

pub async fn run() {
    load_env_file();

    // Initialize tracing with daily rolling file output
    let logs_dir = repo_root().join("logs");
    fs::create_dir_all(&logs_dir).ok();
    let file_appender = tracing_appender::rolling::daily(&logs_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();
    info!("Wallscore starting");

    let config = load_config_inner().unwrap_or_else(|e| {
        error!("Falling back to default config: {e}");
        AppConfig::default()
    });
    log_env_warnings(&config);

    let store = Arc::new(InMemoryMatchStore::new());
    let engine: SharedEngine =
        Arc::new(CompetitionEngine::new(store).with_judge_log(config.judge_log));

    if !config.roster_path.trim().is_empty() {
        match load_roster_from(&config.roster_path) {
            Ok(roster) => seed_competition_from_roster(&engine, roster),
            Err(e) => error!("Failed to load roster: {e}"),
        }
    }

    let overlay_dir = resolve_repo_path(&config.overlay_dir);
    fs::create_dir_all(&overlay_dir).ok();

    let api_task = tokio::spawn(start_server(
        api_router(engine.clone()),
        config.api_addr.clone(),
        "API",
    ));
    let overlay_task = tokio::spawn(start_server(
        overlay_router(engine, overlay_dir),
        config.overlay_addr.clone(),
        "Overlay",
    ));
    let _ = tokio::join!(api_task, overlay_task);
}
