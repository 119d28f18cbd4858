mod config;
mod cookies;
mod error;
mod formats;
mod input;
mod retry;
mod ytdlp;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Json, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use config::Settings;
use cookies::CookieJar;
use error::ApiError;
use formats::{DownloadResponse, VideoInfo};
use input::DownloadQuery;
use retry::RetryPolicy;
use ytdlp::{Extractor, YtDlp};

// ============= Application State =============

#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub extractor: Arc<dyn Extractor>,
    pub cookies: Arc<CookieJar>,
    pub retry: RetryPolicy,
}

impl AppState {
    pub fn new(settings: Settings, extractor: Arc<dyn Extractor>, cookies: Arc<CookieJar>) -> Self {
        let retry = RetryPolicy::new(
            settings.max_attempts,
            Duration::from_secs(settings.backoff_base),
        );
        Self {
            settings,
            extractor,
            cookies,
            retry,
        }
    }
}

// ============= Handlers =============

/// GET /download — Resolve a video id or URL into a direct stream URL
async fn download_handler(
    State(state): State<AppState>,
    query: Result<Query<DownloadQuery>, QueryRejection>,
) -> Result<Json<DownloadResponse>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::InvalidInput(e.body_text()))?;
    let target = input::normalize(&query)?;

    info!("Extracting {}", target.watch_url);
    let info = fetch_video_info(&state, &target.watch_url).await?;

    let best = formats::select_best(&info.formats, state.settings.max_height)
        .ok_or(ApiError::NoSuitableFormat)?;
    info!(
        "Selected format {} ({}p, {}) for {}",
        best.format_id.as_deref().unwrap_or("?"),
        best.height.unwrap_or(0),
        best.ext.as_deref().unwrap_or("?"),
        target.video_id
    );

    DownloadResponse::from_selection(&info, best)
        .map(Json)
        .ok_or(ApiError::NoSuitableFormat)
}

/// GET /debug — Cookie loading diagnostics
async fn debug_handler(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let cookies = state.cookies.clone();
    let extractor = state.extractor.clone();
    let (report, version) =
        tokio::task::spawn_blocking(move || (cookies.report(), extractor.version()))
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(serde_json::json!({
        "cookies": report,
        "yt_dlp_version": version,
        "extraction": {
            "max_attempts": state.retry.max_attempts,
            "backoff_base_secs": state.settings.backoff_base,
            "timeout_secs": state.settings.ytdlp_timeout,
            "max_height": state.settings.max_height,
        },
        "checked_at": chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
    })))
}

/// GET / — Liveness
async fn home_handler() -> &'static str {
    "YouTube Downloader API is running!"
}

/// 404 handler
async fn not_found_handler() -> ApiError {
    ApiError::RouteNotFound
}

// ============= Core Logic =============

/// Run yt-dlp with retry/backoff. The error of the final attempt is surfaced.
async fn fetch_video_info(state: &AppState, url: &str) -> Result<VideoInfo, ApiError> {
    let cookie_file = state.cookies.cookie_file();
    let timeout = state.settings.extraction_timeout();

    state
        .retry
        .run(|_attempt| ytdlp::extract_once(state.extractor.clone(), url, cookie_file, timeout))
        .await
        .map_err(|e| ApiError::Extraction(e.to_string()))
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/", get(home_handler))
        .route("/download", get(download_handler))
        .route("/debug", get(debug_handler))
        .fallback(not_found_handler)
        .layer(cors)
        .with_state(state)
}

// ============= Main =============

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::from_env();

    info!("Starting server on port {}", settings.port);
    info!(
        "Extraction: {} attempts, {}s backoff base, {}s timeout, max height {}p",
        settings.max_attempts, settings.backoff_base, settings.ytdlp_timeout, settings.max_height
    );

    let cookies = Arc::new(CookieJar::new(
        settings.cookies_b64.clone(),
        settings.cookies_path.clone(),
    ));
    // Materialize the cookie file once, before the first request needs it.
    if cookies.cookie_file().is_none() && settings.cookies_b64.is_some() {
        warn!("Continuing without cookies");
    }

    let extractor: Arc<dyn Extractor> = Arc::new(YtDlp::new(settings.socket_timeout));
    let probe = extractor.clone();
    match tokio::task::spawn_blocking(move || probe.version()).await {
        Ok(Some(version)) => info!("yt-dlp {version} loaded"),
        _ => warn!("yt-dlp could not be imported; /download will fail until it is installed"),
    }

    let port = settings.port;
    let app = build_router(AppState::new(settings, extractor, cookies));

    let addr = format!("0.0.0.0:{port}");
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind {addr}: {e}");
            std::process::exit(1);
        }
    };

    info!("🚀 ytlink listening on {addr}");
    info!("   Extraction: yt-dlp via PyO3");

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {e}");
        std::process::exit(1);
    }
}
