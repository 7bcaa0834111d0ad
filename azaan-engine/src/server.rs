//! The read-only query interface.
//!
//! `GET /api/prayer-times` reports the live table and a countdown to the next
//! prayer, `GET /api/health` identifies the engine, and everything else is
//! served from the dashboard directory.

use crate::common::{Prayer, TimeOfDay};
use crate::engine::AzaanEngine;
use crate::events::SystemEvent;
use crate::{ENGINE_NAME, VERSION};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use tower_http::services::ServeDir;
use tracing::{error, info, warn};

#[derive(Debug, Serialize)]
pub struct PrayerTimesResponse {
    pub prayer_times: BTreeMap<Prayer, TimeOfDay>,
    pub date: String,
    pub location: String,
    pub next_prayer: NextPrayerResponse,
    /// True when the last daily refresh failed and the table may be old.
    pub stale: bool,
}

#[derive(Debug, Serialize)]
pub struct NextPrayerResponse {
    pub name: Prayer,
    pub time: TimeOfDay,
    pub countdown_seconds: i64,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub simulated_clock: bool,
}

/// Builds the router for the query interface.
pub fn router(engine: AzaanEngine) -> Router {
    let static_dir = engine.config().server.static_dir.clone();
    Router::new()
        .route("/api/prayer-times", get(get_prayer_times))
        .route("/api/health", get(get_health))
        .fallback_service(ServeDir::new(static_dir))
        .with_state(engine)
}

/// Serves the query interface until the engine announces its shutdown.
pub async fn serve(engine: AzaanEngine) -> anyhow::Result<()> {
    let server = &engine.config().server;
    let listener = tokio::net::TcpListener::bind((server.host.as_str(), server.port)).await?;
    let addr: SocketAddr = listener.local_addr()?;
    let mut system_rx = engine.subscribe_system_events();
    let app = router(engine.clone());
    info!("Starting web server on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            while let Ok(event) = system_rx.recv().await {
                if matches!(event, SystemEvent::EngineShutdown) {
                    break;
                }
            }
        })
        .await?;
    info!("Web server stopped.");
    Ok(())
}

async fn get_prayer_times(State(engine): State<AzaanEngine>) -> impl IntoResponse {
    let snapshot = engine.snapshot().await;
    if snapshot.stale {
        warn!("Serving a stale schedule for {}", snapshot.table.date_label());
    }

    let next = match snapshot.next {
        Ok(next) => next,
        Err(e) => {
            error!("Could not resolve the next prayer: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };

    let response = PrayerTimesResponse {
        prayer_times: snapshot.table.iter().collect(),
        date: snapshot.table.date_label().to_string(),
        location: engine.config().location.name.clone(),
        next_prayer: NextPrayerResponse {
            name: next.prayer,
            time: next.time,
            countdown_seconds: next.countdown_seconds(),
        },
        stale: snapshot.stale,
    };
    (StatusCode::OK, Json(response)).into_response()
}

async fn get_health(State(engine): State<AzaanEngine>) -> Json<HealthResponse> {
    Json(HealthResponse {
        name: ENGINE_NAME,
        version: VERSION,
        simulated_clock: engine.clock().is_simulated(),
    })
}
