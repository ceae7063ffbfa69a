use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/live", get(live))
        .route("/info", get(info))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    database: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    database_latency_ms: Option<u64>,
    timestamp: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LivenessResponse {
    status: &'static str,
    timestamp: String,
    uptime: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthInfoResponse {
    service: &'static str,
    version: &'static str,
    start_time: String,
    uptime: u64,
}

enum DbCheckStatus {
    Connected { latency_ms: u64 },
    Disconnected,
}

async fn root(State(state): State<AppState>) -> Response {
    let db_status = database_check(&state).await;

    let (ok, latency) = match db_status {
        DbCheckStatus::Connected { latency_ms } => (true, Some(latency_ms)),
        DbCheckStatus::Disconnected => (false, None),
    };

    let response = HealthResponse {
        status: if ok { "ok" } else { "degraded" },
        database: if ok { "connected" } else { "disconnected" },
        database_latency_ms: latency,
        timestamp: now_iso(),
    };

    let status_code = if ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(response)).into_response()
}

async fn live(State(state): State<AppState>) -> Response {
    Json(LivenessResponse {
        status: "healthy",
        timestamp: now_iso(),
        uptime: state.uptime_seconds(),
    })
    .into_response()
}

async fn info(State(state): State<AppState>) -> Response {
    Json(HealthInfoResponse {
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        start_time: system_time_iso(state.started_at_system()),
        uptime: state.uptime_seconds(),
    })
    .into_response()
}

async fn database_check(state: &AppState) -> DbCheckStatus {
    let Some(store) = state.store() else {
        return DbCheckStatus::Disconnected;
    };

    let started = Instant::now();
    match store.ping().await {
        Ok(()) => DbCheckStatus::Connected {
            latency_ms: started.elapsed().as_millis() as u64,
        },
        Err(err) => {
            tracing::warn!(error = %err, "database health check failed");
            DbCheckStatus::Disconnected
        }
    }
}

fn system_time_iso(time: std::time::SystemTime) -> String {
    let datetime: chrono::DateTime<chrono::Utc> = time.into();
    datetime.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
