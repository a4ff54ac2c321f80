//! /status and /daemon/shutdown handlers.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::ApiState;

// ── /status ──────────────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub uptime_secs: u64,
    pub sessions: Vec<SessionInfo>,
    pub liveness: LivenessInfo,
    pub ledger: LedgerInfo,
    pub notifications: NotificationInfo,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub session_id: String,
    pub tutor: String,
    pub student: String,
    pub language_id: u32,
    pub age_secs: u64,
    pub present: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LivenessInfo {
    pub rooms: usize,
    pub participants: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerInfo {
    pub healthy: bool,
    pub currency: String,
    pub cached_profiles: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationInfo {
    pub connected: usize,
}

pub async fn handle_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    let now = chrono::Utc::now().timestamp().max(0) as u64;
    let sessions = state
        .registry
        .list()
        .into_iter()
        .map(|m| SessionInfo {
            present: state.liveness.present(&m.session_id),
            age_secs: now.saturating_sub(m.started_at),
            session_id: m.session_id,
            tutor: m.tutor.as_str().to_string(),
            student: m.student.as_str().to_string(),
            language_id: m.language_id,
        })
        .collect();

    Json(StatusResponse {
        uptime_secs: state.started_at.elapsed().as_secs(),
        sessions,
        liveness: LivenessInfo {
            rooms: state.liveness.rooms(),
            participants: state.liveness.participants(),
        },
        ledger: LedgerInfo {
            healthy: state.ledger.is_healthy(),
            currency: state.ledger.currency().to_string(),
            cached_profiles: state.ledger.cached_profiles(),
        },
        notifications: NotificationInfo {
            connected: state.notifier.connected(),
        },
    })
}

// ── /daemon/shutdown ──────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ShutdownResponse {
    pub message: String,
}

pub async fn handle_shutdown(State(state): State<ApiState>) -> Json<ShutdownResponse> {
    tracing::info!("shutdown requested via API");
    let _ = state.shutdown_tx.send(());
    Json(ShutdownResponse {
        message: "shutdown initiated".to_string(),
    })
}
