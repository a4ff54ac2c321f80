//! /sessions handlers — registration, inspection, and termination.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use glossa_core::{
    Address, SessionMapping, SettlementSummary, TerminationContext, TerminationRequest,
};

use super::{terminate_error, ApiState};

// ── /sessions (POST) ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterSessionRequest {
    pub session_id: String,
    pub student_address: Address,
    pub tutor_address: Address,
    pub language_id: u32,
    /// Unix seconds; defaults to now when the client does not report it.
    #[serde(default)]
    pub started_at: Option<u64>,
    #[serde(default)]
    pub student_endpoint: Option<String>,
    #[serde(default)]
    pub tutor_endpoint: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterSessionResponse {
    pub session_id: String,
    pub registered: bool,
    pub replaced: bool,
}

pub async fn handle_session_register(
    State(state): State<ApiState>,
    Json(req): Json<RegisterSessionRequest>,
) -> Result<Json<RegisterSessionResponse>, (StatusCode, String)> {
    if req.session_id.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "sessionId must not be empty".to_string(),
        ));
    }
    if req.student_address.is_empty() || req.tutor_address.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "studentAddress and tutorAddress are required".to_string(),
        ));
    }
    if req.student_address == req.tutor_address {
        return Err((
            StatusCode::BAD_REQUEST,
            "student and tutor must differ".to_string(),
        ));
    }

    let session_id = req.session_id.trim().to_string();
    let replaced = state.registry.get(&session_id).is_some();
    state.registry.register(SessionMapping {
        session_id: session_id.clone(),
        student: req.student_address,
        tutor: req.tutor_address,
        language_id: req.language_id,
        started_at: req
            .started_at
            .unwrap_or_else(|| chrono::Utc::now().timestamp().max(0) as u64),
        student_endpoint: req.student_endpoint,
        tutor_endpoint: req.tutor_endpoint,
    });

    Ok(Json(RegisterSessionResponse {
        session_id,
        registered: true,
        replaced,
    }))
}

// ── /sessions (GET) ───────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionListResponse {
    pub sessions: Vec<SessionMapping>,
}

pub async fn handle_session_list(State(state): State<ApiState>) -> Json<SessionListResponse> {
    Json(SessionListResponse {
        sessions: state.registry.list(),
    })
}

// ── /sessions/:id (GET) ───────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInspectResponse {
    #[serde(flatten)]
    pub mapping: SessionMapping,
    pub age_secs: u64,
    /// Participants the liveness table currently sees in the room.
    pub present: usize,
}

pub async fn handle_session_inspect(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionInspectResponse>, (StatusCode, String)> {
    let mapping = state
        .registry
        .get(&session_id)
        .ok_or((StatusCode::NOT_FOUND, "session not found".to_string()))?;

    let now = chrono::Utc::now().timestamp().max(0) as u64;
    let present = state.liveness.present(&session_id);

    Ok(Json(SessionInspectResponse {
        age_secs: now.saturating_sub(mapping.started_at),
        mapping,
        present,
    }))
}

// ── /sessions/:id/end (POST) ──────────────────────────────────────────────────

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct EndSessionRequest {
    /// Address of the requesting participant, or "system".
    pub initiated_by: Option<String>,
    #[serde(flatten)]
    pub context: TerminationContext,
}

pub async fn handle_session_end(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
    Json(req): Json<EndSessionRequest>,
) -> Result<Json<SettlementSummary>, (StatusCode, String)> {
    let summary = state
        .terminator
        .terminate(TerminationRequest {
            session_id,
            initiated_by: req.initiated_by.map(|s| normalize_initiator(&s)),
            context: req.context,
        })
        .await
        .map_err(terminate_error)?;
    Ok(Json(summary))
}

/// Initiators are either the literal "system" or a wallet address; addresses
/// get the usual case normalization so the summary echoes them canonically.
fn normalize_initiator(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("system") {
        "system".to_string()
    } else {
        Address::new(trimmed).as_str().to_string()
    }
}

// ── /sessions/:id/ledger-ended (POST) ─────────────────────────────────────────

pub async fn handle_session_ledger_ended(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
    Json(req): Json<EndSessionRequest>,
) -> Result<Json<SettlementSummary>, (StatusCode, String)> {
    let summary = state
        .terminator
        .confirm_ledger_end(
            &session_id,
            req.initiated_by.map(|s| normalize_initiator(&s)),
            req.context,
        )
        .await
        .map_err(terminate_error)?;
    Ok(Json(summary))
}
