//! /tutors, /students, /registrations, /cache handlers — ledger profile reads
//! and cache control.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use glossa_services::{DataSource, StudentProfile, TutorProfile};

use super::{ledger_error, parse_address, ApiState};

// ── /tutors/:address (GET) ────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct TutorProfileResponse {
    #[serde(flatten)]
    pub profile: TutorProfile,
    pub source: DataSource,
}

pub async fn handle_tutor_profile(
    State(state): State<ApiState>,
    Path(address): Path<String>,
) -> Result<Json<TutorProfileResponse>, (StatusCode, String)> {
    let address = parse_address(&address)?;
    let (profile, source) = state
        .ledger
        .tutor_profile(&address)
        .await
        .map_err(ledger_error)?
        .ok_or((StatusCode::NOT_FOUND, "tutor not registered".to_string()))?;
    Ok(Json(TutorProfileResponse { profile, source }))
}

// ── /students/:address (GET) ──────────────────────────────────────────────────

#[derive(Serialize)]
pub struct StudentProfileResponse {
    #[serde(flatten)]
    pub profile: StudentProfile,
    pub source: DataSource,
}

pub async fn handle_student_profile(
    State(state): State<ApiState>,
    Path(address): Path<String>,
) -> Result<Json<StudentProfileResponse>, (StatusCode, String)> {
    let address = parse_address(&address)?;
    let (profile, source) = state
        .ledger
        .student_profile(&address)
        .await
        .map_err(ledger_error)?
        .ok_or((StatusCode::NOT_FOUND, "student not registered".to_string()))?;
    Ok(Json(StudentProfileResponse { profile, source }))
}

// ── /registrations/:address/invalidate (POST) ─────────────────────────────────

#[derive(Serialize)]
pub struct InvalidateResponse {
    pub address: String,
    pub invalidated: bool,
}

pub async fn handle_registration_invalidate(
    State(state): State<ApiState>,
    Path(address): Path<String>,
) -> Result<Json<InvalidateResponse>, (StatusCode, String)> {
    let address = parse_address(&address)?;
    let invalidated = state.ledger.invalidate(&address);
    Ok(Json(InvalidateResponse {
        address: address.as_str().to_string(),
        invalidated,
    }))
}

// ── /cache/flush (POST) ───────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct FlushResponse {
    pub flushed: usize,
}

pub async fn handle_cache_flush(State(state): State<ApiState>) -> Json<FlushResponse> {
    let flushed = state.ledger.flush_cache();
    tracing::info!(flushed, "profile cache flushed via API");
    Json(FlushResponse { flushed })
}
