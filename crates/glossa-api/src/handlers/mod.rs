//! HTTP API handlers — exposes daemon state as JSON.

pub mod events;
pub mod profiles;
pub mod sessions;
pub mod status;

use std::sync::Arc;
use std::time::Instant;

use axum::http::StatusCode;

use glossa_core::Address;
use glossa_services::{
    LedgerError, LedgerGateway, LivenessMonitor, LivenessTable, Notifier, SessionRegistry,
    SessionTerminator, TerminateError,
};

#[derive(Clone)]
pub struct ApiState {
    pub registry: SessionRegistry,
    pub ledger: LedgerGateway,
    pub terminator: Arc<SessionTerminator>,
    pub monitor: Arc<LivenessMonitor>,
    pub liveness: LivenessTable,
    pub notifier: Notifier,
    /// Daemon start, for uptime reporting.
    pub started_at: Instant,
    /// Shutdown broadcast sender — signals graceful daemon shutdown.
    pub shutdown_tx: tokio::sync::broadcast::Sender<()>,
}

// ── Shared helpers ────────────────────────────────────────────────────────────

/// Parse a wallet address from a path or query parameter.
fn parse_address(raw: &str) -> Result<Address, (StatusCode, String)> {
    let address = Address::new(raw);
    if address.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "address must not be empty".to_string(),
        ));
    }
    Ok(address)
}

fn terminate_error(err: TerminateError) -> (StatusCode, String) {
    match err {
        TerminateError::SessionNotFound(id) => {
            (StatusCode::NOT_FOUND, format!("session not found: {id}"))
        }
        TerminateError::Ledger(e) => (StatusCode::BAD_GATEWAY, e.to_string()),
    }
}

fn ledger_error(err: LedgerError) -> (StatusCode, String) {
    (StatusCode::BAD_GATEWAY, err.to_string())
}

// Re-export handler functions for use in router setup.
pub use events::{handle_channel, handle_event};
pub use profiles::{
    handle_cache_flush, handle_registration_invalidate, handle_student_profile,
    handle_tutor_profile,
};
pub use sessions::{
    handle_session_end, handle_session_inspect, handle_session_ledger_ended, handle_session_list,
    handle_session_register,
};
pub use status::{handle_shutdown, handle_status};
