//! Escrow ledger access.
//!
//! The marketplace escrow lives in an external backend reached over JSON-RPC.
//! [`LedgerClient`] is the narrow surface the daemon needs from it; the
//! production implementation is [`rpc::RpcLedgerClient`], and tests substitute
//! their own. [`gateway::LedgerGateway`] sits on top and adds caching, health
//! tracking, and the fallback data served when the backend is down.

pub mod gateway;
pub mod rpc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use glossa_core::money;
use glossa_core::{Address, HistoryEntry, LedgerSession};

pub use gateway::{DataSource, LedgerGateway};
pub use rpc::RpcLedgerClient;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Could not reach the backend at all.
    #[error("ledger transport: {0}")]
    Transport(String),
    /// The backend answered and said no.
    #[error("ledger rejected request: {0}")]
    Rejected(String),
    /// No escrow address configured; every call would be meaningless.
    #[error("ledger backend not configured")]
    Unconfigured,
}

impl LedgerError {
    /// True when the failure says nothing about the request itself, only
    /// about our ability to reach the backend. These are the cases fallback
    /// mode may absorb.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, LedgerError::Transport(_) | LedgerError::Unconfigured)
    }
}

/// Receipt for an end-session write.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EndReceipt {
    /// Transaction id the backend reported. Absent when nothing was
    /// submitted (fallback mode, or the session was already closed).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_id: Option<String>,
    /// The session was no longer active, so no write happened.
    pub already_closed: bool,
}

impl EndReceipt {
    pub fn already_closed() -> Self {
        Self {
            tx_id: None,
            already_closed: true,
        }
    }

    /// Whether settlement actually happened on the ledger (now or earlier),
    /// as opposed to being estimated locally.
    pub fn on_ledger(&self) -> bool {
        self.tx_id.is_some() || self.already_closed
    }
}

/// Tutor registration record as the ledger stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TutorProfile {
    pub address: Address,
    pub name: String,
    /// Advertised rate in minor units per second.
    #[serde(with = "money::amount")]
    pub rate_per_second: u128,
    #[serde(default)]
    pub language_ids: Vec<u32>,
    pub is_registered: bool,
}

/// Student registration record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProfile {
    pub address: Address,
    pub name: String,
    pub is_registered: bool,
}

/// What the daemon needs from the escrow backend.
///
/// Active sessions and end-writes are keyed by tutor address: the escrow
/// allows one open session per tutor at a time.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// The tutor's currently open session, if any.
    async fn active_session(&self, tutor: &Address) -> Result<Option<LedgerSession>, LedgerError>;

    /// Settled sessions for a tutor, oldest first.
    async fn session_history(&self, tutor: &Address) -> Result<Vec<HistoryEntry>, LedgerError>;

    /// Close the tutor's open session and release escrowed funds.
    async fn end_session(&self, tutor: &Address) -> Result<EndReceipt, LedgerError>;

    async fn tutor_profile(&self, address: &Address)
        -> Result<Option<TutorProfile>, LedgerError>;

    async fn student_profile(
        &self,
        address: &Address,
    ) -> Result<Option<StudentProfile>, LedgerError>;
}
