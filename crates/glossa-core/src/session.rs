//! Session records shared across the daemon.
//!
//! Two views of the same session exist: the [`SessionMapping`] the registry
//! holds while a call is live (room id plus who is in it), and the
//! [`LedgerSession`] the escrow backend reports once payment state is
//! involved. Settlement joins the two.

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::money;

/// Registry entry binding a room id to its participants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMapping {
    /// Room identifier the clients share (opaque to the daemon).
    pub session_id: String,

    pub student: Address,
    pub tutor: Address,

    /// Marketplace language offering this session was booked under.
    pub language_id: u32,

    /// Unix seconds at registration time.
    pub started_at: u64,

    /// Signaling endpoints, when the clients reported them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tutor_endpoint: Option<String>,
}

impl SessionMapping {
    pub fn participant_role(&self, who: &Address) -> Option<crate::address::Role> {
        if *who == self.tutor {
            Some(crate::address::Role::Tutor)
        } else if *who == self.student {
            Some(crate::address::Role::Student)
        } else {
            None
        }
    }
}

/// Escrow-side session state as the ledger backend reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSession {
    pub student: Address,
    pub tutor: Address,

    /// Token the escrow is denominated in.
    pub token: Address,

    /// Unix seconds.
    pub start_time: u64,
    /// Unix seconds; zero while the session is still open.
    #[serde(default)]
    pub end_time: u64,

    /// Streaming rate in minor units per second.
    #[serde(with = "money::amount")]
    pub rate_per_second: u128,

    /// Total amount released to the tutor, minor units.
    #[serde(default, with = "money::amount")]
    pub amount_paid: u128,

    pub language_id: u32,

    /// Escrow-side numeric id for this session.
    pub ledger_session_id: u64,

    pub is_active: bool,
}

impl LedgerSession {
    /// Elapsed seconds according to the ledger's own clock. Zero when the
    /// record has no end time yet.
    pub fn duration_secs(&self) -> u64 {
        if self.end_time == 0 {
            return 0;
        }
        self.end_time.saturating_sub(self.start_time)
    }
}

/// One row of a participant's settled-session history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub ledger_session_id: u64,
    pub counterparty: Address,
    pub start_time: u64,
    pub end_time: u64,
    #[serde(with = "money::amount")]
    pub rate_per_second: u128,
    #[serde(with = "money::amount")]
    pub amount_paid: u128,
    pub language_id: u32,
}

impl HistoryEntry {
    pub fn duration_secs(&self) -> u64 {
        self.end_time.saturating_sub(self.start_time)
    }
}
