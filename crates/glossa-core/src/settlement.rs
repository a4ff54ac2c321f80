//! Termination requests and the settlement summaries they produce.
//!
//! Everything here crosses the HTTP boundary, so the wire casing follows the
//! marketplace convention (camelCase) rather than Rust's.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::address::{Address, Role};
use crate::money;

/// What caused a termination to be requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerReason {
    #[serde(rename = "user-action")]
    UserAction,
    #[serde(rename = "all-users-disconnected")]
    AllUsersDisconnected,
    #[serde(rename = "heartbeat-timeout")]
    HeartbeatTimeout,
    #[serde(rename = "ledger-reported")]
    LedgerReported,
}

impl TriggerReason {
    pub fn as_str(self) -> &'static str {
        match self {
            TriggerReason::UserAction => "user-action",
            TriggerReason::AllUsersDisconnected => "all-users-disconnected",
            TriggerReason::HeartbeatTimeout => "heartbeat-timeout",
            TriggerReason::LedgerReported => "ledger-reported",
        }
    }
}

impl fmt::Display for TriggerReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied hints accompanying a termination request.
///
/// Everything is optional; the settlement path only consults these when the
/// ledger cannot answer for itself. Unknown keys are carried through verbatim
/// so they surface again in the summary's metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminationContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Participant the trigger was observed on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<TriggerReason>,

    /// Client-measured call length, used when the ledger reports none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u64>,

    /// Rate hint in minor units per second, used when the ledger read failed.
    #[serde(default, with = "money::amount_opt", skip_serializing_if = "Option::is_none")]
    pub rate_per_second: Option<u128>,

    /// Set once the termination was confirmed against ledger state.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub ledger_verified: bool,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Inbound request to settle and close a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminationRequest {
    pub session_id: String,

    /// Address of the requesting participant, or "system" for sweeps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initiated_by: Option<String>,

    #[serde(default)]
    pub context: TerminationContext,
}

/// Extra detail attached to a settlement summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementMetadata {
    /// Echo of the request context (plus any keys we did not recognize).
    #[serde(flatten)]
    pub context: TerminationContext,

    /// False when settlement figures were estimated rather than read back
    /// from the ledger.
    pub on_ledger: bool,

    /// End-session transaction, when this termination submitted one. Absent
    /// for no-op and estimated settlements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_id: Option<String>,
}

/// Outcome of a completed termination, fanned out to both participants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementSummary {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger_session_id: Option<u64>,

    pub tutor: Address,
    pub student: Address,
    pub language_id: u32,

    pub duration_seconds: u64,

    /// Settled amount in minor units.
    #[serde(with = "money::amount")]
    pub cost_minor_units: u128,
    /// The same amount rendered for display ("1.25").
    pub cost_formatted: String,
    pub currency: String,

    /// RFC 3339 settlement time.
    pub ended_at: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initiated_by: Option<String>,

    pub metadata: SettlementMetadata,
}
