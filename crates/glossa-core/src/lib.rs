//! glossa-core — shared domain types and configuration.
//! All other Glossa crates depend on this one.

pub mod address;
pub mod config;
pub mod money;
pub mod session;
pub mod settlement;

pub use address::{Address, Role};
pub use config::GlossaConfig;
pub use session::{HistoryEntry, LedgerSession, SessionMapping};
pub use settlement::{
    SettlementMetadata, SettlementSummary, TerminationContext, TerminationRequest, TriggerReason,
};
