//! glossa-services — the daemon's working parts: session registry, escrow
//! ledger access, settlement, liveness tracking, and notification fan-out.

pub mod ledger;
pub mod liveness;
pub mod notify;
pub mod registry;
pub mod terminator;

pub use ledger::{
    DataSource, EndReceipt, LedgerClient, LedgerError, LedgerGateway, RpcLedgerClient,
    StudentProfile, TutorProfile,
};
pub use liveness::{LivenessMonitor, LivenessTable};
pub use notify::{Notification, Notifier};
pub use registry::SessionRegistry;
pub use terminator::{SessionTerminator, TerminateError};
