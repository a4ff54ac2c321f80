//! Notification fan-out.
//!
//! One live channel per wallet address. A participant's client registers on
//! connect and receives settlement summaries pushed by the terminator; a
//! newer connection for the same address supersedes the old one, which is
//! told why before it is dropped. Delivery is fire-and-forget: an offline
//! participant costs a log line, never a failed settlement.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;

use glossa_core::{Address, Role, SettlementSummary};

/// Push message delivered over a participant's channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum Notification {
    /// The session this participant was in has settled.
    #[serde(rename = "session-ended")]
    SessionEnded {
        role: Role,
        /// "earnings" on the tutor side, "cost" on the student side.
        amount_label: &'static str,
        summary: SettlementSummary,
    },
    /// Another connection registered for the same address.
    #[serde(rename = "connection-superseded")]
    ConnectionSuperseded,
}

struct Channel {
    id: u64,
    tx: mpsc::UnboundedSender<Notification>,
}

pub struct Notifier {
    channels: Arc<DashMap<Address, Channel>>,
    next_id: Arc<AtomicU64>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        Self {
            channels: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Open a channel for `address`, superseding any existing one. The
    /// returned id must be passed back to [`Notifier::unregister`].
    pub fn register(&self, address: Address) -> (u64, mpsc::UnboundedReceiver<Notification>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(old) = self.channels.insert(address.clone(), Channel { id, tx }) {
            let _ = old.tx.send(Notification::ConnectionSuperseded);
            tracing::debug!(address = %address, "notification channel superseded");
        }
        tracing::debug!(address = %address, channel = id, "notification channel opened");
        (id, rx)
    }

    /// Close a channel, but only if it is still the current one for the
    /// address. A connection that was superseded must not tear down its
    /// replacement.
    pub fn unregister(&self, address: &Address, id: u64) {
        let removed = self
            .channels
            .remove_if(address, |_, channel| channel.id == id)
            .is_some();
        if removed {
            tracing::debug!(address = %address, channel = id, "notification channel closed");
        }
    }

    /// Deliver to one address. Returns false when nobody is listening.
    pub fn notify(&self, address: &Address, notification: Notification) -> bool {
        match self.channels.get(address) {
            Some(channel) => channel.tx.send(notification).is_ok(),
            None => false,
        }
    }

    /// Push a settlement summary to both sides of the session. Returns how
    /// many participants were actually reached.
    pub fn fan_out_settlement(&self, summary: &SettlementSummary) -> usize {
        let mut delivered = 0;
        for (address, role) in [
            (&summary.tutor, Role::Tutor),
            (&summary.student, Role::Student),
        ] {
            let notification = Notification::SessionEnded {
                role,
                amount_label: match role {
                    Role::Tutor => "earnings",
                    Role::Student => "cost",
                },
                summary: summary.clone(),
            };
            if self.notify(address, notification) {
                delivered += 1;
            } else {
                tracing::info!(
                    session_id = %summary.session_id,
                    address = %address,
                    role = %role,
                    "participant offline, settlement notice dropped"
                );
            }
        }
        delivered
    }

    pub fn connected(&self) -> usize {
        self.channels.len()
    }
}

impl Clone for Notifier {
    fn clone(&self) -> Self {
        Self {
            channels: self.channels.clone(),
            next_id: self.next_id.clone(),
        }
    }
}
