//! Session registry — the session-id → participant-pair table.
//!
//! Registered when a booking goes live, consulted by every settlement path,
//! removed only after settlement succeeds. A mapping that outlives its TTL
//! without ever being terminated is leaked state (client crashed before
//! either side reported anything) and is purged by the background loop.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;

use glossa_core::SessionMapping;

/// Shared handle to the mapping table. Cheap to clone.
pub struct SessionRegistry {
    mappings: Arc<DashMap<String, SessionMapping>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            mappings: Arc::new(DashMap::new()),
        }
    }

    /// Insert or replace the mapping for a room. Re-registration is routine:
    /// clients retry the call after reconnects.
    pub fn register(&self, mapping: SessionMapping) {
        let replaced = self
            .mappings
            .insert(mapping.session_id.clone(), mapping.clone())
            .is_some();
        tracing::info!(
            session_id = %mapping.session_id,
            tutor = %mapping.tutor,
            student = %mapping.student,
            language_id = mapping.language_id,
            replaced,
            "session registered"
        );
    }

    pub fn get(&self, session_id: &str) -> Option<SessionMapping> {
        self.mappings.get(session_id).map(|m| m.clone())
    }

    /// Remove a settled (or abandoned) mapping.
    pub fn remove(&self, session_id: &str) -> Option<SessionMapping> {
        let removed = self.mappings.remove(session_id).map(|(_, m)| m);
        if removed.is_some() {
            tracing::debug!(session_id, "session mapping removed");
        }
        removed
    }

    /// Rooms a participant currently appears in.
    pub fn sessions_for(&self, address: &glossa_core::Address) -> Vec<SessionMapping> {
        self.mappings
            .iter()
            .filter(|e| e.tutor == *address || e.student == *address)
            .map(|e| e.value().clone())
            .collect()
    }

    pub fn list(&self) -> Vec<SessionMapping> {
        self.mappings.iter().map(|e| e.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Drop mappings registered more than `ttl_secs` ago. Returns how many
    /// went. `now_epoch` is passed in so the sweep is testable.
    pub fn purge_older_than(&self, now_epoch: u64, ttl_secs: u64) -> usize {
        if ttl_secs == 0 {
            return 0;
        }
        let before = self.mappings.len();
        self.mappings
            .retain(|_, m| now_epoch.saturating_sub(m.started_at) < ttl_secs);
        let purged = before - self.mappings.len();
        if purged > 0 {
            tracing::warn!(purged, "purged abandoned session mappings");
        }
        purged
    }
}

impl Clone for SessionRegistry {
    fn clone(&self) -> Self {
        Self {
            mappings: self.mappings.clone(),
        }
    }
}

/// Background purge. Runs until shutdown is signalled.
pub async fn purge_loop(
    registry: SessionRegistry,
    interval_secs: u64,
    ttl_secs: u64,
    mut shutdown: broadcast::Receiver<()>,
) {
    if ttl_secs == 0 {
        // TTL disabled. Park until shutdown so the daemon's task watcher
        // does not mistake this for a crashed loop.
        tracing::debug!("mapping TTL disabled; registry purge idle");
        let _ = shutdown.recv().await;
        return;
    }
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs.max(1)));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let now = chrono::Utc::now().timestamp().max(0) as u64;
                registry.purge_older_than(now, ttl_secs);
            }
            _ = shutdown.recv() => {
                tracing::debug!("registry purge loop stopped");
                return;
            }
        }
    }
}
