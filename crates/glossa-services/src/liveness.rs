//! Liveness tracking for in-flight sessions.
//!
//! Clients report joins, leaves, and heartbeats. The daemon owes the
//! marketplace one guarantee here: a room everyone has abandoned gets
//! settled, even when no client stays around to ask for it. Two mechanisms
//! deliver that:
//!
//!   * a grace timer armed when the last participant leaves, re-checked at
//!     fire time so a quick reconnect cancels it, and
//!   * a periodic sweep that prunes participants whose heartbeats stopped
//!     (crashed clients never send a leave) and catches empty rooms whose
//!     timer was lost, e.g. across a restart.
//!
//! Timers carry a generation token; any join bumps the generation, which is
//! how a pending timer learns it is stale without being tracked anywhere.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::time::Instant;

use glossa_core::config::LivenessConfig;
use glossa_core::{Address, TerminationContext, TerminationRequest, TriggerReason};

use crate::terminator::{SessionTerminator, TerminateError};

#[derive(Debug)]
struct RoomPresence {
    /// Last heartbeat per participant.
    participants: HashMap<Address, Instant>,
    /// Set while the room has nobody in it.
    empty_since: Option<Instant>,
    /// Bumped on every membership change; stale grace timers detect
    /// themselves by comparing against it.
    generation: u64,
}

/// Presence state, shared between the monitor, the terminator (for cleanup),
/// and the event handlers. Cheap to clone.
pub struct LivenessTable {
    rooms: Arc<DashMap<String, RoomPresence>>,
}

impl Default for LivenessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl LivenessTable {
    pub fn new() -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
        }
    }

    /// A participant joined (or proved liveness for the first time).
    pub fn joined(&self, session_id: &str, address: &Address) {
        let mut room = self
            .rooms
            .entry(session_id.to_string())
            .or_insert_with(|| RoomPresence {
                participants: HashMap::new(),
                empty_since: None,
                generation: 0,
            });
        room.participants.insert(address.clone(), Instant::now());
        room.empty_since = None;
        room.generation += 1;
        tracing::debug!(session_id, address = %address, "participant joined");
    }

    /// Refresh a participant's heartbeat. Unknown participants are added;
    /// a heartbeat is as good a proof of presence as a join.
    pub fn heartbeat(&self, session_id: &str, address: &Address) {
        let mut room = self
            .rooms
            .entry(session_id.to_string())
            .or_insert_with(|| RoomPresence {
                participants: HashMap::new(),
                empty_since: None,
                generation: 0,
            });
        let newcomer = room
            .participants
            .insert(address.clone(), Instant::now())
            .is_none();
        if newcomer {
            room.empty_since = None;
            room.generation += 1;
        }
    }

    /// A participant left. When that empties the room, returns the grace
    /// token a timer must present at fire time.
    pub fn left(&self, session_id: &str, address: &Address) -> Option<u64> {
        let mut room = self.rooms.get_mut(session_id)?;
        if room.participants.remove(address).is_none() {
            return None;
        }
        tracing::debug!(session_id, address = %address, "participant left");
        if room.participants.is_empty() {
            room.generation += 1;
            room.empty_since = Some(Instant::now());
            return Some(room.generation);
        }
        None
    }

    /// Whether the room is still empty and untouched since `generation`.
    pub fn still_empty(&self, session_id: &str, generation: u64) -> bool {
        self.rooms
            .get(session_id)
            .map(|room| room.participants.is_empty() && room.generation == generation)
            .unwrap_or(false)
    }

    /// Drop all presence state for a settled session.
    pub fn forget(&self, session_id: &str) {
        self.rooms.remove(session_id);
    }

    /// One sweep pass: prune participants silent longer than `stale_after`,
    /// and report rooms due for termination with the reason that applies.
    pub fn sweep(&self, stale_after: Duration, grace: Duration) -> Vec<(String, TriggerReason)> {
        let mut due = Vec::new();
        for mut entry in self.rooms.iter_mut() {
            let session_id = entry.key().clone();
            let room = entry.value_mut();

            if room.participants.is_empty() {
                // A lost grace timer (restart, earlier failure) ends here.
                if let Some(since) = room.empty_since {
                    if since.elapsed() >= grace {
                        due.push((session_id, TriggerReason::AllUsersDisconnected));
                    }
                }
                continue;
            }

            let before = room.participants.len();
            room.participants
                .retain(|_, last| last.elapsed() < stale_after);
            let pruned = before - room.participants.len();
            if pruned > 0 {
                tracing::debug!(session_id = %session_id, pruned, "pruned silent participants");
            }
            if room.participants.is_empty() {
                room.generation += 1;
                room.empty_since = Some(Instant::now());
                due.push((session_id, TriggerReason::HeartbeatTimeout));
            }
        }
        due
    }

    pub fn rooms(&self) -> usize {
        self.rooms.len()
    }

    pub fn participants(&self) -> usize {
        self.rooms.iter().map(|e| e.participants.len()).sum()
    }

    /// Participants currently seen in one room.
    pub fn present(&self, session_id: &str) -> usize {
        self.rooms
            .get(session_id)
            .map(|room| room.participants.len())
            .unwrap_or(0)
    }
}

impl Clone for LivenessTable {
    fn clone(&self) -> Self {
        Self {
            rooms: self.rooms.clone(),
        }
    }
}

// ── Monitor ───────────────────────────────────────────────────────────────────

pub struct LivenessMonitor {
    table: LivenessTable,
    terminator: Arc<SessionTerminator>,
    grace: Duration,
    sweep_interval: Duration,
    stale_after: Duration,
}

impl LivenessMonitor {
    pub fn new(
        table: LivenessTable,
        terminator: Arc<SessionTerminator>,
        config: &LivenessConfig,
    ) -> Self {
        Self {
            table,
            terminator,
            grace: Duration::from_secs(config.grace_secs),
            sweep_interval: Duration::from_secs(config.sweep_interval_secs.max(1)),
            stale_after: Duration::from_secs(config.stale_after_secs),
        }
    }

    pub fn handle_join(&self, session_id: &str, address: &Address) {
        self.table.joined(session_id, address);
    }

    pub fn handle_heartbeat(&self, session_id: &str, address: &Address) {
        self.table.heartbeat(session_id, address);
    }

    /// Process a leave. When the room empties, arm the grace timer.
    pub fn handle_leave(&self, session_id: &str, address: &Address) {
        let Some(token) = self.table.left(session_id, address) else {
            return;
        };
        tracing::info!(
            session_id,
            grace_secs = self.grace.as_secs(),
            "room empty, grace timer armed"
        );
        let table = self.table.clone();
        let terminator = self.terminator.clone();
        let grace = self.grace;
        let session_id = session_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if !table.still_empty(&session_id, token) {
                tracing::debug!(session_id = %session_id, "grace timer stale, room repopulated");
                return;
            }
            tracing::info!(session_id = %session_id, "grace expired with the room still empty");
            terminate_idle(
                &terminator,
                &table,
                &session_id,
                TriggerReason::AllUsersDisconnected,
            )
            .await;
        });
    }

    /// Periodic sweep. Runs until shutdown is signalled.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let mut interval = tokio::time::interval(self.sweep_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    for (session_id, reason) in self.table.sweep(self.stale_after, self.grace) {
                        terminate_idle(&self.terminator, &self.table, &session_id, reason).await;
                    }
                }
                _ = shutdown.recv() => {
                    tracing::debug!("liveness sweep stopped");
                    return;
                }
            }
        }
    }
}

async fn terminate_idle(
    terminator: &SessionTerminator,
    table: &LivenessTable,
    session_id: &str,
    reason: TriggerReason,
) {
    let request = TerminationRequest {
        session_id: session_id.to_string(),
        initiated_by: Some("system".to_string()),
        context: TerminationContext {
            source: Some("liveness-monitor".to_string()),
            reason: Some(reason),
            ..TerminationContext::default()
        },
    };
    match terminator.terminate(request).await {
        Ok(summary) => {
            tracing::info!(
                session_id,
                reason = %reason,
                duration_seconds = summary.duration_seconds,
                "idle session terminated"
            );
        }
        Err(TerminateError::SessionNotFound(_)) => {
            // Settled through another path; just drop the presence state.
            table.forget(session_id);
            tracing::debug!(session_id, "idle room already settled");
        }
        Err(e) => {
            // Presence state stays; the next sweep retries.
            tracing::warn!(session_id, error = %e, "liveness termination failed");
        }
    }
}
