//! Session termination and settlement.
//!
//! The one place sessions end. Whatever triggered it (a participant's
//! request, the liveness sweep, or the ledger closing the escrow first), the
//! sequence is the same: resolve the mapping, close the escrow if it is still
//! open, pull the settled figures, and only then drop local state and fan the
//! summary out. The mapping survives any failure before that point, so a
//! failed termination can simply be retried.
//!
//! Required for settlement is the end write alone. Every read around it is
//! best-effort: a missing figure is estimated from what the request and the
//! registry know, never the other way around.

use std::time::Duration;

use glossa_core::config::LedgerConfig;
use glossa_core::{
    SessionMapping, SettlementMetadata, SettlementSummary, TerminationContext,
    TerminationRequest, TriggerReason,
};

use crate::ledger::{EndReceipt, LedgerError, LedgerGateway};
use crate::liveness::LivenessTable;
use crate::notify::Notifier;
use crate::registry::SessionRegistry;

#[derive(Debug, thiserror::Error)]
pub enum TerminateError {
    #[error("unknown session: {0}")]
    SessionNotFound(String),
    #[error("ledger termination failed: {0}")]
    Ledger(#[from] LedgerError),
}

pub struct SessionTerminator {
    registry: SessionRegistry,
    ledger: LedgerGateway,
    notifier: Notifier,
    liveness: LivenessTable,
    verify_attempts: u32,
    verify_interval: Duration,
}

impl SessionTerminator {
    pub fn new(
        registry: SessionRegistry,
        ledger: LedgerGateway,
        notifier: Notifier,
        liveness: LivenessTable,
        config: &LedgerConfig,
    ) -> Self {
        Self {
            registry,
            ledger,
            notifier,
            liveness,
            verify_attempts: config.verify_attempts.max(1),
            verify_interval: Duration::from_millis(config.verify_interval_ms),
        }
    }

    /// Terminate and settle a session.
    ///
    /// Fails with [`TerminateError::SessionNotFound`] once the mapping is
    /// gone, which is also what the second of two back-to-back terminations
    /// sees. Two of them racing is fine: the loser of the escrow write
    /// re-reads and settles from the already-closed state.
    pub async fn terminate(
        &self,
        request: TerminationRequest,
    ) -> Result<SettlementSummary, TerminateError> {
        let TerminationRequest {
            session_id,
            initiated_by,
            context,
        } = request;

        let mapping = self
            .registry
            .get(&session_id)
            .ok_or_else(|| TerminateError::SessionNotFound(session_id.clone()))?;

        tracing::info!(
            session_id = %session_id,
            tutor = %mapping.tutor,
            student = %mapping.student,
            reason = context.reason.map(TriggerReason::as_str).unwrap_or("unspecified"),
            initiated_by = initiated_by.as_deref().unwrap_or("unknown"),
            "terminating session"
        );

        // Best-effort look at the open escrow state before touching it.
        let (active, read_failed) = match self.ledger.active_session(&mapping.tutor).await {
            Ok(session) => (session, false),
            Err(e) => {
                tracing::warn!(
                    session_id = %session_id,
                    error = %e,
                    "active-session read failed, continuing blind"
                );
                (None, true)
            }
        };

        let receipt = match (&active, read_failed) {
            // Open on the ledger: the write must go through.
            (Some(s), _) if s.is_active => self.submit_end(&mapping, &session_id).await?,
            // Read failed, so we cannot prove it is closed. Try the write and
            // let the race handling sort out the rest.
            (None, true) => self.submit_end(&mapping, &session_id).await?,
            // Closed record: someone settled it before us.
            (Some(_), _) => EndReceipt::already_closed(),
            // The ledger never saw this session at all.
            (None, false) => EndReceipt::default(),
        };

        // Settled figures, best-effort. A closed active record already has
        // them; otherwise the history row behind the captured escrow id is
        // asked for once. Without an id there is nothing to look up: a
        // session the escrow never tracked must not borrow figures from the
        // pair's earlier lessons.
        let ledger_session_id = active.as_ref().map(|s| s.ledger_session_id);
        let mut chain_duration = active
            .as_ref()
            .filter(|s| !s.is_active)
            .map(|s| s.duration_secs())
            .filter(|d| *d > 0);
        let mut chain_paid = active
            .as_ref()
            .filter(|s| !s.is_active)
            .map(|s| s.amount_paid)
            .filter(|p| *p > 0);

        if ledger_session_id.is_some() && (chain_duration.is_none() || chain_paid.is_none()) {
            match self.ledger.session_history(&mapping.tutor).await {
                Ok(rows) => {
                    let row = rows
                        .iter()
                        .find(|r| Some(r.ledger_session_id) == ledger_session_id);
                    if let Some(row) = row {
                        if chain_duration.is_none() {
                            chain_duration = Some(row.duration_secs()).filter(|d| *d > 0);
                        }
                        if chain_paid.is_none() {
                            chain_paid = Some(row.amount_paid).filter(|p| *p > 0);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        session_id = %session_id,
                        error = %e,
                        "history read failed, estimating settlement"
                    );
                }
            }
        }

        // Duration: ledger figure, then the client's, then wall clock against
        // registration time. A settled session is never shorter than a second.
        let now_epoch = chrono::Utc::now().timestamp().max(0) as u64;
        let wall_duration = now_epoch.saturating_sub(mapping.started_at);
        let duration_seconds = chain_duration
            .or(context.duration_seconds.filter(|d| *d > 0))
            .unwrap_or(wall_duration)
            .max(1);

        // Cost: what the ledger paid out, or duration times the best known rate.
        let rate = context
            .rate_per_second
            .filter(|r| *r > 0)
            .or_else(|| {
                active
                    .as_ref()
                    .map(|s| s.rate_per_second)
                    .filter(|r| *r > 0)
            })
            .unwrap_or(0);
        let cost_minor_units =
            chain_paid.unwrap_or_else(|| rate.saturating_mul(duration_seconds as u128));

        let summary = SettlementSummary {
            session_id: session_id.clone(),
            ledger_session_id,
            tutor: mapping.tutor.clone(),
            student: mapping.student.clone(),
            language_id: mapping.language_id,
            duration_seconds,
            cost_minor_units,
            cost_formatted: self.ledger.format_amount(cost_minor_units),
            currency: self.ledger.currency().to_string(),
            ended_at: chrono::Utc::now().to_rfc3339(),
            initiated_by,
            metadata: SettlementMetadata {
                context,
                // A history row counts: the escrow settled it even if the
                // close was not ours.
                on_ledger: receipt.on_ledger() || chain_paid.is_some(),
                tx_id: receipt.tx_id,
            },
        };

        // Only a settled session loses its local state.
        self.registry.remove(&session_id);
        self.liveness.forget(&session_id);

        let delivered = self.notifier.fan_out_settlement(&summary);

        tracing::info!(
            session_id = %session_id,
            duration_seconds,
            cost = %summary.cost_formatted,
            currency = %summary.currency,
            on_ledger = summary.metadata.on_ledger,
            delivered,
            "session settled"
        );

        Ok(summary)
    }

    /// Handle a client report that the escrow already closed the session.
    ///
    /// Polls the ledger until the close is visible (or attempts run out),
    /// then terminates either way: the call is over for the participants no
    /// matter what the backend manages to confirm.
    pub async fn confirm_ledger_end(
        &self,
        session_id: &str,
        initiated_by: Option<String>,
        mut context: TerminationContext,
    ) -> Result<SettlementSummary, TerminateError> {
        let mapping = self
            .registry
            .get(session_id)
            .ok_or_else(|| TerminateError::SessionNotFound(session_id.to_string()))?;

        let mut verified = false;
        for attempt in 1..=self.verify_attempts {
            match self.ledger.active_session(&mapping.tutor).await {
                Ok(None) => {
                    verified = true;
                    break;
                }
                Ok(Some(s)) if !s.is_active => {
                    verified = true;
                    break;
                }
                Ok(Some(_)) => {
                    tracing::debug!(
                        session_id,
                        attempt,
                        "escrow still reports the session active"
                    );
                }
                // A read failure is no proof either way; poll again.
                Err(e) => {
                    tracing::warn!(session_id, attempt, error = %e, "verification read failed");
                }
            }
            if attempt < self.verify_attempts {
                tokio::time::sleep(self.verify_interval).await;
            }
        }
        if !verified {
            tracing::warn!(session_id, "proceeding without ledger confirmation");
        }

        context.reason = Some(TriggerReason::LedgerReported);
        context.ledger_verified = verified;
        if context.source.is_none() {
            context.source = Some("ledger-ended".to_string());
        }
        self.terminate(TerminationRequest {
            session_id: session_id.to_string(),
            initiated_by,
            context,
        })
        .await
    }

    async fn submit_end(
        &self,
        mapping: &SessionMapping,
        session_id: &str,
    ) -> Result<EndReceipt, TerminateError> {
        match self.ledger.end_session(&mapping.tutor).await {
            Ok(receipt) => {
                if let Some(tx) = &receipt.tx_id {
                    tracing::info!(session_id, tutor = %mapping.tutor, tx = %tx, "escrow session closed");
                }
                Ok(receipt)
            }
            Err(err @ LedgerError::Rejected(_)) => {
                // Lost a race with another terminator, or the escrow closed
                // itself. Re-read once before giving up.
                let closed_meanwhile = match self.ledger.active_session(&mapping.tutor).await {
                    Ok(None) => true,
                    Ok(Some(s)) => !s.is_active,
                    Err(_) => false,
                };
                if closed_meanwhile {
                    tracing::debug!(session_id, "end-session raced, escrow already closed");
                    Ok(EndReceipt::already_closed())
                } else {
                    Err(err.into())
                }
            }
            Err(e) => Err(e.into()),
        }
    }
}
