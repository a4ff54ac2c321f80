//! JSON-RPC transport to the escrow backend.
//!
//! The backend speaks plain JSON-RPC 2.0 over HTTP. Every method takes the
//! escrow account as a parameter; an empty configured escrow address means
//! there is nothing sensible to ask, so calls short-circuit to
//! [`LedgerError::Unconfigured`] without touching the network.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use glossa_core::config::LedgerConfig;
use glossa_core::{Address, HistoryEntry, LedgerSession};

use super::{EndReceipt, LedgerClient, LedgerError, StudentProfile, TutorProfile};

pub struct RpcLedgerClient {
    http: reqwest::Client,
    url: String,
    escrow: String,
    next_id: AtomicU64,
}

impl RpcLedgerClient {
    pub fn new(config: &LedgerConfig) -> Result<Self, LedgerError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .build()
            .map_err(|e| LedgerError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            url: config.rpc_url.clone(),
            escrow: config.escrow_address.trim().to_ascii_lowercase(),
            next_id: AtomicU64::new(1),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, LedgerError> {
        if self.escrow.is_empty() {
            return Err(LedgerError::Unconfigured);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        tracing::trace!(method, id, "ledger rpc call");
        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| LedgerError::Transport(e.to_string()))?;
        let envelope: RpcResponse = response
            .json()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;
        envelope.into_result()
    }
}

#[async_trait]
impl LedgerClient for RpcLedgerClient {
    async fn active_session(&self, tutor: &Address) -> Result<Option<LedgerSession>, LedgerError> {
        self.call(
            "escrow_activeSession",
            json!({ "escrow": self.escrow, "tutor": tutor }),
        )
        .await
    }

    async fn session_history(&self, tutor: &Address) -> Result<Vec<HistoryEntry>, LedgerError> {
        self.call(
            "escrow_sessionHistory",
            json!({ "escrow": self.escrow, "tutor": tutor }),
        )
        .await
    }

    async fn end_session(&self, tutor: &Address) -> Result<EndReceipt, LedgerError> {
        self.call(
            "escrow_endSession",
            json!({ "escrow": self.escrow, "tutor": tutor }),
        )
        .await
    }

    async fn tutor_profile(
        &self,
        address: &Address,
    ) -> Result<Option<TutorProfile>, LedgerError> {
        self.call(
            "escrow_tutorProfile",
            json!({ "escrow": self.escrow, "address": address }),
        )
        .await
    }

    async fn student_profile(
        &self,
        address: &Address,
    ) -> Result<Option<StudentProfile>, LedgerError> {
        self.call(
            "escrow_studentProfile",
            json!({ "escrow": self.escrow, "address": address }),
        )
        .await
    }
}

// ── Response envelope ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

impl RpcResponse {
    /// An `error` member wins over `result`. A missing result decodes as
    /// `null`, which is how "no such session" arrives for `Option` targets.
    fn into_result<T: DeserializeOwned>(self) -> Result<T, LedgerError> {
        if let Some(err) = self.error {
            return Err(LedgerError::Rejected(format!(
                "{} (code {})",
                err.message, err.code
            )));
        }
        let value = self.result.unwrap_or(Value::Null);
        serde_json::from_value(value)
            .map_err(|e| LedgerError::Transport(format!("malformed result: {e}")))
    }
}
