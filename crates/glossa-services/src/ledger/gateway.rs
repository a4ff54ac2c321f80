//! Gateway between the daemon and the escrow backend.
//!
//! Wraps a [`LedgerClient`] with the policy the routes and the terminator
//! share: a TTL cache for profile reads, a health flag that flips on
//! transport failures, and deterministic fallback data so the marketplace
//! keeps demo-functioning while the backend is down. Fallback responses are
//! never cached, and the whole cache is flushed when the backend comes back
//! so nothing stale from before the outage survives it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;

use glossa_core::config::LedgerConfig;
use glossa_core::money::format_minor_units;
use glossa_core::{Address, HistoryEntry, LedgerSession};

use super::{EndReceipt, LedgerClient, LedgerError, StudentProfile, TutorProfile};

/// Fallback tutor rate in minor units per second (0.01/s for a six-decimal
/// token), matching what the marketplace seeds demo tutors with.
const FALLBACK_RATE_MINOR: u128 = 10_000;

/// Where a profile answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Ledger,
    Fallback,
}

struct CacheEntry<T> {
    value: T,
    stored_at: Instant,
}

pub struct LedgerGateway {
    client: Arc<dyn LedgerClient>,
    allow_fallback: bool,
    decimals: u8,
    currency: String,
    cache_ttl: Duration,
    tutor_cache: Arc<DashMap<Address, CacheEntry<TutorProfile>>>,
    student_cache: Arc<DashMap<Address, CacheEntry<StudentProfile>>>,
    healthy: Arc<AtomicBool>,
}

impl LedgerGateway {
    pub fn new(client: Arc<dyn LedgerClient>, config: &LedgerConfig) -> Self {
        Self {
            client,
            allow_fallback: config.allow_fallback,
            decimals: config.decimals,
            currency: config.currency.clone(),
            cache_ttl: Duration::from_secs(config.profile_cache_ttl_secs),
            tutor_cache: Arc::new(DashMap::new()),
            student_cache: Arc::new(DashMap::new()),
            healthy: Arc::new(AtomicBool::new(true)),
        }
    }

    // ── Profile reads ─────────────────────────────────────────────────────────

    pub async fn tutor_profile(
        &self,
        address: &Address,
    ) -> Result<Option<(TutorProfile, DataSource)>, LedgerError> {
        if let Some(hit) = cache_lookup(&self.tutor_cache, address, self.cache_ttl) {
            return Ok(Some((hit, DataSource::Ledger)));
        }
        match self.client.tutor_profile(address).await {
            Ok(found) => {
                self.mark_reachable();
                if let Some(profile) = &found {
                    cache_store(&self.tutor_cache, address, profile.clone(), self.cache_ttl);
                }
                Ok(found.map(|p| (p, DataSource::Ledger)))
            }
            Err(e) if e.is_unavailable() && self.allow_fallback => {
                self.mark_unreachable(&e);
                Ok(Some((self.fallback_tutor(address), DataSource::Fallback)))
            }
            Err(e) => {
                self.note_error(&e);
                Err(e)
            }
        }
    }

    pub async fn student_profile(
        &self,
        address: &Address,
    ) -> Result<Option<(StudentProfile, DataSource)>, LedgerError> {
        if let Some(hit) = cache_lookup(&self.student_cache, address, self.cache_ttl) {
            return Ok(Some((hit, DataSource::Ledger)));
        }
        match self.client.student_profile(address).await {
            Ok(found) => {
                self.mark_reachable();
                if let Some(profile) = &found {
                    cache_store(&self.student_cache, address, profile.clone(), self.cache_ttl);
                }
                Ok(found.map(|p| (p, DataSource::Ledger)))
            }
            Err(e) if e.is_unavailable() && self.allow_fallback => {
                self.mark_unreachable(&e);
                Ok(Some((self.fallback_student(address), DataSource::Fallback)))
            }
            Err(e) => {
                self.note_error(&e);
                Err(e)
            }
        }
    }

    // ── Session reads and the end write ───────────────────────────────────────

    pub async fn active_session(
        &self,
        tutor: &Address,
    ) -> Result<Option<LedgerSession>, LedgerError> {
        match self.client.active_session(tutor).await {
            Ok(session) => {
                self.mark_reachable();
                Ok(session)
            }
            Err(e) => {
                self.note_error(&e);
                Err(e)
            }
        }
    }

    pub async fn session_history(
        &self,
        tutor: &Address,
    ) -> Result<Vec<HistoryEntry>, LedgerError> {
        match self.client.session_history(tutor).await {
            Ok(rows) => {
                self.mark_reachable();
                Ok(rows)
            }
            Err(e) => {
                self.note_error(&e);
                Err(e)
            }
        }
    }

    /// Submit the end-session write. When the backend is unreachable and
    /// fallback is allowed, returns an off-ledger receipt instead of failing;
    /// an explicit rejection always propagates.
    pub async fn end_session(&self, tutor: &Address) -> Result<EndReceipt, LedgerError> {
        match self.client.end_session(tutor).await {
            Ok(receipt) => {
                self.mark_reachable();
                Ok(receipt)
            }
            Err(e) if e.is_unavailable() && self.allow_fallback => {
                self.mark_unreachable(&e);
                tracing::warn!(
                    tutor = %tutor,
                    error = %e,
                    "end-session not submitted, settling off-ledger"
                );
                Ok(EndReceipt::default())
            }
            Err(e) => {
                self.note_error(&e);
                Err(e)
            }
        }
    }

    // ── Cache control ─────────────────────────────────────────────────────────

    /// Drop cached profiles for one address (registration changed on the
    /// ledger). Returns true if anything was cached.
    pub fn invalidate(&self, address: &Address) -> bool {
        let had = self.tutor_cache.remove(address).is_some()
            | self.student_cache.remove(address).is_some();
        if had {
            tracing::info!(address = %address, "cached registration invalidated");
        }
        had
    }

    /// Drop every cached profile. Returns how many entries went.
    pub fn flush_cache(&self) -> usize {
        let dropped = self.tutor_cache.len() + self.student_cache.len();
        self.tutor_cache.clear();
        self.student_cache.clear();
        if dropped > 0 {
            tracing::info!(dropped, "profile cache flushed");
        }
        dropped
    }

    pub fn cached_profiles(&self) -> usize {
        self.tutor_cache.len() + self.student_cache.len()
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    // ── Formatting ────────────────────────────────────────────────────────────

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn format_amount(&self, minor: u128) -> String {
        format_minor_units(minor, self.decimals)
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn note_error(&self, err: &LedgerError) {
        if err.is_unavailable() {
            self.mark_unreachable(err);
        } else {
            // The backend answered, so it is reachable even when it says no.
            self.mark_reachable();
        }
    }

    fn mark_reachable(&self) {
        if !self.healthy.swap(true, Ordering::Relaxed) {
            let dropped = self.flush_cache();
            tracing::info!(dropped, "ledger backend reachable again");
        }
    }

    fn mark_unreachable(&self, err: &LedgerError) {
        if self.healthy.swap(false, Ordering::Relaxed) {
            tracing::warn!(
                error = %err,
                fallback = self.allow_fallback,
                "ledger backend unreachable"
            );
        }
    }

    fn fallback_tutor(&self, address: &Address) -> TutorProfile {
        TutorProfile {
            address: address.clone(),
            name: format!("Tutor {}", short_address(address)),
            rate_per_second: FALLBACK_RATE_MINOR,
            language_ids: Vec::new(),
            is_registered: true,
        }
    }

    fn fallback_student(&self, address: &Address) -> StudentProfile {
        StudentProfile {
            address: address.clone(),
            name: format!("Student {}", short_address(address)),
            is_registered: true,
        }
    }
}

impl Clone for LedgerGateway {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            allow_fallback: self.allow_fallback,
            decimals: self.decimals,
            currency: self.currency.clone(),
            cache_ttl: self.cache_ttl,
            tutor_cache: self.tutor_cache.clone(),
            student_cache: self.student_cache.clone(),
            healthy: self.healthy.clone(),
        }
    }
}

fn cache_lookup<T: Clone>(
    cache: &DashMap<Address, CacheEntry<T>>,
    address: &Address,
    ttl: Duration,
) -> Option<T> {
    if ttl.is_zero() {
        return None;
    }
    // The guard must be dropped before removing the expired entry.
    let fresh = cache.get(address).map(|e| {
        if e.stored_at.elapsed() < ttl {
            Some(e.value.clone())
        } else {
            None
        }
    });
    match fresh {
        Some(Some(value)) => Some(value),
        Some(None) => {
            cache.remove(address);
            None
        }
        None => None,
    }
}

fn cache_store<T>(cache: &DashMap<Address, CacheEntry<T>>, address: &Address, value: T, ttl: Duration) {
    if ttl.is_zero() {
        return;
    }
    cache.insert(
        address.clone(),
        CacheEntry {
            value,
            stored_at: Instant::now(),
        },
    );
}

fn short_address(address: &Address) -> String {
    let s = address.as_str();
    if s.len() <= 10 || !s.is_ascii() {
        return s.to_string();
    }
    format!("{}..{}", &s[..6], &s[s.len() - 4..])
}
