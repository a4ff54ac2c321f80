//! Daemon status, cache, and shutdown commands.

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, get_json, post_json};

// ── Response types ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    uptime_secs: u64,
    sessions: Vec<SessionInfo>,
    liveness: LivenessInfo,
    ledger: LedgerInfo,
    notifications: NotificationInfo,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionInfo {
    session_id: String,
    tutor: String,
    student: String,
    language_id: u32,
    age_secs: u64,
    present: usize,
}

#[derive(Deserialize)]
struct LivenessInfo {
    rooms: usize,
    participants: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgerInfo {
    healthy: bool,
    currency: String,
    cached_profiles: usize,
}

#[derive(Deserialize)]
struct NotificationInfo {
    connected: usize,
}

// ── Commands ──────────────────────────────────────────────────────────────────

pub async fn cmd_status(port: u16) -> Result<()> {
    let resp: StatusResponse = get_json(&format!("{}/status", base_url(port))).await?;

    let ledger_state = if resp.ledger.healthy {
        "healthy"
    } else {
        "unreachable"
    };

    println!("═══════════════════════════════════════");
    println!("  Glossa Daemon Status");
    println!("═══════════════════════════════════════");
    println!("  Uptime            : {}s", resp.uptime_secs);
    println!("  Active sessions   : {}", resp.sessions.len());
    println!("  Rooms with people : {}", resp.liveness.rooms);
    println!("  Participants      : {}", resp.liveness.participants);
    println!("  Notify channels   : {}", resp.notifications.connected);
    println!(
        "  Ledger            : {} ({})",
        ledger_state, resp.ledger.currency
    );
    println!("  Cached profiles   : {}", resp.ledger.cached_profiles);

    if resp.sessions.is_empty() {
        println!("\n  No active sessions.");
    } else {
        println!("\n  Sessions:");
        for s in &resp.sessions {
            println!("  ┌─ {}", s.session_id);
            println!("  │  student  : {}", s.student);
            println!("  │  tutor    : {}", s.tutor);
            println!("  │  language : {}", s.language_id);
            println!("  │  present  : {}", s.present);
            println!("  └─ age      : {}s", s.age_secs);
        }
    }

    Ok(())
}

pub async fn cmd_cache_flush(port: u16) -> Result<()> {
    #[derive(Deserialize)]
    struct FlushResponse {
        flushed: usize,
    }

    let resp: FlushResponse = post_json(&format!("{}/cache/flush", base_url(port))).await?;
    println!("Flushed {} cached profiles.", resp.flushed);
    Ok(())
}

pub async fn cmd_shutdown(port: u16) -> Result<()> {
    #[derive(Deserialize)]
    struct ShutdownResponse {
        message: String,
    }

    let resp: ShutdownResponse = post_json(&format!("{}/daemon/shutdown", base_url(port))).await?;
    println!("{}", resp.message);
    Ok(())
}
