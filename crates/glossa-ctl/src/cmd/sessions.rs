//! Session mapping commands: list, inspect, register, end.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;

use super::http::{base_url, get_json, post_json_body};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Mapping {
    session_id: String,
    student: String,
    tutor: String,
    language_id: u32,
    started_at: u64,
    #[serde(default)]
    student_endpoint: Option<String>,
    #[serde(default)]
    tutor_endpoint: Option<String>,
}

// ── Commands ──────────────────────────────────────────────────────────────────

pub async fn cmd_session_list(port: u16) -> Result<()> {
    #[derive(Deserialize)]
    struct ListResponse {
        sessions: Vec<Mapping>,
    }

    let resp: ListResponse = get_json(&format!("{}/sessions", base_url(port))).await?;

    if resp.sessions.is_empty() {
        println!("No sessions registered.");
        return Ok(());
    }

    println!("═══════════════════════════════════════");
    println!("  Registered Sessions ({})", resp.sessions.len());
    println!("═══════════════════════════════════════");

    for m in &resp.sessions {
        println!("  ┌─ {}", m.session_id);
        println!("  │  student  : {}", m.student);
        println!("  │  tutor    : {}", m.tutor);
        println!("  └─ language : {}", m.language_id);
    }

    Ok(())
}

pub async fn cmd_session_inspect(port: u16, session_id: &str) -> Result<()> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct InspectResponse {
        #[serde(flatten)]
        mapping: Mapping,
        age_secs: u64,
        present: usize,
    }

    let resp: InspectResponse =
        get_json(&format!("{}/sessions/{}", base_url(port), session_id)).await?;

    println!("═══════════════════════════════════════");
    println!("  Session Details");
    println!("═══════════════════════════════════════");
    println!("  ID         : {}", resp.mapping.session_id);
    println!("  Student    : {}", resp.mapping.student);
    println!("  Tutor      : {}", resp.mapping.tutor);
    println!("  Language   : {}", resp.mapping.language_id);
    println!("  Started at : {} (unix)", resp.mapping.started_at);
    println!("  Age        : {}s", resp.age_secs);
    println!("  Present    : {}", resp.present);
    if let Some(ep) = &resp.mapping.student_endpoint {
        println!("  Student @  : {}", ep);
    }
    if let Some(ep) = &resp.mapping.tutor_endpoint {
        println!("  Tutor @    : {}", ep);
    }

    Ok(())
}

pub async fn cmd_session_register(
    port: u16,
    session_id: &str,
    student: &str,
    tutor: &str,
    language: &str,
) -> Result<()> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct RegisterResponse {
        session_id: String,
        replaced: bool,
    }

    let language_id: u32 = language.parse().context("language id must be a number")?;

    let body = json!({
        "sessionId": session_id,
        "studentAddress": student,
        "tutorAddress": tutor,
        "languageId": language_id,
    });
    let resp: RegisterResponse =
        post_json_body(&format!("{}/sessions", base_url(port)), &body).await?;

    if resp.replaced {
        println!("✓ Session re-registered: {}", resp.session_id);
    } else {
        println!("✓ Session registered: {}", resp.session_id);
    }

    Ok(())
}

pub async fn cmd_session_end(
    port: u16,
    session_id: &str,
    initiated_by: Option<&str>,
) -> Result<()> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Summary {
        session_id: String,
        #[serde(default)]
        ledger_session_id: Option<u64>,
        tutor: String,
        student: String,
        duration_seconds: u64,
        cost_formatted: String,
        currency: String,
        ended_at: String,
        metadata: Metadata,
    }

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Metadata {
        on_ledger: bool,
        #[serde(default)]
        tx_id: Option<String>,
        #[serde(default)]
        reason: Option<String>,
    }

    let mut body = json!({
        "source": "glossa-ctl",
        "reason": "user-action",
    });
    if let Some(by) = initiated_by {
        body["initiatedBy"] = json!(by);
    }

    let resp: Summary = post_json_body(
        &format!("{}/sessions/{}/end", base_url(port), session_id),
        &body,
    )
    .await?;

    let settled = if resp.metadata.on_ledger {
        "yes"
    } else {
        "no (estimated locally)"
    };

    println!("═══════════════════════════════════════");
    println!("  Session Settled");
    println!("═══════════════════════════════════════");
    println!("  ID        : {}", resp.session_id);
    if let Some(chain_id) = resp.ledger_session_id {
        println!("  Ledger id : {}", chain_id);
    }
    println!("  Student   : {}", resp.student);
    println!("  Tutor     : {}", resp.tutor);
    println!("  Duration  : {}s", resp.duration_seconds);
    println!("  Cost      : {} {}", resp.cost_formatted, resp.currency);
    println!("  On ledger : {}", settled);
    if let Some(tx) = &resp.metadata.tx_id {
        println!("  Tx        : {}", tx);
    }
    if let Some(reason) = &resp.metadata.reason {
        println!("  Reason    : {}", reason);
    }
    println!("  Ended     : {}", resp.ended_at);

    Ok(())
}
