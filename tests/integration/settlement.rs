use crate::*;
use serde_json::json;

use glossa_core::{TerminationContext, TerminationRequest, TriggerReason};

/// Full outage: the settlement is estimated from what the caller reported,
/// and local state still goes away.
#[tokio::test]
async fn outage_settles_from_caller_context() {
    let stack = stack();
    register_session(&stack, "lesson-3");
    stack.ledger.set_down(true);
    let base = spawn_api(&stack).await;

    let (code, body) = api_post(
        &base,
        "/sessions/lesson-3/end",
        json!({
            "initiatedBy": "0x1111111111111111111111111111111111111111",
            "reason": "user-action",
            "durationSeconds": 125,
            "ratePerSecond": 10_000,
        }),
    )
    .await;
    assert_eq!(code, 200);
    assert_eq!(body["durationSeconds"], 125);
    assert_eq!(body["costMinorUnits"], "1250000");
    assert_eq!(body["costFormatted"], "1.25");
    assert_eq!(body["metadata"]["onLedger"], false);
    assert!(body["metadata"]["txId"].is_null());
    assert!(stack.registry.get("lesson-3").is_none());
}

/// With fallback off, a failed escrow write surfaces as 502 and the mapping
/// stays; once the backend recovers the same request settles on-ledger.
#[tokio::test]
async fn failed_write_keeps_mapping_until_retry_succeeds() {
    let cfg = LedgerConfig {
        allow_fallback: false,
        ..ledger_config()
    };
    let stack = stack_with(cfg, liveness_config());
    stack.ledger.open_session(&tutor(), &student(), 9, 10_000);
    register_session(&stack, "lesson-4");
    stack.ledger.set_fail_end(true);
    let base = spawn_api(&stack).await;

    let (code, _) = api_post(&base, "/sessions/lesson-4/end", json!({})).await;
    assert_eq!(code, 502);
    assert!(stack.registry.get("lesson-4").is_some(), "mapping must survive");
    assert_eq!(stack.ledger.open_count(), 1);

    stack.ledger.set_fail_end(false);
    let (code, body) = api_post(&base, "/sessions/lesson-4/end", json!({})).await;
    assert_eq!(code, 200);
    assert_eq!(body["metadata"]["onLedger"], true);
    assert_eq!(stack.ledger.open_count(), 0);
}

/// With fallback on, a write outage settles off-ledger, still using the rate
/// the open escrow record advertised.
#[tokio::test]
async fn write_outage_with_fallback_settles_off_ledger() {
    let stack = stack();
    stack.ledger.open_session(&tutor(), &student(), 9, 10_000);
    register_session(&stack, "lesson-5");
    stack.ledger.set_fail_end(true);

    let summary = stack
        .terminator
        .terminate(TerminationRequest {
            session_id: "lesson-5".into(),
            initiated_by: Some("system".into()),
            context: TerminationContext {
                reason: Some(TriggerReason::UserAction),
                duration_seconds: Some(60),
                ..TerminationContext::default()
            },
        })
        .await
        .unwrap();

    assert!(!summary.metadata.on_ledger);
    assert_eq!(summary.duration_seconds, 60);
    assert_eq!(summary.cost_minor_units, 600_000);
    assert_eq!(summary.cost_formatted, "0.6");
    // The escrow still holds the session; only local state was settled.
    assert_eq!(stack.ledger.open_count(), 1);
    assert!(stack.registry.get("lesson-5").is_none());
}

#[tokio::test]
async fn concurrent_ends_settle_exactly_once() {
    let stack = stack();
    stack.ledger.open_session(&tutor(), &student(), 11, 10_000);
    register_session(&stack, "lesson-6");
    let base = spawn_api(&stack).await;

    let (ra, rb) = tokio::join!(
        api_post(&base, "/sessions/lesson-6/end", json!({})),
        api_post(&base, "/sessions/lesson-6/end", json!({})),
    );
    // The loser either races to a clean 404 or settles from the closed
    // record; no outcome may leave state behind.
    assert!([ra.0, rb.0].contains(&200), "at least one end must settle");
    for code in [ra.0, rb.0] {
        assert!(code == 200 || code == 404, "unexpected status {code}");
    }
    assert!(stack.registry.get("lesson-6").is_none());
    assert_eq!(stack.ledger.open_count(), 0);
}

/// The escrow closed the session on its own; the client reports it along
/// with the figures it observed. The daemon verifies the close, settles from
/// the report, and tags the result as estimated: with the escrow slot
/// already cleared there is no id left to read real figures back through.
#[tokio::test]
async fn ledger_reported_end_verifies_and_settles() {
    let stack = stack();
    stack.ledger.open_session(&tutor(), &student(), 12, 10_000);
    stack.ledger.set_close_duration(45);
    stack.ledger.end_session(&tutor()).await.unwrap();
    register_session(&stack, "lesson-8");
    let base = spawn_api(&stack).await;

    let (code, body) = api_post(
        &base,
        "/sessions/lesson-8/ledger-ended",
        json!({ "durationSeconds": 45, "ratePerSecond": "10000" }),
    )
    .await;
    assert_eq!(code, 200);
    assert_eq!(body["metadata"]["reason"], "ledger-reported");
    assert_eq!(body["metadata"]["ledgerVerified"], true);
    assert_eq!(body["durationSeconds"], 45);
    assert_eq!(body["costMinorUnits"], "450000");
    assert_eq!(body["costFormatted"], "0.45");
    assert_eq!(body["metadata"]["onLedger"], false);
    assert!(body["ledgerSessionId"].is_null());
    assert!(stack.registry.get("lesson-8").is_none());
}

/// Extra context fields ride along into the settlement metadata untouched.
#[tokio::test]
async fn settlement_echoes_extra_context() {
    let stack = stack();
    register_session(&stack, "lesson-10");
    let base = spawn_api(&stack).await;

    let (code, body) = api_post(
        &base,
        "/sessions/lesson-10/end",
        json!({
            "reason": "user-action",
            "clientVersion": "2.4.1",
            "disconnectCode": 1006,
        }),
    )
    .await;
    assert_eq!(code, 200);
    assert_eq!(body["metadata"]["clientVersion"], "2.4.1");
    assert_eq!(body["metadata"]["disconnectCode"], 1006);
}
