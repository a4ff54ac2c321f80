use crate::*;

use std::time::Duration;

/// A room that empties settles once the grace period runs out.
#[tokio::test(start_paused = true)]
async fn empty_room_terminates_after_grace() {
    let stack = stack();
    stack.ledger.open_session(&tutor(), &student(), 21, 10_000);
    register_session(&stack, "lesson-20");

    stack.monitor.handle_join("lesson-20", &student());
    stack.monitor.handle_join("lesson-20", &tutor());
    stack.monitor.handle_leave("lesson-20", &student());

    // One participant remains, so nothing may fire.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(stack.registry.get("lesson-20").is_some());

    stack.monitor.handle_leave("lesson-20", &tutor());
    tokio::time::sleep(Duration::from_secs(6)).await;

    assert!(
        stack.registry.get("lesson-20").is_none(),
        "grace expiry must settle the session"
    );
    assert_eq!(stack.ledger.open_count(), 0);
    assert_eq!(stack.liveness.rooms(), 0);
}

/// Coming back before the grace period ends cancels the pending termination.
#[tokio::test(start_paused = true)]
async fn reconnect_within_grace_cancels_termination() {
    let stack = stack();
    register_session(&stack, "lesson-21");

    stack.monitor.handle_join("lesson-21", &student());
    stack.monitor.handle_leave("lesson-21", &student());
    tokio::time::sleep(Duration::from_secs(2)).await;
    stack.monitor.handle_join("lesson-21", &student());

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(
        stack.registry.get("lesson-21").is_some(),
        "reconnect must cancel the armed grace timer"
    );
}

/// Heartbeats keep a session alive; silence gets it pruned and settled.
#[tokio::test(start_paused = true)]
async fn sweep_prunes_silent_participants_and_settles() {
    let stack = stack();
    stack.ledger.open_session(&tutor(), &student(), 22, 10_000);
    register_session(&stack, "lesson-22");
    stack.monitor.handle_join("lesson-22", &student());

    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);
    tokio::spawn(stack.monitor.clone().run(shutdown_tx.subscribe()));

    // Regular heartbeats across several sweeps.
    for _ in 0..4 {
        tokio::time::sleep(Duration::from_secs(10)).await;
        stack.monitor.handle_heartbeat("lesson-22", &student());
    }
    assert!(stack.registry.get("lesson-22").is_some());

    // Client crashes: no leave, no further heartbeats. The sweep prunes the
    // stale participant and settles the emptied room.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(
        stack.registry.get("lesson-22").is_none(),
        "silent session must be settled"
    );
    assert_eq!(stack.ledger.open_count(), 0);

    drop(shutdown_tx);
}

/// A termination the ledger refuses is retried by the next sweep until the
/// backend recovers.
#[tokio::test(start_paused = true)]
async fn failed_idle_termination_is_retried_by_the_sweep() {
    let cfg = LedgerConfig {
        allow_fallback: false,
        ..ledger_config()
    };
    let stack = stack_with(cfg, liveness_config());
    stack.ledger.open_session(&tutor(), &student(), 23, 10_000);
    register_session(&stack, "lesson-23");
    stack.ledger.set_down(true);

    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);
    tokio::spawn(stack.monitor.clone().run(shutdown_tx.subscribe()));

    stack.monitor.handle_join("lesson-23", &student());
    stack.monitor.handle_leave("lesson-23", &student());

    // Grace timer and the first sweeps all fail against the dead backend.
    tokio::time::sleep(Duration::from_secs(25)).await;
    assert!(
        stack.registry.get("lesson-23").is_some(),
        "failed termination must keep the mapping"
    );

    stack.ledger.set_down(false);
    tokio::time::sleep(Duration::from_secs(15)).await;
    assert!(
        stack.registry.get("lesson-23").is_none(),
        "sweep must settle once the backend recovers"
    );
    assert_eq!(stack.ledger.open_count(), 0);

    drop(shutdown_tx);
}

/// Liveness state for a settled session is dropped even when presence was
/// only ever implied by heartbeats.
#[tokio::test]
async fn settlement_forgets_presence_state() {
    let stack = stack();
    register_session(&stack, "lesson-24");
    stack.monitor.handle_heartbeat("lesson-24", &student());
    assert_eq!(stack.liveness.present("lesson-24"), 1);

    let base = spawn_api(&stack).await;
    let (code, _) = api_post(&base, "/sessions/lesson-24/end", serde_json::json!({})).await;
    assert_eq!(code, 200);
    assert_eq!(stack.liveness.present("lesson-24"), 0);
    assert_eq!(stack.liveness.rooms(), 0);
}
