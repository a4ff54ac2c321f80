use crate::*;

use glossa_core::Role;
use glossa_services::Notification;
use serde_json::json;
use tokio::sync::mpsc::error::TryRecvError;

/// Ending a session over HTTP pushes a settlement notice to both sides,
/// each labelled for its own role.
#[tokio::test]
async fn settlement_fans_out_with_per_role_amounts() {
    let stack = stack();
    stack.ledger.open_session(&tutor(), &student(), 31, 10_000);
    register_session(&stack, "lesson-30");

    let (_, mut student_rx) = stack.notifier.register(student());
    let (_, mut tutor_rx) = stack.notifier.register(tutor());

    let base = spawn_api(&stack).await;
    let (code, _) = api_post(
        &base,
        "/sessions/lesson-30/end",
        json!({ "source": "web-app" }),
    )
    .await;
    assert_eq!(code, 200);

    match student_rx.try_recv().unwrap() {
        Notification::SessionEnded {
            role,
            amount_label,
            summary,
        } => {
            assert_eq!(role, Role::Student);
            assert_eq!(amount_label, "cost");
            assert_eq!(summary.session_id, "lesson-30");
            assert_eq!(summary.cost_formatted, "0.9");
            assert!(summary.metadata.on_ledger);
        }
        other => panic!("unexpected notification: {other:?}"),
    }
    match tutor_rx.try_recv().unwrap() {
        Notification::SessionEnded {
            role, amount_label, ..
        } => {
            assert_eq!(role, Role::Tutor);
            assert_eq!(amount_label, "earnings");
        }
        other => panic!("unexpected notification: {other:?}"),
    }
}

/// A reconnecting client takes over the address: the stale channel is told
/// it was superseded and subsequent notices reach only the new one.
#[tokio::test]
async fn reconnect_supersedes_and_redirects_delivery() {
    let stack = stack();
    stack.ledger.open_session(&tutor(), &student(), 32, 10_000);
    register_session(&stack, "lesson-31");

    let (old_id, mut old_rx) = stack.notifier.register(student());
    let (_, mut new_rx) = stack.notifier.register(student());
    assert_eq!(
        old_rx.try_recv().unwrap(),
        Notification::ConnectionSuperseded
    );

    // The old connection's teardown must not evict its replacement.
    stack.notifier.unregister(&student(), old_id);
    assert_eq!(stack.notifier.connected(), 1);

    let base = spawn_api(&stack).await;
    let (code, _) = api_post(&base, "/sessions/lesson-31/end", json!({})).await;
    assert_eq!(code, 200);

    assert!(matches!(
        new_rx.try_recv().unwrap(),
        Notification::SessionEnded { .. }
    ));
    assert!(matches!(
        old_rx.try_recv(),
        Err(TryRecvError::Disconnected)
    ));
}

/// Delivery is best effort. Nobody listening never blocks settlement.
#[tokio::test]
async fn settlement_succeeds_with_no_listeners() {
    let stack = stack();
    stack.ledger.open_session(&tutor(), &student(), 33, 10_000);
    register_session(&stack, "lesson-32");
    assert_eq!(stack.notifier.connected(), 0);

    let base = spawn_api(&stack).await;
    let (code, body) = api_post(&base, "/sessions/lesson-32/end", json!({})).await;
    assert_eq!(code, 200);
    assert_eq!(body["sessionId"], "lesson-32");
    assert_eq!(stack.ledger.open_count(), 0);
}
