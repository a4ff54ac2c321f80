use crate::*;
use serde_json::json;

#[tokio::test]
async fn register_inspect_list_roundtrip() {
    let stack = stack();
    let base = spawn_api(&stack).await;

    let (code, body) = api_get(&base, "/sessions").await;
    assert_eq!(code, 200);
    assert_eq!(body["sessions"].as_array().unwrap().len(), 0);

    let (code, body) = api_post(
        &base,
        "/sessions",
        json!({
            "sessionId": "lesson-7",
            "studentAddress": "0x1111111111111111111111111111111111111111",
            "tutorAddress": "0x2222222222222222222222222222222222222222",
            "languageId": 3,
        }),
    )
    .await;
    assert_eq!(code, 200);
    assert_eq!(body["registered"], true);
    assert_eq!(body["replaced"], false);

    let (code, body) = api_get(&base, "/sessions/lesson-7").await;
    assert_eq!(code, 200);
    assert_eq!(body["sessionId"], "lesson-7");
    assert_eq!(body["student"], "0x1111111111111111111111111111111111111111");
    assert_eq!(body["tutor"], "0x2222222222222222222222222222222222222222");
    assert_eq!(body["languageId"], 3);
    assert!(body["ageSecs"].is_number());
    assert_eq!(body["present"], 0);

    let (_, body) = api_get(&base, "/sessions").await;
    assert_eq!(body["sessions"].as_array().unwrap().len(), 1);

    // Same id again: replacement, not duplication.
    let (_, body) = api_post(
        &base,
        "/sessions",
        json!({
            "sessionId": "lesson-7",
            "studentAddress": "0x1111111111111111111111111111111111111111",
            "tutorAddress": "0x2222222222222222222222222222222222222222",
            "languageId": 3,
        }),
    )
    .await;
    assert_eq!(body["replaced"], true);
    assert_eq!(stack.registry.len(), 1);
}

#[tokio::test]
async fn registration_normalizes_address_case() {
    let stack = stack();
    let base = spawn_api(&stack).await;

    api_post(
        &base,
        "/sessions",
        json!({
            "sessionId": "lesson-8",
            "studentAddress": "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
            "tutorAddress": "  0xBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB  ",
            "languageId": 1,
        }),
    )
    .await;

    let (_, body) = api_get(&base, "/sessions/lesson-8").await;
    assert_eq!(body["student"], "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
    assert_eq!(body["tutor"], "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");
}

#[tokio::test]
async fn registration_rejects_bad_input() {
    let stack = stack();
    let base = spawn_api(&stack).await;

    let (code, _) = api_post(
        &base,
        "/sessions",
        json!({
            "sessionId": "   ",
            "studentAddress": "0x1111111111111111111111111111111111111111",
            "tutorAddress": "0x2222222222222222222222222222222222222222",
            "languageId": 3,
        }),
    )
    .await;
    assert_eq!(code, 400);

    let (code, _) = api_post(
        &base,
        "/sessions",
        json!({
            "sessionId": "lesson-9",
            "studentAddress": "0x1111111111111111111111111111111111111111",
            "tutorAddress": "0x1111111111111111111111111111111111111111",
            "languageId": 3,
        }),
    )
    .await;
    assert_eq!(code, 400);
    assert_eq!(stack.registry.len(), 0);
}

#[tokio::test]
async fn end_settles_on_ledger_and_second_end_is_not_found() {
    let stack = stack();
    stack.ledger.open_session(&tutor(), &student(), 7, 10_000);
    stack.ledger.set_close_duration(90);
    register_session(&stack, "lesson-9");
    let base = spawn_api(&stack).await;

    let (code, body) = api_post(
        &base,
        "/sessions/lesson-9/end",
        json!({
            "initiatedBy": "0x1111111111111111111111111111111111111111",
            "reason": "user-action",
        }),
    )
    .await;
    assert_eq!(code, 200);
    assert_eq!(body["sessionId"], "lesson-9");
    assert_eq!(body["ledgerSessionId"], 7);
    assert_eq!(body["durationSeconds"], 90);
    assert_eq!(body["costMinorUnits"], "900000");
    assert_eq!(body["costFormatted"], "0.9");
    assert_eq!(body["currency"], "PYUSD");
    assert_eq!(
        body["initiatedBy"],
        "0x1111111111111111111111111111111111111111"
    );
    assert_eq!(body["metadata"]["onLedger"], true);
    assert_eq!(body["metadata"]["txId"], "0xtx0001");
    assert_eq!(body["metadata"]["reason"], "user-action");
    assert_eq!(stack.ledger.open_count(), 0);
    assert!(stack.registry.get("lesson-9").is_none());

    let (code, _) = api_post(&base, "/sessions/lesson-9/end", json!({})).await;
    assert_eq!(code, 404);
}

#[tokio::test]
async fn status_reports_sessions_liveness_and_ledger() {
    let stack = stack();
    register_session(&stack, "lesson-1");
    stack.liveness.joined("lesson-1", &student());
    let base = spawn_api(&stack).await;

    let (code, body) = api_get(&base, "/status").await;
    assert_eq!(code, 200);
    assert!(body["uptimeSecs"].is_number());

    let sessions = body["sessions"].as_array().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["sessionId"], "lesson-1");
    assert_eq!(sessions[0]["present"], 1);

    assert_eq!(body["liveness"]["rooms"], 1);
    assert_eq!(body["liveness"]["participants"], 1);
    assert_eq!(body["ledger"]["healthy"], true);
    assert_eq!(body["ledger"]["currency"], "PYUSD");
    assert_eq!(body["notifications"]["connected"], 0);
}

#[tokio::test]
async fn tutor_profile_reads_ledger_then_fallback_during_outage() {
    let stack = stack();
    stack.ledger.add_tutor(TutorProfile {
        address: tutor(),
        name: "Maya".into(),
        rate_per_second: 20_000,
        language_ids: vec![1, 3],
        is_registered: true,
    });
    let base = spawn_api(&stack).await;

    let (code, body) = api_get(&base, &format!("/tutors/{}", tutor())).await;
    assert_eq!(code, 200);
    assert_eq!(body["name"], "Maya");
    assert_eq!(body["ratePerSecond"], "20000");
    assert_eq!(body["languageIds"], json!([1, 3]));
    assert_eq!(body["source"], "ledger");

    // Unknown tutor while the backend is up: 404, not a fallback.
    let unknown = "/tutors/0x3333333333333333333333333333333333333333";
    let (code, _) = api_get(&base, unknown).await;
    assert_eq!(code, 404);

    // During an outage the same address gets a fallback profile.
    stack.ledger.set_down(true);
    let (code, body) = api_get(&base, unknown).await;
    assert_eq!(code, 200);
    assert_eq!(body["source"], "fallback");
    assert_eq!(body["isRegistered"], true);
}

#[tokio::test]
async fn invalidate_and_flush_drop_cached_profiles() {
    let stack = stack();
    stack.ledger.add_tutor(TutorProfile {
        address: tutor(),
        name: "Maya".into(),
        rate_per_second: 20_000,
        language_ids: vec![1],
        is_registered: true,
    });
    let base = spawn_api(&stack).await;

    api_get(&base, &format!("/tutors/{}", tutor())).await;
    assert_eq!(stack.gateway.cached_profiles(), 1);

    let (code, body) =
        api_post(&base, &format!("/registrations/{}/invalidate", tutor()), json!({})).await;
    assert_eq!(code, 200);
    assert_eq!(body["invalidated"], true);
    assert_eq!(stack.gateway.cached_profiles(), 0);

    api_get(&base, &format!("/tutors/{}", tutor())).await;
    let (code, body) = api_post(&base, "/cache/flush", json!({})).await;
    assert_eq!(code, 200);
    assert_eq!(body["flushed"], 1);
}

#[tokio::test]
async fn event_endpoint_tracks_presence() {
    let stack = stack();
    register_session(&stack, "lesson-2");
    let base = spawn_api(&stack).await;

    let (code, body) = api_post(
        &base,
        "/events",
        json!({
            "type": "join",
            "sessionId": "lesson-2",
            "address": "0x1111111111111111111111111111111111111111",
        }),
    )
    .await;
    assert_eq!(code, 200);
    assert_eq!(body["accepted"], true);
    assert_eq!(stack.liveness.present("lesson-2"), 1);

    let (code, _) = api_post(
        &base,
        "/events",
        json!({
            "type": "heartbeat",
            "sessionId": "lesson-2",
            "address": "0x4444444444444444444444444444444444444444",
        }),
    )
    .await;
    assert_eq!(code, 200);
    assert_eq!(stack.liveness.present("lesson-2"), 2);

    api_post(
        &base,
        "/events",
        json!({
            "type": "leave",
            "sessionId": "lesson-2",
            "address": "0x4444444444444444444444444444444444444444",
        }),
    )
    .await;
    assert_eq!(stack.liveness.present("lesson-2"), 1);

    // Malformed report: empty session id.
    let (code, _) = api_post(
        &base,
        "/events",
        json!({
            "type": "join",
            "sessionId": "",
            "address": "0x1111111111111111111111111111111111111111",
        }),
    )
    .await;
    assert_eq!(code, 400);
}
