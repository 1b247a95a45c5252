use cucumber::{given, then, when};
use futures::StreamExt;
use serde_json::{json, Value};

use crate::features::world::{method, status, SwitchyardWorld};
use switchyard_core::error::ClientError;
use switchyard_core::protocol::Frame;

// ==================== BACKGROUND ====================

#[given("a switchyard loopback with the demo routes")]
async fn loopback(world: &mut SwitchyardWorld) {
    world.connect();
}

// ==================== CALLS ====================

#[when(expr = "I send a {word} request to {string}")]
async fn send_empty(world: &mut SwitchyardWorld, verb: String, route: String) {
    world.call(method(&verb), &route, Value::Null, None).await;
}

#[when(expr = "I send a {word} request to {string} with payload {string}")]
async fn send_with_payload(world: &mut SwitchyardWorld, verb: String, route: String, body: String) {
    let body: Value = serde_json::from_str(&body).expect("payload must be JSON");
    world.call(method(&verb), &route, body, None).await;
}

#[when(expr = "I log in as {string} with roles {string}")]
async fn log_in(world: &mut SwitchyardWorld, user: String, roles: String) {
    let roles: Vec<&str> = roles.split(',').map(str::trim).filter(|r| !r.is_empty()).collect();
    world.call(method("POST"), "auth/login", json!({"user": user, "roles": roles}), None).await;
    assert!(world.last_result().is_ok(), "login failed: {:?}", world.last_result());
}

#[when(expr = "I feed the processor the frame {string}")]
async fn feed_raw_frame(world: &mut SwitchyardWorld, text: String) {
    let text = text.replace("$session", &world.session_id);
    let request = match Frame::from_json(&text).expect("frame must decode") {
        Frame::Request(request) => request,
        Frame::Response(response) => panic!("expected a request frame, got {:?}", response),
    };
    world.raw_responses = world.processor().process(request).await.collect().await;
}

// ==================== OUTCOMES ====================

#[then(expr = "the call succeeds with {string}")]
async fn succeeds_with(world: &mut SwitchyardWorld, expected: String) {
    let expected: Value = serde_json::from_str(&expected).expect("expectation must be JSON");
    assert_eq!(world.last_result(), &Ok(Some(expected)));
}

#[then("the call succeeds without a value")]
async fn succeeds_empty(world: &mut SwitchyardWorld) {
    assert_eq!(world.last_result(), &Ok(None));
}

#[then(expr = "the call fails with status {word}")]
async fn fails_with(world: &mut SwitchyardWorld, expected: String) {
    match world.last_result() {
        Err(ClientError::Remote { status: actual, .. }) => assert_eq!(*actual, status(&expected)),
        other => panic!("expected a {} failure, got {:?}", expected, other),
    }
}

#[then(expr = "the failure payload mentions {string}")]
async fn failure_mentions(world: &mut SwitchyardWorld, needle: String) {
    match world.last_result() {
        Err(ClientError::Remote { payload: Some(payload), .. }) => {
            assert!(payload.to_string().contains(&needle), "{} does not mention {}", payload, needle)
        }
        other => panic!("expected a failure payload, got {:?}", other),
    }
}

#[then(expr = "the failure payload is {string}")]
async fn failure_payload_is(world: &mut SwitchyardWorld, expected: String) {
    let expected: Value = serde_json::from_str(&expected).expect("expectation must be JSON");
    match world.last_result() {
        Err(ClientError::Remote { payload, .. }) => assert_eq!(payload.as_ref(), Some(&expected)),
        other => panic!("expected a failure payload, got {:?}", other),
    }
}

#[then(expr = "the processor answers {int} frame(s)")]
async fn answered_frames(world: &mut SwitchyardWorld, count: usize) {
    assert_eq!(world.raw_responses.len(), count, "frames: {:?}", world.raw_responses);
}

#[then(expr = "frame {int} has id {int} and status {word}")]
async fn frame_has(world: &mut SwitchyardWorld, index: usize, id: i64, expected: String) {
    let response = &world.raw_responses[index - 1];
    assert_eq!(response.id, id);
    assert_eq!(response.status, status(&expected));
}

#[then(expr = "the session has been destroyed")]
async fn session_destroyed(world: &mut SwitchyardWorld) {
    assert!(!world.processor().sessions().has_session(&world.session_id));
}
