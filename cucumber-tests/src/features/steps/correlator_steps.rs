use cucumber::{then, when};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::features::world::{payload, SwitchyardWorld};
use switchyard_core::client::ClientCorrelator;
use switchyard_core::error::ClientError;
use switchyard_core::protocol::{Payload, RequestMethod};

#[when(expr = "I call {string} with a timeout of {int} ms")]
async fn call_with_timeout(world: &mut SwitchyardWorld, route: String, millis: u64) {
    world
        .call(RequestMethod::Get, &route, Value::Null, Some(Duration::from_millis(millis)))
        .await;
}

#[when(expr = "I wait {int} ms")]
async fn wait(_world: &mut SwitchyardWorld, millis: u64) {
    tokio::time::sleep(Duration::from_millis(millis)).await;
}

#[when(expr = "{int} callers greet concurrently")]
async fn concurrent_greetings(world: &mut SwitchyardWorld, callers: usize) {
    let mut calls = Vec::with_capacity(callers);
    for i in 0..callers {
        let client = Arc::clone(world.client());
        calls.push(tokio::spawn(async move {
            let name = format!("caller-{}", i);
            let body = payload(json!({"name": name, "punctuation": "?"}));
            let outcome = match client.send("greet", body, RequestMethod::Post, None).await {
                Ok(handle) => handle.single().await,
                Err(e) => Err(e),
            };
            (name, outcome)
        }));
    }

    world.concurrent_results.clear();
    for call in calls {
        world.concurrent_results.push(call.await.expect("caller task panicked"));
    }
}

#[when("I call through a correlator whose transport is gone")]
async fn call_without_transport(world: &mut SwitchyardWorld) {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    drop(rx);
    let client = ClientCorrelator::new(tx, world.session_id.clone());

    let outcome = match client.send("greet", Payload::new(), RequestMethod::Post, None).await {
        Ok(handle) => handle.single().await,
        Err(e) => Err(e),
    };
    assert_eq!(client.pending_count(), 0);
    world.last_result = Some(outcome);
}

#[then("the call times out")]
async fn timed_out(world: &mut SwitchyardWorld) {
    assert!(
        matches!(world.last_result(), Err(ClientError::Timeout { .. })),
        "expected a timeout, got {:?}",
        world.last_result()
    );
}

#[then("the call fails with a transport error")]
async fn transport_error(world: &mut SwitchyardWorld) {
    assert!(
        matches!(world.last_result(), Err(ClientError::Transport(_))),
        "expected a transport failure, got {:?}",
        world.last_result()
    );
}

#[then("no calls are pending")]
async fn nothing_pending(world: &mut SwitchyardWorld) {
    assert_eq!(world.client().pending_count(), 0);
}

#[then(expr = "the dispatcher has received {int} request(s)")]
async fn received(world: &mut SwitchyardWorld, count: u64) {
    assert_eq!(world.processor().stats().requests, count);
}

#[then("every caller receives their own greeting")]
async fn own_greetings(world: &mut SwitchyardWorld) {
    assert!(!world.concurrent_results.is_empty());
    for (name, outcome) in &world.concurrent_results {
        assert_eq!(outcome, &Ok(Some(json!(format!("Hello, {}?", name)))));
    }
}
