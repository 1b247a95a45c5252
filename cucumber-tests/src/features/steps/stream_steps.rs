use cucumber::{then, when};
use futures::StreamExt;
use serde_json::Value;
use std::time::Duration;

use crate::features::world::SwitchyardWorld;
use switchyard_core::protocol::{Payload, RequestMethod};

#[when(expr = "I open the stream {string}")]
async fn open_stream(world: &mut SwitchyardWorld, route: String) {
    let handle = world
        .client()
        .send(&route, Payload::new(), RequestMethod::Get, None)
        .await
        .expect("stream request should be sent");
    world.stream = Some(handle);
    world.stream_events.clear();
    world.stream_completed = false;
}

#[when(expr = "I read {int} stream value(s)")]
async fn read_values(world: &mut SwitchyardWorld, count: usize) {
    let handle = world.stream.as_mut().expect("no open stream");
    for _ in 0..count {
        match handle.next().await {
            Some(event) => world.stream_events.push(event),
            None => panic!("stream ended after {} events", world.stream_events.len()),
        }
    }
}

#[when("I drain the stream")]
async fn drain(world: &mut SwitchyardWorld) {
    let handle = world.stream.as_mut().expect("no open stream");
    let events = &mut world.stream_events;
    let drained = tokio::time::timeout(Duration::from_secs(2), async {
        while let Some(event) = handle.next().await {
            events.push(event);
        }
    })
    .await;
    world.stream_completed = drained.is_ok();
}

#[when("I close the stream")]
async fn close(world: &mut SwitchyardWorld) {
    let id = world.stream.as_ref().expect("no open stream").id();
    world.client().close_stream(id).await.expect("close request should be sent");
}

#[then(expr = "the stream delivered {string}")]
async fn delivered(world: &mut SwitchyardWorld, expected: String) {
    let expected: Vec<Value> = serde_json::from_str(&expected).expect("expectation must be a JSON array");
    let expected: Vec<_> = expected.into_iter().map(Ok).collect();
    assert_eq!(world.stream_events, expected);
}

#[then("every delivered event is a value")]
async fn only_values(world: &mut SwitchyardWorld) {
    assert!(world.stream_events.iter().all(Result::is_ok), "{:?}", world.stream_events);
}

#[then("the stream has completed")]
async fn completed(world: &mut SwitchyardWorld) {
    assert!(world.stream_completed, "stream did not complete in time");
}

#[then(expr = "the session holds {int} open stream(s)")]
async fn open_streams(world: &mut SwitchyardWorld, count: usize) {
    assert_eq!(world.session().emitter_count(), count);
}

#[then(expr = "the dispatcher has counted {int} failure(s)")]
async fn failures(world: &mut SwitchyardWorld, count: u64) {
    assert_eq!(world.processor().stats().failures, count);
}
