//! End-to-end: a client correlator talking to a request processor over
//! in-memory channels

use std::sync::Arc;
use std::time::Duration;

use futures::{stream, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;

use switchyard_core::client::ClientCorrelator;
use switchyard_core::dispatch::{Reply, RequestProcessor};
use switchyard_core::error::{ClientError, RpcError};
use switchyard_core::protocol::{Frame, Payload, RequestMethod, ResponseStatus};
use switchyard_core::routing::{AccessType, Controller, ParamType, ParameterSpec, RouteDescriptor, RouteTable};
use switchyard_core::security::Principal;
use switchyard_core::session::{Session, SessionManager, SessionManagerConfig};

struct Visits(u32);

fn routes() -> RouteTable {
    let mut routes = RouteTable::new();

    routes
        .register_controller(
            Controller::new("auth")
                .route(
                    RouteDescriptor::post("login", |args| async move {
                        let session = args.session::<Session>("session").ok_or(RpcError::SessionExpired)?;
                        let roles: Vec<String> = args.get("roles")?;
                        session.login(Principal::new(args.get::<String>("user")?, roles))?;
                        Ok(Reply::empty())
                    })
                    .param(ParameterSpec::session::<Session>("session"))
                    .param(ParameterSpec::payload("user", ParamType::Text))
                    .param(ParameterSpec::payload("roles", ParamType::List).with_default("[]"))
                    .access(AccessType::OnlyNotLoggedIn),
                )
                .route(
                    RouteDescriptor::post("logout", |args| async move {
                        if let Some(session) = args.session::<Session>("session") {
                            session.destroy();
                        }
                        Ok(Reply::empty())
                    })
                    .param(ParameterSpec::session::<Session>("session"))
                    .access(AccessType::OnlyLoggedIn),
                ),
        )
        .unwrap();

    routes
        .register(
            RouteDescriptor::get("admin/stats", |_args| async { Reply::value(json!({"players": 3})) })
                .roles(["admin"]),
        )
        .unwrap();

    routes
        .register(
            RouteDescriptor::post("greet", |args| async move {
                let name: String = args.get("name")?;
                let punctuation: String = args.get("punctuation")?;
                Reply::value(format!("Hello, {}{}", name, punctuation))
            })
            .param(ParameterSpec::payload("name", ParamType::Text))
            .param(ParameterSpec::payload("punctuation", ParamType::Text).with_default("!")),
        )
        .unwrap();

    routes
        .register(
            RouteDescriptor::get("visits", |args| async move {
                let session = args.session::<Session>("session").ok_or(RpcError::SessionExpired)?;
                let visits = session
                    .compute::<Visits, _>(|current| Some(Visits(current.map_or(1, |v| v.0 + 1))))?
                    .map_or(0, |v| v.0);
                Reply::value(visits)
            })
            .param(ParameterSpec::session::<Session>("session")),
        )
        .unwrap();

    routes
        .register(
            RouteDescriptor::get("ticks/{count}", |args| async move {
                let count: u32 = args.get("count")?;
                Ok(Reply::stream(stream::iter((1..=count).map(Ok))))
            })
            .param(ParameterSpec::path("count", ParamType::Integer)),
        )
        .unwrap();

    routes
        .register(RouteDescriptor::get("ticker", |_args| async {
            let ticks = stream::unfold(0u64, |n| async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Some((Ok(n), n + 1))
            });
            Ok(Reply::stream(ticks))
        }))
        .unwrap();

    routes
        .register(RouteDescriptor::get("broken-stream", |_args| async {
            Ok(Reply::stream(stream::iter(vec![
                Ok(json!(1)),
                Err(RpcError::declared(ResponseStatus::Error, "feed lost")),
            ])))
        }))
        .unwrap();

    routes
        .register(RouteDescriptor::get("slow", |_args| async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Reply::value("finally")
        }))
        .unwrap();

    routes
}

struct Harness {
    client: Arc<ClientCorrelator>,
    processor: Arc<RequestProcessor>,
    session_id: String,
}

fn harness() -> Harness {
    let sessions = SessionManager::with_config(SessionManagerConfig::new().with_auto_cleanup(false));
    let processor = Arc::new(RequestProcessor::new(routes(), Arc::new(sessions)));

    let (request_tx, request_rx) = mpsc::unbounded_channel();
    let (response_tx, response_rx) = mpsc::unbounded_channel();
    tokio::spawn(Arc::clone(&processor).serve(request_rx, response_tx));

    let session_id = SessionManager::issue_id();
    let client = Arc::new(ClientCorrelator::new(request_tx, session_id.clone()));
    tokio::spawn(Arc::clone(&client).run(response_rx));

    Harness { client, processor, session_id }
}

fn payload(value: Value) -> Payload {
    value.as_object().cloned().unwrap_or_default()
}

impl Harness {
    async fn call(&self, method: RequestMethod, route: &str, body: Value) -> Result<Option<Value>, ClientError> {
        self.client.send(route, payload(body), method, None).await?.single().await
    }

    fn session(&self) -> Arc<Session> {
        self.processor.sessions().session(&self.session_id)
    }
}

#[tokio::test]
async fn test_value_round_trip_with_default() {
    let h = harness();
    let greeting = h.call(RequestMethod::Post, "greet", json!({"name": "Ann", "extra": 1})).await;
    assert_eq!(greeting, Ok(Some(json!("Hello, Ann!"))));
}

#[tokio::test]
async fn test_missing_parameter_is_bad_request() {
    let h = harness();
    let err = h.call(RequestMethod::Post, "greet", json!({})).await.unwrap_err();
    match err {
        ClientError::Remote { status, payload } => {
            assert_eq!(status, ResponseStatus::BadRequest);
            assert!(payload.unwrap().as_str().unwrap().contains("'name'"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_method_qualifies_route() {
    let h = harness();
    let err = h.call(RequestMethod::Get, "greet", json!({"name": "Ann"})).await.unwrap_err();
    assert!(matches!(err, ClientError::Remote { status: ResponseStatus::BadRequest, .. }));
}

#[tokio::test]
async fn test_login_unlocks_role_guarded_route() {
    let h = harness();
    let denied = h.call(RequestMethod::Get, "admin/stats", Value::Null).await.unwrap_err();
    assert_eq!(denied, ClientError::Remote { status: ResponseStatus::PermissionDenied, payload: None });

    h.call(RequestMethod::Post, "auth/login", json!({"user": "ann", "roles": ["admin"]}))
        .await
        .unwrap();
    let stats = h.call(RequestMethod::Get, "admin/stats", Value::Null).await;
    assert_eq!(stats, Ok(Some(json!({"players": 3}))));

    let again = h.call(RequestMethod::Post, "auth/login", json!({"user": "ann"})).await.unwrap_err();
    assert!(matches!(again, ClientError::Remote { status: ResponseStatus::OnlyForNotAuthorized, .. }));
}

#[tokio::test]
async fn test_logout_destroys_session_and_next_call_starts_fresh() {
    let h = harness();
    h.call(RequestMethod::Post, "auth/login", json!({"user": "ann", "roles": ["admin"]}))
        .await
        .unwrap();
    assert_eq!(h.call(RequestMethod::Get, "visits", Value::Null).await, Ok(Some(json!(1))));
    let old = h.session();

    h.call(RequestMethod::Post, "auth/logout", Value::Null).await.unwrap();
    assert!(old.is_destroyed());

    let denied = h.call(RequestMethod::Post, "auth/logout", Value::Null).await.unwrap_err();
    assert!(matches!(denied, ClientError::Remote { status: ResponseStatus::NotAuthorized, .. }));
    assert_eq!(h.call(RequestMethod::Get, "visits", Value::Null).await, Ok(Some(json!(1))));
}

#[tokio::test]
async fn test_session_state_survives_between_calls() {
    let h = harness();
    for expected in 1..=3 {
        assert_eq!(h.call(RequestMethod::Get, "visits", Value::Null).await, Ok(Some(json!(expected))));
    }
}

#[tokio::test]
async fn test_stream_delivers_values_then_completes() {
    let h = harness();
    let handle = h.client.send("ticks/3", Payload::new(), RequestMethod::Get, None).await.unwrap();

    let events: Vec<_> = handle.collect().await;
    assert_eq!(events, vec![Ok(json!(1)), Ok(json!(2)), Ok(json!(3))]);
    assert_eq!(h.client.pending_count(), 0);
    assert_eq!(h.session().emitter_count(), 0);
}

#[tokio::test]
async fn test_stream_failure_closes_with_payload() {
    let h = harness();
    let handle = h.client.send("broken-stream", Payload::new(), RequestMethod::Get, None).await.unwrap();

    // CLOSE completes the handle; its payload is not a value
    let events: Vec<_> = handle.collect().await;
    assert_eq!(events, vec![Ok(json!(1))]);
    assert_eq!(h.processor.stats().failures, 1);
}

#[tokio::test]
async fn test_close_stream_cancels_server_side() {
    let h = harness();
    let mut handle = h.client.send("ticker", Payload::new(), RequestMethod::Get, None).await.unwrap();

    assert_eq!(handle.next().await, Some(Ok(json!(0))));
    assert_eq!(h.session().emitter_count(), 1);

    h.client.close_stream(handle.id()).await.unwrap();
    let drained = tokio::time::timeout(Duration::from_secs(1), async {
        while let Some(event) = handle.next().await {
            assert!(event.is_ok());
        }
    })
    .await;
    assert!(drained.is_ok(), "handle should complete after CLOSE");
    assert_eq!(h.session().emitter_count(), 0);
    assert_eq!(h.client.pending_count(), 0);

    // closing again is a no-op
    h.client.close_stream(handle.id()).await.unwrap();
}

#[tokio::test]
async fn test_timeout_then_late_response_is_dropped() {
    let h = harness();
    let handle = h
        .client
        .send("slow", Payload::new(), RequestMethod::Get, Some(Duration::from_millis(30)))
        .await
        .unwrap();
    let id = handle.id();

    let err = handle.single().await.unwrap_err();
    assert!(matches!(err, ClientError::Timeout { id: timed_out, .. } if timed_out == id));

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(h.client.pending_count(), 0);
    assert_eq!(h.processor.stats().requests, 1);
}

#[tokio::test]
async fn test_concurrent_calls_are_demultiplexed() {
    let h = harness();
    let mut calls = Vec::new();
    for i in 0..32 {
        let client = Arc::clone(&h.client);
        calls.push(tokio::spawn(async move {
            let name = format!("p{}", i);
            let reply = client
                .send("greet", payload(json!({"name": name, "punctuation": "?"})), RequestMethod::Post, None)
                .await?
                .single()
                .await?;
            Ok::<_, ClientError>((name, reply))
        }));
    }

    for call in calls {
        let (name, reply) = call.await.unwrap().unwrap();
        assert_eq!(reply, Some(json!(format!("Hello, {}?", name))));
    }
}

#[tokio::test]
async fn test_frames_survive_json_encoding() {
    let sessions = SessionManager::with_config(SessionManagerConfig::new().with_auto_cleanup(false));
    let processor = RequestProcessor::new(routes(), Arc::new(sessions));
    let session_id = SessionManager::issue_id();

    let wire = format!(
        r#"{{"id": 41, "session": "{}", "route": "greet", "requestMethod": "POST", "payload": {{"name": "Bo"}}}}"#,
        session_id
    );
    let Frame::Request(request) = Frame::from_json(&wire).unwrap() else { panic!("expected a request") };

    let responses: Vec<_> = processor.process(request).await.collect().await;
    let encoded = Frame::from(responses[0].clone()).to_json().unwrap();
    let decoded: Value = serde_json::from_str(&encoded).unwrap();
    assert_eq!(decoded, json!({"id": 41, "status": "OK", "payload": "Hello, Bo!"}));
}
