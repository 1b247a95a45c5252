//! Client-side request/response correlation
//!
//! Many calls share one channel. Each call gets a fresh id and a pending entry
//! holding its event sink; incoming responses are routed back by id. Whoever
//! removes a pending entry (a terminal response, the timeout timer or
//! [`ClientCorrelator::fail_all`]) delivers the one terminal signal, so a late
//! response after a timeout finds nothing and is dropped.

use std::pin::Pin;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{self, AbortHandle};
use futures::Stream;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::protocol::{Payload, Request, RequestMethod, Response, ResponseStatus};

/// Outbound half of the transport
#[async_trait]
pub trait RequestSink: Send + Sync {
    async fn send(&self, request: Request) -> Result<(), ClientError>;
}

#[async_trait]
impl RequestSink for mpsc::UnboundedSender<Request> {
    async fn send(&self, request: Request) -> Result<(), ClientError> {
        mpsc::UnboundedSender::send(self, request)
            .map_err(|_| ClientError::Transport("request channel closed".to_string()))
    }
}

#[async_trait]
impl RequestSink for mpsc::Sender<Request> {
    async fn send(&self, request: Request) -> Result<(), ClientError> {
        mpsc::Sender::send(self, request)
            .await
            .map_err(|_| ClientError::Transport("request channel closed".to_string()))
    }
}

type Event = Result<Value, ClientError>;

struct PendingCall {
    events: mpsc::UnboundedSender<Event>,
    timer: AbortHandle,
    deadline: Instant,
}

impl PendingCall {
    /// Deliver the terminal event (if any) and stop the timer
    fn finish(self, last: Option<Event>) {
        self.timer.abort();
        if let Some(event) = last {
            let _ = self.events.send(event);
        }
    }
}

type PendingTable = scc::HashMap<i64, PendingCall>;

/// Caller side of the protocol
pub struct ClientCorrelator {
    sink: Arc<dyn RequestSink>,
    session_id: RwLock<String>,
    next_id: AtomicI64,
    pending: Arc<PendingTable>,
    default_timeout: Duration,
}

impl ClientCorrelator {
    pub fn new(sink: impl RequestSink + 'static, session_id: impl Into<String>) -> Self {
        Self::with_config(sink, session_id, &ClientConfig::default())
    }

    pub fn with_config(
        sink: impl RequestSink + 'static,
        session_id: impl Into<String>,
        config: &ClientConfig,
    ) -> Self {
        Self {
            sink: Arc::new(sink),
            session_id: RwLock::new(session_id.into()),
            next_id: AtomicI64::new(1),
            pending: Arc::new(PendingTable::new()),
            default_timeout: config.default_timeout(),
        }
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn session_id(&self) -> String {
        self.session_id.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Use `session_id` for every request sent from now on
    pub fn set_session_id(&self, session_id: impl Into<String>) {
        *self.session_id.write().unwrap_or_else(|e| e.into_inner()) = session_id.into();
    }

    /// Calls still waiting for a terminal signal
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Send a request and return the handle its responses arrive on.
    ///
    /// `timeout` falls back to the configured default.
    pub async fn send(
        &self,
        route: &str,
        payload: Payload,
        method: RequestMethod,
        timeout: Option<Duration>,
    ) -> Result<CallHandle, ClientError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let timeout = timeout.unwrap_or(self.default_timeout);
        let (events, receiver) = mpsc::unbounded_channel();
        let (timer, abort) = future::abortable(tokio::time::sleep(timeout));

        let call = PendingCall { events, timer: abort, deadline: deadline_after(timeout) };
        if let Err((_, call)) = self.pending.insert_sync(id, call) {
            call.finish(None);
            return Err(ClientError::DuplicateRequestId(id));
        }

        let pending = Arc::downgrade(&self.pending);
        tokio::spawn(async move {
            if timer.await.is_ok() {
                expire(&pending, id, timeout);
            }
        });

        let request = Request::new(id, self.session_id(), route, method, payload);
        log::debug!("Sending request {} {}:{}", id, method, route);
        if let Err(error) = self.sink.send(request).await {
            if let Some((_, call)) = self.pending.remove_sync(&id) {
                call.finish(None);
            }
            return Err(error);
        }

        Ok(CallHandle { id, events: receiver })
    }

    /// Ask the server to cancel the stream opened by request `id`.
    ///
    /// The local sink stays registered: STREAM events already in flight are
    /// still delivered, and the CLOSE answer completes the handle.
    pub async fn close_stream(&self, id: i64) -> Result<(), ClientError> {
        log::debug!("Closing stream {}", id);
        self.sink.send(Request::close_stream(id, self.session_id())).await
    }

    /// Route one incoming response to its pending call
    pub fn on_response(&self, response: Response) {
        let Response { id, status, payload } = response;

        if status == ResponseStatus::Stream {
            let delivered = self
                .pending
                .read_sync(&id, |_, call| call.events.send(Ok(payload.unwrap_or(Value::Null))).is_ok());
            match delivered {
                Some(true) => {}
                Some(false) => {
                    log::debug!("Handle for stream {} was dropped, forgetting it", id);
                    if let Some((_, call)) = self.pending.remove_sync(&id) {
                        call.finish(None);
                    }
                }
                None => log::debug!("Dropping STREAM response {}: no pending call", id),
            }
            return;
        }

        let Some((_, call)) = self.pending.remove_sync(&id) else {
            log::debug!("Dropping {} response {}: no pending call", status, id);
            return;
        };

        let last = match status {
            ResponseStatus::Ok => payload.map(Ok),
            ResponseStatus::Close => None,
            _ => Some(Err(ClientError::Remote { status, payload })),
        };
        call.finish(last);
    }

    /// Fail every pending call, e.g. when the transport goes away
    pub fn fail_all(&self, reason: &str) -> usize {
        let mut failed = 0;
        self.pending.retain_sync(|_, call| {
            call.timer.abort();
            let _ = call.events.send(Err(ClientError::Transport(reason.to_string())));
            failed += 1;
            false
        });
        if failed > 0 {
            log::warn!("Failed {} pending calls: {}", failed, reason);
        }
        failed
    }

    /// Feed responses from `responses` until it closes, then fail what is left
    pub async fn run(self: Arc<Self>, mut responses: mpsc::UnboundedReceiver<Response>) {
        while let Some(response) = responses.recv().await {
            self.on_response(response);
        }
        self.fail_all("response channel closed");
    }

    /// Time left before the call `id` times out, if it is still pending
    pub fn remaining(&self, id: i64) -> Option<Duration> {
        self.pending
            .read_sync(&id, |_, call| call.deadline.saturating_duration_since(Instant::now()))
    }
}

/// Stand-in deadline for timeouts too large to represent
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout).unwrap_or_else(|| now + FAR_FUTURE)
}

fn expire(pending: &Weak<PendingTable>, id: i64, after: Duration) {
    let Some(pending) = pending.upgrade() else { return };
    if let Some((_, call)) = pending.remove_sync(&id) {
        log::warn!("Request {} timed out after {:?}", id, after);
        call.finish(Some(Err(ClientError::Timeout { id, after })));
    }
}

/// Events of one call: values, then completion or one failure
#[derive(Debug)]
pub struct CallHandle {
    id: i64,
    events: mpsc::UnboundedReceiver<Event>,
}

impl CallHandle {
    pub fn id(&self) -> i64 {
        self.id
    }

    /// First value of the call, `None` if it completed without one
    pub async fn single(mut self) -> Result<Option<Value>, ClientError> {
        self.events.recv().await.transpose()
    }
}

impl Stream for CallHandle {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    fn correlator() -> (ClientCorrelator, mpsc::UnboundedReceiver<Request>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ClientCorrelator::new(tx, "session"), rx)
    }

    async fn call(client: &ClientCorrelator, timeout: Option<Duration>) -> CallHandle {
        client.send("player/1", Payload::new(), RequestMethod::Get, timeout).await.unwrap()
    }

    #[tokio::test]
    async fn test_ids_increase_and_requests_are_sent() {
        let (client, mut requests) = correlator();
        let first = call(&client, None).await;
        let second = call(&client, None).await;

        assert!(second.id() > first.id());
        let sent = requests.recv().await.unwrap();
        assert_eq!(sent.id(), first.id());
        assert_eq!(sent.session(), "session");
        assert_eq!(client.pending_count(), 2);
    }

    #[tokio::test]
    async fn test_unbounded_timeout_does_not_overflow() {
        let (client, mut requests) = correlator();
        let handle = call(&client, Some(Duration::MAX)).await;

        assert_eq!(requests.recv().await.unwrap().id(), handle.id());
        let remaining = client.remaining(handle.id()).unwrap();
        assert!(remaining > Duration::from_secs(86_400 * 365));

        client.on_response(Response::ok(handle.id(), None));
        assert_eq!(handle.single().await, Ok(None));
    }

    #[tokio::test]
    async fn test_ok_with_payload_emits_then_completes() {
        let (client, _requests) = correlator();
        let handle = call(&client, None).await;

        client.on_response(Response::ok(handle.id(), Some(json!({"name": "ann"}))));
        let events: Vec<Event> = handle.collect().await;
        assert_eq!(events, vec![Ok(json!({"name": "ann"}))]);
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_ok_without_payload_completes_only() {
        let (client, _requests) = correlator();
        let handle = call(&client, None).await;

        client.on_response(Response::ok(handle.id(), None));
        assert_eq!(handle.single().await, Ok(None));
    }

    #[tokio::test]
    async fn test_stream_stays_open_until_close() {
        let (client, _requests) = correlator();
        let mut handle = call(&client, None).await;
        let id = handle.id();

        client.on_response(Response::stream(id, json!(1)));
        client.on_response(Response::stream(id, json!(2)));
        assert_eq!(handle.next().await, Some(Ok(json!(1))));
        assert_eq!(handle.next().await, Some(Ok(json!(2))));
        assert_eq!(client.pending_count(), 1);

        client.on_response(Response::close(id, Some(json!("ignored"))));
        assert_eq!(handle.next().await, None);
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_error_status_fails_the_handle() {
        let (client, _requests) = correlator();
        let handle = call(&client, None).await;

        let payload = Some(json!("Team is full"));
        client.on_response(Response::new(handle.id(), ResponseStatus::Error, payload.clone()));
        assert_eq!(
            handle.single().await,
            Err(ClientError::Remote { status: ResponseStatus::Error, payload })
        );
    }

    #[tokio::test]
    async fn test_timeout_fails_and_late_response_is_dropped() {
        let (client, _requests) = correlator();
        let mut handle = call(&client, Some(Duration::from_millis(20))).await;
        let id = handle.id();

        let first = handle.next().await;
        assert!(matches!(first, Some(Err(ClientError::Timeout { id: timed_out, .. })) if timed_out == id));
        assert_eq!(client.pending_count(), 0);

        client.on_response(Response::ok(id, Some(json!("late"))));
        assert_eq!(handle.next().await, None);
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_close_stream_keeps_the_sink() {
        let (client, mut requests) = correlator();
        let handle = call(&client, None).await;
        let _ = requests.recv().await;

        client.close_stream(handle.id()).await.unwrap();
        let close = requests.recv().await.unwrap();
        assert_eq!(close.kind(), crate::protocol::RequestType::CloseStream);
        assert_eq!(close.id(), handle.id());
        assert_eq!(client.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_fail_all_and_closed_transport() {
        let (client, requests) = correlator();
        let handle = call(&client, None).await;

        assert_eq!(client.fail_all("connection lost"), 1);
        assert_eq!(handle.single().await, Err(ClientError::Transport("connection lost".into())));

        drop(requests);
        let err = client.send("x", Payload::new(), RequestMethod::Get, None).await.unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_session_id_can_change() {
        let (client, mut requests) = correlator();
        client.set_session_id("other");
        let _handle = call(&client, None).await;
        assert_eq!(requests.recv().await.unwrap().session(), "other");
    }
}
