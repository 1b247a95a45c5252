//! The request processor
//!
//! Every inbound [`Request`] becomes a stream of [`Response`]s: exactly one for
//! plain, deferred and failed calls, or a STREAM sequence closed by a single
//! CLOSE for streaming handlers. Nothing a handler does (including panicking)
//! escapes `process`.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use futures::FutureExt;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::config::{DispatcherConfig, SwitchyardConfig};
use crate::dispatch::{ExceptionClassifier, Reply, ValueStream};
use crate::error::{Result, RpcError};
use crate::logging::RequestContext;
use crate::protocol::{Request, RequestType, Response};
use crate::resolve::Arguments;
use crate::routing::{Handler, RouteTable};
use crate::security::PermissionEvaluator;
use crate::session::{EmitterHandle, Session, SessionManager};

/// Responses produced for one request, in emission order
pub type ResponseStream = BoxStream<'static, Response>;

#[derive(Debug, Default)]
struct Counters {
    requests: AtomicU64,
    failures: AtomicU64,
    streams_opened: AtomicU64,
    open_streams: AtomicU64,
}

/// Snapshot of dispatcher activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    /// Requests received, CLOSE_STREAM included
    pub requests: u64,
    /// Requests answered with a failure status, plus streams closed by an error
    pub failures: u64,
    pub streams_opened: u64,
    /// Streams currently being bridged
    pub open_streams: u64,
}

/// Dispatcher: route, resolve, gate, invoke, shape
#[derive(Clone)]
pub struct RequestProcessor {
    routes: Arc<RouteTable>,
    sessions: Arc<SessionManager>,
    evaluator: PermissionEvaluator,
    classifier: ExceptionClassifier,
    config: DispatcherConfig,
    counters: Arc<Counters>,
}

impl RequestProcessor {
    pub fn new(routes: RouteTable, sessions: Arc<SessionManager>) -> Self {
        Self::with_config(routes, sessions, DispatcherConfig::default())
    }

    pub fn with_config(routes: RouteTable, sessions: Arc<SessionManager>, config: DispatcherConfig) -> Self {
        log::info!("Dispatcher ready with {} routes", routes.len());
        Self {
            routes: Arc::new(routes),
            sessions,
            evaluator: PermissionEvaluator::new(),
            classifier: ExceptionClassifier::new(config.expose_diagnostics),
            config,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Build the processor and its session manager from loaded configuration
    pub fn from_config(routes: RouteTable, config: &SwitchyardConfig) -> Self {
        let sessions = Arc::new(SessionManager::with_config(config.sessions.manager_config()));
        Self::with_config(routes, sessions, config.dispatcher.clone())
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            requests: self.counters.requests.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
            streams_opened: self.counters.streams_opened.load(Ordering::Relaxed),
            open_streams: self.counters.open_streams.load(Ordering::Relaxed),
        }
    }

    /// Handle one request. Never fails: errors come back as responses.
    pub async fn process(&self, request: Request) -> ResponseStream {
        self.counters.requests.fetch_add(1, Ordering::Relaxed);
        let context = RequestContext::new(request.id(), request.session(), request.route());

        context
            .clone()
            .scope(async move {
                match request.kind() {
                    RequestType::CloseStream => single(self.close_stream(&request)),
                    RequestType::Standard => match self.dispatch(&request, context).await {
                        Ok(responses) => responses,
                        Err(error) => {
                            self.counters.failures.fetch_add(1, Ordering::Relaxed);
                            let mono = self.classifier.classify(&error);
                            single(Response::new(request.id(), mono.status, mono.payload))
                        }
                    },
                }
            })
            .await
    }

    /// Serve requests from a channel until it closes, one task per request.
    ///
    /// Responses of one request keep their order; different requests
    /// interleave freely.
    pub async fn serve(
        self: Arc<Self>,
        mut requests: mpsc::UnboundedReceiver<Request>,
        responses: mpsc::UnboundedSender<Response>,
    ) {
        while let Some(request) = requests.recv().await {
            let processor = Arc::clone(&self);
            let responses = responses.clone();
            tokio::spawn(async move {
                let mut stream = processor.process(request).await;
                while let Some(response) = stream.next().await {
                    if responses.send(response).is_err() {
                        log::debug!("Response channel closed, dropping remaining responses");
                        break;
                    }
                }
            });
        }
        log::debug!("Request channel closed, dispatcher loop ending");
    }

    fn close_stream(&self, request: &Request) -> Response {
        let id = request.id();
        let cancelled = self
            .sessions
            .find(request.session())
            .map(|session| session.unregister_emitter(id).unwrap_or(false))
            .unwrap_or(false);

        if cancelled {
            log::debug!("Stream {} cancelled by caller", id);
        } else {
            log::debug!("CLOSE_STREAM for {} matched no open stream", id);
        }
        Response::close(id, None)
    }

    async fn dispatch(&self, request: &Request, context: RequestContext) -> Result<ResponseStream> {
        let id = request.id();
        self.check_session_id(request.session())?;

        let session = self.sessions.session(request.session());
        let matched = self.routes.match_route(request.route(), request.method())?;
        log::debug!("Dispatching {} to {}", request.route(), matched.descriptor.qualified());

        let arguments = Arguments::resolve(&matched, request.route(), request.payload(), &session)?;

        let verdict = self.evaluator.evaluate(&session, &matched.descriptor)?;
        if !verdict.is_ok() {
            self.counters.failures.fetch_add(1, Ordering::Relaxed);
            return Ok(single(Response::new(id, verdict.status, verdict.payload)));
        }

        let reply = invoke(matched.descriptor.handler(), arguments).await?;

        Ok(match reply {
            Reply::Value(payload) => single(Response::ok(id, payload)),
            Reply::Mono(mono) => {
                if mono.status.is_failure() {
                    self.counters.failures.fetch_add(1, Ordering::Relaxed);
                }
                single(Response::new(id, mono.status, mono.payload))
            }
            Reply::Stream(upstream) => self.bridge(id, session, upstream, context)?,
        })
    }

    fn check_session_id(&self, session_id: &str) -> Result<()> {
        let length = session_id.chars().count();
        if length < self.config.min_session_id_length {
            return Err(RpcError::InvalidSessionId(format!(
                "expected at least {} characters, got {}",
                self.config.min_session_id_length, length
            )));
        }
        Ok(())
    }

    /// Register `upstream` as a cancelable emitter and turn its events into
    /// STREAM responses followed by one CLOSE
    fn bridge(
        &self,
        id: i64,
        session: Arc<Session>,
        upstream: ValueStream,
        context: RequestContext,
    ) -> Result<ResponseStream> {
        // A panicking upstream ends the stream with a failure CLOSE
        let guarded = AssertUnwindSafe(upstream)
            .catch_unwind()
            .map(|item| match item {
                Ok(item) => item,
                Err(panic) => Err(RpcError::internal(format!(
                    "stream panicked: {}",
                    panic_message(&*panic)
                ))),
            })
            .boxed();
        let (mut upstream, abort) = stream::abortable(guarded);
        let handle = EmitterHandle::new(abort);
        let token = handle.token();
        session.register_emitter(id, handle)?;

        self.counters.streams_opened.fetch_add(1, Ordering::Relaxed);
        self.counters.open_streams.fetch_add(1, Ordering::Relaxed);
        let guard = EmitterGuard {
            session: Arc::clone(&session),
            id,
            token,
            counters: Arc::clone(&self.counters),
        };
        log::debug!("Stream {} opened", id);

        let classifier = self.classifier;
        let counters = Arc::clone(&self.counters);

        let responses = async_stream::stream! {
            let terminal = loop {
                match upstream.next().await {
                    Some(Ok(value)) => yield Response::stream(id, value),
                    Some(Err(error)) => {
                        counters.failures.fetch_add(1, Ordering::Relaxed);
                        log::debug!("Stream {} failed: {}", id, error);
                        break Some(Response::close(id, classifier.classify(&error).payload));
                    }
                    None if upstream.is_aborted() => {
                        if session.is_destroyed() {
                            log::debug!("Stream {} stopped by session destroy", id);
                            break Some(Response::close(id, classifier.classify(&RpcError::SessionExpired).payload));
                        }
                        // the CLOSE_STREAM request already answered with CLOSE
                        break None;
                    }
                    None => {
                        log::debug!("Stream {} completed", id);
                        break Some(Response::close(id, None));
                    }
                }
            };

            drop(guard);
            if let Some(response) = terminal {
                yield response;
            }
        };

        Ok(context.scope_stream(responses).boxed())
    }
}

/// Releases a stream's emitter entry however its bridge ends
struct EmitterGuard {
    session: Arc<Session>,
    id: i64,
    token: u64,
    counters: Arc<Counters>,
}

impl Drop for EmitterGuard {
    fn drop(&mut self) {
        self.session.release_emitter(self.id, self.token);
        self.counters.open_streams.fetch_sub(1, Ordering::Relaxed);
    }
}

fn single(response: Response) -> ResponseStream {
    stream::once(async move { response }).boxed()
}

async fn invoke(handler: &Handler, arguments: Arguments) -> Result<Reply> {
    let handler = Arc::clone(handler);
    match AssertUnwindSafe(async move { handler(arguments).await }).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(RpcError::internal(format!("handler panicked: {}", panic_message(&*panic)))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}
