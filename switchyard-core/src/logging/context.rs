//! Per-request logging context
//!
//! The dispatcher runs each request inside a task-local [`RequestContext`];
//! the logger reads it so every line emitted while handling a request carries
//! its id, session and route without threading them through call sites.

use std::future::Future;

use futures::stream::{self, Stream, StreamExt};

/// Characters of a session id kept when it is written to a log
const SESSION_TAG_LEN: usize = 8;

/// Loggable form of a session id.
///
/// Session ids act as bearer credentials, so only a short prefix is logged.
pub fn session_tag(session_id: &str) -> String {
    match session_id.char_indices().nth(SESSION_TAG_LEN) {
        Some((end, _)) => format!("{}…", &session_id[..end]),
        None => session_id.to_string(),
    }
}

tokio::task_local! {
    static CURRENT: RequestContext;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: i64,
    pub session_id: String,
    pub route: String,
}

impl RequestContext {
    pub fn new(request_id: i64, session_id: impl Into<String>, route: impl Into<String>) -> Self {
        Self { request_id, session_id: session_id.into(), route: route.into() }
    }

    pub fn session_tag(&self) -> String {
        session_tag(&self.session_id)
    }

    /// Context of the request being handled by the current task, if any
    pub fn current() -> Option<RequestContext> {
        CURRENT.try_with(Clone::clone).ok()
    }

    /// Run `future` with this context installed
    pub async fn scope<F: Future>(self, future: F) -> F::Output {
        CURRENT.scope(self, future).await
    }

    /// Install this context around every poll of `inner`.
    ///
    /// Streams outlive the future that created them and are polled by whoever
    /// consumes the responses, so a plain `scope` would not cover them.
    pub fn scope_stream<S>(self, inner: S) -> impl Stream<Item = S::Item> + Send
    where
        S: Stream + Send + 'static,
    {
        let mut inner = inner.boxed();
        stream::poll_fn(move |cx| CURRENT.sync_scope(self.clone(), || inner.poll_next_unpin(cx)))
    }
}
