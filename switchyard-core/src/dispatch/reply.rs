//! What a handler hands back to the dispatcher

use std::fmt;

use futures::stream::{BoxStream, Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;

use crate::error::{Result, RpcError};
use crate::protocol::ResponseStatus;

/// Values produced by a streaming handler
pub type ValueStream = BoxStream<'static, Result<Value>>;

/// A single response with an explicit status (a deferred result)
#[derive(Debug, Clone, PartialEq)]
pub struct Mono {
    pub status: ResponseStatus,
    pub payload: Option<Value>,
}

impl Mono {
    pub fn new(status: ResponseStatus, payload: Option<Value>) -> Self {
        Self { status, payload }
    }

    /// A bare status without payload
    pub fn status(status: ResponseStatus) -> Self {
        Self { status, payload: None }
    }

    pub fn ok(payload: Option<Value>) -> Self {
        Self { status: ResponseStatus::Ok, payload }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ResponseStatus::Ok
    }
}

/// Handler return value
pub enum Reply {
    /// One OK response, with or without payload
    Value(Option<Value>),
    /// One response carrying the mono's status and payload verbatim
    Mono(Mono),
    /// STREAM responses for each item, then a CLOSE
    Stream(ValueStream),
}

impl Reply {
    /// OK with no payload
    pub fn empty() -> Self {
        Reply::Value(None)
    }

    pub fn json(value: Value) -> Self {
        Reply::Value(Some(value))
    }

    /// OK carrying `value` serialized to JSON
    pub fn value<T: Serialize>(value: T) -> Result<Self> {
        Ok(Reply::Value(Some(serde_json::to_value(value).map_err(anyhow::Error::from)?)))
    }

    pub fn mono(status: ResponseStatus, payload: Option<Value>) -> Self {
        Reply::Mono(Mono::new(status, payload))
    }

    /// Stream whose items are serialized to JSON as they are produced
    pub fn stream<S, T>(stream: S) -> Self
    where
        S: Stream<Item = Result<T>> + Send + 'static,
        T: Serialize,
    {
        Reply::Stream(
            stream
                .map(|item| {
                    item.and_then(|value| {
                        serde_json::to_value(value).map_err(|e| RpcError::Internal(e.into()))
                    })
                })
                .boxed(),
        )
    }
}

impl From<Mono> for Reply {
    fn from(mono: Mono) -> Self {
        Reply::Mono(mono)
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Reply::Mono(mono) => f.debug_tuple("Mono").field(mono).finish(),
            Reply::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}
