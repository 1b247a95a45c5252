//! Request and response frames exchanged over one logical channel
//!
//! Frames are transport-agnostic: they serialize to the JSON object layout
//! below, and the byte encoding on the wire belongs to the transport.
//!
//! ```text
//! request  { "id", "session", "route", "requestMethod", "requestType", "payload" }
//! response { "id", "status", "payload" }
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::FrameError;

/// Named request arguments carried by a request frame
pub type Payload = Map<String, Value>;

/// HTTP-like verb qualifying a route
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl RequestMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestMethod::Get => "GET",
            RequestMethod::Post => "POST",
            RequestMethod::Put => "PUT",
            RequestMethod::Delete => "DELETE",
            RequestMethod::Patch => "PATCH",
            RequestMethod::Head => "HEAD",
            RequestMethod::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a request invokes a route or cancels a stream opened earlier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestType {
    #[default]
    Standard,
    CloseStream,
}

/// Status carried by every response frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseStatus {
    Ok,
    Stream,
    Close,
    Error,
    InternalError,
    BadRequest,
    BadParameters,
    PermissionDenied,
    NotAuthorized,
    OnlyForNotAuthorized,
}

impl ResponseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStatus::Ok => "OK",
            ResponseStatus::Stream => "STREAM",
            ResponseStatus::Close => "CLOSE",
            ResponseStatus::Error => "ERROR",
            ResponseStatus::InternalError => "INTERNAL_ERROR",
            ResponseStatus::BadRequest => "BAD_REQUEST",
            ResponseStatus::BadParameters => "BAD_PARAMETERS",
            ResponseStatus::PermissionDenied => "PERMISSION_DENIED",
            ResponseStatus::NotAuthorized => "NOT_AUTHORIZED",
            ResponseStatus::OnlyForNotAuthorized => "ONLY_FOR_NOT_AUTHORIZED",
        }
    }

    /// True for every status that terminates a call with a failure
    pub fn is_failure(&self) -> bool {
        !matches!(self, ResponseStatus::Ok | ResponseStatus::Stream | ResponseStatus::Close)
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inbound call frame. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    id: i64,
    #[serde(default)]
    session: String,
    #[serde(default)]
    route: String,
    #[serde(rename = "requestMethod", default)]
    method: RequestMethod,
    #[serde(rename = "requestType", default)]
    kind: RequestType,
    #[serde(default, deserialize_with = "nullable_payload", skip_serializing_if = "Map::is_empty")]
    payload: Payload,
}

fn nullable_payload<'de, D>(deserializer: D) -> Result<Payload, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Payload>::deserialize(deserializer)?.unwrap_or_default())
}

impl Request {
    /// Create a standard request for `route`
    pub fn new(
        id: i64,
        session: impl Into<String>,
        route: impl Into<String>,
        method: RequestMethod,
        payload: Payload,
    ) -> Self {
        Self {
            id,
            session: session.into(),
            route: route.into(),
            method,
            kind: RequestType::Standard,
            payload,
        }
    }

    /// Create a request cancelling the stream opened by request `id`
    pub fn close_stream(id: i64, session: impl Into<String>) -> Self {
        Self {
            id,
            session: session.into(),
            route: String::new(),
            method: RequestMethod::default(),
            kind: RequestType::CloseStream,
            payload: Payload::new(),
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn method(&self) -> RequestMethod {
        self.method
    }

    pub fn kind(&self) -> RequestType {
        self.kind
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }
}

/// Outbound frame correlated to a request by `id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: i64,
    pub status: ResponseStatus,
    #[serde(default)]
    pub payload: Option<Value>,
}

impl Response {
    pub fn new(id: i64, status: ResponseStatus, payload: Option<Value>) -> Self {
        Self { id, status, payload }
    }

    pub fn ok(id: i64, payload: Option<Value>) -> Self {
        Self::new(id, ResponseStatus::Ok, payload)
    }

    pub fn stream(id: i64, payload: Value) -> Self {
        Self::new(id, ResponseStatus::Stream, Some(payload))
    }

    pub fn close(id: i64, payload: Option<Value>) -> Self {
        Self::new(id, ResponseStatus::Close, payload)
    }
}

/// Either kind of frame, for collaborators sharing one channel in both directions
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Request(Request),
    Response(Response),
}

/// Which kind of frame a JSON object describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Request,
    Response,
}

impl Frame {
    /// Classify a decoded JSON object without fully parsing it.
    ///
    /// `route` together with `requestMethod` marks a request, `status` marks a
    /// response.
    pub fn recognize(value: &Value) -> Result<FrameKind, FrameError> {
        let object = value.as_object().ok_or(FrameError::Unrecognized)?;
        if object.contains_key("route") && object.contains_key("requestMethod") {
            Ok(FrameKind::Request)
        } else if object.contains_key("status") {
            Ok(FrameKind::Response)
        } else {
            Err(FrameError::Unrecognized)
        }
    }

    pub fn from_value(value: Value) -> Result<Self, FrameError> {
        match Self::recognize(&value)? {
            FrameKind::Request => Ok(Frame::Request(serde_json::from_value(value)?)),
            FrameKind::Response => Ok(Frame::Response(serde_json::from_value(value)?)),
        }
    }

    pub fn from_json(text: &str) -> Result<Self, FrameError> {
        Self::from_value(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, FrameError> {
        let text = match self {
            Frame::Request(request) => serde_json::to_string(request)?,
            Frame::Response(response) => serde_json::to_string(response)?,
        };
        Ok(text)
    }

    pub fn id(&self) -> i64 {
        match self {
            Frame::Request(request) => request.id(),
            Frame::Response(response) => response.id,
        }
    }
}

impl From<Request> for Frame {
    fn from(request: Request) -> Self {
        Frame::Request(request)
    }
}

impl From<Response> for Frame {
    fn from(response: Response) -> Self {
        Frame::Response(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_defaults() {
        let request: Request =
            serde_json::from_value(json!({"id": 7, "session": "s", "route": "player/1"})).unwrap();

        assert_eq!(request.method(), RequestMethod::Get);
        assert_eq!(request.kind(), RequestType::Standard);
        assert!(request.payload().is_empty());
    }

    #[test]
    fn test_request_null_payload() {
        let request: Request = serde_json::from_value(json!({
            "id": 1,
            "route": "a",
            "requestMethod": "POST",
            "requestType": "CLOSE_STREAM",
            "payload": null
        }))
        .unwrap();

        assert_eq!(request.method(), RequestMethod::Post);
        assert_eq!(request.kind(), RequestType::CloseStream);
        assert!(request.payload().is_empty());
    }

    #[test]
    fn test_response_status_names() {
        let response = Response::new(3, ResponseStatus::OnlyForNotAuthorized, None);
        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(value["status"], "ONLY_FOR_NOT_AUTHORIZED");
        assert_eq!(value["payload"], Value::Null);
        assert_eq!(ResponseStatus::InternalError.to_string(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_frame_recognition() {
        let request = json!({"id": 1, "route": "x", "requestMethod": "GET"});
        let response = json!({"id": 1, "status": "OK"});
        let neither = json!({"id": 1, "route": "x"});

        assert_eq!(Frame::recognize(&request).unwrap(), FrameKind::Request);
        assert_eq!(Frame::recognize(&response).unwrap(), FrameKind::Response);
        assert!(matches!(Frame::recognize(&neither), Err(FrameError::Unrecognized)));
        assert!(matches!(Frame::recognize(&json!([1, 2])), Err(FrameError::Unrecognized)));
    }

    #[test]
    fn test_frame_json_roundtrip_keeps_field_names() {
        let mut payload = Payload::new();
        payload.insert("name".to_string(), json!("alice"));
        let frame = Frame::from(Request::new(9, "sid", "users", RequestMethod::Put, payload));

        let text = frame.to_json().unwrap();
        assert!(text.contains("\"requestMethod\":\"PUT\""));
        assert!(text.contains("\"requestType\":\"STANDARD\""));
        assert_eq!(Frame::from_json(&text).unwrap(), frame);
    }

    #[test]
    fn test_failure_statuses() {
        assert!(!ResponseStatus::Ok.is_failure());
        assert!(!ResponseStatus::Stream.is_failure());
        assert!(!ResponseStatus::Close.is_failure());
        assert!(ResponseStatus::BadRequest.is_failure());
        assert!(ResponseStatus::Error.is_failure());
    }
}
