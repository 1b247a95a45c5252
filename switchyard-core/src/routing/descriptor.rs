//! Route metadata handed to the route table at startup
//!
//! Descriptors are produced by whatever discovers controllers (a macro, a
//! hand-written registration function, ...). The core never inspects
//! handler types itself: each descriptor carries its handler closure and the
//! ordered list of parameters that closure expects.

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::dispatch::Reply;
use crate::error::RpcError;
use crate::protocol::RequestMethod;
use crate::resolve::Arguments;
use crate::session::TypeKey;

/// Future returned by a route handler
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Reply, RpcError>> + Send + 'static>>;

/// Route handler: receives the positional arguments and produces a reply
pub type Handler = Arc<dyn Fn(Arguments) -> HandlerFuture + Send + Sync>;

/// Declared type of a handler parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Bool,
    Integer,
    Float,
    Text,
    List,
    Object,
    /// Accepts any JSON value unchanged
    Any,
    /// A value looked up in the session store
    Session(TypeKey),
}

impl ParamType {
    pub fn name(&self) -> &'static str {
        match self {
            ParamType::Bool => "boolean",
            ParamType::Integer => "integer",
            ParamType::Float => "float",
            ParamType::Text => "string",
            ParamType::List => "list",
            ParamType::Object => "object",
            ParamType::Any => "any",
            ParamType::Session(key) => key.name(),
        }
    }

    /// Build a value of this type from its canonical string form
    pub fn parse(&self, raw: &str) -> Result<Value, String> {
        match self {
            ParamType::Bool => raw.parse::<bool>().map(Value::Bool).map_err(|e| e.to_string()),
            ParamType::Integer => raw.parse::<i64>().map(Value::from).map_err(|e| e.to_string()),
            ParamType::Float => {
                let parsed = raw.parse::<f64>().map_err(|e| e.to_string())?;
                serde_json::Number::from_f64(parsed)
                    .map(Value::Number)
                    .ok_or_else(|| format!("{} is not a finite number", raw))
            }
            ParamType::Text | ParamType::Any => Ok(Value::String(raw.to_string())),
            ParamType::List | ParamType::Object => {
                let parsed: Value = serde_json::from_str(raw).map_err(|e| e.to_string())?;
                if self.accepts(&parsed) {
                    Ok(parsed)
                } else {
                    Err(format!("expected {}", self.name()))
                }
            }
            ParamType::Session(key) => {
                Err(format!("{} cannot be built from a string", key.name()))
            }
        }
    }

    /// Whether a payload value can be handed to a parameter of this type.
    ///
    /// `null` is accepted everywhere; integers widen to floats.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (ParamType::Any, _) => true,
            (ParamType::Bool, Value::Bool(_)) => true,
            (ParamType::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (ParamType::Float, Value::Number(_)) => true,
            (ParamType::Text, Value::String(_)) => true,
            (ParamType::List, Value::Array(_)) => true,
            (ParamType::Object, Value::Object(_)) => true,
            _ => false,
        }
    }
}

/// JSON type name used in incompatibility messages
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

/// Default for a payload parameter absent from the request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultValue {
    /// No default: absence is an error
    Required,
    /// Absence resolves to `null`
    Null,
    /// Absence resolves to this literal, parsed with the parameter's type
    Literal(String),
}

/// Where a parameter's value comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    PathVar,
    PayloadArg,
    SessionInjected,
}

/// One handler parameter, in declaration order
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub name: String,
    pub ty: ParamType,
    pub default: DefaultValue,
    pub resolution: Resolution,
}

impl ParameterSpec {
    /// Parameter captured from a `{name}` path segment
    pub fn path(name: impl Into<String>, ty: ParamType) -> Self {
        Self { name: name.into(), ty, default: DefaultValue::Required, resolution: Resolution::PathVar }
    }

    /// Required parameter read from the request payload
    pub fn payload(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            default: DefaultValue::Required,
            resolution: Resolution::PayloadArg,
        }
    }

    /// Parameter injected from the session store under `T`'s key
    pub fn session<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ParamType::Session(TypeKey::of::<T>()),
            default: DefaultValue::Null,
            resolution: Resolution::SessionInjected,
        }
    }

    /// Use `literal` when the payload lacks this parameter
    pub fn with_default(mut self, literal: impl Into<String>) -> Self {
        self.default = DefaultValue::Literal(literal.into());
        self
    }

    /// Resolve to `null` when the payload lacks this parameter
    pub fn nullable(mut self) -> Self {
        self.default = DefaultValue::Null;
        self
    }
}

/// Access rule evaluated before a handler runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AccessType {
    #[default]
    AllAllowed,
    OnlyLoggedIn,
    OnlyNotLoggedIn,
    OnlyWithSpecificRoles,
}

/// A routable handler together with everything needed to call it
#[derive(Clone)]
pub struct RouteDescriptor {
    pattern: String,
    method: RequestMethod,
    handler: Handler,
    parameters: Vec<ParameterSpec>,
    access: AccessType,
    allowed_roles: BTreeSet<String>,
}

impl RouteDescriptor {
    /// Create a descriptor for an async handler
    pub fn new<F, Fut>(method: RequestMethod, pattern: &str, handler: F) -> Self
    where
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply, RpcError>> + Send + 'static,
    {
        Self {
            pattern: pattern.to_string(),
            method,
            handler: Arc::new(move |args| Box::pin(handler(args))),
            parameters: Vec::new(),
            access: AccessType::AllAllowed,
            allowed_roles: BTreeSet::new(),
        }
    }

    pub fn get<F, Fut>(pattern: &str, handler: F) -> Self
    where
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply, RpcError>> + Send + 'static,
    {
        Self::new(RequestMethod::Get, pattern, handler)
    }

    pub fn post<F, Fut>(pattern: &str, handler: F) -> Self
    where
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply, RpcError>> + Send + 'static,
    {
        Self::new(RequestMethod::Post, pattern, handler)
    }

    pub fn put<F, Fut>(pattern: &str, handler: F) -> Self
    where
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply, RpcError>> + Send + 'static,
    {
        Self::new(RequestMethod::Put, pattern, handler)
    }

    pub fn delete<F, Fut>(pattern: &str, handler: F) -> Self
    where
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply, RpcError>> + Send + 'static,
    {
        Self::new(RequestMethod::Delete, pattern, handler)
    }

    /// Append a parameter; call in handler declaration order
    pub fn param(mut self, spec: ParameterSpec) -> Self {
        self.parameters.push(spec);
        self
    }

    pub fn access(mut self, access: AccessType) -> Self {
        self.access = access;
        self
    }

    /// Restrict the route to sessions holding one of `roles`
    pub fn roles<I, R>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        self.allowed_roles = roles.into_iter().map(Into::into).collect();
        self.access = AccessType::OnlyWithSpecificRoles;
        self
    }

    pub(crate) fn with_pattern(mut self, pattern: String) -> Self {
        self.pattern = pattern;
        self
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn method(&self) -> RequestMethod {
        self.method
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    pub fn access_type(&self) -> AccessType {
        self.access
    }

    pub fn allowed_roles(&self) -> &BTreeSet<String> {
        &self.allowed_roles
    }

    /// `METHOD:pattern` form used in logs
    pub fn qualified(&self) -> String {
        format!("{}:{}", self.method, self.pattern)
    }
}

impl fmt::Debug for RouteDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDescriptor")
            .field("method", &self.method)
            .field("pattern", &self.pattern)
            .field("parameters", &self.parameters)
            .field("access", &self.access)
            .field("allowed_roles", &self.allowed_roles)
            .finish()
    }
}

/// A group of routes sharing a base path
#[derive(Debug, Clone, Default)]
pub struct Controller {
    base_path: String,
    routes: Vec<RouteDescriptor>,
}

impl Controller {
    pub fn new(base_path: impl Into<String>) -> Self {
        Self { base_path: base_path.into(), routes: Vec::new() }
    }

    pub fn route(mut self, route: RouteDescriptor) -> Self {
        self.routes.push(route);
        self
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Routes with the base path prefixed onto their patterns
    pub fn into_routes(self) -> impl Iterator<Item = RouteDescriptor> {
        let base = self.base_path.trim_matches('/').to_string();
        self.routes.into_iter().map(move |route| {
            let relative = route.pattern().trim_matches('/');
            let joined = match (base.is_empty(), relative.is_empty()) {
                (true, _) => relative.to_string(),
                (false, true) => base.clone(),
                (false, false) => format!("{}/{}", base, relative),
            };
            route.with_pattern(joined)
        })
    }
}
