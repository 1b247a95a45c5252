//! Argument resolution
//!
//! Three independent resolvers each turn one source of values into a
//! name-keyed map: [`path`] for `{name}` captures, [`payload`] for request
//! payload keys and [`session`] for values injected from the session store.
//! [`Arguments::assemble`] then zips the maps back into the handler's
//! declared parameter order.

pub mod path;
pub mod payload;
pub mod session;

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Result, RpcError};
use crate::protocol::Payload;
use crate::routing::{ParameterSpec, Resolution, RouteMatch};
use crate::session::{Session, SessionValue};

/// One resolved handler argument
#[derive(Debug, Clone)]
pub enum Argument {
    /// A JSON value from the path or the payload
    Value(Value),
    /// A session-injected value; `None` when the store lacks it
    Session(Option<SessionValue>),
}

/// Handler arguments in declaration order
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    names: Vec<String>,
    values: Vec<Argument>,
}

impl Arguments {
    /// Resolve all parameters of a matched route against a request.
    pub fn resolve(route: &RouteMatch, route_path: &str, payload: &Payload, session: &Session) -> Result<Self> {
        let parameters = route.descriptor.parameters();
        let from_path =
            path::resolve(parameters, &route.path_params, route_path, route.descriptor.pattern())?;
        let from_payload = payload::resolve(parameters, payload)?;
        let from_session = session::resolve(parameters, session);

        Self::assemble(parameters, from_path, from_payload, from_session)
    }

    /// Zip the resolver outputs into the parameters' declaration order
    pub fn assemble(
        parameters: &[ParameterSpec],
        mut from_path: HashMap<String, Value>,
        mut from_payload: HashMap<String, Value>,
        mut from_session: HashMap<String, Option<SessionValue>>,
    ) -> Result<Self> {
        let mut arguments = Self::default();

        for spec in parameters {
            let argument = match spec.resolution {
                Resolution::PathVar => from_path.remove(&spec.name).map(Argument::Value),
                Resolution::PayloadArg => from_payload.remove(&spec.name).map(Argument::Value),
                Resolution::SessionInjected => from_session.remove(&spec.name).map(Argument::Session),
            }
            .ok_or_else(|| RpcError::internal(format!("parameter '{}' was not resolved", spec.name)))?;

            arguments.push(spec.name.clone(), argument);
        }

        Ok(arguments)
    }

    /// Append an argument by hand (mostly useful for calling handlers in tests)
    pub fn push(&mut self, name: impl Into<String>, argument: Argument) {
        self.names.push(name.into());
        self.values.push(argument);
    }

    /// Builder form of [`Arguments::push`] for a JSON value
    pub fn with_value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.push(name, Argument::Value(value));
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Raw JSON value of a path or payload argument
    pub fn raw(&self, name: &str) -> Option<&Value> {
        match self.position(name).map(|i| &self.values[i]) {
            Some(Argument::Value(value)) => Some(value),
            _ => None,
        }
    }

    /// Deserialize the argument called `name`
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let index = self.position(name).ok_or_else(|| RpcError::ParameterNotFound(name.to_string()))?;
        self.at(index)
    }

    /// Deserialize the argument at `index`
    pub fn at<T: DeserializeOwned>(&self, index: usize) -> Result<T> {
        match self.values.get(index) {
            Some(Argument::Value(value)) => {
                T::deserialize(value).map_err(|e| RpcError::MalformedArgument(format!(
                    "argument '{}': {}",
                    self.names[index], e
                )))
            }
            Some(Argument::Session(_)) => Err(RpcError::MalformedArgument(format!(
                "argument '{}' is session-injected",
                self.names[index]
            ))),
            None => Err(RpcError::ParameterNotFound(format!("#{}", index))),
        }
    }

    /// Session-injected argument called `name`, if the session held one
    pub fn session<T: ?Sized + Send + Sync + 'static>(&self, name: &str) -> Option<Arc<T>> {
        match self.position(name).map(|i| &self.values[i]) {
            Some(Argument::Session(Some(value))) => value.downcast::<T>(),
            _ => None,
        }
    }

    /// Iterate `(name, argument)` pairs in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Argument)> {
        self.names.iter().map(String::as_str).zip(self.values.iter())
    }
}
