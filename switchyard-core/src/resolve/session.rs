//! Session injection resolver

use std::collections::HashMap;

use crate::routing::{ParamType, ParameterSpec, Resolution};
use crate::session::{Session, SessionValue};

/// Look up every session-injected parameter in the session store.
///
/// Never fails: a value that is absent, or a session that expired meanwhile,
/// resolves to `None` and the handler decides what that means.
pub fn resolve(parameters: &[ParameterSpec], session: &Session) -> HashMap<String, Option<SessionValue>> {
    parameters
        .iter()
        .filter(|p| p.resolution == Resolution::SessionInjected)
        .map(|spec| {
            let value = match spec.ty {
                ParamType::Session(key) => session.get_by_key(&key).ok().flatten(),
                _ => None,
            };
            (spec.name.clone(), value)
        })
        .collect()
}
