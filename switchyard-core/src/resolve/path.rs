//! Path variable resolver
//!
//! Converts `{name}` captures to the parameter's declared type using the
//! type's canonical string form.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::{Result, RpcError};
use crate::routing::{ParameterSpec, PathParams, Resolution};

/// Resolve every path-variable parameter of `parameters` from `captured`
pub fn resolve(
    parameters: &[ParameterSpec],
    captured: &PathParams,
    route: &str,
    pattern: &str,
) -> Result<HashMap<String, Value>> {
    let mut resolved = HashMap::new();

    for spec in parameters.iter().filter(|p| p.resolution == Resolution::PathVar) {
        let raw = captured.get(&spec.name).ok_or_else(|| RpcError::PathParameterNotFound {
            path: route.to_string(),
            pattern: pattern.to_string(),
        })?;

        let value = spec
            .ty
            .parse(raw)
            .map_err(|_| RpcError::incompatible(&spec.name, spec.ty.name(), format!("'{}'", raw)))?;
        resolved.insert(spec.name.clone(), value);
    }

    Ok(resolved)
}
