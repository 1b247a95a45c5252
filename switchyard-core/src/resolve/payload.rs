//! Payload argument resolver

use std::collections::HashMap;

use serde_json::Value;

use crate::error::{Result, RpcError};
use crate::protocol::Payload;
use crate::routing::{json_type_name, DefaultValue, ParameterSpec, Resolution};

/// Resolve every payload parameter of `parameters` from the request payload.
///
/// Keys of `payload` that no parameter names are ignored.
pub fn resolve(parameters: &[ParameterSpec], payload: &Payload) -> Result<HashMap<String, Value>> {
    let mut resolved = HashMap::new();

    for spec in parameters.iter().filter(|p| p.resolution == Resolution::PayloadArg) {
        let value = match payload.get(&spec.name) {
            Some(value) if spec.ty.accepts(value) => value.clone(),
            Some(value) => {
                return Err(RpcError::incompatible(&spec.name, spec.ty.name(), json_type_name(value)))
            }
            None => default_for(spec)?,
        };
        resolved.insert(spec.name.clone(), value);
    }

    Ok(resolved)
}

fn default_for(spec: &ParameterSpec) -> Result<Value> {
    match &spec.default {
        DefaultValue::Required => Err(RpcError::ParameterNotFound(spec.name.clone())),
        DefaultValue::Null => Ok(Value::Null),
        DefaultValue::Literal(literal) => spec.ty.parse(literal).map_err(|_| {
            RpcError::incompatible(&spec.name, spec.ty.name(), format!("default '{}'", literal))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::ParamType;
    use serde_json::json;

    fn parameters() -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::payload("a", ParamType::Integer),
            ParameterSpec::payload("b", ParamType::Text),
            ParameterSpec::payload("c", ParamType::Float),
            ParameterSpec::payload("d", ParamType::Text).with_default("last"),
        ]
    }

    fn payload(value: Value) -> Payload {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_defaults_fill_missing_values() {
        let resolved =
            resolve(&parameters(), &payload(json!({"a": 1, "b": "x", "c": 2.4}))).unwrap();

        assert_eq!(resolved.get("a"), Some(&json!(1)));
        assert_eq!(resolved.get("b"), Some(&json!("x")));
        assert_eq!(resolved.get("c"), Some(&json!(2.4)));
        assert_eq!(resolved.get("d"), Some(&json!("last")));
    }

    #[test]
    fn test_missing_required_parameter_is_named() {
        let err = resolve(&parameters(), &payload(json!({"a": 1, "c": 2.4}))).unwrap_err();
        match err {
            RpcError::ParameterNotFound(name) => assert_eq!(name, "b"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_extra_keys_are_ignored() {
        let resolved = resolve(
            &parameters(),
            &payload(json!({"a": 1, "b": "x", "c": 2.4, "additional": true})),
        )
        .unwrap();

        assert_eq!(resolved.len(), 4);
        assert!(!resolved.contains_key("additional"));
    }

    #[test]
    fn test_null_default_differs_from_required() {
        let params = vec![ParameterSpec::payload("note", ParamType::Text).nullable()];
        let resolved = resolve(&params, &Payload::new()).unwrap();
        assert_eq!(resolved.get("note"), Some(&Value::Null));

        let params = vec![ParameterSpec::payload("note", ParamType::Text).with_default("null")];
        let resolved = resolve(&params, &Payload::new()).unwrap();
        assert_eq!(resolved.get("note"), Some(&json!("null")));
    }

    #[test]
    fn test_incompatible_type_names_both_types() {
        let err = resolve(&parameters(), &payload(json!({"a": "one", "b": "x", "c": 1})))
            .unwrap_err();
        assert_eq!(err.to_string(), "Parameter 'a' expects integer but got string");
    }

    #[test]
    fn test_integer_widens_to_float() {
        let resolved = resolve(&parameters(), &payload(json!({"a": 1, "b": "x", "c": 2}))).unwrap();
        assert_eq!(resolved.get("c"), Some(&json!(2)));
    }
}
