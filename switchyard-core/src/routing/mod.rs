//! Route registration and matching
//!
//! Routes are registered once at startup as [`RouteDescriptor`]s, either one
//! by one or grouped in a [`Controller`] with a base path. Lookups qualify a
//! route with its method and pick the most specific matching pattern:
//! fewest variable/wildcard segments, then longest literal prefix, so the
//! result never depends on registration order.

pub mod descriptor;
pub mod pattern;
pub mod table;

pub use descriptor::{
    json_type_name, AccessType, Controller, DefaultValue, Handler, HandlerFuture, ParamType,
    ParameterSpec, Resolution, RouteDescriptor,
};
pub use pattern::{PathParams, RoutePattern, Specificity};
pub use table::{RouteMatch, RouteTable};
