//! Route table: registration at startup, read-only lookups afterwards

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::{Result, RpcError};
use crate::protocol::RequestMethod;

use super::descriptor::{Controller, RouteDescriptor};
use super::pattern::{PathParams, RoutePattern};

/// A successful lookup: the route plus the variables captured from the path
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub descriptor: Arc<RouteDescriptor>,
    pub path_params: PathParams,
}

#[derive(Debug)]
struct Entry {
    pattern: RoutePattern,
    descriptor: Arc<RouteDescriptor>,
}

/// All registered routes, grouped by method and ordered most specific first.
///
/// Built once, then shared behind an `Arc`; lookups take `&self` and need no
/// synchronization.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: HashMap<RequestMethod, Vec<Entry>>,
    qualified: HashSet<String>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one route.
    ///
    /// Two routes whose `METHOD:pattern` keys match the same paths (same
    /// shape, whatever their variable names) are a configuration error.
    pub fn register(&mut self, descriptor: RouteDescriptor) -> Result<()> {
        let pattern = RoutePattern::parse(descriptor.pattern())?;
        let key = format!("{}:{}", descriptor.method(), pattern.shape());

        if !self.qualified.insert(key) {
            log::error!("Duplicate route {}:{}", descriptor.method(), pattern.as_str());
            return Err(RpcError::DuplicateRoute(format!(
                "{}:{}",
                descriptor.method(),
                pattern.as_str()
            )));
        }

        let descriptor = descriptor.with_pattern(pattern.as_str().to_string());
        log::debug!("Registered route {}", descriptor.qualified());

        let entries = self.routes.entry(descriptor.method()).or_default();
        entries.push(Entry { pattern, descriptor: Arc::new(descriptor) });
        entries.sort_by_cached_key(|entry| entry.pattern.specificity());
        Ok(())
    }

    /// Register every route of a controller under its base path
    pub fn register_controller(&mut self, controller: Controller) -> Result<()> {
        for route in controller.into_routes() {
            self.register(route)?;
        }
        Ok(())
    }

    /// Find the most specific route matching `route` under `method`
    pub fn match_route(&self, route: &str, method: RequestMethod) -> Result<RouteMatch> {
        self.routes
            .get(&method)
            .into_iter()
            .flatten()
            .find_map(|entry| {
                entry.pattern.capture(route).map(|path_params| RouteMatch {
                    descriptor: Arc::clone(&entry.descriptor),
                    path_params,
                })
            })
            .ok_or_else(|| RpcError::RouteNotFound { method, route: route.to_string() })
    }

    /// Capture the `{name}` segments of `route` against `pattern`
    pub fn extract_path_variables(route: &str, pattern: &str) -> Result<PathParams> {
        RoutePattern::parse(pattern)?.capture(route).ok_or_else(|| {
            RpcError::PathParameterNotFound { path: route.to_string(), pattern: pattern.to_string() }
        })
    }

    /// Iterate over all routes (for debugging/introspection)
    pub fn routes(&self) -> impl Iterator<Item = &Arc<RouteDescriptor>> {
        self.routes.values().flatten().map(|entry| &entry.descriptor)
    }

    pub fn len(&self) -> usize {
        self.qualified.len()
    }

    pub fn is_empty(&self) -> bool {
        self.qualified.is_empty()
    }
}
