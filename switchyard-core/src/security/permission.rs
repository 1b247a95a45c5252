//! Route access gate
//!
//! The evaluator looks for a [`RoleHolder`] in the session store. Its presence
//! means "logged in"; its roles are compared against the route's allowed roles.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::dispatch::Mono;
use crate::error::Result;
use crate::logging::session_tag;
use crate::protocol::ResponseStatus;
use crate::routing::{AccessType, RouteDescriptor};
use crate::session::Session;

/// Anything stored in the session that carries the caller's roles
pub trait RoleHolder: Send + Sync {
    fn roles(&self) -> &BTreeSet<String>;

    fn has_role(&self, role: &str) -> bool {
        self.roles().contains(role)
    }
}

/// Default role holder stored on login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: String,
    pub roles: BTreeSet<String>,
}

impl Principal {
    pub fn new<I, R>(user_id: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        Self { user_id: user_id.into(), roles: roles.into_iter().map(Into::into).collect() }
    }
}

impl RoleHolder for Principal {
    fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }
}

impl Session {
    /// Store `principal` under its own type and as the session's role holder
    pub fn login(&self, principal: Principal) -> Result<Arc<Principal>> {
        let principal = self.add(principal)?;
        let holder: Arc<dyn RoleHolder> = principal.clone();
        self.add_shared(holder)?;
        log::debug!("Session {} logged in as {}", session_tag(self.id()), principal.user_id);
        Ok(principal)
    }

    /// Drop the principal and role holder; returns whether one was present
    pub fn logout(&self) -> Result<bool> {
        let had_principal = self.remove::<Principal>()?;
        let had_holder = self.remove::<dyn RoleHolder>()?;
        Ok(had_principal || had_holder)
    }
}

/// Stateless access check run before each handler
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionEvaluator;

impl PermissionEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Decide whether `session` may call `route`.
    ///
    /// Returns an OK mono to proceed, or a mono carrying the denial status. Only a
    /// destroyed session makes this fail.
    pub fn evaluate(&self, session: &Session, route: &RouteDescriptor) -> Result<Mono> {
        let holder = session.get::<dyn RoleHolder>()?;
        let status = Self::decide(route.access_type(), holder.as_deref(), route.allowed_roles());

        if status != ResponseStatus::Ok {
            log::info!("{} denied: {}", route.qualified(), status);
        }
        Ok(Mono::status(status))
    }

    /// The access matrix itself, free of any session plumbing
    pub fn decide(
        access: AccessType,
        holder: Option<&dyn RoleHolder>,
        allowed_roles: &BTreeSet<String>,
    ) -> ResponseStatus {
        match (access, holder) {
            (AccessType::AllAllowed, _) => ResponseStatus::Ok,
            (AccessType::OnlyLoggedIn, None) => ResponseStatus::NotAuthorized,
            (AccessType::OnlyLoggedIn, Some(_)) => ResponseStatus::Ok,
            (AccessType::OnlyNotLoggedIn, None) => ResponseStatus::Ok,
            (AccessType::OnlyNotLoggedIn, Some(_)) => ResponseStatus::OnlyForNotAuthorized,
            (AccessType::OnlyWithSpecificRoles, None) => ResponseStatus::PermissionDenied,
            (AccessType::OnlyWithSpecificRoles, Some(holder)) => {
                if holder.roles().iter().any(|role| allowed_roles.contains(role)) {
                    ResponseStatus::Ok
                } else {
                    ResponseStatus::PermissionDenied
                }
            }
        }
    }
}
