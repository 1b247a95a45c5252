//! Access control for routes

pub mod permission;

pub use permission::{PermissionEvaluator, Principal, RoleHolder};
