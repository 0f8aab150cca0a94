//! Authorization vocabulary
//!
//! Roles, resources, actions and scopes, the ceiling and role-default
//! tables, and the per-principal permission document.

pub mod document;
pub mod permission;
pub mod policy;

pub use document::PermissionDocument;
pub use permission::{Action, ActionOrWildcard, Resource, Role, Scope};
pub use policy::{PolicyError, PolicyTables, ResourcePermissions, ScopedActions};
