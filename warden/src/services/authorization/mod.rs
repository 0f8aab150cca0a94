//! Authorization for warden
//!
//! Checks (resource, action, scope) triples against the capability ceiling
//! and the principal's permission document, and lets a super_admin grant
//! and revoke individual permissions.

pub mod engine;
pub mod permission_store;
pub mod types;


pub use engine::AuthorizationEngine;
pub use permission_store::PermissionStore;
pub use types::{Decision, GrantOutcome, PermissionRequest, PermissionTarget, RevokeOutcome};
