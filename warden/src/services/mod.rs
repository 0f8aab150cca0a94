pub mod accounts;
pub mod authorization;
pub mod cleanup;
pub mod credentials;
pub mod error;

pub use accounts::AccountService;
pub use authorization::AuthorizationEngine;
pub use credentials::CredentialIssuer;
pub use error::{AuthError, DenyReason, ErrorKind};
