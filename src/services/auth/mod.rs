pub mod access_jwt;
pub mod bearer;
pub mod factory;
pub mod identity;
pub mod trust_anchor;

pub use access_jwt::{AuthError, AuthService, TokenError};
pub use factory::build_auth_service;
pub use identity::{Claims, IdentityContext, RawCredential, VerifiedIdentity};
