//! Allow/deny decision for an authenticated caller against an effective requirement.
//!
//! Mode is picked from the claims alone:
//! - a scope claim is present (any value, even empty) -> delegated (user via client)
//! - otherwise -> application (daemon/service)
//!
//! Delegated callers need a matching user role AND a matching scope.
//! Application callers need a matching app role. Empty requirement sets match nothing.

use serde::Serialize;

use super::requirement::EffectiveRequirement;
use crate::services::auth::identity::{Claims, IdentityContext};

/// Delegated-permission claim (space-separated scope list).
pub const SCOPE_CLAIM: &str = "scp";
/// Role claim, shared by user roles and application roles.
pub const ROLES_CLAIM: &str = "roles";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    Delegated,
    Application,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    MissingUserRole,
    MissingScope,
    MissingAppRole,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::MissingUserRole => "no accepted user role",
            DenyReason::MissingScope => "no accepted scope",
            DenyReason::MissingAppRole => "no accepted application role",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

pub fn classify(claims: &Claims) -> AuthMode {
    if claims.contains(SCOPE_CLAIM) {
        AuthMode::Delegated
    } else {
        AuthMode::Application
    }
}

pub fn authorize(ctx: &IdentityContext, requirement: &EffectiveRequirement) -> Decision {
    evaluate(ctx.claims(), requirement)
}

pub fn evaluate(claims: &Claims, requirement: &EffectiveRequirement) -> Decision {
    let roles = claims.values(ROLES_CLAIM);

    match classify(claims) {
        AuthMode::Delegated => {
            if !roles.iter().any(|r| requirement.user_roles.contains(r)) {
                return Decision::Deny(DenyReason::MissingUserRole);
            }
            let has_scope = claims
                .values(SCOPE_CLAIM)
                .iter()
                .flat_map(|value| value.split_whitespace())
                .any(|scope| requirement.scopes.contains(scope));
            if !has_scope {
                return Decision::Deny(DenyReason::MissingScope);
            }
            Decision::Allow
        }
        AuthMode::Application => {
            if roles.iter().any(|r| requirement.app_roles.contains(r)) {
                Decision::Allow
            } else {
                Decision::Deny(DenyReason::MissingAppRole)
            }
        }
    }
}
