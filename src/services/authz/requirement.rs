//! Permission requirements declared on handler groups and operations.
//!
//! Every declared fragment narrows the one before it: the effective
//! requirement is the per-field intersection of all fragments, both levels
//! together. An empty field grants nobody access along that dimension.

use std::collections::BTreeSet;

use serde::Serialize;

/// One declaration: who may call, per authentication mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PermissionRequirement {
    pub scopes: BTreeSet<String>,
    pub user_roles: BTreeSet<String>,
    pub app_roles: BTreeSet<String>,
}

impl PermissionRequirement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes.extend(scopes.into_iter().map(Into::into));
        self
    }

    pub fn user_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.user_roles.extend(roles.into_iter().map(Into::into));
        self
    }

    pub fn app_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.app_roles.extend(roles.into_iter().map(Into::into));
        self
    }

    /// Field-wise set intersection.
    pub fn intersect(&self, other: &Self) -> Self {
        Self {
            scopes: self.scopes.intersection(&other.scopes).cloned().collect(),
            user_roles: self
                .user_roles
                .intersection(&other.user_roles)
                .cloned()
                .collect(),
            app_roles: self
                .app_roles
                .intersection(&other.app_roles)
                .cloned()
                .collect(),
        }
    }
}

/// The single reduced rule for one operation.
pub type EffectiveRequirement = PermissionRequirement;

/// Reduce operation-level and group-level fragments to one requirement.
///
/// Operation fragments are visited first, then group fragments, each in
/// declaration order. The first fragment seeds the result; every later one
/// narrows it. No fragments at all yields the empty (deny-everything) requirement.
pub fn reduce<'a>(
    operation: impl IntoIterator<Item = &'a PermissionRequirement>,
    group: impl IntoIterator<Item = &'a PermissionRequirement>,
) -> EffectiveRequirement {
    operation
        .into_iter()
        .chain(group)
        .fold(None, |acc: Option<PermissionRequirement>, fragment| {
            Some(match acc {
                None => fragment.clone(),
                Some(seed) => seed.intersect(fragment),
            })
        })
        .unwrap_or_default()
}
