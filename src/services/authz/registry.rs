/*
 * Responsibility
 * - Registry: operation id -> (group, fragments), group -> fragments
 * - 起動時に一度だけ登録し、以後 immutable (Arc で共有)
 * - resolve(op) は build 時に計算済みの実効要件を返す
 *
 * Notes
 * - operation id は router が permission middleware に明示的に渡す。
 *   ここで実行中の handler を推定する必要はない
 */
use std::collections::HashMap;
use std::fmt;

use super::requirement::{EffectiveRequirement, PermissionRequirement, reduce};

/// Stable name of a routed operation, e.g. `documents.approve`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationId(&'static str);

impl OperationId {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("operation registered twice: {0}")]
    DuplicateOperation(&'static str),
    #[error("operation {operation} refers to unknown group {group}")]
    UnknownGroup {
        operation: &'static str,
        group: &'static str,
    },
}

#[derive(Debug)]
struct OperationDecl {
    group: &'static str,
    fragments: Vec<PermissionRequirement>,
}

#[derive(Debug, Default)]
pub struct PermissionRegistryBuilder {
    groups: HashMap<&'static str, Vec<PermissionRequirement>>,
    operations: Vec<(OperationId, OperationDecl)>,
}

impl PermissionRegistryBuilder {
    /// Declare a group; repeated calls append fragments in call order.
    pub fn group(
        mut self,
        name: &'static str,
        fragments: impl IntoIterator<Item = PermissionRequirement>,
    ) -> Self {
        self.groups.entry(name).or_default().extend(fragments);
        self
    }

    pub fn operation(
        mut self,
        id: OperationId,
        group: &'static str,
        fragments: impl IntoIterator<Item = PermissionRequirement>,
    ) -> Self {
        self.operations.push((
            id,
            OperationDecl {
                group,
                fragments: fragments.into_iter().collect(),
            },
        ));
        self
    }

    pub fn build(self) -> Result<PermissionRegistry, RegistryError> {
        let mut resolved = HashMap::with_capacity(self.operations.len());

        for (id, decl) in &self.operations {
            let group_fragments =
                self.groups
                    .get(decl.group)
                    .ok_or(RegistryError::UnknownGroup {
                        operation: id.as_str(),
                        group: decl.group,
                    })?;

            let effective = reduce(&decl.fragments, group_fragments);
            if resolved.insert(*id, effective).is_some() {
                return Err(RegistryError::DuplicateOperation(id.as_str()));
            }
        }

        Ok(PermissionRegistry { resolved })
    }
}

/// Read-only map from operation to its effective requirement.
#[derive(Debug, Default)]
pub struct PermissionRegistry {
    resolved: HashMap<OperationId, EffectiveRequirement>,
}

impl PermissionRegistry {
    pub fn builder() -> PermissionRegistryBuilder {
        PermissionRegistryBuilder::default()
    }

    /// Effective requirement for `op`.
    ///
    /// Unknown operations resolve to the empty requirement, which nobody satisfies.
    pub fn resolve(&self, op: OperationId) -> EffectiveRequirement {
        match self.resolved.get(&op) {
            Some(effective) => effective.clone(),
            None => {
                tracing::warn!(operation = %op, "no permission declarations registered for operation");
                EffectiveRequirement::default()
            }
        }
    }

    pub fn contains(&self, op: OperationId) -> bool {
        self.resolved.contains_key(&op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST: OperationId = OperationId::new("docs.list");
    const APPROVE: OperationId = OperationId::new("docs.approve");
    const OPEN: OperationId = OperationId::new("docs.open");

    fn registry() -> PermissionRegistry {
        PermissionRegistry::builder()
            .group(
                "docs",
                [PermissionRequirement::new()
                    .scopes(["Read", "Write"])
                    .user_roles(["Reader", "Approver"])
                    .app_roles(["Service.Read", "Service.Write"])],
            )
            .group("bare", [])
            .operation(LIST, "docs", [])
            .operation(
                APPROVE,
                "docs",
                [PermissionRequirement::new()
                    .scopes(["Write"])
                    .user_roles(["Approver"])
                    .app_roles(["Service.Write"])],
            )
            .operation(OPEN, "bare", [])
            .build()
            .unwrap()
    }

    #[test]
    fn operation_without_fragments_inherits_group() {
        let effective = registry().resolve(LIST);
        assert!(effective.scopes.contains("Read"));
        assert!(effective.user_roles.contains("Reader"));
    }

    #[test]
    fn operation_fragments_narrow_group() {
        let effective = registry().resolve(APPROVE);
        assert_eq!(
            effective,
            PermissionRequirement::new()
                .scopes(["Write"])
                .user_roles(["Approver"])
                .app_roles(["Service.Write"])
        );
    }

    #[test]
    fn nothing_declared_anywhere_resolves_empty() {
        assert_eq!(registry().resolve(OPEN), PermissionRequirement::default());
    }

    #[test]
    fn unknown_operation_resolves_empty() {
        let registry = registry();
        let unknown = OperationId::new("docs.unknown");
        assert!(!registry.contains(unknown));
        assert_eq!(registry.resolve(unknown), PermissionRequirement::default());
    }

    #[test]
    fn resolve_is_idempotent() {
        let registry = registry();
        assert_eq!(registry.resolve(APPROVE), registry.resolve(APPROVE));
    }

    #[test]
    fn group_fragments_accumulate_across_calls() {
        let registry = PermissionRegistry::builder()
            .group("g", [PermissionRequirement::new().scopes(["A", "B"])])
            .group("g", [PermissionRequirement::new().scopes(["B", "C"])])
            .operation(LIST, "g", [])
            .build()
            .unwrap();

        assert_eq!(
            registry.resolve(LIST),
            PermissionRequirement::new().scopes(["B"])
        );
    }

    #[test]
    fn build_rejects_duplicates_and_unknown_groups() {
        let duplicate = PermissionRegistry::builder()
            .group("g", [])
            .operation(LIST, "g", [])
            .operation(LIST, "g", [])
            .build();
        assert_eq!(
            duplicate.unwrap_err(),
            RegistryError::DuplicateOperation("docs.list")
        );

        let orphan = PermissionRegistry::builder().operation(LIST, "nope", []).build();
        assert_eq!(
            orphan.unwrap_err(),
            RegistryError::UnknownGroup {
                operation: "docs.list",
                group: "nope"
            }
        );
    }
}
