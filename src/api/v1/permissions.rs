/*
 * Responsibility
 * - v1 の operation id と権限宣言 (group / operation)
 * - 起動時に一度だけ registry を組み立てる (以後 immutable)
 *
 * Notes
 * - group と operation の宣言は積集合で合成される。operation 側で宣言しなかった項目は
 *   group の宣言がそのまま効く
 * - delegated: user role と scope の両方が必要 / application: app role のみ
 */
use crate::services::authz::{OperationId, PermissionRegistry, PermissionRequirement, RegistryError};

pub const PROFILE_READ: OperationId = OperationId::new("profile.read");
pub const DOCUMENTS_LIST: OperationId = OperationId::new("documents.list");
pub const DOCUMENTS_APPROVE: OperationId = OperationId::new("documents.approve");
pub const DOCUMENTS_SYNC: OperationId = OperationId::new("documents.sync");

const PROFILE: &str = "profile";
const DOCUMENTS: &str = "documents";

pub fn registry() -> Result<PermissionRegistry, RegistryError> {
    PermissionRegistry::builder()
        .group(
            PROFILE,
            [PermissionRequirement::new()
                .scopes(["Read", "Write"])
                .user_roles(["Reader", "Approver"])
                .app_roles(["Service.Read", "Service.Write"])],
        )
        .group(
            DOCUMENTS,
            [PermissionRequirement::new()
                .scopes(["Read", "Write"])
                .user_roles(["Reader", "Approver"])
                .app_roles(["Service.Read", "Service.Write"])],
        )
        .operation(PROFILE_READ, PROFILE, [])
        .operation(DOCUMENTS_LIST, DOCUMENTS, [])
        .operation(
            DOCUMENTS_APPROVE,
            DOCUMENTS,
            [PermissionRequirement::new()
                .scopes(["Write"])
                .user_roles(["Approver"])
                .app_roles(["Service.Write"])],
        )
        // application callers only: no scope / user role survives the intersection
        .operation(
            DOCUMENTS_SYNC,
            DOCUMENTS,
            [PermissionRequirement::new().app_roles(["Service.Write"])],
        )
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_routed_operation_is_declared() {
        let registry = registry().unwrap();
        for op in [PROFILE_READ, DOCUMENTS_LIST, DOCUMENTS_APPROVE, DOCUMENTS_SYNC] {
            assert!(registry.contains(op), "{op} missing");
        }
    }

    #[test]
    fn sync_is_application_only() {
        let effective = registry().unwrap().resolve(DOCUMENTS_SYNC);
        assert!(effective.scopes.is_empty());
        assert!(effective.user_roles.is_empty());
        assert_eq!(
            effective.app_roles.iter().collect::<Vec<_>>(),
            ["Service.Write"]
        );
    }
}
