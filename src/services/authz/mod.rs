/*
 * Responsibility
 * - 権限宣言 (group / operation) の登録と合成
 * - 認証済みコンテキスト + 実効要件 → Allow / Deny
 */
pub mod decision;
pub mod registry;
pub mod requirement;

pub use decision::{AuthMode, Decision, DenyReason, authorize, classify};
pub use registry::{OperationId, PermissionRegistry, RegistryError};
pub use requirement::{EffectiveRequirement, PermissionRequirement};
