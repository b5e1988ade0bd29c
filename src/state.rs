/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 *   - auth: トークン検証 (trust anchor cache を内包)
 *   - permissions: 起動時に確定した権限宣言
 * - Clone 前提で持つ (内部は Arc)
 */
use std::sync::Arc;

use crate::services::auth::AuthService;
use crate::services::authz::PermissionRegistry;

#[derive(Clone, Debug)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub permissions: Arc<PermissionRegistry>,
}

impl AppState {
    pub fn new(auth: Arc<AuthService>, permissions: PermissionRegistry) -> Self {
        Self {
            auth,
            permissions: Arc::new(permissions),
        }
    }
}
