/*
 * Responsibility
 * - Handler から見える「認証済みコンテキスト」の型
 * - middleware が検証した IdentityContext から組み立てる。handler はこの型だけを受け取る
 *
 * Notes
 * - トークン検証・認可判定は middleware/services 側の責務
 */

use crate::services::auth::IdentityContext;
use crate::services::authz::{AuthMode, classify, decision::{ROLES_CLAIM, SCOPE_CLAIM}};

/// 認証済みのリクエストに付与されるコンテキスト
///
/// - `mode` は scope claim の有無で決まる (delegated / application)
/// - `scopes` は scope claim を空白で分割したもの (application では常に空)
#[derive(Debug, Clone)]
pub struct AuthCtx {
    pub subject: String,
    pub mode: AuthMode,
    pub scopes: Vec<String>,
    pub roles: Vec<String>,
    context: IdentityContext,
}

impl AuthCtx {
    pub fn from_context(context: IdentityContext) -> Self {
        let claims = context.claims();
        let scopes = claims
            .values(SCOPE_CLAIM)
            .iter()
            .flat_map(|v| v.split_whitespace())
            .map(str::to_string)
            .collect();

        Self {
            subject: context.identity().subject.clone(),
            mode: classify(claims),
            scopes,
            roles: claims.values(ROLES_CLAIM).to_vec(),
            context,
        }
    }

    pub fn context(&self) -> &IdentityContext {
        &self.context
    }
}
