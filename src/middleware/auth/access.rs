//! Bearer access token 検証 → IdentityContext を extensions に入れる
//!
//! - Authorization ヘッダが無い / Bearer でない → 401 (後続は実行しない)
//! - 署名・issuer・audience・exp/nbf のどれかが不正 → 401
//! - trust anchor が取得できない → 401 (インフラ障害として error ログ)
//! - 成功時だけ IdentityContext を一度に insert する。リクエスト自体は変更しない

use axum::{
    Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
};

use crate::error::AppError;
use crate::services::auth::{AuthError, bearer};
use crate::state::AppState;

/// 認証が必要な routes に access middleware を掛ける。
///
/// `route_layer` なので、存在しないパスは 401 ではなく 404 のまま。
/// ```ignore
/// let protected = middleware::auth::access::apply(protected, state.clone());
/// ```
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    router.route_layer(middleware::from_fn_with_state(state, access_middleware))
}

async fn access_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let Some(raw) = bearer::extract(req.headers()) else {
        tracing::warn!(path = %req.uri().path(), "bearer credential absent");
        return Err(AppError::Unauthorized);
    };

    let ctx = match state.auth.authenticate(raw).await {
        Ok(ctx) => ctx,
        Err(AuthError::TrustAnchor(err)) => {
            tracing::error!(error = %err, "no trust anchor available, rejecting request");
            return Err(AppError::Unauthorized);
        }
        Err(AuthError::Token(err)) => {
            tracing::warn!(error = %err, path = %req.uri().path(), "access token rejected");
            return Err(AppError::Unauthorized);
        }
    };

    tracing::debug!(subject = %ctx.identity().subject, "access token accepted");

    // middleware → permission / extractor への受け渡し
    req.extensions_mut().insert(ctx);

    Ok(next.run(req).await)
}
