/*
 * Responsibility
 * - operation 単位の認可 (route ごとに operation id を明示して掛ける)
 * - 実効要件は router 組み立て時に一度だけ解決して保持する
 * - IdentityContext が無い → 401, Deny → 403
 *
 * Notes
 * - access middleware より内側で動く前提 (MethodRouter::route_layer)
 */
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::MethodRouter,
};

use crate::error::AppError;
use crate::services::auth::IdentityContext;
use crate::services::authz::{Decision, EffectiveRequirement, OperationId, authorize, classify};
use crate::state::AppState;

#[derive(Clone)]
struct PermissionGate {
    operation: OperationId,
    requirement: Arc<EffectiveRequirement>,
}

/// `route` を `operation` の権限宣言で守る。
///
/// ```ignore
/// .route("/documents", protect(get(list_documents), &state, DOCUMENTS_LIST))
/// ```
pub fn protect(
    route: MethodRouter<AppState>,
    state: &AppState,
    operation: OperationId,
) -> MethodRouter<AppState> {
    let gate = PermissionGate {
        operation,
        requirement: Arc::new(state.permissions.resolve(operation)),
    };
    route.route_layer(middleware::from_fn_with_state(gate, permission_middleware))
}

async fn permission_middleware(
    State(gate): State<PermissionGate>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let Some(ctx) = req.extensions().get::<IdentityContext>() else {
        tracing::warn!(operation = %gate.operation, "no identity context, denying");
        return Err(AppError::Unauthorized);
    };

    if let Decision::Deny(reason) = authorize(ctx, &gate.requirement) {
        tracing::warn!(
            operation = %gate.operation,
            subject = %ctx.identity().subject,
            mode = ?classify(ctx.claims()),
            reason = reason.as_str(),
            "authorization denied"
        );
        return Err(AppError::Forbidden);
    }

    Ok(next.run(req).await)
}
