/*
 * Responsibility
 * - v1 の URL 構造を定義
 * - /health は公開、それ以外は access middleware (認証) の内側
 * - 各 route に operation id を明示して permission middleware (認可) を掛ける
 */
use axum::{
    Router,
    routing::{get, post},
};

use crate::api::v1::handlers::{
    documents::{approve_document, list_documents, sync_documents},
    health::health,
    me::me,
};
use crate::api::v1::permissions::{
    DOCUMENTS_APPROVE, DOCUMENTS_LIST, DOCUMENTS_SYNC, PROFILE_READ,
};
use crate::middleware::auth::{access, permission::protect};
use crate::state::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/me", protect(get(me), state, PROFILE_READ))
        .route(
            "/documents",
            protect(get(list_documents), state, DOCUMENTS_LIST),
        )
        .route(
            "/documents/sync",
            protect(post(sync_documents), state, DOCUMENTS_SYNC),
        )
        .route(
            "/documents/{id}/approve",
            protect(post(approve_document), state, DOCUMENTS_APPROVE),
        );
    let protected = access::apply(protected, state.clone());

    Router::new().route("/health", get(health)).merge(protected)
}
