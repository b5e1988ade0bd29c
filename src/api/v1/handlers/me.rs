/*
 * Responsibility
 * - GET /me: 検証済みの identity をそのまま返す (動作確認用)
 */
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::v1::extractors::AuthCtxExtractor;
use crate::services::auth::Claims;
use crate::services::authz::AuthMode;

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub subject: String,
    pub issuer: String,
    pub audiences: Vec<String>,
    pub expires_at: DateTime<Utc>,
    pub mode: AuthMode,
    pub scopes: Vec<String>,
    pub roles: Vec<String>,
    pub claims: Claims,
}

pub async fn me(AuthCtxExtractor(ctx): AuthCtxExtractor) -> Json<MeResponse> {
    let identity = ctx.context().identity();

    Json(MeResponse {
        issuer: identity.issuer.clone(),
        audiences: identity.audiences.clone(),
        expires_at: identity.expires_at,
        claims: identity.claims.clone(),
        subject: ctx.subject,
        mode: ctx.mode,
        scopes: ctx.scopes,
        roles: ctx.roles,
    })
}
