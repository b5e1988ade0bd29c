/*
 * Responsibility
 * - GET /health (疎通用、認証なし)
 * - trust anchor を取得済みかどうかも返す。未取得でも 200 (liveness 扱い)
 */
use axum::{Json, extract::State};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub trust_anchor: &'static str,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let trust_anchor = match state.auth.anchors().snapshot() {
        Some(_) => "loaded",
        None => "missing",
    };

    Json(HealthResponse {
        status: "ok",
        trust_anchor,
    })
}
