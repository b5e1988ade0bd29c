/*
 * Responsibility
 * - GET  /documents                  一覧 (読み取り権限)
 * - POST /documents/{id}/approve     承認 (Approver / Service.Write)
 * - POST /documents/sync             application 呼び出し専用
 *
 * Notes
 * - 永続化はしない。固定の文書一覧を返すだけのデモ
 * - 権限チェックは route 側 (permission middleware) で済んでいる前提
 */
use axum::{Json, extract::Path};
use serde::Serialize;

use crate::api::v1::extractors::AuthCtxExtractor;
use crate::error::AppError;
use crate::services::authz::AuthMode;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Document {
    pub id: u32,
    pub title: &'static str,
}

const DOCUMENTS: [Document; 3] = [
    Document { id: 1, title: "Quarterly report" },
    Document { id: 2, title: "Travel policy" },
    Document { id: 3, title: "Vendor contract" },
];

#[derive(Debug, Serialize)]
pub struct ApprovalResponse {
    pub id: u32,
    pub status: &'static str,
    pub approved_by: String,
    pub mode: AuthMode,
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub synced: usize,
    pub requested_by: String,
}

pub async fn list_documents() -> Json<Vec<Document>> {
    Json(DOCUMENTS.to_vec())
}

pub async fn approve_document(
    AuthCtxExtractor(ctx): AuthCtxExtractor,
    Path(id): Path<String>,
) -> Result<Json<ApprovalResponse>, AppError> {
    let id: u32 = id
        .parse()
        .map_err(|_| AppError::bad_request("INVALID_DOCUMENT_ID", "invalid id"))?;

    let doc = DOCUMENTS
        .iter()
        .find(|d| d.id == id)
        .ok_or(AppError::not_found("document"))?;

    tracing::info!(document = doc.id, subject = %ctx.subject, "document approved");

    Ok(Json(ApprovalResponse {
        id: doc.id,
        status: "approved",
        approved_by: ctx.subject,
        mode: ctx.mode,
    }))
}

pub async fn sync_documents(AuthCtxExtractor(ctx): AuthCtxExtractor) -> Json<SyncResponse> {
    tracing::info!(subject = %ctx.subject, "document sync requested");

    Json(SyncResponse {
        synced: DOCUMENTS.len(),
        requested_by: ctx.subject,
    })
}
