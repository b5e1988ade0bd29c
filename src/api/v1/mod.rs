/*
 * Responsibility
 * - v1 の公開ポイント (routes() / 権限宣言の re-export)
 */
pub mod extractors;
pub mod handlers;
pub mod permissions;
mod routes;

pub use routes::routes;
