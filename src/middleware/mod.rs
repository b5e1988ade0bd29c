/*
 * Responsibility
 * - middleware の公開インターフェース
 * - http: 相関ID / trace / body limit / timeout
 * - cors: ブラウザ向け CORS
 * - auth: 認証 (access) と認可 (permission)
 */
pub mod auth;
pub mod cors;
pub mod http;
