//! Bearer credential extraction from request headers.
//!
//! `Authorization: Bearer <token>`
//! - header name lookup is case-insensitive (HeaderMap normalises names)
//! - the scheme word is matched case-insensitively
//! - exactly one space separates scheme and token; nothing else is trimmed
//!
//! `None` is not an error: the caller decides whether that means 401.

use axum::http::{HeaderMap, header};

use super::identity::RawCredential;

const SCHEME: &str = "Bearer";

pub fn extract(headers: &HeaderMap) -> Option<RawCredential> {
    // Non-visible-ASCII values fail `to_str` and count as absent.
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    parse_authorization(value)
}

fn parse_authorization(value: &str) -> Option<RawCredential> {
    let scheme = value.get(..SCHEME.len())?;
    if !scheme.eq_ignore_ascii_case(SCHEME) {
        return None;
    }

    let token = value[SCHEME.len()..].strip_prefix(' ')?;
    if token.is_empty() {
        return None;
    }

    Some(RawCredential::new(token))
}
