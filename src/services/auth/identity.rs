/*
 * Responsibility
 * - 検証済み access token から組み立てる identity (principal)
 * - IdentityContext: identity + raw credential をリクエスト単位で運ぶ
 * - Claims は `claim type -> 順序付きの文字列値` に平坦化する
 */
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Bearer credential as presented by the caller.
///
/// Lives for one request. Debug output is redacted so the token never ends up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct RawCredential(String);

impl RawCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RawCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawCredential(<redacted, {} bytes>)", self.0.len())
    }
}

/// Token claims as `claim type -> values`, in token order.
///
/// - string claim  -> one value
/// - array claim   -> one value per element (non-string elements are rendered as JSON)
/// - other scalars -> their JSON rendering
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Claims(BTreeMap<String, Vec<String>>);

impl Claims {
    pub fn from_json(payload: &serde_json::Map<String, Value>) -> Self {
        let claims = payload
            .iter()
            .map(|(name, value)| (name.clone(), flatten_claim(value)))
            .collect();
        Self(claims)
    }

    /// True if the claim type is present at all, even with an empty value.
    pub fn contains(&self, claim_type: &str) -> bool {
        self.0.contains_key(claim_type)
    }

    pub fn values(&self, claim_type: &str) -> &[String] {
        self.0.get(claim_type).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn first(&self, claim_type: &str) -> Option<&str> {
        self.values(claim_type).first().map(String::as_str)
    }
}

impl<const N: usize> From<[(&str, &[&str]); N]> for Claims {
    fn from(entries: [(&str, &[&str]); N]) -> Self {
        let claims = entries
            .into_iter()
            .map(|(name, values)| {
                (
                    name.to_string(),
                    values.iter().map(|v| v.to_string()).collect(),
                )
            })
            .collect();
        Self(claims)
    }
}

fn flatten_claim(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items.iter().map(scalar_to_string).collect(),
        Value::Null => Vec::new(),
        other => vec![scalar_to_string(other)],
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Principal produced by a successful token validation. Immutable once built.
#[derive(Debug, Clone, Serialize)]
pub struct VerifiedIdentity {
    pub subject: String,
    pub issuer: String,
    pub audiences: Vec<String>,
    pub expires_at: DateTime<Utc>,
    pub claims: Claims,
}

/// What downstream stages see for an authenticated request.
///
/// Inserted into request extensions in one step, so a stage either sees
/// the whole context or none at all.
#[derive(Debug, Clone)]
pub struct IdentityContext {
    identity: Arc<VerifiedIdentity>,
    raw_credential: RawCredential,
}

impl IdentityContext {
    pub fn new(identity: VerifiedIdentity, raw_credential: RawCredential) -> Self {
        Self {
            identity: Arc::new(identity),
            raw_credential,
        }
    }

    pub fn identity(&self) -> &VerifiedIdentity {
        &self.identity
    }

    pub fn claims(&self) -> &Claims {
        &self.identity.claims
    }

    pub fn raw_credential(&self) -> &RawCredential {
        &self.raw_credential
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn claims_flatten_strings_arrays_and_scalars() {
        let payload = json!({
            "sub": "user-1",
            "roles": ["Approver", "Reader"],
            "ver": 2,
            "scp": "",
            "acct": null
        });
        let claims = Claims::from_json(payload.as_object().unwrap());

        assert_eq!(claims.values("sub"), ["user-1"]);
        assert_eq!(claims.values("roles"), ["Approver", "Reader"]);
        assert_eq!(claims.values("ver"), ["2"]);
        assert_eq!(claims.values("scp"), [""]);
        assert!(claims.contains("acct"));
        assert!(claims.values("acct").is_empty());
        assert!(!claims.contains("missing"));
    }

    #[test]
    fn raw_credential_debug_is_redacted() {
        let raw = RawCredential::new("eyJhbGciOi.secret.parts");
        let printed = format!("{raw:?}");
        assert!(!printed.contains("secret"));
    }
}
