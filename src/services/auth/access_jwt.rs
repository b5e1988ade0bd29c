use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, Validation,
    errors::ErrorKind,
    jwk::{AlgorithmParameters, Jwk},
};
use serde_json::{Map, Value};

use crate::services::auth::identity::{Claims, IdentityContext, RawCredential, VerifiedIdentity};
use crate::services::auth::trust_anchor::{TrustAnchor, TrustAnchorCache, TrustAnchorError};

/// Why a structurally sound token was rejected.
///
/// Messages are for logs only and never include token contents or key material.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidReason {
    #[error("missing key id")]
    MissingKeyId,
    #[error("unsupported algorithm {0:?}")]
    UnsupportedAlgorithm(Algorithm),
    #[error("no signing key matches the token key id")]
    UnknownSigningKey,
    #[error("signing key does not fit the token algorithm")]
    KeyMismatch,
    #[error("signature mismatch")]
    BadSignature,
    #[error("issuer not accepted")]
    Issuer,
    #[error("audience not accepted")]
    Audience,
    #[error("token expired")]
    Expired,
    #[error("token not yet valid")]
    NotYetValid,
    #[error("missing or empty '{0}' claim")]
    MissingClaim(String),
    #[error("validation failed: {0}")]
    Other(String),
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Not a well-formed signed token (JWS compact serialization).
    #[error("malformed token: {0}")]
    Malformed(&'static str),
    #[error("token invalid: {0}")]
    Invalid(#[from] InvalidReason),
}

/// Knobs for access-token validation that do not come from the trust anchor.
#[derive(Debug, Clone)]
pub struct ValidationPolicy {
    pub audiences: Vec<String>,
    pub tenant_id: String,
    /// Issuer form accepted next to the anchor's own issuer; `{tenant_id}` is substituted.
    pub legacy_issuer_template: String,
    pub leeway_seconds: u64,
}

impl ValidationPolicy {
    pub fn legacy_issuer(&self) -> Option<String> {
        if self.tenant_id.trim().is_empty() || self.legacy_issuer_template.trim().is_empty() {
            return None;
        }
        Some(
            self.legacy_issuer_template
                .replace("{tenant_id}", &self.tenant_id),
        )
    }
}

/// Validate a bearer credential against one trust anchor snapshot.
///
/// Checks, in order: structure, algorithm, key id, signature, issuer
/// (anchor issuer or the tenant's legacy issuer), audience, exp/nbf.
pub fn validate(
    raw: &RawCredential,
    anchor: &TrustAnchor,
    policy: &ValidationPolicy,
) -> Result<VerifiedIdentity, TokenError> {
    let token = raw.as_str();
    check_segments(token)?;

    let header =
        jsonwebtoken::decode_header(token).map_err(|_| TokenError::Malformed("unreadable header"))?;

    if !is_algorithm_allowed(header.alg) {
        return Err(InvalidReason::UnsupportedAlgorithm(header.alg).into());
    }

    let kid = header.kid.as_deref().ok_or(InvalidReason::MissingKeyId)?;
    let jwk = anchor
        .find_key(kid)
        .ok_or(InvalidReason::UnknownSigningKey)?;
    ensure_key_fits(jwk, header.alg)?;
    let decoding_key = DecodingKey::from_jwk(jwk).map_err(|_| InvalidReason::KeyMismatch)?;

    let mut issuers = vec![anchor.issuer().to_string()];
    if let Some(legacy) = policy.legacy_issuer() {
        issuers.push(legacy);
    }

    let mut validation = Validation::new(header.alg);
    validation.set_issuer(&issuers);
    validation.set_audience(&policy.audiences);
    validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
    validation.validate_nbf = true;
    validation.leeway = policy.leeway_seconds;

    let data = jsonwebtoken::decode::<Map<String, Value>>(token, &decoding_key, &validation)
        .map_err(map_jwt_error)?;

    build_identity(&data.claims)
}

/// Every segment must be base64url, and the payload a JSON object, before
/// any key is consulted.
fn check_segments(token: &str) -> Result<(), TokenError> {
    let segments: Vec<&str> = token.split('.').collect();
    let &[header, payload, signature] = segments.as_slice() else {
        return Err(TokenError::Malformed("expected three dot-separated segments"));
    };

    let decode = |segment: &str| {
        URL_SAFE_NO_PAD
            .decode(segment)
            .map_err(|_| TokenError::Malformed("undecodable segment"))
    };
    if decode(header)?.is_empty() || decode(signature)?.is_empty() {
        return Err(TokenError::Malformed("empty segment"));
    }
    serde_json::from_slice::<Map<String, Value>>(&decode(payload)?)
        .map_err(|_| TokenError::Malformed("payload is not a JSON object"))?;

    Ok(())
}

fn build_identity(payload: &Map<String, Value>) -> Result<VerifiedIdentity, TokenError> {
    let claims = Claims::from_json(payload);

    let subject = claims
        .first("sub")
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| InvalidReason::MissingClaim("sub".into()))?
        .to_string();
    let issuer = claims
        .first("iss")
        .ok_or_else(|| InvalidReason::MissingClaim("iss".into()))?
        .to_string();
    let expires_at = payload
        .get("exp")
        .and_then(Value::as_f64)
        .and_then(|exp| DateTime::<Utc>::from_timestamp(exp as i64, 0))
        .ok_or_else(|| InvalidReason::MissingClaim("exp".into()))?;

    Ok(VerifiedIdentity {
        subject,
        issuer,
        audiences: claims.values("aud").to_vec(),
        expires_at,
        claims,
    })
}

fn is_algorithm_allowed(alg: Algorithm) -> bool {
    matches!(
        alg,
        Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512
            | Algorithm::ES256
            | Algorithm::ES384
            | Algorithm::EdDSA
    )
}

fn ensure_key_fits(jwk: &Jwk, alg: Algorithm) -> Result<(), InvalidReason> {
    let family_fits = match &jwk.algorithm {
        AlgorithmParameters::RSA(_) => matches!(
            alg,
            Algorithm::RS256
                | Algorithm::RS384
                | Algorithm::RS512
                | Algorithm::PS256
                | Algorithm::PS384
                | Algorithm::PS512
        ),
        AlgorithmParameters::EllipticCurve(_) => matches!(alg, Algorithm::ES256 | Algorithm::ES384),
        AlgorithmParameters::OctetKeyPair(_) => alg == Algorithm::EdDSA,
        _ => false,
    };
    if !family_fits {
        return Err(InvalidReason::KeyMismatch);
    }

    // A key that pins its `alg` must agree with the token header.
    if let Some(key_alg) = &jwk.common.key_algorithm
        && format!("{key_alg:?}") != format!("{alg:?}")
    {
        return Err(InvalidReason::KeyMismatch);
    }

    Ok(())
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
            TokenError::Malformed("undecodable segment")
        }
        ErrorKind::InvalidSignature => InvalidReason::BadSignature.into(),
        ErrorKind::InvalidIssuer => InvalidReason::Issuer.into(),
        ErrorKind::InvalidAudience => InvalidReason::Audience.into(),
        ErrorKind::ExpiredSignature => InvalidReason::Expired.into(),
        ErrorKind::ImmatureSignature => InvalidReason::NotYetValid.into(),
        ErrorKind::MissingRequiredClaim(claim) => InvalidReason::MissingClaim(claim.clone()).into(),
        ErrorKind::InvalidAlgorithm | ErrorKind::InvalidKeyFormat => {
            InvalidReason::KeyMismatch.into()
        }
        other => InvalidReason::Other(format!("{other:?}")).into(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error(transparent)]
    TrustAnchor(#[from] TrustAnchorError),
    #[error(transparent)]
    Token(#[from] TokenError),
}

/// Access-token authentication against the identity provider's current trust anchor.
///
/// - Key material lives in the anchor cache and is never printed.
#[derive(Clone, Debug)]
pub struct AuthService {
    anchors: Arc<TrustAnchorCache>,
    policy: ValidationPolicy,
}

impl AuthService {
    pub fn new(anchors: Arc<TrustAnchorCache>, policy: ValidationPolicy) -> Self {
        Self { anchors, policy }
    }

    pub fn anchors(&self) -> &Arc<TrustAnchorCache> {
        &self.anchors
    }

    /// Validate `raw` and bind the result to the credential.
    ///
    /// A token signed with a key the anchor does not know triggers one
    /// (throttled) anchor refresh before giving up, which covers key rotation
    /// between scheduled refreshes.
    pub async fn authenticate(&self, raw: RawCredential) -> Result<IdentityContext, AuthError> {
        let anchor = self.anchors.current_anchor().await?;

        let identity = match validate(&raw, &anchor, &self.policy) {
            Err(TokenError::Invalid(InvalidReason::UnknownSigningKey)) => {
                let refreshed = self.anchors.refresh_for_unknown_key().await?;
                if Arc::ptr_eq(&refreshed, &anchor) {
                    return Err(TokenError::Invalid(InvalidReason::UnknownSigningKey).into());
                }
                validate(&raw, &refreshed, &self.policy)?
            }
            other => other?,
        };

        Ok(IdentityContext::new(identity, raw))
    }
}
