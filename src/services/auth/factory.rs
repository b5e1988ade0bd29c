/// Factory: build `AuthService` (trust anchor cache + validation policy) from application `Config`.
use std::sync::Arc;

use crate::config::Config;
use crate::services::auth::AuthService;
use crate::services::auth::access_jwt::ValidationPolicy;
use crate::services::auth::trust_anchor::{
    HttpMetadataSource, RefreshPolicy, TrustAnchorCache, TrustAnchorError,
};

pub fn build_auth_service(config: &Config) -> Result<Arc<AuthService>, TrustAnchorError> {
    let source = HttpMetadataSource::new(
        config.auth_metadata_url.as_str(),
        config.trust_anchor_fetch_timeout,
    )?;

    let anchors = Arc::new(TrustAnchorCache::new(
        Arc::new(source),
        RefreshPolicy {
            max_age: config.trust_anchor_max_age,
            min_refresh_interval: config.trust_anchor_min_refresh,
            strict_freshness: config.trust_anchor_strict_freshness,
        },
    ));

    let policy = ValidationPolicy {
        audiences: config.auth_audiences.clone(),
        tenant_id: config.auth_tenant_id.to_string(),
        legacy_issuer_template: config.auth_legacy_issuer_template.clone(),
        leeway_seconds: config.access_token_leeway_seconds,
    };

    Ok(Arc::new(AuthService::new(anchors, policy)))
}
