mod common;

use std::sync::Arc;
use std::time::Duration;

use api_gate::services::auth::trust_anchor::{
    HttpMetadataSource, MetadataSource, RefreshPolicy, TrustAnchorCache, TrustAnchorError,
};

use common::{Idp, signing_key};

#[tokio::test]
async fn fetches_issuer_and_keys_via_discovery() {
    // GIVEN: an identity provider publishing two keys
    let (a, b) = (signing_key(1), signing_key(2));
    let idp = Idp::start(&[(&a, "a"), (&b, "b")]).await;
    let source = HttpMetadataSource::new(idp.metadata_url(), Duration::from_secs(2)).unwrap();

    // WHEN
    let anchor = source.fetch().await.unwrap();

    // THEN
    assert_eq!(anchor.issuer(), idp.issuer);
    assert_eq!(anchor.key_count(), 2);
    assert!(anchor.find_key("b").is_some());
    assert!(anchor.find_key("c").is_none());
}

#[tokio::test]
async fn empty_key_set_is_rejected() {
    let idp = Idp::start(&[]).await;
    let source = HttpMetadataSource::new(idp.metadata_url(), Duration::from_secs(2)).unwrap();

    let err = source.fetch().await.unwrap_err();
    assert!(matches!(err, TrustAnchorError::KeySet(_)));
}

#[tokio::test]
async fn missing_discovery_document_is_a_fetch_error() {
    let idp = Idp::start(&[(&signing_key(1), "a")]).await;
    let url = format!("http://{}/no/such/document", idp.addr);
    let source = HttpMetadataSource::new(url, Duration::from_secs(2)).unwrap();

    let err = source.fetch().await.unwrap_err();
    assert!(matches!(err, TrustAnchorError::Fetch(_)));
}

#[tokio::test]
async fn cache_serves_snapshot_until_refreshed() {
    // GIVEN: a warmed cache
    let key = signing_key(1);
    let idp = Idp::start(&[(&key, "a")]).await;
    let source = HttpMetadataSource::new(idp.metadata_url(), Duration::from_secs(2)).unwrap();
    let cache = Arc::new(TrustAnchorCache::new(Arc::new(source), RefreshPolicy::default()));
    let first = cache.current_anchor().await.unwrap();

    // WHEN: the provider rotates but the anchor is still fresh
    idp.publish(&[(&key, "b")]);
    let again = cache.current_anchor().await.unwrap();

    // THEN: same snapshot, until an explicit refresh swaps it
    assert!(Arc::ptr_eq(&first, &again));
    assert_eq!(idp.discovery_hits(), 1);

    let refreshed = cache.refresh_now().await.unwrap();
    assert!(refreshed.find_key("b").is_some());
    assert!(first.find_key("a").is_some());
}
