//! Trust anchor (issuer + signing keys) fetched from the identity provider.
//!
//! The cache keeps one immutable `TrustAnchor` snapshot behind an `ArcSwapOption`.
//! A refresh builds a brand-new snapshot and swaps the pointer; readers never
//! see a half-updated anchor and never take a lock on the fast path.
//!
//! Refresh rules:
//! - no anchor yet, or anchor older than `max_age` -> fetch
//! - a refresh already running and a stale anchor exists -> serve the stale one
//!   instead of queueing behind the network (unless `strict_freshness`)
//! - fetch fails and a stale anchor exists -> serve the stale one (unless `strict_freshness`)
//! - fetch fails and nothing is cached -> `TrustAnchorError`
//! - after a failed fetch, request-driven refreshes wait `min_refresh_interval`
//!   before trying again; callers get the cached anchor (or an error) meanwhile
//!
//! Refreshes run in their own tokio task, so a cancelled request does not
//! abort a refresh it happened to trigger.

use std::sync::{Arc, PoisonError};
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum TrustAnchorError {
    #[error("metadata fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("invalid discovery document: {0}")]
    Discovery(String),
    #[error("invalid signing key set: {0}")]
    KeySet(String),
    #[error("refresh task aborted")]
    Aborted,
    #[error("previous fetch failed, next attempt in at most {0:?}")]
    Backoff(Duration),
}

/// Immutable snapshot of the identity provider's issuer and signing keys.
#[derive(Debug, Clone)]
pub struct TrustAnchor {
    issuer: String,
    keys: JwkSet,
    fetched_at: Instant,
}

impl TrustAnchor {
    pub fn new(issuer: impl Into<String>, keys: JwkSet) -> Self {
        Self {
            issuer: issuer.into(),
            keys,
            fetched_at: Instant::now(),
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn find_key(&self, kid: &str) -> Option<&Jwk> {
        self.keys.find(kid)
    }

    pub fn key_count(&self) -> usize {
        self.keys.keys.len()
    }

    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }
}

/// Where trust anchors come from. The HTTP implementation is the production one;
/// tests plug in their own.
#[async_trait]
pub trait MetadataSource: Send + Sync + 'static {
    async fn fetch(&self) -> Result<TrustAnchor, TrustAnchorError>;
}

#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    issuer: String,
    jwks_uri: String,
}

/// Reads `{authority}/.well-known/openid-configuration`, then the `jwks_uri` it advertises.
#[derive(Debug, Clone)]
pub struct HttpMetadataSource {
    client: reqwest::Client,
    metadata_url: String,
}

impl HttpMetadataSource {
    pub fn new(metadata_url: impl Into<String>, timeout: Duration) -> Result<Self, TrustAnchorError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            metadata_url: metadata_url.into(),
        })
    }
}

#[async_trait]
impl MetadataSource for HttpMetadataSource {
    async fn fetch(&self) -> Result<TrustAnchor, TrustAnchorError> {
        debug!(url = %self.metadata_url, "fetching discovery document");
        let doc: DiscoveryDocument = self
            .client
            .get(&self.metadata_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if doc.issuer.trim().is_empty() {
            return Err(TrustAnchorError::Discovery("empty issuer".into()));
        }
        if doc.jwks_uri.trim().is_empty() {
            return Err(TrustAnchorError::Discovery("empty jwks_uri".into()));
        }

        debug!(url = %doc.jwks_uri, "fetching signing key set");
        let keys: JwkSet = self
            .client
            .get(&doc.jwks_uri)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if keys.keys.is_empty() {
            return Err(TrustAnchorError::KeySet("no keys published".into()));
        }

        Ok(TrustAnchor::new(doc.issuer, keys))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RefreshPolicy {
    /// Anchors older than this are refreshed on next use.
    pub max_age: Duration,
    /// Unknown-`kid` refreshes are skipped while the anchor is younger than this.
    /// Also the wait after a failed fetch before requests may trigger another.
    pub min_refresh_interval: Duration,
    /// If true, a stale anchor is never served after a failed refresh.
    pub strict_freshness: bool,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(3600),
            min_refresh_interval: Duration::from_secs(300),
            strict_freshness: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefreshReason {
    Stale,
    UnknownKey,
    Scheduled,
}

/// What a refresh request resolves to before any fetch happens.
enum Gate {
    Fetch,
    Serve(Arc<TrustAnchor>),
    Refuse(TrustAnchorError),
}

pub struct TrustAnchorCache {
    source: Arc<dyn MetadataSource>,
    current: ArcSwapOption<TrustAnchor>,
    // Serialises fetches; never held by readers.
    refresh_lock: Mutex<()>,
    // Start of the most recent fetch, successful or not.
    last_attempt: std::sync::Mutex<Option<Instant>>,
    policy: RefreshPolicy,
}

impl std::fmt::Debug for TrustAnchorCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustAnchorCache")
            .field("policy", &self.policy)
            .field("cached", &self.current.load().is_some())
            .finish()
    }
}

impl TrustAnchorCache {
    pub fn new(source: Arc<dyn MetadataSource>, policy: RefreshPolicy) -> Self {
        Self {
            source,
            current: ArcSwapOption::empty(),
            refresh_lock: Mutex::new(()),
            last_attempt: std::sync::Mutex::new(None),
            policy,
        }
    }

    /// Currently installed anchor, without triggering any fetch.
    pub fn snapshot(&self) -> Option<Arc<TrustAnchor>> {
        self.current.load_full()
    }

    fn is_stale(&self, anchor: &TrustAnchor) -> bool {
        anchor.age() >= self.policy.max_age
    }

    fn since_last_attempt(&self) -> Option<Duration> {
        self.last_attempt
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .map(|at| at.elapsed())
    }

    fn mark_attempt(&self) {
        *self
            .last_attempt
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
    }

    /// Time left before a failed fetch may be retried, if one failed recently.
    ///
    /// An attempt newer than the cached anchor is a failed one.
    fn backoff_remaining(&self, cached: Option<&TrustAnchor>) -> Option<Duration> {
        let since = self.since_last_attempt()?;
        let failed = cached.is_none_or(|anchor| since < anchor.age());
        if failed && since < self.policy.min_refresh_interval {
            Some(self.policy.min_refresh_interval - since)
        } else {
            None
        }
    }

    fn gate(&self, reason: RefreshReason, cached: Option<Arc<TrustAnchor>>) -> Gate {
        if reason == RefreshReason::Scheduled {
            return Gate::Fetch;
        }

        if let Some(anchor) = &cached {
            let keep = match reason {
                RefreshReason::Stale => !self.is_stale(anchor),
                RefreshReason::UnknownKey => {
                    anchor.age() < self.policy.min_refresh_interval
                        || self
                            .since_last_attempt()
                            .is_some_and(|since| since < self.policy.min_refresh_interval)
                }
                RefreshReason::Scheduled => false,
            };
            if keep {
                return Gate::Serve(Arc::clone(anchor));
            }
        }

        match self.backoff_remaining(cached.as_deref()) {
            None => Gate::Fetch,
            Some(remaining) => match cached {
                Some(anchor) if !self.policy.strict_freshness || !self.is_stale(&anchor) => {
                    debug!(?remaining, "trust anchor fetch backing off, serving previous anchor");
                    Gate::Serve(anchor)
                }
                _ => Gate::Refuse(TrustAnchorError::Backoff(remaining)),
            },
        }
    }

    pub async fn current_anchor(self: &Arc<Self>) -> Result<Arc<TrustAnchor>, TrustAnchorError> {
        let cached = self.current.load_full();

        if let Some(anchor) = &cached {
            if !self.is_stale(anchor) {
                return Ok(Arc::clone(anchor));
            }
            if !self.policy.strict_freshness && self.refresh_lock.try_lock().is_err() {
                debug!("refresh in flight, serving previous trust anchor");
                return Ok(Arc::clone(anchor));
            }
        }

        self.refresh_gated(RefreshReason::Stale, cached).await
    }

    /// Called when a token names a key the current anchor does not have.
    ///
    /// Throttled by `min_refresh_interval`, counted from the last fetch attempt;
    /// when throttled the current anchor is returned as is.
    pub async fn refresh_for_unknown_key(
        self: &Arc<Self>,
    ) -> Result<Arc<TrustAnchor>, TrustAnchorError> {
        let cached = self.current.load_full();
        self.refresh_gated(RefreshReason::UnknownKey, cached).await
    }

    /// Unconditional refresh; used by the background task and at startup.
    pub async fn refresh_now(self: &Arc<Self>) -> Result<Arc<TrustAnchor>, TrustAnchorError> {
        self.refresh_detached(RefreshReason::Scheduled).await
    }

    /// Refresh every `every`; failures are logged and retried on the next tick.
    pub fn spawn_background_refresh(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately; startup already warmed the cache.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(err) = cache.refresh_now().await {
                    warn!(error = %err, "background trust anchor refresh failed");
                }
            }
        })
    }

    fn fall_back(
        &self,
        cached: Option<Arc<TrustAnchor>>,
        err: TrustAnchorError,
    ) -> Result<Arc<TrustAnchor>, TrustAnchorError> {
        // Re-read: a concurrent refresh may have succeeded meanwhile.
        let latest = self.current.load_full().or(cached);
        match latest {
            Some(anchor) if !self.policy.strict_freshness || !self.is_stale(&anchor) => {
                warn!(
                    error = %err,
                    age_secs = anchor.age().as_secs(),
                    "trust anchor refresh failed, serving previous anchor"
                );
                Ok(anchor)
            }
            _ => {
                error!(error = %err, "trust anchor unavailable");
                Err(err)
            }
        }
    }

    /// Request-driven refresh. Throttled callers return without spawning anything;
    /// only when a fetch is already in flight do they queue behind it.
    async fn refresh_gated(
        self: &Arc<Self>,
        reason: RefreshReason,
        cached: Option<Arc<TrustAnchor>>,
    ) -> Result<Arc<TrustAnchor>, TrustAnchorError> {
        let idle = self.refresh_lock.try_lock().is_ok();
        if idle {
            match self.gate(reason, cached.clone()) {
                Gate::Fetch => {}
                Gate::Serve(anchor) => return Ok(anchor),
                Gate::Refuse(err) => return self.fall_back(cached, err),
            }
        }

        match self.refresh_detached(reason).await {
            Ok(anchor) => Ok(anchor),
            Err(err) => self.fall_back(cached, err),
        }
    }

    async fn refresh_detached(
        self: &Arc<Self>,
        reason: RefreshReason,
    ) -> Result<Arc<TrustAnchor>, TrustAnchorError> {
        let cache = Arc::clone(self);
        match tokio::spawn(async move { cache.refresh(reason).await }).await {
            Ok(result) => result,
            Err(err) => {
                error!(error = %err, "trust anchor refresh task failed");
                Err(TrustAnchorError::Aborted)
            }
        }
    }

    async fn refresh(&self, reason: RefreshReason) -> Result<Arc<TrustAnchor>, TrustAnchorError> {
        let _guard = self.refresh_lock.lock().await;

        // Whoever held the lock before us may already have fetched, or failed to.
        match self.gate(reason, self.current.load_full()) {
            Gate::Fetch => {}
            Gate::Serve(anchor) => return Ok(anchor),
            Gate::Refuse(err) => return Err(err),
        }

        self.mark_attempt();
        let anchor = Arc::new(self.source.fetch().await?);
        info!(
            issuer = %anchor.issuer(),
            keys = anchor.key_count(),
            reason = ?reason,
            "trust anchor refreshed"
        );
        self.current.store(Some(Arc::clone(&anchor)));
        Ok(anchor)
    }
}
