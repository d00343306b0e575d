//! JWKS (JSON Web Key Set) fetching and caching.
//!
//! Fetches are serialised through one lock, and a key id missing from the
//! cached set refetches at most once per minimum refresh interval, so
//! tokens with made-up `kid`s cannot drive outbound traffic.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use jsonwebtoken::{
    jwk::{AlgorithmParameters, Jwk, JwkSet},
    DecodingKey,
};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use super::AuthError;

/// Default JWKS cache TTL (5 minutes).
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Minimum spacing between two fetches.
const DEFAULT_MIN_REFRESH: Duration = Duration::from_secs(30);

/// Timeout for a single JWKS fetch.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

struct CacheEntry {
    jwks: JwkSet,
    fetched_at: Instant,
}

/// Cached view of a remote JWKS.
#[derive(Clone)]
pub struct JwksCache {
    url: Arc<str>,
    ttl: Duration,
    min_refresh: Duration,
    cache: Arc<RwLock<Option<CacheEntry>>>,
    /// Start of the last fetch attempt. Held for the whole fetch.
    last_attempt: Arc<Mutex<Option<Instant>>>,
    client: reqwest::Client,
}

impl JwksCache {
    /// Create an empty cache for `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
        Ok(Self {
            url: Arc::from(url.into()),
            ttl: DEFAULT_CACHE_TTL,
            min_refresh: DEFAULT_MIN_REFRESH,
            cache: Arc::new(RwLock::new(None)),
            last_attempt: Arc::new(Mutex::new(None)),
            client,
        })
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Minimum time between fetches, whether they succeed or not.
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh = interval;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Seed the cache with a known key set.
    pub async fn prime(&self, jwks: JwkSet) {
        *self.cache.write().await = Some(CacheEntry {
            jwks,
            fetched_at: Instant::now(),
        });
    }

    /// Check if a fresh JWKS is cached.
    pub async fn is_cached(&self) -> bool {
        self.cache
            .read()
            .await
            .as_ref()
            .is_some_and(|entry| entry.fetched_at.elapsed() < self.ttl)
    }

    /// Decoding key for `kid`.
    ///
    /// A miss refetches only when the cached set is older than the minimum
    /// refresh interval; otherwise it is answered from the cache.
    pub async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        let jwks = self.current().await?;
        if let Some(jwk) = find(&jwks, kid) {
            return jwk_to_decoding_key(jwk);
        }

        debug!(kid, "key id not in cached JWKS");
        let jwks = match self.refresh(self.min_refresh).await {
            Ok(jwks) => jwks,
            Err(e) => {
                warn!(error = %e, "JWKS refresh failed");
                return Err(AuthError::NoMatchingKey);
            }
        };
        find(&jwks, kid)
            .ok_or(AuthError::NoMatchingKey)
            .and_then(jwk_to_decoding_key)
    }

    async fn current(&self) -> Result<JwkSet, AuthError> {
        {
            let cache = self.cache.read().await;
            if let Some(entry) = &*cache {
                if entry.fetched_at.elapsed() < self.ttl {
                    return Ok(entry.jwks.clone());
                }
            }
        }
        self.refresh(self.ttl).await
    }

    /// Return the cached set if it is younger than `max_age`, else fetch.
    ///
    /// Callers queue on `last_attempt`, so concurrent refreshes collapse into
    /// one fetch. Within the minimum interval of the previous attempt the
    /// cached set is returned as is, however old.
    async fn refresh(&self, max_age: Duration) -> Result<JwkSet, AuthError> {
        let mut last_attempt = self.last_attempt.lock().await;

        let cached = self
            .cache
            .read()
            .await
            .as_ref()
            .map(|entry| (entry.jwks.clone(), entry.fetched_at.elapsed()));
        match cached {
            Some((jwks, age)) if age < max_age => return Ok(jwks),
            cached if (*last_attempt).is_some_and(|at| at.elapsed() < self.min_refresh) => {
                debug!("JWKS fetch skipped; last attempt too recent");
                return cached.map(|(jwks, _)| jwks).ok_or_else(|| {
                    AuthError::JwksFetch("previous fetch failed; retry later".into())
                });
            }
            _ => {}
        }

        *last_attempt = Some(Instant::now());
        let jwks = self.fetch().await?;
        *self.cache.write().await = Some(CacheEntry {
            jwks: jwks.clone(),
            fetched_at: Instant::now(),
        });
        Ok(jwks)
    }

    async fn fetch(&self) -> Result<JwkSet, AuthError> {
        let response = self
            .client
            .get(&*self.url)
            .send()
            .await
            .map_err(|e| AuthError::JwksFetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::JwksFetch(format!(
                "HTTP {} from JWKS endpoint",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::JwksFetch(e.to_string()))
    }
}

fn find<'a>(jwks: &'a JwkSet, kid: &str) -> Option<&'a Jwk> {
    jwks.keys
        .iter()
        .find(|k| k.common.key_id.as_deref() == Some(kid))
}

/// Firebase signs with RS256 only, so only RSA keys are accepted.
fn jwk_to_decoding_key(jwk: &Jwk) -> Result<DecodingKey, AuthError> {
    match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => DecodingKey::from_rsa_components(&rsa.n, &rsa.e)
            .map_err(|e| AuthError::Rejected(format!("unusable RSA key: {e}"))),
        _ => Err(AuthError::Rejected("JWKS key is not RSA".into())),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::{json, Value};
    use tokio::task::JoinSet;

    use super::*;

    fn key_set() -> JwkSet {
        serde_json::from_value(key_set_json()).unwrap()
    }

    fn empty_set() -> JwkSet {
        serde_json::from_value(json!({ "keys": [] })).unwrap()
    }

    fn key_set_json() -> Value {
        json!({
            "keys": [{
                "kty": "RSA",
                "kid": "k1",
                "use": "sig",
                "alg": "RS256",
                "n": "mm8kOAUEN9Fuq3txmxVItsEM3I3rxs-G9VOhawHmEneHjUA0lEBPGOkyoKZh4gdTDuukKzAl1d-AlNH1a189RJ1hECFwDLF8B42ByEQidzbE2Ix2ApkGrTMxVNdNEzYVMhXE91r0E6jTpixEp8NwZrX2QP6oc4Pf7nhP-NvUHPiytOM28q2chekxClrbnXjIX20E145tu5CnRSYYE4pAf9AU2qnOQuf-Ry7ISl1nflz4f_CeSOf-VyA1kEJ4UOo--PJzePVO9LakOzR5gbwoAniVOkh2uFRDNLB7pEuffo_fLmgNqg9EZXqXcXIpA8GPhV-yKdfOnVKDkmZUSEP8iw",
                "e": "AQAB"
            }]
        })
    }

    /// Local JWKS endpoint serving `key_set()` and counting requests.
    async fn counting_jwks_server() -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = axum::Router::new().route(
            "/jwks",
            axum::routing::get(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    axum::Json(key_set_json())
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/jwks"), hits)
    }

    #[test]
    fn custom_cache_ttl() {
        let cache = JwksCache::new("https://example.com/jwks")
            .unwrap()
            .with_cache_ttl(Duration::from_secs(60));
        assert_eq!(cache.ttl, Duration::from_secs(60));
        assert_eq!(cache.min_refresh, DEFAULT_MIN_REFRESH);
        assert_eq!(cache.url(), "https://example.com/jwks");
    }

    #[tokio::test]
    async fn cache_initially_empty() {
        let cache = JwksCache::new("https://example.com/jwks").unwrap();
        assert!(!cache.is_cached().await);
    }

    #[tokio::test]
    async fn primed_key_is_found_without_network() {
        let cache = JwksCache::new("http://127.0.0.1:9/jwks").unwrap();
        cache.prime(key_set()).await;
        assert!(cache.is_cached().await);
        assert!(cache.decoding_key("k1").await.is_ok());
    }

    #[tokio::test]
    async fn unknown_kid_after_failed_refresh_is_no_matching_key() {
        let cache = JwksCache::new("http://127.0.0.1:9/jwks").unwrap();
        cache.prime(key_set()).await;
        assert!(matches!(
            cache.decoding_key("rotated").await,
            Err(AuthError::NoMatchingKey)
        ));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_fetch_error() {
        let cache = JwksCache::new("http://127.0.0.1:9/jwks").unwrap();
        assert!(matches!(
            cache.decoding_key("k1").await,
            Err(AuthError::JwksFetch(_))
        ));
    }

    #[tokio::test]
    async fn unknown_kids_on_fresh_cache_do_not_fetch() {
        let (url, hits) = counting_jwks_server().await;
        let cache = JwksCache::new(url).unwrap();
        cache.prime(empty_set()).await;

        for n in 0..50 {
            let kid = format!("bogus-{n}");
            assert!(matches!(
                cache.decoding_key(&kid).await,
                Err(AuthError::NoMatchingKey)
            ));
        }
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn concurrent_misses_share_one_fetch() {
        let (url, hits) = counting_jwks_server().await;
        let cache = JwksCache::new(url)
            .unwrap()
            .with_min_refresh_interval(Duration::from_millis(500));
        cache.prime(empty_set()).await;
        tokio::time::sleep(Duration::from_millis(600)).await;

        let mut tasks = JoinSet::new();
        for n in 0..50 {
            let cache = cache.clone();
            tasks.spawn(async move { cache.decoding_key(&format!("bogus-{n}")).await });
        }
        while let Some(result) = tasks.join_next().await {
            assert!(matches!(result.unwrap(), Err(AuthError::NoMatchingKey)));
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert!(cache.decoding_key("bogus-again").await.is_err());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rotated_key_is_found_after_one_fetch() {
        let (url, hits) = counting_jwks_server().await;
        let cache = JwksCache::new(url)
            .unwrap()
            .with_min_refresh_interval(Duration::ZERO);
        cache.prime(empty_set()).await;

        assert!(cache.decoding_key("k1").await.is_ok());
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert!(cache.decoding_key("k1").await.is_ok());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_fetch_is_not_retried_within_interval() {
        let cache = JwksCache::new("http://127.0.0.1:9/jwks").unwrap();
        assert!(matches!(
            cache.decoding_key("k1").await,
            Err(AuthError::JwksFetch(_))
        ));
        assert!(matches!(
            cache.decoding_key("k1").await,
            Err(AuthError::JwksFetch(ref msg)) if msg.contains("retry later")
        ));
    }
}
