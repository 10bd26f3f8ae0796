//! Key sets fetched from a provider and cached for verification

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::Instrument;
use warden::{
    jwk::{KeyId, KeyIdRef},
    Jwk, Jwks,
};
use warden_clock::{Clock, System, UnixTime};

use crate::JwksError;

mod local;
mod remote;

pub use local::StaticKeysProvider;
pub use remote::{AuthorityKeysProvider, UrlKeysProvider};

/// The default minimum time between refreshes triggered by an unknown key id
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(120);

/// The default maximum age of a cached key set
pub const DEFAULT_CACHE_TIME: Duration = Duration::from_secs(3 * 60 * 60);

/// A source of JSON Web Key Sets
#[async_trait]
pub trait KeysProvider: fmt::Debug + Send + Sync {
    /// Retrieves the current key set
    async fn fetch_keys(&self) -> Result<Jwks, JwksError>;
}

#[async_trait]
impl<P: KeysProvider + ?Sized> KeysProvider for Arc<P> {
    async fn fetch_keys(&self) -> Result<Jwks, JwksError> {
        (**self).fetch_keys().await
    }
}

/// A snapshot of a key set, as fetched at a point in time
#[derive(Debug)]
pub struct CachedKeys {
    jwks: Jwks,
    by_id: HashMap<KeyId, usize>,
    fetched_at: UnixTime,
}

impl CachedKeys {
    fn new(jwks: Jwks, fetched_at: UnixTime) -> Self {
        let mut by_id = HashMap::with_capacity(jwks.keys().len());
        for (idx, key) in jwks.keys().iter().enumerate() {
            if let Some(kid) = key.key_id() {
                by_id.entry(kid.to_owned()).or_insert(idx);
            }
        }

        Self {
            jwks,
            by_id,
            fetched_at,
        }
    }

    /// The key carrying the given id
    ///
    /// When several keys share an id, the first one listed wins.
    #[must_use]
    pub fn get(&self, kid: &KeyIdRef) -> Option<&Jwk> {
        self.by_id.get(kid).map(|&idx| &self.jwks.keys()[idx])
    }

    /// The full key set, including keys without an id
    #[must_use]
    pub fn jwks(&self) -> &Jwks {
        &self.jwks
    }

    /// When the key set was fetched
    #[must_use]
    pub fn fetched_at(&self) -> UnixTime {
        self.fetched_at
    }
}

type SharedFetch = Shared<BoxFuture<'static, Result<Arc<CachedKeys>, JwksError>>>;

#[derive(Default)]
struct FetchState {
    in_flight: Option<SharedFetch>,
    last_attempt: Option<UnixTime>,
}

struct Inner {
    provider: Arc<dyn KeysProvider>,
    clock: Arc<dyn Clock>,
    refresh_interval: Duration,
    cache_time: Duration,
    cache: ArcSwapOption<CachedKeys>,
    state: Mutex<FetchState>,
}

impl fmt::Debug for Inner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwksClient")
            .field("provider", &self.provider)
            .field("refresh_interval", &self.refresh_interval)
            .field("cache_time", &self.cache_time)
            .field(
                "fetched_at",
                &self.cache.load().as_ref().map(|c| c.fetched_at),
            )
            .finish()
    }
}

/// A caching client for a JSON Web Key Set
///
/// Reads are served from a lock-free snapshot. When a refresh is needed,
/// concurrent callers share a single in-flight fetch and all observe the
/// same result; dropping one caller does not cancel the fetch for the
/// others. The snapshot is replaced wholesale on each successful fetch.
///
/// A lookup for an unknown key id triggers a refresh only when the last
/// fetch attempt is at least `refresh_interval` old. A snapshot older than
/// `cache_time` is refreshed before use; a zero `cache_time` keeps
/// snapshots indefinitely.
#[derive(Clone, Debug)]
#[must_use]
pub struct JwksClient {
    inner: Arc<Inner>,
}

impl JwksClient {
    /// Constructs a client with default timings over the given provider
    pub fn new(provider: impl KeysProvider + 'static) -> Self {
        Self::builder(provider).build()
    }

    /// Starts configuring a client over the given provider
    pub fn builder(provider: impl KeysProvider + 'static) -> JwksClientBuilder {
        JwksClientBuilder {
            provider: Arc::new(provider),
            clock: Arc::new(System),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            cache_time: DEFAULT_CACHE_TIME,
        }
    }

    /// Gets the key with the given id
    ///
    /// # Errors
    ///
    /// * `UnknownKey` if no key has the id, even after any permitted refresh
    /// * `KeysFetch` or `KeysFormat` if a required fetch failed
    #[tracing::instrument(skip(self), fields(jwk.kid = %kid))]
    pub async fn get_key(&self, kid: &KeyIdRef) -> Result<Jwk, JwksError> {
        let current = self.inner.cache.load_full();

        let throttled = match &current {
            Some(keys) if !self.is_stale(keys) => {
                if let Some(key) = keys.get(kid) {
                    return Ok(key.clone());
                }
                tracing::debug!("key id not in cached key set");
                true
            }
            _ => false,
        };

        let keys = self.refresh(current.as_ref(), throttled).await?;

        keys.get(kid)
            .cloned()
            .ok_or_else(|| JwksError::UnknownKey(kid.to_owned()))
    }

    /// The current key set, fetching it first if missing or stale
    ///
    /// # Errors
    ///
    /// A required fetch failed.
    pub async fn keys(&self) -> Result<Arc<CachedKeys>, JwksError> {
        let current = self.inner.cache.load_full();

        match current {
            Some(keys) if !self.is_stale(&keys) => Ok(keys),
            _ => self.refresh(current.as_ref(), false).await,
        }
    }

    /// The cached key set, without fetching
    #[must_use]
    pub fn cached(&self) -> Option<Arc<CachedKeys>> {
        self.inner.cache.load_full()
    }

    /// Replaces the cached key set
    pub fn set_jwks(&self, jwks: Jwks) {
        let keys = CachedKeys::new(jwks, self.inner.clock.now());
        self.inner.cache.store(Some(Arc::new(keys)));
    }

    fn is_stale(&self, keys: &CachedKeys) -> bool {
        let max_age = self.inner.cache_time.as_secs();
        max_age != 0 && self.inner.clock.now().seconds_since(keys.fetched_at) >= max_age
    }

    /// Fetches a new key set, or joins a fetch already in flight
    ///
    /// `observed` is the snapshot the caller found lacking. If the cache has
    /// moved on since then, the newer snapshot is returned instead. When
    /// `throttled`, no new fetch is started within `refresh_interval` of the
    /// last attempt and the observed snapshot is returned as-is.
    async fn refresh(
        &self,
        observed: Option<&Arc<CachedKeys>>,
        throttled: bool,
    ) -> Result<Arc<CachedKeys>, JwksError> {
        let fetch = {
            let mut state = self
                .inner
                .state
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            let current = self.inner.cache.load_full();
            let moved_on = match (&current, observed) {
                (Some(c), Some(o)) => !Arc::ptr_eq(c, o),
                (Some(_), None) => true,
                (None, _) => false,
            };
            if let (true, Some(current)) = (moved_on, current) {
                return Ok(current);
            }

            match &state.in_flight {
                Some(fetch) => fetch.clone(),
                None => {
                    let now = self.inner.clock.now();

                    if let (true, Some(keys), Some(last)) = (throttled, observed, state.last_attempt)
                    {
                        if now.seconds_since(last) < self.inner.refresh_interval.as_secs() {
                            tracing::debug!(
                                last_attempt = %last,
                                "refresh suppressed; last attempt too recent"
                            );
                            return Ok(Arc::clone(keys));
                        }
                    }

                    state.last_attempt = Some(now);
                    let fetch = self.start_fetch();
                    state.in_flight = Some(fetch.clone());
                    fetch
                }
            }
        };

        fetch.await
    }

    fn start_fetch(&self) -> SharedFetch {
        let provider = Arc::clone(&self.inner.provider);
        let clock = Arc::clone(&self.inner.clock);
        let inner = Arc::downgrade(&self.inner);

        let span = tracing::info_span!("jwks_refresh");

        async move {
            let result = provider.fetch_keys().await.map(|jwks| {
                let keys = Arc::new(CachedKeys::new(jwks, clock.now()));
                tracing::info!(jwks.keys = keys.jwks().keys().len(), "JWKS refreshed");
                keys
            });

            if let Err(error) = &result {
                let error: &(dyn std::error::Error + 'static) = error;
                tracing::warn!(error, "JWKS refresh failed");
            }

            if let Some(inner) = inner.upgrade() {
                let mut state = inner.state.lock().unwrap_or_else(PoisonError::into_inner);
                if let Ok(keys) = &result {
                    inner.cache.store(Some(Arc::clone(keys)));
                }
                state.in_flight = None;
            }

            result
        }
        .instrument(span)
        .boxed()
        .shared()
    }
}

/// Configures a [`JwksClient`]
#[must_use]
pub struct JwksClientBuilder {
    provider: Arc<dyn KeysProvider>,
    clock: Arc<dyn Clock>,
    refresh_interval: Duration,
    cache_time: Duration,
}

impl fmt::Debug for JwksClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwksClientBuilder")
            .field("provider", &self.provider)
            .field("refresh_interval", &self.refresh_interval)
            .field("cache_time", &self.cache_time)
            .finish_non_exhaustive()
    }
}

impl JwksClientBuilder {
    /// Sets the minimum time between refreshes triggered by unknown key ids
    pub fn with_refresh_interval(self, refresh_interval: Duration) -> Self {
        Self {
            refresh_interval,
            ..self
        }
    }

    /// Sets the maximum age of a cached key set; zero disables expiry
    pub fn with_cache_time(self, cache_time: Duration) -> Self {
        Self { cache_time, ..self }
    }

    /// Sets the clock used to stamp and age key sets
    pub fn with_clock(self, clock: impl Clock + 'static) -> Self {
        Self {
            clock: Arc::new(clock),
            ..self
        }
    }

    /// Builds the client with an empty cache
    pub fn build(self) -> JwksClient {
        JwksClient {
            inner: Arc::new(Inner {
                provider: self.provider,
                clock: self.clock,
                refresh_interval: self.refresh_interval,
                cache_time: self.cache_time,
                cache: ArcSwapOption::empty(),
                state: Mutex::new(FetchState::default()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use color_eyre::Result;
    use tracing_test::traced_test;
    use warden::jwa;
    use warden_clock::TestClock;

    use super::*;

    #[derive(Debug, Default)]
    struct Counting {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl KeysProvider for Counting {
        async fn fetch_keys(&self) -> Result<Jwks, JwksError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(JwksError::fetch("connection refused"));
            }
            Ok(std::iter::once(
                Jwk::from(jwa::Hmac::new(b"secret".to_vec())).with_key_id("a"),
            )
            .collect())
        }
    }

    fn client(provider: &Arc<Counting>, clock: &TestClock) -> JwksClient {
        JwksClient::builder(Arc::clone(provider))
            .with_clock(clock.clone())
            .with_refresh_interval(Duration::from_secs(120))
            .with_cache_time(Duration::from_secs(3600))
            .build()
    }

    fn kid(s: &str) -> &KeyIdRef {
        KeyIdRef::from_str(s)
    }

    #[tokio::test]
    #[traced_test]
    async fn first_lookup_fetches_then_hits_cache() -> Result<()> {
        let provider = Arc::new(Counting::default());
        let clock = TestClock::new(UnixTime(1_000));
        let client = client(&provider, &clock);

        let first = client.get_key(kid("a")).await?;
        let second = client.get_key(kid("a")).await?;
        assert_eq!(first, second);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(client.cached().map(|c| c.fetched_at()), Some(UnixTime(1_000)));
        assert!(logs_contain("JWKS refreshed"));
        Ok(())
    }

    #[tokio::test]
    async fn unknown_kid_within_interval_does_not_fetch() -> Result<()> {
        let provider = Arc::new(Counting::default());
        let clock = TestClock::new(UnixTime(1_000));
        let client = client(&provider, &clock);

        let _ = client.get_key(kid("a")).await?;
        clock.inc(119);
        let err = client.get_key(kid("b")).await.unwrap_err();
        assert!(matches!(err, JwksError::UnknownKey(k) if k.as_str() == "b"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        clock.inc(1);
        assert!(client.get_key(kid("b")).await.is_err());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[tokio::test]
    async fn stale_cache_is_refetched_on_hit() -> Result<()> {
        let provider = Arc::new(Counting::default());
        let clock = TestClock::new(UnixTime(1_000));
        let client = client(&provider, &clock);

        client.keys().await?;
        clock.inc(3_599);
        let _ = client.get_key(kid("a")).await?;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        clock.inc(1);
        let _ = client.get_key(kid("a")).await?;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[tokio::test]
    async fn zero_cache_time_never_expires() -> Result<()> {
        let provider = Arc::new(Counting::default());
        let clock = TestClock::new(UnixTime(0));
        let client = JwksClient::builder(Arc::clone(&provider))
            .with_clock(clock.clone())
            .with_cache_time(Duration::ZERO)
            .build();

        client.keys().await?;
        clock.inc(1_000_000);
        client.keys().await?;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    #[traced_test]
    async fn failures_are_reported_and_not_cached() {
        let provider = Arc::new(Counting {
            fail: true,
            ..Counting::default()
        });
        let clock = TestClock::new(UnixTime(0));
        let client = client(&provider, &clock);

        assert!(matches!(
            client.get_key(kid("a")).await,
            Err(JwksError::KeysFetch(_))
        ));
        assert!(client.cached().is_none());
        assert!(logs_contain("JWKS refresh failed"));

        assert!(client.keys().await.is_err());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn preloaded_set_is_used_without_fetching() -> Result<()> {
        let provider = Arc::new(Counting::default());
        let clock = TestClock::new(UnixTime(0));
        let client = client(&provider, &clock);

        client.set_jwks(
            std::iter::once(Jwk::from(jwa::Hmac::new(b"x".to_vec())).with_key_id("pre")).collect(),
        );
        let key = client.get_key(kid("pre")).await?;
        assert_eq!(key.key_id().map(KeyIdRef::as_str), Some("pre"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[test]
    fn duplicate_ids_resolve_to_first_key() {
        let first = Jwk::from(jwa::Hmac::new(b"one".to_vec())).with_key_id("dup");
        let second = Jwk::from(jwa::Hmac::new(b"two".to_vec())).with_key_id("dup");
        let keys = CachedKeys::new([first.clone(), second].into_iter().collect(), UnixTime(0));
        assert_eq!(keys.get(kid("dup")), Some(&first));
    }
}
