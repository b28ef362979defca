//! Credential capability and token caching.
//!
//! Credential storage and OAuth flows live outside this crate; consumers see
//! only `CredentialSource`, which either yields a usable bearer token or
//! nothing. Tokens are never logged — `AccessToken`'s Debug impl redacts the
//! secret.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::{debug, trace};

use crate::{Platform, PlatformError};

/// A bearer token for one platform.
#[derive(Clone)]
pub struct AccessToken {
    secret: String,
    /// When the token stops being valid, if known.
    pub expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    /// Create a token.
    pub fn new(secret: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            secret: secret.into(),
            expires_at,
        }
    }

    /// The raw secret, for use in an Authorization header.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Whether the token is past its expiry.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(at) => at <= Utc::now(),
            None => false,
        }
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Capability that resolves a bearer token for a platform.
///
/// Returns `Ok(None)` when no credentials are configured for the platform.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn resolve_token(&self, platform: Platform) -> Result<Option<AccessToken>, PlatformError>;
}

/// Credential source backed by a fixed map, e.g. tokens supplied through
/// configuration.
pub struct StaticCredentials {
    tokens: HashMap<Platform, AccessToken>,
}

impl StaticCredentials {
    /// Create an empty source.
    pub fn new() -> Self {
        Self {
            tokens: HashMap::new(),
        }
    }

    /// Add a token for a platform.
    pub fn with_token(mut self, platform: Platform, token: AccessToken) -> Self {
        self.tokens.insert(platform, token);
        self
    }
}

impl Default for StaticCredentials {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialSource for StaticCredentials {
    async fn resolve_token(&self, platform: Platform) -> Result<Option<AccessToken>, PlatformError> {
        Ok(self.tokens.get(&platform).cloned())
    }
}

/// A cached token and when it was fetched.
#[derive(Clone)]
struct CachedToken {
    token: AccessToken,
    fetched_at: DateTime<Utc>,
}

/// Keyed TTL cache over a `CredentialSource`.
///
/// Short-lived exchange state lives here instead of a process-global map:
/// entries expire after the TTL or when the token itself expires, whichever
/// comes first, and are refetched from the inner source on the next resolve.
pub struct TokenCache<S> {
    inner: S,
    ttl: Duration,
    entries: DashMap<Platform, CachedToken>,
}

impl<S: CredentialSource> TokenCache<S> {
    /// Wrap a source with the given entry TTL.
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: DashMap::new(),
        }
    }

    fn fresh(&self, cached: &CachedToken) -> bool {
        !cached.token.is_expired() && cached.fetched_at + self.ttl > Utc::now()
    }
}

#[async_trait]
impl<S: CredentialSource> CredentialSource for TokenCache<S> {
    async fn resolve_token(&self, platform: Platform) -> Result<Option<AccessToken>, PlatformError> {
        if let Some(cached) = self.entries.get(&platform) {
            if self.fresh(&cached) {
                trace!(platform = %platform, "token cache hit");
                return Ok(Some(cached.token.clone()));
            }
        }

        // Stale or missing: drop the entry and ask the inner source.
        self.entries.remove(&platform);
        let token = self.inner.resolve_token(platform).await?;

        if let Some(ref token) = token {
            self.entries.insert(
                platform,
                CachedToken {
                    token: token.clone(),
                    fetched_at: Utc::now(),
                },
            );
            debug!(platform = %platform, "token cached");
        }

        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
        token: Option<AccessToken>,
    }

    impl CountingSource {
        fn new(token: Option<AccessToken>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                token,
            }
        }
    }

    #[async_trait]
    impl CredentialSource for &CountingSource {
        async fn resolve_token(
            &self,
            _platform: Platform,
        ) -> Result<Option<AccessToken>, PlatformError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.token.clone())
        }
    }

    #[test]
    fn debug_redacts_secret() {
        let token = AccessToken::new("super-secret", None);
        let output = format!("{:?}", token);
        assert!(!output.contains("super-secret"));
        assert!(output.contains("<redacted>"));
    }

    #[test]
    fn expiry_check() {
        let live = AccessToken::new("t", Some(Utc::now() + Duration::hours(1)));
        assert!(!live.is_expired());

        let dead = AccessToken::new("t", Some(Utc::now() - Duration::seconds(1)));
        assert!(dead.is_expired());

        let eternal = AccessToken::new("t", None);
        assert!(!eternal.is_expired());
    }

    #[tokio::test]
    async fn static_credentials_resolve_configured_platforms_only() {
        let creds = StaticCredentials::new()
            .with_token(Platform::Twitter, AccessToken::new("tw", None));

        let token = creds.resolve_token(Platform::Twitter).await.unwrap();
        assert_eq!(token.unwrap().secret(), "tw");

        let missing = creds.resolve_token(Platform::Instagram).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn cache_serves_fresh_entries_without_refetching() {
        let source = CountingSource::new(Some(AccessToken::new("tok", None)));
        let cache = TokenCache::new(&source, Duration::hours(1));

        for _ in 0..3 {
            let token = cache.resolve_token(Platform::Facebook).await.unwrap();
            assert_eq!(token.unwrap().secret(), "tok");
        }

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cache_refetches_after_ttl() {
        let source = CountingSource::new(Some(AccessToken::new("tok", None)));
        let cache = TokenCache::new(&source, Duration::zero());

        cache.resolve_token(Platform::Facebook).await.unwrap();
        cache.resolve_token(Platform::Facebook).await.unwrap();

        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cache_drops_expired_tokens() {
        let expired = AccessToken::new("tok", Some(Utc::now() - Duration::seconds(1)));
        let source = CountingSource::new(Some(expired));
        let cache = TokenCache::new(&source, Duration::hours(1));

        cache.resolve_token(Platform::Twitter).await.unwrap();
        cache.resolve_token(Platform::Twitter).await.unwrap();

        // The cached entry is expired, so every resolve goes to the source.
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cache_does_not_store_missing_tokens() {
        let source = CountingSource::new(None);
        let cache = TokenCache::new(&source, Duration::hours(1));

        assert!(cache.resolve_token(Platform::Twitter).await.unwrap().is_none());
        assert!(cache.resolve_token(Platform::Twitter).await.unwrap().is_none());

        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}
