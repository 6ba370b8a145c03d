//! Single-slot token cache with single-flight acquisition.

use log::debug;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{AuthorizationProvider, Token};
use crate::retry::Cancellation;

/// Holds at most one token for a client instance.
///
/// [`TokenCache::get_or_acquire`] and [`TokenCache::invalidate`] are the
/// only ways the cached value changes. Acquisition is serialized by an async
/// gate: while one caller is authorizing, the others wait and then share its
/// result instead of issuing their own authorization call. That holds for a
/// failed authorization too.
pub struct TokenCache<P> {
    provider: P,
    slot: Mutex<Slot>,
    gate: tokio::sync::Mutex<()>,
}

#[derive(Default)]
struct Slot {
    token: Option<Token>,
    /// Bumped each time an uncancelled authorization yields no token.
    failures: u64,
}

impl<P: AuthorizationProvider> TokenCache<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            slot: Mutex::new(Slot::default()),
            gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The cached token, if any.
    pub fn current(&self) -> Option<Token> {
        self.lock_slot().token.clone()
    }

    /// Returns the cached token, authorizing first if the cache is empty.
    ///
    /// `None` means the provider produced no token, either for this caller
    /// or for the authorization this caller was waiting on. An authorization
    /// that ends because its caller was cancelled is not shared: waiters then
    /// authorize with their own signal. Dropping the returned future releases
    /// the gate the same way.
    pub async fn get_or_acquire(&self, cancel: &Cancellation) -> Option<Token> {
        let seen_failures = {
            let slot = self.lock_slot();
            if let Some(token) = &slot.token {
                return Some(token.clone());
            }
            slot.failures
        };

        let _gate = self.gate.lock().await;

        // Another caller may have finished authorizing while we waited.
        {
            let slot = self.lock_slot();
            if let Some(token) = &slot.token {
                debug!("Reusing token acquired by a concurrent call");
                return Some(token.clone());
            }
            if slot.failures != seen_failures {
                debug!("Concurrent authorization yielded no token");
                return None;
            }
        }

        debug!("No cached token, authorizing...");
        let Some(token) = self.provider.authorize(cancel).await else {
            if !cancel.is_cancelled() {
                self.lock_slot().failures += 1;
            }
            return None;
        };
        debug!("Authorized, caching token {}", token.preview());

        self.lock_slot().token = Some(token.clone());
        Some(token)
    }

    /// Clears the cache if it still holds `stale`.
    ///
    /// A token acquired by a concurrent caller after `stale` was injected is
    /// left in place. Returns whether the cache was cleared.
    pub fn invalidate(&self, stale: &Token) -> bool {
        let mut slot = self.lock_slot();
        if slot.token.as_ref() == Some(stale) {
            slot.token = None;
            true
        } else {
            false
        }
    }

    /// Drops whatever token is cached so the next call re-authorizes.
    pub fn clear(&self) {
        if let Some(token) = self.current() {
            self.invalidate(&token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MockAuthorizationProvider;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn token(value: &str) -> Token {
        Token::new(value).unwrap()
    }

    #[tokio::test]
    async fn test_get_or_acquire_authorizes_once() {
        let mut provider = MockAuthorizationProvider::new();
        provider
            .expect_authorize()
            .times(1)
            .returning(|_| Some(token("first")));

        let cache = TokenCache::new(provider);

        assert_eq!(cache.get_or_acquire(&Cancellation::NEVER).await, Some(token("first")));
        assert_eq!(cache.get_or_acquire(&Cancellation::NEVER).await, Some(token("first")));
    }

    #[tokio::test]
    async fn test_get_or_acquire_no_token() {
        let mut provider = MockAuthorizationProvider::new();
        provider.expect_authorize().times(1).returning(|_| None);

        let cache = TokenCache::new(provider);

        assert_eq!(cache.get_or_acquire(&Cancellation::NEVER).await, None);
        assert_eq!(cache.current(), None);
    }

    #[tokio::test]
    async fn test_invalidate_then_reacquire() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);

        let mut provider = MockAuthorizationProvider::new();
        provider.expect_authorize().times(2).returning(move |_| {
            let n = calls_clone.fetch_add(1, Ordering::SeqCst);
            Some(token(&format!("token-{}", n)))
        });

        let cache = TokenCache::new(provider);
        let first = cache.get_or_acquire(&Cancellation::NEVER).await.unwrap();
        assert!(cache.invalidate(&first));
        assert_eq!(cache.current(), None);

        let second = cache.get_or_acquire(&Cancellation::NEVER).await.unwrap();
        assert_eq!(second, token("token-1"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_ignores_other_token() {
        let mut provider = MockAuthorizationProvider::new();
        provider
            .expect_authorize()
            .times(1)
            .returning(|_| Some(token("fresh")));

        let cache = TokenCache::new(provider);
        cache.get_or_acquire(&Cancellation::NEVER).await;

        assert!(!cache.invalidate(&token("stale")));
        assert_eq!(cache.current(), Some(token("fresh")));
    }

    #[tokio::test]
    async fn test_clear() {
        let mut provider = MockAuthorizationProvider::new();
        provider
            .expect_authorize()
            .times(1)
            .returning(|_| Some(token("fresh")));

        let cache = TokenCache::new(provider);
        cache.get_or_acquire(&Cancellation::NEVER).await;
        cache.clear();

        assert_eq!(cache.current(), None);
    }

    /// Provider that takes a while, so concurrent callers overlap.
    struct SlowProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AuthorizationProvider for SlowProvider {
        async fn authorize(&self, _cancel: &Cancellation) -> Option<Token> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Token::new("shared")
        }
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_authorization() {
        let cache = Arc::new(TokenCache::new(SlowProvider {
            calls: AtomicUsize::new(0),
        }));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.get_or_acquire(&Cancellation::NEVER).await })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Some(token("shared")));
        }
        assert_eq!(cache.provider().calls.load(Ordering::SeqCst), 1);
    }

    /// Slow provider that never yields a token.
    struct RejectingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AuthorizationProvider for RejectingProvider {
        async fn authorize(&self, _cancel: &Cancellation) -> Option<Token> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            None
        }
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_failed_authorization() {
        let cache = Arc::new(TokenCache::new(RejectingProvider {
            calls: AtomicUsize::new(0),
        }));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.get_or_acquire(&Cancellation::NEVER).await })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap(), None);
        }
        assert_eq!(cache.provider().calls.load(Ordering::SeqCst), 1);

        // A later call is not a waiter and tries again.
        assert_eq!(cache.get_or_acquire(&Cancellation::NEVER).await, None);
        assert_eq!(cache.provider().calls.load(Ordering::SeqCst), 2);
    }

    /// Slow provider that gives up when its caller's signal fires.
    struct CancellableProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AuthorizationProvider for CancellableProvider {
        async fn authorize(&self, cancel: &Cancellation) -> Option<Token> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            if cancel.is_cancelled() {
                None
            } else {
                Token::new("late")
            }
        }
    }

    #[tokio::test]
    async fn test_waiter_authorizes_after_cancelled_leader() {
        let cache = Arc::new(TokenCache::new(CancellableProvider {
            calls: AtomicUsize::new(0),
        }));
        let signal = CancellationToken::new();

        let leader = {
            let cache = Arc::clone(&cache);
            let cancel = Cancellation::new(signal.clone());
            tokio::spawn(async move { cache.get_or_acquire(&cancel).await })
        };
        let waiter = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get_or_acquire(&Cancellation::NEVER).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        signal.cancel();

        assert_eq!(leader.await.unwrap(), None);
        assert_eq!(waiter.await.unwrap(), Some(token("late")));
        assert_eq!(cache.provider().calls.load(Ordering::SeqCst), 2);
    }
}
