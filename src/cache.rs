//! Metadata Cache
//!
//! Memoizes asynchronous lookups. Concurrent calls with an equal key share a
//! single in-flight fetch and its settled result; later calls return the
//! stored result without calling the fetch function again.
//!
//! A [`MetadataCache`] owns the registry of every [`Memoized`] function
//! created through it, so one `flush()` invalidates all of them.

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Weak};

use crate::error::MetadataError;

type FetchResult<V> = Result<V, MetadataError>;
type SharedFetch<V> = Shared<BoxFuture<'static, FetchResult<V>>>;
type FetchFn<K, V> = Arc<dyn Fn(K) -> BoxFuture<'static, FetchResult<V>> + Send + Sync>;

/// Anything the owning cache can invalidate
trait Flush: Send + Sync {
    fn flush(&self);
}

/// One memoized async function `K -> V`
pub struct Memoized<K, V> {
    name: &'static str,
    fetch: FetchFn<K, V>,
    entries: Mutex<HashMap<K, SharedFetch<V>>>,
}

impl<K, V> Memoized<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Resolve `key`, joining an in-flight fetch or returning the stored result
    pub async fn get(&self, key: K) -> FetchResult<V> {
        let pending = {
            let mut entries = self.entries.lock();
            match entries.get(&key) {
                Some(existing) => {
                    tracing::debug!(cache = self.name, ?key, "cache hit");
                    existing.clone()
                }
                None => {
                    tracing::debug!(cache = self.name, ?key, "cache miss, fetching");
                    let fetch = (self.fetch)(key.clone()).shared();
                    entries.insert(key, fetch.clone());
                    fetch
                }
            }
        };
        pending.await
    }

    /// The settled result for `key`, if a fetch for it has completed
    pub fn peek(&self, key: &K) -> Option<FetchResult<V>> {
        self.entries.lock().get(key).and_then(|f| f.peek().cloned())
    }

    /// Whether `key` has an entry, settled or in flight
    pub fn contains(&self, key: &K) -> bool {
        self.entries.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Flush for Memoized<K, V>
where
    K: Send + Sync,
    V: Send + Sync,
{
    fn flush(&self) {
        let mut entries = self.entries.lock();
        tracing::debug!(cache = self.name, entries = entries.len(), "flushing");
        entries.clear();
    }
}

/// Owner of memoized functions, flushed as a unit
#[derive(Default)]
pub struct MetadataCache {
    registered: Mutex<Vec<Weak<dyn Flush>>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap `fetch` and register it with this cache
    pub fn memoize<K, V, F, Fut>(&self, name: &'static str, fetch: F) -> Arc<Memoized<K, V>>
    where
        K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
        F: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FetchResult<V>> + Send + 'static,
    {
        let memoized = Arc::new(Memoized {
            name,
            fetch: Arc::new(move |key| fetch(key).boxed()),
            entries: Mutex::new(HashMap::new()),
        });
        let as_flush: Arc<dyn Flush> = memoized.clone();
        self.registered.lock().push(Arc::downgrade(&as_flush));
        memoized
    }

    /// Invalidate every entry of every function registered here.
    ///
    /// Fetches already in flight still complete for their current waiters.
    pub fn flush(&self) {
        let mut registered = self.registered.lock();
        registered.retain(|weak| match weak.upgrade() {
            Some(memoized) => {
                memoized.flush();
                true
            }
            None => false,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counting(cache: &MetadataCache, calls: Arc<AtomicUsize>) -> Arc<Memoized<String, usize>> {
        cache.memoize("test", move |key: String| {
            let calls = calls.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(key.len())
            }
        })
    }

    #[tokio::test]
    async fn test_concurrent_equal_keys_share_one_fetch() {
        let cache = MetadataCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let memo = counting(&cache, calls.clone());

        let (a, b) = tokio::join!(memo.get("abc".to_string()), memo.get("abc".to_string()));
        assert_eq!(a.unwrap(), 3);
        assert_eq!(b.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        memo.get("abc".to_string()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_flush_invalidates_every_registered_function() {
        let cache = MetadataCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let first = counting(&cache, calls.clone());
        let second = counting(&cache, calls.clone());

        first.get("a".to_string()).await.unwrap();
        second.get("b".to_string()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        cache.flush();
        assert!(first.is_empty());
        assert!(second.is_empty());

        first.get("a".to_string()).await.unwrap();
        second.get("b".to_string()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_rejection_is_shared_and_kept() {
        let cache = MetadataCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let memo = cache.memoize("failing", move |_key: u32| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(MetadataError::Unavailable("down".to_string()))
            }
        });

        assert!(memo.get(1).await.is_err());
        assert!(memo.get(1).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(memo.peek(&1), Some(Err(MetadataError::Unavailable(_)))));
    }

    #[tokio::test]
    async fn test_peek_is_none_before_fetch() {
        let cache = MetadataCache::new();
        let memo = counting(&cache, Arc::new(AtomicUsize::new(0)));
        assert!(memo.peek(&"x".to_string()).is_none());
        memo.get("x".to_string()).await.unwrap();
        assert_eq!(memo.peek(&"x".to_string()), Some(Ok(1)));
    }
}
