//! Retry and deadline wrapper for vector store backends.

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use semsearch_core::{Error, Result, VectorStoreConfig};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::VectorStoreBackend;
use crate::types::{DocumentId, DocumentRecord, IndexConfiguration};

/// Wraps a backend with bounded retry and an optional per-attempt deadline.
///
/// Only errors reporting [`Error::is_retryable`] are retried. A call that
/// outlives its deadline fails with [`Error::Timeout`].
pub struct RetryBackend {
    inner: Arc<dyn VectorStoreBackend>,
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
    timeout: Option<Duration>,
}

impl RetryBackend {
    /// Creates a new retry wrapper with default settings.
    ///
    /// Default settings:
    /// - Max attempts: 3
    /// - Initial delay: 100 milliseconds
    /// - Max delay: 2 seconds
    /// - No deadline
    pub fn new(backend: Arc<dyn VectorStoreBackend>) -> Self {
        Self {
            inner: backend,
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            timeout: None,
        }
    }

    /// Creates a wrapper using the retry and timeout settings of `config`.
    pub fn from_config(backend: Arc<dyn VectorStoreBackend>, config: &VectorStoreConfig) -> Self {
        Self {
            inner: backend,
            max_attempts: config.retry.max_attempts,
            initial_delay: config.retry.initial_delay(),
            max_delay: config.retry.max_delay(),
            timeout: config.timeout(),
        }
    }

    /// Sets the maximum number of retries after the first attempt.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the initial delay between retries.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay between retries.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the deadline applied to each attempt.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The wrapped backend.
    pub fn inner(&self) -> &Arc<dyn VectorStoreBackend> {
        &self.inner
    }

    /// Determines if an error should be retried.
    fn should_retry(error: &Error) -> bool {
        error.is_retryable()
    }

    async fn call<T, F, Fut>(&self, operation: &str, mut f: F) -> Result<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let backoff = ExponentialBuilder::default()
            .with_min_delay(self.initial_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_attempts as usize);
        let timeout = self.timeout;
        let backend = self.inner.name().to_string();

        (|| {
            let attempt = f();
            async move {
                match timeout {
                    Some(deadline) => tokio::time::timeout(deadline, attempt)
                        .await
                        .map_err(|_| {
                            Error::timeout(format!("{operation} exceeded {deadline:?}"))
                        })?,
                    None => attempt.await,
                }
            }
        })
        .retry(backoff)
        .when(Self::should_retry)
        .notify(|err: &Error, delay: Duration| {
            log::warn!("{backend} {operation} failed, retrying in {delay:?}: {err}");
        })
        .await
    }
}

#[async_trait]
impl VectorStoreBackend for RetryBackend {
    async fn configure(&self, config: &IndexConfiguration) -> Result<()> {
        self.call("configure", || self.inner.configure(config)).await
    }

    async fn search(
        &self,
        index_name: &str,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<DocumentId>> {
        self.call("search", || self.inner.search(index_name, query, limit))
            .await
    }

    async fn save(&self, record: &DocumentRecord) -> Result<()> {
        self.call("save", || self.inner.save(record)).await
    }

    async fn delete(&self, id: &DocumentId) -> Result<()> {
        self.call("delete", || self.inner.delete(id)).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

impl std::fmt::Debug for RetryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryBackend")
            .field("inner", &self.inner.name())
            .field("max_attempts", &self.max_attempts)
            .field("timeout", &self.timeout)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{InMemoryBackend, InMemoryStore};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` searches with the error built by `make_err`.
    struct FlakyBackend {
        calls: AtomicU32,
        failures: u32,
        make_err: fn() -> Error,
        delay: Option<Duration>,
    }

    impl FlakyBackend {
        fn new(failures: u32, make_err: fn() -> Error) -> Self {
            Self {
                calls: AtomicU32::new(0),
                failures,
                make_err,
                delay: None,
            }
        }

        fn slow(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::new(0, || Error::backend("unused"))
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl VectorStoreBackend for FlakyBackend {
        async fn configure(&self, _config: &IndexConfiguration) -> Result<()> {
            Ok(())
        }

        async fn search(
            &self,
            _index_name: &str,
            _query: &[f32],
            _limit: usize,
        ) -> Result<Vec<DocumentId>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if n < self.failures {
                Err((self.make_err)())
            } else {
                Ok(vec![DocumentId::Int(1)])
            }
        }

        async fn save(&self, _record: &DocumentRecord) -> Result<()> {
            Ok(())
        }

        async fn delete(&self, _id: &DocumentId) -> Result<()> {
            Ok(())
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    fn fast_retry(inner: Arc<dyn VectorStoreBackend>) -> RetryBackend {
        RetryBackend::new(inner)
            .with_initial_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_errors() {
        let flaky = Arc::new(FlakyBackend::new(2, || Error::backend("connection reset")));
        let retry = fast_retry(flaky.clone());

        let ids = retry.search("name", &[1.0], 5).await.unwrap();
        assert_eq!(ids, vec![DocumentId::Int(1)]);
        assert_eq!(flaky.calls(), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let flaky = Arc::new(FlakyBackend::new(10, || Error::backend("down")));
        let retry = fast_retry(flaky.clone()).with_max_attempts(2);

        let err = retry.search("name", &[1.0], 5).await.unwrap_err();
        assert!(err.is_backend());
        assert_eq!(flaky.calls(), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_not_retried() {
        let flaky = Arc::new(FlakyBackend::new(10, || {
            Error::collection_not_found("Product")
        }));
        let retry = fast_retry(flaky.clone());

        let err = retry.search("name", &[1.0], 5).await.unwrap_err();
        assert!(matches!(err, Error::CollectionNotFound(_)));
        assert_eq!(flaky.calls(), 1);
    }

    #[tokio::test]
    async fn test_zero_attempts_disables_retry() {
        let flaky = Arc::new(FlakyBackend::new(1, || Error::backend("blip")));
        let retry = fast_retry(flaky.clone()).with_max_attempts(0);

        assert!(retry.search("name", &[1.0], 5).await.is_err());
        assert_eq!(flaky.calls(), 1);
    }

    #[tokio::test]
    async fn test_timeout_surfaces_as_backend_error() {
        let slow = Arc::new(FlakyBackend::slow(Duration::from_millis(200)));
        let retry = fast_retry(slow.clone())
            .with_max_attempts(0)
            .with_timeout(Duration::from_millis(10));

        let err = retry.search("name", &[1.0], 5).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert!(err.is_backend());
    }

    #[tokio::test]
    async fn test_from_config() {
        let mut config = VectorStoreConfig::default();
        config.retry.max_attempts = 4;
        config.timeout_ms = Some(750);

        let inner = Arc::new(InMemoryBackend::new(InMemoryStore::new()));
        let retry = RetryBackend::from_config(inner, &config);
        assert_eq!(retry.max_attempts, 4);
        assert_eq!(retry.timeout, Some(Duration::from_millis(750)));
        assert_eq!(retry.name(), "memory");
    }

    #[tokio::test]
    async fn test_passes_through_to_inner() {
        let store = InMemoryStore::new();
        let retry = RetryBackend::new(Arc::new(InMemoryBackend::new(store.clone())));
        let config = IndexConfiguration::new("Product")
            .with_slot("name", crate::types::VectorSlot::new(2, Default::default()));

        retry.configure(&config).await.unwrap();
        retry
            .save(&DocumentRecord::new(1).with_vector("name", vec![1.0, 0.0]))
            .await
            .unwrap();
        assert_eq!(store.count("Product"), 1);

        retry.delete(&DocumentId::Int(1)).await.unwrap();
        assert_eq!(store.count("Product"), 0);
    }
}
