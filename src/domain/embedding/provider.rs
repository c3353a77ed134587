//! Embedding provider trait definition

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::DomainError;

/// Remote embedding service (OpenAI-compatible or similar)
#[async_trait]
pub trait EmbeddingProvider: Send + Sync + Debug {
    /// Embeds every text with one remote call; vectors are returned in input order
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, DomainError>;

    /// Embeds a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>, DomainError> {
        self.embed_batch(vec![text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::provider(self.provider_name(), "Empty embedding response"))
    }

    /// Get the provider name
    fn provider_name(&self) -> &'static str;

    /// Length of the vectors this provider returns
    fn dimensions(&self) -> usize;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::domain::embedding::normalize;

    /// Deterministic bag-of-words embedder that records every call.
    ///
    /// Each lowercase word is hashed into one dimension, so texts sharing
    /// words have a positive cosine similarity.
    #[derive(Debug)]
    pub struct MockEmbeddingProvider {
        dimensions: usize,
        error: Option<String>,
        delay: Option<Duration>,
        drop_last: bool,
        failing: AtomicBool,
        failures_left: AtomicUsize,
        calls: AtomicUsize,
        batch_sizes: Mutex<Vec<usize>>,
    }

    impl MockEmbeddingProvider {
        pub fn new(dimensions: usize) -> Self {
            Self {
                dimensions,
                error: None,
                delay: None,
                drop_last: false,
                failing: AtomicBool::new(false),
                failures_left: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
                batch_sizes: Mutex::new(Vec::new()),
            }
        }

        pub fn with_error(mut self, error: impl Into<String>) -> Self {
            self.error = Some(error.into());
            self
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        /// Returns one vector fewer than requested
        pub fn with_short_response(mut self) -> Self {
            self.drop_last = true;
            self
        }

        /// Fails the next `n` calls, then recovers
        pub fn with_transient_failures(self, n: usize) -> Self {
            self.failures_left.store(n, Ordering::SeqCst);
            self
        }

        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        /// Number of remote calls made
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// Size of every batch received, in call order
        pub fn batch_sizes(&self) -> Vec<usize> {
            self.batch_sizes.lock().unwrap().clone()
        }

        pub fn vector_for(&self, text: &str) -> Vec<f32> {
            let mut vector = vec![0.0f32; self.dimensions];

            for word in text
                .split(|c: char| !c.is_alphanumeric())
                .filter(|w| !w.is_empty())
            {
                let hash = word
                    .to_lowercase()
                    .bytes()
                    .fold(0xcbf29ce484222325u64, |acc, b| {
                        (acc ^ b as u64).wrapping_mul(0x100000001b3)
                    });
                vector[(hash % self.dimensions as u64) as usize] += 1.0;
            }

            normalize(&mut vector);
            vector
        }
    }

    #[async_trait]
    impl EmbeddingProvider for MockEmbeddingProvider {
        async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, DomainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.batch_sizes.lock().unwrap().push(texts.len());

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            if let Some(ref error) = self.error {
                return Err(DomainError::provider("mock", error));
            }

            if self.failing.load(Ordering::SeqCst) {
                return Err(DomainError::provider("mock", "service unavailable"));
            }

            let remaining = self.failures_left.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures_left.store(remaining - 1, Ordering::SeqCst);
                return Err(DomainError::provider("mock", "HTTP 503"));
            }

            let mut vectors: Vec<Vec<f32>> = texts.iter().map(|t| self.vector_for(t)).collect();
            if self.drop_last {
                vectors.pop();
            }

            Ok(vectors)
        }

        fn provider_name(&self) -> &'static str {
            "mock"
        }

        fn dimensions(&self) -> usize {
            self.dimensions
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::domain::embedding::cosine_similarity;

        #[tokio::test]
        async fn test_batch_is_positional() {
            let provider = MockEmbeddingProvider::new(64);

            let vectors = provider
                .embed_batch(vec!["reset password".into(), "billing invoice".into()])
                .await
                .unwrap();

            assert_eq!(vectors.len(), 2);
            assert_eq!(vectors[0], provider.vector_for("reset password"));
            assert_eq!(provider.calls(), 1);
            assert_eq!(provider.batch_sizes(), vec![2]);
        }

        #[tokio::test]
        async fn test_shared_words_are_similar() {
            let provider = MockEmbeddingProvider::new(128);

            let a = provider.embed("how do I reset my password").await.unwrap();
            let b = provider.embed("reset password").await.unwrap();
            let c = provider.embed("refund").await.unwrap();

            assert!(cosine_similarity(&a, &b) > cosine_similarity(&a, &c));
        }

        #[tokio::test]
        async fn test_transient_failures_recover() {
            let provider = MockEmbeddingProvider::new(16).with_transient_failures(1);

            assert!(provider.embed("text").await.is_err());
            assert!(provider.embed("text").await.is_ok());
        }

        #[tokio::test]
        async fn test_error() {
            let provider = MockEmbeddingProvider::new(16).with_error("API error");

            let result = provider.embed("text").await;
            assert!(matches!(result, Err(DomainError::Provider { .. })));
        }
    }
}
