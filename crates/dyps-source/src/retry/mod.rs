//! Retry and timeout wrapper around any repository source

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use dyps_config::{DypsSettings, RetrySettings};
use dyps_core::error::DypsError;
use dyps_core::{DependencyDeclaration, RepositoryId, VersionConstraint, VersionId};

use crate::api::{ManifestSource, VersionSource};
use crate::SourceResult;

/// Source that bounds every call by a deadline and retries transient failures
/// with exponential backoff
#[derive(Debug, Clone)]
pub struct RetryingSource<S> {
    inner: S,
    retry: RetrySettings,
    /// Deadline of a single attempt
    timeout: Duration,
}

impl<S> RetryingSource<S> {
    pub fn new(inner: S, retry: RetrySettings, timeout: Duration) -> Self {
        Self {
            inner,
            retry,
            timeout,
        }
    }

    /// Wrap `inner` with the retry and fetch settings of a run
    pub fn from_settings(inner: S, settings: &DypsSettings) -> Self {
        Self::new(inner, settings.retry.clone(), settings.fetch.timeout)
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Run `operation` until it succeeds, fails permanently, or runs out of retries
    async fn with_retry<F, Fut, T>(&self, repo: &RepositoryId, operation: F) -> SourceResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = SourceResult<T>>,
    {
        let mut delay = self.retry.initial_delay;
        let mut attempt = 0;

        loop {
            let error = match tokio::time::timeout(self.timeout, operation()).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(error)) => error,
                Err(_) => DypsError::fetch_message(
                    repo.clone(),
                    format!("timed out after {}ms", self.timeout.as_millis()),
                ),
            };

            // Don't retry permanent failures or on the final attempt
            if !error.is_recoverable() || attempt >= self.retry.max_retries {
                return Err(error);
            }

            attempt += 1;
            warn!(
                repo = %repo,
                attempt,
                max_retries = self.retry.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "retrying repository source call"
            );

            tokio::time::sleep(delay).await;
            delay = self.retry.next_delay(delay);
        }
    }
}

#[async_trait]
impl<S: ManifestSource> ManifestSource for RetryingSource<S> {
    async fn fetch_manifest(
        &self,
        repo: &RepositoryId,
        at: &VersionConstraint,
    ) -> SourceResult<Vec<DependencyDeclaration>> {
        self.with_retry(repo, || self.inner.fetch_manifest(repo, at)).await
    }
}

#[async_trait]
impl<S: VersionSource> VersionSource for RetryingSource<S> {
    async fn list_available_versions(&self, repo: &RepositoryId) -> SourceResult<Vec<VersionId>> {
        self.with_retry(repo, || self.inner.list_available_versions(repo)).await
    }
}
