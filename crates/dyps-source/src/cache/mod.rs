//! Manifest memoization for exact-version requests
//!
//! A manifest fetched at an exact release never changes, so it is safe to
//! share across fetch tasks and runs. Requests at ranges or named references
//! always reach the inner source.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

use dyps_core::{DependencyDeclaration, RepositoryId, Version, VersionConstraint, VersionId};

use crate::api::{ManifestSource, VersionSource};
use crate::SourceResult;

/// Source that memoizes manifests fetched at an exact release
#[derive(Debug)]
pub struct MemoizedSource<S> {
    inner: S,
    /// Manifests keyed by repository and release, trailing zeros stripped
    manifests: DashMap<(RepositoryId, String), Vec<DependencyDeclaration>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Memo statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of memoized manifests
    pub total_entries: usize,
    /// Requests answered from the memo
    pub hits: u64,
    /// Exact-version requests that reached the inner source
    pub misses: u64,
}

impl CacheStats {
    /// Fraction of memoizable requests answered from the memo
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl<S> MemoizedSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            manifests: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Check if a manifest is memoized
    pub fn contains(&self, repo: &RepositoryId, version: &Version) -> bool {
        self.manifests.contains_key(&memo_key(repo, version))
    }

    /// Get memo statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            total_entries: self.manifests.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Clear all memoized manifests and counters
    pub fn clear(&self) {
        self.manifests.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

/// `1.5` and `1.5.0` name the same release
fn memo_key(repo: &RepositoryId, version: &Version) -> (RepositoryId, String) {
    let mut release = version.release.clone();
    while release.len() > 1 && release.last() == Some(&0) {
        release.pop();
    }
    let normalized = Version {
        release,
        prerelease: version.prerelease.clone(),
        build: None,
    };
    (repo.clone(), normalized.to_string())
}

#[async_trait]
impl<S: ManifestSource> ManifestSource for MemoizedSource<S> {
    async fn fetch_manifest(
        &self,
        repo: &RepositoryId,
        at: &VersionConstraint,
    ) -> SourceResult<Vec<DependencyDeclaration>> {
        let VersionConstraint::Exact(version) = at else {
            return self.inner.fetch_manifest(repo, at).await;
        };

        let key = memo_key(repo, version);
        if let Some(manifest) = self.manifests.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(repo = %repo, version = %version, "memoized manifest hit");
            return Ok(manifest.clone());
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let manifest = self.inner.fetch_manifest(repo, at).await?;
        self.manifests.insert(key, manifest.clone());
        Ok(manifest)
    }
}

#[async_trait]
impl<S: VersionSource> VersionSource for MemoizedSource<S> {
    async fn list_available_versions(&self, repo: &RepositoryId) -> SourceResult<Vec<VersionId>> {
        self.inner.list_available_versions(repo).await
    }
}
