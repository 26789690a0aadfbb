//! In-memory repository source
//!
//! Holds manifests per repository and revision. Used by tests and benchmarks,
//! and by hosts that already decoded every manifest up front.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::trace;

use dyps_core::error::DypsError;
use dyps_core::{DependencyDeclaration, RepositoryId, VersionConstraint, VersionId};

use crate::api::{ManifestSource, VersionSource};
use crate::SourceResult;

/// Injected fetch failure
#[derive(Debug, Clone)]
struct Failure {
    /// Failures left before fetches succeed again, `None` for every fetch
    remaining: Option<u32>,
    message: String,
}

/// Repository source backed by maps
#[derive(Debug, Default)]
pub struct InMemorySource {
    /// Manifests by repository and revision
    repositories: DashMap<RepositoryId, BTreeMap<VersionId, Vec<DependencyDeclaration>>>,
    /// Manifest fetches served (or failed) per repository
    fetch_counts: DashMap<RepositoryId, u32>,
    /// Version listings served per repository
    list_counts: DashMap<RepositoryId, u32>,
    failures: DashMap<RepositoryId, Failure>,
    latencies: DashMap<RepositoryId, Duration>,
    default_latency: Duration,
    /// Every manifest request, in arrival order
    requests: Mutex<Vec<(RepositoryId, VersionConstraint)>>,
}

impl InMemorySource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every response by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.default_latency = latency;
        self
    }

    /// Register a revision of `repo` and its manifest
    pub fn add_version(
        &self,
        repo: &RepositoryId,
        version: VersionId,
        declarations: Vec<DependencyDeclaration>,
    ) {
        self.repositories
            .entry(repo.clone())
            .or_default()
            .insert(version, declarations);
    }

    /// Register a revision from strings: `declare("r", "root", &[("a", ">=1.0")])`
    ///
    /// Versions that do not parse as releases become named references.
    pub fn declare(&self, repo: &str, version: &str, dependencies: &[(&str, &str)]) -> SourceResult<()> {
        let from = RepositoryId::new(repo)?;
        let declarations = dependencies
            .iter()
            .map(|(to, constraint)| {
                Ok(DependencyDeclaration::new(
                    from.clone(),
                    RepositoryId::new(to)?,
                    VersionConstraint::parse(constraint)?,
                ))
            })
            .collect::<SourceResult<Vec<_>>>()?;

        self.add_version(&from, VersionId::parse(version), declarations);
        Ok(())
    }

    /// Fail the next `times` fetches of `repo`
    pub fn fail_next(&self, repo: &RepositoryId, times: u32, message: impl Into<String>) {
        self.failures.insert(
            repo.clone(),
            Failure {
                remaining: Some(times),
                message: message.into(),
            },
        );
    }

    /// Fail every fetch of `repo`
    pub fn fail_always(&self, repo: &RepositoryId, message: impl Into<String>) {
        self.failures.insert(
            repo.clone(),
            Failure {
                remaining: None,
                message: message.into(),
            },
        );
    }

    /// Delay responses about `repo`
    pub fn set_latency(&self, repo: &RepositoryId, latency: Duration) {
        self.latencies.insert(repo.clone(), latency);
    }

    /// Manifest fetches of `repo` so far
    pub fn fetch_count(&self, repo: &RepositoryId) -> u32 {
        self.fetch_counts.get(repo).map(|count| *count).unwrap_or(0)
    }

    /// Version listings of `repo` so far
    pub fn list_count(&self, repo: &RepositoryId) -> u32 {
        self.list_counts.get(repo).map(|count| *count).unwrap_or(0)
    }

    /// Manifest fetches across all repositories
    pub fn total_fetches(&self) -> u32 {
        self.fetch_counts.iter().map(|entry| *entry.value()).sum()
    }

    /// Every manifest request so far, in arrival order
    pub fn requests(&self) -> Vec<(RepositoryId, VersionConstraint)> {
        self.requests.lock().clone()
    }

    /// Forget counters and recorded requests, keep manifests
    pub fn reset_counters(&self) {
        self.fetch_counts.clear();
        self.list_counts.clear();
        self.requests.lock().clear();
    }

    async fn delay(&self, repo: &RepositoryId) {
        let latency = self
            .latencies
            .get(repo)
            .map(|latency| *latency)
            .unwrap_or(self.default_latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    /// Consume one injected failure for `repo`, if any is pending
    fn take_failure(&self, repo: &RepositoryId) -> Option<String> {
        let mut entry = self.failures.get_mut(repo)?;
        let failure = entry.value_mut();
        match failure.remaining {
            None => Some(failure.message.clone()),
            Some(0) => None,
            Some(remaining) => {
                failure.remaining = Some(remaining - 1);
                Some(failure.message.clone())
            },
        }
    }

    /// Revision of `repo` a constraint selects: the pin itself, or the highest
    /// match with stable releases preferred
    fn select<'a>(
        versions: &'a BTreeMap<VersionId, Vec<DependencyDeclaration>>,
        at: &VersionConstraint,
    ) -> Option<(&'a VersionId, &'a Vec<DependencyDeclaration>)> {
        let mut matching = versions.iter().filter(|(id, _)| at.matches(id));
        let highest_stable = matching.clone().filter(|(id, _)| !id.is_prerelease()).last();
        highest_stable.or_else(|| matching.next_back())
    }
}

#[async_trait]
impl ManifestSource for InMemorySource {
    async fn fetch_manifest(
        &self,
        repo: &RepositoryId,
        at: &VersionConstraint,
    ) -> SourceResult<Vec<DependencyDeclaration>> {
        *self.fetch_counts.entry(repo.clone()).or_insert(0) += 1;
        self.requests.lock().push((repo.clone(), at.clone()));
        trace!(repo = %repo, at = %at, "in-memory manifest fetch");

        self.delay(repo).await;

        if let Some(message) = self.take_failure(repo) {
            return Err(DypsError::fetch_message(repo.clone(), message));
        }

        let versions = self
            .repositories
            .get(repo)
            .ok_or_else(|| DypsError::fetch_message(repo.clone(), "repository not found"))?;

        let (_, declarations) = Self::select(&versions, at).ok_or_else(|| {
            DypsError::fetch_message(repo.clone(), format!("no revision matching {}", at))
        })?;

        Ok(declarations.clone())
    }
}

#[async_trait]
impl VersionSource for InMemorySource {
    async fn list_available_versions(&self, repo: &RepositoryId) -> SourceResult<Vec<VersionId>> {
        *self.list_counts.entry(repo.clone()).or_insert(0) += 1;

        self.delay(repo).await;

        let versions = self
            .repositories
            .get(repo)
            .ok_or_else(|| DypsError::fetch_message(repo.clone(), "repository not found"))?;

        Ok(versions.keys().cloned().collect())
    }
}
