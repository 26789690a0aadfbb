//! Collaborator interfaces the resolver consumes
//!
//! Both traits are object safe, so a run can hold an `Arc<dyn RepositorySource>`
//! and hand clones of it to concurrent fetch tasks.

use async_trait::async_trait;
use std::sync::Arc;

use dyps_core::{DependencyDeclaration, RepositoryId, VersionConstraint, VersionId};

use crate::SourceResult;

/// Reads a repository's manifest
#[async_trait]
pub trait ManifestSource: Send + Sync {
    /// Direct dependencies of `repo` at the revision `at` selects
    ///
    /// Must be idempotent for an exact version. Every returned declaration has
    /// `from == repo`.
    async fn fetch_manifest(
        &self,
        repo: &RepositoryId,
        at: &VersionConstraint,
    ) -> SourceResult<Vec<DependencyDeclaration>>;
}

/// Lists the revisions a repository offers
#[async_trait]
pub trait VersionSource: Send + Sync {
    /// Every tag and named reference of `repo`, in no particular order
    async fn list_available_versions(&self, repo: &RepositoryId) -> SourceResult<Vec<VersionId>>;
}

/// Both collaborator interfaces in one object
pub trait RepositorySource: ManifestSource + VersionSource {}

impl<T: ManifestSource + VersionSource + ?Sized> RepositorySource for T {}

#[async_trait]
impl<T: ManifestSource + ?Sized> ManifestSource for Arc<T> {
    async fn fetch_manifest(
        &self,
        repo: &RepositoryId,
        at: &VersionConstraint,
    ) -> SourceResult<Vec<DependencyDeclaration>> {
        (**self).fetch_manifest(repo, at).await
    }
}

#[async_trait]
impl<T: VersionSource + ?Sized> VersionSource for Arc<T> {
    async fn list_available_versions(&self, repo: &RepositoryId) -> SourceResult<Vec<VersionId>> {
        (**self).list_available_versions(repo).await
    }
}
