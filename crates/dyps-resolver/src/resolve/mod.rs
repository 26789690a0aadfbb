//! Version selection and the refetch fixed point
//!
//! Every node's accumulated constraints are intersected into one effective
//! constraint and a single listed version is chosen for it. Nodes whose
//! manifest was read at a different revision than the one selected are
//! refetched through the builder until the graph is stable.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use dyps_config::{ResolverSettings, VersionPreference};
use dyps_core::error::DypsError;
use dyps_core::{RepositoryId, VersionConstraint, VersionId};
use dyps_source::RepositorySource;

use crate::builder::GraphBuilder;
use crate::graph::DependencyGraph;
use crate::ResolverResult;

/// Version selector for finding the preferred matching version
#[derive(Debug, Clone)]
pub struct VersionSelector {
    /// Available versions in ascending order
    available_versions: BTreeSet<VersionId>,
}

impl VersionSelector {
    /// Create new version selector with available versions
    pub fn new(versions: impl IntoIterator<Item = VersionId>) -> Self {
        Self {
            available_versions: versions.into_iter().collect(),
        }
    }

    /// Select the matching version `preference` favours
    pub fn select_best(&self, constraint: &VersionConstraint, preference: VersionPreference) -> Option<VersionId> {
        self.pick(self.find_matching(constraint), preference)
    }

    /// Same as [`select_best`](Self::select_best) among stable versions only
    pub fn select_best_stable(
        &self,
        constraint: &VersionConstraint,
        preference: VersionPreference,
    ) -> Option<VersionId> {
        let stable = self
            .find_matching(constraint)
            .filter(|version| !version.is_prerelease());
        self.pick(stable, preference)
    }

    /// Select version with preference for stability
    pub fn select_preferred(
        &self,
        constraint: &VersionConstraint,
        preference: VersionPreference,
        allow_prerelease: bool,
    ) -> Option<VersionId> {
        if allow_prerelease {
            self.select_best(constraint, preference)
        } else {
            // Try stable first, fall back to prerelease if no stable version matches
            self.select_best_stable(constraint, preference)
                .or_else(|| self.select_best(constraint, preference))
        }
    }

    /// All versions matching `constraint`, ascending
    pub fn find_matching<'a>(
        &'a self,
        constraint: &'a VersionConstraint,
    ) -> impl DoubleEndedIterator<Item = &'a VersionId> + 'a {
        self.available_versions
            .iter()
            .filter(move |version| constraint.matches(version))
    }

    pub fn available(&self) -> Vec<VersionId> {
        self.available_versions.iter().cloned().collect()
    }

    // Ties in precedence are ordered by the version string, so both ends are deterministic
    fn pick<'a>(
        &self,
        mut candidates: impl DoubleEndedIterator<Item = &'a VersionId>,
        preference: VersionPreference,
    ) -> Option<VersionId> {
        match preference {
            VersionPreference::Highest => candidates.next_back().cloned(),
            VersionPreference::Lowest => candidates.next().cloned(),
        }
    }
}

/// Assigns one version to every node of a graph
pub struct VersionResolver {
    source: Arc<dyn RepositorySource>,
    settings: ResolverSettings,
    cancel: CancellationToken,
    /// Version listings, fetched once per repository
    listings: HashMap<RepositoryId, VersionSelector>,
    refetches: u32,
}

impl VersionResolver {
    pub fn new(source: Arc<dyn RepositorySource>, settings: ResolverSettings, cancel: CancellationToken) -> Self {
        Self {
            source,
            settings,
            cancel,
            listings: HashMap::new(),
            refetches: 0,
        }
    }

    /// Manifest refetches issued so far
    pub fn refetch_count(&self) -> u32 {
        self.refetches
    }

    /// Resolve every node, refetching stale manifests until none is left
    ///
    /// A conflict is final only once every requester involved was read at
    /// its resolved version. Until then the conflicting node is deferred and
    /// its stale requesters are refetched first.
    pub async fn resolve(&mut self, graph: &mut DependencyGraph, builder: &GraphBuilder) -> ResolverResult<()> {
        loop {
            let mut deferred = self.select_all(graph).await?;

            if let Some(index) = deferred.iter().position(|(repo, _)| requesters_settled(graph, repo)) {
                return Err(deferred.swap_remove(index).1);
            }

            let stale = self.stale_nodes(graph)?;
            if stale.is_empty() {
                return match deferred.into_iter().next() {
                    Some((_, conflict)) => Err(conflict),
                    None => Ok(()),
                };
            }

            debug!(
                stale = ?stale.iter().map(|(repo, at)| format!("{}@{}", repo, at)).collect::<Vec<_>>(),
                deferred = ?deferred.iter().map(|(repo, _)| repo.as_str()).collect::<Vec<_>>(),
                "refetching manifests at resolved versions"
            );
            self.refetches += stale.len() as u32;
            builder.refetch(graph, stale).await?;
        }
    }

    /// One selection pass over all nodes in lexical order
    ///
    /// Nodes whose constraints do not intersect are left unresolved and
    /// returned with their conflict.
    pub async fn select_all(&mut self, graph: &mut DependencyGraph) -> ResolverResult<Vec<(RepositoryId, DypsError)>> {
        let mut deferred = Vec::new();

        for repo in graph.repositories() {
            if self.cancel.is_cancelled() {
                return Err(DypsError::Cancelled);
            }

            let effective = match effective_constraint(graph, &repo) {
                Ok(effective) => effective,
                Err(conflict @ DypsError::Conflict { .. }) => {
                    debug!(repo = %repo, "constraints conflict, deferring");
                    if let Some(node) = graph.node_mut(&repo) {
                        node.resolved = None;
                    }
                    deferred.push((repo, conflict));
                    continue;
                },
                Err(other) => return Err(other),
            };
            let resolved = self.select(graph, &repo, &effective).await?;
            debug!(repo = %repo, constraint = %effective, version = %resolved, "selected version");

            if let Some(node) = graph.node_mut(&repo) {
                node.resolved = Some(resolved);
            }
        }
        Ok(deferred)
    }

    async fn select(
        &mut self,
        graph: &DependencyGraph,
        repo: &RepositoryId,
        effective: &VersionConstraint,
    ) -> ResolverResult<VersionId> {
        if graph.is_root(repo) {
            if let Some(pin) = effective.as_pin() {
                return Ok(pin);
            }
        }

        let preference = self.settings.preference;
        let allow_prerelease = self.settings.allow_prerelease;
        let selector = self.listing(repo).await?;

        match selector.select_preferred(effective, preference, allow_prerelease) {
            Some(version) => {
                if version.is_prerelease() && !allow_prerelease {
                    warn!(repo = %repo, version = %version, "no stable version matches, using a prerelease");
                }
                Ok(version)
            },
            None => Err(DypsError::Unresolvable {
                repo: repo.clone(),
                constraint: effective.clone(),
                available: selector.available(),
            }),
        }
    }

    async fn listing(&mut self, repo: &RepositoryId) -> ResolverResult<&VersionSelector> {
        if !self.listings.contains_key(repo) {
            let versions = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(DypsError::Cancelled),
                versions = self.source.list_available_versions(repo) => versions?,
            };
            self.listings.insert(repo.clone(), VersionSelector::new(versions));
        }

        self.listings
            .get(repo)
            .ok_or_else(|| DypsError::assertion(format!("missing version listing for {}", repo)))
    }

    /// Resolved nodes whose manifest was not read at their resolved version
    fn stale_nodes(&self, graph: &DependencyGraph) -> ResolverResult<Vec<(RepositoryId, VersionConstraint)>> {
        let mut stale = Vec::new();

        for repo in graph.repositories() {
            let Some(node) = graph.node(&repo) else {
                continue;
            };
            if node.is_fetched_at_resolved() {
                continue;
            }
            // Deferred nodes are refetched once they resolve
            let Some(resolved) = &node.resolved else {
                continue;
            };

            if node.fetch_count > self.settings.max_refetches {
                return Err(DypsError::DidNotConverge {
                    repo: repo.clone(),
                    fetches: node.fetch_count,
                });
            }
            stale.push((repo.clone(), VersionConstraint::pinned(resolved)));
        }
        Ok(stale)
    }
}

/// Intersection of every constraint on `repo`; the root uses its ref alone
pub fn effective_constraint(graph: &DependencyGraph, repo: &RepositoryId) -> ResolverResult<VersionConstraint> {
    if graph.is_root(repo) {
        return Ok(graph.root_ref().clone());
    }

    let node = graph
        .node(repo)
        .ok_or_else(|| DypsError::assertion(format!("{} is not part of the graph", repo)))?;

    VersionConstraint::intersect_all(node.constraints.values()).ok_or_else(|| DypsError::Conflict {
        repo: repo.clone(),
        constraints: node
            .constraints
            .iter()
            .map(|(requester, constraint)| (requester.clone(), constraint.clone()))
            .collect(),
    })
}

/// Every requester of `repo` was read at the version it resolved to
fn requesters_settled(graph: &DependencyGraph, repo: &RepositoryId) -> bool {
    let Some(node) = graph.node(repo) else {
        return false;
    };
    node.constraints
        .keys()
        .all(|requester| graph.node(requester).map_or(false, |r| r.is_fetched_at_resolved()))
}

#[cfg(test)]
mod tests;
