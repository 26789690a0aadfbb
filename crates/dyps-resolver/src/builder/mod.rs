//! Breadth-first graph construction
//!
//! Each frontier of newly discovered repositories is fetched concurrently as
//! tokio tasks bounded by a semaphore. Results come back over a channel and
//! are merged into the graph by the coordinator alone, in frontier order.

use indexmap::map::Entry;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use dyps_config::FetchSettings;
use dyps_core::error::DypsError;
use dyps_core::{DependencyDeclaration, RepositoryId, VersionConstraint};
use dyps_source::RepositorySource;

use crate::graph::{DependencyEdge, DependencyGraph};
use crate::ResolverResult;

/// Result of one manifest fetch task
struct FetchOutcome {
    index: usize,
    result: ResolverResult<Vec<DependencyDeclaration>>,
}

/// Builds and extends the dependency graph of one run
pub struct GraphBuilder {
    source: Arc<dyn RepositorySource>,
    settings: FetchSettings,
    cancel: CancellationToken,
    /// Manifest fetches issued so far
    fetches: AtomicU32,
}

impl GraphBuilder {
    pub fn new(source: Arc<dyn RepositorySource>, settings: FetchSettings, cancel: CancellationToken) -> Self {
        Self {
            source,
            settings,
            cancel,
            fetches: AtomicU32::new(0),
        }
    }

    /// Manifest fetches issued by this builder
    pub fn fetch_count(&self) -> u32 {
        self.fetches.load(Ordering::Relaxed)
    }

    /// Build the graph reachable from `root`, reading its manifest at `root_ref`
    pub async fn build(&self, root: &RepositoryId, root_ref: &VersionConstraint) -> ResolverResult<DependencyGraph> {
        let mut graph = DependencyGraph::new(root.clone(), root_ref.clone());
        let mut scheduled = HashSet::from([root.clone()]);

        self.expand(&mut graph, vec![root.clone()], &mut scheduled).await?;

        debug!(
            root = %root,
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "graph built"
        );
        Ok(graph)
    }

    /// Re-read the manifests of `stale` repositories at their resolved versions
    ///
    /// Outgoing edges of every refetched node are replaced, new targets are
    /// built transitively and nodes no longer reachable are pruned.
    pub async fn refetch(
        &self,
        graph: &mut DependencyGraph,
        stale: Vec<(RepositoryId, VersionConstraint)>,
    ) -> ResolverResult<Vec<RepositoryId>> {
        let mut scheduled: HashSet<RepositoryId> = graph.nodes().map(|node| node.id.clone()).collect();

        let manifests = self.fetch_frontier(&stale).await?;
        let mut frontier = Vec::new();
        for ((repo, at), declarations) in stale.into_iter().zip(manifests) {
            frontier.extend(self.merge_manifest(graph, &repo, at, declarations, &mut scheduled)?);
        }

        self.expand(graph, frontier, &mut scheduled).await?;

        let pruned = graph.prune_unreachable();
        if !pruned.is_empty() {
            debug!(pruned = ?pruned.iter().map(|r| r.as_str()).collect::<Vec<_>>(), "pruned unreachable repositories");
        }
        Ok(pruned)
    }

    /// Fetch frontiers until no unfetched repository is left
    async fn expand(
        &self,
        graph: &mut DependencyGraph,
        mut frontier: Vec<RepositoryId>,
        scheduled: &mut HashSet<RepositoryId>,
    ) -> ResolverResult<()> {
        let mut depth = 0usize;

        while !frontier.is_empty() {
            if self.cancel.is_cancelled() {
                return Err(DypsError::Cancelled);
            }

            let requests: Vec<(RepositoryId, VersionConstraint)> = frontier
                .iter()
                .map(|repo| (repo.clone(), graph.speculative_ref(repo)))
                .collect();
            debug!(depth, size = requests.len(), "fetching frontier");

            let manifests = self.fetch_frontier(&requests).await?;

            let mut next = Vec::new();
            for ((repo, at), declarations) in requests.into_iter().zip(manifests) {
                next.extend(self.merge_manifest(graph, &repo, at, declarations, scheduled)?);
            }

            frontier = next;
            depth += 1;
        }
        Ok(())
    }

    /// Fetch every manifest of one frontier concurrently
    ///
    /// Results are returned in request order. The first failure in that
    /// order wins, so errors are deterministic regardless of timing.
    async fn fetch_frontier(
        &self,
        requests: &[(RepositoryId, VersionConstraint)],
    ) -> ResolverResult<Vec<Vec<DependencyDeclaration>>> {
        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrent_fetches.max(1)));
        let (tx, mut rx) = mpsc::channel(requests.len().max(1));
        let mut tasks = JoinSet::new();

        for (index, (repo, at)) in requests.iter().cloned().enumerate() {
            let source = Arc::clone(&self.source);
            let semaphore = Arc::clone(&semaphore);
            let tx = tx.clone();
            self.fetches.fetch_add(1, Ordering::Relaxed);

            tasks.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => {
                        trace!(repo = %repo, at = %at, "fetching manifest");
                        source.fetch_manifest(&repo, &at).await
                    },
                    Err(_) => Err(DypsError::Cancelled),
                };
                // The receiver is gone only when the run was cancelled
                let _ = tx.send(FetchOutcome { index, result }).await;
            });
        }
        drop(tx);

        let mut results: Vec<Option<ResolverResult<Vec<DependencyDeclaration>>>> =
            requests.iter().map(|_| None).collect();
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tasks.abort_all();
                    return Err(DypsError::Cancelled);
                }
                outcome = rx.recv() => match outcome {
                    Some(FetchOutcome { index, result }) => results[index] = Some(result),
                    None => break,
                },
            }
        }

        requests
            .iter()
            .zip(results)
            .map(|((repo, _), result)| {
                result.unwrap_or_else(|| {
                    Err(DypsError::assertion(format!("fetch task for {} ended without a result", repo)))
                })
            })
            .collect()
    }

    /// Apply one fetched manifest to the graph
    ///
    /// Returns the targets that were never scheduled before.
    fn merge_manifest(
        &self,
        graph: &mut DependencyGraph,
        repo: &RepositoryId,
        at: VersionConstraint,
        declarations: Vec<DependencyDeclaration>,
        scheduled: &mut HashSet<RepositoryId>,
    ) -> ResolverResult<Vec<RepositoryId>> {
        let mut merged: IndexMap<RepositoryId, DependencyEdge> = IndexMap::new();

        for declaration in declarations {
            if declaration.from != *repo {
                return Err(DypsError::fetch_message(
                    repo.clone(),
                    format!("manifest declares a dependency of {}", declaration.from),
                ));
            }

            match merged.entry(declaration.to.clone()) {
                Entry::Vacant(entry) => {
                    entry.insert(DependencyEdge {
                        constraint: declaration.constraint,
                        source_location: declaration.source_location,
                    });
                },
                Entry::Occupied(mut entry) => {
                    let edge = entry.get_mut();
                    let combined = edge.constraint.intersect(&declaration.constraint).ok_or_else(|| {
                        DypsError::Conflict {
                            repo: declaration.to.clone(),
                            constraints: vec![
                                (repo.clone(), edge.constraint.clone()),
                                (repo.clone(), declaration.constraint.clone()),
                            ],
                        }
                    })?;
                    edge.constraint = combined;
                    if edge.source_location.is_none() {
                        edge.source_location = declaration.source_location;
                    }
                },
            }
        }

        graph.remove_dependencies(repo);
        if let Some(node) = graph.node_mut(repo) {
            node.manifest_ref = Some(at);
            node.fetch_count += 1;
        }

        let mut discovered = Vec::new();
        for (to, edge) in merged {
            graph.add_dependency(repo, &to, edge);
            if scheduled.insert(to.clone()) {
                discovered.push(to);
            }
        }
        Ok(discovered)
    }
}
