//! One end-to-end resolution run
//!
//! build -> resolve -> order -> emit. Cycles are only looked for once every
//! manifest was read at its resolved version, since an edge seen at a
//! speculative version may not exist at the selected one. Either a complete
//! plan comes out or an error does, never a partial plan.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, Instrument};

use dyps_config::DypsSettings;
use dyps_core::{RepositoryId, VersionConstraint};
use dyps_source::{RepositorySource, RetryingSource};

use crate::builder::GraphBuilder;
use crate::graph::DependencyGraph;
use crate::plan::{emit_with_installed, order, InstalledState, ResolutionPlan};
use crate::resolve::VersionResolver;
use crate::ResolverResult;

/// Counters of a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionStats {
    /// Repositories in the final graph
    pub nodes: usize,
    pub edges: usize,
    /// Manifest fetches, refetches included
    pub fetches: u32,
    pub refetches: u32,
    /// Resolution time in milliseconds
    pub elapsed_ms: u64,
}

/// Result of dependency resolution
#[derive(Debug, Clone)]
pub struct ResolutionResult {
    pub plan: ResolutionPlan,
    pub stats: ResolutionStats,
}

/// Resolves the dependencies of a root repository into a plan
pub struct ResolutionRun {
    source: Arc<dyn RepositorySource>,
    settings: DypsSettings,
    installed: InstalledState,
    cancel: CancellationToken,
}

impl ResolutionRun {
    /// Create a run reading from `source`
    ///
    /// Every source call is bounded by the fetch timeout and retried per the
    /// retry settings.
    pub fn new(source: Arc<dyn RepositorySource>, settings: DypsSettings) -> Self {
        let source: Arc<dyn RepositorySource> = Arc::new(RetryingSource::from_settings(source, &settings));
        Self {
            source,
            settings,
            installed: InstalledState::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Choose plan actions against what is already materialized
    pub fn with_installed(mut self, installed: InstalledState) -> Self {
        self.installed = installed;
        self
    }

    /// Token that cancels this run when triggered
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn settings(&self) -> &DypsSettings {
        &self.settings
    }

    /// Resolve `root`, reading its manifest at `root_ref`
    pub async fn resolve(&self, root: &RepositoryId, root_ref: &VersionConstraint) -> ResolverResult<ResolutionResult> {
        let start_time = Instant::now();
        info!(root = %root, at = %root_ref, "starting resolution");

        let builder = GraphBuilder::new(Arc::clone(&self.source), self.settings.fetch.clone(), self.cancel.clone());
        let mut resolver = VersionResolver::new(
            Arc::clone(&self.source),
            self.settings.resolver.clone(),
            self.cancel.clone(),
        );

        let mut graph = builder
            .build(root, root_ref)
            .instrument(info_span!("build", root = %root))
            .await?;

        resolver
            .resolve(&mut graph, &builder)
            .instrument(info_span!("resolve", root = %root))
            .await?;

        let plan = info_span!("plan").in_scope(|| self.plan(&mut graph))?;

        let stats = ResolutionStats {
            nodes: graph.node_count(),
            edges: graph.edge_count(),
            fetches: builder.fetch_count(),
            refetches: resolver.refetch_count(),
            elapsed_ms: start_time.elapsed().as_millis() as u64,
        };
        info!(
            root = %root,
            repositories = plan.len(),
            fetches = stats.fetches,
            refetches = stats.refetches,
            elapsed_ms = stats.elapsed_ms,
            "resolution finished"
        );

        Ok(ResolutionResult { plan, stats })
    }

    fn plan(&self, graph: &mut DependencyGraph) -> ResolverResult<ResolutionPlan> {
        let ordered = order(graph)?;
        emit_with_installed(&ordered, graph, &self.installed)
    }
}
