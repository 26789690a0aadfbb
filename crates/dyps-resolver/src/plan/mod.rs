//! Cycle detection, topological ordering and plan emission
//!
//! `order` walks the graph depth-first from the root with children in lexical
//! order, so the post-order it returns is both a valid topological order and
//! fully determined by the graph. `emit` pairs that order with the resolved
//! versions.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

use dyps_core::error::DypsError;
use dyps_core::utils::fingerprint;
use dyps_core::{RepositoryId, VersionId};

use crate::graph::{same_revision, DependencyGraph, VisitState};
use crate::ResolverResult;

/// What the executor has to do to materialize an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanAction {
    /// Not present locally
    Clone,
    /// Present at another version
    Checkout,
    /// Already at the resolved version
    Keep,
}

impl fmt::Display for PlanAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlanAction::Clone => "clone",
            PlanAction::Checkout => "checkout",
            PlanAction::Keep => "keep",
        };
        f.write_str(name)
    }
}

/// One repository of a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub repo: RepositoryId,
    pub version: VersionId,
    pub action: PlanAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl fmt::Display for PlanEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} ({})", self.repo, self.version, self.action)
    }
}

/// Ordered list of repositories to materialize, dependencies first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionPlan {
    pub entries: Vec<PlanEntry>,
}

impl ResolutionPlan {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlanEntry> {
        self.entries.iter()
    }

    /// Entry for `repo`, if it is part of the plan
    pub fn get(&self, repo: &RepositoryId) -> Option<&PlanEntry> {
        self.entries.iter().find(|entry| entry.repo == *repo)
    }

    /// Position of `repo` in the plan
    pub fn position(&self, repo: &RepositoryId) -> Option<usize> {
        self.entries.iter().position(|entry| entry.repo == *repo)
    }

    /// Blake3 digest over every repository and version, in order
    ///
    /// Actions and source locations are not part of the digest.
    pub fn fingerprint(&self) -> String {
        fingerprint(
            self.entries
                .iter()
                .flat_map(|entry| [entry.repo.to_string(), entry.version.to_string()]),
        )
    }
}

impl<'a> IntoIterator for &'a ResolutionPlan {
    type Item = &'a PlanEntry;
    type IntoIter = std::slice::Iter<'a, PlanEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Versions currently materialized by the caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledState {
    versions: HashMap<RepositoryId, VersionId>,
}

impl InstalledState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, repo: RepositoryId, version: VersionId) -> Option<VersionId> {
        self.versions.insert(repo, version)
    }

    pub fn get(&self, repo: &RepositoryId) -> Option<&VersionId> {
        self.versions.get(repo)
    }

    fn action_for(&self, repo: &RepositoryId, version: &VersionId) -> PlanAction {
        match self.versions.get(repo) {
            None => PlanAction::Clone,
            Some(installed) if same_revision(installed, version) => PlanAction::Keep,
            Some(_) => PlanAction::Checkout,
        }
    }
}

impl FromIterator<(RepositoryId, VersionId)> for InstalledState {
    fn from_iter<I: IntoIterator<Item = (RepositoryId, VersionId)>>(iter: I) -> Self {
        Self {
            versions: iter.into_iter().collect(),
        }
    }
}

struct Frame {
    repo: RepositoryId,
    children: Vec<RepositoryId>,
    next: usize,
}

/// Topological order of the repositories reachable from the root
///
/// Fails with a cycle error naming the closed path, e.g. `[a, b, c, a]`.
pub fn order(graph: &mut DependencyGraph) -> ResolverResult<Vec<RepositoryId>> {
    graph.reset_visits();

    let root = graph.root().clone();
    let mut ordered = Vec::with_capacity(graph.node_count());
    let mut stack = vec![enter(graph, root)];

    while let Some(frame) = stack.last_mut() {
        let Some(child) = frame.children.get(frame.next).cloned() else {
            if let Some(done) = stack.pop() {
                set_visit(graph, &done.repo, VisitState::Done);
                ordered.push(done.repo);
            }
            continue;
        };
        frame.next += 1;

        match graph.node(&child).map(|node| node.visit) {
            Some(VisitState::Unvisited) => {
                let frame = enter(graph, child);
                stack.push(frame);
            },
            Some(VisitState::InProgress) => {
                let start = stack.iter().position(|frame| frame.repo == child).unwrap_or(0);
                let mut path: Vec<RepositoryId> = stack[start..].iter().map(|frame| frame.repo.clone()).collect();
                path.push(child);
                return Err(DypsError::Cycle { path });
            },
            Some(VisitState::Done) => {},
            None => {
                return Err(DypsError::assertion(format!("edge to {} has no node", child)));
            },
        }
    }

    Ok(ordered)
}

fn enter(graph: &mut DependencyGraph, repo: RepositoryId) -> Frame {
    set_visit(graph, &repo, VisitState::InProgress);
    let children = graph
        .dependencies(&repo)
        .into_iter()
        .map(|(child, _)| child)
        .collect();
    Frame {
        repo,
        children,
        next: 0,
    }
}

fn set_visit(graph: &mut DependencyGraph, repo: &RepositoryId, state: VisitState) {
    if let Some(node) = graph.node_mut(repo) {
        node.visit = state;
    }
}

/// Pair each ordered repository with its resolved version
pub fn emit(ordered: &[RepositoryId], graph: &DependencyGraph) -> ResolverResult<ResolutionPlan> {
    emit_with_installed(ordered, graph, &InstalledState::default())
}

/// Same as [`emit`], choosing actions against what is already installed
pub fn emit_with_installed(
    ordered: &[RepositoryId],
    graph: &DependencyGraph,
    installed: &InstalledState,
) -> ResolverResult<ResolutionPlan> {
    let mut seen = HashSet::with_capacity(ordered.len());
    let mut versions: HashMap<&RepositoryId, &VersionId> = HashMap::with_capacity(ordered.len());
    let mut entries = Vec::with_capacity(ordered.len());

    for repo in ordered {
        if !seen.insert(repo) {
            return Err(DypsError::assertion(format!("{} appears twice in the plan", repo)));
        }

        let node = graph
            .node(repo)
            .ok_or_else(|| DypsError::assertion(format!("{} is not part of the graph", repo)))?;
        let version = node
            .resolved
            .as_ref()
            .ok_or_else(|| DypsError::assertion(format!("{} has no resolved version", repo)))?;

        let action = if graph.is_root(repo) {
            PlanAction::Keep
        } else {
            installed.action_for(repo, version)
        };

        versions.insert(repo, version);
        entries.push(PlanEntry {
            repo: repo.clone(),
            version: version.clone(),
            action,
            source: node.source_location.clone(),
        });
    }

    for (from, to, edge) in graph.edges() {
        if !versions.contains_key(from) {
            continue;
        }
        match versions.get(to) {
            Some(version) if edge.constraint.matches(version) => {},
            Some(version) => {
                return Err(DypsError::assertion(format!(
                    "{} requires {} {} but the plan has {}",
                    from, to, edge.constraint, version
                )));
            },
            None => {
                return Err(DypsError::assertion(format!("{} depends on {} which is not planned", from, to)));
            },
        }
    }

    Ok(ResolutionPlan { entries })
}

/// Order and emit in one step
pub fn plan(graph: &mut DependencyGraph) -> ResolverResult<ResolutionPlan> {
    let ordered = order(graph)?;
    emit(&ordered, graph)
}
