//! Dependency graph implementation using petgraph
//!
//! The graph is owned by a single resolution run. Nodes are created lazily the
//! first time a repository is declared, and removing nodes never invalidates
//! the indices of the others (`StableDiGraph`).

use indexmap::IndexMap;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences, NodeIndexable};
use petgraph::Direction;
use std::collections::VecDeque;

use dyps_core::{RepositoryId, VersionConstraint, VersionId};

/// Visitation marker used by the planner's depth-first traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VisitState {
    #[default]
    Unvisited,
    InProgress,
    Done,
}

/// One repository in the graph
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub id: RepositoryId,
    /// Incoming constraints by requester, in declaration order
    pub constraints: IndexMap<RepositoryId, VersionConstraint>,
    /// Selected version, unset until the resolver runs
    pub resolved: Option<VersionId>,
    pub visit: VisitState,
    /// Ref the manifest was last fetched at
    pub manifest_ref: Option<VersionConstraint>,
    /// Manifest fetches of this repository in the current run
    pub fetch_count: u32,
    /// Source location of the first declaration naming this repository
    pub source_location: Option<String>,
}

impl GraphNode {
    fn new(id: RepositoryId) -> Self {
        Self {
            id,
            constraints: IndexMap::new(),
            resolved: None,
            visit: VisitState::Unvisited,
            manifest_ref: None,
            fetch_count: 0,
            source_location: None,
        }
    }

    /// Whether the manifest was fetched at exactly the resolved version
    pub fn is_fetched_at_resolved(&self) -> bool {
        match (&self.manifest_ref, &self.resolved) {
            (Some(at), Some(resolved)) => at.as_pin().map_or(false, |pin| same_revision(&pin, resolved)),
            _ => false,
        }
    }
}

/// Declared dependency of one repository on another
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEdge {
    pub constraint: VersionConstraint,
    pub source_location: Option<String>,
}

impl DependencyEdge {
    pub fn new(constraint: VersionConstraint) -> Self {
        Self {
            constraint,
            source_location: None,
        }
    }
}

/// Dependency graph of a single resolution run
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// Underlying directed graph
    graph: StableDiGraph<GraphNode, DependencyEdge>,
    /// Map from RepositoryId to NodeIndex for fast lookups
    node_map: IndexMap<RepositoryId, NodeIndex>,
    root: RepositoryId,
    /// Ref the root manifest is read at
    root_ref: VersionConstraint,
}

impl DependencyGraph {
    /// Create a graph holding only the root node
    pub fn new(root: RepositoryId, root_ref: VersionConstraint) -> Self {
        let mut graph = Self {
            graph: StableDiGraph::new(),
            node_map: IndexMap::new(),
            root: root.clone(),
            root_ref,
        };
        graph.ensure_node(&root);
        graph
    }

    pub fn root(&self) -> &RepositoryId {
        &self.root
    }

    pub fn root_ref(&self) -> &VersionConstraint {
        &self.root_ref
    }

    pub fn is_root(&self, repo: &RepositoryId) -> bool {
        self.root == *repo
    }

    /// Index of `repo`, creating an empty node on first use
    pub fn ensure_node(&mut self, repo: &RepositoryId) -> NodeIndex {
        if let Some(index) = self.node_map.get(repo) {
            return *index;
        }

        let index = self.graph.add_node(GraphNode::new(repo.clone()));
        self.node_map.insert(repo.clone(), index);
        index
    }

    pub fn contains(&self, repo: &RepositoryId) -> bool {
        self.node_map.contains_key(repo)
    }

    pub fn node(&self, repo: &RepositoryId) -> Option<&GraphNode> {
        let index = self.node_map.get(repo)?;
        self.graph.node_weight(*index)
    }

    pub fn node_mut(&mut self, repo: &RepositoryId) -> Option<&mut GraphNode> {
        let index = self.node_map.get(repo)?;
        self.graph.node_weight_mut(*index)
    }

    /// All nodes, in creation order
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.node_map
            .values()
            .filter_map(move |index| self.graph.node_weight(*index))
    }

    /// Repository ids in lexical order
    pub fn repositories(&self) -> Vec<RepositoryId> {
        let mut repositories: Vec<RepositoryId> = self.node_map.keys().cloned().collect();
        repositories.sort();
        repositories
    }

    /// Declare that `from` depends on `to`
    ///
    /// Creates the target node when needed, replaces an earlier edge between
    /// the same pair and records the requester's constraint on the target.
    pub fn add_dependency(&mut self, from: &RepositoryId, to: &RepositoryId, edge: DependencyEdge) {
        let from_index = self.ensure_node(from);
        let to_index = self.ensure_node(to);

        if let Some(target) = self.graph.node_weight_mut(to_index) {
            target.constraints.insert(from.clone(), edge.constraint.clone());
            if target.source_location.is_none() {
                target.source_location = edge.source_location.clone();
            }
        }

        match self.graph.find_edge(from_index, to_index) {
            Some(existing) => {
                if let Some(weight) = self.graph.edge_weight_mut(existing) {
                    *weight = edge;
                }
            },
            None => {
                self.graph.add_edge(from_index, to_index, edge);
            },
        }
    }

    /// Remove every outgoing edge of `from` and withdraw the constraints it
    /// contributed to its targets. Returns the former targets.
    pub fn remove_dependencies(&mut self, from: &RepositoryId) -> Vec<RepositoryId> {
        let Some(&from_index) = self.node_map.get(from) else {
            return Vec::new();
        };

        let outgoing: Vec<_> = self
            .graph
            .edges_directed(from_index, Direction::Outgoing)
            .map(|edge| (edge.id(), edge.target()))
            .collect();

        let mut targets = Vec::with_capacity(outgoing.len());
        for (edge, target) in outgoing {
            self.graph.remove_edge(edge);
            if let Some(node) = self.graph.node_weight_mut(target) {
                node.constraints.shift_remove(from);
                targets.push(node.id.clone());
            }
        }
        targets
    }

    /// Direct dependencies of `repo` in lexical order
    pub fn dependencies(&self, repo: &RepositoryId) -> Vec<(RepositoryId, DependencyEdge)> {
        let Some(&index) = self.node_map.get(repo) else {
            return Vec::new();
        };

        let mut dependencies: Vec<(RepositoryId, DependencyEdge)> = self
            .graph
            .edges_directed(index, Direction::Outgoing)
            .filter_map(|edge| {
                let target = self.graph.node_weight(edge.target())?;
                Some((target.id.clone(), edge.weight().clone()))
            })
            .collect();
        dependencies.sort_by(|a, b| a.0.cmp(&b.0));
        dependencies
    }

    /// Every edge as `(from, to, edge)`
    pub fn edges(&self) -> impl Iterator<Item = (&RepositoryId, &RepositoryId, &DependencyEdge)> {
        self.graph.edge_references().filter_map(move |edge| {
            let from = self.graph.node_weight(edge.source())?;
            let to = self.graph.node_weight(edge.target())?;
            Some((&from.id, &to.id, edge.weight()))
        })
    }

    /// Remove nodes no longer reachable from the root, returning their ids
    ///
    /// Constraints the removed nodes contributed to surviving nodes are withdrawn.
    pub fn prune_unreachable(&mut self) -> Vec<RepositoryId> {
        let Some(&root_index) = self.node_map.get(&self.root) else {
            return Vec::new();
        };

        let mut reachable = vec![false; self.graph.node_bound()];
        let mut queue = VecDeque::from([root_index]);
        reachable[root_index.index()] = true;
        while let Some(index) = queue.pop_front() {
            for next in self.graph.neighbors_directed(index, Direction::Outgoing) {
                if !reachable[next.index()] {
                    reachable[next.index()] = true;
                    queue.push_back(next);
                }
            }
        }

        let unreachable: Vec<RepositoryId> = self
            .node_map
            .iter()
            .filter(|(_, index)| !reachable[index.index()])
            .map(|(repo, _)| repo.clone())
            .collect();

        for repo in &unreachable {
            self.remove_dependencies(repo);
            if let Some(index) = self.node_map.shift_remove(repo) {
                self.graph.remove_node(index);
            }
        }
        unreachable
    }

    /// Ref to read the manifest of `repo` at before its version is known
    ///
    /// The root uses the root ref. Other nodes use the intersection of their
    /// constraints, or the first declared constraint once that is empty.
    pub fn speculative_ref(&self, repo: &RepositoryId) -> VersionConstraint {
        if self.is_root(repo) {
            return self.root_ref.clone();
        }

        let Some(node) = self.node(repo) else {
            return VersionConstraint::Any;
        };
        VersionConstraint::intersect_all(node.constraints.values()).unwrap_or_else(|| {
            node.constraints
                .values()
                .next()
                .cloned()
                .unwrap_or_default()
        })
    }

    /// Reset every node to `Unvisited`
    pub fn reset_visits(&mut self) {
        let indices: Vec<NodeIndex> = self.node_map.values().copied().collect();
        for index in indices {
            if let Some(node) = self.graph.node_weight_mut(index) {
                node.visit = VisitState::Unvisited;
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

/// Two revisions name the same commit: equal precedence for releases, equal
/// names for references
pub fn same_revision(a: &VersionId, b: &VersionId) -> bool {
    match (a, b) {
        (VersionId::Release(a), VersionId::Release(b)) => a.same_precedence(b),
        (VersionId::Ref(a), VersionId::Ref(b)) => a == b,
        _ => false,
    }
}
