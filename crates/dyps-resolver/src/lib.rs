//! Dependency resolution engine for dyps
//!
//! This crate builds the dependency graph of a root repository from its
//! manifests, selects one version per repository, rejects cycles and emits a
//! deterministic, topologically ordered plan.

pub mod builder;
pub mod graph;
pub mod plan;
pub mod resolve;
pub mod run;

#[cfg(test)]
mod testing;

// Re-export main types
pub use builder::GraphBuilder;
pub use graph::{DependencyEdge, DependencyGraph, GraphNode, VisitState};
pub use plan::{emit, emit_with_installed, order, plan, InstalledState, PlanAction, PlanEntry, ResolutionPlan};
pub use resolve::{VersionResolver, VersionSelector};
pub use run::{ResolutionResult, ResolutionRun, ResolutionStats};

use dyps_core::error::DypsError;

/// Result type for resolver operations
pub type ResolverResult<T> = Result<T, DypsError>;
