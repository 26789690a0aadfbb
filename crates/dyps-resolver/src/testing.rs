//! Shared fixtures for resolver unit tests

use std::sync::Arc;

use dyps_core::{RepositoryId, VersionConstraint, VersionId};
use dyps_source::{InMemorySource, RepositorySource};

pub fn repo(name: &str) -> RepositoryId {
    RepositoryId::new(name).unwrap()
}

pub fn c(input: &str) -> VersionConstraint {
    VersionConstraint::parse(input).unwrap()
}

pub fn v(input: &str) -> VersionId {
    VersionId::parse(input)
}

pub fn shared(source: &Arc<InMemorySource>) -> Arc<dyn RepositorySource> {
    source.clone()
}

/// R -> A (>=1.0,<2.0), R -> B (=1.5); A -> B (>=1.2); B in {1.0, 1.2, 1.5, 2.0}
pub fn scenario_one() -> Arc<InMemorySource> {
    let source = InMemorySource::new();
    source.declare("r", "root", &[("a", ">=1.0,<2.0"), ("b", "=1.5")]).unwrap();
    source.declare("a", "1.0", &[("b", ">=1.0")]).unwrap();
    source.declare("a", "1.1", &[("b", ">=1.2")]).unwrap();
    source.declare("a", "2.0", &[]).unwrap();
    for version in ["1.0", "1.2", "1.5", "2.0"] {
        source.declare("b", version, &[]).unwrap();
    }
    Arc::new(source)
}

/// R -> A (=1.0), R -> C (=2.0); A -> C (=1.0)
pub fn scenario_two() -> Arc<InMemorySource> {
    let source = InMemorySource::new();
    source.declare("r", "root", &[("a", "=1.0"), ("c", "=2.0")]).unwrap();
    source.declare("a", "1.0", &[("c", "=1.0")]).unwrap();
    source.declare("c", "1.0", &[]).unwrap();
    source.declare("c", "2.0", &[]).unwrap();
    Arc::new(source)
}
