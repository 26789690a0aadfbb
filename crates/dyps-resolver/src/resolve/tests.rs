//! Unit tests for version selection and the refetch fixed point

use super::*;
use crate::graph::DependencyEdge;
use crate::testing::{c, repo, scenario_one, scenario_two, shared, v};
use dyps_config::FetchSettings;
use dyps_source::InMemorySource;

fn selector(versions: &[&str]) -> VersionSelector {
    VersionSelector::new(versions.iter().map(|version| v(version)))
}

async fn build_and_resolve(
    source: &Arc<InMemorySource>,
    settings: ResolverSettings,
) -> (ResolverResult<()>, DependencyGraph, VersionResolver) {
    let cancel = CancellationToken::new();
    let builder = GraphBuilder::new(shared(source), FetchSettings::default(), cancel.clone());
    let mut graph = builder.build(&repo("r"), &c("@root")).await.unwrap();
    let mut resolver = VersionResolver::new(shared(source), settings, cancel);
    let result = resolver.resolve(&mut graph, &builder).await;
    (result, graph, resolver)
}

fn resolved(graph: &DependencyGraph, name: &str) -> VersionId {
    graph.node(&repo(name)).unwrap().resolved.clone().unwrap()
}

#[test]
fn test_selector_prefers_highest() {
    let selector = selector(&["1.0", "1.2", "1.5", "2.0"]);
    let selected = selector.select_preferred(&c(">=1.0,<2.0"), VersionPreference::Highest, false);
    assert_eq!(selected, Some(v("1.5")));
}

#[test]
fn test_selector_lowest_is_minimal_version_selection() {
    let selector = selector(&["1.0", "1.2", "1.5", "2.0"]);
    let selected = selector.select_preferred(&c(">=1.1"), VersionPreference::Lowest, false);
    assert_eq!(selected, Some(v("1.2")));
}

#[test]
fn test_selector_tie_break_is_lexical() {
    let selector = selector(&["1.5", "1.5.0", "1.4"]);
    assert_eq!(
        selector.select_best(&c("=1.5"), VersionPreference::Highest),
        Some(v("1.5.0"))
    );
    assert_eq!(
        selector.select_best(&c("=1.5"), VersionPreference::Lowest),
        Some(v("1.5"))
    );
}

#[test]
fn test_selector_stable_first_with_prerelease_fallback() {
    let selector = selector(&["1.0", "2.0-beta.1"]);

    assert_eq!(
        selector.select_preferred(&c("*"), VersionPreference::Highest, false),
        Some(v("1.0"))
    );
    assert_eq!(
        selector.select_preferred(&c("*"), VersionPreference::Highest, true),
        Some(v("2.0-beta.1"))
    );
    // only a prerelease matches
    assert_eq!(
        selector.select_preferred(&c(">=2.0-alpha"), VersionPreference::Highest, false),
        Some(v("2.0-beta.1"))
    );
}

#[test]
fn test_selector_matches_references() {
    let selector = selector(&["main", "develop", "1.0"]);
    assert_eq!(
        selector.select_preferred(&c("@main"), VersionPreference::Highest, false),
        Some(v("main"))
    );
    assert_eq!(selector.select_best(&c("@feature"), VersionPreference::Highest), None);
    assert_eq!(selector.find_matching(&c("*")).count(), 3);
}

#[test]
fn test_effective_constraint_conflict_lists_requesters_in_order() {
    let mut graph = DependencyGraph::new(repo("r"), c("@root"));
    graph.add_dependency(&repo("r"), &repo("c"), DependencyEdge::new(c("=2.0")));
    graph.add_dependency(&repo("a"), &repo("c"), DependencyEdge::new(c("=1.0")));

    let error = effective_constraint(&graph, &repo("c")).unwrap_err();
    match error {
        DypsError::Conflict { repo: conflicted, constraints } => {
            assert_eq!(conflicted, repo("c"));
            assert_eq!(constraints, vec![(repo("r"), c("=2.0")), (repo("a"), c("=1.0"))]);
        },
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[test]
fn test_effective_constraint_of_root_is_its_ref() {
    let mut graph = DependencyGraph::new(repo("r"), c("@root"));
    graph.add_dependency(&repo("a"), &repo("r"), DependencyEdge::new(c("=9.0")));
    assert_eq!(effective_constraint(&graph, &repo("r")).unwrap(), c("@root"));
}

#[tokio::test]
async fn test_resolves_first_scenario() {
    let source = scenario_one();
    let (result, graph, resolver) = build_and_resolve(&source, ResolverSettings::default()).await;
    result.unwrap();

    assert_eq!(resolved(&graph, "b"), v("1.5"));
    assert_eq!(resolved(&graph, "a"), v("1.1"));
    assert_eq!(resolved(&graph, "r"), v("root"));

    // a was read at its range first, then once more at 1.1
    assert_eq!(source.fetch_count(&repo("a")), 2);
    assert_eq!(source.fetch_count(&repo("b")), 1);
    assert_eq!(resolver.refetch_count(), 1);
    assert_eq!(source.list_count(&repo("a")), 1);
    assert_eq!(source.list_count(&repo("b")), 1);
}

#[tokio::test]
async fn test_pinned_root_skips_listing() {
    let source = scenario_one();
    let (result, _, _) = build_and_resolve(&source, ResolverSettings::default()).await;
    result.unwrap();
    assert_eq!(source.list_count(&repo("r")), 0);
}

#[tokio::test]
async fn test_conflict_in_second_scenario() {
    let source = scenario_two();
    let (result, _, _) = build_and_resolve(&source, ResolverSettings::default()).await;

    match result.unwrap_err() {
        DypsError::Conflict { repo: conflicted, constraints } => {
            assert_eq!(conflicted, repo("c"));
            assert_eq!(constraints, vec![(repo("r"), c("=2.0")), (repo("a"), c("=1.0"))]);
        },
        other => panic!("expected conflict, got {other:?}"),
    }
}

/// r -> {a >=1.0, b *, c =2.0}; only a 2.0 pins c to 1.0, b keeps a below 2.0
fn outdated_requester_source() -> Arc<InMemorySource> {
    let source = InMemorySource::new();
    source.declare("r", "root", &[("a", ">=1.0"), ("b", "*"), ("c", "=2.0")]).unwrap();
    source.declare("a", "1.0", &[]).unwrap();
    source.declare("a", "2.0", &[("c", "=1.0")]).unwrap();
    source.declare("b", "1.0", &[("a", "<2.0")]).unwrap();
    source.declare("c", "1.0", &[]).unwrap();
    source.declare("c", "2.0", &[]).unwrap();
    Arc::new(source)
}

#[tokio::test]
async fn test_conflict_from_outdated_manifest_is_deferred() {
    let source = outdated_requester_source();
    let (result, graph, resolver) = build_and_resolve(&source, ResolverSettings::default()).await;
    result.unwrap();

    assert_eq!(resolved(&graph, "a"), v("1.0"));
    assert_eq!(resolved(&graph, "b"), v("1.0"));
    assert_eq!(resolved(&graph, "c"), v("2.0"));
    // a 1.0 declares nothing, so only the root constrains c
    let c_node = graph.node(&repo("c")).unwrap();
    assert_eq!(c_node.constraints.keys().collect::<Vec<_>>(), vec![&repo("r")]);
    assert_eq!(source.fetch_count(&repo("a")), 2);
    assert_eq!(resolver.refetch_count(), 2);
}

#[tokio::test]
async fn test_select_all_returns_conflicting_nodes_unresolved() {
    let mut graph = DependencyGraph::new(repo("r"), c("@root"));
    graph.add_dependency(&repo("r"), &repo("c"), DependencyEdge::new(c("=2.0")));
    graph.add_dependency(&repo("r"), &repo("a"), DependencyEdge::new(c("=1.0")));
    graph.add_dependency(&repo("a"), &repo("c"), DependencyEdge::new(c("=1.0")));

    let source = InMemorySource::new();
    source.declare("a", "1.0", &[]).unwrap();
    let source = Arc::new(source);
    let mut resolver = VersionResolver::new(shared(&source), ResolverSettings::default(), CancellationToken::new());
    let deferred = resolver.select_all(&mut graph).await.unwrap();

    assert_eq!(deferred.len(), 1);
    assert_eq!(deferred[0].0, repo("c"));
    assert!(matches!(deferred[0].1, DypsError::Conflict { .. }));
    assert_eq!(graph.node(&repo("c")).unwrap().resolved, None);
    assert_eq!(resolved(&graph, "a"), v("1.0"));
}

#[tokio::test]
async fn test_conflict_confirmed_after_refetch() {
    let source = InMemorySource::new();
    source.declare("r", "root", &[("a", ">=1.0"), ("c", "=2.0")]).unwrap();
    source.declare("a", "1.0", &[]).unwrap();
    source.declare("a", "2.0", &[("c", "=1.0")]).unwrap();
    source.declare("c", "1.0", &[]).unwrap();
    source.declare("c", "2.0", &[]).unwrap();
    let source = Arc::new(source);

    let (result, _, _) = build_and_resolve(&source, ResolverSettings::default()).await;

    match result.unwrap_err() {
        DypsError::Conflict { repo: conflicted, constraints } => {
            assert_eq!(conflicted, repo("c"));
            assert_eq!(constraints, vec![(repo("r"), c("=2.0")), (repo("a"), c("=1.0"))]);
        },
        other => panic!("expected conflict, got {other:?}"),
    }
    // a was read at its range, then once more at 2.0 before the conflict stood
    assert_eq!(source.requests().iter().filter(|(r, _)| *r == repo("a")).count(), 2);
    assert_eq!(source.requests().last(), Some(&(repo("a"), c("=2.0"))));
}

#[tokio::test]
async fn test_unresolvable_reports_available_versions() {
    let source = InMemorySource::new();
    source.declare("x", "1.0", &[]).unwrap();
    source.declare("x", "2.0", &[]).unwrap();
    let source = Arc::new(source);

    let mut graph = DependencyGraph::new(repo("r"), c("@root"));
    graph.add_dependency(&repo("r"), &repo("x"), DependencyEdge::new(c(">=3.0")));

    let mut resolver = VersionResolver::new(shared(&source), ResolverSettings::default(), CancellationToken::new());
    let error = resolver.select_all(&mut graph).await.unwrap_err();

    match error {
        DypsError::Unresolvable { repo: missing, constraint, available } => {
            assert_eq!(missing, repo("x"));
            assert_eq!(constraint, c(">=3.0"));
            assert_eq!(available, vec![v("1.0"), v("2.0")]);
        },
        other => panic!("expected unresolvable, got {other:?}"),
    }
}

#[tokio::test]
async fn test_lowest_preference_refetches_at_minimal_version() {
    let source = InMemorySource::new();
    source.declare("r", "root", &[("b", ">=1.0")]).unwrap();
    for version in ["1.0", "1.2", "2.0"] {
        source.declare("b", version, &[]).unwrap();
    }
    let source = Arc::new(source);

    let settings = ResolverSettings {
        preference: VersionPreference::Lowest,
        ..ResolverSettings::default()
    };
    let (result, graph, _) = build_and_resolve(&source, settings).await;
    result.unwrap();

    assert_eq!(resolved(&graph, "b"), v("1.0"));
    assert_eq!(source.requests().last(), Some(&(repo("b"), c("=1.0"))));
}

fn diverging_source() -> Arc<InMemorySource> {
    let source = InMemorySource::new();
    source.declare("r", "root", &[("x", "*"), ("y", "*")]).unwrap();
    source.declare("x", "1.0", &[]).unwrap();
    source.declare("x", "2.0", &[]).unwrap();
    source.declare("y", "1.0", &[("x", ">=2.0")]).unwrap();
    source.declare("y", "2.0", &[]).unwrap();
    Arc::new(source)
}

#[tokio::test]
async fn test_second_refetch_does_not_converge() {
    let source = diverging_source();
    let settings = ResolverSettings {
        preference: VersionPreference::Lowest,
        ..ResolverSettings::default()
    };

    let (result, _, _) = build_and_resolve(&source, settings).await;

    match result.unwrap_err() {
        DypsError::DidNotConverge { repo: diverged, fetches } => {
            assert_eq!(diverged, repo("x"));
            assert_eq!(fetches, 2);
        },
        other => panic!("expected non-convergence, got {other:?}"),
    }
    assert!(source.fetch_count(&repo("x")) <= 2);
}

#[tokio::test]
async fn test_higher_refetch_bound_converges() {
    let source = diverging_source();
    let settings = ResolverSettings {
        preference: VersionPreference::Lowest,
        max_refetches: 2,
        ..ResolverSettings::default()
    };

    let (result, graph, _) = build_and_resolve(&source, settings).await;
    result.unwrap();

    assert_eq!(resolved(&graph, "x"), v("2.0"));
    assert_eq!(resolved(&graph, "y"), v("1.0"));
    assert_eq!(graph.node(&repo("x")).unwrap().fetch_count, 3);
}

#[tokio::test]
async fn test_listing_failure_surfaces_as_fetch_error() {
    let mut graph = DependencyGraph::new(repo("r"), c("@root"));
    graph.add_dependency(&repo("r"), &repo("ghost"), DependencyEdge::new(c("*")));

    let source = Arc::new(InMemorySource::new());
    let mut resolver = VersionResolver::new(shared(&source), ResolverSettings::default(), CancellationToken::new());
    let error = resolver.select_all(&mut graph).await.unwrap_err();

    assert!(matches!(error, DypsError::ManifestFetch { ref repo, .. } if repo.as_str() == "ghost"));
}

#[tokio::test]
async fn test_cancelled_resolver_stops() {
    let source = scenario_one();
    let cancel = CancellationToken::new();
    let builder = GraphBuilder::new(shared(&source), FetchSettings::default(), cancel.clone());
    let mut graph = builder.build(&repo("r"), &c("@root")).await.unwrap();

    cancel.cancel();
    let mut resolver = VersionResolver::new(shared(&source), ResolverSettings::default(), cancel);
    let error = resolver.resolve(&mut graph, &builder).await.unwrap_err();

    assert!(matches!(error, DypsError::Cancelled));
}
