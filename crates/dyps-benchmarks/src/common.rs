//! Common utilities for benchmarks

use criterion::Criterion;
use pprof::criterion::{Output, PProfProfiler};
use std::sync::Arc;

use dyps_source::InMemorySource;

/// Configure criterion with flamegraph profiling support
pub fn criterion_config() -> Criterion {
    Criterion::default()
        .warm_up_time(std::time::Duration::from_secs(3))
        .measurement_time(std::time::Duration::from_secs(10))
        .sample_size(100)
        .with_profiler(PProfProfiler::new(100, Output::Flamegraph(None)))
}

/// Synthetic graph: `root` depends on every repository of layer 0, and each
/// repository of layer `n` depends on two repositories of layer `n + 1`.
///
/// Every repository offers `versions` releases `1.0 .. 1.<versions - 1>`;
/// dependencies are declared with `^1.0` so each one is refetched once at
/// its resolved version.
pub fn layered_source(layers: usize, width: usize, versions: usize) -> anyhow::Result<Arc<InMemorySource>> {
    let source = InMemorySource::new();
    let name = |layer: usize, index: usize| format!("layer{}-repo{}", layer, index);

    let roots: Vec<(String, &str)> = (0..width).map(|index| (name(0, index), "^1.0")).collect();
    let roots: Vec<(&str, &str)> = roots.iter().map(|(to, c)| (to.as_str(), *c)).collect();
    source.declare("root", "root", &roots)?;

    for layer in 0..layers {
        for index in 0..width {
            let dependencies: Vec<String> = if layer + 1 < layers {
                vec![name(layer + 1, index), name(layer + 1, (index + 1) % width)]
            } else {
                Vec::new()
            };
            let dependencies: Vec<(&str, &str)> =
                dependencies.iter().map(|to| (to.as_str(), "^1.0")).collect();

            for minor in 0..versions.max(1) {
                source.declare(&name(layer, index), &format!("1.{}", minor), &dependencies)?;
            }
        }
    }

    Ok(Arc::new(source))
}

/// Number of repositories `layered_source` creates, root included
pub fn layered_size(layers: usize, width: usize) -> usize {
    layers * width + 1
}

/// Runtime for driving async resolution from criterion closures
pub fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread().enable_all().build()?)
}
