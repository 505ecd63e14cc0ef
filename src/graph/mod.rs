// src/graph/mod.rs

//! Task dependency graph and the build-phase runner.
//!
//! The graph is tiny (five fixed nodes, edges from `after` overrides) and
//! already validated acyclic by config loading; this module turns it into
//! parallel execution waves and runs them.

pub mod runner;

use std::collections::{BTreeMap, BTreeSet};

use petgraph::graphmap::DiGraphMap;

use crate::config::ConfigFile;
use crate::errors::{PipelineError, Result};
use crate::pipeline::AssetKind;

pub use runner::{run_build_phase, BuildReport, TaskStatus};

/// Dependency graph over the build tasks.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    /// dep -> dependent edges.
    graph: DiGraphMap<AssetKind, ()>,
}

impl TaskGraph {
    pub fn from_config(cfg: &ConfigFile) -> Self {
        let mut graph: DiGraphMap<AssetKind, ()> = DiGraphMap::new();

        for cat in cfg.categories() {
            graph.add_node(cat.kind);
        }
        for cat in cfg.categories() {
            for dep in &cat.after {
                graph.add_edge(*dep, cat.kind, ());
            }
        }

        Self { graph }
    }

    /// Direct dependencies of a task.
    pub fn dependencies(&self, kind: AssetKind) -> Vec<AssetKind> {
        let mut deps: Vec<_> = self
            .graph
            .neighbors_directed(kind, petgraph::Direction::Incoming)
            .collect();
        deps.sort();
        deps
    }

    /// Group tasks into waves: every task lands in the earliest wave after
    /// all of its dependencies. Tasks within a wave run in parallel.
    ///
    /// Config validation already rejected cycles, so this only fails on a
    /// graph that bypassed validation.
    pub fn waves(&self) -> Result<Vec<Vec<AssetKind>>> {
        let mut placed: BTreeSet<AssetKind> = BTreeSet::new();
        let mut remaining: BTreeSet<AssetKind> = self.graph.nodes().collect();
        let mut waves = Vec::new();

        while !remaining.is_empty() {
            let ready: Vec<AssetKind> = remaining
                .iter()
                .copied()
                .filter(|&kind| self.dependencies(kind).iter().all(|d| placed.contains(d)))
                .collect();

            if ready.is_empty() {
                return Err(PipelineError::GraphCycle(format!(
                    "no runnable task among {remaining:?}"
                )));
            }

            for kind in &ready {
                remaining.remove(kind);
            }
            placed.extend(ready.iter().copied());
            waves.push(ready);
        }

        Ok(waves)
    }

    /// Render the wave structure for `--dry-run`.
    pub fn describe(&self) -> Result<String> {
        let mut out = String::new();
        for (i, wave) in self.waves()?.iter().enumerate() {
            let names: Vec<_> = wave.iter().map(|k| k.name()).collect();
            out.push_str(&format!("wave {}: {}\n", i + 1, names.join(", ")));
        }
        Ok(out)
    }

    /// Transitive dependents of each task, used to skip downstream tasks
    /// when a dependency fails.
    pub fn transitive_dependents(&self) -> BTreeMap<AssetKind, BTreeSet<AssetKind>> {
        let mut map: BTreeMap<AssetKind, BTreeSet<AssetKind>> = BTreeMap::new();

        for start in self.graph.nodes() {
            let mut seen = BTreeSet::new();
            let mut stack: Vec<AssetKind> = self
                .graph
                .neighbors_directed(start, petgraph::Direction::Outgoing)
                .collect();
            while let Some(next) = stack.pop() {
                if seen.insert(next) {
                    stack.extend(
                        self.graph
                            .neighbors_directed(next, petgraph::Direction::Outgoing),
                    );
                }
            }
            map.insert(start, seen);
        }

        map
    }
}
