// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{resolve_categories, CategoryPaths, ConfigFile, RawConfigFile};
use crate::errors::{PipelineError, Result};
use crate::pipeline::AssetKind;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = PipelineError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_category_keys(&raw)?;
        validate_roots(&raw)?;

        let mut categories = resolve_categories(&raw)?;
        validate_dependencies(&categories)?;
        validate_dag(&categories)?;
        exclude_output_root(&raw, &mut categories);

        Ok(ConfigFile::new_unchecked(raw.paths, raw.watch, categories))
    }
}

fn validate_category_keys(raw: &RawConfigFile) -> Result<()> {
    for key in raw.category.keys() {
        if key.parse::<AssetKind>().is_err() {
            return Err(PipelineError::Config(format!(
                "unknown category '{}' (expected one of: html, css, js, img, fonts)",
                key
            )));
        }
    }
    Ok(())
}

fn validate_roots(raw: &RawConfigFile) -> Result<()> {
    if raw.paths.source_root == raw.paths.output_root {
        return Err(PipelineError::Config(format!(
            "source_root and output_root must differ (both are {:?})",
            raw.paths.source_root
        )));
    }
    Ok(())
}

fn validate_dependencies(categories: &[CategoryPaths]) -> Result<()> {
    for cat in categories {
        for dep in &cat.after {
            if *dep == cat.kind {
                return Err(PipelineError::Config(format!(
                    "category '{}' cannot depend on itself in `after`",
                    cat.kind
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(categories: &[CategoryPaths]) -> Result<()> {
    // Edge direction: dep -> task, so a topological sort orders
    // dependencies first and fails exactly when there is a cycle.
    let mut graph: DiGraphMap<AssetKind, ()> = DiGraphMap::new();

    for cat in categories {
        graph.add_node(cat.kind);
    }

    for cat in categories {
        for dep in &cat.after {
            graph.add_edge(*dep, cat.kind, ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(PipelineError::GraphCycle(format!(
            "cycle detected in `after` dependencies involving category '{}'",
            cycle.node_id()
        ))),
    }
}

/// Ensure no task can ever consume its own (or a sibling's) output: when the
/// output root lives inside the source root, append it to every category's
/// exclusion set.
fn exclude_output_root(raw: &RawConfigFile, categories: &mut [CategoryPaths]) {
    let Ok(rel) = raw.paths.output_root.strip_prefix(&raw.paths.source_root) else {
        return;
    };

    let pattern = format!("{}/**", rel.to_string_lossy().replace('\\', "/"));
    for cat in categories.iter_mut() {
        if !cat.exclude.contains(&pattern) {
            cat.exclude.push(pattern.clone());
        }
        if !cat.watch_exclude.contains(&pattern) {
            cat.watch_exclude.push(pattern.clone());
        }
    }
}
