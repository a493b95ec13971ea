//! Read-side entry point: a loaded model with pre-built adjacency, shared
//! by the query, impact, pattern, and navigation components.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Serialize;

use crate::emit;
use crate::error::Result;
use crate::model::{Artifact, Dependency, DependencyKind, Flow, Instance, ParseOrigin, Schema};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Edges leaving the artifact (what it depends on).
    Outgoing,
    /// Edges arriving at the artifact (what depends on it).
    Incoming,
}

/// A model loaded for reading. Adjacency indices are built once at load so
/// every traversal is a map lookup.
pub struct LoadedModel {
    pub schema: Schema,
    pub instance: Instance,
    outgoing: HashMap<String, Vec<usize>>,
    incoming: HashMap<String, Vec<usize>>,
}

impl LoadedModel {
    pub fn load(model_dir: &Path) -> Result<Self> {
        let (schema, instance) = emit::load_model(model_dir)?;
        Ok(Self::from_parts(schema, instance))
    }

    pub fn from_parts(schema: Schema, instance: Instance) -> Self {
        let mut outgoing: HashMap<String, Vec<usize>> = HashMap::new();
        let mut incoming: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, dep) in instance.dependencies.iter().enumerate() {
            outgoing.entry(dep.from.clone()).or_default().push(idx);
            if let Some(to) = dep.to.resolved_path() {
                incoming.entry(to.to_string()).or_default().push(idx);
            }
        }
        Self {
            schema,
            instance,
            outgoing,
            incoming,
        }
    }

    pub fn artifact(&self, path: &str) -> Option<&Artifact> {
        self.instance.artifacts.get(path)
    }

    pub fn flow(&self, name: &str) -> Option<&Flow> {
        self.instance.flows.get(name)
    }

    /// Dependency edges touching `path`, optionally narrowed by kind.
    pub fn dependencies(
        &self,
        path: &str,
        direction: Direction,
        kind: Option<DependencyKind>,
    ) -> Vec<&Dependency> {
        let index = match direction {
            Direction::Outgoing => &self.outgoing,
            Direction::Incoming => &self.incoming,
        };
        index
            .get(path)
            .map(|indices| {
                indices
                    .iter()
                    .map(|&i| &self.instance.dependencies[i])
                    .filter(|d| kind.map_or(true, |k| d.kind == k))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Resolved neighbor paths of `path` in the given direction, sorted and
    /// deduplicated.
    pub fn neighbors(
        &self,
        path: &str,
        direction: Direction,
        kind: Option<DependencyKind>,
    ) -> Vec<&str> {
        let mut out: Vec<&str> = self
            .dependencies(path, direction, kind)
            .into_iter()
            .filter_map(|d| match direction {
                Direction::Outgoing => d.to.resolved_path(),
                Direction::Incoming => Some(d.from.as_str()),
            })
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Case-insensitive substring search over artifact paths, summaries,
    /// child names, and tags. Results keep map order, so they are
    /// path-sorted.
    pub fn search(&self, needle: &str) -> Vec<&Artifact> {
        let needle = needle.to_lowercase();
        self.instance
            .artifacts
            .values()
            .filter(|a| {
                a.path.to_lowercase().contains(&needle)
                    || a.summary.to_lowercase().contains(&needle)
                    || a.children.iter().any(|c| c.name.to_lowercase().contains(&needle))
                    || a.tags.iter().any(|t| t.to_lowercase().contains(&needle))
            })
            .collect()
    }

    pub fn stats(&self) -> ModelStats {
        let mut by_language: HashMap<String, usize> = HashMap::new();
        let mut children_by_kind: BTreeMap<String, usize> = BTreeMap::new();
        let mut dependencies_by_kind: BTreeMap<String, usize> = BTreeMap::new();
        let mut degraded = 0usize;
        for artifact in self.instance.artifacts.values() {
            let language = artifact.language.clone().unwrap_or_else(|| "unknown".to_string());
            *by_language.entry(language).or_insert(0) += 1;
            for child in &artifact.children {
                *children_by_kind.entry(child.kind.clone()).or_insert(0) += 1;
            }
            if artifact.parse_origin != ParseOrigin::Structured {
                degraded += 1;
            }
        }
        for dep in &self.instance.dependencies {
            *dependencies_by_kind
                .entry(dep.kind.as_str().to_string())
                .or_insert(0) += 1;
        }
        let mut languages: Vec<(String, usize)> = by_language.into_iter().collect();
        languages.sort();

        ModelStats {
            artifacts: self.instance.artifacts.len(),
            dependencies: self.instance.dependencies.len(),
            unresolved_dependencies: self.instance.unresolved_count(),
            flows: self.instance.flows.len(),
            element_types: self.schema.element_types.len(),
            schema_extensions: self.schema.extensions.len(),
            degraded_artifacts: degraded,
            children_by_kind,
            dependencies_by_kind,
            languages,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelStats {
    pub artifacts: usize,
    pub dependencies: usize,
    pub unresolved_dependencies: usize,
    pub flows: usize,
    pub element_types: usize,
    pub schema_extensions: usize,
    pub degraded_artifacts: usize,
    pub children_by_kind: BTreeMap<String, usize>,
    pub dependencies_by_kind: BTreeMap<String, usize>,
    pub languages: Vec<(String, usize)>,
}
