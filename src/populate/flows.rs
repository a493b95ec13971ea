//! Flow tracing: follows resolved import/call edges from entry-point
//! artifacts to record named cross-file activation paths.

use std::collections::{BTreeMap, HashMap, HashSet};

use glob::Pattern;

use crate::config::EngineConfig;
use crate::model::{Dependency, DependencyKind, Flow, FlowStep};

pub struct FlowTracer<'a> {
    config: &'a EngineConfig,
}

impl<'a> FlowTracer<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// One flow per entry-point artifact, named `startup:<path>`. Traversal
    /// is a depth-bounded DFS over resolved import/call edges with a
    /// visited set, so cycles appear once.
    pub fn trace(
        &self,
        artifact_paths: &[String],
        dependencies: &[Dependency],
    ) -> BTreeMap<String, Flow> {
        let entry_globs: Vec<Pattern> = self
            .config
            .entry_points
            .iter()
            .filter_map(|p| Pattern::new(p).ok())
            .collect();

        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
        for dep in dependencies {
            if !matches!(dep.kind, DependencyKind::Import | DependencyKind::Call) {
                continue;
            }
            if let Some(to) = dep.to.resolved_path() {
                adjacency.entry(dep.from.as_str()).or_default().push(to);
            }
        }
        for neighbors in adjacency.values_mut() {
            neighbors.sort();
            neighbors.dedup();
        }

        let mut flows = BTreeMap::new();
        for path in artifact_paths {
            if !entry_globs.iter().any(|g| g.matches(path)) {
                continue;
            }

            let mut steps = Vec::new();
            let mut visited = HashSet::new();
            self.walk(path, &adjacency, &mut visited, &mut steps, 0);

            if !steps.is_empty() {
                let name = format!("startup:{}", path);
                flows.insert(name.clone(), Flow { name, steps });
            }
        }

        flows
    }

    fn walk<'b>(
        &self,
        current: &'b str,
        adjacency: &HashMap<&'b str, Vec<&'b str>>,
        visited: &mut HashSet<&'b str>,
        steps: &mut Vec<FlowStep>,
        depth: usize,
    ) {
        if depth > self.config.flow_depth || !visited.insert(current) {
            return;
        }
        steps.push(FlowStep {
            artifact: current.to_string(),
            element: None,
        });
        if let Some(neighbors) = adjacency.get(current) {
            for next in neighbors {
                self.walk(next, adjacency, visited, steps, depth + 1);
            }
        }
    }
}
