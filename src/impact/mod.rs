//! Impact analysis: transitive forward/reverse dependency closures for a
//! changed target, with a per-artifact risk score and the shortest path
//! justifying each hit.

use std::collections::{HashMap, VecDeque};

use glob::Pattern;
use serde::Serialize;

use crate::config::EngineConfig;
use crate::error::{ModelError, Result};
use crate::explore::{Direction, LoadedModel};
use crate::model::Dependency;

#[derive(Debug, Clone)]
pub struct ImpactRequest {
    /// Glob matched against artifact paths and child names.
    pub target: String,
    pub depth: usize,
    /// Also walk incoming edges to find dependents.
    pub include_reverse: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImpactedArtifact {
    pub path: String,
    /// Edge count from the nearest matching target.
    pub distance: usize,
    /// In [0, 1]; higher means a change is more likely to break this file.
    pub risk: f64,
    /// Shortest edge chain from a target to this artifact.
    pub via: Vec<Dependency>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImpactReport {
    pub targets: Vec<String>,
    /// Artifacts the targets reach over outgoing edges.
    pub affected: Vec<ImpactedArtifact>,
    /// Artifacts that reach the targets over incoming edges.
    pub dependents: Vec<ImpactedArtifact>,
}

pub struct ImpactAnalyzer<'a> {
    model: &'a LoadedModel,
    config: &'a EngineConfig,
}

impl<'a> ImpactAnalyzer<'a> {
    pub fn new(model: &'a LoadedModel, config: &'a EngineConfig) -> Self {
        Self { model, config }
    }

    pub fn analyze(&self, request: &ImpactRequest) -> Result<ImpactReport> {
        let pattern = Pattern::new(&request.target)
            .map_err(|e| ModelError::Query(format!("invalid target pattern '{}': {}", request.target, e)))?;

        let targets: Vec<String> = self
            .model
            .instance
            .artifacts
            .values()
            .filter(|a| pattern.matches(&a.path) || a.children.iter().any(|c| pattern.matches(&c.name)))
            .map(|a| a.path.clone())
            .collect();
        if targets.is_empty() {
            return Err(ModelError::Query(format!(
                "no artifact matches target pattern '{}'",
                request.target
            )));
        }

        let affected = self.closure(&targets, request.depth, Direction::Outgoing);
        let dependents = if request.include_reverse {
            self.closure(&targets, request.depth, Direction::Incoming)
        } else {
            Vec::new()
        };

        Ok(ImpactReport {
            targets,
            affected,
            dependents,
        })
    }

    /// Multi-source BFS up to `depth` edges. Targets themselves are not
    /// reported. The frontier is expanded in sorted order so parent choices,
    /// and therefore justifying paths, are deterministic.
    fn closure(&self, targets: &[String], depth: usize, direction: Direction) -> Vec<ImpactedArtifact> {
        let mut distance: HashMap<String, usize> = HashMap::new();
        let mut parent: HashMap<String, Dependency> = HashMap::new();
        let mut queue: VecDeque<String> = VecDeque::new();

        let mut seeds = targets.to_vec();
        seeds.sort();
        for t in seeds {
            distance.insert(t.clone(), 0);
            queue.push_back(t);
        }

        while let Some(current) = queue.pop_front() {
            let d = distance[&current];
            if d >= depth {
                continue;
            }
            for dep in self.model.dependencies(&current, direction, None) {
                let next = match direction {
                    Direction::Outgoing => match dep.to.resolved_path() {
                        Some(p) => p.to_string(),
                        None => continue,
                    },
                    Direction::Incoming => dep.from.clone(),
                };
                if distance.contains_key(&next) {
                    continue;
                }
                distance.insert(next.clone(), d + 1);
                parent.insert(next.clone(), dep.clone());
                queue.push_back(next);
            }
        }

        let mut hits: Vec<ImpactedArtifact> = distance
            .iter()
            .filter(|(_, d)| **d > 0)
            .map(|(path, d)| ImpactedArtifact {
                path: path.clone(),
                distance: *d,
                risk: self.risk(path, *d),
                via: self.justify(path, &parent, direction),
            })
            .collect();
        hits.sort_by(|a, b| a.distance.cmp(&b.distance).then_with(|| a.path.cmp(&b.path)));
        hits
    }

    /// Weighted blend of inverse distance and fan-in diversity, clamped to
    /// [0, 1]. Weights come from configuration.
    fn risk(&self, path: &str, distance: usize) -> f64 {
        let fanin_kinds: f64 = {
            let mut kinds: Vec<_> = self
                .model
                .dependencies(path, Direction::Incoming, None)
                .iter()
                .map(|d| d.kind)
                .collect();
            kinds.sort();
            kinds.dedup();
            kinds.len() as f64
        };
        let score = self.config.distance_weight / distance as f64
            + self.config.fanin_weight * (fanin_kinds / 4.0);
        score.clamp(0.0, 1.0)
    }

    /// Walks parent pointers back to a seed and returns the edge chain in
    /// target-to-artifact order.
    fn justify(
        &self,
        path: &str,
        parent: &HashMap<String, Dependency>,
        direction: Direction,
    ) -> Vec<Dependency> {
        let mut chain = Vec::new();
        let mut current = path.to_string();
        while let Some(edge) = parent.get(&current) {
            current = match direction {
                Direction::Outgoing => edge.from.clone(),
                Direction::Incoming => match edge.to.resolved_path() {
                    Some(p) => p.to_string(),
                    None => break,
                },
            };
            chain.push(edge.clone());
        }
        chain.reverse();
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Artifact, DependencyKind, Instance, Schema, MODULE_TYPE};

    fn model(edges: &[(&str, &str, DependencyKind)]) -> LoadedModel {
        let mut instance = Instance::default();
        for (from, to, _) in edges {
            for path in [from, to] {
                instance
                    .artifacts
                    .entry(path.to_string())
                    .or_insert_with(|| Artifact::new(*path, MODULE_TYPE));
            }
        }
        instance.dependencies = edges
            .iter()
            .map(|(from, to, kind)| Dependency::resolved(*from, *to, *kind))
            .collect();
        LoadedModel::from_parts(Schema::base(), instance)
    }

    fn request(target: &str, depth: usize, reverse: bool) -> ImpactRequest {
        ImpactRequest {
            target: target.to_string(),
            depth,
            include_reverse: reverse,
        }
    }

    #[test]
    fn test_reverse_impact_finds_dependents() {
        let config = EngineConfig::default();
        // b imports a: changing a impacts b
        let m = model(&[("b.ts", "a.ts", DependencyKind::Import)]);
        let analyzer = ImpactAnalyzer::new(&m, &config);

        let report = analyzer.analyze(&request("a.ts", 1, true)).unwrap();

        assert_eq!(report.targets, vec!["a.ts"]);
        assert!(report.affected.is_empty());
        assert_eq!(report.dependents.len(), 1);
        let hit = &report.dependents[0];
        assert_eq!(hit.path, "b.ts");
        assert_eq!(hit.distance, 1);
        assert!(hit.risk > 0.0);
        assert_eq!(hit.via.len(), 1);
        assert_eq!(hit.via[0].from, "b.ts");
    }

    #[test]
    fn test_monotonic_in_depth() {
        let config = EngineConfig::default();
        let m = model(&[
            ("a.ts", "b.ts", DependencyKind::Import),
            ("b.ts", "c.ts", DependencyKind::Import),
            ("c.ts", "d.ts", DependencyKind::Import),
        ]);
        let analyzer = ImpactAnalyzer::new(&m, &config);

        let shallow = analyzer.analyze(&request("a.ts", 1, false)).unwrap();
        let deep = analyzer.analyze(&request("a.ts", 3, false)).unwrap();

        let shallow_paths: Vec<_> = shallow.affected.iter().map(|h| &h.path).collect();
        let deep_paths: Vec<_> = deep.affected.iter().map(|h| &h.path).collect();
        assert!(shallow_paths.iter().all(|p| deep_paths.contains(p)));
        assert_eq!(shallow.affected.len(), 1);
        assert_eq!(deep.affected.len(), 3);
    }

    #[test]
    fn test_risk_decreases_with_distance() {
        let config = EngineConfig::default();
        let m = model(&[
            ("a.ts", "b.ts", DependencyKind::Import),
            ("b.ts", "c.ts", DependencyKind::Import),
        ]);
        let analyzer = ImpactAnalyzer::new(&m, &config);

        let report = analyzer.analyze(&request("a.ts", 2, false)).unwrap();
        let by_path: HashMap<&str, f64> = report
            .affected
            .iter()
            .map(|h| (h.path.as_str(), h.risk))
            .collect();
        assert!(by_path["b.ts"] > by_path["c.ts"]);
        assert!(report.affected.iter().all(|h| (0.0..=1.0).contains(&h.risk)));
    }

    #[test]
    fn test_justifying_path_spans_distance() {
        let config = EngineConfig::default();
        let m = model(&[
            ("a.ts", "b.ts", DependencyKind::Import),
            ("b.ts", "c.ts", DependencyKind::Call),
        ]);
        let analyzer = ImpactAnalyzer::new(&m, &config);

        let report = analyzer.analyze(&request("a.ts", 3, false)).unwrap();
        let c = report.affected.iter().find(|h| h.path == "c.ts").unwrap();
        assert_eq!(c.via.len(), 2);
        assert_eq!(c.via[0].from, "a.ts");
        assert_eq!(c.via[1].kind, DependencyKind::Call);
    }

    #[test]
    fn test_glob_target_matches_many() {
        let config = EngineConfig::default();
        let m = model(&[
            ("src/a.ts", "lib/x.ts", DependencyKind::Import),
            ("src/b.ts", "lib/y.ts", DependencyKind::Import),
        ]);
        let analyzer = ImpactAnalyzer::new(&m, &config);

        let report = analyzer.analyze(&request("src/*", 1, false)).unwrap();
        assert_eq!(report.targets.len(), 2);
        assert_eq!(report.affected.len(), 2);
    }

    #[test]
    fn test_no_match_is_query_error() {
        let config = EngineConfig::default();
        let m = model(&[("a.ts", "b.ts", DependencyKind::Import)]);
        let analyzer = ImpactAnalyzer::new(&m, &config);

        let err = analyzer.analyze(&request("nothing/*", 1, false)).unwrap_err();
        assert!(matches!(err, ModelError::Query(_)));
    }

    #[test]
    fn test_invalid_pattern_is_query_error() {
        let config = EngineConfig::default();
        let m = model(&[("a.ts", "b.ts", DependencyKind::Import)]);
        let analyzer = ImpactAnalyzer::new(&m, &config);

        let err = analyzer.analyze(&request("[", 1, false)).unwrap_err();
        assert!(matches!(err, ModelError::Query(_)));
    }
}
