//! Structured query interface over a loaded model: entity pattern matches
//! with bounded neighbor expansion, relation filters, whole-structure
//! overviews, and impact delegation.

use std::collections::{BTreeMap, HashSet, VecDeque};

use glob::Pattern;
use serde::Serialize;

use crate::config::EngineConfig;
use crate::error::{ModelError, Result};
use crate::explore::{Direction, LoadedModel};
use crate::impact::{ImpactAnalyzer, ImpactReport, ImpactRequest};
use crate::model::{Dependency, DependencyKind};
use crate::navigate::Heading;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Entity,
    Relation,
    Structure,
    Impact,
}

impl QueryType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "entity" => Some(QueryType::Entity),
            "relation" => Some(QueryType::Relation),
            "structure" => Some(QueryType::Structure),
            "impact" => Some(QueryType::Impact),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelQuery {
    pub query_type: QueryType,
    /// Glob matched against artifact paths and child names.
    pub pattern: String,
    pub depth: usize,
    pub limit: usize,
    /// Dependency-kind filter for relation queries.
    pub kind: Option<DependencyKind>,
    /// Which edge endpoint the pattern must match for relation queries:
    /// `Outgoing` matches sources, `Incoming` matches resolved targets,
    /// `Both` matches either.
    pub direction: Heading,
    /// For impact queries: also report dependents.
    pub include_reverse: bool,
}

impl Default for ModelQuery {
    fn default() -> Self {
        Self {
            query_type: QueryType::Entity,
            pattern: "*".to_string(),
            depth: 1,
            limit: 50,
            kind: None,
            direction: Heading::Both,
            include_reverse: true,
        }
    }
}

/// How an entity matched, ordered strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchQuality {
    /// Pattern equals the artifact path.
    Exact,
    /// Pattern glob-matches the artifact path.
    Path,
    /// Pattern matches a child element name.
    Child,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntityMatch {
    pub path: String,
    pub quality: MatchQuality,
    /// Resolved artifacts within `depth` hops, either direction.
    pub neighbors: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StructureOverview {
    pub artifacts: usize,
    pub dependencies_by_kind: BTreeMap<String, usize>,
    pub unresolved_dependencies: usize,
    pub flows: Vec<String>,
    /// Top-level directory -> artifact count.
    pub groupings: BTreeMap<String, usize>,
    pub element_types: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum QueryResult {
    Entities {
        matches: Vec<EntityMatch>,
        /// Total before the limit was applied.
        total: usize,
        truncated: bool,
    },
    Relations {
        edges: Vec<Dependency>,
        total: usize,
        truncated: bool,
    },
    Structure(StructureOverview),
    Impact(ImpactReport),
}

pub struct QueryEngine<'a> {
    model: &'a LoadedModel,
    config: &'a EngineConfig,
}

impl<'a> QueryEngine<'a> {
    pub fn new(model: &'a LoadedModel, config: &'a EngineConfig) -> Self {
        Self { model, config }
    }

    pub fn run(&self, query: &ModelQuery) -> Result<QueryResult> {
        match query.query_type {
            QueryType::Entity => self.entities(query),
            QueryType::Relation => self.relations(query),
            QueryType::Structure => Ok(QueryResult::Structure(self.structure())),
            QueryType::Impact => {
                let report = ImpactAnalyzer::new(self.model, self.config).analyze(&ImpactRequest {
                    target: query.pattern.clone(),
                    depth: query.depth,
                    include_reverse: query.include_reverse,
                })?;
                Ok(QueryResult::Impact(report))
            }
        }
    }

    fn entities(&self, query: &ModelQuery) -> Result<QueryResult> {
        let pattern = compile(&query.pattern)?;

        let mut matches: Vec<EntityMatch> = self
            .model
            .instance
            .artifacts
            .values()
            .filter_map(|a| {
                let quality = if a.path == query.pattern {
                    MatchQuality::Exact
                } else if pattern.matches(&a.path) {
                    MatchQuality::Path
                } else if a.children.iter().any(|c| pattern.matches(&c.name)) {
                    MatchQuality::Child
                } else {
                    return None;
                };
                Some(EntityMatch {
                    path: a.path.clone(),
                    quality,
                    neighbors: self.expand(&a.path, query.depth),
                })
            })
            .collect();

        // Stable ordering before truncation so the limit never hides a
        // stronger match behind a weaker one.
        matches.sort_by(|a, b| a.quality.cmp(&b.quality).then_with(|| a.path.cmp(&b.path)));
        let total = matches.len();
        let truncated = total > query.limit;
        matches.truncate(query.limit);

        Ok(QueryResult::Entities {
            matches,
            total,
            truncated,
        })
    }

    fn relations(&self, query: &ModelQuery) -> Result<QueryResult> {
        let pattern = compile(&query.pattern)?;

        let mut edges: Vec<Dependency> = self
            .model
            .instance
            .dependencies
            .iter()
            .filter(|d| query.kind.map_or(true, |k| d.kind == k))
            .filter(|d| {
                let from_hit = pattern.matches(&d.from);
                let to_hit = d.to.resolved_path().map_or(false, |to| pattern.matches(to));
                match query.direction {
                    Heading::Outgoing => from_hit,
                    Heading::Incoming => to_hit,
                    Heading::Both => from_hit || to_hit,
                }
            })
            .cloned()
            .collect();

        edges.sort_by(|a, b| {
            a.from
                .cmp(&b.from)
                .then_with(|| a.kind.as_str().cmp(b.kind.as_str()))
        });
        let total = edges.len();
        let truncated = total > query.limit;
        edges.truncate(query.limit);

        Ok(QueryResult::Relations {
            edges,
            total,
            truncated,
        })
    }

    fn structure(&self) -> StructureOverview {
        let mut by_kind: BTreeMap<String, usize> = BTreeMap::new();
        for dep in &self.model.instance.dependencies {
            *by_kind.entry(dep.kind.as_str().to_string()).or_insert(0) += 1;
        }

        let mut groupings: BTreeMap<String, usize> = BTreeMap::new();
        for path in self.model.instance.artifacts.keys() {
            let top = match path.find('/') {
                Some(idx) => path[..idx].to_string(),
                None => ".".to_string(),
            };
            *groupings.entry(top).or_insert(0) += 1;
        }

        StructureOverview {
            artifacts: self.model.instance.artifacts.len(),
            dependencies_by_kind: by_kind,
            unresolved_dependencies: self.model.instance.unresolved_count(),
            flows: self.model.instance.flows.keys().cloned().collect(),
            groupings,
            element_types: self.model.schema.element_types.keys().cloned().collect(),
        }
    }

    /// Resolved artifacts within `depth` undirected hops, excluding the
    /// start, sorted.
    fn expand(&self, start: &str, depth: usize) -> Vec<String> {
        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(start.to_string());
        let mut queue: VecDeque<(String, usize)> = VecDeque::new();
        queue.push_back((start.to_string(), 0));

        while let Some((current, d)) = queue.pop_front() {
            if d >= depth {
                continue;
            }
            for direction in [Direction::Outgoing, Direction::Incoming] {
                for next in self.model.neighbors(&current, direction, None) {
                    if seen.insert(next.to_string()) {
                        queue.push_back((next.to_string(), d + 1));
                    }
                }
            }
        }

        seen.remove(start);
        let mut out: Vec<String> = seen.into_iter().collect();
        out.sort();
        out
    }
}

fn compile(pattern: &str) -> Result<Pattern> {
    Pattern::new(pattern).map_err(|e| ModelError::Query(format!("invalid pattern '{}': {}", pattern, e)))
}
