//! Statistical convention discovery over a loaded model: naming casings,
//! directory organization, import locality, layering violations, and
//! similar-artifact lookup.

use std::collections::{BTreeMap, HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::error::{ModelError, Result};
use crate::explore::{Direction, LoadedModel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternCategory {
    Naming,
    Organization,
    Modules,
    Architecture,
}

impl PatternCategory {
    pub const ALL: [PatternCategory; 4] = [
        PatternCategory::Naming,
        PatternCategory::Organization,
        PatternCategory::Modules,
        PatternCategory::Architecture,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PatternCategory::Naming => "naming",
            PatternCategory::Organization => "organization",
            PatternCategory::Modules => "modules",
            PatternCategory::Architecture => "architecture",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "naming" => Some(PatternCategory::Naming),
            "organization" => Some(PatternCategory::Organization),
            "modules" => Some(PatternCategory::Modules),
            "architecture" => Some(PatternCategory::Architecture),
            _ => None,
        }
    }
}

/// One discovered convention with its supporting evidence.
#[derive(Debug, Clone, Serialize)]
pub struct PatternFinding {
    pub category: String,
    pub convention: String,
    /// Share of observations supporting the convention, in [0, 1].
    pub confidence: f64,
    pub evidence: usize,
    pub examples: Vec<String>,
}

static CASINGS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        ("camelCase", Regex::new(r"^[a-z][a-zA-Z0-9]*$").unwrap()),
        ("PascalCase", Regex::new(r"^[A-Z][a-zA-Z0-9]*$").unwrap()),
        ("snake_case", Regex::new(r"^[a-z][a-z0-9]*(_[a-z0-9]+)+$").unwrap()),
        ("SCREAMING_SNAKE", Regex::new(r"^[A-Z][A-Z0-9]*(_[A-Z0-9]+)+$").unwrap()),
    ]
});

/// Fraction of a directory's resolved imports that must stay inside it to
/// call the directory a cohesive module.
const LOCALITY_THRESHOLD: f64 = 0.6;

pub struct PatternDiscovery<'a> {
    model: &'a LoadedModel,
}

impl<'a> PatternDiscovery<'a> {
    pub fn new(model: &'a LoadedModel) -> Self {
        Self { model }
    }

    pub fn discover(&self, category: PatternCategory) -> Vec<PatternFinding> {
        match category {
            PatternCategory::Naming => self.naming(),
            PatternCategory::Organization => self.organization(),
            PatternCategory::Modules => self.modules(),
            PatternCategory::Architecture => self.architecture(),
        }
    }

    pub fn discover_all(&self) -> Vec<PatternFinding> {
        PatternCategory::ALL
            .iter()
            .flat_map(|c| self.discover(*c))
            .collect()
    }

    /// Dominant identifier casing per child kind.
    fn naming(&self) -> Vec<PatternFinding> {
        // kind -> casing -> (count, sample names)
        let mut buckets: BTreeMap<String, BTreeMap<&'static str, (usize, Vec<String>)>> =
            BTreeMap::new();
        for artifact in self.model.instance.artifacts.values() {
            for child in &artifact.children {
                // snake_case and SCREAMING_SNAKE are checked before the
                // single-word casings that would also match them.
                let casing = CASINGS
                    .iter()
                    .rev()
                    .find(|(_, re)| re.is_match(&child.name))
                    .map(|(name, _)| *name);
                let Some(casing) = casing else { continue };
                let entry = buckets
                    .entry(child.kind.clone())
                    .or_default()
                    .entry(casing)
                    .or_insert((0, Vec::new()));
                entry.0 += 1;
                if entry.1.len() < 3 {
                    entry.1.push(child.name.clone());
                }
            }
        }

        buckets
            .into_iter()
            .filter_map(|(kind, casings)| {
                let total: usize = casings.values().map(|(n, _)| n).sum();
                let (casing, (count, examples)) =
                    casings.into_iter().max_by_key(|(name, (n, _))| (*n, *name))?;
                if total == 0 {
                    return None;
                }
                Some(PatternFinding {
                    category: "naming".to_string(),
                    convention: format!("{} names use {}", kind, casing),
                    confidence: count as f64 / total as f64,
                    evidence: count,
                    examples,
                })
            })
            .collect()
    }

    /// Directory-to-kind co-occurrence: directories whose children share a
    /// dominant kind.
    fn organization(&self) -> Vec<PatternFinding> {
        // directory -> kind -> count
        let mut dirs: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();
        for artifact in self.model.instance.artifacts.values() {
            let dir = directory(&artifact.path);
            for child in &artifact.children {
                *dirs.entry(dir.clone()).or_default().entry(child.kind.clone()).or_insert(0) += 1;
            }
        }

        dirs.into_iter()
            .filter_map(|(dir, kinds)| {
                let total: usize = kinds.values().sum();
                if total < 2 {
                    return None;
                }
                let (kind, count) = kinds
                    .into_iter()
                    .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))?;
                Some(PatternFinding {
                    category: "organization".to_string(),
                    convention: format!("{} mostly holds {} elements", display_dir(&dir), kind),
                    confidence: count as f64 / total as f64,
                    evidence: count,
                    examples: vec![display_dir(&dir).to_string()],
                })
            })
            .collect()
    }

    /// Import locality: directories whose files mostly import each other.
    fn modules(&self) -> Vec<PatternFinding> {
        // directory -> (internal imports, total resolved imports)
        let mut locality: BTreeMap<String, (usize, usize)> = BTreeMap::new();
        for dep in &self.model.instance.dependencies {
            let Some(to) = dep.to.resolved_path() else { continue };
            let from_dir = directory(&dep.from);
            let entry = locality.entry(from_dir.clone()).or_insert((0, 0));
            entry.1 += 1;
            if directory(to) == from_dir {
                entry.0 += 1;
            }
        }

        locality
            .into_iter()
            .filter_map(|(dir, (internal, total))| {
                if total == 0 {
                    return None;
                }
                let ratio = internal as f64 / total as f64;
                if ratio < LOCALITY_THRESHOLD {
                    return None;
                }
                Some(PatternFinding {
                    category: "modules".to_string(),
                    convention: format!("{} forms a cohesive module", display_dir(&dir)),
                    confidence: ratio,
                    evidence: internal,
                    examples: vec![display_dir(&dir).to_string()],
                })
            })
            .collect()
    }

    /// Layering check: dependency cycles are reported as violations; an
    /// acyclic graph is reported as a clean layering.
    fn architecture(&self) -> Vec<PatternFinding> {
        let cycles = self.find_cycles();
        if cycles.is_empty() {
            return vec![PatternFinding {
                category: "architecture".to_string(),
                convention: "dependency graph is acyclic (clean layering)".to_string(),
                confidence: 1.0,
                evidence: self.model.instance.dependencies.len(),
                examples: Vec::new(),
            }];
        }
        cycles
            .into_iter()
            .map(|cycle| PatternFinding {
                category: "architecture".to_string(),
                convention: format!("layering violation: cycle {}", cycle.join(" -> ")),
                confidence: 1.0,
                evidence: cycle.len(),
                examples: cycle,
            })
            .collect()
    }

    /// Nearest artifacts to `path` by shared tags and kind, strongest first.
    pub fn similar(&self, path: &str, limit: usize) -> Result<Vec<PatternFinding>> {
        let target = self
            .model
            .artifact(path)
            .ok_or_else(|| ModelError::Query(format!("unknown artifact '{}'", path)))?;

        let mut scored: Vec<(usize, &str)> = self
            .model
            .instance
            .artifacts
            .values()
            .filter(|a| a.path != target.path)
            .filter_map(|a| {
                let shared = a.tags.intersection(&target.tags).count()
                    + usize::from(a.kind == target.kind);
                if shared == 0 {
                    None
                } else {
                    Some((shared, a.path.as_str()))
                }
            })
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
        scored.truncate(limit);

        let max_possible = target.tags.len() + 1;
        Ok(scored
            .into_iter()
            .map(|(shared, other)| PatternFinding {
                category: "similar".to_string(),
                convention: format!("{} resembles {}", other, path),
                confidence: shared as f64 / max_possible as f64,
                evidence: shared,
                examples: vec![other.to_string()],
            })
            .collect())
    }

    /// Cycles in the resolved dependency graph, found by iterative DFS with
    /// a color map. Each cycle is reported once, from its lexically smallest
    /// member.
    fn find_cycles(&self) -> Vec<Vec<String>> {
        let mut cycles: Vec<Vec<String>> = Vec::new();
        let mut done: HashSet<String> = HashSet::new();
        let mut reported: HashSet<Vec<String>> = HashSet::new();

        for start in self.model.instance.artifacts.keys() {
            if done.contains(start) {
                continue;
            }
            // stack of (node, next-neighbor-cursor); on_path tracks position
            let mut stack: Vec<(String, usize)> = vec![(start.clone(), 0)];
            let mut on_path: HashMap<String, usize> = HashMap::new();
            on_path.insert(start.clone(), 0);

            while let Some((current, cursor)) = stack.last().cloned() {
                let neighbors = self.model.neighbors(&current, Direction::Outgoing, None);
                if cursor >= neighbors.len() {
                    stack.pop();
                    on_path.remove(&current);
                    done.insert(current);
                    continue;
                }
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }
                let next = neighbors[cursor].to_string();
                if let Some(&pos) = on_path.get(&next) {
                    let mut cycle: Vec<String> =
                        stack[pos..].iter().map(|(n, _)| n.clone()).collect();
                    rotate_to_smallest(&mut cycle);
                    if reported.insert(cycle.clone()) {
                        cycles.push(cycle);
                    }
                } else if !done.contains(next.as_str()) {
                    on_path.insert(next.clone(), stack.len());
                    stack.push((next, 0));
                }
            }
        }
        cycles
    }
}

fn directory(path: &str) -> String {
    match path.rfind('/') {
        Some(idx) => path[..idx].to_string(),
        None => String::new(),
    }
}

fn display_dir(dir: &str) -> &str {
    if dir.is_empty() {
        "."
    } else {
        dir
    }
}

fn rotate_to_smallest(cycle: &mut Vec<String>) {
    if let Some(min_idx) = cycle
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.cmp(b.1))
        .map(|(i, _)| i)
    {
        cycle.rotate_left(min_idx);
    }
}
