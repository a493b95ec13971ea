//! Generic graph traversal over a loaded model: bounded walks, shortest
//! paths, and neighbor listings, parameterized by edge kind and direction.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use serde::Serialize;

use crate::error::{ModelError, Result};
use crate::explore::{Direction, LoadedModel};
use crate::model::{Dependency, DependencyKind};

/// Traversal direction, including the undirected view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Heading {
    Outgoing,
    Incoming,
    Both,
}

impl Heading {
    pub fn directions(self) -> &'static [Direction] {
        match self {
            Heading::Outgoing => &[Direction::Outgoing],
            Heading::Incoming => &[Direction::Incoming],
            Heading::Both => &[Direction::Outgoing, Direction::Incoming],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Bfs,
    Dfs,
}

#[derive(Debug, Clone)]
pub struct WalkRequest {
    pub start: String,
    pub heading: Heading,
    /// Edge kinds to follow; empty set follows all.
    pub kinds: BTreeSet<DependencyKind>,
    pub depth: usize,
    /// Maximum number of visited nodes, the start included.
    pub limit: usize,
    pub strategy: Strategy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalkNode {
    pub path: String,
    pub depth: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct NavPath {
    pub nodes: Vec<String>,
    pub edges: Vec<Dependency>,
}

pub struct Navigator<'a> {
    model: &'a LoadedModel,
}

impl<'a> Navigator<'a> {
    pub fn new(model: &'a LoadedModel) -> Self {
        Self { model }
    }

    /// Bounded traversal from `start`. BFS yields nodes in distance order;
    /// DFS in pre-order. Nodes are recorded when popped, not when
    /// discovered, so DFS emits a whole branch before its siblings.
    /// Neighbor expansion is sorted so both orders are deterministic.
    pub fn walk(&self, request: &WalkRequest) -> Result<Vec<WalkNode>> {
        self.require(&request.start)?;

        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(request.start.clone());
        let mut out: Vec<WalkNode> = Vec::new();

        // One deque serves both strategies: BFS pops the front, DFS the back.
        let mut pending: VecDeque<(String, usize)> = VecDeque::new();
        pending.push_back((request.start.clone(), 0));

        while let Some((current, depth)) = match request.strategy {
            Strategy::Bfs => pending.pop_front(),
            Strategy::Dfs => pending.pop_back(),
        } {
            out.push(WalkNode {
                path: current.clone(),
                depth,
            });
            if out.len() >= request.limit {
                return Ok(out);
            }
            if depth >= request.depth {
                continue;
            }
            let neighbors = self.adjacent(&current, request.heading, &request.kinds);
            // DFS pushes in reverse so the lexically first neighbor pops first.
            let ordered: Box<dyn Iterator<Item = &String>> = match request.strategy {
                Strategy::Bfs => Box::new(neighbors.iter()),
                Strategy::Dfs => Box::new(neighbors.iter().rev()),
            };
            for next in ordered {
                if visited.insert(next.clone()) {
                    pending.push_back((next.clone(), depth + 1));
                }
            }
        }

        Ok(out)
    }

    /// Shortest path between two artifacts by edge count over the undirected
    /// view, found with a bidirectional level-synchronized BFS. Ties break
    /// toward the lexically smallest meeting node. `None` when the artifacts
    /// are disconnected.
    pub fn path(&self, from: &str, to: &str) -> Result<Option<NavPath>> {
        self.require(from)?;
        self.require(to)?;
        if from == to {
            return Ok(Some(NavPath {
                nodes: vec![from.to_string()],
                edges: Vec::new(),
            }));
        }

        let kinds = BTreeSet::new();
        let mut side_a = Frontier::new(from);
        let mut side_b = Frontier::new(to);
        // (combined length, meeting node); kept minimal.
        let mut best: Option<(usize, String)> = None;

        loop {
            // A meet found later must pass through a node at least one level
            // beyond the shallower search, so once the best found path is no
            // longer than that bound it is the shortest.
            if let Some((len, _)) = &best {
                if *len <= side_a.level.min(side_b.level) + 1 {
                    break;
                }
            }
            if side_a.frontier.is_empty() && side_b.frontier.is_empty() {
                break;
            }

            // Expand the smaller non-exhausted frontier.
            let (expanding, other) =
                if !side_a.frontier.is_empty()
                    && (side_b.frontier.is_empty() || side_a.frontier.len() <= side_b.frontier.len())
                {
                    (&mut side_a, &side_b)
                } else {
                    (&mut side_b, &side_a)
                };

            expanding.level += 1;
            let mut next_frontier: Vec<String> = Vec::new();
            for current in std::mem::take(&mut expanding.frontier) {
                for neighbor in self.adjacent(&current, Heading::Both, &kinds) {
                    if expanding.dist.contains_key(&neighbor) {
                        continue;
                    }
                    expanding.dist.insert(neighbor.clone(), expanding.level);
                    expanding.parent.insert(neighbor.clone(), current.clone());
                    if let Some(other_dist) = other.dist.get(&neighbor) {
                        let len = expanding.level + other_dist;
                        let candidate = (len, neighbor.clone());
                        if best.as_ref().map_or(true, |b| candidate < *b) {
                            best = Some(candidate);
                        }
                    }
                    next_frontier.push(neighbor);
                }
            }
            next_frontier.sort();
            next_frontier.dedup();
            expanding.frontier = next_frontier;
        }

        let Some((_, meet)) = best else {
            return Ok(None);
        };
        let mut nodes = side_a.chain_to_root(&meet);
        nodes.reverse();
        let mut tail = side_b.chain_to_root(&meet);
        tail.remove(0); // meet already present
        nodes.extend(tail);

        let edges = self.edges_along(&nodes);
        Ok(Some(NavPath { nodes, edges }))
    }

    /// Immediate adjacency with direction and kind filter.
    pub fn neighbors(
        &self,
        path: &str,
        heading: Heading,
        kind: Option<DependencyKind>,
    ) -> Result<Vec<String>> {
        self.require(path)?;
        let kinds: BTreeSet<DependencyKind> = kind.into_iter().collect();
        Ok(self.adjacent(path, heading, &kinds))
    }

    fn require(&self, path: &str) -> Result<()> {
        if self.model.artifact(path).is_none() {
            return Err(ModelError::Query(format!("unknown artifact '{}'", path)));
        }
        Ok(())
    }

    /// Sorted, deduplicated resolved neighbors.
    fn adjacent(&self, path: &str, heading: Heading, kinds: &BTreeSet<DependencyKind>) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for &direction in heading.directions() {
            for dep in self.model.dependencies(path, direction, None) {
                if !kinds.is_empty() && !kinds.contains(&dep.kind) {
                    continue;
                }
                let next = match direction {
                    Direction::Outgoing => dep.to.resolved_path(),
                    Direction::Incoming => Some(dep.from.as_str()),
                };
                if let Some(next) = next {
                    out.push(next.to_string());
                }
            }
        }
        out.sort();
        out.dedup();
        out
    }

    /// Concrete edge for each consecutive node pair, whichever direction the
    /// underlying dependency points. Picks the lexically first edge when
    /// several connect the same pair.
    fn edges_along(&self, nodes: &[String]) -> Vec<Dependency> {
        let mut edges = Vec::new();
        for pair in nodes.windows(2) {
            let (u, v) = (&pair[0], &pair[1]);
            let mut candidates: Vec<&Dependency> = self
                .model
                .dependencies(u, Direction::Outgoing, None)
                .into_iter()
                .filter(|d| d.to.resolved_path() == Some(v.as_str()))
                .chain(
                    self.model
                        .dependencies(u, Direction::Incoming, None)
                        .into_iter()
                        .filter(|d| &d.from == v),
                )
                .collect();
            candidates.sort_by_key(|d| (d.kind, d.from.clone()));
            if let Some(edge) = candidates.first() {
                edges.push((*edge).clone());
            }
        }
        edges
    }
}

/// One side of the bidirectional search. `dist` doubles as the visited set.
struct Frontier {
    frontier: Vec<String>,
    level: usize,
    dist: HashMap<String, usize>,
    parent: HashMap<String, String>,
}

impl Frontier {
    fn new(root: &str) -> Self {
        let mut dist = HashMap::new();
        dist.insert(root.to_string(), 0);
        Self {
            frontier: vec![root.to_string()],
            level: 0,
            dist,
            parent: HashMap::new(),
        }
    }

    /// Nodes from `node` back to this side's root, inclusive. The root has
    /// no parent entry, which terminates the walk.
    fn chain_to_root(&self, node: &str) -> Vec<String> {
        let mut chain = vec![node.to_string()];
        let mut current = node.to_string();
        while let Some(p) = self.parent.get(&current) {
            chain.push(p.clone());
            current = p.clone();
        }
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Artifact, Instance, Schema, MODULE_TYPE};

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

    fn chain() -> LoadedModel {
        model(&[
            ("a.ts", "b.ts", DependencyKind::Import),
            ("b.ts", "c.ts", DependencyKind::Import),
            ("c.ts", "d.ts", DependencyKind::Call),
        ])
    }

    fn walk_request(start: &str) -> WalkRequest {
        WalkRequest {
            start: start.to_string(),
            heading: Heading::Outgoing,
            kinds: BTreeSet::new(),
            depth: 10,
            limit: 100,
            strategy: Strategy::Bfs,
        }
    }

    #[test]
    fn test_walk_bfs_distance_order() {
        let m = chain();
        let nodes = Navigator::new(&m).walk(&walk_request("a.ts")).unwrap();
        let paths: Vec<_> = nodes.iter().map(|n| n.path.as_str()).collect();
        assert_eq!(paths, vec!["a.ts", "b.ts", "c.ts", "d.ts"]);
        assert_eq!(nodes[3].depth, 3);
    }

    #[test]
    fn test_walk_depth_and_limit() {
        let m = chain();
        let navigator = Navigator::new(&m);

        let mut request = walk_request("a.ts");
        request.depth = 1;
        let shallow = navigator.walk(&request).unwrap();
        assert_eq!(shallow.len(), 2);

        let mut request = walk_request("a.ts");
        request.limit = 3;
        let capped = navigator.walk(&request).unwrap();
        assert_eq!(capped.len(), 3);
    }

    #[test]
    fn test_walk_dfs_finishes_branch_before_sibling() {
        // a fans out to b and e; b leads on to c
        let m = model(&[
            ("a.ts", "b.ts", DependencyKind::Import),
            ("a.ts", "e.ts", DependencyKind::Import),
            ("b.ts", "c.ts", DependencyKind::Import),
        ]);
        let mut request = walk_request("a.ts");
        request.strategy = Strategy::Dfs;
        let nodes = Navigator::new(&m).walk(&request).unwrap();
        let paths: Vec<_> = nodes.iter().map(|n| n.path.as_str()).collect();
        assert_eq!(paths, vec!["a.ts", "b.ts", "c.ts", "e.ts"]);
    }

    #[test]
    fn test_walk_kind_filter() {
        let m = chain();
        let mut request = walk_request("a.ts");
        request.kinds.insert(DependencyKind::Import);
        let nodes = Navigator::new(&m).walk(&request).unwrap();
        // the call edge c -> d is not followed
        let paths: Vec<_> = nodes.iter().map(|n| n.path.as_str()).collect();
        assert_eq!(paths, vec!["a.ts", "b.ts", "c.ts"]);
    }

    #[test]
    fn test_walk_incoming() {
        let m = chain();
        let mut request = walk_request("d.ts");
        request.heading = Heading::Incoming;
        let nodes = Navigator::new(&m).walk(&request).unwrap();
        assert_eq!(nodes.len(), 4);
    }

    #[test]
    fn test_path_shortest_and_symmetric() {
        // two routes a->d: through b,c (3 edges) and direct (1 edge)
        let m = model(&[
            ("a.ts", "b.ts", DependencyKind::Import),
            ("b.ts", "c.ts", DependencyKind::Import),
            ("c.ts", "d.ts", DependencyKind::Import),
            ("a.ts", "d.ts", DependencyKind::Call),
        ]);
        let navigator = Navigator::new(&m);

        let forward = navigator.path("a.ts", "d.ts").unwrap().unwrap();
        let backward = navigator.path("d.ts", "a.ts").unwrap().unwrap();
        assert_eq!(forward.nodes, vec!["a.ts", "d.ts"]);
        assert_eq!(forward.edges.len(), 1);
        assert_eq!(forward.nodes.len(), backward.nodes.len());
    }

    #[test]
    fn test_path_ignores_edge_direction() {
        // both edges point away from b; undirected view still connects a and c
        let m = model(&[
            ("b.ts", "a.ts", DependencyKind::Import),
            ("b.ts", "c.ts", DependencyKind::Import),
        ]);
        let p = Navigator::new(&m).path("a.ts", "c.ts").unwrap().unwrap();
        assert_eq!(p.nodes, vec!["a.ts", "b.ts", "c.ts"]);
        assert_eq!(p.edges.len(), 2);
    }

    #[test]
    fn test_path_disconnected() {
        let m = model(&[
            ("a.ts", "b.ts", DependencyKind::Import),
            ("x.ts", "y.ts", DependencyKind::Import),
        ]);
        assert!(Navigator::new(&m).path("a.ts", "y.ts").unwrap().is_none());
    }

    #[test]
    fn test_path_trivial() {
        let m = chain();
        let p = Navigator::new(&m).path("a.ts", "a.ts").unwrap().unwrap();
        assert_eq!(p.nodes, vec!["a.ts"]);
        assert!(p.edges.is_empty());
    }

    #[test]
    fn test_neighbors_with_kind() {
        let m = chain();
        let navigator = Navigator::new(&m);
        let all = navigator.neighbors("c.ts", Heading::Both, None).unwrap();
        assert_eq!(all, vec!["b.ts", "d.ts"]);
        let calls = navigator
            .neighbors("c.ts", Heading::Both, Some(DependencyKind::Call))
            .unwrap();
        assert_eq!(calls, vec!["d.ts"]);
    }

    #[test]
    fn test_unknown_artifact_is_query_error() {
        let m = chain();
        let err = Navigator::new(&m).path("a.ts", "ghost.ts").unwrap_err();
        assert!(matches!(err, ModelError::Query(_)));
    }
}
