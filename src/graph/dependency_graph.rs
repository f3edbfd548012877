//! Dependency graph over resource IDs.
//!
//! An edge `source → target` means *source depends on target*: the target has
//! to be applied and ready before the source. The graph provides a fully
//! deterministic topological order and, when that is impossible, the
//! deduplicated set of cycles for diagnostics.

use anyhow::Result;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;

use crate::core::{ChartGraphError, Resource};

/// A resource registered in the graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DependencyNode {
    /// Assigned resource ID
    pub id: String,
    /// `Kind/name` of the resource
    pub qualified_name: String,
}

impl fmt::Display for DependencyNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.qualified_name)
    }
}

/// Color states for cycle detection using DFS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// Node has not been visited.
    White,
    /// Node is on the current DFS path.
    Gray,
    /// Node and everything reachable from it has been visited.
    Black,
}

/// Directed dependency graph keyed by resource ID.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<DependencyNode, ()>,
    node_map: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource under `id`. Registering an ID twice is a no-op.
    pub fn add_node(&mut self, id: &str, resource: &Resource) {
        if self.node_map.contains_key(id) {
            return;
        }
        let index = self.graph.add_node(DependencyNode {
            id: id.to_string(),
            qualified_name: resource.qualified_name(),
        });
        self.node_map.insert(id.to_string(), index);
    }

    /// Record that `source` depends on `target`.
    ///
    /// Self-edges, edges touching unregistered nodes and duplicate edges are
    /// ignored. Returns whether a new edge was added.
    pub fn add_edge(&mut self, source: &str, target: &str) -> bool {
        if source == target {
            return false;
        }
        let (Some(&from), Some(&to)) = (self.node_map.get(source), self.node_map.get(target))
        else {
            tracing::trace!("Ignoring edge {} -> {}: unregistered node", source, target);
            return false;
        };
        if self.graph.contains_edge(from, to) {
            return false;
        }
        self.graph.add_edge(from, to, ());
        true
    }

    /// Whether `id` is registered.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.node_map.contains_key(id)
    }

    /// Direct dependencies of `id`, sorted.
    #[must_use]
    pub fn dependencies_of(&self, id: &str) -> Vec<String> {
        self.neighbors_sorted(id, Direction::Outgoing)
    }

    /// Resources that directly depend on `id`, sorted.
    #[must_use]
    pub fn dependents_of(&self, id: &str) -> Vec<String> {
        self.neighbors_sorted(id, Direction::Incoming)
    }

    fn neighbors_sorted(&self, id: &str, direction: Direction) -> Vec<String> {
        let Some(&index) = self.node_map.get(id) else {
            return Vec::new();
        };
        let mut ids: Vec<String> = self
            .graph
            .neighbors_directed(index, direction)
            .map(|n| self.graph[n].id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Every resource `id` depends on, directly or indirectly.
    #[must_use]
    pub fn transitive_dependencies(&self, id: &str) -> BTreeSet<String> {
        let mut deps = BTreeSet::new();
        let mut queue = VecDeque::new();

        if let Some(&start) = self.node_map.get(id) {
            queue.push_back(start);
            while let Some(current) = queue.pop_front() {
                for neighbor in self.graph.neighbors(current) {
                    if deps.insert(self.graph[neighbor].id.clone()) {
                        queue.push_back(neighbor);
                    }
                }
            }
        }

        deps.remove(id);
        deps
    }

    /// The registered node for `id`.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&DependencyNode> {
        self.node_map.get(id).map(|&i| &self.graph[i])
    }

    /// All node IDs, sorted.
    #[must_use]
    pub fn nodes(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.node_map.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// All edges as `(source, target)` pairs, sorted.
    #[must_use]
    pub fn edges(&self) -> Vec<(String, String)> {
        let mut edges: Vec<(String, String)> = self
            .graph
            .edge_indices()
            .filter_map(|e| self.graph.edge_endpoints(e))
            .map(|(a, b)| (self.graph[a].id.clone(), self.graph[b].id.clone()))
            .collect();
        edges.sort();
        edges
    }

    /// Check if the graph is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Get the total number of nodes in the graph.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Get the total number of edges (dependencies) in the graph.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Order the resources so every dependency precedes its dependents.
    ///
    /// Kahn's algorithm over the reversed relation: a node becomes ready once
    /// all of its dependencies were emitted. The ready queue is kept sorted
    /// (seeded alphabetically, newly ready nodes inserted by binary search), so
    /// ties always resolve alphabetically.
    ///
    /// # Errors
    ///
    /// Returns [`ChartGraphError::TopologicalSortFailed`] when a cycle keeps
    /// some nodes from ever becoming ready; use [`Self::detect_cycles`] to
    /// find out which.
    pub fn topological_sort(&self) -> Result<Vec<String>> {
        let mut in_degree: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|n| (n, self.graph.neighbors_directed(n, Direction::Outgoing).count()))
            .collect();

        let mut ready: Vec<String> = in_degree
            .iter()
            .filter(|&(_, &deg)| deg == 0)
            .map(|(&n, _)| self.graph[n].id.clone())
            .collect();
        ready.sort();
        let mut queue: VecDeque<String> = ready.into();

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some(id) = queue.pop_front() {
            let index = self.node_map[&id];
            for dependent in self.graph.neighbors_directed(index, Direction::Incoming) {
                let Some(deg) = in_degree.get_mut(&dependent) else {
                    continue;
                };
                *deg -= 1;
                if *deg == 0 {
                    let dependent_id = self.graph[dependent].id.clone();
                    let position = queue.binary_search(&dependent_id).unwrap_or_else(|p| p);
                    queue.insert(position, dependent_id);
                }
            }
            order.push(id);
        }

        if order.len() != self.graph.node_count() {
            return Err(ChartGraphError::TopologicalSortFailed {
                ordered: order.len(),
                total: self.graph.node_count(),
            }
            .into());
        }
        Ok(order)
    }

    /// Find the cycles in the graph.
    ///
    /// A DFS is started from every node (in sorted order); whenever it meets a
    /// node already on the current path, the cycle is cut out of the path. A
    /// cycle found from several starting nodes is reported once: each cycle is
    /// rotated to begin at its smallest ID and deduplicated on that sequence.
    ///
    /// Returns an empty vector for an acyclic graph.
    #[must_use]
    pub fn detect_cycles(&self) -> Vec<Vec<String>> {
        let mut seen: HashSet<Vec<String>> = HashSet::new();
        let mut cycles = Vec::new();

        for start in self.sorted_indices() {
            let mut colors: HashMap<NodeIndex, Color> =
                self.graph.node_indices().map(|n| (n, Color::White)).collect();
            let mut path = Vec::new();
            self.dfs_visit(start, &mut colors, &mut path, &mut |cycle| {
                let normalized = normalize_cycle(cycle);
                if seen.insert(normalized.clone()) {
                    cycles.push(normalized);
                }
            });
        }

        cycles.sort();
        cycles
    }

    fn sorted_indices(&self) -> Vec<NodeIndex> {
        let mut indices: Vec<NodeIndex> = self.graph.node_indices().collect();
        indices.sort_by(|a, b| self.graph[*a].id.cmp(&self.graph[*b].id));
        indices
    }

    fn sorted_neighbors(&self, node: NodeIndex) -> Vec<NodeIndex> {
        let mut neighbors: Vec<NodeIndex> = self.graph.neighbors(node).collect();
        neighbors.sort_by(|a, b| self.graph[*a].id.cmp(&self.graph[*b].id));
        neighbors
    }

    fn dfs_visit(
        &self,
        node: NodeIndex,
        colors: &mut HashMap<NodeIndex, Color>,
        path: &mut Vec<NodeIndex>,
        on_cycle: &mut dyn FnMut(Vec<String>),
    ) {
        colors.insert(node, Color::Gray);
        path.push(node);

        for neighbor in self.sorted_neighbors(node) {
            match colors.get(&neighbor) {
                Some(Color::Gray) => {
                    if let Some(start) = path.iter().position(|n| *n == neighbor) {
                        on_cycle(path[start..].iter().map(|n| self.graph[*n].id.clone()).collect());
                    }
                }
                Some(Color::White) => self.dfs_visit(neighbor, colors, path, on_cycle),
                _ => {}
            }
        }

        path.pop();
        colors.insert(node, Color::Black);
    }
}

/// Rotate a cycle so its lexicographically smallest node comes first.
fn normalize_cycle(mut cycle: Vec<String>) -> Vec<String> {
    if let Some((min_pos, _)) = cycle.iter().enumerate().min_by(|a, b| a.1.cmp(b.1)) {
        cycle.rotate_left(min_pos);
    }
    cycle
}
