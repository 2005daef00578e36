//! Cycle detection over the `blocks` dependency sub-graph. Only `blocks`
//! edges are fed in here; `related`/`discovered-from` never participate.

use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Debug, Default)]
pub struct DependencyGraph {
    nodes: Vec<String>,
    index_of: HashMap<String, usize>,
    edges: Vec<Vec<usize>>,
    incoming: Vec<Vec<usize>>,
}

impl DependencyGraph {
    /// Build from `(task_id, depends_on)` edges, where `task_id` is
    /// blocked until `depends_on` completes.
    pub fn from_edges(edges: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut graph = Self::default();
        let edges: Vec<(String, String)> = edges.into_iter().collect();
        for (task_id, depends_on) in &edges {
            graph.ensure_node(task_id);
            graph.ensure_node(depends_on);
        }
        graph.edges = vec![Vec::new(); graph.nodes.len()];
        graph.incoming = vec![Vec::new(); graph.nodes.len()];
        for (task_id, depends_on) in edges {
            let from = graph.index_of[&depends_on];
            let to = graph.index_of[&task_id];
            graph.edges[from].push(to);
            graph.incoming[to].push(from);
        }
        graph
    }

    fn ensure_node(&mut self, id: &str) {
        if !self.index_of.contains_key(id) {
            self.index_of.insert(id.to_string(), self.nodes.len());
            self.nodes.push(id.to_string());
        }
    }

    /// Would adding `task_id -> depends_on` (task_id blocked by depends_on)
    /// introduce a cycle? Checked before the edge is persisted.
    pub fn would_cycle(&self, task_id: &str, depends_on: &str) -> bool {
        if task_id == depends_on {
            return true;
        }
        // A cycle forms iff task_id is already reachable from depends_on's
        // perspective, i.e. depends_on transitively depends on task_id.
        let Some(&start) = self.index_of.get(depends_on) else { return false };
        let Some(&target) = self.index_of.get(task_id) else { return false };
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([start]);
        while let Some(node) = queue.pop_front() {
            if node == target {
                return true;
            }
            if !seen.insert(node) {
                continue;
            }
            for &next in &self.incoming[node] {
                queue.push_back(next);
            }
        }
        false
    }

    /// Detect a cycle using Kahn's algorithm (BFS topological reduction).
    /// Returns the task ids still carrying indegree after the traversal,
    /// i.e. the nodes participating in a cycle.
    pub fn cycle_nodes(&self) -> Option<Vec<String>> {
        let mut indegree: Vec<usize> = self.incoming.iter().map(Vec::len).collect();
        let mut queue: VecDeque<usize> = indegree
            .iter()
            .enumerate()
            .filter_map(|(i, &d)| (d == 0).then_some(i))
            .collect();
        let mut visited = 0usize;
        while let Some(node) = queue.pop_front() {
            visited += 1;
            for &next in &self.edges[node] {
                indegree[next] = indegree[next].saturating_sub(1);
                if indegree[next] == 0 {
                    queue.push_back(next);
                }
            }
        }
        if visited == self.nodes.len() {
            None
        } else {
            Some(
                indegree
                    .iter()
                    .enumerate()
                    .filter_map(|(i, &d)| (d > 0).then_some(self.nodes[i].clone()))
                    .collect(),
            )
        }
    }

    pub fn has_cycle(&self) -> bool {
        self.cycle_nodes().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_cycle_linear_chain() {
        let graph = DependencyGraph::from_edges([
            ("t3".to_string(), "t2".to_string()),
            ("t2".to_string(), "t1".to_string()),
        ]);
        assert!(!graph.has_cycle());
    }

    #[test]
    fn test_detects_cycle() {
        let graph = DependencyGraph::from_edges([
            ("t1".to_string(), "t2".to_string()),
            ("t2".to_string(), "t1".to_string()),
        ]);
        assert!(graph.has_cycle());
        let cycle = graph.cycle_nodes().unwrap();
        assert_eq!(cycle.len(), 2);
    }

    #[test]
    fn test_would_cycle_detects_before_insert() {
        let graph = DependencyGraph::from_edges([("t2".to_string(), "t1".to_string())]);
        // t1 blocks t2 already; adding "t1 blocks t2" (t1 depends_on t2) would cycle.
        assert!(graph.would_cycle("t1", "t2"));
        assert!(!graph.would_cycle("t3", "t1"));
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let graph = DependencyGraph::from_edges([("t1".to_string(), "t2".to_string())]);
        assert!(graph.would_cycle("t1", "t1"));
    }
}
