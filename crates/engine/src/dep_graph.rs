//! Dependency graph over cell names.
//!
//! Records which cells a formula reads (its dependees) and which
//! formulas read a given cell (its dependents), as a bidirectional
//! adjacency index for efficient queries in both directions.
//!
//! # Edge Direction
//!
//! ```text
//! (s, t)  means  "t depends on s"  (s must be evaluated before t)
//! ```
//!
//! This makes "what breaks if I change s?" trivial: follow `dependents`.

use rustc_hash::{FxHashMap, FxHashSet};

/// Bidirectional many-to-many dependency relation over cell names.
///
/// # Invariants
///
/// 1. **Mirror consistency:** t ∈ dependents[s] iff s ∈ dependees[t].
/// 2. **No dangling entries:** empty sets are removed, not stored.
/// 3. **No duplicate edges:** set semantics; `size` counts distinct edges.
///
/// Self-loops are legal data here. The recalculation pass reports them
/// as cycles when it orders cells; insertion never rejects them.
#[derive(Default, Debug, Clone)]
pub struct DependencyGraph {
    /// Forward index: for each cell s, the cells that depend on s.
    dependents: FxHashMap<String, FxHashSet<String>>,

    /// Reverse index: for each cell t, the cells t depends on.
    dependees: FxHashMap<String, FxHashSet<String>>,

    /// Number of distinct (s, t) edges.
    size: usize,
}

impl DependencyGraph {
    /// Create an empty dependency graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of edges in the graph.
    pub fn num_dependencies(&self) -> usize {
        self.size
    }

    /// Number of cells `t` depends on.
    pub fn num_dependees(&self, t: &str) -> usize {
        self.dependees.get(t).map_or(0, |set| set.len())
    }

    /// Returns true if at least one cell depends on `s`.
    pub fn has_dependents(&self, s: &str) -> bool {
        self.dependents.contains_key(s)
    }

    /// Returns true if `t` depends on at least one cell.
    pub fn has_dependees(&self, t: &str) -> bool {
        self.dependees.contains_key(t)
    }

    /// The cells that depend on `s`. Empty when `s` has no recorded
    /// edges; never an error. No ordering guarantee.
    pub fn dependents(&self, s: &str) -> impl Iterator<Item = &str> + '_ {
        self.dependents
            .get(s)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    /// The cells `t` depends on. Empty when `t` has no recorded edges;
    /// never an error. No ordering guarantee.
    pub fn dependees(&self, t: &str) -> impl Iterator<Item = &str> + '_ {
        self.dependees
            .get(t)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    /// Insert the edge (s, t). Idempotent: inserting an existing edge
    /// changes nothing, including the edge count.
    pub fn add_dependency(&mut self, s: &str, t: &str) {
        let inserted = self
            .dependents
            .entry(s.to_string())
            .or_default()
            .insert(t.to_string());
        if inserted {
            self.dependees
                .entry(t.to_string())
                .or_default()
                .insert(s.to_string());
            self.size += 1;
        }
    }

    /// Remove the edge (s, t). Idempotent no-op when absent.
    pub fn remove_dependency(&mut self, s: &str, t: &str) {
        let Some(deps) = self.dependents.get_mut(s) else {
            return;
        };
        if !deps.remove(t) {
            return;
        }
        // Clean up empty entries (invariant: no dangling)
        if deps.is_empty() {
            self.dependents.remove(s);
        }
        if let Some(dees) = self.dependees.get_mut(t) {
            dees.remove(s);
            if dees.is_empty() {
                self.dependees.remove(t);
            }
        }
        self.size -= 1;
    }

    /// Replace every edge (s, old_dependent) with (s, new_dependent) for
    /// the entries of `new_dependents`, atomically from the caller's
    /// point of view. Duplicates in the input collapse to one edge, and
    /// edges present in both the old and new sets are left untouched.
    pub fn replace_dependents(&mut self, s: &str, new_dependents: impl IntoIterator<Item = String>) {
        let new_set: FxHashSet<String> = new_dependents.into_iter().collect();

        let removed: Vec<String> = self
            .dependents(s)
            .filter(|t| !new_set.contains(*t))
            .map(str::to_string)
            .collect();
        for t in &removed {
            self.remove_dependency(s, t);
        }
        for t in &new_set {
            self.add_dependency(s, t);
        }
    }

    /// Symmetric to `replace_dependents`: rewrite the set of cells `t`
    /// depends on. This is the mutation the cell store uses when a
    /// cell's formula changes.
    pub fn replace_dependees(&mut self, t: &str, new_dependees: impl IntoIterator<Item = String>) {
        let new_set: FxHashSet<String> = new_dependees.into_iter().collect();

        let removed: Vec<String> = self
            .dependees(t)
            .filter(|s| !new_set.contains(*s))
            .map(str::to_string)
            .collect();
        for s in &removed {
            self.remove_dependency(s, t);
        }
        for s in &new_set {
            self.add_dependency(s, t);
        }
    }

    /// Check all invariants. Panics if any are violated.
    ///
    /// Only available in test builds.
    #[cfg(test)]
    pub fn assert_consistent(&self) {
        // Invariant 1: Mirror consistency (dependents → dependees)
        for (s, deps) in &self.dependents {
            for t in deps {
                assert!(
                    self.dependees.get(t).is_some_and(|set| set.contains(s)),
                    "missing reverse edge: {} should be in dependees of {}",
                    s,
                    t
                );
            }
        }

        // Invariant 1: Mirror consistency (dependees → dependents)
        for (t, dees) in &self.dependees {
            for s in dees {
                assert!(
                    self.dependents.get(s).is_some_and(|set| set.contains(t)),
                    "missing forward edge: {} should be in dependents of {}",
                    t,
                    s
                );
            }
        }

        // Invariant 2: No empty sets stored
        for (s, deps) in &self.dependents {
            assert!(!deps.is_empty(), "empty dependents set stored for {}", s);
        }
        for (t, dees) in &self.dependees {
            assert!(!dees.is_empty(), "empty dependees set stored for {}", t);
        }

        // Invariant 3: size matches the forward index
        let total: usize = self.dependents.values().map(|set| set.len()).sum();
        assert_eq!(self.size, total, "edge counter out of sync");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(iter: impl Iterator<Item = impl Into<String>>) -> Vec<String> {
        let mut v: Vec<String> = iter.map(Into::into).collect();
        v.sort();
        v
    }

    #[test]
    fn test_empty_graph() {
        let graph = DependencyGraph::new();

        assert_eq!(graph.num_dependencies(), 0);
        assert_eq!(graph.num_dependees("A1"), 0);
        assert!(!graph.has_dependents("A1"));
        assert!(!graph.has_dependees("A1"));
        assert_eq!(graph.dependents("A1").count(), 0);
        assert_eq!(graph.dependees("A1").count(), 0);

        graph.assert_consistent();
    }

    #[test]
    fn test_single_edge() {
        // B1 depends on A1
        let mut graph = DependencyGraph::new();
        graph.add_dependency("A1", "B1");
        graph.assert_consistent();

        assert_eq!(graph.num_dependencies(), 1);
        assert_eq!(names(graph.dependents("A1")), vec!["B1"]);
        assert_eq!(names(graph.dependees("B1")), vec!["A1"]);
        assert!(graph.has_dependents("A1"));
        assert!(graph.has_dependees("B1"));
        assert!(!graph.has_dependents("B1"));
        assert!(!graph.has_dependees("A1"));
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("A1", "B1");
        graph.add_dependency("A1", "B1");
        graph.assert_consistent();

        assert_eq!(graph.num_dependencies(), 1);
        assert_eq!(graph.dependents("A1").count(), 1);
    }

    #[test]
    fn test_remove_restores_pre_call_state() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("A1", "B1");
        let before_count = graph.num_dependencies();

        graph.add_dependency("X", "Y");
        graph.remove_dependency("X", "Y");
        graph.assert_consistent();

        assert_eq!(graph.num_dependencies(), before_count);
        assert_eq!(graph.dependents("X").count(), 0);
        assert_eq!(graph.dependees("Y").count(), 0);
        assert!(!graph.has_dependents("X"));
        assert!(!graph.has_dependees("Y"));
    }

    #[test]
    fn test_remove_absent_edge_is_noop() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("A1", "B1");

        graph.remove_dependency("A1", "C1");
        graph.remove_dependency("Z9", "B1");
        graph.assert_consistent();

        assert_eq!(graph.num_dependencies(), 1);
    }

    #[test]
    fn test_fan_out_and_fan_in() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("A1", "B1");
        graph.add_dependency("A1", "C1");
        graph.add_dependency("B1", "D1");
        graph.add_dependency("C1", "D1");
        graph.assert_consistent();

        assert_eq!(graph.num_dependencies(), 4);
        assert_eq!(names(graph.dependents("A1")), vec!["B1", "C1"]);
        assert_eq!(names(graph.dependees("D1")), vec!["B1", "C1"]);
        assert_eq!(graph.num_dependees("D1"), 2);
    }

    #[test]
    fn test_self_loop_is_legal_data() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("A1", "A1");
        graph.assert_consistent();

        assert_eq!(graph.num_dependencies(), 1);
        assert_eq!(names(graph.dependents("A1")), vec!["A1"]);
        assert_eq!(names(graph.dependees("A1")), vec!["A1"]);
    }

    #[test]
    fn test_replace_dependees() {
        // C1 = A1 + B1, then C1 = B1 + D1
        let mut graph = DependencyGraph::new();
        graph.replace_dependees("C1", ["A1".to_string(), "B1".to_string()]);
        graph.assert_consistent();
        assert_eq!(names(graph.dependees("C1")), vec!["A1", "B1"]);

        graph.replace_dependees("C1", ["B1".to_string(), "D1".to_string()]);
        graph.assert_consistent();

        assert_eq!(names(graph.dependees("C1")), vec!["B1", "D1"]);
        assert_eq!(graph.dependents("A1").count(), 0);
        assert_eq!(names(graph.dependents("D1")), vec!["C1"]);
        assert_eq!(graph.num_dependencies(), 2);
    }

    #[test]
    fn test_replace_dependees_with_empty_clears() {
        let mut graph = DependencyGraph::new();
        graph.replace_dependees("C1", ["A1".to_string(), "B1".to_string()]);

        graph.replace_dependees("C1", []);
        graph.assert_consistent();

        assert_eq!(graph.num_dependencies(), 0);
        assert!(!graph.has_dependees("C1"));
        assert!(!graph.has_dependents("A1"));
    }

    #[test]
    fn test_replace_dependents() {
        let mut graph = DependencyGraph::new();
        graph.replace_dependents("A1", ["B1".to_string(), "C1".to_string()]);
        graph.assert_consistent();
        assert_eq!(names(graph.dependents("A1")), vec!["B1", "C1"]);

        graph.replace_dependents("A1", ["C1".to_string(), "D1".to_string()]);
        graph.assert_consistent();

        assert_eq!(names(graph.dependents("A1")), vec!["C1", "D1"]);
        assert_eq!(graph.dependees("B1").count(), 0);
        assert_eq!(graph.num_dependencies(), 2);
    }

    #[test]
    fn test_replace_collapses_duplicates() {
        let mut graph = DependencyGraph::new();
        graph.replace_dependees(
            "C1",
            ["A1".to_string(), "A1".to_string(), "B1".to_string()],
        );
        graph.assert_consistent();

        assert_eq!(graph.num_dependencies(), 2);
        assert_eq!(graph.num_dependees("C1"), 2);
    }

    #[test]
    fn test_replace_keeps_overlapping_edges() {
        let mut graph = DependencyGraph::new();
        graph.replace_dependees("C1", ["A1".to_string(), "B1".to_string()]);

        // B1 survives the rewrite; only A1 leaves and D1 arrives.
        graph.replace_dependees("C1", ["B1".to_string(), "D1".to_string()]);
        graph.assert_consistent();

        assert_eq!(graph.num_dependencies(), 2);
        assert_eq!(names(graph.dependees("C1")), vec!["B1", "D1"]);
    }

    #[test]
    fn test_shared_dependee_untouched_by_other_cells() {
        // B1 and C1 both read A1; rewriting C1's dependees must not
        // disturb B1's edge.
        let mut graph = DependencyGraph::new();
        graph.replace_dependees("B1", ["A1".to_string()]);
        graph.replace_dependees("C1", ["A1".to_string()]);
        assert_eq!(graph.num_dependencies(), 2);

        graph.replace_dependees("C1", []);
        graph.assert_consistent();

        assert_eq!(names(graph.dependents("A1")), vec!["B1"]);
        assert_eq!(graph.num_dependencies(), 1);
    }
}
