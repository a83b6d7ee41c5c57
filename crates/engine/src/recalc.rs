//! Dependency-ordered recalculation planning.
//!
//! Given the cell that changed, walks "dependents of" edges to produce
//! the order in which affected cells must be re-evaluated, detecting
//! circular references along the way. Evaluation itself lives in the
//! cell store; this module only decides who runs, and when.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::dep_graph::DependencyGraph;

/// Error raised when a mutation would make a cell's value depend,
/// directly or transitively, on itself.
///
/// By the time the caller sees this, the mutation that caused it has
/// been fully rolled back.
#[derive(Debug, Clone)]
pub struct CycleError {
    /// Cells participating in the cycle, in path order.
    pub cells: Vec<String>,

    /// Human-readable description of the cycle.
    pub message: String,
}

impl CycleError {
    /// Build a report for a cycle along `cells` (the first cell is also
    /// the one the closing edge returns to).
    pub fn cycle(cells: Vec<String>) -> Self {
        let message = if cells.len() == 1 {
            format!("cell {} references itself", cells[0])
        } else if cells.len() <= 5 {
            format!("circular reference: {} → {}", cells.join(" → "), cells[0])
        } else {
            format!(
                "circular reference involving {} cells: {} → ... → {}",
                cells.len(),
                cells[0],
                cells[cells.len() - 1]
            )
        };
        Self { cells, message }
    }
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CycleError {}

/// DFS colouring: present-and-in-progress or present-and-finished.
#[derive(Clone, Copy, PartialEq)]
enum Mark {
    InProgress,
    Done,
}

/// Compute the recalculation order for everything reachable from
/// `start`.
///
/// Returns `start` followed by its transitive dependents, such that
/// every cell appears after all cells it depends on (reverse postorder
/// of the dependents walk); in the trivial case the result is just
/// `[start]`. Dependents are visited in lexicographic order, so the
/// result is deterministic even though any topological order would
/// yield the same final values.
///
/// A back-edge to a cell still in progress is a circular reference:
/// the walk aborts and the cycle path is reported.
pub fn recalc_order(graph: &DependencyGraph, start: &str) -> Result<Vec<String>, CycleError> {
    struct Frame {
        cell: String,
        neighbours: Vec<String>,
        next_idx: usize,
    }

    let sorted_dependents = |cell: &str| -> Vec<String> {
        let mut neighbours: Vec<String> = graph.dependents(cell).map(str::to_string).collect();
        neighbours.sort();
        neighbours
    };

    let mut marks: FxHashMap<String, Mark> = FxHashMap::default();
    let mut postorder: Vec<String> = Vec::new();

    marks.insert(start.to_string(), Mark::InProgress);
    let mut stack = vec![Frame {
        cell: start.to_string(),
        neighbours: sorted_dependents(start),
        next_idx: 0,
    }];

    while let Some(frame) = stack.last_mut() {
        if frame.next_idx < frame.neighbours.len() {
            let w = frame.neighbours[frame.next_idx].clone();
            frame.next_idx += 1;

            match marks.get(&w) {
                Some(Mark::InProgress) => {
                    // Back-edge: the frames from w to the top of the
                    // stack spell out the cycle path.
                    let cells: Vec<String> = stack
                        .iter()
                        .skip_while(|f| f.cell != w)
                        .map(|f| f.cell.clone())
                        .collect();
                    return Err(CycleError::cycle(cells));
                }
                Some(Mark::Done) => {}
                None => {
                    marks.insert(w.clone(), Mark::InProgress);
                    let neighbours = sorted_dependents(&w);
                    stack.push(Frame {
                        cell: w,
                        neighbours,
                        next_idx: 0,
                    });
                }
            }
        } else {
            // All dependents explored — finish this cell.
            let finished = stack.pop().expect("frame checked by last_mut");
            marks.insert(finished.cell.clone(), Mark::Done);
            postorder.push(finished.cell);
        }
    }

    // Reverse postorder puts every cell before its dependents, which
    // puts `start` first.
    postorder.reverse();
    Ok(postorder)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(&str, &str)]) -> DependencyGraph {
        let mut g = DependencyGraph::new();
        for (s, t) in edges {
            g.add_dependency(s, t);
        }
        g
    }

    fn position(order: &[String], cell: &str) -> usize {
        order.iter().position(|c| c == cell).unwrap()
    }

    #[test]
    fn test_isolated_cell_is_self_only() {
        let g = DependencyGraph::new();
        let order = recalc_order(&g, "A1").unwrap();
        assert_eq!(order, vec!["A1"]);
    }

    #[test]
    fn test_start_is_always_first() {
        let g = graph(&[("A1", "B1"), ("B1", "C1")]);
        let order = recalc_order(&g, "A1").unwrap();
        assert_eq!(order[0], "A1");
    }

    #[test]
    fn test_chain_order() {
        let g = graph(&[("A1", "B1"), ("B1", "C1"), ("C1", "D1")]);
        let order = recalc_order(&g, "A1").unwrap();
        assert_eq!(order, vec!["A1", "B1", "C1", "D1"]);
    }

    #[test]
    fn test_only_reachable_cells_included() {
        let g = graph(&[("A1", "B1"), ("X1", "Y1")]);
        let order = recalc_order(&g, "A1").unwrap();
        assert_eq!(order, vec!["A1", "B1"]);
    }

    #[test]
    fn test_diamond_respects_dependencies() {
        //     A1
        //    /  \
        //   B1   C1
        //    \  /
        //     D1
        let g = graph(&[("A1", "B1"), ("A1", "C1"), ("B1", "D1"), ("C1", "D1")]);
        let order = recalc_order(&g, "A1").unwrap();

        assert_eq!(order.len(), 4);
        assert!(position(&order, "A1") < position(&order, "B1"));
        assert!(position(&order, "A1") < position(&order, "C1"));
        assert!(position(&order, "B1") < position(&order, "D1"));
        assert!(position(&order, "C1") < position(&order, "D1"));
    }

    #[test]
    fn test_deterministic_tie_break() {
        let g = graph(&[("A1", "C1"), ("A1", "B1"), ("A1", "D1")]);
        let order = recalc_order(&g, "A1").unwrap();
        assert_eq!(order, vec!["A1", "B1", "C1", "D1"]);

        let again = recalc_order(&g, "A1").unwrap();
        assert_eq!(order, again);
    }

    #[test]
    fn test_self_loop_is_a_cycle() {
        let g = graph(&[("A1", "A1")]);
        let err = recalc_order(&g, "A1").unwrap_err();
        assert!(err.message.contains("references itself"));
        assert_eq!(err.cells, vec!["A1"]);
    }

    #[test]
    fn test_two_cell_cycle() {
        let g = graph(&[("A1", "B1"), ("B1", "A1")]);
        let err = recalc_order(&g, "A1").unwrap_err();
        assert!(err.message.contains("circular reference"));
        assert!(err.cells.contains(&"A1".to_string()));
        assert!(err.cells.contains(&"B1".to_string()));
    }

    #[test]
    fn test_cycle_beyond_the_start_cell() {
        // A1 feeds a cycle between B1 and C1.
        let g = graph(&[("A1", "B1"), ("B1", "C1"), ("C1", "B1")]);
        let err = recalc_order(&g, "A1").unwrap_err();
        assert!(err.cells.contains(&"B1".to_string()));
        assert!(err.cells.contains(&"C1".to_string()));
    }

    #[test]
    fn test_shared_downstream_visited_once() {
        // D1 is reachable through both branches but appears once.
        let g = graph(&[("A1", "B1"), ("A1", "C1"), ("B1", "D1"), ("C1", "D1")]);
        let order = recalc_order(&g, "A1").unwrap();
        assert_eq!(
            order.iter().filter(|c| c.as_str() == "D1").count(),
            1
        );
    }
}
