//! Pluggable rules for choosing which edge a simulation descends through.

use std::fmt::Debug;

/// Read-only view of the node a selection is being made at.
#[derive(Debug, Clone, Copy)]
pub struct NodeStats {
    pub visit_count: u32,
    pub to_play: usize,
    pub is_root: bool,
}

/// Read-only view of one candidate edge.
#[derive(Debug, Clone, Copy)]
pub struct EdgeStats {
    /// Position of the edge in the node's legal-action order.
    pub index: usize,
    pub prior: f32,
    pub visit_count: u32,
    /// Mean backed-up value for the node's player to act (0.0 if unvisited).
    pub value: f32,
}

/// Picks one of `edges` to descend through.
///
/// Returns a position into `edges`, or `None` if the slice is empty.
pub trait SelectionRule: Send + Sync + Debug {
    fn select(&self, node: &NodeStats, edges: &[EdgeStats], exploration_bias: f32) -> Option<usize>;
}

/// AlphaZero-style PUCT:
/// `value + c * prior * sqrt(N_parent) / (1 + N_edge)`.
///
/// Ties go to the earliest edge.
#[derive(Debug, Clone, Copy, Default)]
pub struct Puct;

impl Puct {
    #[inline]
    pub fn score(edge: &EdgeStats, parent_visits_sqrt: f32, exploration_bias: f32) -> f32 {
        let u =
            exploration_bias * edge.prior * parent_visits_sqrt / (1.0 + edge.visit_count as f32);
        edge.value + u
    }
}

impl SelectionRule for Puct {
    fn select(
        &self,
        node: &NodeStats,
        edges: &[EdgeStats],
        exploration_bias: f32,
    ) -> Option<usize> {
        // Pre-compute sqrt once instead of per-edge
        let parent_visits_sqrt = (node.visit_count.max(1) as f32).sqrt();

        let mut best: Option<(usize, f32)> = None;
        for (pos, edge) in edges.iter().enumerate() {
            let score = Self::score(edge, parent_visits_sqrt, exploration_bias);
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((pos, score)),
            }
        }
        best.map(|(pos, _)| pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(index: usize, prior: f32, visit_count: u32, value: f32) -> EdgeStats {
        EdgeStats {
            index,
            prior,
            visit_count,
            value,
        }
    }

    fn node(visit_count: u32) -> NodeStats {
        NodeStats {
            visit_count,
            to_play: 0,
            is_root: false,
        }
    }

    #[test]
    fn test_prior_dominates_when_unvisited() {
        let edges = [edge(0, 0.3, 0, 0.0), edge(1, 0.7, 0, 0.0)];
        assert_eq!(Puct.select(&node(1), &edges, 1.0), Some(1));
    }

    #[test]
    fn test_value_dominates_without_exploration() {
        let edges = [edge(0, 0.9, 10, 0.1), edge(1, 0.1, 10, 0.5)];
        assert_eq!(Puct.select(&node(20), &edges, 0.0), Some(1));
    }

    #[test]
    fn test_ties_go_to_first() {
        let edges = [edge(0, 0.5, 1, 0.2), edge(1, 0.5, 1, 0.2)];
        assert_eq!(Puct.select(&node(2), &edges, 1.0), Some(0));
    }

    #[test]
    fn test_empty_edges() {
        assert_eq!(Puct.select(&node(0), &[], 1.0), None);
    }

    #[test]
    fn test_visits_reduce_exploration_bonus() {
        let fresh = Puct::score(&edge(0, 0.5, 0, 0.0), 2.0, 1.0);
        let visited = Puct::score(&edge(0, 0.5, 3, 0.0), 2.0, 1.0);
        assert!((fresh - 1.0).abs() < 1e-6);
        assert!((visited - 0.25).abs() < 1e-6);
    }
}
