//! MCTS tree node representation.
//!
//! A node is a decision point: it stores the game state snapshot, the player
//! to act, and one [`ActionEdge`] per legal action once expanded. Chance is
//! modeled on the edges: taking an action can lead to several child nodes,
//! one per observed chance outcome.

/// Index into the node arena. Using a newtype for type safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

/// A chance outcome observed under an action edge.
#[derive(Debug, Clone)]
pub struct ChanceOutcome<K> {
    /// Key identifying the outcome.
    pub key: K,
    /// Node reached when this outcome occurs.
    pub child: NodeId,
    /// Times this outcome (or a key folded into it) was drawn.
    pub count: u32,
}

/// Statistics for one legal action of a node.
#[derive(Debug, Clone)]
pub struct ActionEdge<A, K> {
    pub action: A,

    /// Prior probability from the policy (or the default prior).
    pub prior: f32,

    /// Number of simulations that went through this edge.
    pub visit_count: u32,

    /// Running average of backed-up values, one entry per player.
    /// Empty until the first visit.
    pub values: Vec<f32>,

    /// Distinct chance outcomes seen so far, capped by configuration.
    pub outcomes: Vec<ChanceOutcome<K>>,
}

impl<A, K> ActionEdge<A, K> {
    pub fn new(action: A, prior: f32) -> Self {
        Self {
            action,
            prior,
            visit_count: 0,
            values: Vec::new(),
            outcomes: Vec::new(),
        }
    }

    /// Mean value for `player`. Returns 0.0 if never visited.
    #[inline]
    pub fn mean_value(&self, player: usize) -> f32 {
        self.values.get(player).copied().unwrap_or(0.0)
    }

    /// Fold `count` samples of `values` into the running average.
    pub fn record(&mut self, values: &[f32], count: u32) {
        blend_average(&mut self.values, self.visit_count, values, count);
        self.visit_count += count;
    }
}

/// A node in the MCTS tree.
#[derive(Debug, Clone)]
pub struct MctsNode<S, A, K> {
    /// Game state snapshot at this node.
    pub state: S,

    /// Seat to act. Meaningless for terminal nodes.
    pub to_play: usize,

    /// Number of times this node has been visited.
    pub visit_count: u32,

    /// Running average of backed-up values, one entry per player.
    pub values: Vec<f32>,

    /// Final per-player values if the state is terminal.
    pub terminal: Option<Vec<f32>>,

    /// One edge per legal action, in legal-action order. Empty until expanded.
    pub edges: Vec<ActionEdge<A, K>>,

    expanded: bool,
}

impl<S, A, K> MctsNode<S, A, K> {
    pub fn new(state: S, to_play: usize, terminal: Option<Vec<f32>>) -> Self {
        Self {
            state,
            to_play,
            visit_count: 0,
            values: Vec::new(),
            terminal,
            edges: Vec::new(),
            expanded: false,
        }
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.terminal.is_some()
    }

    #[inline]
    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    /// Check if this is a leaf node (not expanded or terminal).
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.is_terminal() || !self.expanded
    }

    /// Install edges for the legal actions. Marks the node expanded.
    pub fn expand(&mut self, edges: Vec<ActionEdge<A, K>>) {
        self.edges = edges;
        self.expanded = true;
    }

    /// Mean value for `player`. Returns 0.0 if never visited.
    #[inline]
    pub fn mean_value(&self, player: usize) -> f32 {
        self.values.get(player).copied().unwrap_or(0.0)
    }

    /// Fold `count` samples of `values` into the running average.
    pub fn record(&mut self, values: &[f32], count: u32) {
        blend_average(&mut self.values, self.visit_count, values, count);
        self.visit_count += count;
    }

    /// Visit counts of the edges normalized to sum to 1.
    /// Falls back to the priors (normalized) when no edge has been visited.
    pub fn visit_distribution(&self) -> Vec<f32> {
        let total: u32 = self.edges.iter().map(|e| e.visit_count).sum();
        if total > 0 {
            return self
                .edges
                .iter()
                .map(|e| e.visit_count as f32 / total as f32)
                .collect();
        }

        let prior_sum: f32 = self.edges.iter().map(|e| e.prior).sum();
        if prior_sum > 0.0 {
            self.edges.iter().map(|e| e.prior / prior_sum).collect()
        } else {
            vec![1.0 / self.edges.len().max(1) as f32; self.edges.len()]
        }
    }
}

fn blend_average(avg: &mut Vec<f32>, n: u32, sample: &[f32], count: u32) {
    if count == 0 {
        return;
    }
    if avg.len() != sample.len() {
        avg.resize(sample.len(), 0.0);
    }
    let total = (n + count) as f32;
    for (a, s) in avg.iter_mut().zip(sample) {
        *a = (*a * n as f32 + *s * count as f32) / total;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Node = MctsNode<u8, u8, ()>;

    #[test]
    fn test_new_node() {
        let node = Node::new(3, 1, None);
        assert_eq!(node.visit_count, 0);
        assert!(node.is_leaf());
        assert!(!node.is_terminal());
        assert_eq!(node.mean_value(0), 0.0);
    }

    #[test]
    fn test_record_running_average() {
        let mut node = Node::new(0, 0, None);
        node.record(&[1.0, -1.0], 1);
        node.record(&[0.0, 0.0], 1);
        node.record(&[0.5, -0.5], 2);

        assert_eq!(node.visit_count, 4);
        assert!((node.mean_value(0) - 0.5).abs() < 1e-6);
        assert!((node.mean_value(1) + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_edge_record() {
        let mut edge: ActionEdge<u8, ()> = ActionEdge::new(4, 0.25);
        assert_eq!(edge.mean_value(0), 0.0);

        edge.record(&[0.2, 0.8], 1);
        edge.record(&[0.4, 0.6], 1);
        assert_eq!(edge.visit_count, 2);
        assert!((edge.mean_value(0) - 0.3).abs() < 1e-6);
        assert!((edge.mean_value(1) - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_expand_marks_interior() {
        let mut node = Node::new(0, 0, None);
        node.expand(vec![ActionEdge::new(0, 0.5), ActionEdge::new(1, 0.5)]);
        assert!(node.is_expanded());
        assert!(!node.is_leaf());
    }

    #[test]
    fn test_terminal_is_leaf() {
        let node = Node::new(0, 0, Some(vec![1.0, -1.0]));
        assert!(node.is_terminal());
        assert!(node.is_leaf());
    }

    #[test]
    fn test_visit_distribution() {
        let mut node = Node::new(0, 0, None);
        node.expand(vec![ActionEdge::new(0, 0.5), ActionEdge::new(1, 0.5)]);
        node.edges[0].visit_count = 30;
        node.edges[1].visit_count = 70;

        let dist = node.visit_distribution();
        assert!((dist[0] - 0.3).abs() < 1e-6);
        assert!((dist[1] - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_visit_distribution_falls_back_to_priors() {
        let mut node = Node::new(0, 0, None);
        node.expand(vec![ActionEdge::new(0, 1.0), ActionEdge::new(1, 3.0)]);

        let dist = node.visit_distribution();
        assert!((dist[0] - 0.25).abs() < 1e-6);
        assert!((dist[1] - 0.75).abs() < 1e-6);
    }
}
