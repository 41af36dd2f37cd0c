//! MCTS tree structure with arena allocation.
//!
//! The tree uses arena allocation for efficient node storage and
//! cache-friendly traversal. Nodes are stored in a contiguous Vec
//! and referenced by NodeId indices. Nodes never point at their parents;
//! backups walk the path recorded during descent instead.

use serde::Serialize;

use crate::node::{ChanceOutcome, MctsNode, NodeId};

/// One step of a descent: the node and the index of the edge taken from it.
pub type PathStep = (NodeId, usize);

/// MCTS tree with arena-based node storage.
#[derive(Debug, Clone)]
pub struct MctsTree<S, A, K> {
    /// Arena storing all nodes
    nodes: Vec<MctsNode<S, A, K>>,

    /// Root node index (always 0 after construction or `advance`)
    root: NodeId,
}

impl<S, A, K> MctsTree<S, A, K> {
    /// Create a new tree holding only `root_node`.
    pub fn new(root_node: MctsNode<S, A, K>) -> Self {
        Self {
            nodes: vec![root_node],
            root: NodeId(0),
        }
    }

    /// Get the root node ID.
    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Get a reference to a node by ID.
    #[inline]
    pub fn get(&self, id: NodeId) -> &MctsNode<S, A, K> {
        &self.nodes[id.0 as usize]
    }

    /// Get a mutable reference to a node by ID.
    #[inline]
    pub fn get_mut(&mut self, id: NodeId) -> &mut MctsNode<S, A, K> {
        &mut self.nodes[id.0 as usize]
    }

    /// Allocate a new node and return its ID.
    pub fn allocate(&mut self, node: MctsNode<S, A, K>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Get the total number of nodes in the tree.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if tree is empty (should never be true after construction).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Get the arena slice for read access.
    #[inline]
    pub fn arena(&self) -> &[MctsNode<S, A, K>] {
        &self.nodes
    }

    /// Add `count` samples of `values` to the leaf and to every node and edge
    /// on the path above it.
    pub fn backup(&mut self, path: &[PathStep], leaf: NodeId, values: &[f32], count: u32) {
        self.get_mut(leaf).record(values, count);
        for &(node_id, edge_index) in path.iter().rev() {
            let node = self.get_mut(node_id);
            node.edges[edge_index].record(values, count);
            node.record(values, count);
        }
    }

    /// Visit distribution over the root's legal actions.
    pub fn root_policy(&self) -> Vec<f32> {
        self.get(self.root).visit_distribution()
    }

    /// Make the child reached from the root through `edge_index` and the
    /// chance outcome `key` the new root, discarding everything else.
    ///
    /// Returns false (leaving the tree untouched) when that outcome was
    /// never expanded under the edge. Only an exact key match counts: an
    /// outcome that was folded into another bucket is not reused.
    pub fn advance(&mut self, edge_index: usize, key: &K) -> bool
    where
        K: PartialEq,
    {
        let child = self
            .get(self.root)
            .edges
            .get(edge_index)
            .and_then(|edge| edge.outcomes.iter().find(|o| &o.key == key))
            .map(|o| o.child);

        match child {
            Some(child) => {
                self.reroot(child);
                true
            }
            None => false,
        }
    }

    /// Rebuild the arena so that it holds only the subtree under `new_root`,
    /// renumbered breadth-first with the new root at index 0.
    fn reroot(&mut self, new_root: NodeId) {
        let mut order = vec![new_root];
        let mut i = 0;
        while i < order.len() {
            let node = self.get(order[i]);
            for edge in &node.edges {
                order.extend(edge.outcomes.iter().map(|o| o.child));
            }
            i += 1;
        }

        let mut remap = vec![u32::MAX; self.nodes.len()];
        for (new_index, old) in order.iter().enumerate() {
            remap[old.0 as usize] = new_index as u32;
        }

        let mut old_nodes: Vec<Option<MctsNode<S, A, K>>> = std::mem::take(&mut self.nodes)
            .into_iter()
            .map(Some)
            .collect();
        self.nodes = Vec::with_capacity(order.len());
        for old in order {
            if let Some(mut node) = old_nodes[old.0 as usize].take() {
                for edge in &mut node.edges {
                    for outcome in &mut edge.outcomes {
                        outcome.child = NodeId(remap[outcome.child.0 as usize]);
                    }
                }
                self.nodes.push(node);
            }
        }
        self.root = NodeId(0);
    }

    /// Get statistics about the tree for debugging.
    pub fn stats(&self) -> TreeStats {
        let root = self.get(self.root);
        TreeStats {
            total_nodes: self.nodes.len(),
            root_visits: root.visit_count,
            root_values: root.values.clone(),
            max_depth: self.compute_max_depth(self.root, 0),
        }
    }

    fn compute_max_depth(&self, node_id: NodeId, current_depth: u32) -> u32 {
        self.get(node_id)
            .edges
            .iter()
            .flat_map(|e| e.outcomes.iter())
            .map(|o: &ChanceOutcome<K>| self.compute_max_depth(o.child, current_depth + 1))
            .max()
            .unwrap_or(current_depth)
    }
}

/// Statistics about an MCTS tree.
#[derive(Debug, Clone, Serialize)]
pub struct TreeStats {
    pub total_nodes: usize,
    pub root_visits: u32,
    pub root_values: Vec<f32>,
    pub max_depth: u32,
}
