//! Rules that turn a searched root into the action actually played.

use std::fmt::Debug;

use rand::Rng;
use rand_chacha::ChaCha20Rng;

use crate::selection::EdgeStats;

/// Chooses among the root's candidate edges once search is finished.
///
/// Returns a position into `edges`, or `None` if the slice is empty.
pub trait DecisionRule: Send + Sync + Debug {
    fn decide(&self, edges: &[EdgeStats], rng: &mut ChaCha20Rng) -> Option<usize>;
}

/// Highest mean value for the player to act. Ties prefer more visits, then
/// the earliest edge. Unvisited edges are only chosen if nothing was visited.
#[derive(Debug, Clone, Copy, Default)]
pub struct Greedy;

impl DecisionRule for Greedy {
    fn decide(&self, edges: &[EdgeStats], _rng: &mut ChaCha20Rng) -> Option<usize> {
        let any_visited = edges.iter().any(|e| e.visit_count > 0);
        let mut best: Option<(usize, &EdgeStats)> = None;
        for (pos, edge) in edges.iter().enumerate() {
            if any_visited && edge.visit_count == 0 {
                continue;
            }
            let better = match best {
                None => true,
                Some((_, b)) => {
                    edge.value > b.value
                        || (edge.value == b.value && edge.visit_count > b.visit_count)
                }
            };
            if better {
                best = Some((pos, edge));
            }
        }
        best.map(|(pos, _)| pos)
    }
}

/// Sample proportionally to `visits^(1/temperature)`.
/// A temperature near zero degenerates to "most visited".
#[derive(Debug, Clone, Copy)]
pub struct VisitProportional {
    pub temperature: f32,
}

impl VisitProportional {
    pub fn new(temperature: f32) -> Self {
        Self { temperature }
    }
}

impl DecisionRule for VisitProportional {
    fn decide(&self, edges: &[EdgeStats], rng: &mut ChaCha20Rng) -> Option<usize> {
        if edges.is_empty() {
            return None;
        }

        if self.temperature < 1e-6 {
            let mut best = 0;
            for (pos, edge) in edges.iter().enumerate() {
                if edge.visit_count > edges[best].visit_count {
                    best = pos;
                }
            }
            return Some(best);
        }

        let weights: Vec<f32> = edges
            .iter()
            .map(|e| {
                let v = e.visit_count as f32;
                if self.temperature == 1.0 {
                    v
                } else {
                    v.powf(1.0 / self.temperature)
                }
            })
            .collect();
        let total: f32 = weights.iter().sum();
        if !(total > 0.0 && total.is_finite()) {
            return Some(rng.gen_range(0..edges.len()));
        }

        let mut threshold = rng.gen::<f32>() * total;
        for (pos, w) in weights.iter().enumerate() {
            if threshold < *w {
                return Some(pos);
            }
            threshold -= w;
        }
        // Rounding can leave a sliver past the last weight
        weights.iter().rposition(|w| *w > 0.0)
    }
}

/// After the main simulations, spend `simulations` more on only the
/// `candidates` most visited root actions; the decision then picks among
/// those candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Refinement {
    pub candidates: usize,
    pub simulations: u32,
}

/// Root edge positions of the `k` most visited edges, ties by higher value
/// then earlier position. Returned in legal-action order.
pub fn top_by_visits(edges: &[EdgeStats], k: usize) -> Vec<usize> {
    let mut ranked: Vec<&EdgeStats> = edges.iter().collect();
    ranked.sort_by(|a, b| {
        b.visit_count
            .cmp(&a.visit_count)
            .then_with(|| {
                b.value
                    .partial_cmp(&a.value)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.index.cmp(&b.index))
    });
    let mut chosen: Vec<usize> = ranked.into_iter().take(k).map(|e| e.index).collect();
    chosen.sort_unstable();
    chosen
}
