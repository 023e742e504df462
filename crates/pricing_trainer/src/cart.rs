//! CART (Classification and Regression Tree) builder
//!
//! Deterministic exact-greedy regression trees over fixed-point features.
//! Each feature column is sorted once per training run; a node keeps its
//! samples in every column's order so split search is a single prefix sweep.

use mhd_pricing_core::gbdt::{Node, Tree};

use crate::deterministic::SplitTieBreaker;

/// Training parameters for a single tree
#[derive(Clone, Debug)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Candidate thresholds only where `value / quant_step` changes
    pub quant_step: i64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 6,
            min_samples_leaf: 3,
            quant_step: 1000,
        }
    }
}

/// Per-feature sample orderings, computed once and shared by every tree.
#[derive(Clone, Debug)]
pub struct SortedColumns {
    orders: Vec<Vec<usize>>,
}

impl SortedColumns {
    pub fn new(features: &[Vec<i64>]) -> Self {
        let feature_count = features.first().map_or(0, Vec::len);
        let orders = (0..feature_count)
            .map(|f| {
                let mut order: Vec<usize> = (0..features.len()).collect();
                order.sort_by_key(|&i| (features[i][f], i));
                order
            })
            .collect();
        Self { orders }
    }

    pub fn feature_count(&self) -> usize {
        self.orders.len()
    }
}

/// Split candidate with gain and tie-breaker
#[derive(Debug, Clone)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: i64,
    gain: i128,
    tie_breaker: SplitTieBreaker,
}

impl SplitCandidate {
    fn new(feature_idx: usize, threshold: i64, gain: i128, node_id: usize) -> Self {
        Self {
            feature_idx,
            threshold,
            gain,
            tie_breaker: SplitTieBreaker::new(feature_idx, threshold, node_id),
        }
    }

    fn beats(&self, current: &SplitCandidate) -> bool {
        self.gain > current.gain
            || (self.gain == current.gain && self.tie_breaker < current.tie_breaker)
    }
}

/// Samples reaching a node, in each feature's sorted order.
struct NodeSamples {
    orders: Vec<Vec<usize>>,
    len: usize,
}

/// Build a regression tree on squared-error gradients (unit hessians).
pub struct CartBuilder<'a> {
    config: TreeConfig,
    features: &'a [Vec<i64>],
    gradients: &'a [i64],
    columns: &'a SortedColumns,
}

impl<'a> CartBuilder<'a> {
    pub fn new(
        features: &'a [Vec<i64>],
        gradients: &'a [i64],
        columns: &'a SortedColumns,
        config: TreeConfig,
    ) -> Self {
        Self {
            config,
            features,
            gradients,
            columns,
        }
    }

    /// Build a tree whose contribution is scaled by `weight`.
    pub fn build(&self, weight: i64) -> Tree {
        let mut nodes = Vec::new();
        let len = self.features.len().min(self.gradients.len());
        if len == 0 {
            nodes.push(Node::leaf(0, 0));
            return Tree::new(nodes, weight);
        }
        let root = NodeSamples {
            orders: self.columns.orders.clone(),
            len,
        };
        self.build_node(root, 0, &mut nodes, 0);
        Tree::new(nodes, weight)
    }

    /// Recursively build nodes in pre-order; returns the node's index.
    fn build_node(
        &self,
        samples: NodeSamples,
        depth: usize,
        nodes: &mut Vec<Node>,
        node_id: usize,
    ) -> i32 {
        let current_idx = nodes.len() as i32;
        let leaf_value = self.leaf_value(&samples);

        if depth >= self.config.max_depth
            || samples.len < 2 * self.config.min_samples_leaf.max(1)
            || samples.orders.is_empty()
        {
            nodes.push(Node::leaf(current_idx, leaf_value));
            return current_idx;
        }

        let Some(split) = self.find_best_split(&samples, node_id) else {
            nodes.push(Node::leaf(current_idx, leaf_value));
            return current_idx;
        };

        let (left, right) = self.partition(samples, split.feature_idx, split.threshold);

        // Reserve space for current node
        nodes.push(Node::internal(
            current_idx,
            split.feature_idx as i32,
            split.threshold,
            -1,
            -1,
        ));

        let left_idx = self.build_node(left, depth + 1, nodes, node_id * 2 + 1);
        let right_idx = self.build_node(right, depth + 1, nodes, node_id * 2 + 2);

        nodes[current_idx as usize].left = left_idx;
        nodes[current_idx as usize].right = right_idx;

        current_idx
    }

    /// Exact-greedy search over every feature's sorted order.
    ///
    /// Gain = G_l²/n_l + G_r²/n_r - G²/n, in i128.
    fn find_best_split(&self, samples: &NodeSamples, node_id: usize) -> Option<SplitCandidate> {
        let min_leaf = self.config.min_samples_leaf.max(1);
        let step = self.config.quant_step.max(1);
        let total = self.sum_gradients(&samples.orders[0]);
        let n = samples.len as i128;
        let parent_score = total * total / n;

        let mut best: Option<SplitCandidate> = None;

        for (feature_idx, order) in samples.orders.iter().enumerate() {
            let mut left_sum = 0i128;
            for pos in 0..order.len() - 1 {
                let idx = order[pos];
                left_sum += i128::from(self.gradients[idx]);

                let left_n = pos + 1;
                let right_n = order.len() - left_n;
                if left_n < min_leaf {
                    continue;
                }
                if right_n < min_leaf {
                    break;
                }

                let value = self.features[idx][feature_idx];
                let next = self.features[order[pos + 1]][feature_idx];
                if value.div_euclid(step) == next.div_euclid(step) {
                    continue;
                }

                let right_sum = total - left_sum;
                let gain = left_sum * left_sum / left_n as i128
                    + right_sum * right_sum / right_n as i128
                    - parent_score;
                if gain <= 0 {
                    continue;
                }

                let candidate = SplitCandidate::new(feature_idx, value, gain, node_id);
                if best.as_ref().map_or(true, |current| candidate.beats(current)) {
                    best = Some(candidate);
                }
            }
        }

        best
    }

    /// Stable partition of every column order by `feature <= threshold`.
    fn partition(
        &self,
        samples: NodeSamples,
        feature_idx: usize,
        threshold: i64,
    ) -> (NodeSamples, NodeSamples) {
        let goes_left = |idx: usize| self.features[idx][feature_idx] <= threshold;
        let mut left_orders = Vec::with_capacity(samples.orders.len());
        let mut right_orders = Vec::with_capacity(samples.orders.len());
        for order in samples.orders {
            let (l, r): (Vec<usize>, Vec<usize>) = order.into_iter().partition(|&i| goes_left(i));
            left_orders.push(l);
            right_orders.push(r);
        }
        let left_len = left_orders.first().map_or(0, Vec::len);
        let right_len = right_orders.first().map_or(0, Vec::len);
        (
            NodeSamples {
                orders: left_orders,
                len: left_len,
            },
            NodeSamples {
                orders: right_orders,
                len: right_len,
            },
        )
    }

    fn sum_gradients(&self, indices: &[usize]) -> i128 {
        indices
            .iter()
            .map(|&idx| i128::from(self.gradients[idx]))
            .sum()
    }

    /// Optimal leaf value for unit hessians: -G/n
    fn leaf_value(&self, samples: &NodeSamples) -> i64 {
        if samples.len == 0 {
            return 0;
        }
        let sum = match samples.orders.first() {
            Some(order) => self.sum_gradients(order),
            None => self.sum_gradients(&(0..samples.len).collect::<Vec<_>>()),
        };
        let value = -(sum / samples.len as i128);
        value.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
    }
}
