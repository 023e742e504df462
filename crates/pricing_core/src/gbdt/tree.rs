//! Regression tree nodes and traversal
//!
//! Thresholds and leaf values are fixed-point integers at the model scale.

use serde::{Deserialize, Serialize};

/// A tree node. Leaves carry `leaf = Some(value)` and `feature_idx == -1`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Node {
    pub id: i32,
    pub left: i32,
    pub right: i32,
    pub feature_idx: i32,
    /// Go left when `feature <= threshold`
    pub threshold: i64,
    pub leaf: Option<i64>,
}

impl Node {
    pub fn internal(id: i32, feature_idx: i32, threshold: i64, left: i32, right: i32) -> Self {
        Self {
            id,
            left,
            right,
            feature_idx,
            threshold,
            leaf: None,
        }
    }

    pub fn leaf(id: i32, value: i64) -> Self {
        Self {
            id,
            left: -1,
            right: -1,
            feature_idx: -1,
            threshold: 0,
            leaf: Some(value),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.feature_idx < 0 || self.leaf.is_some()
    }
}

/// One tree of the ensemble; `weight` is the shrinkage at model scale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Tree {
    pub nodes: Vec<Node>,
    pub weight: i64,
}

impl Tree {
    pub fn new(nodes: Vec<Node>, weight: i64) -> Self {
        Self { nodes, weight }
    }

    /// Leaf value reached by `features`; 0 for a malformed walk.
    pub fn evaluate(&self, features: &[i64]) -> i64 {
        let mut idx = 0usize;
        // A well-formed tree reaches a leaf in at most nodes.len() steps
        for _ in 0..=self.nodes.len() {
            let Some(node) = self.nodes.get(idx) else {
                return 0;
            };
            if let Some(value) = node.leaf {
                return value;
            }
            if node.feature_idx < 0 {
                return 0;
            }
            let Some(&value) = features.get(node.feature_idx as usize) else {
                return 0;
            };
            let next = if value <= node.threshold {
                node.left
            } else {
                node.right
            };
            if next < 0 {
                return 0;
            }
            idx = next as usize;
        }
        0
    }

    /// Structural checks: children in range, leaves well formed.
    pub fn validate(&self, feature_count: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        let len = self.nodes.len() as i32;
        for (i, node) in self.nodes.iter().enumerate() {
            if node.is_leaf() {
                if node.leaf.is_none() {
                    return Err(format!("node {i} is a leaf without a value"));
                }
                continue;
            }
            if node.feature_idx as usize >= feature_count {
                return Err(format!(
                    "node {i} splits on feature {} but the model has {feature_count}",
                    node.feature_idx
                ));
            }
            for child in [node.left, node.right] {
                if child <= i as i32 || child >= len {
                    return Err(format!("node {i} has out-of-range child {child}"));
                }
            }
        }
        Ok(())
    }

    /// Feature indices used by split nodes.
    pub fn split_features(&self) -> impl Iterator<Item = usize> + '_ {
        self.nodes
            .iter()
            .filter(|n| !n.is_leaf())
            .map(|n| n.feature_idx as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump() -> Tree {
        Tree::new(
            vec![
                Node::internal(0, 0, 50, 1, 2),
                Node::leaf(1, -10),
                Node::leaf(2, 10),
            ],
            1_000_000,
        )
    }

    #[test]
    fn routes_on_less_or_equal() {
        let tree = stump();
        assert_eq!(tree.evaluate(&[50]), -10);
        assert_eq!(tree.evaluate(&[51]), 10);
    }

    #[test]
    fn missing_feature_evaluates_to_zero() {
        assert_eq!(stump().evaluate(&[]), 0);
    }

    #[test]
    fn validate_catches_bad_children() {
        assert!(stump().validate(1).is_ok());

        let mut tree = stump();
        tree.nodes[0].right = 9;
        assert!(tree.validate(1).is_err());

        assert!(stump().validate(0).is_err());
    }

    #[test]
    fn cyclic_tree_terminates() {
        let tree = Tree::new(vec![Node::internal(0, 0, 50, 0, 0)], 1);
        assert_eq!(tree.evaluate(&[1]), 0);
    }
}
