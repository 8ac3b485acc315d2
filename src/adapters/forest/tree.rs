//! Decision tree storage and traversal.

use serde::{Deserialize, Serialize};

/// Split condition for a decision node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitCondition {
    /// Feature index to split on
    pub feature_index: u32,
    /// Threshold value (go left if feature < threshold)
    pub threshold: f64,
}

impl SplitCondition {
    pub fn new(feature_index: u32, threshold: f64) -> Self {
        Self {
            feature_index,
            threshold,
        }
    }

    /// Returns true for left, false for right.
    #[inline]
    pub fn go_left(&self, feature_value: f64) -> bool {
        feature_value < self.threshold
    }
}

/// A node in a decision tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    /// Internal split node
    Split {
        condition: SplitCondition,
        left: u32,
        right: u32,
    },
    /// Leaf holding the class-1 fraction of its training samples
    Leaf { probability: f64 },
}

impl Node {
    pub fn split(condition: SplitCondition, left: u32, right: u32) -> Self {
        Self::Split {
            condition,
            left,
            right,
        }
    }

    pub fn leaf(probability: f64) -> Self {
        Self::Leaf { probability }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf { .. })
    }
}

/// A binary classification tree stored as a flat node array, root at 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<Node>,
}

impl DecisionTree {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    /// Class-1 probability of the leaf reached by `features`.
    ///
    /// Assumes [`DecisionTree::validate`] has passed for this width.
    pub fn predict(&self, features: &[f64]) -> f64 {
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { probability } => return *probability,
                Node::Split {
                    condition,
                    left,
                    right,
                } => {
                    let value = features[condition.feature_index as usize];
                    idx = if condition.go_left(value) {
                        *left as usize
                    } else {
                        *right as usize
                    };
                }
            }
        }
    }

    /// Depth of the deepest leaf (a lone leaf has depth 0).
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => {
                    1 + walk(nodes, *left as usize).max(walk(nodes, *right as usize))
                }
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }

    pub fn num_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Check structure so that [`DecisionTree::predict`] cannot panic or loop.
    ///
    /// Children must point strictly forward, every node must be reachable at
    /// most once, features must be in range and probabilities in `[0, 1]`.
    pub fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".into());
        }

        let mut seen = vec![false; self.nodes.len()];
        seen[0] = true;

        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Leaf { probability } => {
                    if !(0.0..=1.0).contains(probability) {
                        return Err(format!("leaf {idx} has probability {probability}"));
                    }
                }
                Node::Split {
                    condition,
                    left,
                    right,
                } => {
                    if condition.feature_index as usize >= n_features {
                        return Err(format!(
                            "node {idx} splits on feature {} of {n_features}",
                            condition.feature_index
                        ));
                    }
                    if !condition.threshold.is_finite() {
                        return Err(format!("node {idx} has a non-finite threshold"));
                    }
                    for child in [*left as usize, *right as usize] {
                        if child <= idx || child >= self.nodes.len() {
                            return Err(format!("node {idx} has invalid child {child}"));
                        }
                        if seen[child] {
                            return Err(format!("node {child} has more than one parent"));
                        }
                        seen[child] = true;
                    }
                }
            }
        }

        if let Some(orphan) = seen.iter().position(|s| !s) {
            return Err(format!("node {orphan} is unreachable"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// x0 < 0.5 ? 0.25 : (x1 < 1.0 ? 0.5 : 1.0)
    fn sample_tree() -> DecisionTree {
        DecisionTree::new(vec![
            Node::split(SplitCondition::new(0, 0.5), 1, 2),
            Node::leaf(0.25),
            Node::split(SplitCondition::new(1, 1.0), 3, 4),
            Node::leaf(0.5),
            Node::leaf(1.0),
        ])
    }

    #[test]
    fn test_split_condition_threshold_goes_right() {
        let cond = SplitCondition::new(0, 0.5);
        assert!(cond.go_left(0.3));
        assert!(!cond.go_left(0.7));
        assert!(!cond.go_left(0.5));
    }

    #[test]
    fn test_predict_follows_splits() {
        let tree = sample_tree();
        assert_eq!(tree.predict(&[0.0, 9.0]), 0.25);
        assert_eq!(tree.predict(&[0.5, 0.0]), 0.5);
        assert_eq!(tree.predict(&[0.9, 1.0]), 1.0);
    }

    #[test]
    fn test_shape_accessors() {
        let tree = sample_tree();
        assert_eq!(tree.depth(), 2);
        assert_eq!(tree.num_leaves(), 3);
        assert!(tree.validate(2).is_ok());
    }

    #[test]
    fn test_validate_rejects_malformed_trees() {
        assert!(DecisionTree::new(vec![]).validate(1).is_err());

        // feature out of range
        assert!(sample_tree().validate(1).is_err());

        // self loop
        let looped = DecisionTree::new(vec![Node::split(SplitCondition::new(0, 0.0), 0, 0)]);
        assert!(looped.validate(1).is_err());

        // bad probability
        let bad_leaf = DecisionTree::new(vec![Node::leaf(1.5)]);
        assert!(bad_leaf.validate(1).is_err());

        // orphan node
        let orphan = DecisionTree::new(vec![Node::leaf(0.5), Node::leaf(0.5)]);
        assert!(orphan.validate(1).is_err());
    }

    #[test]
    fn test_node_json_shape() {
        let json = serde_json::to_value(Node::leaf(0.875)).expect("serialize");
        assert_eq!(json, serde_json::json!({"leaf": {"probability": 0.875}}));
    }
}
