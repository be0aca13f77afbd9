//! Compiled tree traversal.
//!
//! [`CompiledTraversal`] turns each tree into a tree of boxed closures once,
//! when the predictor is built. Every closure has its split's feature index,
//! threshold and bitset words captured by value, and the missing-value
//! handling is chosen when the closure is created rather than matched on
//! each call. Children that are leaves are folded into their parent as
//! constants.
//!
//! The closures apply exactly the comparisons of
//! [`StandardTraversal`](super::StandardTraversal), in the same order, so a
//! compiled tree returns the same leaf value bit for bit.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::repr::gbdt::{
    find_in_bitset, float_to_category, Direction, MissingType, SplitCondition, SplitNode, Tree,
    TreeModel, TreeNode,
};

use super::traversal::{feature_value, is_zero, TreeTraversal};

/// Default bound on tree depth for compilation.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Default bound on the total node count of a compiled model.
pub const DEFAULT_MAX_NODES: usize = 1 << 20;

// =============================================================================
// Limits and errors
// =============================================================================

/// Size bounds for the compiled executor.
///
/// Depth bounds each tree (closure nesting becomes call depth at prediction
/// time); the node bound applies to the whole model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileLimits {
    pub max_depth: usize,
    pub max_nodes: usize,
}

impl Default for CompileLimits {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_nodes: DEFAULT_MAX_NODES,
        }
    }
}

/// Error building a compiled executor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("tree {tree} has depth {depth}, compile limit is {limit}")]
    DepthLimitExceeded {
        tree: usize,
        depth: usize,
        limit: usize,
    },
    #[error("model has {nodes} nodes, compile limit is {limit}")]
    NodeLimitExceeded { nodes: usize, limit: usize },
}

// =============================================================================
// Compiled nodes
// =============================================================================

type NodeFn = Box<dyn Fn(&[f64]) -> f64 + Send + Sync>;

/// A compiled child: a constant leaf or a nested split.
enum Child {
    Leaf(f64),
    Node(NodeFn),
}

impl Child {
    #[inline(always)]
    fn eval(&self, features: &[f64]) -> f64 {
        match self {
            Child::Leaf(value) => *value,
            Child::Node(node) => node(features),
        }
    }
}

/// A tree specialised into closures.
pub struct CompiledTree {
    root: Child,
}

impl CompiledTree {
    /// Evaluate the tree for one feature vector.
    #[inline]
    pub fn eval(&self, features: &[f64]) -> f64 {
        self.root.eval(features)
    }
}

impl fmt::Debug for CompiledTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let root = match self.root {
            Child::Leaf(_) => "leaf",
            Child::Node(_) => "split",
        };
        f.debug_struct("CompiledTree").field("root", &root).finish()
    }
}

/// Compile a node. Recursion depth is bounded by [`CompileLimits::max_depth`].
fn compile_node(node: &TreeNode, tree: &Tree) -> Child {
    match node {
        TreeNode::Leaf { value } => Child::Leaf(*value),
        TreeNode::Split(split) => Child::Node(compile_split(split, tree)),
    }
}

fn compile_split(split: &SplitNode, tree: &Tree) -> NodeFn {
    let left = compile_node(&split.left, tree);
    let right = compile_node(&split.right, tree);
    let feature = split.feature_index;

    match split.condition {
        SplitCondition::Categorical { range } => {
            let words: Box<[u64]> = tree.categories().range_words(range).into();
            categorical_split(feature, words, left, right)
        }
        SplitCondition::Numeric { threshold } => {
            let default_left = split.default_direction == Direction::Left;
            match (split.missing_type, default_left) {
                (MissingType::None, _) => plain_split(feature, threshold, left, right),
                (MissingType::Zero, true) => zero_split::<true>(feature, threshold, left, right),
                (MissingType::Zero, false) => zero_split::<false>(feature, threshold, left, right),
                (MissingType::NaN, true) => nan_split::<true>(feature, threshold, left, right),
                (MissingType::NaN, false) => nan_split::<false>(feature, threshold, left, right),
            }
        }
    }
}

fn plain_split(feature: u32, threshold: f64, left: Child, right: Child) -> NodeFn {
    Box::new(move |f: &[f64]| {
        let mut v = feature_value(f, feature);
        if v.is_nan() {
            v = 0.0;
        }
        if v <= threshold {
            left.eval(f)
        } else {
            right.eval(f)
        }
    })
}

fn zero_split<const DEFAULT_LEFT: bool>(
    feature: u32,
    threshold: f64,
    left: Child,
    right: Child,
) -> NodeFn {
    Box::new(move |f: &[f64]| {
        let mut v = feature_value(f, feature);
        if v.is_nan() {
            v = 0.0;
        }
        if is_zero(v) {
            if DEFAULT_LEFT {
                left.eval(f)
            } else {
                right.eval(f)
            }
        } else if v <= threshold {
            left.eval(f)
        } else {
            right.eval(f)
        }
    })
}

fn nan_split<const DEFAULT_LEFT: bool>(
    feature: u32,
    threshold: f64,
    left: Child,
    right: Child,
) -> NodeFn {
    Box::new(move |f: &[f64]| {
        let v = feature_value(f, feature);
        if v.is_nan() {
            if DEFAULT_LEFT {
                left.eval(f)
            } else {
                right.eval(f)
            }
        } else if v <= threshold {
            left.eval(f)
        } else {
            right.eval(f)
        }
    })
}

fn categorical_split(feature: u32, words: Box<[u64]>, left: Child, right: Child) -> NodeFn {
    Box::new(move |f: &[f64]| match float_to_category(feature_value(f, feature)) {
        Some(category) if find_in_bitset(&words, category) => left.eval(f),
        _ => right.eval(f),
    })
}

// =============================================================================
// CompiledTraversal
// =============================================================================

/// Traversal through per-tree closure specialisations.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompiledTraversal {
    limits: CompileLimits,
}

impl CompiledTraversal {
    pub fn new(limits: CompileLimits) -> Self {
        Self { limits }
    }

    #[inline]
    pub fn limits(&self) -> CompileLimits {
        self.limits
    }
}

impl TreeTraversal for CompiledTraversal {
    type TreeState = CompiledTree;
    type Error = CompileError;

    fn prepare(&self, model: &TreeModel) -> Result<(), Self::Error> {
        let nodes = model.num_nodes();
        if nodes > self.limits.max_nodes {
            return Err(CompileError::NodeLimitExceeded {
                nodes,
                limit: self.limits.max_nodes,
            });
        }
        Ok(())
    }

    fn build_tree_state(&self, tree: &Tree) -> Result<Self::TreeState, Self::Error> {
        let depth = tree.depth();
        if depth > self.limits.max_depth {
            return Err(CompileError::DepthLimitExceeded {
                tree: tree.tree_index(),
                depth,
                limit: self.limits.max_depth,
            });
        }
        Ok(CompiledTree {
            root: compile_node(tree.root(), tree),
        })
    }

    #[inline]
    fn traverse_tree(_tree: &Tree, state: &Self::TreeState, features: &[f64]) -> f64 {
        state.eval(features)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::gbdt::traversal::decision;
    use crate::repr::gbdt::{CategoryBitset, CategoryRange};

    const EDGE_VALUES: [f64; 12] = [
        f64::NAN,
        f64::NEG_INFINITY,
        -2.0,
        -1e-35,
        -0.0,
        0.0,
        1e-35,
        0.5,
        1.0,
        3.0,
        33.0,
        f64::INFINITY,
    ];

    fn mixed_tree() -> Tree {
        let zero_left = TreeNode::numeric(
            1,
            -0.5,
            MissingType::Zero,
            Direction::Left,
            TreeNode::leaf(0.1),
            TreeNode::leaf(0.2),
        );
        let nan_right = TreeNode::numeric(
            2,
            1.0,
            MissingType::NaN,
            Direction::Right,
            TreeNode::categorical(
                0,
                CategoryRange::new(1, 3),
                TreeNode::leaf(0.3),
                TreeNode::leaf(0.4),
            ),
            TreeNode::leaf(0.5),
        );
        Tree::with_categories(
            0,
            TreeNode::numeric(
                0,
                0.5,
                MissingType::None,
                Direction::Right,
                zero_left,
                nan_right,
            ),
            CategoryBitset::new(vec![0, 0b1001, 0b10]),
        )
    }

    #[test]
    fn compiled_matches_interpreter_on_edge_value_grid() {
        let tree = mixed_tree();
        let compiled = CompiledTraversal::default().build_tree_state(&tree).unwrap();

        for &a in &EDGE_VALUES {
            for &b in &EDGE_VALUES {
                for &c in &EDGE_VALUES {
                    let features = [a, b, c];
                    let expected = decision(&tree, &features);
                    let actual = compiled.eval(&features);
                    assert_eq!(
                        expected.to_bits(),
                        actual.to_bits(),
                        "features {features:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn compiled_short_vector_reads_missing() {
        let tree = mixed_tree();
        let compiled = CompiledTraversal::default().build_tree_state(&tree).unwrap();
        for len in 0..3 {
            let features = [0.7, 0.0, 0.0];
            assert_eq!(
                compiled.eval(&features[..len]).to_bits(),
                decision(&tree, &features[..len]).to_bits()
            );
        }
    }

    #[test]
    fn single_leaf_compiles_to_constant() {
        let tree = Tree::new(0, TreeNode::leaf(2.5));
        let compiled = CompiledTraversal::default().build_tree_state(&tree).unwrap();
        assert_eq!(compiled.eval(&[]), 2.5);
        assert!(format!("{compiled:?}").contains("leaf"));
    }

    #[test]
    fn depth_limit() {
        let traversal = CompiledTraversal::new(CompileLimits {
            max_depth: 1,
            ..Default::default()
        });
        let err = traversal.build_tree_state(&mixed_tree()).unwrap_err();
        assert_eq!(
            err,
            CompileError::DepthLimitExceeded {
                tree: 0,
                depth: 3,
                limit: 1
            }
        );
    }

    #[test]
    fn node_limit() {
        let model = TreeModel::new(1, 1, 2, "regression", "", vec![mixed_tree()]).unwrap();
        let traversal = CompiledTraversal::new(CompileLimits {
            max_nodes: 4,
            ..Default::default()
        });
        assert_eq!(
            traversal.prepare(&model).unwrap_err(),
            CompileError::NodeLimitExceeded { nodes: 9, limit: 4 }
        );
        assert!(CompiledTraversal::default().prepare(&model).is_ok());
    }

    #[test]
    fn limits_deserialize_with_defaults() {
        let limits: CompileLimits = serde_json::from_str(r#"{"max_depth": 32}"#).unwrap();
        assert_eq!(limits.max_depth, 32);
        assert_eq!(limits.max_nodes, DEFAULT_MAX_NODES);
    }
}
