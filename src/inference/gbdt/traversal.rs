//! Tree traversal strategies for prediction.
//!
//! This module provides the [`TreeTraversal`] trait and the reference
//! implementation that every other strategy must agree with.
//!
//! # Available Strategies
//!
//! - [`StandardTraversal`]: Direct node-by-node interpretation of the tree
//! - [`CompiledTraversal`](super::CompiledTraversal): Closure tree specialised per model
//!
//! # Decision Rules
//!
//! Numeric split on value `v`:
//! - NaN reads as `0.0` unless the split's missing type is [`MissingType::NaN`]
//! - [`MissingType::Zero`] with `|v| <= ZERO_THRESHOLD` takes the default direction
//! - [`MissingType::NaN`] with NaN takes the default direction
//! - otherwise `v <= threshold` goes left
//!
//! Categorical splits follow [`categorical_decision`].

use crate::repr::gbdt::{
    find_in_bitset, float_to_category, Direction, MissingType, SplitCondition, Tree, TreeModel,
    TreeNode, ZERO_THRESHOLD,
};

// =============================================================================
// TreeTraversal Trait
// =============================================================================

/// Strategy for traversing a tree during prediction.
///
/// A strategy may precompute per-tree state once, when the predictor is
/// built. Traversal itself never mutates anything, so a built predictor can
/// be shared across threads.
pub trait TreeTraversal: Clone + Send + Sync {
    /// State held per-tree for this traversal strategy.
    ///
    /// For plain interpretation this is `()`.
    type TreeState: Send + Sync;

    /// Why building tree state can fail.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Check model-wide preconditions before any tree state is built.
    #[inline]
    fn prepare(&self, _model: &TreeModel) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Build traversal state for a tree.
    ///
    /// Called once per tree when creating a predictor.
    fn build_tree_state(&self, tree: &Tree) -> Result<Self::TreeState, Self::Error>;

    /// Traverse a tree with given features, returning the leaf value.
    fn traverse_tree(tree: &Tree, state: &Self::TreeState, features: &[f64]) -> f64;
}

// =============================================================================
// Shared decision helpers
// =============================================================================

/// Read feature `index`, treating positions past the end of `features` as missing.
#[inline]
pub fn feature_value(features: &[f64], index: u32) -> f64 {
    features.get(index as usize).copied().unwrap_or(f64::NAN)
}

/// Whether `value` lies within `ZERO_THRESHOLD` of zero.
#[inline]
pub fn is_zero(value: f64) -> bool {
    value >= -ZERO_THRESHOLD && value <= ZERO_THRESHOLD
}

/// Route a numeric split.
#[inline]
pub fn numeric_decision(
    value: f64,
    threshold: f64,
    missing_type: MissingType,
    default_direction: Direction,
) -> Direction {
    let mut value = value;
    if value.is_nan() && missing_type != MissingType::NaN {
        value = 0.0;
    }
    let missing = match missing_type {
        MissingType::None => false,
        MissingType::Zero => is_zero(value),
        MissingType::NaN => value.is_nan(),
    };
    if missing {
        default_direction
    } else if value <= threshold {
        Direction::Left
    } else {
        Direction::Right
    }
}

/// Route a categorical split over the words of its bitset range.
///
/// NaN and negative values go right; a category whose bit is set goes left.
#[inline]
pub fn categorical_decision(value: f64, words: &[u64]) -> Direction {
    match float_to_category(value) {
        Some(category) if find_in_bitset(words, category) => Direction::Left,
        _ => Direction::Right,
    }
}

/// Evaluate `tree` for one feature vector by walking its nodes.
pub fn decision(tree: &Tree, features: &[f64]) -> f64 {
    let mut node = tree.root();

    loop {
        let split = match node {
            TreeNode::Leaf { value } => return *value,
            TreeNode::Split(split) => split,
        };

        let value = feature_value(features, split.feature_index);
        let direction = match split.condition {
            SplitCondition::Numeric { threshold } => {
                numeric_decision(value, threshold, split.missing_type, split.default_direction)
            }
            SplitCondition::Categorical { range } => {
                categorical_decision(value, tree.categories().range_words(range))
            }
        };
        node = split.child(direction);
    }
}

// =============================================================================
// StandardTraversal
// =============================================================================

/// Standard node-by-node tree traversal.
///
/// Traverses from root to leaf following split conditions. This is the
/// reference semantics; it needs no setup and never fails to build.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardTraversal;

impl TreeTraversal for StandardTraversal {
    type TreeState = ();
    type Error = std::convert::Infallible;

    #[inline]
    fn build_tree_state(&self, _tree: &Tree) -> Result<Self::TreeState, Self::Error> {
        // No pre-computation needed
        Ok(())
    }

    #[inline]
    fn traverse_tree(tree: &Tree, _state: &Self::TreeState, features: &[f64]) -> f64 {
        decision(tree, features)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repr::gbdt::{CategoryBitset, CategoryRange};
    use rstest::rstest;

    fn numeric_stump(missing: MissingType, default: Direction) -> Tree {
        Tree::new(
            0,
            TreeNode::numeric(
                0,
                0.5,
                missing,
                default,
                TreeNode::leaf(-1.0),
                TreeNode::leaf(1.0),
            ),
        )
    }

    #[rstest]
    #[case(0.5, -1.0)] // equal goes left
    #[case(0.4, -1.0)]
    #[case(0.6, 1.0)]
    #[case(f64::NAN, -1.0)] // NaN reads as 0.0
    #[case(f64::INFINITY, 1.0)]
    #[case(f64::NEG_INFINITY, -1.0)]
    fn numeric_without_missing_handling(#[case] value: f64, #[case] expected: f64) {
        let tree = numeric_stump(MissingType::None, Direction::Right);
        assert_eq!(decision(&tree, &[value]), expected);
    }

    #[rstest]
    #[case(0.0)]
    #[case(-0.0)]
    #[case(1e-35)]
    #[case(-1e-35)]
    #[case(f64::NAN)]
    fn zero_missing_takes_default(#[case] value: f64) {
        let tree = numeric_stump(MissingType::Zero, Direction::Right);
        assert_eq!(decision(&tree, &[value]), 1.0);
    }

    #[test]
    fn zero_missing_outside_threshold_compares() {
        let tree = numeric_stump(MissingType::Zero, Direction::Right);
        assert_eq!(decision(&tree, &[1e-30]), -1.0);
        assert_eq!(decision(&tree, &[-1e-30]), -1.0);
    }

    #[test]
    fn nan_missing_takes_default() {
        let tree = numeric_stump(MissingType::NaN, Direction::Right);
        assert_eq!(decision(&tree, &[f64::NAN]), 1.0);
        // zero is an ordinary value under NaN handling
        assert_eq!(decision(&tree, &[0.0]), -1.0);

        let tree = numeric_stump(MissingType::NaN, Direction::Left);
        assert_eq!(decision(&tree, &[f64::NAN]), -1.0);
        assert_eq!(decision(&tree, &[0.9]), 1.0);
    }

    #[test]
    fn short_vector_reads_missing() {
        let tree = numeric_stump(MissingType::NaN, Direction::Right);
        assert_eq!(decision(&tree, &[]), 1.0);
        assert!(feature_value(&[1.0], 3).is_nan());
    }

    fn categorical_tree() -> Tree {
        // words: [0b1010 (cats 1,3), 0b1 (cat 32)]; split reads word 0 only
        Tree::with_categories(
            0,
            TreeNode::categorical(
                2,
                CategoryRange::new(0, 1),
                TreeNode::leaf(10.0),
                TreeNode::leaf(20.0),
            ),
            CategoryBitset::new(vec![0b1010, 0b1]),
        )
    }

    #[rstest]
    #[case(1.0, 10.0)]
    #[case(3.0, 10.0)]
    #[case(3.7, 10.0)] // truncates to 3
    #[case(0.0, 20.0)]
    #[case(2.0, 20.0)]
    #[case(32.0, 20.0)] // past the split's range
    #[case(-1.0, 20.0)]
    #[case(f64::NAN, 20.0)]
    fn categorical_routing(#[case] value: f64, #[case] expected: f64) {
        let tree = categorical_tree();
        assert_eq!(decision(&tree, &[0.0, 0.0, value]), expected);
    }

    #[test]
    fn categorical_reads_split_feature() {
        let tree = categorical_tree();
        // feature 0 holds a set category, feature 2 does not
        assert_eq!(decision(&tree, &[1.0, 1.0, 0.0]), 20.0);
    }

    #[test]
    fn standard_traversal_matches_decision() {
        let tree = numeric_stump(MissingType::None, Direction::Left);
        let state = StandardTraversal.build_tree_state(&tree).unwrap();
        assert_eq!(StandardTraversal::traverse_tree(&tree, &state, &[0.7]), 1.0);
    }
}
