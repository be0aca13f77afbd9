//! Testing utilities for lgbm-infer.
//!
//! Assertion helpers and a small model-text builder shared by unit tests,
//! integration tests and benchmarks.
//!
//! ```
//! use lgbm_infer::testing::{ModelText, TreeText};
//!
//! let text = ModelText::new("regression", 1)
//!     .tree(TreeText::stump(0, 0.5, 2, -1.0, 1.0))
//!     .build();
//! assert!(text.starts_with("tree\n"));
//! assert!(text.contains("Tree=0\n"));
//! ```

use std::fmt;

use approx::AbsDiffEq;

/// Default tolerance for comparing transformed predictions.
pub const DEFAULT_TOLERANCE: f64 = 1e-12;

// =============================================================================
// Floating Point Assertions
// =============================================================================

/// Assert that two slices are element-wise within `tolerance`.
///
/// NaN compares equal to NaN.
///
/// # Panics
///
/// Panics if lengths differ or any element differs by more than tolerance.
pub fn assert_slices_approx_eq(actual: &[f64], expected: &[f64], tolerance: f64, context: &str) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "{context}: length mismatch - got {}, expected {}",
        actual.len(),
        expected.len()
    );

    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        if a.is_nan() && e.is_nan() {
            continue;
        }
        assert!(
            a.abs_diff_eq(e, tolerance),
            "{context}[{i}]: {a} != {e} (diff={}, tolerance={tolerance})",
            (a - e).abs()
        );
    }
}

/// Assert that two slices hold exactly the same bit patterns.
pub fn assert_bits_eq(actual: &[f64], expected: &[f64], context: &str) {
    let bits = |v: &[f64]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
    assert_eq!(
        bits(actual),
        bits(expected),
        "{context}: {actual:?} is not bit-identical to {expected:?}"
    );
}

// =============================================================================
// Model Text Builder
// =============================================================================

/// One `Tree=<n>` block. The index is assigned by [`ModelText`].
#[derive(Debug, Clone, Default)]
pub struct TreeText {
    num_leaves: usize,
    num_cat: usize,
    split_feature: Vec<i32>,
    threshold: Vec<f64>,
    decision_type: Vec<i32>,
    left_child: Vec<i32>,
    right_child: Vec<i32>,
    leaf_value: Vec<f64>,
    cat_boundaries: Vec<u32>,
    cat_threshold: Vec<u64>,
}

impl TreeText {
    /// A tree with no splits.
    pub fn leaf(value: f64) -> Self {
        Self {
            num_leaves: 1,
            leaf_value: vec![value],
            ..Default::default()
        }
    }

    /// A single split with two leaves.
    pub fn stump(feature: i32, threshold: f64, decision_type: i32, left: f64, right: f64) -> Self {
        Self {
            num_leaves: 2,
            split_feature: vec![feature],
            threshold: vec![threshold],
            decision_type: vec![decision_type],
            left_child: vec![-1],
            right_child: vec![-2],
            leaf_value: vec![left, right],
            ..Default::default()
        }
    }

    /// Arbitrary split arrays, in the dump's own layout.
    pub fn splits(
        split_feature: Vec<i32>,
        threshold: Vec<f64>,
        decision_type: Vec<i32>,
        left_child: Vec<i32>,
        right_child: Vec<i32>,
        leaf_value: Vec<f64>,
    ) -> Self {
        Self {
            num_leaves: leaf_value.len(),
            split_feature,
            threshold,
            decision_type,
            left_child,
            right_child,
            leaf_value,
            ..Default::default()
        }
    }

    /// Attach categorical bitsets.
    pub fn categories(mut self, num_cat: usize, boundaries: Vec<u32>, words: Vec<u64>) -> Self {
        self.num_cat = num_cat;
        self.cat_boundaries = boundaries;
        self.cat_threshold = words;
        self
    }

    fn write(&self, f: &mut fmt::Formatter<'_>, index: usize) -> fmt::Result {
        writeln!(f, "Tree={index}")?;
        writeln!(f, "num_leaves={}", self.num_leaves)?;
        writeln!(f, "num_cat={}", self.num_cat)?;
        if !self.left_child.is_empty() {
            writeln!(f, "split_feature={}", Joined(&self.split_feature))?;
            writeln!(f, "threshold={}", Joined(&self.threshold))?;
            writeln!(f, "decision_type={}", Joined(&self.decision_type))?;
            writeln!(f, "left_child={}", Joined(&self.left_child))?;
            writeln!(f, "right_child={}", Joined(&self.right_child))?;
        }
        writeln!(f, "leaf_value={}", Joined(&self.leaf_value))?;
        if !self.cat_boundaries.is_empty() {
            writeln!(f, "cat_boundaries={}", Joined(&self.cat_boundaries))?;
        }
        if !self.cat_threshold.is_empty() {
            writeln!(f, "cat_threshold={}", Joined(&self.cat_threshold))?;
        }
        writeln!(f, "shrinkage=1")?;
        writeln!(f)
    }
}

/// Builder for a complete model dump.
#[derive(Debug, Clone)]
pub struct ModelText {
    objective: String,
    num_class: usize,
    num_tree_per_iteration: usize,
    max_feature_idx: usize,
    trees: Vec<TreeText>,
}

impl ModelText {
    /// Single-output model with the given objective line and max feature index.
    pub fn new(objective: impl Into<String>, max_feature_idx: usize) -> Self {
        Self {
            objective: objective.into(),
            num_class: 1,
            num_tree_per_iteration: 1,
            max_feature_idx,
            trees: Vec::new(),
        }
    }

    /// Set `num_class` and `num_tree_per_iteration` together.
    pub fn classes(mut self, num_class: usize) -> Self {
        self.num_class = num_class;
        self.num_tree_per_iteration = num_class;
        self
    }

    pub fn tree(mut self, tree: TreeText) -> Self {
        self.trees.push(tree);
        self
    }

    pub fn trees(mut self, trees: impl IntoIterator<Item = TreeText>) -> Self {
        self.trees.extend(trees);
        self
    }

    /// Render the dump, including the trailer sections a real dump carries.
    pub fn build(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ModelText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "tree")?;
        writeln!(f, "version=v4")?;
        writeln!(f, "num_class={}", self.num_class)?;
        writeln!(f, "num_tree_per_iteration={}", self.num_tree_per_iteration)?;
        writeln!(f, "label_index=0")?;
        writeln!(f, "max_feature_idx={}", self.max_feature_idx)?;
        writeln!(f, "objective={}", self.objective)?;
        writeln!(f)?;

        for (index, tree) in self.trees.iter().enumerate() {
            tree.write(f, index)?;
        }

        writeln!(f, "end of trees")?;
        writeln!(f)?;
        writeln!(f, "parameters:")?;
        writeln!(f, "[boosting: gbdt]")?;
        writeln!(f, "end of parameters")
    }
}

/// Space-separated list value.
struct Joined<'a, T>(&'a [T]);

impl<T: fmt::Display> fmt::Display for Joined<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{v}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compat::parse_tree_model;

    #[test]
    fn built_text_parses() {
        let text = ModelText::new("multiclass num_class:2", 3)
            .classes(2)
            .tree(TreeText::stump(3, 0.5, 0, 1.0, 2.0))
            .tree(TreeText::leaf(0.25))
            .build();
        let model = parse_tree_model(text.lines()).unwrap();
        assert_eq!(model.num_classes(), 2);
        assert_eq!(model.num_trees(), 2);
        assert_eq!(model.max_feature_index(), 3);
    }

    #[test]
    fn slices_approx_eq_accepts_nan_pairs() {
        assert_slices_approx_eq(&[1.0, f64::NAN], &[1.0 + 1e-14, f64::NAN], 1e-12, "ok");
    }

    #[test]
    #[should_panic(expected = "ctx[0]")]
    fn slices_approx_eq_reports_index() {
        assert_slices_approx_eq(&[1.0], &[1.1], 1e-12, "ctx");
    }

    #[test]
    #[should_panic(expected = "not bit-identical")]
    fn bits_eq_distinguishes_signed_zero() {
        assert_bits_eq(&[0.0], &[-0.0], "zero");
    }
}
