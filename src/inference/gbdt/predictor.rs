//! Unified predictor for tree ensemble inference.
//!
//! This module provides [`Predictor`], a single generic predictor that works with
//! any [`TreeTraversal`] strategy. The accumulation loop lives here, once, so
//! every strategy sums leaf values into the same class slots in the same
//! tree order and therefore produces bit-identical raw output.
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use lgbm_infer::inference::gbdt::{CompiledPredictor, InterpretedPredictor};
//! use lgbm_infer::repr::gbdt::{Direction, MissingType, Tree, TreeModel, TreeNode};
//!
//! let root = TreeNode::numeric(
//!     0, 0.5, MissingType::None, Direction::Right,
//!     TreeNode::leaf(-1.0), TreeNode::leaf(1.0),
//! );
//! let model = Arc::new(TreeModel::new(1, 1, 0, "regression", "", vec![Tree::new(0, root)])?);
//!
//! let interpreted = InterpretedPredictor::interpreted(Arc::clone(&model));
//! let compiled = CompiledPredictor::compiled(model, Default::default())?;
//! assert_eq!(interpreted.predict_raw(&[0.7]), compiled.predict_raw(&[0.7]));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fmt;
use std::sync::Arc;

use crate::repr::gbdt::TreeModel;

use super::compiled::{CompileError, CompileLimits, CompiledTraversal};
use super::traversal::{StandardTraversal, TreeTraversal};

/// Unified predictor for tree ensemble inference.
///
/// Generic over [`TreeTraversal`] strategy. Holds the shared model, the
/// per-tree state the strategy built, and each tree's output class.
pub struct Predictor<T: TreeTraversal> {
    model: Arc<TreeModel>,
    /// Pre-computed state for each tree (e.g., compiled closures)
    tree_states: Box<[T::TreeState]>,
    /// Output class of each tree (`tree_index % num_classes`)
    tree_classes: Box<[usize]>,
}

impl<T: TreeTraversal> Predictor<T> {
    /// Create a new predictor for the given model.
    ///
    /// Builds per-tree state upfront; fails if the strategy cannot handle the model.
    pub fn new(model: Arc<TreeModel>, traversal: &T) -> Result<Self, T::Error> {
        traversal.prepare(&model)?;
        let tree_states = model
            .trees()
            .iter()
            .map(|tree| traversal.build_tree_state(tree))
            .collect::<Result<Box<[_]>, _>>()?;
        let tree_classes = model.tree_classes().collect();

        Ok(Self {
            model,
            tree_states,
            tree_classes,
        })
    }

    /// Get a reference to the underlying model.
    #[inline]
    pub fn model(&self) -> &Arc<TreeModel> {
        &self.model
    }

    #[inline]
    pub fn num_classes(&self) -> usize {
        self.model.num_classes()
    }

    /// Accumulate per-class sums into `output`.
    ///
    /// `output` is zeroed first.
    ///
    /// # Panics
    ///
    /// Panics if `output.len() != num_classes()`.
    pub fn predict_raw_into(&self, features: &[f64], output: &mut [f64]) {
        assert_eq!(
            output.len(),
            self.num_classes(),
            "output length must match number of classes"
        );
        output.fill(0.0);

        for ((tree, state), &class) in self
            .model
            .trees()
            .iter()
            .zip(self.tree_states.iter())
            .zip(self.tree_classes.iter())
        {
            output[class] += T::traverse_tree(tree, state, features);
        }
    }

    /// Predict per-class sums for a single row.
    ///
    /// Returns a vector with one value per class.
    #[inline]
    pub fn predict_raw(&self, features: &[f64]) -> Vec<f64> {
        let mut output = vec![0.0; self.num_classes()];
        self.predict_raw_into(features, &mut output);
        output
    }
}

impl<T: TreeTraversal> fmt::Debug for Predictor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predictor")
            .field("traversal", &std::any::type_name::<T>())
            .field("num_trees", &self.model.num_trees())
            .field("num_classes", &self.model.num_classes())
            .finish()
    }
}

// =============================================================================
// Type Aliases for Convenience
// =============================================================================

/// Predictor that interprets the node graph directly.
pub type InterpretedPredictor = Predictor<StandardTraversal>;

/// Predictor over closure-compiled trees.
pub type CompiledPredictor = Predictor<CompiledTraversal>;

impl InterpretedPredictor {
    /// Build the interpreter; this cannot fail.
    pub fn interpreted(model: Arc<TreeModel>) -> Self {
        match Self::new(model, &StandardTraversal) {
            Ok(predictor) => predictor,
            Err(never) => match never {},
        }
    }
}

impl CompiledPredictor {
    pub fn compiled(model: Arc<TreeModel>, limits: CompileLimits) -> Result<Self, CompileError> {
        Self::new(model, &CompiledTraversal::new(limits))
    }
}

// =============================================================================
// Strategy
// =============================================================================

/// Which evaluation strategy a predictor runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    Interpreted,
    Compiled,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StrategyKind::Interpreted => "interpreted",
            StrategyKind::Compiled => "compiled",
        })
    }
}

/// A built predictor of either strategy.
#[derive(Debug)]
pub enum Strategy {
    Interpreted(InterpretedPredictor),
    Compiled(CompiledPredictor),
}

impl Strategy {
    #[inline]
    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::Interpreted(_) => StrategyKind::Interpreted,
            Strategy::Compiled(_) => StrategyKind::Compiled,
        }
    }

    #[inline]
    pub fn model(&self) -> &Arc<TreeModel> {
        match self {
            Strategy::Interpreted(p) => p.model(),
            Strategy::Compiled(p) => p.model(),
        }
    }

    #[inline]
    pub fn predict_raw_into(&self, features: &[f64], output: &mut [f64]) {
        match self {
            Strategy::Interpreted(p) => p.predict_raw_into(features, output),
            Strategy::Compiled(p) => p.predict_raw_into(features, output),
        }
    }

    #[inline]
    pub fn predict_raw(&self, features: &[f64]) -> Vec<f64> {
        match self {
            Strategy::Interpreted(p) => p.predict_raw(features),
            Strategy::Compiled(p) => p.predict_raw(features),
        }
    }
}

impl From<InterpretedPredictor> for Strategy {
    fn from(predictor: InterpretedPredictor) -> Self {
        Strategy::Interpreted(predictor)
    }
}

impl From<CompiledPredictor> for Strategy {
    fn from(predictor: CompiledPredictor) -> Self {
        Strategy::Compiled(predictor)
    }
}
