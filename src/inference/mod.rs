//! Inference infrastructure for parsed tree ensembles.
//!
//! # Module Structure
//!
//! - [`gbdt`]: Traversal strategies and the ensemble predictor
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use lgbm_infer::compat::parse_tree_model;
//! use lgbm_infer::inference::InterpretedPredictor;
//!
//! let text = "\
//! tree
//! num_class=1
//! num_tree_per_iteration=1
//! max_feature_idx=0
//! objective=regression
//!
//! Tree=0
//! num_leaves=1
//! leaf_value=0.25
//! ";
//! let model = Arc::new(parse_tree_model(text.lines())?);
//! let predictor = InterpretedPredictor::interpreted(model);
//! assert_eq!(predictor.predict_raw(&[1.0]), vec![0.25]);
//! # Ok::<(), lgbm_infer::compat::ModelError>(())
//! ```

pub mod gbdt;

// Re-export commonly used types
pub use gbdt::{
    CompileError, CompileLimits, CompiledPredictor, CompiledTraversal, InterpretedPredictor,
    Predictor, StandardTraversal, Strategy, StrategyKind, TreeTraversal,
};
