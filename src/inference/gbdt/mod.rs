//! GBDT (Gradient Boosted Decision Trees) inference.
//!
//! This module provides the prediction strategies over a
//! [`TreeModel`](crate::repr::gbdt::TreeModel):
//!
//! - [`StandardTraversal`]: the reference interpreter, walking nodes per call
//! - [`CompiledTraversal`]: trees specialised once into closures
//! - [`Predictor`]: the ensemble accumulator shared by both
//! - [`RustSource`]: a Rust rendering of the specialised routine, for inspection
//!
//! # Choosing a Strategy
//!
//! Compilation costs time and memory proportional to the model, so the
//! factory compiles only models with at most
//! [`generation_threshold`](crate::FactoryConfig::generation_threshold) trees
//! and interprets the rest. Both strategies return identical raw sums.

mod codegen;
mod compiled;
mod predictor;
mod traversal;

pub use codegen::RustSource;
pub use compiled::{
    CompileError, CompileLimits, CompiledTraversal, CompiledTree, DEFAULT_MAX_DEPTH,
    DEFAULT_MAX_NODES,
};
pub use predictor::{
    CompiledPredictor, InterpretedPredictor, Predictor, Strategy, StrategyKind,
};
pub use traversal::{
    categorical_decision, decision, feature_value, is_zero, numeric_decision, StandardTraversal,
    TreeTraversal,
};
