//! lgbm-infer: prediction for LightGBM text-dump models.
//!
//! Loads the plain-text model format LightGBM writes, validates it into a
//! tree ensemble, and evaluates it with either a reference interpreter or a
//! per-model compiled executor that returns bit-identical raw scores.
//!
//! # Key Types
//!
//! - [`PredictorFactory`] - Loads, builds and caches predictors by model name
//! - [`LgbPredictor`] - `predict` / `predict_raw` on one loaded model
//! - [`TreeModel`] - The validated ensemble
//! - [`ResourceLoader`] - Where model text comes from
//!
//! # Loading a Model
//!
//! Most callers go through the factory:
//!
//! ```no_run
//! use lgbm_infer::{BuildOptions, PredictorFactory};
//!
//! let predictor = PredictorFactory::global()
//!     .get_or_create("churn", "models/churn.txt", &BuildOptions::default())?;
//! let scores = predictor.predict(&[0.3, 1.0, f64::NAN])?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Lower-level pieces ([`compat`], [`inference`], [`repr`]) can be used on
//! their own.

// Re-export approx traits for users who want to compare predictions
pub use approx;

pub mod compat;
pub mod factory;
pub mod inference;
pub mod loader;
pub mod model;
pub mod repr;
pub mod testing;

// =============================================================================
// Convenience Re-exports
// =============================================================================

pub use factory::{BuildOptions, FactoryConfig, FactoryError, PredictorFactory};
pub use loader::{FileLoader, LoadError, MemoryLoader, ResourceLoader};
pub use model::{LgbPredictor, ObjectiveTransform, PredictError};

pub use compat::{parse_tree_model, ModelError, ParseError};
pub use inference::{CompileError, CompileLimits, StrategyKind};
pub use repr::gbdt::{ModelValidationError, TreeModel};
