//! Caller-facing model types.
//!
//! - [`ObjectiveTransform`]: maps raw per-class sums to published predictions
//! - [`LgbPredictor`]: input validation plus `predict` / `predict_raw`

mod predictor;
mod transform;

pub use predictor::{LgbPredictor, PredictError};
pub use transform::ObjectiveTransform;
