//! Output transformation for inference.
//!
//! The [`ObjectiveTransform`] enum defines how raw per-class sums are
//! converted to final predictions. It is resolved once from the model's
//! `objective` line and applied after every prediction.
//!
//! # Variants
//!
//! - [`Binary`](ObjectiveTransform::Binary): scaled sigmoid of class 0
//! - [`Multiclass`](ObjectiveTransform::Multiclass): softmax over all classes
//! - [`Regression`](ObjectiveTransform::Regression): class 0 unchanged
//! - [`RegressionSqrt`](ObjectiveTransform::RegressionSqrt): undo a sqrt label transform
//! - [`Exponential`](ObjectiveTransform::Exponential): `exp` of class 0 (log-link objectives)
//! - [`Passthrough`](ObjectiveTransform::Passthrough): class 0 unchanged, config ignored

use crate::repr::gbdt::ModelValidationError;

/// Objective config value that marks a square-root label transform.
const SQRT_CONFIG: &str = "sqrt";

/// Inference-time output transformation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ObjectiveTransform {
    /// `[1 / (1 + exp(-sigmoid * raw[0]))]`.
    Binary { sigmoid: f64 },

    /// Softmax over the full raw vector, max-subtracted.
    Multiclass,

    /// `[raw[0]]`.
    #[default]
    Regression,

    /// `[sign(raw[0]) * raw[0]^2]`, NaN passes through.
    RegressionSqrt,

    /// `[exp(raw[0])]`.
    Exponential,

    /// `[raw[0]]` for objectives whose config never changes the output.
    Passthrough,
}

impl ObjectiveTransform {
    /// Resolve the transform for an objective type and its config string.
    ///
    /// The config is everything after the type on the `objective=` line,
    /// e.g. `sigmoid:1` for `binary sigmoid:1`.
    pub fn from_objective(objective_type: &str, config: &str) -> Result<Self, ModelValidationError> {
        let transform = match objective_type {
            "binary" => ObjectiveTransform::Binary {
                sigmoid: parse_sigmoid(config),
            },
            "multiclass" => ObjectiveTransform::Multiclass,
            "regression" | "regression_l1" | "quantile" | "huber" | "fair" | "mape" => {
                if config == SQRT_CONFIG {
                    ObjectiveTransform::RegressionSqrt
                } else {
                    ObjectiveTransform::Regression
                }
            }
            "poisson" | "gamma" | "tweedie" => ObjectiveTransform::Exponential,
            "cross_entropy" | "cross_entropy_lambda" => ObjectiveTransform::Passthrough,
            other => return Err(ModelValidationError::UnsupportedObjective(other.to_string())),
        };
        Ok(transform)
    }

    /// Whether `objective_type` names a supported objective.
    pub fn is_supported(objective_type: &str) -> bool {
        Self::from_objective(objective_type, "").is_ok()
    }

    /// Transform a raw per-class vector into the published prediction.
    ///
    /// Every variant except [`Multiclass`](Self::Multiclass) returns a
    /// one-element vector derived from `raw[0]`.
    ///
    /// # Panics
    ///
    /// Panics if `raw` is empty; predictors always produce `num_classes > 0` sums.
    pub fn transform(&self, raw: &[f64]) -> Vec<f64> {
        match self {
            ObjectiveTransform::Binary { sigmoid } => vec![sigmoid_scaled(raw[0], *sigmoid)],
            ObjectiveTransform::Multiclass => softmax(raw),
            ObjectiveTransform::Regression | ObjectiveTransform::Passthrough => vec![raw[0]],
            ObjectiveTransform::RegressionSqrt => vec![signed_square(raw[0])],
            ObjectiveTransform::Exponential => vec![raw[0].exp()],
        }
    }
}

/// Parse the sigmoid scale from a `sigmoid:<value>` config.
///
/// Reads the token after the first `:`; anything unparsable yields 0.
fn parse_sigmoid(config: &str) -> f64 {
    config
        .split_once(':')
        .and_then(|(_, rest)| rest.split_whitespace().next())
        .and_then(|value| value.parse().ok())
        .unwrap_or(0.0)
}

#[inline]
fn sigmoid_scaled(x: f64, scale: f64) -> f64 {
    1.0 / (1.0 + (-scale * x).exp())
}

#[inline]
fn signed_square(x: f64) -> f64 {
    if x.is_nan() {
        return x;
    }
    let sign = if x >= 0.0 { 1.0 } else { -1.0 };
    x * x * sign
}

/// Max-subtracted softmax.
///
/// If every exponent underflows to zero the un-normalised vector is returned.
fn softmax(raw: &[f64]) -> Vec<f64> {
    let max = raw[1..]
        .iter()
        .fold(raw[0], |max, &x| if max < x { x } else { max });

    let mut output: Vec<f64> = raw.iter().map(|&x| (x - max).exp()).collect();
    let sum: f64 = output.iter().sum();
    if sum == 0.0 {
        return output;
    }
    for x in output.iter_mut() {
        *x /= sum;
    }
    output
}
