//! The predictor handed to callers.
//!
//! [`LgbPredictor`] wraps a built [`Strategy`] with the model's output
//! transform and validates every feature vector before evaluation.

use std::sync::Arc;

use rayon::prelude::*;

use crate::inference::gbdt::{Strategy, StrategyKind};
use crate::repr::gbdt::TreeModel;

use super::transform::ObjectiveTransform;

/// Error for a single prediction call. Never affects the predictor itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PredictError {
    #[error("feature vector has {len} values, model accepts at most {max_len}")]
    InvalidInput { len: usize, max_len: usize },
    #[error("no feature vector supplied")]
    MissingInput,
}

/// A loaded, immutable model ready for prediction.
///
/// Cheap to share: the factory hands out `Arc<LgbPredictor>` and every
/// method takes `&self`, so any number of threads may predict at once.
#[derive(Debug)]
pub struct LgbPredictor {
    name: String,
    inner: Strategy,
    objective: ObjectiveTransform,
}

impl LgbPredictor {
    /// Wrap a built strategy under `name`, using the model's objective.
    pub fn new(name: impl Into<String>, inner: Strategy) -> Self {
        let objective = inner.model().objective();
        Self {
            name: name.into(),
            inner,
            objective,
        }
    }

    /// Model name this predictor was built for.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn model(&self) -> &Arc<TreeModel> {
        self.inner.model()
    }

    #[inline]
    pub fn num_classes(&self) -> usize {
        self.model().num_classes()
    }

    #[inline]
    pub fn max_feature_index(&self) -> usize {
        self.model().max_feature_index()
    }

    #[inline]
    pub fn objective(&self) -> ObjectiveTransform {
        self.objective
    }

    /// Which strategy evaluates the trees.
    #[inline]
    pub fn strategy_kind(&self) -> StrategyKind {
        self.inner.kind()
    }

    /// Reject vectors longer than `max_feature_index + 1`.
    ///
    /// Shorter vectors are accepted; the missing trailing features read as NaN.
    #[inline]
    fn check(&self, features: &[f64]) -> Result<(), PredictError> {
        let max_len = self.model().num_features();
        if features.len() > max_len {
            return Err(PredictError::InvalidInput {
                len: features.len(),
                max_len,
            });
        }
        Ok(())
    }

    /// Per-class ensemble sums, without the objective transform.
    pub fn predict_raw(&self, features: &[f64]) -> Result<Vec<f64>, PredictError> {
        self.check(features)?;
        Ok(self.inner.predict_raw(features))
    }

    /// Ensemble sums passed through the objective transform.
    pub fn predict(&self, features: &[f64]) -> Result<Vec<f64>, PredictError> {
        let raw = self.predict_raw(features)?;
        Ok(self.objective.transform(&raw))
    }

    /// [`predict_raw`](Self::predict_raw) for a possibly absent vector.
    pub fn predict_raw_opt(&self, features: Option<&[f64]>) -> Result<Vec<f64>, PredictError> {
        self.predict_raw(features.ok_or(PredictError::MissingInput)?)
    }

    /// [`predict`](Self::predict) for a possibly absent vector.
    pub fn predict_opt(&self, features: Option<&[f64]>) -> Result<Vec<f64>, PredictError> {
        self.predict(features.ok_or(PredictError::MissingInput)?)
    }

    /// Predict each row in order; stops at the first invalid row.
    pub fn predict_batch<R: AsRef<[f64]>>(&self, rows: &[R]) -> Result<Vec<Vec<f64>>, PredictError> {
        rows.iter().map(|row| self.predict(row.as_ref())).collect()
    }

    /// Parallel [`predict_batch`](Self::predict_batch) on the rayon pool.
    ///
    /// Best for large batches; output order matches `rows`.
    pub fn par_predict_batch<R: AsRef<[f64]> + Sync>(
        &self,
        rows: &[R],
    ) -> Result<Vec<Vec<f64>>, PredictError> {
        rows.par_iter().map(|row| self.predict(row.as_ref())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::gbdt::{CompileLimits, CompiledPredictor, InterpretedPredictor};
    use crate::repr::gbdt::{Direction, MissingType, Tree, TreeNode};
    use approx::assert_abs_diff_eq;

    fn binary_model() -> Arc<TreeModel> {
        let root = TreeNode::numeric(
            2,
            0.0,
            MissingType::None,
            Direction::Right,
            TreeNode::leaf(0.0),
            TreeNode::leaf(2.0),
        );
        Arc::new(TreeModel::new(1, 1, 2, "binary", "sigmoid:1", vec![Tree::new(0, root)]).unwrap())
    }

    fn predictors() -> Vec<LgbPredictor> {
        let model = binary_model();
        vec![
            LgbPredictor::new("bin", InterpretedPredictor::interpreted(Arc::clone(&model)).into()),
            LgbPredictor::new(
                "bin",
                CompiledPredictor::compiled(model, CompileLimits::default())
                    .unwrap()
                    .into(),
            ),
        ]
    }

    #[test]
    fn introspection() {
        let p = &predictors()[1];
        assert_eq!(p.name(), "bin");
        assert_eq!(p.num_classes(), 1);
        assert_eq!(p.max_feature_index(), 2);
        assert_eq!(p.objective(), ObjectiveTransform::Binary { sigmoid: 1.0 });
        assert_eq!(p.strategy_kind(), StrategyKind::Compiled);
        assert_eq!(p.model().num_trees(), 1);
    }

    #[test]
    fn raw_zero_gives_half() {
        for p in predictors() {
            assert_eq!(p.predict_raw(&[0.0, 0.0, -1.0]).unwrap(), vec![0.0]);
            assert_eq!(p.predict(&[0.0, 0.0, -1.0]).unwrap(), vec![0.5]);
        }
    }

    #[test]
    fn transform_applied() {
        for p in predictors() {
            let out = p.predict(&[0.0, 0.0, 1.0]).unwrap();
            assert_abs_diff_eq!(out[0], 1.0 / (1.0 + (-2.0f64).exp()), epsilon = 1e-15);
        }
    }

    #[test]
    fn rejects_long_vectors() {
        for p in predictors() {
            let err = p.predict(&[0.0; 4]).unwrap_err();
            assert_eq!(err, PredictError::InvalidInput { len: 4, max_len: 3 });
            assert_eq!(
                p.predict_raw(&[0.0; 10]).unwrap_err(),
                PredictError::InvalidInput {
                    len: 10,
                    max_len: 3
                }
            );
            // still usable afterwards
            assert!(p.predict(&[0.0; 3]).is_ok());
        }
    }

    #[test]
    fn accepts_short_vectors() {
        for p in predictors() {
            // feature 2 absent reads NaN, which a plain split treats as 0.0
            assert_eq!(p.predict_raw(&[]).unwrap(), vec![0.0]);
        }
    }

    #[test]
    fn rejects_absent_vectors() {
        for p in predictors() {
            assert_eq!(p.predict_opt(None).unwrap_err(), PredictError::MissingInput);
            assert_eq!(p.predict_raw_opt(None).unwrap_err(), PredictError::MissingInput);
            assert_eq!(p.predict_opt(Some(&[0.0, 0.0, 0.0][..])).unwrap(), vec![0.5]);
        }
    }

    #[test]
    fn batch_prediction() {
        let rows = vec![vec![0.0, 0.0, -1.0], vec![0.0, 0.0, 1.0], vec![]];
        for p in predictors() {
            let serial = p.predict_batch(&rows).unwrap();
            let parallel = p.par_predict_batch(&rows).unwrap();
            assert_eq!(serial, parallel);
            assert_eq!(serial.len(), 3);
            assert_eq!(serial[0], vec![0.5]);
        }

        let bad = vec![vec![0.0; 3], vec![0.0; 5]];
        assert!(matches!(
            predictors()[0].par_predict_batch(&bad),
            Err(PredictError::InvalidInput { len: 5, .. })
        ));
    }
}
