//! Ensemble-level model: trees plus the metadata prediction needs.

use crate::model::ObjectiveTransform;

use super::tree::Tree;

/// A violated model invariant.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelValidationError {
    #[error("model contains no trees")]
    NoTrees,
    #[error("model has no meta block")]
    MissingMetaBlock,
    #[error("num_class must be positive, got {0}")]
    NonPositiveNumClass(i64),
    #[error("max_feature_idx must not be negative, got {0}")]
    NegativeMaxFeatureIndex(i64),
    #[error("num_tree_per_iteration must be positive, got {0}")]
    NonPositiveTreesPerIteration(i64),
    #[error("unsupported objective type: {0:?}")]
    UnsupportedObjective(String),
    #[error("tree {tree}: split feature {feature} exceeds max_feature_idx {max_feature_index}")]
    FeatureIndexOutOfRange {
        tree: usize,
        feature: u32,
        max_feature_index: usize,
    },
    #[error("tree index {tree_index} is duplicated or outside [0, {num_trees})")]
    TreeIndexNotDense { tree_index: usize, num_trees: usize },
    #[error("tree {tree}: categorical range [{begin}, {end}) outside bitset of {len} words")]
    CategoryRangeOutOfBounds {
        tree: usize,
        begin: u32,
        end: u32,
        len: usize,
    },
}

/// A parsed, validated tree ensemble. Immutable after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeModel {
    num_classes: usize,
    trees_per_iteration: usize,
    max_feature_index: usize,
    objective_type: String,
    objective_config: String,
    objective: ObjectiveTransform,
    contains_categorical_split: bool,
    trees: Vec<Tree>,
}

impl TreeModel {
    /// Build a model, checking every ensemble invariant.
    ///
    /// Fails if there are no trees, a class/iteration count is zero, the
    /// objective is unsupported, a split reads past `max_feature_index`,
    /// tree indices are not dense over `[0, trees.len())`, or a categorical
    /// range falls outside its tree's bitset.
    pub fn new(
        num_classes: usize,
        trees_per_iteration: usize,
        max_feature_index: usize,
        objective_type: impl Into<String>,
        objective_config: impl Into<String>,
        trees: Vec<Tree>,
    ) -> Result<Self, ModelValidationError> {
        let objective_type = objective_type.into();
        let objective_config = objective_config.into();

        if trees.is_empty() {
            return Err(ModelValidationError::NoTrees);
        }
        if num_classes == 0 {
            return Err(ModelValidationError::NonPositiveNumClass(0));
        }
        if trees_per_iteration == 0 {
            return Err(ModelValidationError::NonPositiveTreesPerIteration(0));
        }
        let objective = ObjectiveTransform::from_objective(&objective_type, &objective_config)?;

        let mut seen = vec![false; trees.len()];
        let mut contains_categorical_split = false;
        for (position, tree) in trees.iter().enumerate() {
            let tree_index = tree.tree_index();
            match seen.get_mut(tree_index) {
                Some(slot) if !*slot => *slot = true,
                _ => {
                    return Err(ModelValidationError::TreeIndexNotDense {
                        tree_index,
                        num_trees: trees.len(),
                    })
                }
            }

            if let Some(feature) = tree.max_split_feature() {
                if feature as usize > max_feature_index {
                    return Err(ModelValidationError::FeatureIndexOutOfRange {
                        tree: position,
                        feature,
                        max_feature_index,
                    });
                }
            }

            if let Some(range) = tree.out_of_bounds_range() {
                return Err(ModelValidationError::CategoryRangeOutOfBounds {
                    tree: position,
                    begin: range.begin,
                    end: range.end,
                    len: tree.categories().len(),
                });
            }

            contains_categorical_split |= tree.has_categorical_split();
        }

        Ok(Self {
            num_classes,
            trees_per_iteration,
            max_feature_index,
            objective_type,
            objective_config,
            objective,
            contains_categorical_split,
            trees,
        })
    }

    #[inline]
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    #[inline]
    pub fn trees_per_iteration(&self) -> usize {
        self.trees_per_iteration
    }

    /// Highest feature index the model may read.
    #[inline]
    pub fn max_feature_index(&self) -> usize {
        self.max_feature_index
    }

    /// Longest feature vector the model accepts (`max_feature_index + 1`).
    #[inline]
    pub fn num_features(&self) -> usize {
        self.max_feature_index + 1
    }

    #[inline]
    pub fn objective_type(&self) -> &str {
        &self.objective_type
    }

    #[inline]
    pub fn objective_config(&self) -> &str {
        &self.objective_config
    }

    /// Output transform resolved from the objective.
    #[inline]
    pub fn objective(&self) -> ObjectiveTransform {
        self.objective
    }

    #[inline]
    pub fn contains_categorical_split(&self) -> bool {
        self.contains_categorical_split
    }

    #[inline]
    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    #[inline]
    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    /// Total number of nodes over all trees.
    pub fn num_nodes(&self) -> usize {
        self.trees.iter().map(Tree::num_nodes).sum()
    }

    /// Output class each tree contributes to, in tree order.
    pub fn tree_classes(&self) -> impl Iterator<Item = usize> + '_ {
        self.trees
            .iter()
            .map(move |tree| tree.tree_index() % self.num_classes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repr::gbdt::{CategoryBitset, CategoryRange, Direction, MissingType, TreeNode};

    fn stump(index: usize, feature: u32) -> Tree {
        Tree::new(
            index,
            TreeNode::numeric(
                feature,
                0.0,
                MissingType::None,
                Direction::Right,
                TreeNode::leaf(-1.0),
                TreeNode::leaf(1.0),
            ),
        )
    }

    #[test]
    fn builds_valid_model() {
        let model =
            TreeModel::new(3, 3, 4, "multiclass", "num_class:3", (0..6).map(|i| stump(i, 4)).collect())
                .unwrap();
        assert_eq!(model.num_trees(), 6);
        assert_eq!(model.num_features(), 5);
        assert_eq!(model.objective(), ObjectiveTransform::Multiclass);
        assert!(!model.contains_categorical_split());
        assert_eq!(model.tree_classes().collect::<Vec<_>>(), vec![0, 1, 2, 0, 1, 2]);
        assert_eq!(model.num_nodes(), 18);
    }

    #[test]
    fn rejects_empty_ensemble() {
        let err = TreeModel::new(1, 1, 0, "regression", "", vec![]).unwrap_err();
        assert_eq!(err, ModelValidationError::NoTrees);
    }

    #[test]
    fn rejects_zero_counts() {
        assert_eq!(
            TreeModel::new(0, 1, 0, "regression", "", vec![stump(0, 0)]).unwrap_err(),
            ModelValidationError::NonPositiveNumClass(0)
        );
        assert_eq!(
            TreeModel::new(1, 0, 0, "regression", "", vec![stump(0, 0)]).unwrap_err(),
            ModelValidationError::NonPositiveTreesPerIteration(0)
        );
    }

    #[test]
    fn rejects_unknown_objective() {
        let err = TreeModel::new(1, 1, 0, "lambdarank", "", vec![stump(0, 0)]).unwrap_err();
        assert_eq!(err, ModelValidationError::UnsupportedObjective("lambdarank".into()));
    }

    #[test]
    fn rejects_feature_past_max_index() {
        let err = TreeModel::new(1, 1, 2, "regression", "", vec![stump(0, 3)]).unwrap_err();
        assert!(matches!(
            err,
            ModelValidationError::FeatureIndexOutOfRange { feature: 3, max_feature_index: 2, .. }
        ));
    }

    #[test]
    fn rejects_sparse_tree_indices() {
        let err =
            TreeModel::new(1, 1, 0, "regression", "", vec![stump(0, 0), stump(2, 0)]).unwrap_err();
        assert_eq!(
            err,
            ModelValidationError::TreeIndexNotDense {
                tree_index: 2,
                num_trees: 2
            }
        );

        let err =
            TreeModel::new(1, 1, 0, "regression", "", vec![stump(0, 0), stump(0, 0)]).unwrap_err();
        assert!(matches!(err, ModelValidationError::TreeIndexNotDense { tree_index: 0, .. }));
    }

    #[test]
    fn rejects_category_range_outside_bitset() {
        let root = TreeNode::categorical(
            0,
            CategoryRange::new(0, 1),
            TreeNode::leaf(1.0),
            TreeNode::leaf(2.0),
        );
        let tree = Tree::with_categories(0, root, CategoryBitset::empty());
        let err = TreeModel::new(1, 1, 0, "regression", "", vec![tree]).unwrap_err();
        assert!(matches!(err, ModelValidationError::CategoryRangeOutOfBounds { len: 0, .. }));
    }

    #[test]
    fn flags_categorical_models() {
        let root = TreeNode::categorical(
            0,
            CategoryRange::new(0, 1),
            TreeNode::leaf(1.0),
            TreeNode::leaf(2.0),
        );
        let tree = Tree::with_categories(0, root, CategoryBitset::new(vec![0b100]));
        let model = TreeModel::new(1, 1, 0, "binary", "sigmoid:1", vec![tree]).unwrap();
        assert!(model.contains_categorical_split());
    }
}
