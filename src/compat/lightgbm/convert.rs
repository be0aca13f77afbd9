//! Conversion from parsed LightGBM blocks to a validated [`TreeModel`].

use crate::repr::gbdt::{
    CategoryBitset, CategoryRange, Direction, ModelValidationError, Tree, TreeModel, TreeNode,
};

use super::text::{DecisionType, LgbModel, LgbTreeBlock, ParseError};

/// Error type for loading a LightGBM model from text.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("invalid model: {0}")]
    Validation(#[from] ModelValidationError),
}

/// Parse model text lines straight into a validated [`TreeModel`].
pub fn parse_tree_model<I, S>(lines: I) -> Result<TreeModel, ModelError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    LgbModel::from_lines(lines)?.to_tree_model()
}

impl LgbModel {
    /// Build node graphs for every tree block and validate the ensemble.
    pub fn to_tree_model(&self) -> Result<TreeModel, ModelError> {
        let header = self
            .header
            .as_ref()
            .ok_or(ModelValidationError::MissingMetaBlock)?;

        if header.num_class <= 0 {
            return Err(ModelValidationError::NonPositiveNumClass(header.num_class).into());
        }
        if header.max_feature_idx < 0 {
            return Err(ModelValidationError::NegativeMaxFeatureIndex(header.max_feature_idx).into());
        }
        if header.num_tree_per_iteration <= 0 {
            return Err(
                ModelValidationError::NonPositiveTreesPerIteration(header.num_tree_per_iteration)
                    .into(),
            );
        }

        let trees = self
            .trees
            .iter()
            .map(convert_tree)
            .collect::<Result<Vec<_>, _>>()?;

        let model = TreeModel::new(
            header.num_class as usize,
            header.num_tree_per_iteration as usize,
            header.max_feature_idx as usize,
            header.objective_type.as_str(),
            header.objective_config.as_str(),
            trees,
        )?;
        Ok(model)
    }
}

/// Convert a single tree block to an owned node graph.
fn convert_tree(block: &LgbTreeBlock) -> Result<Tree, ParseError> {
    let categories = CategoryBitset::new(block.cat_threshold.clone());

    if block.is_single_leaf() {
        // Parser guarantees exactly one leaf value here.
        let value = block.leaf_value.first().copied().unwrap_or(0.0);
        return Ok(Tree::with_categories(block.tree_index, TreeNode::leaf(value), categories));
    }

    let root = build_nodes(block)?;
    Ok(Tree::with_categories(block.tree_index, root, categories))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    Unseen,
    /// On the stack, children not yet expanded
    Pending,
    /// Children expanded, waiting for them to be assembled
    Expanded,
    Done,
}

/// Reference to a child in LightGBM's encoding.
#[derive(Debug, Clone, Copy)]
enum ChildRef {
    Internal(usize),
    Leaf(usize),
}

/// Decode a child entry: `>= 0` is an internal node, `v < 0` is leaf `-v - 1`.
fn child_ref(block: &LgbTreeBlock, node: usize, child: i32) -> Result<ChildRef, ParseError> {
    let invalid = ParseError::InvalidChildIndex {
        tree: block.tree_index,
        node,
        child,
    };
    if child >= 0 {
        let idx = child as usize;
        if idx >= block.num_splits() {
            return Err(invalid);
        }
        Ok(ChildRef::Internal(idx))
    } else {
        // !child == -child - 1 without overflow at i32::MIN
        let idx = (!child) as usize;
        if idx >= block.leaf_value.len() {
            return Err(invalid);
        }
        Ok(ChildRef::Leaf(idx))
    }
}

/// Assemble the tree rooted at internal node 0.
///
/// Iterative post-order so arbitrarily deep trees cannot overflow the call
/// stack. Every internal node must be reached exactly once from the root;
/// a node referenced twice (shared subtree or cycle) is rejected.
fn build_nodes(block: &LgbTreeBlock) -> Result<TreeNode, ParseError> {
    let n = block.num_splits();
    if n == 0 {
        return Err(ParseError::MissingField {
            tree: Some(block.tree_index),
            field: "left_child",
        });
    }
    for (field, len) in [
        ("right_child", block.right_child.len()),
        ("split_feature", block.split_feature.len()),
        ("decision_type", block.decision_type.len()),
        ("threshold", block.threshold.len()),
    ] {
        if len != n {
            return Err(ParseError::ArraySizeMismatch {
                field,
                expected: n,
                actual: len,
            });
        }
    }

    let mut state = vec![Visit::Unseen; n];
    let mut built: Vec<Option<TreeNode>> = (0..n).map(|_| None).collect();

    let mut stack = vec![0usize];
    state[0] = Visit::Pending;

    while let Some(&node) = stack.last() {
        match state[node] {
            Visit::Pending => {
                state[node] = Visit::Expanded;
                for child in [block.left_child[node], block.right_child[node]] {
                    if let ChildRef::Internal(idx) = child_ref(block, node, child)? {
                        if state[idx] != Visit::Unseen {
                            return Err(ParseError::InvalidChildIndex {
                                tree: block.tree_index,
                                node,
                                child,
                            });
                        }
                        state[idx] = Visit::Pending;
                        stack.push(idx);
                    }
                }
            }
            Visit::Expanded => {
                stack.pop();
                let left = take_child(block, node, block.left_child[node], &mut built)?;
                let right = take_child(block, node, block.right_child[node], &mut built)?;
                built[node] = Some(build_split(block, node, left, right)?);
                state[node] = Visit::Done;
            }
            Visit::Unseen | Visit::Done => {
                stack.pop();
            }
        }
    }

    built[0].take().ok_or(ParseError::InvalidChildIndex {
        tree: block.tree_index,
        node: 0,
        child: 0,
    })
}

fn take_child(
    block: &LgbTreeBlock,
    node: usize,
    child: i32,
    built: &mut [Option<TreeNode>],
) -> Result<TreeNode, ParseError> {
    match child_ref(block, node, child)? {
        ChildRef::Leaf(idx) => Ok(TreeNode::leaf(block.leaf_value[idx])),
        ChildRef::Internal(idx) => built[idx].take().ok_or(ParseError::InvalidChildIndex {
            tree: block.tree_index,
            node,
            child,
        }),
    }
}

fn build_split(
    block: &LgbTreeBlock,
    node: usize,
    left: TreeNode,
    right: TreeNode,
) -> Result<TreeNode, ParseError> {
    let raw_feature = block.split_feature[node];
    let feature_index = u32::try_from(raw_feature).map_err(|_| ParseError::InvalidValue {
        field: "split_feature",
        token: raw_feature.to_string(),
    })?;

    let dt = DecisionType::from_bits(block.decision_type[node]);
    let threshold = block.threshold[node];

    if dt.is_categorical {
        let range = category_range(block, threshold)?;
        Ok(TreeNode::categorical(feature_index, range, left, right))
    } else {
        Ok(TreeNode::numeric(
            feature_index,
            threshold,
            dt.missing_type,
            Direction::from_default_left(dt.default_left),
            left,
            right,
        ))
    }
}

/// Resolve the bitset words a categorical split reads.
///
/// With `cat_boundaries`, split `k` reads `[cat_boundaries[k], cat_boundaries[k+1])`.
/// Without them, `threshold` is the word offset itself and the range is `[k, k+1)`.
fn category_range(block: &LgbTreeBlock, threshold: f64) -> Result<CategoryRange, ParseError> {
    let invalid = || ParseError::InvalidValue {
        field: "threshold",
        token: threshold.to_string(),
    };
    if !(threshold >= 0.0 && threshold <= u32::MAX as f64) {
        return Err(invalid());
    }
    let k = threshold as u32;

    if block.cat_boundaries.is_empty() {
        return Ok(CategoryRange::new(k, k.saturating_add(1)));
    }

    let k = k as usize;
    match (block.cat_boundaries.get(k), block.cat_boundaries.get(k + 1)) {
        (Some(&begin), Some(&end)) => Ok(CategoryRange::new(begin, end)),
        _ => Err(invalid()),
    }
}
