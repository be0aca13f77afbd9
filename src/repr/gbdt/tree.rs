//! A single decision tree of an ensemble.

use super::categories::CategoryBitset;
use super::node::{SplitCondition, TreeNode};

/// One tree of a [`TreeModel`](super::TreeModel).
///
/// Owns its node graph and the categorical bitset its splits index into.
/// `tree_index` is the tree's position in the ensemble; the tree adds its
/// output to class `tree_index % num_classes`.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    tree_index: usize,
    root: TreeNode,
    categories: CategoryBitset,
}

impl Tree {
    /// Create a tree without categorical splits.
    pub fn new(tree_index: usize, root: TreeNode) -> Self {
        Self::with_categories(tree_index, root, CategoryBitset::empty())
    }

    /// Create a tree whose categorical splits index into `categories`.
    pub fn with_categories(tree_index: usize, root: TreeNode, categories: CategoryBitset) -> Self {
        Self {
            tree_index,
            root,
            categories,
        }
    }

    #[inline]
    pub fn tree_index(&self) -> usize {
        self.tree_index
    }

    #[inline]
    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    #[inline]
    pub fn categories(&self) -> &CategoryBitset {
        &self.categories
    }

    /// Number of nodes (splits and leaves).
    pub fn num_nodes(&self) -> usize {
        self.root.num_nodes()
    }

    pub fn depth(&self) -> usize {
        self.root.depth()
    }

    /// Whether any split of this tree is categorical.
    pub fn has_categorical_split(&self) -> bool {
        let mut found = false;
        self.root.for_each(|node, _| {
            if let TreeNode::Split(split) = node {
                found |= split.is_categorical();
            }
        });
        found
    }

    /// Largest feature index referenced by a split, if the tree has splits.
    pub fn max_split_feature(&self) -> Option<u32> {
        let mut max = None;
        self.root.for_each(|node, _| {
            if let TreeNode::Split(split) = node {
                max = max.max(Some(split.feature_index));
            }
        });
        max
    }

    /// First categorical range that falls outside the bitset store.
    pub(crate) fn out_of_bounds_range(&self) -> Option<super::CategoryRange> {
        let mut bad = None;
        self.root.for_each(|node, _| {
            if let TreeNode::Split(split) = node {
                if let SplitCondition::Categorical { range } = split.condition {
                    if bad.is_none() && !self.categories.contains_range(range) {
                        bad = Some(range);
                    }
                }
            }
        });
        bad
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repr::gbdt::{CategoryRange, Direction, MissingType};

    #[test]
    fn tree_introspection() {
        let root = TreeNode::numeric(
            4,
            0.5,
            MissingType::None,
            Direction::Right,
            TreeNode::categorical(
                7,
                CategoryRange::new(0, 1),
                TreeNode::leaf(1.0),
                TreeNode::leaf(2.0),
            ),
            TreeNode::leaf(3.0),
        );
        let tree = Tree::with_categories(3, root, CategoryBitset::new(vec![0b10]));

        assert_eq!(tree.tree_index(), 3);
        assert_eq!(tree.num_nodes(), 5);
        assert_eq!(tree.depth(), 2);
        assert!(tree.has_categorical_split());
        assert_eq!(tree.max_split_feature(), Some(7));
        assert_eq!(tree.out_of_bounds_range(), None);
    }

    #[test]
    fn detects_range_outside_store() {
        let root = TreeNode::categorical(
            0,
            CategoryRange::new(1, 2),
            TreeNode::leaf(1.0),
            TreeNode::leaf(2.0),
        );
        let tree = Tree::with_categories(0, root, CategoryBitset::new(vec![1]));
        assert_eq!(tree.out_of_bounds_range(), Some(CategoryRange::new(1, 2)));
    }

    #[test]
    fn single_leaf_tree() {
        let tree = Tree::new(0, TreeNode::leaf(0.25));
        assert_eq!(tree.num_nodes(), 1);
        assert_eq!(tree.max_split_feature(), None);
        assert!(!tree.has_categorical_split());
    }
}
