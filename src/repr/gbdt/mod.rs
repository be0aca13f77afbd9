//! Gradient-boosted decision tree (GBDT) canonical representation.
//!
//! - [`TreeModel`]: the validated ensemble plus its metadata
//! - [`Tree`]: one tree, owning its node graph and categorical bitset
//! - [`TreeNode`]: leaf or split; splits own their two children

pub mod categories;
pub mod model;
pub mod node;
pub mod tree;

pub use categories::{
    categories_to_bitset, find_in_bitset, float_to_category, CategoryBitset, CategoryRange,
    CATEGORIES_PER_WORD,
};
pub use model::{ModelValidationError, TreeModel};
pub use node::{Direction, MissingType, SplitCondition, SplitNode, TreeNode, ZERO_THRESHOLD};
pub use tree::Tree;
