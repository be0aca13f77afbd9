//! External format compatibility loaders.
//!
//! Models trained elsewhere are parsed here and converted to the crate's
//! own [`repr`](crate::repr) types.

pub mod lightgbm;

pub use lightgbm::{parse_tree_model, LgbModel, ModelError, ParseError};
