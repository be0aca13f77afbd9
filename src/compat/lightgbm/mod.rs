//! LightGBM text model support.
//!
//! [`text`] splits a model dump into raw blocks; [`convert`] turns those
//! blocks into a validated [`TreeModel`](crate::repr::gbdt::TreeModel).

pub mod convert;
pub mod text;

pub use convert::{parse_tree_model, ModelError};
pub use text::{split_objective, DecisionType, LgbHeader, LgbModel, LgbTreeBlock, ParseError};
