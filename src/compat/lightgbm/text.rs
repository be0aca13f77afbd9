//! LightGBM text model format parser.
//!
//! Scans the line-based dump LightGBM writes with `save_model()`. Two block
//! kinds are recognised:
//!
//! - the meta block, opened by a line that is exactly `tree`
//! - tree blocks, opened by a line `Tree=<index>`
//!
//! Each block is a run of `key=value` lines ended by a blank line (or the
//! next block header, or end of input). Lines outside a block are ignored,
//! which skips `tree_sizes`, `end of trees`, feature importances and the
//! `parameters:` trailer. This module only splits and tokenises; building
//! node graphs and checking model invariants lives in [`super::convert`].

use std::collections::HashMap;
use std::str::FromStr;

use crate::repr::gbdt::MissingType;

// =============================================================================
// Error types
// =============================================================================

/// Error type for LightGBM model parsing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("model text is not valid UTF-8 (valid up to byte {valid_up_to})")]
    InvalidEncoding { valid_up_to: usize },
    #[error("malformed key=value line {line_no}: {line:?}")]
    MalformedLine { line_no: usize, line: String },
    #[error("{}: missing required field {field}", block_name(.tree))]
    MissingField {
        /// Tree the field belongs to, `None` for the meta block.
        tree: Option<usize>,
        field: &'static str,
    },
    #[error("invalid value for {field}: {token:?}")]
    InvalidValue { field: &'static str, token: String },
    #[error("array size mismatch for {field}: expected {expected}, got {actual}")]
    ArraySizeMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("tree {tree}: node {node} has invalid child reference {child}")]
    InvalidChildIndex { tree: usize, node: usize, child: i32 },
    #[error("second meta block at line {line_no}")]
    DuplicateMetaBlock { line_no: usize },
}

fn block_name(tree: &Option<usize>) -> String {
    match tree {
        Some(index) => format!("tree {index}"),
        None => "meta block".to_string(),
    }
}

// =============================================================================
// Decision type bitfield
// =============================================================================

const CATEGORICAL_MASK: i32 = 1;
const DEFAULT_LEFT_MASK: i32 = 2;

/// Parsed decision type from LightGBM's bitfield.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecisionType {
    /// True if this is a categorical split
    pub is_categorical: bool,
    /// True if missing values go left
    pub default_left: bool,
    /// Missing value handling mode
    pub missing_type: MissingType,
}

impl DecisionType {
    /// Parse from LightGBM's decision_type bitfield.
    ///
    /// Bit layout:
    /// - Bit 0: categorical flag (1 = categorical)
    /// - Bit 1: default_left flag (1 = left)
    /// - Bits 2-3: missing type (0=None, 1=Zero, 2=NaN)
    ///
    /// Only the low byte is meaningful; LightGBM stores the field as `int8`.
    pub fn from_bits(value: i32) -> Self {
        DecisionType {
            is_categorical: (value & CATEGORICAL_MASK) != 0,
            default_left: (value & DEFAULT_LEFT_MASK) != 0,
            missing_type: MissingType::from_bits(((value >> 2) & 3) as u8),
        }
    }
}

// =============================================================================
// Parsed blocks
// =============================================================================

/// Raw contents of one `Tree=<n>` block.
///
/// Optional list keys the file leaves out (or writes with an empty value)
/// are empty vectors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LgbTreeBlock {
    /// Index from the `Tree=<n>` header line
    pub tree_index: usize,
    pub num_leaves: Option<usize>,
    pub num_cat: usize,
    /// Feature index for each internal node
    pub split_feature: Vec<i32>,
    /// Decision type bitfield for each internal node
    pub decision_type: Vec<i32>,
    /// Threshold (numeric) or categorical split index for each internal node
    pub threshold: Vec<f64>,
    /// Left child index for each internal node (negative = leaf)
    pub left_child: Vec<i32>,
    /// Right child index for each internal node (negative = leaf)
    pub right_child: Vec<i32>,
    pub leaf_value: Vec<f64>,
    pub internal_value: Vec<f64>,
    /// Word offsets of each categorical split's bitset (num_cat + 1 entries)
    pub cat_boundaries: Vec<u32>,
    /// Flat categorical bitset words for the whole tree
    pub cat_threshold: Vec<u64>,
}

impl LgbTreeBlock {
    /// Number of internal (split) nodes.
    #[inline]
    pub fn num_splits(&self) -> usize {
        self.left_child.len()
    }

    /// True for a tree that is a single leaf with no split arrays.
    pub fn is_single_leaf(&self) -> bool {
        self.left_child.is_empty() && self.num_leaves.map_or(true, |n| n <= 1)
    }
}

/// Parsed contents of the meta block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LgbHeader {
    /// Model format version (e.g., "v4"), if present
    pub version: Option<String>,
    /// Signed so that nonsensical values survive to validation
    pub num_class: i64,
    pub num_tree_per_iteration: i64,
    pub max_feature_idx: i64,
    /// First token of the `objective` line
    pub objective_type: String,
    /// Remainder of the `objective` line after the type, trimmed
    pub objective_config: String,
    pub feature_names: Vec<String>,
}

/// A model split into its raw blocks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LgbModel {
    /// The meta block, if the text had one
    pub header: Option<LgbHeader>,
    /// Tree blocks in file order
    pub trees: Vec<LgbTreeBlock>,
}

impl LgbModel {
    /// Parse a model from raw bytes, which must be UTF-8.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ParseError> {
        let content = std::str::from_utf8(bytes).map_err(|e| ParseError::InvalidEncoding {
            valid_up_to: e.valid_up_to(),
        })?;
        Self::from_string(content)
    }

    /// Parse a model from a string.
    pub fn from_string(content: &str) -> Result<Self, ParseError> {
        Self::from_lines(content.lines())
    }

    /// Parse a model from an ordered sequence of lines.
    pub fn from_lines<I, S>(lines: I) -> Result<Self, ParseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut model = LgbModel::default();
        let mut current: Option<RawBlock> = None;

        for (idx, line) in lines.into_iter().enumerate() {
            let line_no = idx + 1;
            let line = line.as_ref();

            if let Some(header) = BlockHeader::detect(line) {
                if let Some(block) = current.take() {
                    model.finish_block(block)?;
                }
                if matches!(header, BlockHeader::Meta) && model.header.is_some() {
                    return Err(ParseError::DuplicateMetaBlock { line_no });
                }
                current = Some(RawBlock::open(header)?);
                continue;
            }

            if line.trim().is_empty() {
                if let Some(block) = current.take() {
                    model.finish_block(block)?;
                }
                continue;
            }

            // Outside any block: tree_sizes, importances, parameters, ...
            let Some(block) = current.as_mut() else {
                continue;
            };

            let (key, value) = split_key_value(line).ok_or_else(|| ParseError::MalformedLine {
                line_no,
                line: line.to_string(),
            })?;
            block.kv.insert(key.to_string(), value.to_string());
        }

        if let Some(block) = current.take() {
            model.finish_block(block)?;
        }
        Ok(model)
    }

    /// Number of tree blocks.
    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    fn finish_block(&mut self, block: RawBlock) -> Result<(), ParseError> {
        match block.header {
            BlockKind::Meta => self.header = Some(parse_header(&block.kv)?),
            BlockKind::Tree(index) => self.trees.push(parse_tree(index, &block.kv)?),
        }
        Ok(())
    }
}

// =============================================================================
// Line scanning
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockHeader<'a> {
    Meta,
    /// Raw index token after `Tree=`
    Tree(&'a str),
}

impl<'a> BlockHeader<'a> {
    fn detect(line: &'a str) -> Option<Self> {
        let line = line.trim_end();
        if line == "tree" {
            Some(BlockHeader::Meta)
        } else {
            line.strip_prefix("Tree=").map(BlockHeader::Tree)
        }
    }
}

#[derive(Debug)]
enum BlockKind {
    Meta,
    Tree(usize),
}

#[derive(Debug)]
struct RawBlock {
    header: BlockKind,
    kv: HashMap<String, String>,
}

impl RawBlock {
    fn open(header: BlockHeader<'_>) -> Result<Self, ParseError> {
        let header = match header {
            BlockHeader::Meta => BlockKind::Meta,
            BlockHeader::Tree(token) => BlockKind::Tree(parse_scalar("Tree", token)?),
        };
        Ok(Self {
            header,
            kv: HashMap::new(),
        })
    }
}

/// Split a `key=value` line; `None` unless the line has exactly one `=`.
fn split_key_value(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    if value.contains('=') {
        return None;
    }
    Some((key.trim(), value.trim()))
}

/// Split an `objective` value into type and config.
///
/// `"binary sigmoid:1"` → `("binary", "sigmoid:1")`.
pub fn split_objective(objective: &str) -> (&str, &str) {
    let objective = objective.trim();
    match objective.split_once(char::is_whitespace) {
        Some((kind, config)) => (kind, config.trim()),
        None => (objective, ""),
    }
}

// =============================================================================
// Block parsing
// =============================================================================

/// Look up a key, treating an empty value as absent.
fn lookup<'a>(kv: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    kv.get(key).map(String::as_str).filter(|v| !v.is_empty())
}

fn parse_header(kv: &HashMap<String, String>) -> Result<LgbHeader, ParseError> {
    let required = |field: &'static str| {
        lookup(kv, field).ok_or(ParseError::MissingField { tree: None, field })
    };

    let (objective_type, objective_config) = split_objective(required("objective")?);

    Ok(LgbHeader {
        version: lookup(kv, "version").map(str::to_string),
        num_class: parse_scalar("num_class", required("num_class")?)?,
        num_tree_per_iteration: parse_scalar(
            "num_tree_per_iteration",
            required("num_tree_per_iteration")?,
        )?,
        max_feature_idx: parse_scalar("max_feature_idx", required("max_feature_idx")?)?,
        objective_type: objective_type.to_string(),
        objective_config: objective_config.to_string(),
        feature_names: lookup(kv, "feature_names")
            .map(|names| names.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default(),
    })
}

/// Parse a single tree block.
fn parse_tree(tree_index: usize, kv: &HashMap<String, String>) -> Result<LgbTreeBlock, ParseError> {
    let required = |field: &'static str| {
        lookup(kv, field).ok_or(ParseError::MissingField {
            tree: Some(tree_index),
            field,
        })
    };

    let mut tree = LgbTreeBlock {
        tree_index,
        num_leaves: lookup(kv, "num_leaves")
            .map(|v| parse_scalar("num_leaves", v))
            .transpose()?,
        num_cat: lookup(kv, "num_cat")
            .map(|v| parse_scalar("num_cat", v))
            .transpose()?
            .unwrap_or(0),
        leaf_value: parse_array("leaf_value", required("leaf_value")?)?,
        internal_value: lookup(kv, "internal_value")
            .map(|v| parse_array("internal_value", v))
            .transpose()?
            .unwrap_or_default(),
        ..Default::default()
    };

    // Single-leaf tree has no splits
    if lookup(kv, "left_child").is_none() && tree.num_leaves.map_or(true, |n| n <= 1) {
        validate_array_size("leaf_value", &tree.leaf_value, 1)?;
        return Ok(tree);
    }

    tree.left_child = parse_array("left_child", required("left_child")?)?;
    let num_splits = tree.left_child.len();

    tree.right_child = parse_array("right_child", required("right_child")?)?;
    validate_array_size("right_child", &tree.right_child, num_splits)?;

    tree.split_feature = parse_array("split_feature", required("split_feature")?)?;
    validate_array_size("split_feature", &tree.split_feature, num_splits)?;

    tree.decision_type = parse_array("decision_type", required("decision_type")?)?;
    validate_array_size("decision_type", &tree.decision_type, num_splits)?;

    tree.threshold = parse_array("threshold", required("threshold")?)?;
    validate_array_size("threshold", &tree.threshold, num_splits)?;

    if let Some(num_leaves) = tree.num_leaves {
        validate_array_size("left_child", &tree.left_child, num_leaves.saturating_sub(1))?;
        validate_array_size("leaf_value", &tree.leaf_value, num_leaves)?;
    }

    tree.cat_boundaries = lookup(kv, "cat_boundaries")
        .map(|v| parse_array("cat_boundaries", v))
        .transpose()?
        .unwrap_or_default();
    tree.cat_threshold = lookup(kv, "cat_threshold")
        .map(|v| parse_array("cat_threshold", v))
        .transpose()?
        .unwrap_or_default();

    Ok(tree)
}

fn parse_scalar<T: FromStr>(field: &'static str, token: &str) -> Result<T, ParseError> {
    token.trim().parse().map_err(|_| ParseError::InvalidValue {
        field,
        token: token.to_string(),
    })
}

fn parse_array<T: FromStr>(field: &'static str, s: &str) -> Result<Vec<T>, ParseError> {
    s.split_whitespace().map(|v| parse_scalar(field, v)).collect()
}

fn validate_array_size<T>(field: &'static str, arr: &[T], expected: usize) -> Result<(), ParseError> {
    if arr.len() != expected {
        return Err(ParseError::ArraySizeMismatch {
            field,
            expected,
            actual: arr.len(),
        });
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
