//! Rust source rendering of a model's specialised prediction routine.
//!
//! The output mirrors what [`CompiledTraversal`](super::CompiledTraversal)
//! builds in memory: one function per tree with its thresholds, feature
//! indices and bitset words inlined, plus a `predict_raw` that sums the
//! trees into per-class slots in tree order. It is written out for
//! inspection only and never read back.

use std::fmt;

use crate::repr::gbdt::{Direction, MissingType, SplitCondition, Tree, TreeModel, TreeNode};

const INDENT: &str = "    ";

/// Display adapter that renders a [`TreeModel`] as a standalone Rust module.
///
/// ```
/// use lgbm_infer::inference::gbdt::RustSource;
/// use lgbm_infer::repr::gbdt::{Tree, TreeModel, TreeNode};
///
/// let model = TreeModel::new(1, 1, 0, "regression", "", vec![Tree::new(0, TreeNode::leaf(1.5))])?;
/// let source = RustSource::new(&model, "demo").to_string();
/// assert!(source.contains("pub fn tree_0(f: &[f64]) -> f64"));
/// # Ok::<(), lgbm_infer::repr::gbdt::ModelValidationError>(())
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RustSource<'a> {
    model: &'a TreeModel,
    model_name: &'a str,
}

impl<'a> RustSource<'a> {
    pub fn new(model: &'a TreeModel, model_name: &'a str) -> Self {
        Self { model, model_name }
    }
}

impl fmt::Display for RustSource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let model = self.model;
        writeln!(f, "//! Specialised predictor for model `{}`.", self.model_name)?;
        writeln!(
            f,
            "//! objective: {} {}",
            model.objective_type(),
            model.objective_config()
        )?;
        writeln!(f)?;
        writeln!(f, "pub const NUM_CLASSES: usize = {};", model.num_classes())?;
        writeln!(f, "pub const NUM_FEATURES: usize = {};", model.num_features())?;
        writeln!(f)?;
        f.write_str(PRELUDE)?;

        for tree in model.trees() {
            writeln!(f)?;
            render_tree(f, tree)?;
        }

        writeln!(f)?;
        writeln!(f, "pub fn predict_raw(f: &[f64]) -> [f64; NUM_CLASSES] {{")?;
        writeln!(f, "{INDENT}let mut raw = [0.0f64; NUM_CLASSES];")?;
        for (tree, class) in model.trees().iter().zip(model.tree_classes()) {
            writeln!(f, "{INDENT}raw[{class}] += tree_{}(f);", tree.tree_index())?;
        }
        writeln!(f, "{INDENT}raw")?;
        writeln!(f, "}}")
    }
}

const PRELUDE: &str = "\
#[inline(always)]
fn feature(f: &[f64], i: usize) -> f64 {
    f.get(i).copied().unwrap_or(f64::NAN)
}

#[inline(always)]
fn is_zero(v: f64) -> bool {
    v >= -ZERO_THRESHOLD && v <= ZERO_THRESHOLD
}

#[inline(always)]
fn in_bitset(words: &[u64], v: f64) -> bool {
    if v.is_nan() || (v as i32) < 0 {
        return false;
    }
    let c = v as i32 as u32;
    match words.get((c / 32) as usize) {
        Some(w) => (w >> (c % 32)) & 1 != 0,
        None => false,
    }
}

const ZERO_THRESHOLD: f64 = 1e-35_f32 as f64;
";

fn render_tree(out: &mut impl fmt::Write, tree: &Tree) -> fmt::Result {
    writeln!(out, "pub fn tree_{}(f: &[f64]) -> f64 {{", tree.tree_index())?;
    render_node(out, tree, tree.root(), 1)?;
    writeln!(out, "}}")
}

/// Render a node as an expression. Recursion is bounded by the compile depth limit.
fn render_node(out: &mut impl fmt::Write, tree: &Tree, node: &TreeNode, level: usize) -> fmt::Result {
    let pad = INDENT.repeat(level);
    let split = match node {
        TreeNode::Leaf { value } => return writeln!(out, "{pad}{}", float_literal(*value)),
        TreeNode::Split(split) => split,
    };
    let feature = split.feature_index;

    match split.condition {
        SplitCondition::Categorical { range } => {
            let words = tree.categories().range_words(range);
            writeln!(
                out,
                "{pad}if in_bitset(&{words:?}, feature(f, {feature})) {{"
            )?;
            render_branches(out, tree, split.child(Direction::Left), split.child(Direction::Right), level)
        }
        SplitCondition::Numeric { threshold } => {
            let threshold = float_literal(threshold);
            match split.missing_type {
                MissingType::None => {
                    writeln!(out, "{pad}let v = feature(f, {feature});")?;
                    writeln!(out, "{pad}let v = if v.is_nan() {{ 0.0 }} else {{ v }};")?;
                }
                MissingType::Zero => {
                    writeln!(out, "{pad}let v = feature(f, {feature});")?;
                    writeln!(out, "{pad}let v = if v.is_nan() {{ 0.0 }} else {{ v }};")?;
                    writeln!(out, "{pad}if is_zero(v) {{")?;
                    render_node(out, tree, split.child(split.default_direction), level + 1)?;
                    write!(out, "{pad}}} else ")?;
                }
                MissingType::NaN => {
                    writeln!(out, "{pad}let v = feature(f, {feature});")?;
                    writeln!(out, "{pad}if v.is_nan() {{")?;
                    render_node(out, tree, split.child(split.default_direction), level + 1)?;
                    write!(out, "{pad}}} else ")?;
                }
            }
            if split.missing_type == MissingType::None {
                write!(out, "{pad}")?;
            }
            writeln!(out, "if v <= {threshold} {{")?;
            render_branches(out, tree, split.child(Direction::Left), split.child(Direction::Right), level)
        }
    }
}

fn render_branches(
    out: &mut impl fmt::Write,
    tree: &Tree,
    left: &TreeNode,
    right: &TreeNode,
    level: usize,
) -> fmt::Result {
    let pad = INDENT.repeat(level);
    // Nested `let v` bindings need their own block scope.
    writeln!(out, "{pad}{INDENT}{{")?;
    render_node(out, tree, left, level + 2)?;
    writeln!(out, "{pad}{INDENT}}}")?;
    writeln!(out, "{pad}}} else {{")?;
    writeln!(out, "{pad}{INDENT}{{")?;
    render_node(out, tree, right, level + 2)?;
    writeln!(out, "{pad}{INDENT}}}")?;
    writeln!(out, "{pad}}}")
}

/// Format an `f64` as a Rust expression that evaluates to the same bits.
fn float_literal(value: f64) -> String {
    if value.is_nan() {
        "f64::NAN".to_string()
    } else if value == f64::INFINITY {
        "f64::INFINITY".to_string()
    } else if value == f64::NEG_INFINITY {
        "f64::NEG_INFINITY".to_string()
    } else {
        // Debug output is the shortest round-trip representation.
        format!("{value:?}")
    }
}
