//! Tree node types.
//!
//! A tree is an owned graph of [`TreeNode`]s: every split owns its two
//! children, so there is no sharing and no cycles.

use std::mem;

use super::categories::CategoryRange;

/// Values within this distance of zero count as "zero" for
/// [`MissingType::Zero`] splits.
///
/// LightGBM declares `kZeroThreshold` as the `f32` literal `1e-35f`, so the
/// widened value is used to keep the boundary bit-exact.
pub const ZERO_THRESHOLD: f64 = 1e-35_f32 as f64;

/// Missing value handling strategy of a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingType {
    /// No special missing value handling; NaN reads as 0.0
    #[default]
    None = 0,
    /// Values within [`ZERO_THRESHOLD`] of zero take the default direction
    Zero = 1,
    /// NaN takes the default direction
    NaN = 2,
}

impl MissingType {
    /// Decode the two-bit missing type field.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 3 {
            1 => MissingType::Zero,
            2 => MissingType::NaN,
            _ => MissingType::None,
        }
    }
}

/// Branch taken at a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    Left,
    #[default]
    Right,
}

impl Direction {
    #[inline]
    pub fn from_default_left(default_left: bool) -> Self {
        if default_left {
            Direction::Left
        } else {
            Direction::Right
        }
    }
}

/// The test a split applies to its feature value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SplitCondition {
    /// Go left if `value <= threshold`.
    Numeric { threshold: f64 },
    /// Go left if the category's bit is set in the tree's bitset range.
    Categorical { range: CategoryRange },
}

/// An internal node that routes to one of two owned children.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitNode {
    pub feature_index: u32,
    pub missing_type: MissingType,
    /// Branch taken when the missing policy fires.
    pub default_direction: Direction,
    pub condition: SplitCondition,
    pub left: Box<TreeNode>,
    pub right: Box<TreeNode>,
}

impl SplitNode {
    /// Child on the given side.
    #[inline]
    pub fn child(&self, direction: Direction) -> &TreeNode {
        match direction {
            Direction::Left => &self.left,
            Direction::Right => &self.right,
        }
    }

    #[inline]
    pub fn is_categorical(&self) -> bool {
        matches!(self.condition, SplitCondition::Categorical { .. })
    }
}

/// A node in a decision tree.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode {
    Leaf { value: f64 },
    Split(SplitNode),
}

impl TreeNode {
    /// Create a leaf node.
    #[inline]
    pub fn leaf(value: f64) -> Self {
        TreeNode::Leaf { value }
    }

    /// Create a numeric split.
    pub fn numeric(
        feature_index: u32,
        threshold: f64,
        missing_type: MissingType,
        default_direction: Direction,
        left: TreeNode,
        right: TreeNode,
    ) -> Self {
        TreeNode::Split(SplitNode {
            feature_index,
            missing_type,
            default_direction,
            condition: SplitCondition::Numeric { threshold },
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    /// Create a categorical split over a range of the tree's bitset.
    pub fn categorical(
        feature_index: u32,
        range: CategoryRange,
        left: TreeNode,
        right: TreeNode,
    ) -> Self {
        TreeNode::Split(SplitNode {
            feature_index,
            missing_type: MissingType::None,
            default_direction: Direction::Right,
            condition: SplitCondition::Categorical { range },
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self, TreeNode::Leaf { .. })
    }

    /// Visit every node below (and including) this one, pre-order.
    ///
    /// Uses an explicit stack so degenerate chains cannot exhaust the call stack.
    pub fn for_each(&self, mut visit: impl FnMut(&TreeNode, usize)) {
        let mut stack = vec![(self, 0usize)];
        while let Some((node, depth)) = stack.pop() {
            visit(node, depth);
            if let TreeNode::Split(split) = node {
                stack.push((&split.right, depth + 1));
                stack.push((&split.left, depth + 1));
            }
        }
    }

    /// Total number of nodes (splits and leaves).
    pub fn num_nodes(&self) -> usize {
        let mut count = 0;
        self.for_each(|_, _| count += 1);
        count
    }

    /// Depth of the deepest leaf; a lone leaf has depth 0.
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        self.for_each(|_, depth| max_depth = max_depth.max(depth));
        max_depth
    }
}

/// Children are unlinked onto a heap stack before they are freed, so
/// dropping a chain-shaped tree never recurses once per level.
impl Drop for TreeNode {
    fn drop(&mut self) {
        let TreeNode::Split(split) = self else {
            return;
        };
        let mut stack = Vec::new();
        detach_children(split, &mut stack);
        while let Some(mut node) = stack.pop() {
            if let TreeNode::Split(split) = &mut *node {
                detach_children(split, &mut stack);
            }
        }
    }
}

fn detach_children(split: &mut SplitNode, stack: &mut Vec<Box<TreeNode>>) {
    for child in [&mut split.left, &mut split.right] {
        if !child.is_leaf() {
            stack.push(mem::replace(child, Box::new(TreeNode::leaf(0.0))));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump() -> TreeNode {
        TreeNode::numeric(
            2,
            0.5,
            MissingType::Zero,
            Direction::Left,
            TreeNode::leaf(1.0),
            TreeNode::leaf(2.0),
        )
    }

    #[test]
    fn missing_type_from_bits() {
        assert_eq!(MissingType::from_bits(0), MissingType::None);
        assert_eq!(MissingType::from_bits(1), MissingType::Zero);
        assert_eq!(MissingType::from_bits(2), MissingType::NaN);
        assert_eq!(MissingType::from_bits(3), MissingType::None);
    }

    #[test]
    fn zero_threshold_covers_decimal_bound() {
        assert!(ZERO_THRESHOLD >= 1e-35);
        assert!(ZERO_THRESHOLD < 1.0001e-35);
    }

    #[test]
    fn counts_nodes_and_depth() {
        let tree = TreeNode::numeric(
            0,
            1.0,
            MissingType::None,
            Direction::Right,
            stump(),
            TreeNode::leaf(3.0),
        );
        assert_eq!(tree.num_nodes(), 5);
        assert_eq!(tree.depth(), 2);
        assert_eq!(TreeNode::leaf(1.0).depth(), 0);
    }

    #[test]
    fn child_follows_direction() {
        let node = stump();
        let TreeNode::Split(split) = &node else {
            panic!("expected split");
        };
        assert_eq!(split.child(Direction::Left), &TreeNode::leaf(1.0));
        assert_eq!(split.child(Direction::Right), &TreeNode::leaf(2.0));
        assert!(!split.is_categorical());
    }

    #[test]
    fn dropping_deep_chain_does_not_recurse() {
        let mut node = TreeNode::leaf(0.0);
        for i in 0..200_000 {
            node = TreeNode::numeric(
                0,
                f64::from(i),
                MissingType::None,
                Direction::Right,
                TreeNode::leaf(-1.0),
                node,
            );
        }
        assert_eq!(node.depth(), 200_000);
        drop(node);
    }
}
