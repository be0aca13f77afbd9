//! Categorical split storage for trees.
//!
//! LightGBM stores every categorical split of a tree in one flat bitset
//! (`cat_threshold`). A split selects a contiguous range of that bitset's
//! words. Each word holds 32 categories, matching LightGBM's
//! `FindInBitset`, even though words are stored as `u64` so any token the
//! format can carry fits.
//!
//! # Decision Rule
//!
//! For a categorical split with feature value `v`:
//! - NaN, or a value that truncates to a negative integer, goes RIGHT
//! - Category `c` whose bit is SET in the range goes LEFT
//! - Anything else (including categories past the range) goes RIGHT

/// Number of categories stored per bitset word.
pub const CATEGORIES_PER_WORD: u32 = 32;

// =============================================================================
// CategoryRange
// =============================================================================

/// Half-open range `[begin, end)` of words in a tree's [`CategoryBitset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CategoryRange {
    pub begin: u32,
    pub end: u32,
}

impl CategoryRange {
    #[inline]
    pub fn new(begin: u32, end: u32) -> Self {
        Self { begin, end }
    }

    /// Number of words in the range.
    #[inline]
    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.begin)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// CategoryBitset
// =============================================================================

/// Per-tree bitset store shared by all categorical splits of the tree.
///
/// Built once at load time and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryBitset {
    words: Box<[u64]>,
}

impl CategoryBitset {
    /// Create an empty store (tree without categorical splits).
    #[inline]
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(words: Vec<u64>) -> Self {
        Self {
            words: words.into_boxed_slice(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// All words of the store.
    #[inline]
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// Whether `range` lies inside the store.
    #[inline]
    pub fn contains_range(&self, range: CategoryRange) -> bool {
        range.begin <= range.end && range.end as usize <= self.words.len()
    }

    /// Words selected by `range`.
    ///
    /// # Panics
    ///
    /// Panics if the range is out of bounds; models validate ranges at load time.
    #[inline]
    pub fn range_words(&self, range: CategoryRange) -> &[u64] {
        &self.words[range.begin as usize..range.end as usize]
    }

    /// Whether `category` is set within `range`.
    #[inline]
    pub fn contains(&self, range: CategoryRange, category: u32) -> bool {
        find_in_bitset(self.range_words(range), category)
    }
}

// =============================================================================
// Bitset helpers
// =============================================================================

/// Convert a feature value to a category index.
///
/// Returns `None` for NaN and for values that truncate to a negative
/// integer; both route right. Truncation toward zero matches a C-style
/// `(int)` cast, so `-0.5` is category `0`.
#[inline]
pub fn float_to_category(value: f64) -> Option<u32> {
    if value.is_nan() {
        return None;
    }
    let category = value as i32;
    if category < 0 {
        None
    } else {
        Some(category as u32)
    }
}

/// Test bit `category` of a word slice, 32 categories per word.
///
/// Categories beyond the slice are not in the set.
#[inline]
pub fn find_in_bitset(words: &[u64], category: u32) -> bool {
    let word_idx = (category / CATEGORIES_PER_WORD) as usize;
    if word_idx >= words.len() {
        return false;
    }
    let bit_idx = category % CATEGORIES_PER_WORD;
    (words[word_idx] >> bit_idx) & 1 != 0
}

/// Build a 32-per-word bitset from a list of categories.
///
/// ```
/// use lgbm_infer::repr::gbdt::categories_to_bitset;
///
/// // Categories {1, 3, 5} → bits 1, 3, 5 set
/// assert_eq!(categories_to_bitset(&[1, 3, 5]), vec![0b101010]);
/// ```
pub fn categories_to_bitset(categories: &[u32]) -> Vec<u64> {
    let Some(max_cat) = categories.iter().copied().max() else {
        return vec![];
    };

    let num_words = (max_cat / CATEGORIES_PER_WORD + 1) as usize;
    let mut bitset = vec![0u64; num_words];
    for &cat in categories {
        bitset[(cat / CATEGORIES_PER_WORD) as usize] |= 1u64 << (cat % CATEGORIES_PER_WORD);
    }
    bitset
}

// =============================================================================
// Tests
// =============================================================================
