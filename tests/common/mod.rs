//! Test case loading utilities for integration tests.
//!
//! Each case lives in `tests/test-cases/lightgbm/<case>/` as `model.txt`
//! (the dump), `input.json` (feature rows) and `expected.json` (raw and
//! transformed outputs). For assertion helpers, use `lgbm_infer::testing`.

#![allow(dead_code)]

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;

#[allow(unused_imports)]
pub use lgbm_infer::testing::{assert_bits_eq, assert_slices_approx_eq, DEFAULT_TOLERANCE};

/// Every fixture case shipped with the crate.
pub const CASES: [&str; 5] = [
    "regression",
    "binary",
    "multiclass",
    "categorical",
    "missing_values",
];

// =============================================================================
// Test Case Loading
// =============================================================================

/// Base directory for test cases.
pub fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/test-cases")
}

/// Directory for LightGBM test cases.
pub fn lightgbm_test_cases_dir() -> PathBuf {
    test_cases_dir().join("lightgbm")
}

/// Load a JSON file and deserialize it.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> T {
    let file =
        File::open(path).unwrap_or_else(|e| panic!("Failed to open {}: {e}", path.display()));
    serde_json::from_reader(file)
        .unwrap_or_else(|e| panic!("Failed to parse {}: {e}", path.display()))
}

// =============================================================================
// Common Test Data Structures
// =============================================================================

/// Input features for a test case. `null` stands for a missing value.
#[derive(Debug, Deserialize)]
pub struct TestInput {
    pub features: Vec<Vec<Option<f64>>>,
    pub num_rows: usize,
    pub num_features: usize,
}

impl TestInput {
    /// Rows as `f64`, mapping `None` to NaN. Rows keep their own length.
    pub fn rows(&self) -> Vec<Vec<f64>> {
        self.features
            .iter()
            .map(|row| row.iter().map(|x| x.unwrap_or(f64::NAN)).collect())
            .collect()
    }
}

/// Expected outputs for a test case, one inner vector per row.
#[derive(Debug, Deserialize)]
pub struct TestExpected {
    pub objective: String,
    pub num_class: usize,
    /// Per-class ensemble sums
    pub raw: Vec<Vec<f64>>,
    /// Outputs after the objective transform
    pub predictions: Vec<Vec<f64>>,
}

/// A complete test case.
pub struct TestCase {
    pub name: String,
    /// Path of `model.txt`, relative to [`lightgbm_test_cases_dir`]
    pub locator: String,
    pub model_text: String,
    pub input: TestInput,
    pub expected: TestExpected,
}

/// Load the named case.
pub fn load_case(name: &str) -> TestCase {
    let dir = lightgbm_test_cases_dir().join(name);
    let model_path = dir.join("model.txt");
    let model_text = std::fs::read_to_string(&model_path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {e}", model_path.display()));
    TestCase {
        name: name.to_string(),
        locator: format!("{name}/model.txt"),
        model_text,
        input: load_json(&dir.join("input.json")),
        expected: load_json(&dir.join("expected.json")),
    }
}
