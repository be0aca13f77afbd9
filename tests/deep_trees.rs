//! Chain-shaped trees far deeper than any call stack could recurse.
//!
//! Every split sends values above its threshold to the next split, so a
//! chain of `n` splits over feature 0 routes `x` to leaf `ceil(x)`
//! (clamped to `[0, n]`), and each leaf's value is its own index.

use std::sync::Arc;

use lgbm_infer::inference::gbdt::{CompiledPredictor, InterpretedPredictor};
use lgbm_infer::testing::{ModelText, TreeText};
use lgbm_infer::{
    parse_tree_model, BuildOptions, CompileError, CompileLimits, LgbPredictor, MemoryLoader,
    PredictorFactory, StrategyKind,
};

const DEEP_CHAIN: usize = 131_071;

fn chain_tree(num_splits: usize) -> TreeText {
    let n = num_splits as i32;
    let right_child = (1..=n).map(|i| if i < n { i } else { -(n + 1) }).collect();
    TreeText::splits(
        vec![0; num_splits],
        (0..num_splits).map(|i| i as f64).collect(),
        vec![0; num_splits],
        (0..n).map(|i| -(i + 1)).collect(),
        right_child,
        (0..=num_splits).map(|i| i as f64).collect(),
    )
}

fn chain_model_text(num_splits: usize) -> String {
    ModelText::new("regression", 0)
        .tree(chain_tree(num_splits))
        .build()
}

#[test]
fn deep_chain_parses_predicts_and_drops() {
    let text = chain_model_text(DEEP_CHAIN);
    let model = Arc::new(parse_tree_model(text.lines()).unwrap());
    assert_eq!(model.num_trees(), 1);
    assert_eq!(model.trees()[0].depth(), DEEP_CHAIN);

    let predictor = LgbPredictor::new(
        "deep",
        InterpretedPredictor::interpreted(Arc::clone(&model)).into(),
    );
    assert_eq!(predictor.predict_raw(&[1e9]).unwrap(), vec![DEEP_CHAIN as f64]);
    assert_eq!(predictor.predict(&[0.5]).unwrap(), vec![1.0]);
    assert_eq!(predictor.predict(&[-1.0]).unwrap(), vec![0.0]);

    drop(predictor);
    drop(model);
}

#[test]
fn deep_chain_exceeds_compile_depth() {
    let model = Arc::new(parse_tree_model(chain_model_text(DEEP_CHAIN).lines()).unwrap());
    let err = CompiledPredictor::compiled(model, CompileLimits::default()).unwrap_err();
    assert!(matches!(
        err,
        CompileError::DepthLimitExceeded { tree: 0, depth: DEEP_CHAIN, .. }
    ));
}

#[test]
fn factory_falls_back_and_releases_deep_chain() {
    let loader = MemoryLoader::new().with("deep", chain_model_text(DEEP_CHAIN));
    let factory = PredictorFactory::new(loader);

    let predictor = factory
        .get_or_create("deep", "deep", &BuildOptions::default())
        .unwrap();
    assert_eq!(predictor.strategy_kind(), StrategyKind::Interpreted);
    assert_eq!(predictor.predict(&[1e9]).unwrap(), vec![DEEP_CHAIN as f64]);

    assert!(factory.release("deep"));
    drop(predictor);
    assert!(factory.cached_names().is_empty());
}

#[test]
fn chain_within_limits_compiles_identically() {
    let num_splits = 200;
    let model = Arc::new(parse_tree_model(chain_model_text(num_splits).lines()).unwrap());
    let interpreted = InterpretedPredictor::interpreted(Arc::clone(&model));
    let compiled = CompiledPredictor::compiled(model, CompileLimits::default()).unwrap();

    for x in [-1.0, 0.0, 0.5, 37.2, 199.0, 1e9, f64::NAN] {
        let expected = interpreted.predict_raw(&[x]);
        assert_eq!(compiled.predict_raw(&[x]), expected, "x = {x}");
    }
    assert_eq!(compiled.predict_raw(&[37.2]), vec![38.0]);
}
