//! Predictor construction and caching.
//!
//! [`PredictorFactory::get_or_create`] is the single entry point: it resolves
//! the model text through a [`ResourceLoader`], parses and validates it,
//! picks an evaluation strategy and wraps the result in an
//! [`LgbPredictor`]. Built predictors are cached by model name behind a
//! [`Weak`] handle, so the cache never keeps a predictor alive on its own.
//! Dead entries are evicted lazily on the next lookup.
//!
//! Every entry point takes the factory's one lock, so check, build and
//! insert happen as a unit and a failed build leaves no cache entry.
//!
//! # Example
//!
//! ```
//! use lgbm_infer::{BuildOptions, MemoryLoader, PredictorFactory, StrategyKind};
//! use lgbm_infer::testing::{ModelText, TreeText};
//!
//! let text = ModelText::new("binary sigmoid:1", 0)
//!     .tree(TreeText::stump(0, 0.5, 0, 0.0, 1.0))
//!     .build();
//! let factory = PredictorFactory::new(MemoryLoader::new().with("models/churn.txt", text));
//!
//! let predictor = factory.get_or_create("churn", "models/churn.txt", &BuildOptions::default())?;
//! assert_eq!(predictor.strategy_kind(), StrategyKind::Compiled);
//! assert_eq!(predictor.predict(&[0.0])?, vec![0.5]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};

use serde::{Deserialize, Serialize};

use crate::compat::lightgbm::{LgbModel, ModelError, ParseError};
use crate::inference::gbdt::{CompileLimits, CompiledPredictor, InterpretedPredictor, RustSource};
use crate::loader::{FileLoader, LoadError, ResourceLoader};
use crate::model::LgbPredictor;
use crate::repr::gbdt::{ModelValidationError, TreeModel};

/// Default largest tree count that still gets the compiled executor.
pub const DEFAULT_GENERATION_THRESHOLD: usize = 300;

// =============================================================================
// Configuration
// =============================================================================

/// Factory-wide settings.
///
/// Every field has a default, so a partial document deserializes:
///
/// ```
/// use lgbm_infer::FactoryConfig;
///
/// let config: FactoryConfig = serde_json::from_str(r#"{"generation_threshold": 50}"#)?;
/// assert_eq!(config.generation_threshold, 50);
/// assert!(config.enable_compiled_executor);
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactoryConfig {
    /// Models with more trees than this are always interpreted.
    pub generation_threshold: usize,
    /// Whether the compiled executor is used at all, unless a build overrides it.
    pub enable_compiled_executor: bool,
    pub compile_limits: CompileLimits,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            generation_threshold: DEFAULT_GENERATION_THRESHOLD,
            enable_compiled_executor: true,
            compile_limits: CompileLimits::default(),
        }
    }
}

/// Per-call build options. Unset fields inherit the factory config.
///
/// Options only matter when the call actually builds; a cache hit returns
/// the predictor as it was first built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptions {
    pub enable_compiled_executor: Option<bool>,
    /// Directory under which the compiled routine is written as Rust source.
    pub persist_compiled_artifact_to: Option<PathBuf>,
}

impl BuildOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enable_compiled_executor(mut self, enable: bool) -> Self {
        self.enable_compiled_executor = Some(enable);
        self
    }

    pub fn persist_compiled_artifact_to(mut self, dir: impl Into<PathBuf>) -> Self {
        self.persist_compiled_artifact_to = Some(dir.into());
        self
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Error from [`PredictorFactory::get_or_create`].
#[derive(Debug, thiserror::Error)]
pub enum FactoryError {
    #[error("invalid model name {0:?}: expected [A-Za-z0-9_]+")]
    InvalidModelName(String),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("failed to parse model: {0}")]
    Parse(#[from] ParseError),
    #[error("invalid model: {0}")]
    Validation(#[from] ModelValidationError),
}

impl From<ModelError> for FactoryError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::Parse(e) => FactoryError::Parse(e),
            ModelError::Validation(e) => FactoryError::Validation(e),
        }
    }
}

/// True if `name` is non-empty ASCII alphanumerics and underscores.
pub fn is_valid_model_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Where the compiled artifact for `model_name` lands under `dir`.
pub fn artifact_path(dir: &Path, model_name: &str) -> PathBuf {
    dir.join("lgbm_infer")
        .join("predictor")
        .join(format!("_{model_name}.rs"))
}

// =============================================================================
// PredictorFactory
// =============================================================================

struct FactoryState {
    config: FactoryConfig,
    cache: HashMap<String, Weak<LgbPredictor>>,
}

/// Builds predictors from model text and caches them by name.
pub struct PredictorFactory {
    loader: Box<dyn ResourceLoader>,
    state: Mutex<FactoryState>,
}

impl PredictorFactory {
    /// Factory with the default config.
    pub fn new(loader: impl ResourceLoader + 'static) -> Self {
        Self::with_config(loader, FactoryConfig::default())
    }

    pub fn with_config(loader: impl ResourceLoader + 'static, config: FactoryConfig) -> Self {
        Self {
            loader: Box::new(loader),
            state: Mutex::new(FactoryState {
                config,
                cache: HashMap::new(),
            }),
        }
    }

    /// The process-wide factory, reading locators as filesystem paths.
    pub fn global() -> &'static PredictorFactory {
        static GLOBAL: OnceLock<PredictorFactory> = OnceLock::new();
        GLOBAL.get_or_init(|| PredictorFactory::new(FileLoader::new()))
    }

    /// The cache holds only weak handles and every critical section leaves
    /// it consistent, so a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, FactoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> FactoryConfig {
        self.lock().config
    }

    pub fn generation_threshold(&self) -> usize {
        self.lock().config.generation_threshold
    }

    /// Change the threshold for every later build. Cached predictors keep
    /// the strategy they were built with.
    pub fn set_generation_threshold(&self, threshold: usize) {
        self.lock().config.generation_threshold = threshold;
    }

    pub fn set_enable_compiled_executor(&self, enable: bool) {
        self.lock().config.enable_compiled_executor = enable;
    }

    /// Return the live predictor cached under `model_name`, or build one
    /// from the text behind `locator`.
    pub fn get_or_create(
        &self,
        model_name: &str,
        locator: &str,
        options: &BuildOptions,
    ) -> Result<Arc<LgbPredictor>, FactoryError> {
        if !is_valid_model_name(model_name) {
            return Err(FactoryError::InvalidModelName(model_name.to_string()));
        }

        let mut state = self.lock();
        if let Some(handle) = state.cache.get(model_name) {
            if let Some(predictor) = handle.upgrade() {
                tracing::debug!(model = model_name, "predictor cache hit");
                return Ok(predictor);
            }
            state.cache.remove(model_name);
            tracing::debug!(model = model_name, "evicted released predictor");
        }

        let bytes = self.loader.open(locator)?;
        let model = Arc::new(LgbModel::from_bytes(&bytes)?.to_tree_model()?);
        let predictor = Arc::new(build_predictor(model_name, model, &state.config, options));

        tracing::info!(
            model = model_name,
            trees = predictor.model().num_trees(),
            classes = predictor.num_classes(),
            strategy = %predictor.strategy_kind(),
            "built predictor"
        );

        state
            .cache
            .insert(model_name.to_string(), Arc::downgrade(&predictor));
        Ok(predictor)
    }

    /// Drop the cache entry for `model_name`. Existing handles stay valid;
    /// the next [`get_or_create`](Self::get_or_create) builds afresh.
    ///
    /// Returns whether an entry was present.
    pub fn release(&self, model_name: &str) -> bool {
        self.lock().cache.remove(model_name).is_some()
    }

    /// Names with a live cached predictor, sorted. Dead entries are evicted.
    pub fn cached_names(&self) -> Vec<String> {
        let mut state = self.lock();
        state.cache.retain(|_, handle| handle.strong_count() > 0);
        let mut names: Vec<_> = state.cache.keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for PredictorFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("PredictorFactory")
            .field("config", &state.config)
            .field("cached", &state.cache.len())
            .finish_non_exhaustive()
    }
}

/// Pick a strategy for `model` and wrap it. Never fails: a model the
/// compiled executor rejects is interpreted instead.
fn build_predictor(
    name: &str,
    model: Arc<TreeModel>,
    config: &FactoryConfig,
    options: &BuildOptions,
) -> LgbPredictor {
    let enabled = options
        .enable_compiled_executor
        .unwrap_or(config.enable_compiled_executor);
    let num_trees = model.num_trees();
    let compile = enabled && num_trees <= config.generation_threshold;

    tracing::debug!(
        model = name,
        trees = num_trees,
        threshold = config.generation_threshold,
        enabled,
        compile,
        "choosing evaluation strategy"
    );

    if !compile {
        return LgbPredictor::new(name, InterpretedPredictor::interpreted(model).into());
    }

    match CompiledPredictor::compiled(Arc::clone(&model), config.compile_limits) {
        Ok(compiled) => {
            if let Some(dir) = &options.persist_compiled_artifact_to {
                persist_artifact(dir, name, &model);
            }
            LgbPredictor::new(name, compiled.into())
        }
        Err(e) => {
            tracing::warn!(
                model = name,
                "compiled executor unavailable, falling back to interpreter: {e}"
            );
            LgbPredictor::new(name, InterpretedPredictor::interpreted(model).into())
        }
    }
}

/// Write the compiled routine as Rust source. Failures are logged only.
fn persist_artifact(dir: &Path, name: &str, model: &TreeModel) {
    let path = artifact_path(dir, name);
    let result = path
        .parent()
        .map_or(Ok(()), fs::create_dir_all)
        .and_then(|()| fs::write(&path, RustSource::new(model, name).to_string()));

    match result {
        Ok(()) => tracing::debug!(model = name, path = %path.display(), "wrote compiled artifact"),
        Err(e) => tracing::warn!(
            model = name,
            path = %path.display(),
            "failed to write compiled artifact: {e}"
        ),
    }
}
