//! Resource loading for model text.
//!
//! The factory never touches the filesystem directly; it asks a
//! [`ResourceLoader`] for the bytes behind a locator. Two loaders ship with
//! the crate:
//!
//! 1. [`FileLoader`] treats the locator as a path, optionally relative to a
//!    root directory. This is the default.
//! 2. [`MemoryLoader`] serves byte buffers registered up front, for
//!    embedding models in a binary and for tests.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Error opening a model resource.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("resource not found: {locator}")]
    NotFound { locator: String },
    #[error("failed to read resource {locator}: {source}")]
    Read {
        locator: String,
        #[source]
        source: io::Error,
    },
}

impl LoadError {
    /// The locator that failed.
    pub fn locator(&self) -> &str {
        match self {
            LoadError::NotFound { locator } | LoadError::Read { locator, .. } => locator,
        }
    }
}

/// Supplies the raw bytes of a model given a caller-chosen locator.
///
/// Implementations must be shareable across threads: the process-wide
/// factory holds one for its whole lifetime.
pub trait ResourceLoader: Send + Sync {
    fn open(&self, locator: &str) -> Result<Vec<u8>, LoadError>;
}

impl<L: ResourceLoader + ?Sized> ResourceLoader for Box<L> {
    fn open(&self, locator: &str) -> Result<Vec<u8>, LoadError> {
        (**self).open(locator)
    }
}

impl<L: ResourceLoader + ?Sized> ResourceLoader for std::sync::Arc<L> {
    fn open(&self, locator: &str) -> Result<Vec<u8>, LoadError> {
        (**self).open(locator)
    }
}

// =============================================================================
// FileLoader
// =============================================================================

/// Reads locators as filesystem paths.
#[derive(Debug, Clone, Default)]
pub struct FileLoader {
    root: Option<PathBuf>,
}

impl FileLoader {
    /// Loader that resolves locators as given (relative to the working directory).
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader that resolves relative locators against `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    fn resolve(&self, locator: &str) -> PathBuf {
        match &self.root {
            Some(root) => root.join(locator),
            None => PathBuf::from(locator),
        }
    }
}

impl ResourceLoader for FileLoader {
    fn open(&self, locator: &str) -> Result<Vec<u8>, LoadError> {
        let path = self.resolve(locator);
        std::fs::read(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => LoadError::NotFound {
                locator: locator.to_string(),
            },
            _ => LoadError::Read {
                locator: locator.to_string(),
                source,
            },
        })
    }
}

// =============================================================================
// MemoryLoader
// =============================================================================

/// Serves pre-registered byte buffers by exact locator.
#[derive(Default, Clone)]
pub struct MemoryLoader {
    resources: HashMap<String, Vec<u8>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `bytes` under `locator`, replacing any previous entry.
    pub fn insert(&mut self, locator: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.resources.insert(locator.into(), bytes.into());
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, locator: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(locator, bytes);
        self
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl fmt::Debug for MemoryLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut locators: Vec<_> = self.resources.keys().collect();
        locators.sort();
        f.debug_struct("MemoryLoader")
            .field("locators", &locators)
            .finish()
    }
}

impl ResourceLoader for MemoryLoader {
    fn open(&self, locator: &str) -> Result<Vec<u8>, LoadError> {
        self.resources
            .get(locator)
            .cloned()
            .ok_or_else(|| LoadError::NotFound {
                locator: locator.to_string(),
            })
    }
}
