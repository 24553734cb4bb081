//! LSP Backend state management.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use tokio::sync::Semaphore;
use tower_lsp::lsp_types::Url;
use tracing::error;

use drupalcheck_core::{Checker, CheckerConfig};

/// Document content and version cache.
#[derive(Debug)]
pub(crate) struct DocumentData {
    pub text: String,
    pub version: i32,
}

/// Shared backend state.
pub struct BackendState {
    /// Document contents cache.
    pub(crate) documents: RwLock<HashMap<Url, DocumentData>>,
    /// Checker instance (None if the executable could not be resolved).
    pub(crate) checker: RwLock<Option<Arc<Checker>>>,
    /// Active configuration.
    pub(crate) config: RwLock<CheckerConfig>,
    /// Client-provided `initializationOptions`, which take precedence over files.
    pub(crate) initialization_options: RwLock<Option<serde_json::Value>>,
    /// Workspace root path.
    pub(crate) workspace_root: RwLock<Option<PathBuf>>,
    /// Bounds the number of analyzer processes running at once.
    pub(crate) permits: RwLock<Arc<Semaphore>>,
}

impl fmt::Debug for BackendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendState")
            .field("documents", &"<HashMap<Url, DocumentData>>")
            .field("checker", &"<Option<Checker>>")
            .field("workspace_root", &self.workspace_root)
            .finish()
    }
}

impl BackendState {
    /// Creates a new empty state.
    pub fn new() -> Self {
        Self::with_checker(None)
    }

    /// Creates a new state with a pre-built checker.
    pub fn with_checker(checker: Option<Checker>) -> Self {
        let config = CheckerConfig::new();
        let permits = Arc::new(Semaphore::new(config.max_concurrent_checks));
        Self {
            documents: RwLock::new(HashMap::new()),
            checker: RwLock::new(checker.map(Arc::new)),
            config: RwLock::new(config),
            initialization_options: RwLock::new(None),
            workspace_root: RwLock::new(None),
            permits: RwLock::new(permits),
        }
    }

    /// Returns the current checker, if one is available.
    pub(crate) fn checker(&self) -> Option<Arc<Checker>> {
        match self.checker.read() {
            Ok(guard) => guard.clone(),
            Err(e) => {
                error!("Checker lock poisoned: {}", e);
                None
            }
        }
    }

    pub(crate) fn workspace_root(&self) -> Option<PathBuf> {
        match self.workspace_root.read() {
            Ok(guard) => guard.clone(),
            Err(e) => {
                error!("Workspace root lock poisoned: {}", e);
                None
            }
        }
    }

    pub(crate) fn permits(&self) -> Option<Arc<Semaphore>> {
        match self.permits.read() {
            Ok(guard) => Some(guard.clone()),
            Err(e) => {
                error!("Permits lock poisoned: {}", e);
                None
            }
        }
    }

    /// Returns the stored text and version of a document.
    pub(crate) fn document(&self, uri: &Url) -> Option<(String, i32)> {
        let docs = match self.documents.read() {
            Ok(guard) => guard,
            Err(e) => {
                error!("Documents lock poisoned: {}", e);
                return None;
            }
        };
        docs.get(uri).map(|doc| (doc.text.clone(), doc.version))
    }
}

impl Default for BackendState {
    fn default() -> Self {
        Self::new()
    }
}

/// Type alias for shared state.
pub type SharedState = Arc<BackendState>;
