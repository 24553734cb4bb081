//! Configuration management for LSP server.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{error, info};

use drupalcheck_core::{Checker, CheckerConfig};

use crate::state::BackendState;

/// Loads the configuration: `initializationOptions` first, then a
/// `.drupalcheck.json` in the workspace root, then defaults.
pub fn load_config(state: &BackendState) -> CheckerConfig {
    let options = match state.initialization_options.read() {
        Ok(guard) => guard.clone(),
        Err(e) => {
            error!("Initialization options lock poisoned: {}", e);
            None
        }
    };

    if let Some(value) = options.filter(|v| !v.is_null()) {
        match CheckerConfig::from_value(value) {
            Ok(config) => {
                info!("Loaded configuration from initialization options");
                return config;
            }
            Err(e) => error!("Invalid initialization options: {}", e),
        }
    }

    if let Some(root) = state.workspace_root()
        && let Some(config_path) = CheckerConfig::discover(&root)
    {
        info!("Found config file: {}", config_path.display());
        match CheckerConfig::from_file(&config_path) {
            Ok(config) => {
                info!("Loaded configuration from workspace");
                return config;
            }
            Err(e) => error!("Failed to load config: {}", e),
        }
    }

    CheckerConfig::new()
}

/// Reloads configuration and rebuilds the checker.
pub fn reload_config(state: &BackendState) {
    let config = load_config(state);
    let root = state.workspace_root();

    let checker = match Checker::new(&config, root.as_deref()) {
        Ok(checker) => {
            info!(
                "Checker initialized with {}",
                checker.invoker().executable().display()
            );
            Some(Arc::new(checker))
        }
        Err(e) => {
            error!("Failed to create checker: {}. Diagnostics are disabled.", e);
            None
        }
    };

    match state.checker.write() {
        Ok(mut guard) => *guard = checker,
        Err(e) => error!("Checker lock poisoned: {}", e),
    }
    match state.permits.write() {
        Ok(mut guard) => *guard = Arc::new(Semaphore::new(config.max_concurrent_checks.max(1))),
        Err(e) => error!("Permits lock poisoned: {}", e),
    }
    match state.config.write() {
        Ok(mut guard) => *guard = config,
        Err(e) => error!("Config lock poisoned: {}", e),
    }
}
