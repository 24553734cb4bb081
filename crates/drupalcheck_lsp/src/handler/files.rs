//! Watched files handler.

use tower_lsp::lsp_types::*;
use tracing::{debug, info};

use drupalcheck_core::CheckerConfig;

use crate::config::reload_config;
use crate::state::BackendState;

/// Returns true if any change touches a configuration file.
pub(crate) fn touches_config(changes: &[FileEvent]) -> bool {
    changes.iter().any(|change| {
        let path = change.uri.path();
        CheckerConfig::CONFIG_FILES
            .iter()
            .any(|name| path.ends_with(name))
    })
}

/// Handles the `workspace/didChangeWatchedFiles` notification.
pub async fn handle_did_change_watched_files(
    state: &BackendState,
    params: DidChangeWatchedFilesParams,
) -> bool {
    debug!("Watched files changed: {:?}", params.changes);

    let config_changed = touches_config(&params.changes);
    if config_changed {
        info!("Configuration file changed, reloading...");
        reload_config(state);
    }
    config_changed
}
