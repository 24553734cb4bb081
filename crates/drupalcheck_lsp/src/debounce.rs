//! Delays `onType` validation until edits settle.

use std::future::Future;
use std::time::Duration;

use tower_lsp::lsp_types::Url;
use tracing::error;

use crate::state::{BackendState, SharedState};

/// Quiet period after an edit before drupal-check runs, in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Runs `validate_fn` after the quiet period unless a newer edit arrived.
///
/// Every edit schedules its own task; only the one whose `version` is still
/// current when it wakes spawns the analyzer.
pub fn spawn_debounced_validation<F, Fut>(
    state: SharedState,
    uri: Url,
    text: String,
    version: i32,
    validate_fn: F,
) where
    F: FnOnce(Url, String, Option<i32>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(DEFAULT_DEBOUNCE_MS)).await;

        if check_version(&state, &uri, version) {
            validate_fn(uri, text, Some(version)).await;
        }
    });
}

/// True while `uri` is open at exactly `version`.
pub(crate) fn check_version(state: &BackendState, uri: &Url, version: i32) -> bool {
    let docs = match state.documents.read() {
        Ok(g) => g,
        Err(e) => {
            error!("Documents lock poisoned: {}", e);
            return false;
        }
    };

    docs.get(uri)
        .map(|doc| doc.version == version)
        .unwrap_or(false)
}
