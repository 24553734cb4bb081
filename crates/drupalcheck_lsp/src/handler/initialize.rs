//! Initialize and shutdown handlers.

use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tracing::{error, info};

use crate::config::reload_config;
use crate::state::BackendState;

/// Handles the `initialize` LSP request.
pub async fn handle_initialize(
    state: &BackendState,
    params: InitializeParams,
) -> Result<InitializeResult> {
    info!("drupal-check LSP server initializing...");

    #[allow(deprecated)]
    let root = params
        .workspace_folders
        .as_ref()
        .and_then(|folders| folders.first())
        .and_then(|folder| folder.uri.to_file_path().ok())
        .or_else(|| params.root_uri.as_ref().and_then(|u| u.to_file_path().ok()));

    match state.workspace_root.write() {
        Ok(mut guard) => *guard = root,
        Err(e) => {
            error!("Workspace root lock poisoned: {}", e);
            return Ok(InitializeResult::default());
        }
    }
    match state.initialization_options.write() {
        Ok(mut guard) => *guard = params.initialization_options,
        Err(e) => error!("Initialization options lock poisoned: {}", e),
    }

    reload_config(state);

    Ok(InitializeResult {
        capabilities: ServerCapabilities {
            text_document_sync: Some(TextDocumentSyncCapability::Options(
                TextDocumentSyncOptions {
                    open_close: Some(true),
                    change: Some(TextDocumentSyncKind::FULL),
                    save: Some(TextDocumentSyncSaveOptions::SaveOptions(SaveOptions {
                        include_text: Some(true),
                    })),
                    ..Default::default()
                },
            )),
            ..Default::default()
        },
        server_info: Some(ServerInfo {
            name: "drupalcheck-lsp".to_string(),
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
        }),
    })
}

/// Handles the `initialized` LSP notification.
pub async fn handle_initialized(client: &tower_lsp::Client) {
    client
        .log_message(MessageType::INFO, "drupal-check LSP server initialized!")
        .await;
}

/// Handles the `shutdown` LSP request.
pub async fn handle_shutdown() -> Result<()> {
    info!("drupal-check LSP server shutting down...");
    Ok(())
}
