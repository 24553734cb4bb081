//! drupal-check LSP Server
//!
//! Language Server Protocol implementation that runs `drupal-check` on open
//! PHP documents and publishes its findings as diagnostics.

mod config;
mod conversion;
mod debounce;
mod handler;
mod state;

use std::sync::Arc;

use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer, LspService, Server};
use tracing::{debug, error, info};

use drupalcheck_core::{CheckRequest, CheckerError, Diagnostic as CheckDiagnostic, RunTrigger};

pub use conversion::to_lsp_diagnostic;
pub use state::{BackendState, SharedState};

/// The LSP backend for drupal-check.
#[derive(Clone)]
pub struct Backend {
    /// LSP client for sending notifications.
    client: Client,
    /// Shared state
    state: SharedState,
}

impl Backend {
    /// Creates a new backend with the given client.
    ///
    /// The checker is built during `initialize`, once the workspace root and
    /// client options are known.
    pub fn new(client: Client) -> Self {
        Self::with_state(client, Arc::new(BackendState::new()))
    }

    /// Creates a backend around existing state.
    pub fn with_state(client: Client, state: SharedState) -> Self {
        Self { client, state }
    }

    /// Validates a document and publishes diagnostics.
    async fn validate_document(&self, uri: Url, text: String, version: Option<i32>) {
        debug!("Validating document: {}", uri);

        if uri.to_file_path().is_err() {
            debug!("Skipping validation for non-file URI: {}", uri);
            return;
        }

        let result = self.check_text(&uri, text).await;

        // Checks run concurrently with other notifications; the document may
        // have been closed or edited while the analyzer was running.
        if !self.is_current(&uri, version) {
            debug!("Discarding stale check result for {}", uri);
            return;
        }

        match result {
            Ok(Some(diagnostics)) => {
                let lsp_diagnostics: Vec<Diagnostic> =
                    diagnostics.iter().map(to_lsp_diagnostic).collect();
                self.client
                    .publish_diagnostics(uri, lsp_diagnostics, version)
                    .await;
            }
            Ok(None) => {}
            Err(e) => {
                error!("Check failed for {}: {}", uri, e);
                self.client
                    .show_message(MessageType::ERROR, format!("drupal-check: {}", e))
                    .await;
            }
        }
    }

    /// Runs the checker on `text`.
    ///
    /// The blocking check runs on `spawn_blocking` while holding a permit, so
    /// at most `maxConcurrentChecks` analyzer processes run at once. Returns
    /// `Ok(None)` when no checker is available.
    async fn check_text(
        &self,
        uri: &Url,
        text: String,
    ) -> std::result::Result<Option<Vec<CheckDiagnostic>>, CheckerError> {
        let Some(checker) = self.state.checker() else {
            debug!("Checker not available, skipping check");
            return Ok(None);
        };
        let Some(permits) = self.state.permits() else {
            return Ok(None);
        };

        let request = CheckRequest::new(text, uri.clone(), self.state.workspace_root());

        let permit = match permits.acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                error!("Check semaphore closed: {}", e);
                return Ok(None);
            }
        };

        let result = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            checker.check(&request)
        })
        .await;

        match result {
            Ok(checked) => checked.map(Some),
            Err(e) => {
                error!("Check task failed: {}", e);
                Ok(None)
            }
        }
    }

    /// Returns true if `uri` is still open at `version`.
    fn is_current(&self, uri: &Url, version: Option<i32>) -> bool {
        match version {
            Some(version) => debounce::check_version(&self.state, uri, version),
            None => self.state.document(uri).is_some(),
        }
    }

    fn run_trigger(&self) -> RunTrigger {
        match self.state.config.read() {
            Ok(config) => config.run,
            Err(e) => {
                error!("Config lock poisoned: {}", e);
                RunTrigger::default()
            }
        }
    }

    /// Re-validates every open document, e.g. after a configuration reload.
    async fn revalidate_all(&self) {
        let documents: Vec<(Url, String, i32)> = match self.state.documents.read() {
            Ok(docs) => docs
                .iter()
                .map(|(uri, doc)| (uri.clone(), doc.text.clone(), doc.version))
                .collect(),
            Err(e) => {
                error!("Documents lock poisoned: {}", e);
                return;
            }
        };

        for (uri, text, version) in documents {
            self.validate_document(uri, text, Some(version)).await;
        }
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        handler::handle_initialize(&self.state, params).await
    }

    async fn initialized(&self, _: InitializedParams) {
        handler::handle_initialized(&self.client).await;
    }

    async fn shutdown(&self) -> Result<()> {
        handler::handle_shutdown().await
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let (uri, text, version) = handler::handle_did_open(&self.state, params).await;
        self.validate_document(uri, text, version).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let Some((uri, text, version)) = handler::handle_did_change(&self.state, params).await
        else {
            return;
        };

        if self.run_trigger() != RunTrigger::OnType {
            return;
        }

        let backend = self.clone();
        debounce::spawn_debounced_validation(
            self.state.clone(),
            uri,
            text,
            version,
            move |uri, text, version| async move {
                backend.validate_document(uri, text, version).await;
            },
        );
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        if let Some((uri, text, version)) = handler::handle_did_save(&self.state, params).await {
            self.validate_document(uri, text, version).await;
        }
    }

    async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        if handler::handle_did_change_watched_files(&self.state, params).await {
            self.revalidate_all().await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = handler::handle_did_close(&self.state, params).await;

        // Clear diagnostics
        self.client.publish_diagnostics(uri, vec![], None).await;
    }
}

/// Starts the LSP server.
///
/// This function does not return unless an error occurs or the server shuts down.
pub async fn run() {
    info!("drupal-check LSP server starting...");

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(Backend::new);
    Server::new(stdin, stdout, socket).serve(service).await;
}
