//! The language server: protocol requests mapped onto [`GlobalState`].

use std::{collections::BTreeSet, path::PathBuf, sync::Arc};

use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tower_lsp::{
    async_trait,
    jsonrpc::{Error, Result},
    lsp_types::{
        CodeLens, CodeLensOptions, CodeLensParams, CompletionOptions, CompletionParams,
        CompletionResponse, Diagnostic, DidChangeTextDocumentParams, DidCloseTextDocumentParams,
        DidOpenTextDocumentParams, DocumentSymbolParams, DocumentSymbolResponse,
        ExecuteCommandOptions, ExecuteCommandParams, GotoDefinitionParams,
        GotoDefinitionResponse, Hover, HoverParams, HoverProviderCapability, InitializeParams,
        InitializeResult, InitializedParams, Location, MessageType, OneOf, ReferenceParams,
        ServerCapabilities, ServerInfo, SymbolInformation, TextDocumentSyncCapability,
        TextDocumentSyncKind, Url, WorkspaceSymbolParams,
    },
    Client, LanguageServer,
};
use tracing::{debug, error, info, warn};

use crate::{
    commands::{document_commands, CommandInvocation, CommandOutcome, UnavailableExecutor},
    completion::get_completions,
    config::Settings,
    diagnostics::document_diagnostics,
    dialects::{BuiltinDialects, BuiltinInlineDialects},
    hover::hover,
    lsp::{self, completion_item, Converter},
    references::{find_usages, goto_definition},
    symbol::{document_symbols, workspace_symbols},
    workspace::{GlobalState, WorkspaceSnapshot},
};

/// The part of [`Client`] the server uses.
#[async_trait]
pub trait LspClient: Send + Sync + Clone + 'static {
    async fn publish_diagnostics(&self, uri: Url, diags: Vec<Diagnostic>, version: Option<i32>);
    async fn show_message(&self, typ: MessageType, message: String);
}

#[async_trait]
impl LspClient for Client {
    async fn publish_diagnostics(&self, uri: Url, diags: Vec<Diagnostic>, version: Option<i32>) {
        self.publish_diagnostics(uri, diags, version).await;
    }

    async fn show_message(&self, typ: MessageType, message: String) {
        self.show_message(typ, message).await;
    }
}

pub struct DialectLanguageServer<C> {
    client: C,
    state: OnceCell<GlobalState>,
}

impl<C: LspClient> DialectLanguageServer<C> {
    /// The state is built on `initialize`, once the workspace root and the
    /// client capabilities are known.
    pub fn new(client: C) -> Self {
        DialectLanguageServer {
            client,
            state: OnceCell::new(),
        }
    }

    pub fn with_state(client: C, state: GlobalState) -> Self {
        DialectLanguageServer {
            client,
            state: OnceCell::new_with(Some(state)),
        }
    }

    fn state(&self) -> Result<&GlobalState> {
        self.state.get().ok_or_else(Error::invalid_request)
    }

    async fn snapshot(&self) -> Result<Arc<WorkspaceSnapshot>> {
        Ok(self.state()?.snapshot().await)
    }

    /// A change in one document can resolve or break pointers in any other,
    /// so every open document is republished.
    async fn publish_diagnostics(&self, snapshot: &WorkspaceSnapshot) {
        let converter = Converter::new(snapshot);
        let published = snapshot
            .documents()
            .filter_map(|document| {
                let uri = lsp::uri(document.id())?;
                match document_diagnostics(snapshot, document.id()) {
                    Ok(diagnostics) => Some((
                        uri,
                        diagnostics
                            .iter()
                            .map(|diagnostic| converter.diagnostic(diagnostic))
                            .collect::<Vec<_>>(),
                    )),
                    Err(err) => {
                        error!("{err}");
                        None
                    }
                }
            })
            .collect::<Vec<_>>();

        for (uri, diagnostics) in published {
            self.client.publish_diagnostics(uri, diagnostics, None).await;
        }
    }

    fn capabilities(state: &GlobalState) -> ServerCapabilities {
        let commands = state
            .extensions()
            .dialects
            .all()
            .iter()
            .filter_map(|dialect| dialect.command_producer())
            .flat_map(|producer| producer.command_ids().iter().map(|id| id.to_string()))
            .collect::<BTreeSet<_>>();

        ServerCapabilities {
            text_document_sync: Some(TextDocumentSyncCapability::Kind(TextDocumentSyncKind::FULL)),
            completion_provider: Some(CompletionOptions {
                resolve_provider: Some(false),
                trigger_characters: Some(vec![
                    "#".to_string(),
                    ":".to_string(),
                    "<".to_string(),
                    "[".to_string(),
                ]),
                ..Default::default()
            }),
            hover_provider: Some(HoverProviderCapability::Simple(true)),
            definition_provider: Some(OneOf::Left(true)),
            references_provider: Some(OneOf::Left(true)),
            document_symbol_provider: Some(OneOf::Left(true)),
            workspace_symbol_provider: Some(OneOf::Left(true)),
            code_lens_provider: Some(CodeLensOptions {
                resolve_provider: Some(false),
            }),
            execute_command_provider: Some(ExecuteCommandOptions {
                commands: commands.into_iter().collect(),
                ..Default::default()
            }),
            ..ServerCapabilities::default()
        }
    }
}

/// The first workspace folder, else the root uri, else the working
/// directory.
#[allow(deprecated)]
fn root_dir(params: &InitializeParams) -> PathBuf {
    params
        .workspace_folders
        .as_ref()
        .and_then(|folders| folders.first())
        .map(|folder| &folder.uri)
        .or(params.root_uri.as_ref())
        .and_then(|uri| uri.to_file_path().ok())
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_default()
}

#[async_trait]
impl<C: LspClient> LanguageServer for DialectLanguageServer<C> {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        let state = self
            .state
            .get_or_try_init(|| async {
                let root = root_dir(&params);
                let settings = Settings::new(&root, &params.capabilities).map_err(|err| {
                    error!("loading settings from {}: {err:#}", root.display());
                    Error::invalid_params(format!("invalid settings: {err:#}"))
                })?;
                info!(root = %root.display(), ?settings, "initializing");

                GlobalState::discover(
                    &BuiltinDialects::new(&settings),
                    &BuiltinInlineDialects::new(&settings),
                    settings.clone(),
                    Arc::new(UnavailableExecutor),
                )
                .map_err(|err| {
                    error!("{err}");
                    Error::internal_error()
                })
            })
            .await?;

        Ok(InitializeResult {
            capabilities: Self::capabilities(state),
            server_info: Some(ServerInfo {
                name: "dialect-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        info!("client initialized");
    }

    async fn shutdown(&self) -> Result<()> {
        if let Some(state) = self.state.get() {
            state.shutdown().await;
        }
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let Ok(state) = self.state() else { return };
        let id = lsp::document_id(&params.text_document.uri);
        let snapshot = state.open_document(id, params.text_document.text).await;
        self.publish_diagnostics(&snapshot).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let Ok(state) = self.state() else { return };
        let Some(change) = params.content_changes.into_iter().last() else {
            return;
        };

        let id = lsp::document_id(&params.text_document.uri);
        match state.change_document(id, change.text).await {
            Ok(snapshot) => self.publish_diagnostics(&snapshot).await,
            Err(err) => warn!("{err}"),
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let Ok(state) = self.state() else { return };
        let uri = params.text_document.uri;
        match state.close_document(&lsp::document_id(&uri)).await {
            Ok(snapshot) => {
                self.client.publish_diagnostics(uri, vec![], None).await;
                self.publish_diagnostics(&snapshot).await;
            }
            Err(err) => warn!("{err}"),
        }
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let snapshot = self.snapshot().await?;
        let position = params.text_document_position;
        let id = lsp::document_id(&position.text_document.uri);
        let position = Converter::new(&snapshot).position(&id, position.position);

        let items = get_completions(&snapshot, &id, position)
            .into_iter()
            .map(completion_item)
            .collect::<Vec<_>>();
        Ok(Some(CompletionResponse::Array(items)))
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        let snapshot = self.snapshot().await?;
        let converter = Converter::new(&snapshot);
        let position = params.text_document_position_params;
        let id = lsp::document_id(&position.text_document.uri);

        Ok(
            goto_definition(&snapshot, &id, converter.position(&id, position.position))
                .and_then(|reference| converter.location(reference.declaration()))
                .map(GotoDefinitionResponse::Scalar),
        )
    }

    async fn references(&self, params: ReferenceParams) -> Result<Option<Vec<Location>>> {
        let snapshot = self.snapshot().await?;
        let converter = Converter::new(&snapshot);
        let position = params.text_document_position;
        let id = lsp::document_id(&position.text_document.uri);

        let usages = find_usages(&snapshot, &id, converter.position(&id, position.position));
        Ok(Some(
            usages
                .iter()
                .filter_map(|location| converter.location(location))
                .collect(),
        ))
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let snapshot = self.snapshot().await?;
        let converter = Converter::new(&snapshot);
        let position = params.text_document_position_params;
        let id = lsp::document_id(&position.text_document.uri);

        Ok(hover(&snapshot, &id, converter.position(&id, position.position))
            .map(|hover| converter.hover(hover)))
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> Result<Option<DocumentSymbolResponse>> {
        let snapshot = self.snapshot().await?;
        let converter = Converter::new(&snapshot);
        let id = lsp::document_id(&params.text_document.uri);

        let symbols = document_symbols(&snapshot, &id)
            .into_iter()
            .map(|symbol| converter.document_symbol(symbol))
            .collect();
        Ok(Some(DocumentSymbolResponse::Nested(symbols)))
    }

    async fn symbol(&self, params: WorkspaceSymbolParams) -> Result<Option<Vec<SymbolInformation>>> {
        let snapshot = self.snapshot().await?;
        let converter = Converter::new(&snapshot);

        Ok(Some(
            workspace_symbols(&snapshot, &params.query)
                .into_iter()
                .filter_map(|symbol| converter.symbol_information(symbol))
                .collect(),
        ))
    }

    async fn code_lens(&self, params: CodeLensParams) -> Result<Option<Vec<CodeLens>>> {
        let snapshot = self.snapshot().await?;
        let converter = Converter::new(&snapshot);
        let id = lsp::document_id(&params.text_document.uri);

        Ok(Some(
            document_commands(&snapshot, &id)
                .into_iter()
                .filter_map(|command| converter.code_lens(command))
                .collect(),
        ))
    }

    async fn execute_command(&self, params: ExecuteCommandParams) -> Result<Option<Value>> {
        let state = self.state()?;
        let argument = params
            .arguments
            .into_iter()
            .next()
            .ok_or_else(|| Error::invalid_params("expected one command invocation"))?;
        let invocation: CommandInvocation = serde_json::from_value(argument)
            .map_err(|err| Error::invalid_params(format!("invalid command invocation: {err}")))?;
        if invocation.command_id != params.command {
            return Err(Error::invalid_params(format!(
                "invocation is for '{}', not '{}'",
                invocation.command_id, params.command
            )));
        }

        debug!(command = %params.command, entity = %invocation.entity_id, "executing");
        let outcome = state.execute_command(invocation).await;
        match &outcome {
            CommandOutcome::Completed(output) => {
                self.client
                    .show_message(MessageType::INFO, output.message.clone())
                    .await
            }
            CommandOutcome::Failed { reason } => {
                self.client
                    .show_message(MessageType::ERROR, reason.clone())
                    .await
            }
        }

        Ok(Some(json!(outcome)))
    }
}
