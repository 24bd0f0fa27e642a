//! Session state, method dispatch and the read loop.
//!
//! Messages are handled one at a time in arrival order. The only blocking
//! work, the initial workspace build, runs on a blocking worker that the loop
//! awaits before reading the next message.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use lsp_types::{
    notification::{Notification as _, PublishDiagnostics},
    CompletionOptions, CompletionParams, CompletionResponse, CompletionTextEdit,
    DidChangeTextDocumentParams,
    DidChangeWatchedFilesParams, DidCloseTextDocumentParams, DidOpenTextDocumentParams,
    DidSaveTextDocumentParams, FileChangeType, GotoDefinitionParams, GotoDefinitionResponse,
    HoverParams, HoverProviderCapability, InitializeParams, InitializeResult, OneOf, Position,
    PositionEncodingKind, PublishDiagnosticsParams, Range, SaveOptions, ServerCapabilities, ServerInfo,
    TextDocumentSyncCapability, TextDocumentSyncKind, TextDocumentSyncOptions,
    TextDocumentSyncSaveOptions, Url,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::document::Documents;
use crate::index::Index;
use crate::jsonrpc::{Message, Notification, Request, RequestId, Response, ResponseError};
use crate::syntax::PositionEncoding;
use crate::transport::{MessageReader, MessageWriter, TransportError};
use crate::{completion, diagnostics, gotodef, hover};

pub const TRIGGER_CHARACTERS: &[&str] = &["[", "@", "!", "?", " "];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    /// `initialize` answered, waiting for `initialized`.
    Initializing,
    Initialized,
    ShuttingDown,
    Exited,
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("transport failed: {0}")]
    Transport(#[from] TransportError),
}

type HandlerResult = Result<Value, ResponseError>;

fn parse_params<P: DeserializeOwned>(params: Value) -> Result<P, ResponseError> {
    serde_json::from_value(params).map_err(|err| ResponseError::invalid_params(err.to_string()))
}

fn to_result<T: Serialize>(result: T) -> HandlerResult {
    serde_json::to_value(result).map_err(|err| ResponseError::internal_error(err.to_string()))
}

fn is_markdown(uri: &Url) -> bool {
    Path::new(uri.path())
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
}

fn uri_path(uri: &Url) -> PathBuf {
    uri.to_file_path()
        .unwrap_or_else(|_| PathBuf::from(uri.path()))
}

#[allow(deprecated)]
fn workspace_root(params: &InitializeParams) -> Option<PathBuf> {
    params
        .root_uri
        .as_ref()
        .and_then(|uri| uri.to_file_path().ok())
        .or_else(|| params.root_path.as_ref().map(PathBuf::from))
        .or_else(|| {
            params
                .workspace_folders
                .as_ref()?
                .first()
                .and_then(|folder| folder.uri.to_file_path().ok())
        })
}

/// UTF-32 when the client offers it, otherwise the protocol default.
fn negotiate_encoding(params: &InitializeParams) -> PositionEncoding {
    let offered = params
        .capabilities
        .general
        .as_ref()
        .and_then(|general| general.position_encodings.as_ref());

    if offered.is_some_and(|kinds| kinds.contains(&PositionEncodingKind::UTF32)) {
        PositionEncoding::Utf32
    } else {
        PositionEncoding::Utf16
    }
}

fn line_at(text: &str, line: u32) -> &str {
    text.lines().nth(line as usize).unwrap_or_default()
}

pub fn capabilities(encoding: PositionEncoding) -> ServerCapabilities {
    ServerCapabilities {
        position_encoding: Some(match encoding {
            PositionEncoding::Utf16 => PositionEncodingKind::UTF16,
            PositionEncoding::Utf32 => PositionEncodingKind::UTF32,
        }),
        text_document_sync: Some(TextDocumentSyncCapability::Options(TextDocumentSyncOptions {
            open_close: Some(true),
            change: Some(TextDocumentSyncKind::FULL),
            save: Some(TextDocumentSyncSaveOptions::SaveOptions(SaveOptions {
                include_text: Some(true),
            })),
            ..Default::default()
        })),
        completion_provider: Some(CompletionOptions {
            trigger_characters: Some(TRIGGER_CHARACTERS.iter().map(|c| c.to_string()).collect()),
            ..Default::default()
        }),
        hover_provider: Some(HoverProviderCapability::Simple(true)),
        definition_provider: Some(OneOf::Left(true)),
        ..Default::default()
    }
}

pub struct Server {
    state: SessionState,
    root: Option<PathBuf>,
    settings: Settings,
    encoding: PositionEncoding,
    index: Arc<Index>,
    documents: Documents,
    writer: MessageWriter,
}

impl Server {
    pub fn new(writer: impl AsyncWrite + Send + Unpin + 'static) -> Server {
        Server {
            state: SessionState::Uninitialized,
            root: None,
            settings: Settings::default(),
            encoding: PositionEncoding::default(),
            index: Arc::new(Index::new()),
            documents: Documents::new(),
            writer: MessageWriter::new(writer),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Serves one client until `exit`, end of input or cancellation.
    pub async fn run(
        reader: impl AsyncRead + Unpin,
        writer: impl AsyncWrite + Send + Unpin + 'static,
        cancel: CancellationToken,
    ) -> Result<(), ServerError> {
        let mut reader = MessageReader::new(reader);
        let mut server = Server::new(writer);

        while server.state != SessionState::Exited {
            let read = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("server cancelled");
                    break;
                }
                read = reader.read_message() => read,
            };

            match read {
                Ok(Some(message)) => server.handle_message(message).await?,
                Ok(None) => {
                    tracing::info!("input closed");
                    break;
                }
                Err(err) if err.is_fatal() => return Err(err.into()),
                Err(TransportError::Parse(err)) => {
                    tracing::warn!(error = %err, "invalid JSON");
                    server
                        .reply(Response::err(
                            RequestId::Null,
                            ResponseError::parse_error(err.to_string()),
                        ))
                        .await?;
                }
                Err(TransportError::InvalidMessage(err)) => {
                    tracing::warn!(error = %err, "invalid message");
                    server
                        .reply(Response::err(
                            RequestId::Null,
                            ResponseError::invalid_request(err.to_string()),
                        ))
                        .await?;
                }
                Err(err) => tracing::warn!(error = %err, "dropping unreadable message"),
            }
        }

        Ok(())
    }

    pub async fn handle_message(&mut self, message: Message) -> Result<(), TransportError> {
        match message {
            Message::Request(request) => {
                tracing::debug!(id = %request.id, method = %request.method, "request");
                let response = self.handle_request(request).await;
                self.reply(response).await
            }
            Message::Notification(notification) => {
                tracing::debug!(method = %notification.method, "notification");
                self.handle_notification(notification).await
            }
            Message::Response(response) => {
                tracing::debug!(id = %response.id, "ignoring client response");
                Ok(())
            }
        }
    }

    async fn reply(&self, response: Response) -> Result<(), TransportError> {
        self.writer.send(&Message::from(response)).await
    }

    async fn handle_request(&mut self, request: Request) -> Response {
        let Request { id, method, params } = request;

        let result = match (self.state, method.as_str()) {
            (_, "exit") => {
                self.state = SessionState::Exited;
                Ok(Value::Null)
            }
            (SessionState::Uninitialized, "initialize") => self.initialize(params),
            (_, "initialize") => Err(ResponseError::invalid_request("server already initialized")),
            (SessionState::Uninitialized, _) => Err(ResponseError::server_not_initialized()),
            (SessionState::ShuttingDown | SessionState::Exited, _) => {
                Err(ResponseError::invalid_request("server is shutting down"))
            }
            (_, "shutdown") => {
                tracing::info!("shutdown requested");
                self.state = SessionState::ShuttingDown;
                Ok(Value::Null)
            }
            (_, "textDocument/completion") => self.completion(params).await,
            (_, "textDocument/hover") => self.hover(params).await,
            (_, "textDocument/definition") => self.definition(params).await,
            (_, other) => Err(ResponseError::method_not_found(other)),
        };

        match result {
            Ok(value) => Response::ok(id, value),
            Err(error) => {
                tracing::debug!(%id, %method, code = error.code.code(), "request failed");
                Response::err(id, error)
            }
        }
    }

    async fn handle_notification(&mut self, notification: Notification) -> Result<(), TransportError> {
        let Notification { method, params } = notification;

        match (self.state, method.as_str()) {
            (_, "exit") => {
                tracing::info!("exit");
                self.state = SessionState::Exited;
                Ok(())
            }
            (SessionState::Uninitialized | SessionState::ShuttingDown | SessionState::Exited, _) => {
                tracing::debug!(%method, state = ?self.state, "dropping notification");
                Ok(())
            }
            (_, "initialized") => self.initialized().await,
            (_, "textDocument/didOpen") => match parse_params(params) {
                Ok(params) => self.did_open(params).await,
                Err(err) => Ok(log_bad_params(&method, err)),
            },
            (_, "textDocument/didChange") => match parse_params(params) {
                Ok(params) => self.did_change(params).await,
                Err(err) => Ok(log_bad_params(&method, err)),
            },
            (_, "textDocument/didSave") => match parse_params(params) {
                Ok(params) => self.did_save(params).await,
                Err(err) => Ok(log_bad_params(&method, err)),
            },
            (_, "textDocument/didClose") => match parse_params(params) {
                Ok(params) => self.did_close(params).await,
                Err(err) => Ok(log_bad_params(&method, err)),
            },
            (_, "workspace/didChangeWatchedFiles") => match parse_params(params) {
                Ok(params) => self.did_change_watched_files(params).await,
                Err(err) => Ok(log_bad_params(&method, err)),
            },
            (_, other) => {
                tracing::debug!(method = other, "ignoring unknown notification");
                Ok(())
            }
        }
    }

    fn initialize(&mut self, params: Value) -> HandlerResult {
        let params: InitializeParams = parse_params(params)?;

        self.root = workspace_root(&params);
        self.settings = match &self.root {
            Some(root) => Settings::new(root).unwrap_or_else(|err| {
                tracing::warn!(error = %err, "invalid configuration, using defaults");
                Settings::default()
            }),
            None => Settings::default(),
        };

        self.encoding = negotiate_encoding(&params);

        tracing::info!(root = ?self.root, encoding = ?self.encoding, "initialize");
        self.state = SessionState::Initializing;

        to_result(InitializeResult {
            capabilities: capabilities(self.encoding),
            server_info: Some(ServerInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&mut self) -> Result<(), TransportError> {
        if self.state != SessionState::Initializing {
            tracing::debug!(state = ?self.state, "ignoring repeated initialized");
            return Ok(());
        }

        match self.root.clone() {
            Some(root) => {
                let index = self.index.clone();
                let settings = self.settings.clone();
                let build = tokio::task::spawn_blocking(move || index.build(&root, &settings));
                if let Err(err) = build.await {
                    tracing::error!(error = %err, "workspace build failed");
                }
            }
            None => tracing::warn!("no workspace root, starting with an empty index"),
        }

        // documents opened before the build keep their editor text
        for document in self.documents.all().await {
            self.index.update(&document.uri, &document.text);
        }

        self.state = SessionState::Initialized;
        self.publish_all().await
    }

    async fn did_open(&mut self, params: DidOpenTextDocumentParams) -> Result<(), TransportError> {
        let document = params.text_document;
        self.index.update(&document.uri, &document.text);
        self.documents
            .upsert(document.uri.clone(), document.text, document.version)
            .await;
        self.publish(&document.uri).await
    }

    async fn did_change(&mut self, params: DidChangeTextDocumentParams) -> Result<(), TransportError> {
        let uri = params.text_document.uri;
        let Some(change) = params.content_changes.into_iter().last() else {
            return Ok(());
        };

        self.index.update(&uri, &change.text);
        self.documents
            .upsert(uri.clone(), change.text, params.text_document.version)
            .await;
        self.publish(&uri).await
    }

    async fn did_save(&mut self, params: DidSaveTextDocumentParams) -> Result<(), TransportError> {
        let uri = params.text_document.uri;
        let open = self.documents.get(&uri).await;

        match (params.text, open) {
            (Some(text), open) => {
                self.index.update(&uri, &text);
                let version = open.map_or(0, |document| document.version);
                self.documents.upsert(uri.clone(), text, version).await;
            }
            (None, Some(document)) => self.index.update(&uri, &document.text),
            (None, None) => {
                if let Err(err) = self.index.index_file(&uri_path(&uri)) {
                    tracing::warn!(%uri, error = %err, "cannot re-index saved file");
                }
            }
        }

        self.publish_all().await
    }

    async fn did_close(&mut self, params: DidCloseTextDocumentParams) -> Result<(), TransportError> {
        let uri = params.text_document.uri;
        self.documents.close(&uri).await;

        // the file on disk is authoritative again
        if let Err(err) = self.index.index_file(&uri_path(&uri)) {
            tracing::debug!(%uri, error = %err, "closed document not on disk, dropping it");
            self.index.remove(&uri);
        }

        self.send_diagnostics(uri, Vec::new(), None).await
    }

    async fn did_change_watched_files(
        &mut self,
        params: DidChangeWatchedFilesParams,
    ) -> Result<(), TransportError> {
        for change in params.changes {
            if !is_markdown(&change.uri) {
                continue;
            }
            if self.documents.get(&change.uri).await.is_some() {
                tracing::debug!(uri = %change.uri, "open document wins over disk change");
                continue;
            }

            if change.typ == FileChangeType::DELETED {
                self.index.remove(&change.uri);
            } else if let Err(err) = self.index.index_file(&uri_path(&change.uri)) {
                tracing::warn!(uri = %change.uri, error = %err, "cannot index changed file");
            }
        }

        self.publish_all().await
    }

    async fn document_text(&self, uri: &Url) -> Option<String> {
        match self.documents.text(uri).await {
            Some(text) => Some(text),
            None => tokio::fs::read_to_string(uri_path(uri)).await.ok(),
        }
    }

    /// Client position to the char position the analyzers work with.
    fn char_position(&self, text: &str, position: Position) -> Position {
        let line = line_at(text, position.line);
        Position {
            line: position.line,
            character: self.encoding.char_column(line, position.character) as u32,
        }
    }

    fn client_range(&self, text: &str, range: Range) -> Range {
        let convert = |position: Position| Position {
            line: position.line,
            character: self
                .encoding
                .client_column(line_at(text, position.line), position.character as usize),
        };

        Range {
            start: convert(range.start),
            end: convert(range.end),
        }
    }

    async fn completion(&self, params: Value) -> HandlerResult {
        let params: CompletionParams = parse_params(params)?;
        let position = params.text_document_position;
        let text = self
            .document_text(&position.text_document.uri)
            .await
            .unwrap_or_default();

        let at = self.char_position(&text, position.position);
        let mut response = completion::get_completions(&self.index, &text, at);
        if let CompletionResponse::List(list) = &mut response {
            for item in &mut list.items {
                if let Some(CompletionTextEdit::Edit(edit)) = &mut item.text_edit {
                    edit.range = self.client_range(&text, edit.range);
                }
            }
        }

        to_result(response)
    }

    async fn hover(&self, params: Value) -> HandlerResult {
        let params: HoverParams = parse_params(params)?;
        let position = params.text_document_position_params;
        let Some(text) = self.document_text(&position.text_document.uri).await else {
            return Ok(Value::Null);
        };

        let at = self.char_position(&text, position.position);
        let hover = hover::hover(&self.index, &text, at, &self.settings).map(|mut hover| {
            hover.range = hover.range.map(|range| self.client_range(&text, range));
            hover
        });

        to_result(hover)
    }

    async fn definition(&self, params: Value) -> HandlerResult {
        let params: GotoDefinitionParams = parse_params(params)?;
        let position = params.text_document_position_params;
        let Some(text) = self.document_text(&position.text_document.uri).await else {
            return Ok(Value::Null);
        };

        to_result(
            gotodef::goto_definition(&self.index, &text, self.char_position(&text, position.position))
                .map(GotoDefinitionResponse::Scalar),
        )
    }

    async fn publish(&self, uri: &Url) -> Result<(), TransportError> {
        let Some(document) = self.documents.get(uri).await else {
            return Ok(());
        };

        let diagnostics = diagnostics::diagnostics(
            &self.index,
            &self.settings,
            &document.path(),
            &document.text,
        )
        .into_iter()
        .map(|mut diagnostic| {
            diagnostic.range = self.client_range(&document.text, diagnostic.range);
            diagnostic
        })
        .collect();
        self.send_diagnostics(document.uri, diagnostics, Some(document.version))
            .await
    }

    async fn publish_all(&self) -> Result<(), TransportError> {
        for document in self.documents.all().await {
            self.publish(&document.uri).await?;
        }
        Ok(())
    }

    async fn send_diagnostics(
        &self,
        uri: Url,
        diagnostics: Vec<lsp_types::Diagnostic>,
        version: Option<i32>,
    ) -> Result<(), TransportError> {
        let params = PublishDiagnosticsParams {
            uri,
            diagnostics,
            version,
        };
        let params = serde_json::to_value(params).map_err(TransportError::Serialize)?;

        self.writer
            .send(&Message::notification(PublishDiagnostics::METHOD, params))
            .await
    }
}

fn log_bad_params(method: &str, error: ResponseError) {
    tracing::warn!(method, error = %error.message, "dropping notification with invalid params");
}
