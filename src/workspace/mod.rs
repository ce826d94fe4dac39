//! Workspace state: documents, their dialect sections and the process-wide
//! [`GlobalState`].
//!
//! Every request reads an immutable [`WorkspaceSnapshot`]. Writers (open,
//! change, close) are serialized, build the next snapshot without holding the
//! read lock, and publish it with a single pointer swap. A reader therefore
//! sees a document either wholly before or wholly after an edit.

mod document;
mod partition;
mod snapshot;

#[cfg(test)]
mod tests;

pub use document::{Document, Section};
pub use partition::{partition, SectionSpan};
pub use snapshot::WorkspaceSnapshot;

use std::{sync::Arc, time::Duration};

use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::{
    commands::{self, CommandExecutor, CommandInvocation, CommandOutcome},
    config::Settings,
    extension::{DialectExtension, Extensions, InlineDialectExtension},
    location::DocumentId,
    registry::{PluginSource, RegistryError},
};

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("document '{0}' is not open")]
    UnknownDocument(DocumentId),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

pub struct GlobalState {
    extensions: Arc<Extensions>,
    settings: Arc<Settings>,
    current: RwLock<Arc<WorkspaceSnapshot>>,
    writer: Mutex<()>,
    executor: Arc<dyn CommandExecutor>,
}

impl GlobalState {
    /// The registries are complete at this point; nothing registers
    /// afterwards.
    pub fn new(
        extensions: Extensions,
        settings: Settings,
        executor: Arc<dyn CommandExecutor>,
    ) -> GlobalState {
        let extensions = Arc::new(extensions);
        let settings = Arc::new(settings);
        info!(
            dialects = ?extensions.dialects.names().collect::<Vec<_>>(),
            inline = ?extensions.inline.names().collect::<Vec<_>>(),
            "workspace state created"
        );

        GlobalState {
            current: RwLock::new(Arc::new(WorkspaceSnapshot::new(
                extensions.clone(),
                settings.clone(),
            ))),
            extensions,
            settings,
            writer: Mutex::new(()),
            executor,
        }
    }

    /// Fails on the first handler name conflict of either family.
    pub fn discover(
        dialects: &impl PluginSource<dyn DialectExtension>,
        inline: &impl PluginSource<dyn InlineDialectExtension>,
        settings: Settings,
        executor: Arc<dyn CommandExecutor>,
    ) -> Result<GlobalState, WorkspaceError> {
        let extensions = Extensions::discover(dialects, inline)?;
        Ok(GlobalState::new(extensions, settings, executor))
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub async fn snapshot(&self) -> Arc<WorkspaceSnapshot> {
        self.current.read().await.clone()
    }

    /// Adds the document, replacing it if it is already open.
    pub async fn open_document(&self, id: DocumentId, text: String) -> Arc<WorkspaceSnapshot> {
        let _writer = self.writer.lock().await;
        let next = self.snapshot().await.with_document(id.clone(), text);
        info!(document = %id, "opened document");
        self.publish(next).await
    }

    pub async fn change_document(
        &self,
        id: DocumentId,
        text: String,
    ) -> Result<Arc<WorkspaceSnapshot>, WorkspaceError> {
        let _writer = self.writer.lock().await;
        let current = self.snapshot().await;
        if current.document(id.as_str()).is_none() {
            return Err(WorkspaceError::UnknownDocument(id));
        }

        let next = current.with_document(id.clone(), text);
        debug!(document = %id, "changed document");
        Ok(self.publish(next).await)
    }

    pub async fn close_document(
        &self,
        id: &DocumentId,
    ) -> Result<Arc<WorkspaceSnapshot>, WorkspaceError> {
        let _writer = self.writer.lock().await;
        let next = self
            .snapshot()
            .await
            .without_document(id)
            .ok_or_else(|| WorkspaceError::UnknownDocument(id.clone()))?;
        info!(document = %id, "closed document");
        Ok(self.publish(next).await)
    }

    /// Runs a server-side command against the current snapshot. The state is
    /// never modified, whatever the outcome.
    pub async fn execute_command(&self, invocation: CommandInvocation) -> CommandOutcome {
        let snapshot = self.snapshot().await;
        let timeout = Duration::from_millis(self.settings.command_timeout_ms);
        commands::execute_command(&snapshot, self.executor.as_ref(), invocation, timeout).await
    }

    /// Drops every document. Requests still holding a snapshot keep it.
    pub async fn shutdown(&self) {
        let _writer = self.writer.lock().await;
        let next = self.snapshot().await.cleared();
        self.publish(next).await;
        info!("workspace state shut down");
    }

    async fn publish(&self, next: WorkspaceSnapshot) -> Arc<WorkspaceSnapshot> {
        let next = Arc::new(next);
        *self.current.write().await = next.clone();
        debug!(documents = next.len(), "published snapshot");
        next
    }
}
