//! Executable actions attached to elements.
//!
//! Handlers push [`Command`]s for an element into a [`CommandCollector`],
//! which binds them to the element's id and location and drops a second
//! command with an id already used for that element. Client commands are
//! only advertised; server commands are run by a [`CommandExecutor`] on an
//! owned [`ExecutionRequest`], under a timeout, and never touch the
//! workspace.

use std::{
    collections::{BTreeMap, HashSet},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    element::Element,
    location::{DocumentId, Location},
    workspace::{Section, WorkspaceSnapshot},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandKind {
    /// Handled by the editor, e.g. copying text.
    Client,
    /// Handled by a [`CommandExecutor`].
    Server,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Command {
    pub entity_id: String,
    pub id: String,
    pub title: String,
    pub location: Location,
    pub arguments: BTreeMap<String, String>,
    pub kind: CommandKind,
}

/// Receives the commands of one element.
pub struct CommandCollector {
    entity_id: String,
    location: Location,
    seen: HashSet<String>,
    commands: Vec<Command>,
}

impl CommandCollector {
    pub fn new(entity_id: impl Into<String>, location: Location) -> CommandCollector {
        CommandCollector {
            entity_id: entity_id.into(),
            location,
            seen: HashSet::new(),
            commands: Vec::new(),
        }
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    /// Returns `false` and keeps the first command when `id` was already
    /// pushed for this element.
    pub fn push(
        &mut self,
        id: impl Into<String>,
        title: impl Into<String>,
        arguments: BTreeMap<String, String>,
        kind: CommandKind,
    ) -> bool {
        let id = id.into();
        if !self.seen.insert(id.clone()) {
            warn!(entity = %self.entity_id, command = %id, "duplicate command id ignored");
            return false;
        }

        self.commands.push(Command {
            entity_id: self.entity_id.clone(),
            id,
            title: title.into(),
            location: self.location.clone(),
            arguments,
            kind,
        });
        true
    }

    pub fn into_commands(self) -> Vec<Command> {
        self.commands
    }
}

/// What a server command needs, detached from the workspace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionRequest {
    pub dialect: String,
    pub entity_id: String,
    pub command_id: String,
    pub location: Location,
    pub arguments: BTreeMap<String, String>,
    /// Dialect-specific description of the element, e.g. a connection url.
    pub payload: serde_json::Value,
}

pub trait CommandProducer: Send + Sync {
    /// Every command id the handler may produce.
    fn command_ids(&self) -> &'static [&'static str];

    fn collect_commands(&self, section: &Section, element: &Element, collector: &mut CommandCollector);

    /// The request for a server command, or `None` when the handler does not
    /// run `command_id` for this element.
    fn execution_request(
        &self,
        element: &Element,
        command_id: &str,
        arguments: &BTreeMap<String, String>,
    ) -> Option<ExecutionRequest>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandOutput {
    pub message: String,
    pub data: Option<serde_json::Value>,
}

/// Runs server commands, typically by calling out to another process or
/// service.
#[tower_lsp::async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, request: ExecutionRequest) -> anyhow::Result<CommandOutput>;
}

/// Used when no execution backend is configured.
pub struct UnavailableExecutor;

#[tower_lsp::async_trait]
impl CommandExecutor for UnavailableExecutor {
    async fn execute(&self, request: ExecutionRequest) -> anyhow::Result<CommandOutput> {
        anyhow::bail!(
            "no execution backend is configured for '{}'",
            request.command_id
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CommandOutcome {
    Completed(CommandOutput),
    Failed { reason: String },
}

impl CommandOutcome {
    fn failed(reason: impl Into<String>) -> CommandOutcome {
        CommandOutcome::Failed {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandInvocation {
    pub document: DocumentId,
    pub entity_id: String,
    pub command_id: String,
    #[serde(default)]
    pub arguments: BTreeMap<String, String>,
}

/// Commands of every element of a document, in element order.
pub fn document_commands(snapshot: &WorkspaceSnapshot, document: &DocumentId) -> Vec<Command> {
    let Some(document) = snapshot.document(document.as_str()) else {
        return vec![];
    };

    document
        .sections()
        .iter()
        .flat_map(|section| {
            section
                .elements()
                .iter()
                .flat_map(move |element| element_commands(section, element))
        })
        .collect()
}

pub fn element_commands(section: &Section, element: &Element) -> Vec<Command> {
    let Some(producer) = section
        .handler()
        .and_then(|handler| handler.command_producer())
    else {
        return vec![];
    };

    let mut collector = CommandCollector::new(element.path.clone(), element.location.clone());
    producer.collect_commands(section, element, &mut collector);
    collector.into_commands()
}

pub async fn execute_command(
    snapshot: &WorkspaceSnapshot,
    executor: &dyn CommandExecutor,
    invocation: CommandInvocation,
    timeout: Duration,
) -> CommandOutcome {
    let request = match execution_request(snapshot, &invocation) {
        Ok(request) => request,
        Err(reason) => {
            debug!(command = %invocation.command_id, %reason, "command not executed");
            return CommandOutcome::failed(reason);
        }
    };

    match tokio::time::timeout(timeout, executor.execute(request)).await {
        Ok(Ok(output)) => CommandOutcome::Completed(output),
        Ok(Err(err)) => {
            warn!(command = %invocation.command_id, "command failed: {err:#}");
            CommandOutcome::failed(format!("{err:#}"))
        }
        Err(_) => {
            warn!(command = %invocation.command_id, ?timeout, "command timed out");
            CommandOutcome::failed(format!(
                "'{}' timed out after {} ms",
                invocation.command_id,
                timeout.as_millis()
            ))
        }
    }
}

fn execution_request(
    snapshot: &WorkspaceSnapshot,
    invocation: &CommandInvocation,
) -> Result<ExecutionRequest, String> {
    let document = snapshot
        .document(invocation.document.as_str())
        .ok_or_else(|| format!("document '{}' is not open", invocation.document))?;

    let (section, element) = document
        .sections()
        .iter()
        .find_map(|section| {
            section
                .elements()
                .iter()
                .find(|element| element.path == invocation.entity_id)
                .map(|element| (section, element))
        })
        .ok_or_else(|| format!("no element '{}' in {}", invocation.entity_id, document.id()))?;

    let command = element_commands(section, element)
        .into_iter()
        .find(|command| command.id == invocation.command_id)
        .ok_or_else(|| {
            format!(
                "'{}' has no command '{}'",
                invocation.entity_id, invocation.command_id
            )
        })?;

    if command.kind == CommandKind::Client {
        return Err(format!("'{}' runs on the client", command.id));
    }

    let mut arguments = command.arguments;
    arguments.extend(invocation.arguments.clone());

    section
        .handler()
        .and_then(|handler| handler.command_producer())
        .and_then(|producer| producer.execution_request(element, &command.id, &arguments))
        .ok_or_else(|| format!("'{}' cannot be executed", command.id))
}
