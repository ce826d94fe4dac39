//! Shared test helpers. Only compiled for tests.

use std::sync::Arc;

use crate::{
    commands::UnavailableExecutor,
    config::Settings,
    dialects::builtin_extensions,
    location::Position,
    workspace::{GlobalState, WorkspaceSnapshot},
};

/// A snapshot with the built-in dialects and the given `(id, text)`
/// documents.
pub fn snapshot_with(documents: &[(&str, &str)]) -> WorkspaceSnapshot {
    snapshot_with_settings(Settings::default(), documents)
}

pub fn snapshot_with_settings(settings: Settings, documents: &[(&str, &str)]) -> WorkspaceSnapshot {
    let extensions = builtin_extensions(&settings).expect("built-in dialects register");
    let empty = WorkspaceSnapshot::new(Arc::new(extensions), Arc::new(settings));

    documents
        .iter()
        .fold(empty, |snapshot, (id, text)| {
            snapshot.with_document((*id).into(), *text)
        })
}

/// A state with the built-in dialects, no documents and no execution
/// backend.
pub fn state() -> GlobalState {
    let settings = Settings::default();
    let extensions = builtin_extensions(&settings).expect("built-in dialects register");
    GlobalState::new(extensions, settings, Arc::new(UnavailableExecutor))
}

/// Position of the first occurrence of `needle` in `text`.
///
/// Panics if `needle` does not occur.
pub fn position_of(text: &str, needle: &str) -> Position {
    let offset = text
        .find(needle)
        .unwrap_or_else(|| panic!("'{needle}' not found"));
    let before = &text[..offset];
    let line = before.matches('\n').count();
    let column = before
        .rsplit('\n')
        .next()
        .map_or(0, |line| line.chars().count());
    Position::new(line as u32, column as u32)
}
