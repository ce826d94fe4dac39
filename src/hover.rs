//! Hover over element pointers.
//!
//! Hover can be disabled via [`Settings::hover`](crate::config::Settings::hover):
//!
//! ```toml
//! hover = false
//! ```

use serde::Serialize;

use crate::{
    location::{DocumentId, Location, Position},
    references::goto_definition,
    workspace::WorkspaceSnapshot,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hover {
    pub markdown: String,
    /// The part of the pointer to highlight.
    pub location: Location,
}

/// Classifier, path and declaration of the element a pointer under the
/// cursor resolves to.
///
/// `None` when hover is disabled, the cursor is not on a pointer, or the
/// pointer resolves to nothing.
pub fn hover(snapshot: &WorkspaceSnapshot, document: &DocumentId, position: Position) -> Option<Hover> {
    if !snapshot.settings().hover {
        return None;
    }

    let reference = goto_definition(snapshot, document, position)?;
    let element = snapshot.element_declared_at(reference.declaration())?;

    let mut markdown = format!("```\n{} {}\n```", element.kind.classifier(), element.path);
    if let Some(first) = element.stereotypes.first() {
        markdown.push_str(&format!("\n\n`<<{}.{}>>`", first.profile.path, first.value));
    }
    markdown.push_str(&format!("\n\nDefined at `{}`", reference.declaration().compact()));

    Some(Hover {
        markdown,
        location: reference
            .core_location()
            .unwrap_or(reference.location())
            .clone(),
    })
}
