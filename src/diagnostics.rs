//! Problems reported against a document.
//!
//! Handlers report [`RawDiagnostic`]s with section-relative byte spans. Before
//! a diagnostic leaves the core it is translated into a [`Diagnostic`] with a
//! document [`Location`]. A raw diagnostic without a span is a handler bug:
//! translation fails with [`DiagnosticError::MissingLocation`] instead of
//! dropping it.
//!
//! On top of what handlers report, the core adds compiler diagnostics for
//! duplicate element paths and, when enabled, for pointers that resolve to
//! nothing.

use std::ops::Range;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::{
    location::{DocumentId, Location},
    references::section_slots,
    workspace::{Document, Section, WorkspaceSnapshot},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Severity {
    Error,
    Warning,
    Information,
    Hint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Phase {
    /// Splitting the document into sections.
    Partition,
    Parser,
    Compiler,
}

/// A problem as reported by a dialect handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDiagnostic {
    /// Byte span relative to the section content.
    pub span: Option<Range<usize>>,
    pub message: String,
    pub severity: Severity,
    pub phase: Phase,
}

impl RawDiagnostic {
    pub fn parser_error(span: Range<usize>, message: impl Into<String>) -> RawDiagnostic {
        RawDiagnostic {
            span: Some(span),
            message: message.into(),
            severity: Severity::Error,
            phase: Phase::Parser,
        }
    }

    pub fn parser_warning(span: Range<usize>, message: impl Into<String>) -> RawDiagnostic {
        RawDiagnostic {
            span: Some(span),
            message: message.into(),
            severity: Severity::Warning,
            phase: Phase::Parser,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub location: Location,
    pub message: String,
    pub severity: Severity,
    pub phase: Phase,
}

impl Diagnostic {
    pub fn new(
        location: Location,
        message: impl Into<String>,
        severity: Severity,
        phase: Phase,
    ) -> Diagnostic {
        Diagnostic {
            location,
            message: message.into(),
            severity,
            phase,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiagnosticError {
    #[error("dialect '{dialect}' reported a diagnostic without a location: {message}")]
    MissingLocation { dialect: String, message: String },
}

/// Translates a handler diagnostic of `section` into document coordinates.
pub fn translate(
    document: &Document,
    section: &Section,
    raw: &RawDiagnostic,
) -> Result<Diagnostic, DiagnosticError> {
    let span = raw
        .span
        .as_ref()
        .ok_or_else(|| DiagnosticError::MissingLocation {
            dialect: section.dialect().to_string(),
            message: raw.message.clone(),
        })?;

    let base = section.content_span().start;
    let interval = document
        .text_index()
        .interval(base + span.start..base + span.end);

    Ok(Diagnostic::new(
        Location::new(document.id().clone(), interval),
        raw.message.clone(),
        raw.severity,
        raw.phase,
    ))
}

/// Every diagnostic of one document, in section order: partition problems
/// first, then per section the parser problems followed by compiler
/// problems. Unknown documents have no diagnostics.
pub fn document_diagnostics(
    snapshot: &WorkspaceSnapshot,
    document: &DocumentId,
) -> Result<Vec<Diagnostic>, DiagnosticError> {
    let Some(document) = snapshot.document(document.as_str()) else {
        return Ok(vec![]);
    };

    let mut diagnostics = document.partition_diagnostics().to_vec();

    for section in document.sections() {
        for raw in section.raw_diagnostics() {
            diagnostics.push(translate(document, section, raw)?);
        }

        diagnostics.extend(duplicate_diagnostics(snapshot, section));

        if snapshot.settings().unresolved_diagnostics {
            diagnostics.extend(unresolved_diagnostics(snapshot, section));
        }
    }

    debug!(
        document = %document.id(),
        count = diagnostics.len(),
        "computed diagnostics"
    );
    Ok(diagnostics)
}

fn duplicate_diagnostics<'a>(
    snapshot: &'a WorkspaceSnapshot,
    section: &'a Section,
) -> impl Iterator<Item = Diagnostic> + 'a {
    section.elements().iter().filter_map(move |element| {
        let first = snapshot.first_definition(element.kind, &element.path)?;
        (first.location != element.location).then(|| {
            Diagnostic::new(
                element.name_location.clone(),
                format!(
                    "Duplicated element '{}'; first defined at {}",
                    element.path,
                    first.location.compact()
                ),
                Severity::Error,
                Phase::Compiler,
            )
        })
    })
}

fn unresolved_diagnostics<'a>(
    snapshot: &'a WorkspaceSnapshot,
    section: &'a Section,
) -> impl Iterator<Item = Diagnostic> + 'a {
    section_slots(snapshot, section)
        .flatten()
        .filter_map(move |reference| {
            let location = reference.location().clone();
            let target = reference.target().to_string();

            reference.resolve(snapshot).is_none().then(|| {
                Diagnostic::new(
                    location,
                    format!("Can't find {target}"),
                    Severity::Warning,
                    Phase::Compiler,
                )
            })
        })
}
