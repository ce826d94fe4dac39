use std::{fmt, ops::Range, sync::Arc};

use tracing::debug;

use super::partition::{partition, preamble, SectionSpan};
use crate::{
    diagnostics::{Diagnostic, Phase, RawDiagnostic, Severity},
    element::{Declaration, Element},
    extension::{DialectExtension, Extensions, SectionSource},
    location::{DocumentId, Interval, Location, Position, TextIndex},
    registry::Extension,
};

/// One text of the workspace, split into sections and parsed. Immutable:
/// an edit builds a new document.
#[derive(Debug)]
pub struct Document {
    id: DocumentId,
    text: String,
    text_index: TextIndex,
    sections: Vec<Section>,
    partition_diagnostics: Vec<Diagnostic>,
}

impl Document {
    pub fn build(
        id: DocumentId,
        text: impl Into<String>,
        extensions: &Extensions,
        default_dialect: &str,
    ) -> Document {
        let text = text.into();
        let text_index = TextIndex::new(&text);
        let spans = partition(&text, default_dialect);

        let mut partition_diagnostics = Vec::new();
        if let Some((range, preamble)) = preamble(&text, &spans) {
            if !preamble.trim().is_empty() {
                partition_diagnostics.push(Diagnostic::new(
                    Location::new(id.clone(), text_index.interval(range)),
                    "Text before the first section marker is ignored",
                    Severity::Warning,
                    Phase::Partition,
                ));
            }
        }

        let sections = spans
            .into_iter()
            .enumerate()
            .map(|(index, span)| {
                let handler = extensions.dialects.get(&span.dialect).cloned();

                if handler.is_none() {
                    let header = span.header.clone().unwrap_or(span.span.clone());
                    partition_diagnostics.push(Diagnostic::new(
                        Location::new(id.clone(), text_index.interval(header)),
                        format!("Unknown dialect '{}'", span.dialect),
                        Severity::Warning,
                        Phase::Partition,
                    ));
                }

                Section::build(&id, &text, &text_index, index, span, handler, extensions)
            })
            .collect::<Vec<_>>();

        debug!(document = %id, sections = sections.len(), "built document");

        Document {
            id,
            text,
            text_index,
            sections,
            partition_diagnostics,
        }
    }

    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn text_index(&self) -> &TextIndex {
        &self.text_index
    }

    /// In document order; never empty.
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// The section owning `position`. A marker line belongs to the section
    /// it opens; positions past the end of the text belong to the last
    /// section.
    pub fn section_at(&self, position: Position) -> Option<&Section> {
        let after = self
            .sections
            .partition_point(|section| section.interval.start() <= position);
        after.checked_sub(1).map(|index| &self.sections[index])
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.sections.iter().flat_map(|section| section.elements())
    }

    pub fn partition_diagnostics(&self) -> &[Diagnostic] {
        &self.partition_diagnostics
    }
}

pub struct Section {
    index: usize,
    dialect: String,
    interval: Interval,
    location: Location,
    header: Option<Range<usize>>,
    span: Range<usize>,
    content: Range<usize>,
    handler: Option<Arc<dyn DialectExtension>>,
    elements: Vec<Element>,
    raw_diagnostics: Vec<RawDiagnostic>,
}

impl Section {
    fn build(
        document: &DocumentId,
        text: &str,
        text_index: &TextIndex,
        index: usize,
        span: SectionSpan,
        handler: Option<Arc<dyn DialectExtension>>,
        extensions: &Extensions,
    ) -> Section {
        let interval = text_index.interval(span.span.clone());

        let output = handler.as_ref().map(|handler| {
            let source = SectionSource::new(
                document,
                &text[span.content.clone()],
                span.content.start,
                text_index,
                &extensions.inline,
            );
            handler.parse(&source)
        });
        let (elements, raw_diagnostics) = output
            .map(|output| (output.elements, output.diagnostics))
            .unwrap_or_default();

        Section {
            index,
            dialect: span.dialect,
            interval,
            location: Location::new(document.clone(), interval),
            header: span.header,
            span: span.span,
            content: span.content,
            handler,
            elements,
            raw_diagnostics,
        }
    }

    /// Position among the sections of its document.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn dialect(&self) -> &str {
        &self.dialect
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn header(&self) -> Option<Range<usize>> {
        self.header.clone()
    }

    pub fn span(&self) -> Range<usize> {
        self.span.clone()
    }

    pub fn content_span(&self) -> Range<usize> {
        self.content.clone()
    }

    /// `None` for a dialect nobody registered.
    pub fn handler(&self) -> Option<&dyn DialectExtension> {
        self.handler.as_deref()
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn raw_diagnostics(&self) -> &[RawDiagnostic] {
        &self.raw_diagnostics
    }

    pub fn declarations(&self) -> impl Iterator<Item = Declaration> + '_ {
        self.elements.iter().map(Element::declaration)
    }
}

impl fmt::Debug for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Section")
            .field("index", &self.index)
            .field("dialect", &self.dialect)
            .field("interval", &self.interval)
            .field("handler", &self.handler.as_ref().map(|handler| handler.name()))
            .field("elements", &self.elements.len())
            .finish_non_exhaustive()
    }
}

impl crate::location::Located for Section {
    fn location(&self) -> &Location {
        &self.location
    }
}
