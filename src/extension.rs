//! Handler families and the contract between the core and a dialect.
//!
//! Two families share the [`ExtensionRegistry`] shape, each with its own name
//! space:
//!
//! - [`DialectExtension`]: owns a section kind (`###Mapping`, `###Runtime`,
//!   ...). It parses the section text into [`Element`]s and may implement the
//!   optional capabilities (references, completions, commands, connection
//!   references).
//! - [`InlineDialectExtension`]: owns an island embedded in another dialect's
//!   text (`#{ ... }#`, `#>{ ... }#`).
//!
//! The core never parses text. It hands each handler a [`SectionSource`],
//! which maps section-relative byte spans to document [`Location`]s.

use std::ops::Range;

use crate::{
    commands::CommandProducer,
    completion::CompletionProducer,
    diagnostics::RawDiagnostic,
    element::{Element, IslandValue},
    location::{DocumentId, Location, TextIndex},
    references::{ConnectionReferenceProducer, ReferenceProducer, ReferenceSlots},
    registry::{Capability, Extension, ExtensionRegistry, PluginSource, RegistryError},
};

pub trait DialectExtension: Extension {
    /// Keywords of the dialect, in the order completions offer them.
    fn keywords(&self) -> &'static [&'static str];

    fn parse(&self, source: &SectionSource<'_>) -> ParseOutput;

    fn reference_producer(&self) -> Option<&(dyn ReferenceProducer + 'static)> {
        None
    }

    fn completion_producer(&self) -> Option<&(dyn CompletionProducer + 'static)> {
        None
    }

    fn command_producer(&self) -> Option<&(dyn CommandProducer + 'static)> {
        None
    }

    fn connection_producer(&self) -> Option<&(dyn ConnectionReferenceProducer + 'static)> {
        None
    }
}

pub trait InlineDialectExtension: Extension {
    /// The text between `#` and `{` that opens an island of this dialect.
    fn island_tag(&self) -> &str;

    /// Parses the island content; `content` is a section-relative byte span.
    fn parse_island(
        &self,
        source: &SectionSource<'_>,
        content: Range<usize>,
    ) -> Result<IslandValue, RawDiagnostic>;

    /// References of an island value. Values owned by another inline dialect
    /// produce no slots.
    fn references<'a>(&'a self, value: &'a IslandValue) -> ReferenceSlots<'a>;
}

impl Capability<dyn DialectExtension> for dyn ReferenceProducer {
    fn project(extension: &dyn DialectExtension) -> Option<&Self> {
        extension.reference_producer()
    }
}

impl Capability<dyn DialectExtension> for dyn CompletionProducer {
    fn project(extension: &dyn DialectExtension) -> Option<&Self> {
        extension.completion_producer()
    }
}

impl Capability<dyn DialectExtension> for dyn CommandProducer {
    fn project(extension: &dyn DialectExtension) -> Option<&Self> {
        extension.command_producer()
    }
}

impl Capability<dyn DialectExtension> for dyn ConnectionReferenceProducer {
    fn project(extension: &dyn DialectExtension) -> Option<&Self> {
        extension.connection_producer()
    }
}

/// What a dialect hands back for one section.
#[derive(Debug, Default)]
pub struct ParseOutput {
    pub elements: Vec<Element>,
    pub diagnostics: Vec<RawDiagnostic>,
}

/// The text of one section as seen by its handler.
#[derive(Clone, Copy)]
pub struct SectionSource<'a> {
    document: &'a DocumentId,
    text: &'a str,
    base: usize,
    index: &'a TextIndex,
    inline: &'a ExtensionRegistry<dyn InlineDialectExtension>,
}

impl<'a> SectionSource<'a> {
    /// `text` is the section content and `base` its byte offset in the
    /// document `index` was built from.
    pub fn new(
        document: &'a DocumentId,
        text: &'a str,
        base: usize,
        index: &'a TextIndex,
        inline: &'a ExtensionRegistry<dyn InlineDialectExtension>,
    ) -> SectionSource<'a> {
        SectionSource {
            document,
            text,
            base,
            index,
            inline,
        }
    }

    pub fn document(&self) -> &'a DocumentId {
        self.document
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    /// Document location of a section-relative byte span.
    pub fn location(&self, span: Range<usize>) -> Location {
        let interval = self
            .index
            .interval(self.base + span.start..self.base + span.end);
        Location::new(self.document.clone(), interval)
    }

    pub fn inline_dialects(&self) -> &'a ExtensionRegistry<dyn InlineDialectExtension> {
        self.inline
    }

    pub fn inline_dialect(&self, tag: &str) -> Option<&'a dyn InlineDialectExtension> {
        self.inline
            .all()
            .iter()
            .find(|extension| extension.island_tag() == tag)
            .map(|extension| extension.as_ref())
    }
}

/// Both handler registries. Built once at startup and shared read-only.
#[derive(Default)]
pub struct Extensions {
    pub dialects: ExtensionRegistry<dyn DialectExtension>,
    pub inline: ExtensionRegistry<dyn InlineDialectExtension>,
}

impl Extensions {
    pub fn new() -> Extensions {
        Extensions::default()
    }

    pub fn discover(
        dialects: &impl PluginSource<dyn DialectExtension>,
        inline: &impl PluginSource<dyn InlineDialectExtension>,
    ) -> Result<Extensions, RegistryError> {
        let mut extensions = Extensions::new();
        extensions.dialects.discover(dialects)?;
        extensions.inline.discover(inline)?;
        Ok(extensions)
    }
}
