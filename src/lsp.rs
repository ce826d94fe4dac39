//! Conversions between the core value types and [`tower_lsp::lsp_types`].
//!
//! Core columns count characters and intervals are closed; the protocol
//! counts UTF-16 code units and ranges exclude their end. [`Converter`] does
//! both translations against the text of a snapshot.

use serde_json::json;
use tower_lsp::lsp_types::{
    self, CodeLens, CompletionItem, CompletionItemKind, DiagnosticSeverity, DocumentSymbol,
    HoverContents, InsertTextFormat, MarkupContent, MarkupKind, NumberOrString,
    SymbolInformation, Url,
};

use crate::{
    commands::{Command, CommandInvocation, CommandKind},
    completion::{Completion, CompletionKind},
    diagnostics::{Diagnostic, Phase, Severity},
    element::ElementKind,
    hover::Hover,
    location::{DocumentId, Interval, Location, Position},
    symbol::{Symbol, SymbolKind},
    workspace::WorkspaceSnapshot,
};

pub const SOURCE: &str = "dialect-lsp";

pub fn document_id(uri: &Url) -> DocumentId {
    DocumentId::new(uri.as_str())
}

pub fn uri(document: &DocumentId) -> Option<Url> {
    Url::parse(document.as_str()).ok()
}

/// Translates positions with the text of the documents in `snapshot`.
/// Positions in documents the snapshot does not hold pass through with
/// their columns unchanged.
#[derive(Clone, Copy)]
pub struct Converter<'a> {
    snapshot: &'a WorkspaceSnapshot,
}

impl<'a> Converter<'a> {
    pub fn new(snapshot: &'a WorkspaceSnapshot) -> Converter<'a> {
        Converter { snapshot }
    }

    pub fn position(&self, document: &DocumentId, position: lsp_types::Position) -> Position {
        let position = Position::new(position.line, position.character);
        match self.snapshot.document(document.as_str()) {
            Some(document) => document.text_index().position_from_utf16(position),
            None => position,
        }
    }

    pub fn lsp_position(&self, document: &DocumentId, position: Position) -> lsp_types::Position {
        let position = match self.snapshot.document(document.as_str()) {
            Some(document) => document.text_index().utf16_position(position),
            None => position,
        };
        lsp_types::Position::new(position.line, position.column)
    }

    pub fn range(&self, document: &DocumentId, interval: Interval) -> lsp_types::Range {
        let end = interval.end();
        lsp_types::Range::new(
            self.lsp_position(document, interval.start()),
            self.lsp_position(document, Position::new(end.line, end.column + 1)),
        )
    }

    pub fn location(&self, location: &Location) -> Option<lsp_types::Location> {
        Some(lsp_types::Location::new(
            uri(&location.document)?,
            self.range(&location.document, location.interval),
        ))
    }

    pub fn diagnostic(&self, diagnostic: &Diagnostic) -> lsp_types::Diagnostic {
        lsp_types::Diagnostic {
            range: self.range(&diagnostic.location.document, diagnostic.location.interval),
            severity: Some(severity(diagnostic.severity)),
            code: Some(NumberOrString::String(phase(diagnostic.phase).to_string())),
            source: Some(SOURCE.to_string()),
            message: diagnostic.message.clone(),
            ..Default::default()
        }
    }

    pub fn hover(&self, hover: Hover) -> lsp_types::Hover {
        lsp_types::Hover {
            contents: HoverContents::Markup(MarkupContent {
                kind: MarkupKind::Markdown,
                value: hover.markdown,
            }),
            range: Some(self.range(&hover.location.document, hover.location.interval)),
        }
    }

    #[allow(deprecated)]
    pub fn document_symbol(&self, symbol: Symbol) -> DocumentSymbol {
        let document = symbol.location.document.clone();
        DocumentSymbol {
            name: symbol.name,
            detail: symbol.detail,
            kind: symbol_kind(symbol.kind),
            tags: None,
            deprecated: None,
            range: self.range(&document, symbol.location.interval),
            selection_range: self.range(&document, symbol.selection.interval),
            children: (!symbol.children.is_empty()).then(|| {
                symbol
                    .children
                    .into_iter()
                    .map(|child| self.document_symbol(child))
                    .collect()
            }),
        }
    }

    #[allow(deprecated)]
    pub fn symbol_information(&self, symbol: Symbol) -> Option<SymbolInformation> {
        Some(SymbolInformation {
            location: self.location(&symbol.location)?,
            name: symbol.name,
            kind: symbol_kind(symbol.kind),
            tags: None,
            deprecated: None,
            container_name: symbol.detail,
        })
    }

    /// Only server commands become lenses; client commands are handled by
    /// the editor and carry no server-side meaning.
    pub fn code_lens(&self, command: Command) -> Option<CodeLens> {
        if command.kind == CommandKind::Client {
            return None;
        }

        let invocation = CommandInvocation {
            document: command.location.document.clone(),
            entity_id: command.entity_id,
            command_id: command.id.clone(),
            arguments: command.arguments,
        };

        Some(CodeLens {
            range: self.range(&command.location.document, command.location.interval),
            command: Some(lsp_types::Command {
                title: command.title,
                command: command.id,
                arguments: Some(vec![json!(invocation)]),
            }),
            data: None,
        })
    }
}

pub fn completion_item(completion: Completion) -> CompletionItem {
    let snippet = completion.kind == CompletionKind::Snippet;
    CompletionItem {
        label: completion.label,
        kind: Some(completion_kind(completion.kind)),
        detail: completion.detail,
        insert_text: Some(completion.insert_text),
        insert_text_format: snippet.then_some(InsertTextFormat::SNIPPET),
        ..Default::default()
    }
}

fn completion_kind(kind: CompletionKind) -> CompletionItemKind {
    match kind {
        CompletionKind::Keyword => CompletionItemKind::KEYWORD,
        CompletionKind::Snippet => CompletionItemKind::SNIPPET,
        CompletionKind::Dialect => CompletionItemKind::MODULE,
        CompletionKind::Element(kind) => match kind {
            ElementKind::Class => CompletionItemKind::CLASS,
            ElementKind::Enumeration => CompletionItemKind::ENUM,
            ElementKind::Function => CompletionItemKind::FUNCTION,
            ElementKind::Profile => CompletionItemKind::INTERFACE,
            ElementKind::Mapping
            | ElementKind::Connection
            | ElementKind::Runtime
            | ElementKind::Store => CompletionItemKind::REFERENCE,
        },
    }
}

fn symbol_kind(kind: SymbolKind) -> lsp_types::SymbolKind {
    match kind {
        SymbolKind::Section => lsp_types::SymbolKind::NAMESPACE,
        SymbolKind::Member => lsp_types::SymbolKind::FIELD,
        SymbolKind::Element(kind) => match kind {
            ElementKind::Class => lsp_types::SymbolKind::CLASS,
            ElementKind::Enumeration => lsp_types::SymbolKind::ENUM,
            ElementKind::Profile => lsp_types::SymbolKind::INTERFACE,
            ElementKind::Function => lsp_types::SymbolKind::FUNCTION,
            ElementKind::Mapping => lsp_types::SymbolKind::OBJECT,
            ElementKind::Connection => lsp_types::SymbolKind::PACKAGE,
            ElementKind::Runtime => lsp_types::SymbolKind::MODULE,
            ElementKind::Store => lsp_types::SymbolKind::STRUCT,
        },
    }
}

fn severity(severity: Severity) -> DiagnosticSeverity {
    match severity {
        Severity::Error => DiagnosticSeverity::ERROR,
        Severity::Warning => DiagnosticSeverity::WARNING,
        Severity::Information => DiagnosticSeverity::INFORMATION,
        Severity::Hint => DiagnosticSeverity::HINT,
    }
}

fn phase(phase: Phase) -> &'static str {
    match phase {
        Phase::Partition => "partition",
        Phase::Parser => "parser",
        Phase::Compiler => "compiler",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{commands::document_commands, diagnostics::document_diagnostics, symbol};
    use crate::test_utils::snapshot_with;

    const TEXT: &str = "###Pure\nClass {meta::Doc.doc = '𝔸'} a::A { b: a::B[1]; }\n";

    #[test]
    fn closed_interval_becomes_exclusive_utf16_range() {
        let snapshot = snapshot_with(&[("file:///a.pure", TEXT)]);
        let converter = Converter::new(&snapshot);
        let id = DocumentId::from("file:///a.pure");

        // the quoted '𝔸' covers columns 23..=25 in characters
        let interval = Interval::new(Position::new(1, 23), Position::new(1, 25)).unwrap();
        let range = converter.range(&id, interval);

        assert_eq!(range.start, lsp_types::Position::new(1, 23));
        assert_eq!(range.end, lsp_types::Position::new(1, 27));
    }

    #[test]
    fn lsp_positions_map_back_to_characters() {
        let snapshot = snapshot_with(&[("file:///a.pure", TEXT)]);
        let converter = Converter::new(&snapshot);
        let id = DocumentId::from("file:///a.pure");

        // past '𝔸' the editor counts one more unit than there are chars
        let position = converter.position(&id, lsp_types::Position::new(1, 27));

        assert_eq!(position, Position::new(1, 26));
    }

    #[test]
    fn diagnostics_carry_phase_and_severity() {
        let snapshot = snapshot_with(&[("file:///a.pure", TEXT)]);
        let diagnostics = document_diagnostics(&snapshot, &"file:///a.pure".into()).unwrap();
        let converter = Converter::new(&snapshot);

        let unresolved = converter.diagnostic(&diagnostics[0]);

        assert_eq!(unresolved.severity, Some(DiagnosticSeverity::WARNING));
        assert_eq!(
            unresolved.code,
            Some(NumberOrString::String("compiler".to_string()))
        );
        assert_eq!(unresolved.source.as_deref(), Some(SOURCE));
    }

    #[test]
    fn only_server_commands_become_lenses() {
        let text = "function a::f(): String[1] { 1 }\n";
        let snapshot = snapshot_with(&[("file:///f.pure", text)]);
        let converter = Converter::new(&snapshot);

        let lenses = document_commands(&snapshot, &"file:///f.pure".into())
            .into_iter()
            .filter_map(|command| converter.code_lens(command))
            .collect::<Vec<_>>();

        assert_eq!(lenses.len(), 1);
        let command = lenses[0].command.as_ref().unwrap();
        assert_eq!(command.command, "function.execute");
        let invocation: CommandInvocation =
            serde_json::from_value(command.arguments.as_ref().unwrap()[0].clone()).unwrap();
        assert_eq!(invocation.entity_id, "a::f");
        assert_eq!(invocation.document.as_str(), "file:///f.pure");
    }

    #[test]
    fn outline_keeps_nesting() {
        let snapshot = snapshot_with(&[("file:///a.pure", TEXT)]);
        let converter = Converter::new(&snapshot);

        let outline = symbol::document_symbols(&snapshot, &"file:///a.pure".into())
            .into_iter()
            .map(|symbol| converter.document_symbol(symbol))
            .collect::<Vec<_>>();

        assert_eq!(outline[0].kind, lsp_types::SymbolKind::NAMESPACE);
        let class = &outline[0].children.as_ref().unwrap()[0];
        assert_eq!(class.kind, lsp_types::SymbolKind::CLASS);
        assert_eq!(class.children.as_ref().unwrap()[0].name, "b");
    }

    #[test]
    fn snippets_are_marked() {
        let item = completion_item(Completion::snippet("Class", "Class ${1:name}", "class"));

        assert_eq!(item.insert_text_format, Some(InsertTextFormat::SNIPPET));
        assert_eq!(item.kind, Some(CompletionItemKind::SNIPPET));
        assert_eq!(
            completion_item(Completion::keyword("extends")).insert_text_format,
            None
        );
    }
}
