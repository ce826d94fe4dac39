//! Position-sensitive completions.
//!
//! Completers are tried in order and the first one that applies answers:
//! dialect markers, section boilerplate, element paths, then keywords of the
//! section's dialect.

use serde::Serialize;

use crate::{
    config::Settings,
    element::ElementKind,
    location::{DocumentId, Position},
    workspace::{Document, Section, WorkspaceSnapshot},
};

use self::{
    boilerplate_completer::BoilerplateCompleter, keyword_completer::KeywordCompleter,
    marker_completer::MarkerCompleter, path_completer::PathCompleter,
};

mod boilerplate_completer;
mod keyword_completer;
mod marker_completer;
mod path_completer;
mod util;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CompletionKind {
    Keyword,
    Snippet,
    Dialect,
    Element(ElementKind),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Completion {
    pub label: String,
    pub insert_text: String,
    pub kind: CompletionKind,
    pub detail: Option<String>,
}

impl Completion {
    pub fn keyword(keyword: &str) -> Completion {
        Completion {
            label: keyword.to_string(),
            insert_text: keyword.to_string(),
            kind: CompletionKind::Keyword,
            detail: None,
        }
    }

    /// `insert_text` uses the `${1:placeholder}` snippet syntax.
    pub fn snippet(label: &str, insert_text: &str, detail: &str) -> Completion {
        Completion {
            label: label.to_string(),
            insert_text: insert_text.to_string(),
            kind: CompletionKind::Snippet,
            detail: Some(detail.to_string()),
        }
    }
}

/// Optional completion capability of a dialect.
pub trait CompletionProducer: Send + Sync {
    /// Offered when nothing but whitespace precedes the cursor in the section.
    fn boilerplate(&self) -> Vec<Completion>;

    /// Kinds of element a path typed after `line_prefix` may point at, when
    /// the text before the path expects one.
    fn path_trigger(&self, line_prefix: &str) -> Option<&'static [ElementKind]>;
}

#[derive(Clone, Copy)]
pub struct Context<'a> {
    snapshot: &'a WorkspaceSnapshot,
    document: &'a Document,
    section: &'a Section,
    /// Byte offset of the cursor in the document.
    offset: usize,
    /// The current line up to the cursor.
    line_prefix: &'a str,
    settings: &'a Settings,
}

pub trait Completer<'a>: Sized {
    fn construct(context: Context<'a>) -> Option<Self>;

    fn completions(&self) -> Vec<Completion>;
}

pub fn get_completions(
    snapshot: &WorkspaceSnapshot,
    document: &DocumentId,
    position: Position,
) -> Vec<Completion> {
    let Some(context) = context(snapshot, document, position) else {
        return vec![];
    };

    run_completer::<MarkerCompleter>(context)
        .or_else(|| run_completer::<BoilerplateCompleter>(context))
        .or_else(|| run_completer::<PathCompleter>(context))
        .or_else(|| run_completer::<KeywordCompleter>(context))
        .unwrap_or_default()
}

fn context<'a>(
    snapshot: &'a WorkspaceSnapshot,
    document: &DocumentId,
    position: Position,
) -> Option<Context<'a>> {
    let (document, section) = snapshot.section_at(document, position)?;
    let index = document.text_index();
    let offset = index.byte_offset(position)?;
    let line_start = index.byte_offset(Position::new(position.line, 0))?;

    Some(Context {
        snapshot,
        document,
        section,
        offset,
        line_prefix: &document.text()[line_start..offset],
        settings: snapshot.settings(),
    })
}

fn run_completer<'a, T: Completer<'a>>(context: Context<'a>) -> Option<Vec<Completion>> {
    let completer = T::construct(context)?;

    Some(
        completer
            .completions()
            .into_iter()
            .take(context.settings.completion_limit)
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::test_utils::{snapshot_with, snapshot_with_settings};

    fn labels(completions: &[Completion]) -> Vec<&str> {
        completions.iter().map(|c| c.label.as_str()).collect()
    }

    #[test]
    fn boilerplate_at_section_start() {
        let text = "###Mapping\n  \n";
        let snapshot = snapshot_with(&[("file:///a.pure", text)]);

        let completions =
            get_completions(&snapshot, &"file:///a.pure".into(), Position::new(1, 2));

        assert!(!completions.is_empty());
        assert!(completions
            .iter()
            .all(|c| c.kind == CompletionKind::Snippet));
        assert!(completions[0].insert_text.starts_with("Mapping "));
    }

    #[test]
    fn keywords_after_content_match_prefix_case_sensitively() {
        let text = "Class a::A {}\nCl";
        let snapshot = snapshot_with(&[("file:///a.pure", text)]);

        let completions =
            get_completions(&snapshot, &"file:///a.pure".into(), Position::new(1, 2));

        assert_eq!(labels(&completions), vec!["Class"]);

        let lower = "Class a::A {}\ncl";
        let snapshot = snapshot_with(&[("file:///a.pure", lower)]);
        let completions =
            get_completions(&snapshot, &"file:///a.pure".into(), Position::new(1, 2));
        assert!(completions.is_empty());
    }

    #[test]
    fn keywords_keep_declaration_order() {
        let text = "Class a::A {}\n";
        let snapshot = snapshot_with(&[("file:///a.pure", text)]);

        let completions =
            get_completions(&snapshot, &"file:///a.pure".into(), Position::new(1, 0));

        assert_eq!(
            labels(&completions),
            vec!["Class", "Enum", "Profile", "function", "extends"]
        );
    }

    #[test]
    fn boilerplate_can_be_disabled() {
        let settings = Settings {
            boilerplate_completions: false,
            ..Settings::default()
        };
        let snapshot = snapshot_with_settings(settings, &[("file:///a.pure", "")]);

        let completions =
            get_completions(&snapshot, &"file:///a.pure".into(), Position::new(0, 0));

        assert!(completions.iter().all(|c| c.kind == CompletionKind::Keyword));
        assert_eq!(completions[0].label, "Class");
    }

    #[test]
    fn dialect_names_after_marker() {
        let text = "Class a::A {}\n###Ma";
        let snapshot = snapshot_with(&[("file:///a.pure", text)]);

        let completions =
            get_completions(&snapshot, &"file:///a.pure".into(), Position::new(1, 5));

        assert_eq!(labels(&completions), vec!["Mapping"]);
        assert_eq!(completions[0].kind, CompletionKind::Dialect);
    }

    #[test]
    fn paths_after_trigger_offer_declared_elements() {
        let model = "Class test::Person {}\nEnum test::Kind { A }\nProfile test::Doc {}";
        let text = "###Connection\nJsonModelConnection a::c\n{\n  class: te";
        let snapshot = snapshot_with(&[("file:///m.pure", model), ("file:///c.pure", text)]);

        let completions =
            get_completions(&snapshot, &"file:///c.pure".into(), Position::new(3, 11));

        assert_eq!(labels(&completions), vec!["test::Person"]);
        assert_eq!(
            completions[0].kind,
            CompletionKind::Element(ElementKind::Class)
        );
    }

    #[test]
    fn completion_limit_caps_results() {
        let settings = Settings {
            completion_limit: 2,
            boilerplate_completions: false,
            ..Settings::default()
        };
        let snapshot = snapshot_with_settings(settings, &[("file:///a.pure", "")]);

        let completions =
            get_completions(&snapshot, &"file:///a.pure".into(), Position::new(0, 0));

        assert_eq!(completions.len(), 2);
    }

    #[test]
    fn unknown_dialect_offers_nothing() {
        let text = "###Nope\nx";
        let snapshot = snapshot_with(&[("file:///a.pure", text)]);

        let completions =
            get_completions(&snapshot, &"file:///a.pure".into(), Position::new(1, 1));

        assert!(completions.is_empty());
    }
}
