use std::sync::Arc;

use proptest::prelude::*;

use super::*;
use crate::{
    commands::CommandOutcome,
    element::ElementKind,
    dialects::{BuiltinInlineDialects, PureDialect},
    location::{Position, TextIndex},
    registry::PluginList,
    test_utils::{snapshot_with, state},
};

const DIALECTS: &[&str] = &["Pure", "Mapping", "Runtime", "Connection", "Nope"];

fn document_strategy() -> impl Strategy<Value = (Vec<(usize, Vec<String>)>, &'static str)> {
    let section = (0..DIALECTS.len(), prop::collection::vec("[a-z :;{}]{0,12}", 0..4));
    (
        prop::collection::vec(section, 1..6),
        prop::sample::select(vec!["\n", "\r\n", "\r"]),
    )
}

fn render(sections: &[(usize, Vec<String>)], eol: &str) -> String {
    sections
        .iter()
        .map(|(dialect, body)| {
            let mut text = format!("###{}{eol}", DIALECTS[*dialect]);
            for line in body {
                text.push_str(line);
                text.push_str(eol);
            }
            text
        })
        .collect()
}

proptest! {
    #[test]
    fn one_section_per_marker_in_order((sections, eol) in document_strategy()) {
        let text = render(&sections, eol);

        let spans = partition(&text, "Pure");

        prop_assert_eq!(spans.len(), sections.len());
        for (span, (dialect, _)) in spans.iter().zip(&sections) {
            prop_assert_eq!(span.dialect.as_str(), DIALECTS[*dialect]);
        }
    }

    #[test]
    fn spans_are_contiguous_and_cover_the_text((sections, eol) in document_strategy()) {
        let text = render(&sections, eol);

        let spans = partition(&text, "Pure");

        prop_assert_eq!(spans[0].span.start, 0);
        prop_assert_eq!(spans[spans.len() - 1].span.end, text.len());
        for pair in spans.windows(2) {
            prop_assert_eq!(pair[0].span.end, pair[1].span.start);
        }
        for span in &spans {
            prop_assert!(span.span.start <= span.content.start);
            prop_assert!(span.content.end <= span.span.end);
        }
    }

    #[test]
    fn every_position_maps_to_the_section_containing_it((sections, eol) in document_strategy()) {
        let text = render(&sections, eol);
        let snapshot = snapshot_with(&[("file:///p.pure", &text)]);
        let document = snapshot.document("file:///p.pure").unwrap();
        let index = TextIndex::new(&text);

        for (i, span) in partition(&text, "Pure").iter().enumerate() {
            let header = index.position(span.span.start);
            prop_assert_eq!(document.section_at(header).map(Section::index), Some(i));

            if !span.content.is_empty() {
                let last = index.position(span.content.end - 1);
                prop_assert_eq!(document.section_at(last).map(Section::index), Some(i));
            }
        }
    }

    #[test]
    fn editing_one_section_leaves_the_others_alone(
        (sections, eol) in document_strategy(),
        edited in any::<prop::sample::Index>(),
        body in prop::collection::vec("[a-z ]{0,12}", 0..4),
    ) {
        let before = render(&sections, eol);
        let k = edited.index(sections.len());
        let mut changed = sections.clone();
        changed[k].1 = body;
        let after = render(&changed, eol);

        let old = partition(&before, "Pure");
        let new = partition(&after, "Pure");

        prop_assert_eq!(old.len(), new.len());
        for (i, (a, b)) in old.iter().zip(&new).enumerate() {
            prop_assert_eq!(&a.dialect, &b.dialect);
            if i != k {
                prop_assert_eq!(&before[a.content.clone()], &after[b.content.clone()]);
            }
        }
    }
}

#[test]
fn unknown_dialect_keeps_its_section_without_handler() {
    let text = "###Pure\nClass a::A {}\n###Sql\nselect 1\n";
    let snapshot = snapshot_with(&[("file:///a.pure", text)]);
    let document = snapshot.document("file:///a.pure").unwrap();

    assert_eq!(document.sections().len(), 2);
    assert!(document.sections()[1].handler().is_none());
    assert!(document.sections()[1].elements().is_empty());

    let diagnostics = document.partition_diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].message, "Unknown dialect 'Sql'");
    assert_eq!(diagnostics[0].location.interval.start(), Position::new(2, 0));
}

#[test]
fn non_blank_preamble_is_reported() {
    let text = "stray\n###Pure\nClass a::A {}\n";
    let snapshot = snapshot_with(&[("file:///a.pure", text), ("file:///b.pure", "\n\n###Pure\n")]);

    let a = snapshot.document("file:///a.pure").unwrap();
    assert_eq!(
        a.partition_diagnostics()[0].message,
        "Text before the first section marker is ignored"
    );
    assert_eq!(a.section_at(Position::new(0, 2)).map(Section::index), Some(0));
    assert_eq!(a.elements().count(), 1);

    let b = snapshot.document("file:///b.pure").unwrap();
    assert!(b.partition_diagnostics().is_empty());
}

#[test]
fn unicode_separators_do_not_shift_sections() {
    let text = "###Pure\n// a\u{2028}b\u{0C}c\u{85}\nClass a::A {}\n###Mapping\nMapping a::m\n(\n)\n";
    let snapshot = snapshot_with(&[("file:///a.pure", text)]);
    let document = snapshot.document("file:///a.pure").unwrap();

    assert_eq!(
        document.section_at(Position::new(2, 0)).map(Section::dialect),
        Some("Pure")
    );
    assert_eq!(
        document.section_at(Position::new(3, 0)).map(Section::dialect),
        Some("Mapping")
    );

    let lines = document
        .elements()
        .map(|element| element.name_location.interval.start().line)
        .collect::<Vec<_>>();
    assert_eq!(lines, vec![2, 4]);
    assert!(document.partition_diagnostics().is_empty());
}

#[test]
fn positions_past_the_end_belong_to_the_last_section() {
    let text = "###Pure\nClass a::A {}\n###Mapping\n";
    let snapshot = snapshot_with(&[("file:///a.pure", text)]);
    let document = snapshot.document("file:///a.pure").unwrap();

    assert_eq!(
        document.section_at(Position::new(40, 3)).map(Section::dialect),
        Some("Mapping")
    );
}

#[test]
fn declarations_come_in_kind_then_path_order() {
    let snapshot = snapshot_with(&[
        ("file:///b.pure", "Class b::B {}\nEnum c::E { X }\n"),
        ("file:///a.pure", "Class z::Z {}\nClass a::A {}\n"),
    ]);

    let declared = snapshot
        .declarations_of(&[ElementKind::Enumeration, ElementKind::Class])
        .map(|(kind, path, _)| (kind, path))
        .collect::<Vec<_>>();

    assert_eq!(
        declared,
        vec![
            (ElementKind::Enumeration, "c::E"),
            (ElementKind::Class, "a::A"),
            (ElementKind::Class, "b::B"),
            (ElementKind::Class, "z::Z"),
        ]
    );
}

#[test]
fn first_definition_wins_in_document_order() {
    let snapshot = snapshot_with(&[
        ("file:///b.pure", "Class a::A {}"),
        ("file:///a.pure", "\n\nClass a::A {}"),
    ]);

    let declaration = snapshot
        .first_definition(crate::element::ElementKind::Class, "a::A")
        .unwrap();

    assert_eq!(declaration.location.document.as_str(), "file:///a.pure");
    assert_eq!(declaration.classifier, "Class");
}

#[tokio::test]
async fn open_change_close() {
    let state = state();
    let id: DocumentId = "file:///a.pure".into();

    state
        .open_document(id.clone(), "Class a::A {}".to_string())
        .await;
    let opened = state.snapshot().await;
    assert_eq!(opened.document("file:///a.pure").unwrap().elements().count(), 1);

    state
        .change_document(id.clone(), "Class a::A {}\nClass a::B {}".to_string())
        .await
        .unwrap();
    assert_eq!(
        state.snapshot().await.document("file:///a.pure").unwrap().elements().count(),
        2
    );
    // an earlier snapshot is unaffected by the edit
    assert_eq!(opened.document("file:///a.pure").unwrap().elements().count(), 1);

    state.close_document(&id).await.unwrap();
    assert!(state.snapshot().await.is_empty());
}

#[tokio::test]
async fn edits_to_unknown_documents_fail() {
    let state = state();
    let id: DocumentId = "file:///missing.pure".into();

    let changed = state.change_document(id.clone(), String::new()).await;
    let closed = state.close_document(&id).await;

    assert!(matches!(changed, Err(WorkspaceError::UnknownDocument(ref d)) if *d == id));
    assert!(matches!(closed, Err(WorkspaceError::UnknownDocument(_))));
    assert!(state.snapshot().await.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_see_whole_partitions() {
    let state = Arc::new(state());
    let id: DocumentId = "file:///a.pure".into();
    let one = "###Pure\nClass a::A {}\n".to_string();
    let two = "###Pure\nClass a::A {}\n###Mapping\nMapping a::m\n(\n)\n".to_string();
    state.open_document(id.clone(), one.clone()).await;

    let writer = {
        let state = state.clone();
        let id = id.clone();
        tokio::spawn(async move {
            for i in 0..50 {
                let text = if i % 2 == 0 { two.clone() } else { one.clone() };
                state.change_document(id.clone(), text).await.unwrap();
            }
        })
    };

    let readers = (0..8)
        .map(|_| {
            let state = state.clone();
            tokio::spawn(async move {
                for _ in 0..50 {
                    let snapshot = state.snapshot().await;
                    let document = snapshot.document("file:///a.pure").unwrap();
                    let dialects = document
                        .sections()
                        .iter()
                        .map(Section::dialect)
                        .collect::<Vec<_>>();
                    assert!(dialects == ["Pure"] || dialects == ["Pure", "Mapping"]);
                    assert_eq!(document.elements().count(), dialects.len());
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect::<Vec<_>>();

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }
}

#[tokio::test]
async fn shutdown_drops_documents_but_not_held_snapshots() {
    let state = state();
    state
        .open_document("file:///a.pure".into(), "Class a::A {}".to_string())
        .await;
    let held = state.snapshot().await;

    state.shutdown().await;

    assert!(state.snapshot().await.is_empty());
    assert_eq!(held.len(), 1);
}

#[tokio::test]
async fn commands_without_backend_fail_cleanly() {
    let state = state();
    let text = "###Connection\nJsonModelConnection a::c\n{\n  class: a::P;\n  url: 'x';\n}\n";
    state
        .open_document("file:///c.pure".into(), text.to_string())
        .await;
    let before = state.snapshot().await;

    let outcome = state
        .execute_command(crate::commands::CommandInvocation {
            document: "file:///c.pure".into(),
            entity_id: "a::c".to_string(),
            command_id: "connection.test".to_string(),
            arguments: Default::default(),
        })
        .await;

    assert_eq!(
        outcome,
        CommandOutcome::Failed {
            reason: "no execution backend is configured for 'connection.test'".to_string()
        }
    );
    assert!(Arc::ptr_eq(&before, &state.snapshot().await));
}

#[test]
fn conflicting_dialect_names_abort_discovery() {
    let settings = crate::config::Settings::default();
    let dialects: PluginList<dyn crate::extension::DialectExtension> =
        PluginList(vec![Arc::new(PureDialect), Arc::new(PureDialect)]);

    let result = GlobalState::discover(
        &dialects,
        &BuiltinInlineDialects::new(&settings),
        settings.clone(),
        Arc::new(crate::commands::UnavailableExecutor),
    );

    assert!(matches!(
        result,
        Err(WorkspaceError::Registry(RegistryError::NameConflict { ref name })) if name == "Pure"
    ));
}
