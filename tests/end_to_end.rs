//! A small project spread over several documents, driven through the
//! workspace state the way the server drives it.

use std::{collections::BTreeSet, sync::Arc};

use dialect_lsp::{
    commands::UnavailableExecutor,
    config::Settings,
    diagnostics::{document_diagnostics, Severity},
    dialects::builtin_extensions,
    location::{DocumentId, Interval, Position},
    references::{element_slots, find_usages, goto_definition},
    workspace::GlobalState,
};

const MODEL: &str = "\
Class a::Person
{
  name: String[1];
}
";

const MAPPINGS: &str = "\
###Mapping
Mapping a::people
(
  a::Person: Pure
  {
    name: $src.name
  }
)

Mapping a::empty
(
)
";

const CONNECTION: &str = "\
###Connection
JsonModelConnection a::conn
{
  class: a::Person;
  url: 'x';
}
";

const RUNTIME: &str = "\
###Runtime
Runtime a::rt
{
  mappings: [a::people, a::empty];
  connections:
  [
    ModelStore: [json: a::conn]
  ];
}
";

fn id(name: &str) -> DocumentId {
    DocumentId::from(format!("file:///project/{name}"))
}

/// Position of the first occurrence of `needle` in `text`.
fn position_of(text: &str, needle: &str) -> Position {
    let offset = text.find(needle).unwrap();
    let before = &text[..offset];
    let line = before.matches('\n').count();
    let column = before.rsplit('\n').next().unwrap().chars().count();
    Position::new(line as u32, column as u32)
}

async fn project() -> GlobalState {
    let settings = Settings::default();
    let extensions = builtin_extensions(&settings).unwrap();
    let state = GlobalState::new(extensions, settings, Arc::new(UnavailableExecutor));

    for (name, text) in [
        ("model.pure", MODEL),
        ("mappings.pure", MAPPINGS),
        ("conn.pure", CONNECTION),
        ("rt.pure", RUNTIME),
    ] {
        state.open_document(id(name), text.to_string()).await;
    }
    state
}

#[tokio::test]
async fn connection_class_resolves_to_the_whole_class() {
    let state = project().await;
    let snapshot = state.snapshot().await;

    let reference = goto_definition(
        &snapshot,
        &id("conn.pure"),
        position_of(CONNECTION, "a::Person"),
    )
    .unwrap();

    assert_eq!(reference.declaration().document, id("model.pure"));
    assert_eq!(
        reference.declaration().interval,
        Interval::new(Position::new(0, 0), Position::new(3, 0)).unwrap()
    );
}

#[tokio::test]
async fn runtime_slots_resolve_in_order() {
    let state = project().await;
    let snapshot = state.snapshot().await;
    let document = snapshot.document(id("rt.pure").as_str()).unwrap();
    let section = &document.sections()[0];

    let declarations = element_slots(&snapshot, section, &section.elements()[0])
        .map(|slot| {
            let reference = slot.unwrap().resolve(snapshot.as_ref()).unwrap();
            reference.declaration().document.clone()
        })
        .collect::<Vec<_>>();

    assert_eq!(
        declarations,
        vec![id("mappings.pure"), id("mappings.pure"), id("conn.pure")]
    );
}

#[tokio::test]
async fn a_consistent_project_has_no_diagnostics() {
    let state = project().await;
    let snapshot = state.snapshot().await;

    for document in snapshot.documents() {
        let diagnostics = document_diagnostics(&snapshot, document.id()).unwrap();
        assert!(diagnostics.is_empty(), "{}: {diagnostics:?}", document.id());
    }
}

#[tokio::test]
async fn usages_of_a_class_span_documents() {
    let state = project().await;
    let snapshot = state.snapshot().await;

    let usages = find_usages(&snapshot, &id("model.pure"), position_of(MODEL, "Person"));

    let documents = usages
        .iter()
        .map(|location| location.document.clone())
        .collect::<BTreeSet<_>>();
    assert_eq!(
        documents,
        BTreeSet::from([id("conn.pure"), id("mappings.pure")])
    );
}

#[tokio::test]
async fn closing_the_model_leaves_dangling_pointers() {
    let state = project().await;
    let snapshot = state.close_document(&id("model.pure")).await.unwrap();

    let diagnostics = document_diagnostics(&snapshot, &id("conn.pure")).unwrap();

    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].severity, Severity::Warning);
    assert!(diagnostics[0].message.starts_with("Can't find"));
    assert!(diagnostics[0].message.contains("a::Person"));
    assert_eq!(
        diagnostics[0].location.interval.start(),
        position_of(CONNECTION, "a::Person")
    );

    let snapshot = state
        .open_document(id("model.pure"), MODEL.to_string())
        .await;
    assert!(document_diagnostics(&snapshot, &id("conn.pure"))
        .unwrap()
        .is_empty());
}
