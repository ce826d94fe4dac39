use std::collections::BTreeMap;

use super::{
    connection::{parse_connection_body, CONNECTION_TYPES},
    copy_path_command,
    cursor::TokenCursor,
    lexer::Token,
    parse_elements, parse_pointer_list,
};
use crate::{
    commands::{CommandCollector, CommandProducer, ExecutionRequest},
    completion::{Completion, CompletionProducer},
    diagnostics::RawDiagnostic,
    element::{
        ConnectionValue, Element, ElementBody, ElementKind, ElementPointer, IdentifiedConnection,
        RuntimeBody, StoreConnections, StoreValue,
    },
    extension::{DialectExtension, ParseOutput, SectionSource},
    references::{no_slots, LazyReference, ReferenceContext, ReferenceProducer, ReferenceSlots},
    registry::Extension,
    workspace::Section,
};

const KEYWORDS: &[&str] = &["Runtime", "mappings", "connections", "ModelStore"];

const MODEL_STORE: &str = "ModelStore";

/// `###Runtime`: which mappings run against which stores, through which
/// connections. Connections are either pointers or embedded in place:
///
/// ```text
/// Runtime a::rt
/// {
///   mappings: [a::m];
///   connections:
///   [
///     ModelStore: [ c1: a::conn ],
///     a::db: [ c2: #{ JsonModelConnection { class: a::P; url: 'x'; } }# ]
///   ];
/// }
/// ```
pub struct RuntimeDialect;

impl Extension for RuntimeDialect {
    fn name(&self) -> &str {
        "Runtime"
    }
}

impl DialectExtension for RuntimeDialect {
    fn keywords(&self) -> &'static [&'static str] {
        KEYWORDS
    }

    fn parse(&self, source: &SectionSource<'_>) -> ParseOutput {
        parse_elements(source, &["Runtime"], |cursor, _| parse_runtime(cursor, source))
    }

    fn reference_producer(&self) -> Option<&(dyn ReferenceProducer + 'static)> {
        Some(self)
    }

    fn completion_producer(&self) -> Option<&(dyn CompletionProducer + 'static)> {
        Some(self)
    }

    fn command_producer(&self) -> Option<&(dyn CommandProducer + 'static)> {
        Some(self)
    }
}

fn parse_runtime(
    cursor: &mut TokenCursor<'_>,
    source: &SectionSource<'_>,
) -> Result<Element, RawDiagnostic> {
    let keyword = cursor.expect_keyword("Runtime")?;
    let (path, name_span) = cursor.expect_path("a runtime path")?;
    cursor.expect(Token::LBrace)?;

    let mut body = RuntimeBody {
        mappings: Vec::new(),
        connections: None,
    };

    while cursor.eat(Token::RBrace).is_none() {
        let (key, key_span) = cursor.expect_path("'mappings', 'connections' or '}'")?;
        cursor.expect(Token::Colon)?;
        match key {
            "mappings" => body.mappings = parse_pointer_list(cursor, source, "a mapping path")?,
            "connections" => body.connections = Some(parse_store_connections(cursor, source)?),
            _ => {
                return Err(RawDiagnostic::parser_error(
                    key_span,
                    format!("Unknown runtime property '{key}'"),
                ))
            }
        }
        cursor.expect(Token::Semicolon)?;
    }

    Ok(Element {
        path: path.to_string(),
        kind: ElementKind::Runtime,
        location: source.location(keyword.start..cursor.previous_end()),
        name_location: source.location(name_span),
        stereotypes: Vec::new(),
        tagged_values: Vec::new(),
        body: ElementBody::Runtime(body),
    })
}

/// `[ store: [ id: connection, ... ], ... ]`
fn parse_store_connections(
    cursor: &mut TokenCursor<'_>,
    source: &SectionSource<'_>,
) -> Result<Vec<StoreConnections>, RawDiagnostic> {
    cursor.expect(Token::LBracket)?;
    let mut stores = Vec::new();

    while cursor.eat(Token::RBracket).is_none() {
        let (store, store_span) = cursor.expect_path("a store path or ']'")?;
        let store = if store == MODEL_STORE {
            StoreValue::ModelStore(source.location(store_span))
        } else {
            StoreValue::Pointer(ElementPointer {
                path: store.to_string(),
                location: source.location(store_span),
            })
        };

        cursor.expect(Token::Colon)?;
        cursor.expect(Token::LBracket)?;
        let mut connections = Vec::new();
        while cursor.eat(Token::RBracket).is_none() {
            connections.push(parse_identified_connection(cursor, source)?);
            if cursor.eat(Token::Comma).is_none() {
                cursor.expect(Token::RBracket)?;
                break;
            }
        }

        stores.push(StoreConnections { store, connections });
        if cursor.eat(Token::Comma).is_none() {
            cursor.expect(Token::RBracket)?;
            break;
        }
    }

    Ok(stores)
}

fn parse_identified_connection(
    cursor: &mut TokenCursor<'_>,
    source: &SectionSource<'_>,
) -> Result<IdentifiedConnection, RawDiagnostic> {
    let (id, id_span) = cursor.expect_path("a connection id")?;
    cursor.expect(Token::Colon)?;

    let value = match cursor.eat(Token::IslandOpen) {
        Some(open) => {
            if cursor.text(&open) != "#{" {
                return Err(RawDiagnostic::parser_error(
                    open,
                    "Embedded connections open with '#{'",
                ));
            }
            let (type_name, type_span) = cursor.expect_path("a connection type")?;
            if !CONNECTION_TYPES.contains(&type_name) {
                return Err(RawDiagnostic::parser_error(
                    type_span,
                    format!("Unknown connection type '{type_name}'"),
                ));
            }
            let connection = parse_connection_body(cursor, source, type_name)?;
            let close = cursor.expect(Token::IslandClose)?;

            ConnectionValue::Embedded {
                connection: Box::new(connection),
                location: source.location(open.start..close.end),
            }
        }
        None => ConnectionValue::Pointer(cursor.expect_pointer(source, "a connection path or '#{'")?),
    };

    Ok(IdentifiedConnection {
        id: id.to_string(),
        location: source.location(id_span.start..cursor.previous_end()),
        value,
    })
}

impl ReferenceProducer for RuntimeDialect {
    fn references<'a>(
        &'a self,
        context: ReferenceContext<'a>,
        element: &'a Element,
    ) -> ReferenceSlots<'a> {
        let ElementBody::Runtime(runtime) = &element.body else {
            return no_slots();
        };

        let mappings = runtime
            .mappings
            .iter()
            .map(|mapping| Some(LazyReference::to_pointer(mapping, &[ElementKind::Mapping])));

        let connections = runtime.connections.iter().flatten().flat_map(move |store| {
            let store_slot: ReferenceSlots<'a> = match &store.store {
                StoreValue::ModelStore(_) => no_slots(),
                StoreValue::Pointer(pointer) => Box::new(std::iter::once(Some(
                    LazyReference::to_pointer(pointer, &[ElementKind::Store]),
                ))),
            };

            store_slot.chain(
                store
                    .connections
                    .iter()
                    .flat_map(move |connection| context.connection_slots(&connection.value)),
            )
        });

        Box::new(mappings.chain(connections))
    }
}

impl CompletionProducer for RuntimeDialect {
    fn boilerplate(&self) -> Vec<Completion> {
        vec![Completion::snippet(
            "Runtime",
            "Runtime ${1:model::Name}\n{\n  mappings: [${2}];\n  connections:\n  [\n    ModelStore: [ ${3:id}: ${4} ]\n  ];\n}",
            "runtime",
        )]
    }

    fn path_trigger(&self, line_prefix: &str) -> Option<&'static [ElementKind]> {
        let compact = line_prefix.split_whitespace().collect::<String>();
        if compact.contains("mappings:[") && !compact.contains(']') {
            Some(&[ElementKind::Mapping])
        } else if compact.ends_with(':') && !compact.ends_with("connections:") {
            Some(&[ElementKind::Connection])
        } else {
            None
        }
    }
}

impl CommandProducer for RuntimeDialect {
    fn command_ids(&self) -> &'static [&'static str] {
        &["element.copyPath"]
    }

    fn collect_commands(&self, _section: &Section, element: &Element, collector: &mut CommandCollector) {
        copy_path_command(element, collector);
    }

    fn execution_request(
        &self,
        _element: &Element,
        _command_id: &str,
        _arguments: &BTreeMap<String, String>,
    ) -> Option<ExecutionRequest> {
        None
    }
}
