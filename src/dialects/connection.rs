use std::collections::BTreeMap;

use serde_json::json;

use super::{
    copy_path_command, cursor::TokenCursor, execution_request, lexer::Token, parse_elements,
    parse_pointer_list,
};
use crate::{
    commands::{CommandCollector, CommandKind, CommandProducer, ExecutionRequest},
    completion::{Completion, CompletionProducer},
    diagnostics::RawDiagnostic,
    element::{Connection, Element, ElementBody, ElementKind, ElementPointer},
    extension::{DialectExtension, ParseOutput, SectionSource},
    references::{
        no_slots, ConnectionReferenceProducer, LazyReference, ReferenceContext, ReferenceProducer,
        ReferenceSlots,
    },
    registry::Extension,
    workspace::Section,
};

pub(super) const CONNECTION_TYPES: &[&str] = &["JsonModelConnection", "ModelChainConnection"];

const KEYWORDS: &[&str] = &[
    "JsonModelConnection",
    "ModelChainConnection",
    "class",
    "url",
    "mappings",
];

/// `###Connection`. Also answers for connections used by runtimes, whether
/// they point here or are embedded in the runtime.
pub struct ConnectionDialect;

impl Extension for ConnectionDialect {
    fn name(&self) -> &str {
        "Connection"
    }
}

impl DialectExtension for ConnectionDialect {
    fn keywords(&self) -> &'static [&'static str] {
        KEYWORDS
    }

    fn parse(&self, source: &SectionSource<'_>) -> ParseOutput {
        parse_elements(source, CONNECTION_TYPES, |cursor, _| {
            let (type_name, keyword) = cursor.expect_path("a connection type")?;
            let (path, name_span) = cursor.expect_path("a connection path")?;
            let connection = parse_connection_body(cursor, source, type_name)?;

            Ok(Element {
                path: path.to_string(),
                kind: ElementKind::Connection,
                location: source.location(keyword.start..cursor.previous_end()),
                name_location: source.location(name_span),
                stereotypes: Vec::new(),
                tagged_values: Vec::new(),
                body: ElementBody::Connection(connection),
            })
        })
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

    fn connection_producer(&self) -> Option<&(dyn ConnectionReferenceProducer + 'static)> {
        Some(self)
    }
}

/// `{ key: value; ... }` of a connection of type `type_name`, braces
/// included.
pub(super) fn parse_connection_body(
    cursor: &mut TokenCursor<'_>,
    source: &SectionSource<'_>,
    type_name: &str,
) -> Result<Connection, RawDiagnostic> {
    let open = cursor.expect(Token::LBrace)?;
    let mut class: Option<ElementPointer> = None;
    let mut url: Option<String> = None;
    let mut mappings: Option<Vec<ElementPointer>> = None;

    while cursor.eat(Token::RBrace).is_none() {
        let (key, key_span) = cursor.expect_path("a connection property or '}'")?;
        cursor.expect(Token::Colon)?;

        match (type_name, key) {
            ("JsonModelConnection", "class") => {
                class = Some(cursor.expect_pointer(source, "a class path")?)
            }
            ("JsonModelConnection", "url") => url = Some(cursor.expect_string()?.to_string()),
            ("ModelChainConnection", "mappings") => {
                mappings = Some(parse_pointer_list(cursor, source, "a mapping path")?)
            }
            _ => {
                return Err(RawDiagnostic::parser_error(
                    key_span,
                    format!("Unknown property '{key}' for {type_name}"),
                ))
            }
        }
        cursor.expect(Token::Semicolon)?;
    }

    let missing = |property: &str| {
        RawDiagnostic::parser_error(
            open.clone(),
            format!("{type_name} is missing '{property}'"),
        )
    };

    match type_name {
        "JsonModelConnection" => Ok(Connection::JsonModel {
            class: class.ok_or_else(|| missing("class"))?,
            url: url.ok_or_else(|| missing("url"))?,
        }),
        "ModelChainConnection" => Ok(Connection::ModelChain { mappings }),
        _ => Err(RawDiagnostic::parser_error(
            open,
            format!("Unknown connection type '{type_name}'"),
        )),
    }
}

impl ReferenceProducer for ConnectionDialect {
    fn references<'a>(
        &'a self,
        context: ReferenceContext<'a>,
        element: &'a Element,
    ) -> ReferenceSlots<'a> {
        match &element.body {
            ElementBody::Connection(connection) => self.embedded_references(context, connection),
            _ => no_slots(),
        }
    }
}

impl ConnectionReferenceProducer for ConnectionDialect {
    fn pointer_reference<'a>(&'a self, pointer: &'a ElementPointer) -> Option<LazyReference<'a>> {
        Some(LazyReference::to_pointer(pointer, &[ElementKind::Connection]))
    }

    fn embedded_references<'a>(
        &'a self,
        _context: ReferenceContext<'a>,
        connection: &'a Connection,
    ) -> ReferenceSlots<'a> {
        match connection {
            Connection::JsonModel { class, .. } => Box::new(std::iter::once(Some(
                LazyReference::to_pointer(class, &[ElementKind::Class]),
            ))),
            Connection::ModelChain { mappings } => Box::new(
                mappings
                    .iter()
                    .flatten()
                    .map(|mapping| Some(LazyReference::to_pointer(mapping, &[ElementKind::Mapping]))),
            ),
        }
    }
}

impl CompletionProducer for ConnectionDialect {
    fn boilerplate(&self) -> Vec<Completion> {
        vec![
            Completion::snippet(
                "JsonModelConnection",
                "JsonModelConnection ${1:model::Name}\n{\n  class: ${2:model::Class};\n  url: '${3:data:application/json,{}}';\n}",
                "JSON model connection",
            ),
            Completion::snippet(
                "ModelChainConnection",
                "ModelChainConnection ${1:model::Name}\n{\n  mappings: [${2}];\n}",
                "model chain connection",
            ),
        ]
    }

    fn path_trigger(&self, line_prefix: &str) -> Option<&'static [ElementKind]> {
        let compact = line_prefix.split_whitespace().collect::<String>();
        if compact.ends_with("class:") {
            Some(&[ElementKind::Class])
        } else if compact.contains("mappings:[") && !compact.contains(']') {
            Some(&[ElementKind::Mapping])
        } else {
            None
        }
    }
}

impl CommandProducer for ConnectionDialect {
    fn command_ids(&self) -> &'static [&'static str] {
        &["element.copyPath", "connection.test"]
    }

    fn collect_commands(&self, _section: &Section, element: &Element, collector: &mut CommandCollector) {
        copy_path_command(element, collector);
        collector.push(
            "connection.test",
            "Test connection",
            BTreeMap::new(),
            CommandKind::Server,
        );
    }

    fn execution_request(
        &self,
        element: &Element,
        command_id: &str,
        arguments: &BTreeMap<String, String>,
    ) -> Option<ExecutionRequest> {
        let ElementBody::Connection(connection) = &element.body else {
            return None;
        };
        if command_id != "connection.test" {
            return None;
        }

        let payload = match connection {
            Connection::JsonModel { class, url } => json!({
                "type": connection.type_name(),
                "class": class.path,
                "url": url,
            }),
            Connection::ModelChain { mappings } => json!({
                "type": connection.type_name(),
                "mappings": mappings
                    .iter()
                    .flatten()
                    .map(|mapping| mapping.path.as_str())
                    .collect::<Vec<_>>(),
            }),
        };

        Some(execution_request(
            self.name(),
            element,
            command_id,
            arguments,
            payload,
        ))
    }
}
