use std::collections::BTreeMap;

use super::{copy_path_command, cursor::TokenCursor, lexer::Token, parse_elements};
use crate::{
    commands::{CommandCollector, CommandProducer, ExecutionRequest},
    completion::{Completion, CompletionProducer},
    diagnostics::RawDiagnostic,
    element::{ClassMapping, Element, ElementBody, ElementKind, ElementPointer, MappingBody},
    extension::{DialectExtension, ParseOutput, SectionSource},
    references::{no_slots, LazyReference, ReferenceContext, ReferenceProducer, ReferenceSlots},
    registry::Extension,
    workspace::Section,
};

const KEYWORDS: &[&str] = &["Mapping", "include", "Pure"];

/// `###Mapping`: class mappings, possibly including other mappings.
///
/// ```text
/// Mapping a::M
/// (
///   include a::Base
///   *a::Person[p]: Pure
///   {
///     ~src a::Source
///     name: $src.name
///   }
/// )
/// ```
pub struct MappingDialect;

impl Extension for MappingDialect {
    fn name(&self) -> &str {
        "Mapping"
    }
}

impl DialectExtension for MappingDialect {
    fn keywords(&self) -> &'static [&'static str] {
        KEYWORDS
    }

    fn parse(&self, source: &SectionSource<'_>) -> ParseOutput {
        parse_elements(source, &["Mapping"], |cursor, _| parse_mapping(cursor, source))
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

fn parse_mapping(
    cursor: &mut TokenCursor<'_>,
    source: &SectionSource<'_>,
) -> Result<Element, RawDiagnostic> {
    let keyword = cursor.expect_keyword("Mapping")?;
    let (path, name_span) = cursor.expect_path("a mapping path")?;
    cursor.expect(Token::LParen)?;

    let mut includes = Vec::new();
    let mut class_mappings = Vec::new();

    while cursor.eat(Token::RParen).is_none() {
        if cursor.eat_keyword("include").is_some() {
            includes.push(cursor.expect_pointer(source, "a mapping path")?);
        } else {
            class_mappings.push(parse_class_mapping(cursor, source)?);
        }
    }

    Ok(Element {
        path: path.to_string(),
        kind: ElementKind::Mapping,
        location: source.location(keyword.start..cursor.previous_end()),
        name_location: source.location(name_span),
        stereotypes: Vec::new(),
        tagged_values: Vec::new(),
        body: ElementBody::Mapping(MappingBody {
            includes: (!includes.is_empty()).then_some(includes),
            class_mappings,
        }),
    })
}

fn parse_class_mapping(
    cursor: &mut TokenCursor<'_>,
    source: &SectionSource<'_>,
) -> Result<ClassMapping, RawDiagnostic> {
    let star = cursor.eat(Token::Star);
    let (class_path, class_span) = cursor.expect_path("'include', a class path or ')'")?;
    let start = star.as_ref().map_or(class_span.start, |span| span.start);
    let class = ElementPointer {
        path: class_path.to_string(),
        location: source.location(class_span),
    };

    let id = match cursor.eat(Token::LBracket) {
        Some(_) => {
            let (id, _) = cursor.expect_path("a mapping id")?;
            cursor.expect(Token::RBracket)?;
            Some(id.to_string())
        }
        None => None,
    };

    cursor.expect(Token::Colon)?;
    let (mapping_type, _) = cursor.expect_path("a mapping type")?;
    cursor.expect(Token::LBrace)?;

    let source_class = match cursor.eat(Token::Tilde) {
        Some(_) => {
            cursor.expect_keyword("src")?;
            Some(cursor.expect_pointer(source, "a class path")?)
        }
        None => None,
    };
    cursor.skip_balanced(Token::LBrace, Token::RBrace)?;

    Ok(ClassMapping {
        class,
        id,
        root: star.is_some(),
        mapping_type: mapping_type.to_string(),
        source: source_class,
        location: source.location(start..cursor.previous_end()),
    })
}

impl ReferenceProducer for MappingDialect {
    fn references<'a>(
        &'a self,
        _context: ReferenceContext<'a>,
        element: &'a Element,
    ) -> ReferenceSlots<'a> {
        let ElementBody::Mapping(mapping) = &element.body else {
            return no_slots();
        };

        let includes = mapping
            .includes
            .iter()
            .flatten()
            .map(|include| Some(LazyReference::to_pointer(include, &[ElementKind::Mapping])));

        let class_mappings = mapping.class_mappings.iter().flat_map(|class_mapping| {
            std::iter::once(&class_mapping.class)
                .chain(class_mapping.source.as_ref())
                .map(|pointer| Some(LazyReference::to_pointer(pointer, &[ElementKind::Class])))
        });

        Box::new(includes.chain(class_mappings))
    }
}

impl CompletionProducer for MappingDialect {
    fn boilerplate(&self) -> Vec<Completion> {
        vec![Completion::snippet(
            "Mapping",
            "Mapping ${1:model::Name}\n(\n  ${2:model::Class}: Pure\n  {\n    ~src ${3:model::Source}\n  }\n)",
            "model-to-model mapping",
        )]
    }

    fn path_trigger(&self, line_prefix: &str) -> Option<&'static [ElementKind]> {
        let before = line_prefix.trim_end();
        if before.ends_with("include") {
            Some(&[ElementKind::Mapping])
        } else if before.ends_with("~src") || before.ends_with('*') {
            Some(&[ElementKind::Class])
        } else {
            None
        }
    }
}

impl CommandProducer for MappingDialect {
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
