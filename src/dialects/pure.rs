//! The default dialect: classes, enumerations, profiles and functions.

use std::collections::BTreeMap;

use serde_json::json;

use super::{
    copy_path_command, cursor::TokenCursor, execution_request, lexer::Token, parse_elements,
    parse_stereotypes, parse_tagged_values, scan_body,
};
use crate::{
    commands::{CommandCollector, CommandKind, CommandProducer, ExecutionRequest},
    completion::{Completion, CompletionProducer},
    diagnostics::RawDiagnostic,
    element::{
        ClassBody, Element, ElementBody, ElementKind, EnumerationBody, FunctionBody, Named,
        Parameter, ProfileBody, Property, TypeValue,
    },
    extension::{DialectExtension, ParseOutput, SectionSource},
    references::{no_slots, LazyReference, ReferenceContext, ReferenceProducer, ReferenceSlots},
    registry::Extension,
    workspace::Section,
};

const ELEMENT_KEYWORDS: &[&str] = &["Class", "Enum", "Profile", "function"];
const KEYWORDS: &[&str] = &["Class", "Enum", "Profile", "function", "extends"];

const PRIMITIVES: &[&str] = &[
    "String",
    "Integer",
    "Float",
    "Decimal",
    "Number",
    "Boolean",
    "Date",
    "StrictDate",
    "DateTime",
    "Any",
];

pub struct PureDialect;

impl Extension for PureDialect {
    fn name(&self) -> &str {
        "Pure"
    }
}

impl DialectExtension for PureDialect {
    fn keywords(&self) -> &'static [&'static str] {
        KEYWORDS
    }

    fn parse(&self, source: &SectionSource<'_>) -> ParseOutput {
        parse_elements(source, ELEMENT_KEYWORDS, |cursor, diagnostics| {
            parse_element(cursor, source, diagnostics)
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
}

fn parse_element(
    cursor: &mut TokenCursor<'_>,
    source: &SectionSource<'_>,
    diagnostics: &mut Vec<RawDiagnostic>,
) -> Result<Element, RawDiagnostic> {
    let (keyword, keyword_span) = cursor.expect_path("an element keyword")?;
    let stereotypes = parse_stereotypes(cursor, source)?;
    let tagged_values = parse_tagged_values(cursor, source)?;
    let (path, name_span) = cursor.expect_path("an element path")?;

    let (kind, body) = match keyword {
        "Class" => (
            ElementKind::Class,
            ElementBody::Class(parse_class(cursor, source, diagnostics)?),
        ),
        "Enum" => (
            ElementKind::Enumeration,
            ElementBody::Enumeration(parse_enumeration(cursor, source)?),
        ),
        "Profile" => (
            ElementKind::Profile,
            ElementBody::Profile(parse_profile(cursor, source)?),
        ),
        _ => (
            ElementKind::Function,
            ElementBody::Function(parse_function(cursor, source, diagnostics)?),
        ),
    };

    Ok(Element {
        path: path.to_string(),
        kind,
        location: source.location(keyword_span.start..cursor.previous_end()),
        name_location: source.location(name_span),
        stereotypes,
        tagged_values,
        body,
    })
}

fn parse_class(
    cursor: &mut TokenCursor<'_>,
    source: &SectionSource<'_>,
    diagnostics: &mut Vec<RawDiagnostic>,
) -> Result<ClassBody, RawDiagnostic> {
    let mut super_types = Vec::new();
    if cursor.eat_keyword("extends").is_some() {
        loop {
            super_types.push(cursor.expect_pointer(source, "a class path")?);
            if cursor.eat(Token::Comma).is_none() {
                break;
            }
        }
    }

    cursor.expect(Token::LBrace)?;
    let mut properties = Vec::new();
    let mut islands = Vec::new();

    while cursor.eat(Token::RBrace).is_none() {
        let (name, name_span) = cursor.expect_path("a property name or '}'")?;

        // derived property: name(params) { expression }: Type[m];
        if cursor.eat(Token::LParen).is_some() {
            cursor.skip_balanced(Token::LParen, Token::RParen)?;
            cursor.expect(Token::LBrace)?;
            islands.extend(scan_body(cursor, source, diagnostics)?);
        }

        cursor.expect(Token::Colon)?;
        let ty = parse_type(cursor, source)?;
        let multiplicity = parse_multiplicity(cursor)?;
        cursor.expect(Token::Semicolon)?;

        properties.push(Property {
            name: name.to_string(),
            location: source.location(name_span.start..cursor.previous_end()),
            ty,
            multiplicity,
        });
    }

    Ok(ClassBody {
        super_types,
        properties,
        islands,
    })
}

fn parse_enumeration(
    cursor: &mut TokenCursor<'_>,
    source: &SectionSource<'_>,
) -> Result<EnumerationBody, RawDiagnostic> {
    cursor.expect(Token::LBrace)?;
    let mut values = Vec::new();

    while cursor.eat(Token::RBrace).is_none() {
        let (name, span) = cursor.expect_path("an enumeration value")?;
        values.push(Named {
            name: name.to_string(),
            location: source.location(span),
        });
        if cursor.eat(Token::Comma).is_none() {
            cursor.expect(Token::RBrace)?;
            break;
        }
    }

    Ok(EnumerationBody { values })
}

fn parse_profile(
    cursor: &mut TokenCursor<'_>,
    source: &SectionSource<'_>,
) -> Result<ProfileBody, RawDiagnostic> {
    cursor.expect(Token::LBrace)?;
    let mut body = ProfileBody {
        stereotypes: Vec::new(),
        tags: Vec::new(),
    };

    while cursor.eat(Token::RBrace).is_none() {
        let (entry, span) = cursor.expect_path("'stereotypes', 'tags' or '}'")?;
        let target = match entry {
            "stereotypes" => &mut body.stereotypes,
            "tags" => &mut body.tags,
            _ => {
                return Err(RawDiagnostic::parser_error(
                    span,
                    format!("Unknown profile entry '{entry}', expected 'stereotypes' or 'tags'"),
                ))
            }
        };

        cursor.expect(Token::Colon)?;
        cursor.expect(Token::LBracket)?;
        while cursor.eat(Token::RBracket).is_none() {
            let (name, span) = cursor.expect_path("a name")?;
            target.push(Named {
                name: name.to_string(),
                location: source.location(span),
            });
            if cursor.eat(Token::Comma).is_none() {
                cursor.expect(Token::RBracket)?;
                break;
            }
        }
        cursor.expect(Token::Semicolon)?;
    }

    Ok(body)
}

fn parse_function(
    cursor: &mut TokenCursor<'_>,
    source: &SectionSource<'_>,
    diagnostics: &mut Vec<RawDiagnostic>,
) -> Result<FunctionBody, RawDiagnostic> {
    cursor.expect(Token::LParen)?;
    let mut parameters = Vec::new();

    while cursor.eat(Token::RParen).is_none() {
        let (name, span) = cursor.expect_path("a parameter name or ')'")?;
        cursor.expect(Token::Colon)?;
        let ty = parse_type(cursor, source)?;
        let multiplicity = parse_multiplicity(cursor)?;
        parameters.push(Parameter {
            name: name.to_string(),
            location: source.location(span.start..cursor.previous_end()),
            ty,
            multiplicity,
        });
        if cursor.eat(Token::Comma).is_none() {
            cursor.expect(Token::RParen)?;
            break;
        }
    }

    cursor.expect(Token::Colon)?;
    let return_type = parse_type(cursor, source)?;
    let return_multiplicity = parse_multiplicity(cursor)?;
    cursor.expect(Token::LBrace)?;
    let islands = scan_body(cursor, source, diagnostics)?;

    Ok(FunctionBody {
        parameters,
        return_type,
        return_multiplicity,
        islands,
    })
}

fn parse_type(
    cursor: &mut TokenCursor<'_>,
    source: &SectionSource<'_>,
) -> Result<TypeValue, RawDiagnostic> {
    let pointer = cursor.expect_pointer(source, "a type")?;

    if PRIMITIVES.contains(&pointer.path.as_str()) {
        Ok(TypeValue::Primitive {
            name: pointer.path,
            location: pointer.location,
        })
    } else {
        Ok(TypeValue::Pointer(pointer))
    }
}

/// `[1]`, `[0..1]`, `[*]`, `[1..*]`
fn parse_multiplicity(cursor: &mut TokenCursor<'_>) -> Result<String, RawDiagnostic> {
    cursor.expect(Token::LBracket)?;
    let mut multiplicity = String::new();

    loop {
        match cursor.peek() {
            Some(Token::Number | Token::DotDot | Token::Star) => {
                if let Some((_, span)) = cursor.bump() {
                    multiplicity.push_str(cursor.text(&span));
                }
            }
            _ => break,
        }
    }

    if multiplicity.is_empty() {
        return Err(cursor.unexpected("a multiplicity"));
    }
    cursor.expect(Token::RBracket)?;
    Ok(multiplicity)
}

fn type_slot(ty: &TypeValue) -> Option<LazyReference<'_>> {
    match ty {
        TypeValue::Primitive { .. } => None,
        TypeValue::Pointer(pointer) => Some(LazyReference::to_pointer(pointer, ElementKind::TYPES)),
    }
}

/// Stereotypes then tagged values, highlighting the profile path.
fn annotation_slots(element: &Element) -> ReferenceSlots<'_> {
    let stereotypes = element.stereotypes.iter().map(|stereotype| {
        Some(
            LazyReference::new(
                stereotype.location.clone(),
                format!("profile '{}'", stereotype.profile.path),
                move |resolver| {
                    resolver.resolve(
                        &stereotype.profile.path,
                        ElementKind::Profile,
                        &stereotype.location,
                    )
                },
            )
            .with_core_location(stereotype.profile.location.clone()),
        )
    });

    let tagged_values = element.tagged_values.iter().map(|tagged| {
        Some(
            LazyReference::new(
                tagged.location.clone(),
                format!("profile '{}'", tagged.profile.path),
                move |resolver| {
                    resolver.resolve(&tagged.profile.path, ElementKind::Profile, &tagged.location)
                },
            )
            .with_core_location(tagged.profile.location.clone()),
        )
    });

    Box::new(stereotypes.chain(tagged_values))
}

impl ReferenceProducer for PureDialect {
    fn references<'a>(
        &'a self,
        context: ReferenceContext<'a>,
        element: &'a Element,
    ) -> ReferenceSlots<'a> {
        let structural: ReferenceSlots<'a> = match &element.body {
            ElementBody::Class(class) => Box::new(
                class
                    .super_types
                    .iter()
                    .map(|pointer| Some(LazyReference::to_pointer(pointer, &[ElementKind::Class])))
                    .chain(class.properties.iter().map(|property| type_slot(&property.ty)))
                    .chain(
                        class
                            .islands
                            .iter()
                            .flat_map(move |island| context.island_slots(island)),
                    ),
            ),
            ElementBody::Function(function) => Box::new(
                function
                    .parameters
                    .iter()
                    .map(|parameter| type_slot(&parameter.ty))
                    .chain(std::iter::once(type_slot(&function.return_type)))
                    .chain(
                        function
                            .islands
                            .iter()
                            .flat_map(move |island| context.island_slots(island)),
                    ),
            ),
            _ => no_slots(),
        };

        Box::new(annotation_slots(element).chain(structural))
    }
}

impl CompletionProducer for PureDialect {
    fn boilerplate(&self) -> Vec<Completion> {
        vec![
            Completion::snippet(
                "Class",
                "Class ${1:model::Name}\n{\n  ${2:name}: ${3:String}[1];\n}",
                "class definition",
            ),
            Completion::snippet(
                "Enum",
                "Enum ${1:model::Name}\n{\n  ${2:VALUE}\n}",
                "enumeration definition",
            ),
            Completion::snippet(
                "Profile",
                "Profile ${1:model::Name}\n{\n  stereotypes: [${2}];\n  tags: [${3}];\n}",
                "profile definition",
            ),
            Completion::snippet(
                "function",
                "function ${1:model::name}(): ${2:String}[1]\n{\n  ${3}\n}",
                "function definition",
            ),
        ]
    }

    fn path_trigger(&self, line_prefix: &str) -> Option<&'static [ElementKind]> {
        let before = line_prefix.trim_end();
        if before.ends_with("extends") {
            Some(&[ElementKind::Class])
        } else if before.ends_with("<<") {
            Some(&[ElementKind::Profile])
        } else if before.ends_with(':') {
            Some(ElementKind::TYPES)
        } else {
            None
        }
    }
}

impl CommandProducer for PureDialect {
    fn command_ids(&self) -> &'static [&'static str] {
        &["element.copyPath", "function.execute"]
    }

    fn collect_commands(&self, _section: &Section, element: &Element, collector: &mut CommandCollector) {
        copy_path_command(element, collector);
        if element.kind == ElementKind::Function {
            collector.push(
                "function.execute",
                "Execute function",
                BTreeMap::new(),
                CommandKind::Server,
            );
        }
    }

    fn execution_request(
        &self,
        element: &Element,
        command_id: &str,
        arguments: &BTreeMap<String, String>,
    ) -> Option<ExecutionRequest> {
        let ElementBody::Function(function) = &element.body else {
            return None;
        };
        if command_id != "function.execute" {
            return None;
        }

        let parameters = function
            .parameters
            .iter()
            .map(|parameter| {
                json!({
                    "name": parameter.name,
                    "type": parameter.ty.name(),
                    "multiplicity": parameter.multiplicity,
                })
            })
            .collect::<Vec<_>>();

        Some(execution_request(
            self.name(),
            element,
            command_id,
            arguments,
            json!({
                "function": element.path,
                "parameters": parameters,
                "returnType": function.return_type.name(),
                "returnMultiplicity": function.return_multiplicity,
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::IslandValue;
    use crate::location::Position;
    use crate::test_utils::snapshot_with;

    fn elements(text: &str) -> (Vec<Element>, Vec<RawDiagnostic>) {
        let snapshot = snapshot_with(&[("file:///t.pure", text)]);
        let document = snapshot.document("file:///t.pure").unwrap();
        let section = &document.sections()[0];
        (section.elements().to_vec(), section.raw_diagnostics().to_vec())
    }

    #[test]
    fn class_with_annotations_supertypes_and_properties() {
        let (elements, diagnostics) = elements(
            "Class <<meta::Doc.deprecated>> {meta::Doc.doc = 'x'} a::B extends a::C, a::D\n{\n  id: Integer[1];\n  tags: String[*];\n  other: a::E[0..1];\n}",
        );

        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        let element = &elements[0];
        assert_eq!(element.path, "a::B");
        assert_eq!(element.name(), "B");
        assert_eq!(element.package(), Some("a"));
        assert_eq!(element.stereotypes[0].value, "deprecated");
        assert_eq!(element.tagged_values[0].value, "x");

        let ElementBody::Class(class) = &element.body else {
            panic!("expected a class");
        };
        assert_eq!(
            class.super_types.iter().map(|p| p.path.as_str()).collect::<Vec<_>>(),
            vec!["a::C", "a::D"]
        );
        assert_eq!(class.properties.len(), 3);
        assert_eq!(class.properties[1].multiplicity, "*");
        assert_eq!(class.properties[2].multiplicity, "0..1");
        assert!(matches!(class.properties[0].ty, TypeValue::Primitive { .. }));
        assert!(matches!(class.properties[2].ty, TypeValue::Pointer(_)));
    }

    #[test]
    fn element_location_spans_keyword_to_closing_brace() {
        let (elements, _) = elements("\n\nEnum a::Kind\n{\n  A,\n  B\n}\n");

        let element = &elements[0];
        assert_eq!(element.kind, ElementKind::Enumeration);
        assert_eq!(element.location.interval.start(), Position::new(2, 0));
        assert_eq!(element.location.interval.end(), Position::new(6, 0));
        assert_eq!(element.name_location.interval.start(), Position::new(2, 5));
    }

    #[test]
    fn profile_entries() {
        let (elements, diagnostics) =
            elements("Profile meta::Doc\n{\n  stereotypes: [deprecated, legacy];\n  tags: [doc];\n}");

        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        let ElementBody::Profile(profile) = &elements[0].body else {
            panic!("expected a profile");
        };
        assert_eq!(profile.stereotypes.len(), 2);
        assert_eq!(profile.tags[0].name, "doc");
    }

    #[test]
    fn function_body_is_opaque_except_islands() {
        let (elements, diagnostics) = elements(
            "function a::people(limit: Integer[1]): a::Person[*]\n{\n  a::Person.all()->take($limit)->graphFetch(#{ a::Person { name } }#)\n}",
        );

        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        let ElementBody::Function(function) = &elements[0].body else {
            panic!("expected a function");
        };
        assert_eq!(function.parameters[0].name, "limit");
        assert_eq!(function.return_type.name(), "a::Person");
        assert_eq!(function.islands.len(), 1);
        assert!(matches!(
            function.islands[0].value,
            Some(IslandValue::GraphFetch(_))
        ));
    }

    #[test]
    fn unknown_island_tag_is_reported() {
        let (elements, diagnostics) =
            elements("function a::f(): String[1]\n{\n  #sql{ select 1 }#\n}");

        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("'#sql{'"));
        let ElementBody::Function(function) = &elements[0].body else {
            panic!("expected a function");
        };
        assert_eq!(function.islands[0].value, None);
    }

    #[test]
    fn parse_error_skips_to_next_element() {
        let (elements, diagnostics) = elements("Class a::A\n{\n  name String[1];\n}\nClass a::B {}");

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].message, "Unexpected 'String', expected ':'");
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].path, "a::B");
    }

    #[test]
    fn function_slots_are_parameters_return_then_islands() {
        let text = "function a::f(p: a::P[1], n: Integer[1]): a::R[1]\n{\n  #{ a::G { x } }#\n}";
        let snapshot = snapshot_with(&[("file:///t.pure", text)]);
        let document = snapshot.document("file:///t.pure").unwrap();
        let section = &document.sections()[0];

        let targets = crate::references::element_slots(&snapshot, section, &section.elements()[0])
            .map(|slot| slot.map(|reference| reference.target().to_string()))
            .collect::<Vec<_>>();

        assert_eq!(
            targets,
            vec![
                Some("type 'a::P'".to_string()),
                None,
                Some("type 'a::R'".to_string()),
                Some("class 'a::G'".to_string()),
            ]
        );
    }

    #[test]
    fn functions_offer_execution() {
        let text = "Class a::A {}\nfunction a::f(): String[1] { 'x' }";
        let snapshot = snapshot_with(&[("file:///t.pure", text)]);

        let commands = crate::commands::document_commands(&snapshot, &"file:///t.pure".into());

        let ids = commands
            .iter()
            .map(|c| (c.entity_id.as_str(), c.id.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(
            ids,
            vec![
                ("a::A", "element.copyPath"),
                ("a::f", "element.copyPath"),
                ("a::f", "function.execute"),
            ]
        );
    }
}
