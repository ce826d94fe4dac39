//! Built-in dialect handlers.
//!
//! They stand in for the external compilers of each dialect and are
//! registered through the same [`PluginSource`] interface a host would use.
//! All of them share one tokenizer and a small recursive-descent toolkit.

mod connection;
mod cursor;
mod inline;
mod lexer;
mod mapping;
mod pure;
mod relational;
mod runtime;

pub use connection::ConnectionDialect;
pub use inline::{GraphFetchDialect, StoreAccessorDialect};
pub use mapping::MappingDialect;
pub use pure::PureDialect;
pub use relational::RelationalDialect;
pub use runtime::RuntimeDialect;

use std::{collections::BTreeMap, ops::Range, sync::Arc};

use itertools::Itertools;

use self::{cursor::TokenCursor, lexer::Token};
use crate::{
    commands::{CommandCollector, CommandKind, ExecutionRequest},
    config::Settings,
    diagnostics::RawDiagnostic,
    element::{Element, ElementPointer, Island, StereotypePointer, TaggedValue},
    extension::{DialectExtension, Extensions, InlineDialectExtension, ParseOutput, SectionSource},
    registry::{Extension, PluginSource, RegistryError},
};

/// Every built-in dialect not listed in `disabled_dialects`.
pub struct BuiltinDialects {
    disabled: Vec<String>,
}

impl BuiltinDialects {
    pub fn new(settings: &Settings) -> BuiltinDialects {
        BuiltinDialects {
            disabled: settings.disabled_dialects.clone(),
        }
    }
}

impl PluginSource<dyn DialectExtension> for BuiltinDialects {
    fn describe(&self) -> String {
        "built-in dialects".to_string()
    }

    fn candidates(&self) -> anyhow::Result<Vec<Arc<dyn DialectExtension>>> {
        let all: Vec<Arc<dyn DialectExtension>> = vec![
            Arc::new(PureDialect),
            Arc::new(MappingDialect),
            Arc::new(ConnectionDialect),
            Arc::new(RuntimeDialect),
            Arc::new(RelationalDialect),
        ];
        Ok(enabled(all, &self.disabled))
    }
}

pub struct BuiltinInlineDialects {
    disabled: Vec<String>,
}

impl BuiltinInlineDialects {
    pub fn new(settings: &Settings) -> BuiltinInlineDialects {
        BuiltinInlineDialects {
            disabled: settings.disabled_dialects.clone(),
        }
    }
}

impl PluginSource<dyn InlineDialectExtension> for BuiltinInlineDialects {
    fn describe(&self) -> String {
        "built-in inline dialects".to_string()
    }

    fn candidates(&self) -> anyhow::Result<Vec<Arc<dyn InlineDialectExtension>>> {
        let all: Vec<Arc<dyn InlineDialectExtension>> =
            vec![Arc::new(GraphFetchDialect), Arc::new(StoreAccessorDialect)];
        Ok(enabled(all, &self.disabled))
    }
}

fn enabled<E: Extension + ?Sized>(all: Vec<Arc<E>>, disabled: &[String]) -> Vec<Arc<E>> {
    all.into_iter()
        .filter(|extension| !disabled.iter().any(|name| name == extension.name()))
        .collect()
}

/// Both registries, filled with the built-in handlers.
pub fn builtin_extensions(settings: &Settings) -> Result<Extensions, RegistryError> {
    Extensions::discover(
        &BuiltinDialects::new(settings),
        &BuiltinInlineDialects::new(settings),
    )
}

/// Parses a section made of elements that each start with one of
/// `element_keywords`. A failed element is reported and skipped.
fn parse_elements<'a>(
    source: &SectionSource<'a>,
    element_keywords: &[&str],
    mut element: impl FnMut(&mut TokenCursor<'a>, &mut Vec<RawDiagnostic>) -> Result<Element, RawDiagnostic>,
) -> ParseOutput {
    let mut cursor = TokenCursor::new(source.text());
    let mut output = ParseOutput::default();

    while !cursor.is_at_end() {
        if !cursor.at_any_keyword(element_keywords) {
            let expected = element_keywords.iter().map(|k| format!("'{k}'")).join(", ");
            output
                .diagnostics
                .push(cursor.unexpected(&format!("one of {expected}")));
            cursor.recover(element_keywords);
            continue;
        }

        match element(&mut cursor, &mut output.diagnostics) {
            Ok(element) => output.elements.push(element),
            Err(diagnostic) => {
                output.diagnostics.push(diagnostic);
                cursor.recover(element_keywords);
            }
        }
    }

    output
}

/// `<<profile.value, ...>>`, if present.
fn parse_stereotypes(
    cursor: &mut TokenCursor<'_>,
    source: &SectionSource<'_>,
) -> Result<Vec<StereotypePointer>, RawDiagnostic> {
    let mut stereotypes = Vec::new();
    if cursor.eat(Token::StereotypeOpen).is_none() {
        return Ok(stereotypes);
    }

    loop {
        let (profile, start) = profile_pointer(cursor, source)?;
        cursor.expect(Token::Dot)?;
        let (value, _) = cursor.expect_path("a stereotype name")?;

        stereotypes.push(StereotypePointer {
            profile,
            value: value.to_string(),
            location: source.location(start..cursor.previous_end()),
        });

        if cursor.eat(Token::Comma).is_none() {
            break;
        }
    }

    cursor.expect(Token::StereotypeClose)?;
    Ok(stereotypes)
}

/// `{profile.tag = 'value', ...}`, if present.
fn parse_tagged_values(
    cursor: &mut TokenCursor<'_>,
    source: &SectionSource<'_>,
) -> Result<Vec<TaggedValue>, RawDiagnostic> {
    let mut tagged_values = Vec::new();
    if cursor.eat(Token::LBrace).is_none() {
        return Ok(tagged_values);
    }

    loop {
        let (profile, start) = profile_pointer(cursor, source)?;
        cursor.expect(Token::Dot)?;
        let (tag, _) = cursor.expect_path("a tag name")?;
        cursor.expect(Token::Equals)?;
        let value = cursor.expect_string()?;

        tagged_values.push(TaggedValue {
            profile,
            tag: tag.to_string(),
            value: value.to_string(),
            location: source.location(start..cursor.previous_end()),
        });

        if cursor.eat(Token::Comma).is_none() {
            break;
        }
    }

    cursor.expect(Token::RBrace)?;
    Ok(tagged_values)
}

/// The profile of a stereotype or tagged value, and where it starts.
fn profile_pointer(
    cursor: &mut TokenCursor<'_>,
    source: &SectionSource<'_>,
) -> Result<(ElementPointer, usize), RawDiagnostic> {
    let (path, span) = cursor.expect_path("a profile path")?;
    let start = span.start;
    let pointer = ElementPointer {
        path: path.to_string(),
        location: source.location(span),
    };
    Ok((pointer, start))
}

/// `[a::b, c::d]`, possibly empty.
fn parse_pointer_list(
    cursor: &mut TokenCursor<'_>,
    source: &SectionSource<'_>,
    expected: &str,
) -> Result<Vec<ElementPointer>, RawDiagnostic> {
    cursor.expect(Token::LBracket)?;
    let mut pointers = Vec::new();
    if cursor.eat(Token::RBracket).is_some() {
        return Ok(pointers);
    }

    loop {
        pointers.push(cursor.expect_pointer(source, expected)?);
        if cursor.eat(Token::Comma).is_none() {
            break;
        }
    }

    cursor.expect(Token::RBracket)?;
    Ok(pointers)
}

/// The rest of a `{ ... }` body whose opening brace was consumed. The body
/// itself is opaque; only islands are picked out of it.
fn scan_body(
    cursor: &mut TokenCursor<'_>,
    source: &SectionSource<'_>,
    diagnostics: &mut Vec<RawDiagnostic>,
) -> Result<Vec<Island>, RawDiagnostic> {
    let mut depth = 1;
    let mut islands = Vec::new();

    while let Some((token, span)) = cursor.bump() {
        match token {
            Token::LBrace => depth += 1,
            Token::RBrace => {
                depth -= 1;
                if depth == 0 {
                    return Ok(islands);
                }
            }
            Token::IslandOpen => islands.push(parse_island(cursor, source, span, diagnostics)?),
            _ => {}
        }
    }

    Err(cursor.unexpected(Token::RBrace.describe()))
}

/// An island whose opening token spans `open`, handed to the inline dialect
/// registered for its tag.
fn parse_island(
    cursor: &mut TokenCursor<'_>,
    source: &SectionSource<'_>,
    open: Range<usize>,
    diagnostics: &mut Vec<RawDiagnostic>,
) -> Result<Island, RawDiagnostic> {
    let (tag, content, end) = island_content(cursor, open.clone())?;

    let value = match source.inline_dialect(tag) {
        Some(dialect) => match dialect.parse_island(source, content.clone()) {
            Ok(value) => Some(value),
            Err(diagnostic) => {
                diagnostics.push(diagnostic);
                None
            }
        },
        None => {
            diagnostics.push(RawDiagnostic::parser_error(
                open.clone(),
                format!("No inline dialect handles '#{tag}{{' islands"),
            ));
            None
        }
    };

    Ok(Island {
        tag: tag.to_string(),
        location: source.location(open.start..end),
        content_location: source.location(content),
        value,
    })
}

/// Skips to the `}#` closing an island. Returns the tag, the content span
/// and the end of the closing token.
fn island_content<'a>(
    cursor: &mut TokenCursor<'a>,
    open: Range<usize>,
) -> Result<(&'a str, Range<usize>, usize), RawDiagnostic> {
    let opening = cursor.text(&open);
    let tag = &opening[1..opening.len() - 1];

    loop {
        match cursor.bump() {
            Some((Token::IslandClose, close)) => return Ok((tag, open.end..close.start, close.end)),
            Some(_) => {}
            None => {
                return Err(RawDiagnostic::parser_error(
                    open,
                    "Unterminated island, expected '}#'",
                ))
            }
        }
    }
}

fn copy_path_command(element: &Element, collector: &mut CommandCollector) {
    collector.push(
        "element.copyPath",
        "Copy path",
        BTreeMap::from([("path".to_string(), element.path.clone())]),
        CommandKind::Client,
    );
}

fn execution_request(
    dialect: &str,
    element: &Element,
    command_id: &str,
    arguments: &BTreeMap<String, String>,
    payload: serde_json::Value,
) -> ExecutionRequest {
    ExecutionRequest {
        dialect: dialect.to_string(),
        entity_id: element.path.clone(),
        command_id: command_id.to_string(),
        location: element.location.clone(),
        arguments: arguments.clone(),
        payload,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_dialects_are_not_registered() {
        let settings = Settings {
            disabled_dialects: vec!["Relational".to_string(), "StoreAccessor".to_string()],
            ..Settings::default()
        };

        let extensions = builtin_extensions(&settings).unwrap();

        assert_eq!(
            extensions.dialects.names().collect_vec(),
            vec!["Pure", "Mapping", "Connection", "Runtime"]
        );
        assert_eq!(extensions.inline.names().collect_vec(), vec!["GraphFetch"]);
    }

    #[test]
    fn builtin_names_are_unique() {
        let extensions = builtin_extensions(&Settings::default()).unwrap();

        assert_eq!(extensions.dialects.len(), 5);
        assert_eq!(extensions.inline.len(), 2);
    }
}
