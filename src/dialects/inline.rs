//! Inline dialects, parsed out of islands in function and derived property
//! bodies.

use std::{iter, ops::Range};

use super::{cursor::TokenCursor, lexer::Token};
use crate::{
    diagnostics::RawDiagnostic,
    element::{
        ElementKind, ElementPointer, GraphFetchProperty, GraphFetchTree, IslandValue, Named,
        StoreAccessor,
    },
    extension::{InlineDialectExtension, SectionSource},
    references::{no_slots, LazyReference, ReferenceSlots},
    registry::Extension,
};

fn island_cursor<'a>(source: &SectionSource<'a>, content: &Range<usize>) -> TokenCursor<'a> {
    TokenCursor::with_base(&source.text()[content.clone()], content.start)
}

fn expect_end(cursor: &TokenCursor<'_>) -> Result<(), RawDiagnostic> {
    if cursor.is_at_end() {
        Ok(())
    } else {
        Err(cursor.unexpected(Token::IslandClose.describe()))
    }
}

/// `#{ a::Person { name, firm { legalName } } }#`
pub struct GraphFetchDialect;

impl Extension for GraphFetchDialect {
    fn name(&self) -> &str {
        "GraphFetch"
    }
}

impl InlineDialectExtension for GraphFetchDialect {
    fn island_tag(&self) -> &str {
        ""
    }

    fn parse_island(
        &self,
        source: &SectionSource<'_>,
        content: Range<usize>,
    ) -> Result<IslandValue, RawDiagnostic> {
        let mut cursor = island_cursor(source, &content);
        let root = cursor.expect_pointer(source, "a class path")?;
        cursor.expect(Token::LBrace)?;
        let properties = parse_properties(&mut cursor, source)?;
        expect_end(&cursor)?;

        Ok(IslandValue::GraphFetch(GraphFetchTree { root, properties }))
    }

    fn references<'a>(&'a self, value: &'a IslandValue) -> ReferenceSlots<'a> {
        match value {
            IslandValue::GraphFetch(tree) => Box::new(iter::once(Some(LazyReference::to_pointer(
                &tree.root,
                &[ElementKind::Class],
            )))),
            _ => no_slots(),
        }
    }
}

/// Properties up to and including the `}` closing an already consumed `{`.
fn parse_properties(
    cursor: &mut TokenCursor<'_>,
    source: &SectionSource<'_>,
) -> Result<Vec<GraphFetchProperty>, RawDiagnostic> {
    let mut properties = Vec::new();

    while cursor.eat(Token::RBrace).is_none() {
        let (name, span) = cursor.expect_path("a property name or '}'")?;
        let children = match cursor.eat(Token::LBrace) {
            Some(_) => parse_properties(cursor, source)?,
            None => Vec::new(),
        };

        properties.push(GraphFetchProperty {
            name: name.to_string(),
            location: source.location(span.start..cursor.previous_end()),
            children,
        });

        if cursor.eat(Token::Comma).is_none() {
            cursor.expect(Token::RBrace)?;
            break;
        }
    }

    Ok(properties)
}

/// `#>{ a::Db.person }#`
pub struct StoreAccessorDialect;

impl Extension for StoreAccessorDialect {
    fn name(&self) -> &str {
        "StoreAccessor"
    }
}

impl InlineDialectExtension for StoreAccessorDialect {
    fn island_tag(&self) -> &str {
        ">"
    }

    fn parse_island(
        &self,
        source: &SectionSource<'_>,
        content: Range<usize>,
    ) -> Result<IslandValue, RawDiagnostic> {
        let mut cursor = island_cursor(source, &content);
        let (path, span) = cursor.expect_path("a store path")?;
        let start = span.start;
        let store = ElementPointer {
            path: path.to_string(),
            location: source.location(span),
        };

        let table = match cursor.eat(Token::Dot) {
            Some(_) => {
                let (name, span) = cursor.expect_path("a table name")?;
                Some(Named {
                    name: name.to_string(),
                    location: source.location(span),
                })
            }
            None => None,
        };
        let location = source.location(start..cursor.previous_end());
        expect_end(&cursor)?;

        Ok(IslandValue::StoreAccessor(StoreAccessor {
            store,
            table,
            location,
        }))
    }

    fn references<'a>(&'a self, value: &'a IslandValue) -> ReferenceSlots<'a> {
        let IslandValue::StoreAccessor(accessor) = value else {
            return no_slots();
        };

        let reference = LazyReference::new(
            accessor.location.clone(),
            format!("store '{}'", accessor.store.path),
            move |resolver| {
                resolver.resolve(&accessor.store.path, ElementKind::Store, &accessor.location)
            },
        )
        .with_core_location(accessor.store.location.clone());

        Box::new(iter::once(Some(reference)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{ElementBody, Island};
    use crate::location::Position;
    use crate::references::goto_definition;
    use crate::test_utils::{position_of, snapshot_with};

    const FUNCTION: &str = "\
function a::people(): a::Person[*]
{
  a::Person.all()
    ->graphFetch(#{ a::Person { name, firm { legalName, size } } }#)
    ->from(#>{ store::Db.person }#)
}
";

    const STORE: &str = "###Relational\nDatabase store::Db ( Table person ( id INTEGER ) )\n";

    fn islands(snapshot: &crate::workspace::WorkspaceSnapshot) -> Vec<Island> {
        let element = snapshot.document("file:///f.pure").unwrap().elements().next().unwrap();
        let ElementBody::Function(function) = &element.body else {
            panic!("expected a function");
        };
        function.islands.clone()
    }

    #[test]
    fn graph_fetch_tree_is_nested() {
        let snapshot = snapshot_with(&[("file:///f.pure", FUNCTION)]);

        let islands = islands(&snapshot);
        let Some(IslandValue::GraphFetch(tree)) = &islands[0].value else {
            panic!("expected a graph fetch tree");
        };
        assert_eq!(tree.root.path, "a::Person");
        assert_eq!(tree.properties.len(), 2);
        assert_eq!(tree.properties[1].name, "firm");
        assert_eq!(tree.properties[1].children.len(), 2);
        assert_eq!(islands[0].location.interval.start(), Position::new(3, 17));
    }

    #[test]
    fn store_accessor_reference_highlights_store_path() {
        let snapshot = snapshot_with(&[("file:///f.pure", FUNCTION), ("file:///s.pure", STORE)]);

        let islands = islands(&snapshot);
        let Some(IslandValue::StoreAccessor(accessor)) = &islands[1].value else {
            panic!("expected a store accessor");
        };
        assert_eq!(accessor.table.as_ref().unwrap().name, "person");

        let reference = goto_definition(
            &snapshot,
            &"file:///f.pure".into(),
            position_of(FUNCTION, "person }#"),
        )
        .unwrap();

        assert_eq!(reference.declaration().document.as_str(), "file:///s.pure");
        let start = position_of(FUNCTION, "store::Db");
        assert_eq!(reference.location().interval.start(), start);
        let core = reference.core_location().unwrap();
        assert_eq!(core.interval.start(), start);
        assert_eq!(core.interval.end(), Position::new(start.line, start.column + 8));
    }

    #[test]
    fn malformed_island_has_no_value() {
        let text = "function a::f(): String[1]\n{\n  #{ a::Person { name, } extra }#\n}\n";
        let snapshot = snapshot_with(&[("file:///f.pure", text)]);
        let section = &snapshot.document("file:///f.pure").unwrap().sections()[0];

        assert_eq!(islands(&snapshot)[0].value, None);
        assert_eq!(section.raw_diagnostics().len(), 1);
    }
}
