use std::collections::BTreeMap;

use serde_json::json;

use super::{copy_path_command, cursor::TokenCursor, execution_request, lexer::Token, parse_elements};
use crate::{
    commands::{CommandCollector, CommandKind, CommandProducer, ExecutionRequest},
    completion::{Completion, CompletionProducer},
    diagnostics::RawDiagnostic,
    element::{Column, DatabaseBody, Element, ElementBody, ElementKind, Table},
    extension::{DialectExtension, ParseOutput, SectionSource},
    registry::Extension,
    workspace::Section,
};

const KEYWORDS: &[&str] = &[
    "Database", "Table", "INTEGER", "BIGINT", "VARCHAR", "CHAR", "DATE", "TIMESTAMP", "DOUBLE",
    "BIT",
];

/// `###Relational`: database schemas. Databases are stores other dialects
/// point at; they reference nothing themselves.
pub struct RelationalDialect;

impl Extension for RelationalDialect {
    fn name(&self) -> &str {
        "Relational"
    }
}

impl DialectExtension for RelationalDialect {
    fn keywords(&self) -> &'static [&'static str] {
        KEYWORDS
    }

    fn parse(&self, source: &SectionSource<'_>) -> ParseOutput {
        parse_elements(source, &["Database"], |cursor, _| parse_database(cursor, source))
    }

    fn completion_producer(&self) -> Option<&(dyn CompletionProducer + 'static)> {
        Some(self)
    }

    fn command_producer(&self) -> Option<&(dyn CommandProducer + 'static)> {
        Some(self)
    }
}

fn parse_database(
    cursor: &mut TokenCursor<'_>,
    source: &SectionSource<'_>,
) -> Result<Element, RawDiagnostic> {
    let keyword = cursor.expect_keyword("Database")?;
    let (path, name_span) = cursor.expect_path("a database path")?;
    cursor.expect(Token::LParen)?;

    let mut tables = Vec::new();
    while cursor.eat(Token::RParen).is_none() {
        let start = cursor.expect_keyword("Table")?.start;
        let (name, _) = cursor.expect_path("a table name")?;
        cursor.expect(Token::LParen)?;

        let mut columns = Vec::new();
        while cursor.eat(Token::RParen).is_none() {
            columns.push(parse_column(cursor, source)?);
            if cursor.eat(Token::Comma).is_none() {
                cursor.expect(Token::RParen)?;
                break;
            }
        }

        tables.push(Table {
            name: name.to_string(),
            location: source.location(start..cursor.previous_end()),
            columns,
        });
    }

    Ok(Element {
        path: path.to_string(),
        kind: ElementKind::Store,
        location: source.location(keyword.start..cursor.previous_end()),
        name_location: source.location(name_span),
        stereotypes: Vec::new(),
        tagged_values: Vec::new(),
        body: ElementBody::Database(DatabaseBody { tables }),
    })
}

/// `name TYPE` or `name TYPE(size)`
fn parse_column(
    cursor: &mut TokenCursor<'_>,
    source: &SectionSource<'_>,
) -> Result<Column, RawDiagnostic> {
    let (name, span) = cursor.expect_path("a column name")?;
    let (data_type, _) = cursor.expect_path("a column type")?;
    let mut data_type = data_type.to_string();

    if cursor.eat(Token::LParen).is_some() {
        let size = cursor.expect(Token::Number)?;
        cursor.expect(Token::RParen)?;
        data_type = format!("{data_type}({})", cursor.text(&size));
    }

    Ok(Column {
        name: name.to_string(),
        data_type,
        location: source.location(span.start..cursor.previous_end()),
    })
}

impl CompletionProducer for RelationalDialect {
    fn boilerplate(&self) -> Vec<Completion> {
        vec![Completion::snippet(
            "Database",
            "Database ${1:store::Name}\n(\n  Table ${2:name}\n  (\n    ${3:id} INTEGER\n  )\n)",
            "database schema",
        )]
    }

    fn path_trigger(&self, _line_prefix: &str) -> Option<&'static [ElementKind]> {
        None
    }
}

impl CommandProducer for RelationalDialect {
    fn command_ids(&self) -> &'static [&'static str] {
        &["element.copyPath", "database.introspect"]
    }

    fn collect_commands(&self, _section: &Section, element: &Element, collector: &mut CommandCollector) {
        copy_path_command(element, collector);
        collector.push(
            "database.introspect",
            "Introspect database",
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
        let ElementBody::Database(database) = &element.body else {
            return None;
        };
        if command_id != "database.introspect" {
            return None;
        }

        let tables = database
            .tables
            .iter()
            .map(|table| {
                json!({
                    "name": table.name,
                    "columns": table
                        .columns
                        .iter()
                        .map(|column| json!({ "name": column.name, "type": column.data_type }))
                        .collect::<Vec<_>>(),
                })
            })
            .collect::<Vec<_>>();

        Some(execution_request(
            self.name(),
            element,
            command_id,
            arguments,
            json!({ "database": element.path, "tables": tables }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::references::element_slots;
    use crate::test_utils::snapshot_with;

    const DATABASE: &str = "\
###Relational
Database store::Db
(
  Table person
  (
    id INTEGER,
    name VARCHAR(200)
  )
  Table firm (id INTEGER)
)
";

    #[test]
    fn tables_and_columns() {
        let snapshot = snapshot_with(&[("file:///db.pure", DATABASE)]);
        let section = &snapshot.document("file:///db.pure").unwrap().sections()[0];

        assert!(section.raw_diagnostics().is_empty(), "{:?}", section.raw_diagnostics());
        let element = &section.elements()[0];
        assert_eq!(element.kind, ElementKind::Store);

        let ElementBody::Database(database) = &element.body else {
            panic!("expected a database");
        };
        assert_eq!(database.tables.len(), 2);
        assert_eq!(database.tables[0].columns[1].data_type, "VARCHAR(200)");
        assert_eq!(database.tables[1].name, "firm");
    }

    #[test]
    fn databases_have_no_reference_sites() {
        let snapshot = snapshot_with(&[("file:///db.pure", DATABASE)]);
        let section = &snapshot.document("file:///db.pure").unwrap().sections()[0];

        assert_eq!(element_slots(&snapshot, section, &section.elements()[0]).count(), 0);
    }

    #[test]
    fn introspection_payload_lists_tables() {
        let snapshot = snapshot_with(&[("file:///db.pure", DATABASE)]);
        let element = snapshot.document("file:///db.pure").unwrap().elements().next().unwrap();

        let request = RelationalDialect
            .execution_request(element, "database.introspect", &BTreeMap::new())
            .unwrap();

        assert_eq!(request.dialect, "Relational");
        assert_eq!(request.payload["database"], "store::Db");
        assert_eq!(request.payload["tables"][0]["columns"][1]["type"], "VARCHAR(200)");
        assert!(RelationalDialect
            .execution_request(element, "element.copyPath", &BTreeMap::new())
            .is_none());
    }
}
