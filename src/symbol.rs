//! Document outline and workspace-wide symbol search.
//!
//! The outline has one symbol per section with its elements as children;
//! class properties, enumeration values and database tables are nested one
//! level further. Workspace search ranks every declared element with
//! [`nucleo_matcher`].

use itertools::Itertools;
use nucleo_matcher::{
    pattern::{CaseMatching, Normalization, Pattern},
    Matcher, Utf32Str,
};
use serde::Serialize;

use crate::{
    config::Case,
    element::{Element, ElementBody, ElementKind},
    location::{DocumentId, Location},
    workspace::{Section, WorkspaceSnapshot},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SymbolKind {
    Section,
    Element(ElementKind),
    Member,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub detail: Option<String>,
    pub location: Location,
    pub selection: Location,
    pub children: Vec<Symbol>,
}

pub fn document_symbols(snapshot: &WorkspaceSnapshot, document: &DocumentId) -> Vec<Symbol> {
    let Some(document) = snapshot.document(document.as_str()) else {
        return vec![];
    };

    document.sections().iter().map(section_symbol).collect()
}

fn section_symbol(section: &Section) -> Symbol {
    Symbol {
        name: format!("###{}", section.dialect()),
        kind: SymbolKind::Section,
        detail: section.handler().is_none().then(|| "unknown dialect".to_string()),
        location: section.location().clone(),
        selection: section.location().clone(),
        children: section.elements().iter().map(element_symbol).collect(),
    }
}

fn element_symbol(element: &Element) -> Symbol {
    let members = match &element.body {
        ElementBody::Class(class) => class
            .properties
            .iter()
            .map(|property| member(&property.name, Some(property.ty.name()), &property.location))
            .collect(),
        ElementBody::Enumeration(enumeration) => enumeration
            .values
            .iter()
            .map(|value| member(&value.name, None, &value.location))
            .collect(),
        ElementBody::Database(database) => database
            .tables
            .iter()
            .map(|table| member(&table.name, Some("table"), &table.location))
            .collect(),
        _ => Vec::new(),
    };

    Symbol {
        name: element.path.clone(),
        kind: SymbolKind::Element(element.kind),
        detail: Some(element.kind.classifier().to_string()),
        location: element.location.clone(),
        selection: element.name_location.clone(),
        children: members,
    }
}

fn member(name: &str, detail: Option<&str>, location: &Location) -> Symbol {
    Symbol {
        name: name.to_string(),
        kind: SymbolKind::Member,
        detail: detail.map(str::to_string),
        location: location.clone(),
        selection: location.clone(),
        children: Vec::new(),
    }
}

/// Declared elements matching `query`, best match first. Ties keep
/// document order.
pub fn workspace_symbols(snapshot: &WorkspaceSnapshot, query: &str) -> Vec<Symbol> {
    let mut matcher = Matcher::new(nucleo_matcher::Config::DEFAULT);
    let pattern = Pattern::parse(
        query,
        case_matching(snapshot.settings().case_matching),
        Normalization::Smart,
    );
    let mut buf = Vec::new();

    snapshot
        .documents()
        .flat_map(|document| document.elements())
        .filter_map(|element| {
            let score = pattern.score(Utf32Str::new(&element.path, &mut buf), &mut matcher)?;
            Some((score, element))
        })
        .sorted_by(|(a, _), (b, _)| Ord::cmp(b, a))
        .map(|(_, element)| Symbol {
            children: Vec::new(),
            ..element_symbol(element)
        })
        .collect()
}

fn case_matching(case: Case) -> CaseMatching {
    match case {
        Case::Ignore => CaseMatching::Ignore,
        Case::Smart => CaseMatching::Smart,
        Case::Respect => CaseMatching::Respect,
    }
}
