use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use rayon::prelude::*;
use tracing::debug;

use super::document::{Document, Section};
use crate::{
    config::Settings,
    element::{Declaration, Element, ElementKind},
    extension::{DialectExtension, Extensions},
    location::{DocumentId, Location, Position},
    references::{ReferenceContext, Resolver},
    registry::{Capability, Implementing},
};

/// An immutable view of the whole workspace. Requests work on a snapshot;
/// edits produce a new one.
#[derive(Clone)]
pub struct WorkspaceSnapshot {
    extensions: Arc<Extensions>,
    settings: Arc<Settings>,
    documents: BTreeMap<DocumentId, Arc<Document>>,
    /// First definition of every path, per kind, in document order.
    declarations: HashMap<ElementKind, BTreeMap<String, Declaration>>,
}

impl WorkspaceSnapshot {
    pub fn new(extensions: Arc<Extensions>, settings: Arc<Settings>) -> WorkspaceSnapshot {
        WorkspaceSnapshot {
            extensions,
            settings,
            documents: BTreeMap::new(),
            declarations: HashMap::new(),
        }
    }

    /// Parses `text` and returns a snapshot where it replaces any document
    /// with the same id.
    pub fn with_document(&self, id: DocumentId, text: impl Into<String>) -> WorkspaceSnapshot {
        let document = Document::build(
            id.clone(),
            text,
            &self.extensions,
            &self.settings.default_dialect,
        );

        let mut documents = self.documents.clone();
        documents.insert(id, Arc::new(document));
        self.replace_documents(documents)
    }

    /// Adds many documents at once, parsing them in parallel.
    pub fn with_documents(&self, texts: Vec<(DocumentId, String)>) -> WorkspaceSnapshot {
        let built = texts
            .into_par_iter()
            .map(|(id, text)| {
                let document = Document::build(
                    id.clone(),
                    text,
                    &self.extensions,
                    &self.settings.default_dialect,
                );
                (id, Arc::new(document))
            })
            .collect::<Vec<_>>();

        let mut documents = self.documents.clone();
        documents.extend(built);
        self.replace_documents(documents)
    }

    /// `None` when no document has this id.
    pub fn without_document(&self, id: &DocumentId) -> Option<WorkspaceSnapshot> {
        let mut documents = self.documents.clone();
        documents.remove(id)?;
        Some(self.replace_documents(documents))
    }

    /// An empty snapshot over the same registries and settings.
    pub fn cleared(&self) -> WorkspaceSnapshot {
        WorkspaceSnapshot::new(self.extensions.clone(), self.settings.clone())
    }

    fn replace_documents(&self, documents: BTreeMap<DocumentId, Arc<Document>>) -> WorkspaceSnapshot {
        let mut declarations: HashMap<ElementKind, BTreeMap<String, Declaration>> = HashMap::new();
        for element in documents.values().flat_map(|document| document.elements()) {
            declarations
                .entry(element.kind)
                .or_default()
                .entry(element.path.clone())
                .or_insert_with(|| element.declaration());
        }

        WorkspaceSnapshot {
            extensions: self.extensions.clone(),
            settings: self.settings.clone(),
            documents,
            declarations,
        }
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn reference_context(&self) -> ReferenceContext<'_> {
        ReferenceContext {
            extensions: &self.extensions,
        }
    }

    pub fn document(&self, id: &str) -> Option<&Document> {
        self.documents.get(id).map(Arc::as_ref)
    }

    /// In id order.
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values().map(Arc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn section_at(&self, document: &DocumentId, position: Position) -> Option<(&Document, &Section)> {
        let document = self.document(document.as_str())?;
        let section = document.section_at(position)?;
        Some((document, section))
    }

    /// The element whose location contains `position`.
    pub fn element_at(&self, document: &DocumentId, position: Position) -> Option<(&Section, &Element)> {
        let (_, section) = self.section_at(document, position)?;
        section
            .elements()
            .iter()
            .find(|element| element.location.contains(document, position))
            .map(|element| (section, element))
    }

    /// The element whose full location is `location`.
    pub fn element_declared_at(&self, location: &Location) -> Option<&Element> {
        let (_, element) = self.element_at(&location.document, location.interval.start())?;
        (element.location == *location).then_some(element)
    }

    pub fn first_definition(&self, kind: ElementKind, path: &str) -> Option<&Declaration> {
        self.declarations.get(&kind)?.get(path)
    }

    /// Every declared path of the given kinds, with its declaration. Kinds
    /// come in the order given, paths in lexical order within a kind.
    pub fn declarations_of<'a>(
        &'a self,
        kinds: &'a [ElementKind],
    ) -> impl Iterator<Item = (ElementKind, &'a str, &'a Declaration)> + 'a {
        kinds.iter().flat_map(move |&kind| {
            self.declarations
                .get(&kind)
                .into_iter()
                .flat_map(move |paths| paths.iter().map(move |(path, d)| (kind, path.as_str(), d)))
        })
    }

    /// Dialect handlers implementing `C`, in registration order.
    pub fn find_handler_implementing<C>(&self) -> Implementing<'_, dyn DialectExtension, C>
    where
        C: Capability<dyn DialectExtension> + ?Sized,
    {
        self.extensions.dialects.implementing::<C>()
    }
}

impl Resolver for WorkspaceSnapshot {
    fn resolve(&self, path: &str, kind: ElementKind, location: &Location) -> Option<Declaration> {
        let declaration = self.first_definition(kind, path).cloned();
        if declaration.is_none() {
            debug!(%path, kind = kind.describe(), usage = %location, "unresolved pointer");
        }
        declaration
    }
}
