//! Reference resolution.
//!
//! A handler does not resolve references while it walks an element. For each
//! syntactic site that may point somewhere it yields one *slot*: either
//! `None` (the site cannot reference anything, e.g. a primitive type) or a
//! [`LazyReference`] that knows where it sits and how to find its target.
//! Slots come out in source order: stereotypes, tagged values, structural
//! pointers, then nested content.
//!
//! A [`LazyReference`] only touches the workspace when
//! [`resolve`](LazyReference::resolve) is called with a [`Resolver`]. A path
//! that names nothing resolves to `None`; a [`Reference`] always carries its
//! declaration location.
//!
//! Values owned by another dialect are delegated through the registry:
//! runtime connections go to every [`ConnectionReferenceProducer`], islands
//! to every inline dialect. When nobody claims the value the slot is absent.

use std::{fmt, iter};

use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::{
    element::{
        Connection, ConnectionValue, Declaration, Element, ElementKind, ElementPointer, Island,
    },
    extension::Extensions,
    location::{DocumentId, Located, Location, Position},
    workspace::{Section, WorkspaceSnapshot},
};

/// Workspace-wide lookup from a path and kind to a declaration.
pub trait Resolver {
    /// `location` is the usage site, for tracing only.
    fn resolve(&self, path: &str, kind: ElementKind, location: &Location) -> Option<Declaration>;

    /// First kind of `kinds`, in order, that has an element at `path`.
    fn resolve_any(
        &self,
        path: &str,
        kinds: &[ElementKind],
        location: &Location,
    ) -> Option<Declaration> {
        kinds
            .iter()
            .find_map(|&kind| self.resolve(path, kind, location))
    }
}

/// A link from a usage site to a declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Reference {
    location: Location,
    core_location: Option<Location>,
    declaration: Location,
}

impl Reference {
    pub fn new(
        location: Location,
        core_location: Option<Location>,
        declaration: Location,
    ) -> Reference {
        Reference {
            location,
            core_location,
            declaration,
        }
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Narrower span to highlight, when the site is wider than the path.
    pub fn core_location(&self) -> Option<&Location> {
        self.core_location.as_ref()
    }

    pub fn declaration(&self) -> &Location {
        &self.declaration
    }
}

type Resolution<'a> = Box<dyn FnOnce(&dyn Resolver) -> Option<Declaration> + 'a>;

/// A reference site whose target is looked up on demand.
pub struct LazyReference<'a> {
    location: Location,
    core_location: Option<Location>,
    target: String,
    resolution: Resolution<'a>,
}

impl<'a> LazyReference<'a> {
    /// `target` describes what the site points at, for messages.
    pub fn new(
        location: Location,
        target: impl Into<String>,
        resolution: impl FnOnce(&dyn Resolver) -> Option<Declaration> + 'a,
    ) -> LazyReference<'a> {
        LazyReference {
            location,
            core_location: None,
            target: target.into(),
            resolution: Box::new(resolution),
        }
    }

    /// A site resolving `pointer` against the first matching kind of `kinds`.
    pub fn to_pointer(pointer: &'a ElementPointer, kinds: &'static [ElementKind]) -> Self {
        LazyReference::new(
            pointer.location.clone(),
            format!("{} '{}'", describe_kinds(kinds), pointer.path),
            move |resolver| resolver.resolve_any(&pointer.path, kinds, &pointer.location),
        )
    }

    pub fn with_core_location(mut self, core_location: Location) -> Self {
        self.core_location = Some(core_location);
        self
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn core_location(&self) -> Option<&Location> {
        self.core_location.as_ref()
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn resolve(self, resolver: &dyn Resolver) -> Option<Reference> {
        let declaration = (self.resolution)(resolver)?;
        Some(Reference::new(
            self.location,
            self.core_location,
            declaration.location,
        ))
    }
}

impl fmt::Debug for LazyReference<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyReference")
            .field("location", &self.location)
            .field("core_location", &self.core_location)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

fn describe_kinds(kinds: &[ElementKind]) -> &'static str {
    match kinds {
        [single] => single.describe(),
        kinds if kinds == ElementKind::TYPES => "type",
        _ => "element",
    }
}

/// One entry per reference site, in source order.
pub type ReferenceSlots<'a> = Box<dyn Iterator<Item = Option<LazyReference<'a>>> + 'a>;

pub fn no_slots<'a>() -> ReferenceSlots<'a> {
    Box::new(iter::empty())
}

/// Slots delegated to other handlers, or a single absent slot when none of
/// them produced anything.
pub fn delegated<'a>(slots: impl Iterator<Item = Option<LazyReference<'a>>> + 'a) -> ReferenceSlots<'a> {
    let mut slots = slots.peekable();
    if slots.peek().is_none() {
        Box::new(iter::once(None))
    } else {
        Box::new(slots)
    }
}

/// What a producer may look at besides the element itself.
#[derive(Clone, Copy)]
pub struct ReferenceContext<'a> {
    pub extensions: &'a Extensions,
}

impl<'a> ReferenceContext<'a> {
    /// Delegates a runtime connection to every handler that understands
    /// connections.
    pub fn connection_slots(self, value: &'a ConnectionValue) -> ReferenceSlots<'a> {
        delegated(
            self.extensions
                .dialects
                .implementing::<dyn ConnectionReferenceProducer>()
                .flat_map(move |producer| value.accept(self, producer)),
        )
    }

    /// Delegates an island to every inline dialect. An island that did not
    /// parse is a single absent slot.
    pub fn island_slots(self, island: &'a Island) -> ReferenceSlots<'a> {
        let Some(value) = &island.value else {
            return Box::new(iter::once(None));
        };

        delegated(
            self.extensions
                .inline
                .all()
                .iter()
                .flat_map(move |dialect| dialect.references(value)),
        )
    }
}

pub trait ReferenceProducer: Send + Sync {
    fn references<'a>(
        &'a self,
        context: ReferenceContext<'a>,
        element: &'a Element,
    ) -> ReferenceSlots<'a>;
}

/// Capability of the dialect that owns connections, so that other dialects
/// can resolve connection values they embed.
pub trait ConnectionReferenceProducer: Send + Sync {
    fn pointer_reference<'a>(&'a self, pointer: &'a ElementPointer) -> Option<LazyReference<'a>>;

    fn embedded_references<'a>(
        &'a self,
        context: ReferenceContext<'a>,
        connection: &'a Connection,
    ) -> ReferenceSlots<'a>;
}

impl ConnectionValue {
    pub fn accept<'a>(
        &'a self,
        context: ReferenceContext<'a>,
        visitor: &'a dyn ConnectionReferenceProducer,
    ) -> ReferenceSlots<'a> {
        match self {
            ConnectionValue::Pointer(pointer) => {
                Box::new(iter::once(visitor.pointer_reference(pointer)))
            }
            ConnectionValue::Embedded { connection, .. } => {
                visitor.embedded_references(context, connection)
            }
        }
    }
}

/// Slots of one element, through the handler of its section.
pub fn element_slots<'a>(
    snapshot: &'a WorkspaceSnapshot,
    section: &'a Section,
    element: &'a Element,
) -> ReferenceSlots<'a> {
    match section
        .handler()
        .and_then(|handler| handler.reference_producer())
    {
        Some(producer) => producer.references(snapshot.reference_context(), element),
        None => no_slots(),
    }
}

/// Slots of every element of a section, in element order.
pub fn section_slots<'a>(
    snapshot: &'a WorkspaceSnapshot,
    section: &'a Section,
) -> impl Iterator<Item = Option<LazyReference<'a>>> + 'a {
    section
        .elements()
        .iter()
        .flat_map(move |element| element_slots(snapshot, section, element))
}

/// Resolved references whose site contains `position`, innermost element
/// first. Only sites under the cursor are resolved.
pub fn references_at(
    snapshot: &WorkspaceSnapshot,
    document: &DocumentId,
    position: Position,
) -> Vec<Reference> {
    sites_at(snapshot, document, position)
        .filter_map(|reference| reference.resolve(snapshot))
        .collect()
}

/// The declaration of the first resolvable reference under the cursor.
pub fn goto_definition(
    snapshot: &WorkspaceSnapshot,
    document: &DocumentId,
    position: Position,
) -> Option<Reference> {
    sites_at(snapshot, document, position).find_map(|reference| reference.resolve(snapshot))
}

fn sites_at<'a>(
    snapshot: &'a WorkspaceSnapshot,
    document: &'a DocumentId,
    position: Position,
) -> impl Iterator<Item = LazyReference<'a>> + 'a {
    snapshot
        .section_at(document, position)
        .into_iter()
        .flat_map(move |(_, section)| {
            section
                .elements()
                .iter()
                .filter(move |element| element.covers(document, position))
                .flat_map(move |element| element_slots(snapshot, section, element))
        })
        .flatten()
        .filter(move |reference| reference.location().contains(document, position))
}

/// Every site in the workspace that resolves to the element under the
/// cursor, in document order. The cursor may sit on an element name or on a
/// reference to it.
pub fn find_usages(
    snapshot: &WorkspaceSnapshot,
    document: &DocumentId,
    position: Position,
) -> Vec<Location> {
    let Some(target) = declaration_at(snapshot, document, position) else {
        return vec![];
    };
    debug!(declaration = %target.location, "searching usages");

    let documents = snapshot.documents().collect::<Vec<_>>();
    documents
        .par_iter()
        .flat_map_iter(|document| {
            document
                .sections()
                .iter()
                .flat_map(|section| section_slots(snapshot, section))
                .flatten()
                .filter_map(|reference| reference.resolve(snapshot))
                .filter(|reference| *reference.declaration() == target.location)
                .map(|reference| reference.location().clone())
                .collect::<Vec<_>>()
        })
        .collect()
}

fn declaration_at(
    snapshot: &WorkspaceSnapshot,
    document: &DocumentId,
    position: Position,
) -> Option<Declaration> {
    let (_, section) = snapshot.section_at(document, position)?;

    section
        .elements()
        .iter()
        .find(|element| element.name_location.contains(document, position))
        .map(Element::declaration)
        .or_else(|| {
            let reference = goto_definition(snapshot, document, position)?;
            let element = snapshot.element_declared_at(reference.declaration())?;
            Some(element.declaration())
        })
}
