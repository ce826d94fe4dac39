//! Compiled entities, as handed to the core by dialect parsers.
//!
//! The variant set is closed: every construct a dialect can produce is a case
//! of [`ElementBody`] (or of the value enums below it), and consumers match on
//! it exhaustively. Values that may point at another named element carry an
//! [`ElementPointer`]; values that cannot (primitive types, the built-in
//! `ModelStore`) are separate variants so a reference producer can yield an
//! absent slot for them.

use serde::Serialize;

use crate::location::{Located, Location};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ElementKind {
    Class,
    Enumeration,
    Profile,
    Function,
    Mapping,
    Connection,
    Runtime,
    Store,
}

impl ElementKind {
    /// Kinds a property, parameter or return type may point at.
    pub const TYPES: &'static [ElementKind] = &[ElementKind::Class, ElementKind::Enumeration];

    pub fn classifier(self) -> &'static str {
        match self {
            ElementKind::Class => "Class",
            ElementKind::Enumeration => "Enumeration",
            ElementKind::Profile => "Profile",
            ElementKind::Function => "Function",
            ElementKind::Mapping => "Mapping",
            ElementKind::Connection => "Connection",
            ElementKind::Runtime => "Runtime",
            ElementKind::Store => "Store",
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            ElementKind::Class => "class",
            ElementKind::Enumeration => "enumeration",
            ElementKind::Profile => "profile",
            ElementKind::Function => "function",
            ElementKind::Mapping => "mapping",
            ElementKind::Connection => "connection",
            ElementKind::Runtime => "runtime",
            ElementKind::Store => "store",
        }
    }
}

/// Where a named element is defined and what it is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Declaration {
    pub location: Location,
    pub classifier: String,
}

impl Declaration {
    pub fn new(location: Location, classifier: impl Into<String>) -> Declaration {
        Declaration {
            location,
            classifier: classifier.into(),
        }
    }
}

/// A dotted path (`a::b::C`) naming another element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementPointer {
    pub path: String,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Named {
    pub name: String,
    pub location: Location,
}

/// `<<profile.value>>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StereotypePointer {
    pub profile: ElementPointer,
    pub value: String,
    pub location: Location,
}

/// `{profile.tag = 'value'}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedValue {
    pub profile: ElementPointer,
    pub tag: String,
    pub value: String,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub path: String,
    pub kind: ElementKind,
    /// From the leading keyword through the end of the body.
    pub location: Location,
    pub name_location: Location,
    pub stereotypes: Vec<StereotypePointer>,
    pub tagged_values: Vec<TaggedValue>,
    pub body: ElementBody,
}

impl Element {
    pub fn declaration(&self) -> Declaration {
        Declaration::new(self.location.clone(), self.kind.classifier())
    }

    /// Last segment of the path.
    pub fn name(&self) -> &str {
        self.path.rsplit("::").next().unwrap_or(&self.path)
    }

    pub fn package(&self) -> Option<&str> {
        self.path.rsplit_once("::").map(|(package, _)| package)
    }
}

impl Located for Element {
    fn location(&self) -> &Location {
        &self.location
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementBody {
    Class(ClassBody),
    Enumeration(EnumerationBody),
    Profile(ProfileBody),
    Function(FunctionBody),
    Mapping(MappingBody),
    Connection(Connection),
    Runtime(RuntimeBody),
    Database(DatabaseBody),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeValue {
    Primitive { name: String, location: Location },
    Pointer(ElementPointer),
}

impl TypeValue {
    pub fn name(&self) -> &str {
        match self {
            TypeValue::Primitive { name, .. } => name,
            TypeValue::Pointer(pointer) => &pointer.path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassBody {
    pub super_types: Vec<ElementPointer>,
    pub properties: Vec<Property>,
    /// Islands found in derived property bodies, in source order.
    pub islands: Vec<Island>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub name: String,
    pub location: Location,
    pub ty: TypeValue,
    pub multiplicity: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumerationBody {
    pub values: Vec<Named>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileBody {
    pub stereotypes: Vec<Named>,
    pub tags: Vec<Named>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionBody {
    pub parameters: Vec<Parameter>,
    pub return_type: TypeValue,
    pub return_multiplicity: String,
    pub islands: Vec<Island>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub location: Location,
    pub ty: TypeValue,
    pub multiplicity: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingBody {
    /// `None` when the mapping has no `include` lines.
    pub includes: Option<Vec<ElementPointer>>,
    pub class_mappings: Vec<ClassMapping>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassMapping {
    pub class: ElementPointer,
    pub id: Option<String>,
    pub root: bool,
    pub mapping_type: String,
    /// `~src` class of a model-to-model mapping.
    pub source: Option<ElementPointer>,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Connection {
    JsonModel {
        class: ElementPointer,
        url: String,
    },
    ModelChain {
        /// `None` when the `mappings` entry is omitted.
        mappings: Option<Vec<ElementPointer>>,
    },
}

impl Connection {
    pub fn type_name(&self) -> &'static str {
        match self {
            Connection::JsonModel { .. } => "JsonModelConnection",
            Connection::ModelChain { .. } => "ModelChainConnection",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeBody {
    pub mappings: Vec<ElementPointer>,
    /// `None` when the runtime has no `connections` entry.
    pub connections: Option<Vec<StoreConnections>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConnections {
    pub store: StoreValue,
    pub connections: Vec<IdentifiedConnection>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreValue {
    /// The built-in in-memory store; not a declared element.
    ModelStore(Location),
    Pointer(ElementPointer),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifiedConnection {
    pub id: String,
    pub location: Location,
    pub value: ConnectionValue,
}

/// A connection used by a runtime: either a pointer to a declared
/// connection or one embedded in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionValue {
    Pointer(ElementPointer),
    Embedded {
        connection: Box<Connection>,
        location: Location,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseBody {
    pub tables: Vec<Table>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub name: String,
    pub location: Location,
    pub columns: Vec<Column>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub data_type: String,
    pub location: Location,
}

/// `#<tag>{ ... }#` embedded in another dialect's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Island {
    pub tag: String,
    pub location: Location,
    pub content_location: Location,
    /// `None` when no inline dialect claims the tag or its content failed
    /// to parse.
    pub value: Option<IslandValue>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IslandValue {
    GraphFetch(GraphFetchTree),
    StoreAccessor(StoreAccessor),
}

/// `#{ a::Person { name, firm { legalName } } }#`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphFetchTree {
    pub root: ElementPointer,
    pub properties: Vec<GraphFetchProperty>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphFetchProperty {
    pub name: String,
    pub location: Location,
    pub children: Vec<GraphFetchProperty>,
}

/// `#>{ a::Db.person }#`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreAccessor {
    pub store: ElementPointer,
    pub table: Option<Named>,
    /// The whole accessor, store through table.
    pub location: Location,
}
