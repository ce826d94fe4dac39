//! Catalog of named, pluggable handlers.
//!
//! An [`ExtensionRegistry`] owns every handler of one family for the life of
//! the process. Names are unique within a registry: registering a second
//! handler under a taken name is a [`RegistryError::NameConflict`], which
//! aborts server start. Registering the *same* instance again is a no-op.
//!
//! The registry does not know how handlers are found. A [`PluginSource`]
//! enumerates candidates (a fixed list in tests, the built-in dialect set in
//! the binary) and [`ExtensionRegistry::discover`] registers them in order.
//!
//! Optional handler contracts are looked up with
//! [`ExtensionRegistry::implementing`], which lazily yields every handler that
//! projects onto the requested [`Capability`], in registration order.

use std::{collections::HashMap, marker::PhantomData, sync::Arc};

use thiserror::Error;
use tracing::{debug, info, warn};

/// A named handler. Handlers are stateless by convention and shared between
/// concurrent requests.
pub trait Extension: Send + Sync {
    fn name(&self) -> &str;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("an extension named '{name}' is already registered")]
    NameConflict { name: String },
    #[error("discovering extensions from '{plugin_source}' failed: {reason}")]
    Discovery {
        plugin_source: String,
        reason: String,
    },
}

/// Host-provided enumeration of candidate handlers.
pub trait PluginSource<E: ?Sized> {
    fn describe(&self) -> String;

    fn candidates(&self) -> anyhow::Result<Vec<Arc<E>>>;
}

/// A fixed list of handlers, used wherever discovery is explicit.
pub struct PluginList<E: ?Sized>(pub Vec<Arc<E>>);

impl<E: ?Sized> PluginSource<E> for PluginList<E> {
    fn describe(&self) -> String {
        format!("explicit list of {} extensions", self.0.len())
    }

    fn candidates(&self) -> anyhow::Result<Vec<Arc<E>>> {
        Ok(self.0.clone())
    }
}

/// An optional contract a handler of family `E` may implement.
///
/// Implemented for capability trait objects, e.g.
/// `impl Capability<dyn DialectExtension> for dyn ReferenceProducer`.
pub trait Capability<E: ?Sized> {
    fn project(extension: &E) -> Option<&Self>;
}

pub struct ExtensionRegistry<E: ?Sized> {
    extensions: Vec<Arc<E>>,
    by_name: HashMap<String, usize>,
}

impl<E: ?Sized> Default for ExtensionRegistry<E> {
    fn default() -> Self {
        ExtensionRegistry {
            extensions: Vec::new(),
            by_name: HashMap::new(),
        }
    }
}

impl<E: Extension + ?Sized> ExtensionRegistry<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, extension: Arc<E>) -> Result<(), RegistryError> {
        let name = extension.name().to_string();

        match self.by_name.get(&name) {
            Some(&existing) if same_instance(&self.extensions[existing], &extension) => {
                warn!(extension = %name, "extension registered twice; ignoring");
                Ok(())
            }
            Some(_) => Err(RegistryError::NameConflict { name }),
            None => {
                debug!(extension = %name, "registered extension");
                self.by_name.insert(name, self.extensions.len());
                self.extensions.push(extension);
                Ok(())
            }
        }
    }

    /// Registers every candidate of `source`, stopping at the first conflict.
    /// Returns the number of candidates the source produced.
    pub fn discover(&mut self, source: &impl PluginSource<E>) -> Result<usize, RegistryError> {
        let candidates = source
            .candidates()
            .map_err(|err| RegistryError::Discovery {
                plugin_source: source.describe(),
                reason: format!("{err:#}"),
            })?;

        let count = candidates.len();
        for candidate in candidates {
            self.register(candidate)?;
        }

        info!(
            plugin_source = %source.describe(),
            count,
            "discovered extensions"
        );
        Ok(count)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<E>> {
        self.by_name.get(name).map(|&i| &self.extensions[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Every handler, in registration order. The slice is read-only; the
    /// catalog can only grow through [`register`](Self::register).
    pub fn all(&self) -> &[Arc<E>] {
        &self.extensions
    }

    /// The set of registered names. Each name appears once, since
    /// registration rejects duplicates; iteration follows registration order.
    pub fn names(&self) -> Names<'_, E> {
        Names {
            inner: self.extensions.iter(),
        }
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// Lazily yields, in registration order, every handler implementing `C`.
    pub fn implementing<C>(&self) -> Implementing<'_, E, C>
    where
        C: Capability<E> + ?Sized,
    {
        Implementing {
            inner: self.extensions.iter(),
            capability: PhantomData,
        }
    }
}

fn same_instance<E: ?Sized>(a: &Arc<E>, b: &Arc<E>) -> bool {
    // compare data pointers only; vtable pointers are not guaranteed unique
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Names of a registry, in registration order, without repeats.
pub struct Names<'a, E: ?Sized> {
    inner: std::slice::Iter<'a, Arc<E>>,
}

impl<'a, E: Extension + ?Sized> Iterator for Names<'a, E> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|extension| extension.name())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<E: Extension + ?Sized> ExactSizeIterator for Names<'_, E> {}

pub struct Implementing<'a, E: ?Sized, C: ?Sized> {
    inner: std::slice::Iter<'a, Arc<E>>,
    capability: PhantomData<fn() -> *const C>,
}

impl<'a, E, C> Iterator for Implementing<'a, E, C>
where
    E: ?Sized,
    C: Capability<E> + ?Sized + 'a,
{
    type Item = &'a C;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .by_ref()
            .find_map(|extension| C::project(extension.as_ref()))
    }
}
