//! dialect-lsp: a language server core for documents that mix several
//! modelling dialects.
//!
//! A document is split into sections by `###<Dialect>` marker lines. Each
//! section is parsed by the dialect handler registered under that name, and
//! the resulting elements point at each other across sections, dialects and
//! documents. Pointers are resolved lazily, only when a request needs them.
//!
//! # Architecture
//!
//! - [`registry`] and [`extension`]: the two handler families (section
//!   dialects and inline dialects) and how they are discovered
//! - [`workspace`]: documents, sections and the [`workspace::GlobalState`]
//!   serving immutable snapshots to concurrent requests
//! - [`references`], [`completion`], [`commands`], [`diagnostics`],
//!   [`hover`], [`symbol`]: the editor features, computed on a snapshot
//! - [`dialects`]: the built-in handlers
//! - [`lsp`] and [`server`]: the protocol surface
//!
//! ```ignore
//! use dialect_lsp::{config::Settings, dialects::builtin_extensions};
//! use dialect_lsp::workspace::WorkspaceSnapshot;
//!
//! let settings = Settings::default();
//! let extensions = builtin_extensions(&settings)?;
//! let snapshot = WorkspaceSnapshot::new(Arc::new(extensions), Arc::new(settings))
//!     .with_document("file:///model.pure".into(), "Class a::Person {}");
//! ```

// Core model
pub mod element;
pub mod extension;
pub mod location;
pub mod registry;
pub mod workspace;

// Editor features
pub mod commands;
pub mod completion;
pub mod diagnostics;
pub mod hover;
pub mod references;
pub mod symbol;

// Handlers, configuration and the protocol surface
pub mod cli;
pub mod config;
pub mod dialects;
pub mod lsp;
pub mod server;

// Test utilities (only available in test builds)
#[cfg(test)]
pub mod test_utils;
