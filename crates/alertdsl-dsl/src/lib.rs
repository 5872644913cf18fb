//! alertdsl DSL - extension libraries, plugin discovery, namespace
//! composition and script execution.
//!
//! Each extension library is a self-contained module in src/libraries/.
//! To add a library: implement ExtensionLibrary, register it in
//! create_default_catalog() below, and drop a manifest naming it into the
//! plugin directory.

pub mod engine;
pub mod error;
pub mod libraries;
pub mod library;
pub mod namespace;
pub mod registry;
pub mod resolver;

pub use engine::{ScriptArguments, ScriptEngine, ScriptInvocationContext};
pub use error::{DslError, ManifestError, Result};
pub use library::{Export, Exports, ExtensionLibrary, LibraryContext};
pub use namespace::{compose, ScriptNamespace};
pub use registry::{LibraryCatalog, PluginManifest, PluginRegistry};
pub use resolver::ScriptResolver;

/// Catalog with every built-in extension library.
pub fn create_default_catalog() -> LibraryCatalog {
    let mut catalog = LibraryCatalog::new();

    // --- Backend + notification DSL ---
    catalog.register("tfs", || Box::new(libraries::tfs::TfsLibrary::new()));

    // --- Minimal second library, composes alongside tfs ---
    catalog.register("sample", || Box::new(libraries::sample::SampleLibrary::new()));

    catalog
}
