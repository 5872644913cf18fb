//! Script namespace composition.

use crate::library::{Export, ExtensionLibrary, LibraryContext};
use rhai::{Engine, Scope};
use std::collections::HashMap;
use tracing::debug;

/// Flat name -> export mapping seen by one script run.
#[derive(Clone, Debug, Default)]
pub struct ScriptNamespace {
    entries: HashMap<String, Export>,
}

impl ScriptNamespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a binding, returning true when it replaced an earlier one.
    pub fn insert(&mut self, name: impl Into<String>, export: Export) -> bool {
        self.entries.insert(name.into(), export).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&Export> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Register functions on `engine` and push values into `scope` as constants.
    pub fn bind(&self, engine: &mut Engine, scope: &mut Scope<'_>) {
        for (name, export) in &self.entries {
            match export {
                Export::Function(binder) => binder(&mut *engine, name.as_str()),
                Export::Value(value) => {
                    scope.push_constant_dynamic(name.clone(), value.clone());
                }
            }
        }
    }
}

/// Attach every library to `context` and merge their exports.
///
/// Libraries are merged in the order given; a later binding for a name
/// replaces the earlier one.
pub fn compose<'a, I>(libraries: I, context: &LibraryContext) -> ScriptNamespace
where
    I: IntoIterator<Item = &'a mut Box<dyn ExtensionLibrary>>,
{
    let mut namespace = ScriptNamespace::new();
    for library in libraries {
        library.attach(context.clone());
        let exports = library.exports();
        debug!(library = library.name(), count = exports.len(), "merging exports");
        for (name, export) in exports {
            if namespace.insert(name.clone(), export) {
                debug!(library = library.name(), %name, "binding replaced by later library");
            }
        }
    }
    namespace
}
