//! Extension library contract.
//!
//! A library is attached to one run's context, then asked for its exports:
//! named script functions and named values. Functions are carried as
//! binders that register themselves on the engine under the name the
//! namespace settles on.

use alertdsl_core::{BackendProvider, NotificationProvider};
use rhai::{Dynamic, Engine};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Collaborators and payload shared by every library of one run.
#[derive(Clone)]
pub struct LibraryContext {
    pub backend: Arc<dyn BackendProvider>,
    pub notifier: Arc<dyn NotificationProvider>,
    pub event_xml: String,
    pub script_folder: PathBuf,
}

impl LibraryContext {
    pub fn new(
        backend: Arc<dyn BackendProvider>,
        notifier: Arc<dyn NotificationProvider>,
        event_xml: impl Into<String>,
        script_folder: impl Into<PathBuf>,
    ) -> Self {
        Self {
            backend,
            notifier,
            event_xml: event_xml.into(),
            script_folder: script_folder.into(),
        }
    }
}

impl fmt::Debug for LibraryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryContext")
            .field("event_xml_len", &self.event_xml.len())
            .field("script_folder", &self.script_folder)
            .finish_non_exhaustive()
    }
}

/// Registers one operation (possibly several overloads) on an engine under the given name.
pub type Binder = Arc<dyn Fn(&mut Engine, &str) + Send + Sync>;

#[derive(Clone)]
pub enum Export {
    Function(Binder),
    Value(Dynamic),
}

impl fmt::Debug for Export {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Function(_) => f.write_str("Function"),
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
        }
    }
}

/// Ordered name -> export list produced by one library.
#[derive(Clone, Debug, Default)]
pub struct Exports {
    entries: Vec<(String, Export)>,
}

impl Exports {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn function(
        mut self,
        name: impl Into<String>,
        bind: impl Fn(&mut Engine, &str) + Send + Sync + 'static,
    ) -> Self {
        self.entries.push((name.into(), Export::Function(Arc::new(bind))));
        self
    }

    pub fn value(mut self, name: impl Into<String>, value: Dynamic) -> Self {
        self.entries.push((name.into(), Export::Value(value)));
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for Exports {
    type Item = (String, Export);
    type IntoIter = std::vec::IntoIter<(String, Export)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// A pluggable group of script operations.
pub trait ExtensionLibrary: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Give the library this run's collaborators. Called before `exports`.
    fn attach(&mut self, context: LibraryContext);

    fn context(&self) -> Option<&LibraryContext>;

    /// Every public operation and value of the library. An unattached
    /// library exports only what needs no context.
    fn exports(&self) -> Exports;
}
