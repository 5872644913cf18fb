//! Library catalog and plugin discovery.
//!
//! The catalog maps library keys to constructors. The plugin directory holds
//! one TOML manifest per plugin naming the catalog key to load; a manifest
//! that names no known library is skipped, so only genuine extension
//! libraries are ever instantiated.

use crate::error::{DslError, ManifestError, Result};
use crate::library::ExtensionLibrary;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub const MANIFEST_EXTENSION: &str = "toml";

pub type LibraryFactory = fn() -> Box<dyn ExtensionLibrary>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Catalog key of the library to instantiate.
    pub library: String,
    /// Display name; defaults to the manifest file stem.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl PluginManifest {
    pub fn load(path: &Path) -> std::result::Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ManifestError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

pub struct LibraryCatalog {
    factories: HashMap<String, LibraryFactory>,
}

impl Default for LibraryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl LibraryCatalog {
    pub fn new() -> Self {
        Self { factories: HashMap::new() }
    }

    /// Register a constructor. Replaces any existing one with the same key.
    pub fn register(&mut self, key: impl Into<String>, factory: LibraryFactory) {
        self.factories.insert(key.into(), factory);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    pub fn instantiate(&self, key: &str) -> Option<Box<dyn ExtensionLibrary>> {
        self.factories.get(key).map(|factory| factory())
    }

    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.factories.keys().map(|s| s.as_str()).collect();
        keys.sort_unstable();
        keys
    }
}

/// A library found in the plugin directory, with where it came from.
pub struct DiscoveredLibrary {
    pub name: String,
    pub manifest: PluginManifest,
    pub library: Box<dyn ExtensionLibrary>,
}

pub struct PluginRegistry<'a> {
    catalog: &'a LibraryCatalog,
}

impl<'a> PluginRegistry<'a> {
    pub fn new(catalog: &'a LibraryCatalog) -> Self {
        Self { catalog }
    }

    /// Scan `dir` (not recursively) and instantiate every enabled library
    /// its manifests name, in manifest file-name order.
    pub fn discover(&self, dir: &Path) -> Result<Vec<DiscoveredLibrary>> {
        if !dir.is_dir() {
            return Err(DslError::NoDirectory(dir.to_path_buf()));
        }

        let mut found = Vec::new();
        let entries = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter();

        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(error = %e, "unreadable plugin directory entry skipped");
                    continue;
                }
            };
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|e| e.to_str()) != Some(MANIFEST_EXTENSION)
            {
                debug!(path = %path.display(), "not a plugin manifest");
                continue;
            }

            let manifest = match PluginManifest::load(path) {
                Ok(m) => m,
                Err(e) => {
                    let cause = std::error::Error::source(&e)
                        .map(ToString::to_string)
                        .unwrap_or_default();
                    warn!(error = %e, cause = %cause, "plugin manifest skipped");
                    continue;
                }
            };
            if !manifest.enabled {
                info!(path = %path.display(), "plugin disabled, skipped");
                continue;
            }
            let Some(library) = self.catalog.instantiate(&manifest.library) else {
                warn!(
                    path = %path.display(),
                    library = %manifest.library,
                    "manifest names no known extension library, skipped"
                );
                continue;
            };

            let name = manifest.name.clone().unwrap_or_else(|| {
                path.file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| manifest.library.clone())
            });
            info!(plugin = %name, library = library.name(), "extension library loaded");
            found.push(DiscoveredLibrary { name, manifest, library });
        }

        if found.is_empty() {
            return Err(DslError::NoLibraries(dir.to_path_buf()));
        }
        Ok(found)
    }
}
