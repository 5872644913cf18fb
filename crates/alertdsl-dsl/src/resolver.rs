//! Script name resolution.

use crate::error::{DslError, Result};

pub const DEFAULT_SCRIPT_EXTENSION: &str = ".rhai";

/// Picks the script file name for an event.
#[derive(Debug, Clone)]
pub struct ScriptResolver {
    extension: String,
}

impl Default for ScriptResolver {
    fn default() -> Self {
        Self::new(DEFAULT_SCRIPT_EXTENSION)
    }
}

impl ScriptResolver {
    pub fn new(extension: impl Into<String>) -> Self {
        Self { extension: extension.into() }
    }

    /// A non-empty override wins; otherwise the event label plus the
    /// script extension. The label is always required.
    pub fn resolve(&self, event_label: &str, explicit: Option<&str>) -> Result<String> {
        if event_label.is_empty() {
            return Err(DslError::validation("event label must not be empty"));
        }
        match explicit {
            Some(name) if !name.is_empty() => Ok(name.to_string()),
            _ => Ok(format!("{}{}", event_label, self.extension)),
        }
    }
}
