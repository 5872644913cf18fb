//! Classified notification events.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Build,
    WorkItem,
    CheckIn,
    Unknown,
}

impl EventKind {
    /// The label scripts branch on, and the stem of the default script name.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Build => "BuildEvent",
            Self::WorkItem => "WorkItemEvent",
            Self::CheckIn => "CheckInEvent",
            Self::Unknown => "UnknownEvent",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One inbound notification after classification. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Event {
    kind: EventKind,
    primary_key: String,
}

impl Event {
    pub fn new(kind: EventKind, primary_key: impl Into<String>) -> Self {
        Self {
            kind,
            primary_key: primary_key.into(),
        }
    }

    pub fn unknown() -> Self {
        Self::new(EventKind::Unknown, "")
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn label(&self) -> &'static str {
        self.kind.label()
    }

    /// The `[label, primary key]` pair handed to scripts.
    pub fn script_arguments(&self) -> [String; 2] {
        [self.label().to_string(), self.primary_key.clone()]
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.primary_key)
    }
}
