//! alertdsl core - event types, XML field extraction, classification,
//! and the collaborator contracts scripts act through.

pub mod classify;
pub mod error;
pub mod event;
pub mod fakes;
pub mod lookup;
pub mod provider;
pub mod xml;

pub use classify::{classify, EventClassifier, Stage};
pub use error::{BackendError, BackendResult, Error, Result};
pub use event::{Event, EventKind};
pub use lookup::FieldLookup;
pub use provider::{
    BackendProvider, BuildDefinition, BuildDetail, Changeset, NotificationProvider, WorkItem,
};
pub use xml::{AlertField, BuildStatusChange, CheckInDetails, FieldSection, FieldType, ValueType};
