//! Event classification by ordered fallback parsing.
//!
//! Stages run in a fixed order and the first one that recognises the payload
//! wins. A stage that finds its required nodes missing answers `None`; that
//! is the normal "wrong schema" outcome, not an error.

use crate::error::Result;
use crate::event::{Event, EventKind};
use crate::xml::{self, FieldSection, ValueType};
use roxmltree::Document;
use std::fmt;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Build,
    WorkItem,
    CheckIn,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Build => write!(f, "build"),
            Self::WorkItem => write!(f, "work-item"),
            Self::CheckIn => write!(f, "check-in"),
        }
    }
}

type StageParser = fn(&Document<'_>) -> Result<Option<Event>>;

pub struct EventClassifier {
    stages: Vec<(Stage, StageParser)>,
}

impl Default for EventClassifier {
    fn default() -> Self {
        Self {
            stages: vec![
                (Stage::Build, parse_build as StageParser),
                (Stage::WorkItem, parse_work_item as StageParser),
                (Stage::CheckIn, parse_check_in as StageParser),
            ],
        }
    }
}

impl EventClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stages(&self) -> Vec<Stage> {
        self.stages.iter().map(|(s, _)| *s).collect()
    }

    /// Classify a raw payload. Fails only when the XML itself is malformed.
    pub fn classify(&self, event_xml: &str) -> Result<Event> {
        let doc = xml::parse(event_xml)?;

        for (stage, parser) in &self.stages {
            match parser(&doc) {
                Ok(Some(event)) => {
                    debug!(%stage, key = event.primary_key(), "classification stage matched");
                    return Ok(event);
                }
                Ok(None) => debug!(%stage, "classification stage did not match"),
                Err(e) => warn!(%stage, error = %e, "classification stage rejected payload"),
            }
        }

        debug!("no classification stage matched; event is unknown");
        Ok(Event::unknown())
    }
}

/// Classify with the standard stage order.
pub fn classify(event_xml: &str) -> Result<Event> {
    EventClassifier::default().classify(event_xml)
}

fn parse_build(doc: &Document<'_>) -> Result<Option<Event>> {
    Ok(xml::build_status(doc).map(|b| Event::new(EventKind::Build, b.build_uri)))
}

// Zero and absent ids both mean "not a work-item alert".
fn parse_work_item(doc: &Document<'_>) -> Result<Option<Event>> {
    let id = xml::work_item_integer(doc, FieldSection::CoreFields, ValueType::New, "System.Id")?;
    Ok(id
        .filter(|id| *id > 0)
        .map(|id| Event::new(EventKind::WorkItem, id.to_string())))
}

fn parse_check_in(doc: &Document<'_>) -> Result<Option<Event>> {
    Ok(xml::check_in(doc)?.map(|c| Event::new(EventKind::CheckIn, c.changeset.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_order_is_fixed() {
        assert_eq!(
            EventClassifier::new().stages(),
            vec![Stage::Build, Stage::WorkItem, Stage::CheckIn]
        );
    }

    #[test]
    fn empty_document_of_unknown_schema() {
        let event = classify("<SomethingElse/>").unwrap();
        assert_eq!(event, Event::unknown());
    }

    #[test]
    fn negative_id_is_not_a_work_item() {
        let xml = "<WorkItemChangedEvent><CoreFields><IntegerFields><Field>\
            <ReferenceName>System.Id</ReferenceName><NewValue>-3</NewValue>\
            </Field></IntegerFields></CoreFields></WorkItemChangedEvent>";
        assert_eq!(classify(xml).unwrap().kind(), EventKind::Unknown);
    }

    #[test]
    fn invalid_id_falls_through() {
        let xml = "<WorkItemChangedEvent><CoreFields><IntegerFields><Field>\
            <ReferenceName>System.Id</ReferenceName><NewValue>abc</NewValue>\
            </Field></IntegerFields></CoreFields></WorkItemChangedEvent>";
        assert_eq!(classify(xml).unwrap().kind(), EventKind::Unknown);
    }
}
