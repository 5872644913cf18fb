//! Field extraction from the three notification payload schemas.
//!
//! Every extractor works on an already-parsed [`roxmltree::Document`] so one
//! payload is parsed once per run. Structural absence is `None`; only values
//! that are present but unusable are errors.

use crate::error::{Error, Result};
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

const WORK_ITEM_ROOT: &str = "WorkItemChangedEvent";
const BUILD_ROOT: &str = "BuildStatusChangeEvent";
const CHECK_IN_ROOT: &str = "CheckinEvent";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSection {
    CoreFields,
    ChangedFields,
}

impl FieldSection {
    fn element(&self) -> &'static str {
        match self {
            Self::CoreFields => "CoreFields",
            Self::ChangedFields => "ChangedFields",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Integer,
    String,
}

impl FieldType {
    fn element(&self) -> &'static str {
        match self {
            Self::Integer => "IntegerFields",
            Self::String => "StringFields",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    New,
    Old,
}

impl ValueType {
    fn element(&self) -> &'static str {
        match self {
            Self::New => "NewValue",
            Self::Old => "OldValue",
        }
    }
}

/// One changed field of a work-item alert. Missing values are empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertField {
    pub reference_name: String,
    pub old_value: String,
    pub new_value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStatusChange {
    pub build_uri: String,
    pub title: String,
    pub team_project: Option<String>,
    pub changed_by: Option<String>,
    pub new_quality: Option<String>,
    pub old_quality: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInDetails {
    pub changeset: i64,
    pub title: String,
    pub committer: String,
    pub team_project: String,
    pub comment: String,
    pub files_added: Vec<String>,
    pub files_edited: Vec<String>,
    pub files_deleted: Vec<String>,
}

pub fn parse(xml: &str) -> Result<Document<'_>> {
    Ok(Document::parse(xml)?)
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

fn children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children()
        .filter(move |n| n.is_element() && n.tag_name().name() == name)
}

fn text(node: Node<'_, '_>) -> String {
    node.text().unwrap_or_default().to_string()
}

fn root_named<'a, 'input>(doc: &'a Document<'input>, name: &str) -> Option<Node<'a, 'input>> {
    let root = doc.root_element();
    (root.tag_name().name() == name).then_some(root)
}

/// Build-status-change fields. `None` unless `BuildUri` and `Title` are present.
pub fn build_status(doc: &Document<'_>) -> Option<BuildStatusChange> {
    let root = root_named(doc, BUILD_ROOT)?;
    let build_uri = text(child(root, "BuildUri")?);
    let title = text(child(root, "Title")?);

    let quality = children(root, "StatusChange").find(|sc| {
        child(*sc, "FieldName").map(text).as_deref() == Some("Quality")
    });

    Some(BuildStatusChange {
        build_uri,
        title,
        team_project: child(root, "TeamProject").map(text),
        changed_by: child(root, "ChangedBy").map(text),
        new_quality: quality.and_then(|q| child(q, "NewValue")).map(text),
        old_quality: quality.and_then(|q| child(q, "OldValue")).map(text),
    })
}

fn work_item_fields<'a, 'input: 'a>(
    doc: &'a Document<'input>,
    section: FieldSection,
    field_type: FieldType,
) -> Vec<Node<'a, 'input>> {
    root_named(doc, WORK_ITEM_ROOT)
        .and_then(|root| child(root, section.element()))
        .and_then(|s| child(s, field_type.element()))
        .map(|group| children(group, "Field").collect())
        .unwrap_or_default()
}

fn find_field<'a, 'input: 'a>(
    doc: &'a Document<'input>,
    section: FieldSection,
    field_type: FieldType,
    reference_name: &str,
) -> Option<Node<'a, 'input>> {
    work_item_fields(doc, section, field_type)
        .into_iter()
        .find(|f| child(*f, "ReferenceName").map(text).as_deref() == Some(reference_name))
}

/// String value of a work-item field, `None` when the field or value node is absent.
pub fn work_item_string(
    doc: &Document<'_>,
    section: FieldSection,
    value_type: ValueType,
    reference_name: &str,
) -> Option<String> {
    find_field(doc, section, FieldType::String, reference_name)
        .and_then(|f| child(f, value_type.element()))
        .map(text)
}

/// Integer value of a work-item field.
///
/// `Ok(None)` when the field is absent, an error when it is present but
/// does not hold an integer.
pub fn work_item_integer(
    doc: &Document<'_>,
    section: FieldSection,
    value_type: ValueType,
    reference_name: &str,
) -> Result<Option<i64>> {
    let Some(node) = find_field(doc, section, FieldType::Integer, reference_name)
        .and_then(|f| child(f, value_type.element()))
    else {
        return Ok(None);
    };
    let raw = text(node);
    raw.trim()
        .parse::<i64>()
        .map(Some)
        .map_err(|_| Error::not_an_integer(reference_name, raw))
}

pub fn alert_fields(
    doc: &Document<'_>,
    section: FieldSection,
    field_type: FieldType,
) -> Vec<AlertField> {
    work_item_fields(doc, section, field_type)
        .into_iter()
        .map(|f| AlertField {
            reference_name: child(f, "ReferenceName").map(text).unwrap_or_default(),
            old_value: child(f, "OldValue").map(text).unwrap_or_default(),
            new_value: child(f, "NewValue").map(text).unwrap_or_default(),
        })
        .collect()
}

/// Every changed field of a work-item alert, string fields first.
pub fn changed_fields(doc: &Document<'_>) -> Vec<AlertField> {
    let mut fields = alert_fields(doc, FieldSection::ChangedFields, FieldType::String);
    fields.extend(alert_fields(doc, FieldSection::ChangedFields, FieldType::Integer));
    fields
}

/// Who made the change that raised a work-item alert.
pub fn changed_by(doc: &Document<'_>) -> Option<String> {
    work_item_string(doc, FieldSection::CoreFields, ValueType::New, "System.ChangedBy")
}

/// Check-in fields. `None` unless `Title`, `Committer`, `TeamProject` and
/// `Comment` are all present.
pub fn check_in(doc: &Document<'_>) -> Result<Option<CheckInDetails>> {
    let Some(root) = root_named(doc, CHECK_IN_ROOT) else {
        return Ok(None);
    };
    let (Some(title), Some(committer), Some(team_project), Some(comment)) = (
        child(root, "Title"),
        child(root, "Committer"),
        child(root, "TeamProject"),
        child(root, "Comment"),
    ) else {
        return Ok(None);
    };

    let mut details = CheckInDetails {
        title: text(title),
        committer: text(committer),
        team_project: text(team_project),
        comment: text(comment),
        ..Default::default()
    };

    let versioned = child(root, "Artifacts")
        .into_iter()
        .flat_map(|a| children(a, "Artifact"))
        .filter(|a| a.attribute("ArtifactType") == Some("VersionedItem"));

    for artifact in versioned {
        let revision = artifact.attribute("ItemRevision").unwrap_or_default();
        details.changeset = revision
            .trim()
            .parse()
            .map_err(|_| Error::not_an_integer("ItemRevision", revision))?;

        let item = artifact.attribute("Item").unwrap_or_default().to_string();
        match artifact.attribute("ChangeType") {
            Some("add") => details.files_added.push(item),
            Some("edit") => details.files_edited.push(item),
            Some("delete") => details.files_deleted.push(item),
            _ => {}
        }
    }

    Ok(Some(details))
}

#[cfg(test)]
mod tests {
    use super::*;

    const WI: &str = "<WorkItemChangedEvent><CoreFields><IntegerFields>\
        <Field><ReferenceName>System.Id</ReferenceName><OldValue>7</OldValue><NewValue>7</NewValue></Field>\
        <Field><ReferenceName>System.Rev</ReferenceName><NewValue>x</NewValue></Field>\
        </IntegerFields><StringFields>\
        <Field><ReferenceName>System.ChangedBy</ReferenceName><NewValue>ann</NewValue></Field>\
        </StringFields></CoreFields><ChangedFields><IntegerFields /><StringFields>\
        <Field><ReferenceName>Bm.Custom</ReferenceName><OldValue>s1</OldValue></Field>\
        </StringFields></ChangedFields></WorkItemChangedEvent>";

    #[test]
    fn integer_field_present_absent_and_invalid() {
        let doc = parse(WI).unwrap();
        let id = work_item_integer(&doc, FieldSection::CoreFields, ValueType::New, "System.Id");
        assert_eq!(id.unwrap(), Some(7));

        let missing =
            work_item_integer(&doc, FieldSection::CoreFields, ValueType::New, "System.AreaId");
        assert_eq!(missing.unwrap(), None);

        let bad = work_item_integer(&doc, FieldSection::CoreFields, ValueType::New, "System.Rev");
        assert!(matches!(bad, Err(Error::NotAnInteger { .. })));
    }

    #[test]
    fn changed_fields_default_missing_values() {
        let doc = parse(WI).unwrap();
        let fields = changed_fields(&doc);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].reference_name, "Bm.Custom");
        assert_eq!(fields[0].old_value, "s1");
        assert_eq!(fields[0].new_value, "");
        assert_eq!(changed_by(&doc).as_deref(), Some("ann"));
    }

    #[test]
    fn build_requires_uri_and_title() {
        let doc = parse("<BuildStatusChangeEvent><Title>t</Title></BuildStatusChangeEvent>").unwrap();
        assert!(build_status(&doc).is_none());
    }

    #[test]
    fn check_in_requires_core_nodes() {
        let doc = parse("<CheckinEvent><Title>t</Title><Committer>c</Committer></CheckinEvent>").unwrap();
        assert_eq!(check_in(&doc).unwrap(), None);
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(matches!(parse("<open>"), Err(Error::Xml(_))));
    }
}
