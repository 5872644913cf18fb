//! Collaborator contracts: the backend (work items, builds, version control)
//! and the notification transport.
//!
//! Implementations live outside the core. Any failure they return is opaque
//! to the core and travels up unchanged.

use crate::error::BackendResult;
use crate::lookup::FieldLookup;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkItem {
    pub id: i64,
    pub title: String,
    pub work_item_type: String,
    pub state: String,
    pub team_project: String,
    pub parent_id: Option<i64>,
    pub fields: BTreeMap<String, Value>,
}

impl WorkItem {
    /// Field by reference name, falling back to the well-known core fields.
    pub fn field(&self, reference_name: &str) -> Option<Value> {
        if let Some(v) = self.fields.get(reference_name) {
            return Some(v.clone());
        }
        match reference_name {
            "System.Id" => Some(Value::from(self.id)),
            "System.Title" => Some(Value::from(self.title.clone())),
            "System.WorkItemType" => Some(Value::from(self.work_item_type.clone())),
            "System.State" => Some(Value::from(self.state.clone())),
            "System.TeamProject" => Some(Value::from(self.team_project.clone())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildDefinition {
    pub uri: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildDetail {
    pub uri: String,
    pub build_number: String,
    pub quality: String,
    pub team_project: String,
    pub keep_forever: bool,
    pub definition: BuildDefinition,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Changeset {
    pub id: i64,
    pub comment: String,
    pub committer: String,
    pub changes: Vec<String>,
}

/// The system the events come from.
pub trait BackendProvider: Send + Sync {
    /// Establish the caller identity for this run from the identity payload.
    fn unpack_identity(&self, identity_xml: &str) -> BackendResult<()>;

    fn get_work_item(&self, id: i64) -> BackendResult<WorkItem>;

    fn get_parent_work_item(&self, work_item: &WorkItem) -> BackendResult<Option<WorkItem>>;

    fn get_child_work_items(&self, work_item: &WorkItem) -> BackendResult<Vec<WorkItem>>;

    fn create_work_item(
        &self,
        team_project: &str,
        work_item_type: &str,
        fields: &BTreeMap<String, Value>,
    ) -> BackendResult<WorkItem>;

    fn update_work_item(&self, work_item: &WorkItem) -> BackendResult<()>;

    fn get_build_details(&self, build_uri: &str) -> BackendResult<BuildDetail>;

    fn set_build_retention(&self, build_uri: &str, keep_forever: bool) -> BackendResult<()>;

    fn get_changeset(&self, id: i64) -> BackendResult<Changeset>;

    /// Process argument of a build definition; `None` when not explicitly set.
    fn get_build_argument(&self, definition_uri: &str, key: &str) -> BackendResult<Option<Value>>;

    fn set_build_argument(&self, definition_uri: &str, key: &str, value: Value)
        -> BackendResult<()>;
}

/// Outbound alerts.
pub trait NotificationProvider: Send + Sync {
    fn send_alert(&self, to: &str, subject: &str, body: &str) -> BackendResult<()>;

    fn send_templated_alert(
        &self,
        lookup: &FieldLookup,
        template_path: &Path,
        include_work_item_fields: bool,
        include_alert_fields: bool,
    ) -> BackendResult<()>;
}
