//! In-memory collaborators for tests and dry runs.
//!
//! `FakeBackend` serves work items, builds and changesets from memory and
//! records every call; `RecordingNotifier` records alerts instead of sending
//! them. The backend can be seeded from a JSON fixture file. A long-lived
//! process pairs `FakeBackend::without_call_log` with `LogNotifier` so that
//! nothing accumulates between runs.

use crate::error::{BackendError, BackendResult};
use crate::lookup::FieldLookup;
use crate::provider::{BackendProvider, BuildDetail, Changeset, NotificationProvider, WorkItem};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::info;

/// Seed data for a [`FakeBackend`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Fixtures {
    pub work_items: Vec<WorkItem>,
    pub builds: Vec<BuildDetail>,
    pub changesets: Vec<Changeset>,
    /// definition uri -> argument name -> value
    pub build_arguments: BTreeMap<String, BTreeMap<String, Value>>,
}

impl Fixtures {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    UnpackIdentity(String),
    GetWorkItem(i64),
    GetParentWorkItem(i64),
    GetChildWorkItems(i64),
    CreateWorkItem { team_project: String, work_item_type: String },
    UpdateWorkItem(WorkItem),
    GetBuildDetails(String),
    SetBuildRetention { build_uri: String, keep_forever: bool },
    GetChangeset(i64),
    GetBuildArgument { definition_uri: String, key: String },
    SetBuildArgument { definition_uri: String, key: String, value: Value },
}

#[derive(Debug, Default)]
struct Store {
    work_items: BTreeMap<i64, WorkItem>,
    builds: BTreeMap<String, BuildDetail>,
    changesets: BTreeMap<i64, Changeset>,
    build_arguments: BTreeMap<String, BTreeMap<String, Value>>,
}

/// A panicking holder leaves the data intact; keep serving it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
pub struct FakeBackend {
    store: Mutex<Store>,
    /// `None` when calls are not recorded.
    calls: Option<Mutex<Vec<BackendCall>>>,
    failure: Mutex<Option<BackendError>>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            store: Mutex::default(),
            calls: Some(Mutex::default()),
            failure: Mutex::default(),
        }
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop recording calls; `calls()` stays empty from here on.
    pub fn without_call_log(mut self) -> Self {
        self.calls = None;
        self
    }

    pub fn from_fixtures(fixtures: Fixtures) -> Self {
        let backend = Self::new();
        {
            let mut store = lock(&backend.store);
            store.work_items = fixtures.work_items.into_iter().map(|w| (w.id, w)).collect();
            store.builds = fixtures.builds.into_iter().map(|b| (b.uri.clone(), b)).collect();
            store.changesets = fixtures.changesets.into_iter().map(|c| (c.id, c)).collect();
            store.build_arguments = fixtures.build_arguments;
        }
        backend
    }

    pub fn with_work_item(self, work_item: WorkItem) -> Self {
        lock(&self.store).work_items.insert(work_item.id, work_item);
        self
    }

    pub fn with_build(self, build: BuildDetail) -> Self {
        lock(&self.store).builds.insert(build.uri.clone(), build);
        self
    }

    pub fn with_changeset(self, changeset: Changeset) -> Self {
        lock(&self.store).changesets.insert(changeset.id, changeset);
        self
    }

    pub fn with_build_argument(self, definition_uri: &str, key: &str, value: Value) -> Self {
        lock(&self.store)
            .build_arguments
            .entry(definition_uri.to_string())
            .or_default()
            .insert(key.to_string(), value);
        self
    }

    /// Make every subsequent data call fail with `error`.
    pub fn fail_with(&self, error: BackendError) {
        *lock(&self.failure) = Some(error);
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls
            .as_ref()
            .map(|calls| lock(calls).clone())
            .unwrap_or_default()
    }

    pub fn work_item(&self, id: i64) -> Option<WorkItem> {
        lock(&self.store).work_items.get(&id).cloned()
    }

    pub fn build_argument(&self, definition_uri: &str, key: &str) -> Option<Value> {
        lock(&self.store)
            .build_arguments
            .get(definition_uri)
            .and_then(|args| args.get(key))
            .cloned()
    }

    fn log_call(&self, call: BackendCall) {
        if let Some(calls) = &self.calls {
            lock(calls).push(call);
        }
    }

    fn record(&self, call: BackendCall) -> BackendResult<()> {
        self.log_call(call);
        match lock(&self.failure).as_ref() {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

impl BackendProvider for FakeBackend {
    fn unpack_identity(&self, identity_xml: &str) -> BackendResult<()> {
        self.log_call(BackendCall::UnpackIdentity(identity_xml.to_string()));
        Ok(())
    }

    fn get_work_item(&self, id: i64) -> BackendResult<WorkItem> {
        self.record(BackendCall::GetWorkItem(id))?;
        self.work_item(id)
            .ok_or_else(|| BackendError::not_found("work item", id))
    }

    fn get_parent_work_item(&self, work_item: &WorkItem) -> BackendResult<Option<WorkItem>> {
        self.record(BackendCall::GetParentWorkItem(work_item.id))?;
        let store = lock(&self.store);
        Ok(work_item
            .parent_id
            .and_then(|pid| store.work_items.get(&pid).cloned()))
    }

    fn get_child_work_items(&self, work_item: &WorkItem) -> BackendResult<Vec<WorkItem>> {
        self.record(BackendCall::GetChildWorkItems(work_item.id))?;
        let store = lock(&self.store);
        Ok(store
            .work_items
            .values()
            .filter(|w| w.parent_id == Some(work_item.id))
            .cloned()
            .collect())
    }

    fn create_work_item(
        &self,
        team_project: &str,
        work_item_type: &str,
        fields: &BTreeMap<String, Value>,
    ) -> BackendResult<WorkItem> {
        self.record(BackendCall::CreateWorkItem {
            team_project: team_project.to_string(),
            work_item_type: work_item_type.to_string(),
        })?;
        let mut store = lock(&self.store);
        let id = store.work_items.keys().next_back().copied().unwrap_or(0) + 1;
        let work_item = WorkItem {
            id,
            title: fields
                .get("System.Title")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            work_item_type: work_item_type.to_string(),
            state: "New".to_string(),
            team_project: team_project.to_string(),
            parent_id: None,
            fields: fields.clone(),
        };
        store.work_items.insert(id, work_item.clone());
        Ok(work_item)
    }

    fn update_work_item(&self, work_item: &WorkItem) -> BackendResult<()> {
        self.record(BackendCall::UpdateWorkItem(work_item.clone()))?;
        let mut store = lock(&self.store);
        if !store.work_items.contains_key(&work_item.id) {
            return Err(BackendError::not_found("work item", work_item.id));
        }
        store.work_items.insert(work_item.id, work_item.clone());
        Ok(())
    }

    fn get_build_details(&self, build_uri: &str) -> BackendResult<BuildDetail> {
        self.record(BackendCall::GetBuildDetails(build_uri.to_string()))?;
        lock(&self.store)
            .builds
            .get(build_uri)
            .cloned()
            .ok_or_else(|| BackendError::not_found("build", build_uri))
    }

    fn set_build_retention(&self, build_uri: &str, keep_forever: bool) -> BackendResult<()> {
        self.record(BackendCall::SetBuildRetention {
            build_uri: build_uri.to_string(),
            keep_forever,
        })?;
        if let Some(build) = lock(&self.store).builds.get_mut(build_uri) {
            build.keep_forever = keep_forever;
        }
        Ok(())
    }

    fn get_changeset(&self, id: i64) -> BackendResult<Changeset> {
        self.record(BackendCall::GetChangeset(id))?;
        lock(&self.store)
            .changesets
            .get(&id)
            .cloned()
            .ok_or_else(|| BackendError::not_found("changeset", id))
    }

    fn get_build_argument(&self, definition_uri: &str, key: &str) -> BackendResult<Option<Value>> {
        self.record(BackendCall::GetBuildArgument {
            definition_uri: definition_uri.to_string(),
            key: key.to_string(),
        })?;
        Ok(self.build_argument(definition_uri, key))
    }

    fn set_build_argument(
        &self,
        definition_uri: &str,
        key: &str,
        value: Value,
    ) -> BackendResult<()> {
        self.record(BackendCall::SetBuildArgument {
            definition_uri: definition_uri.to_string(),
            key: key.to_string(),
            value: value.clone(),
        })?;
        lock(&self.store)
            .build_arguments
            .entry(definition_uri.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SentAlert {
    Plain {
        to: String,
        subject: String,
        body: String,
    },
    Templated {
        work_item_id: i64,
        template_path: PathBuf,
        include_work_item_fields: bool,
        include_alert_fields: bool,
    },
}

/// Notification provider that keeps what it was asked to send and logs it.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentAlert>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentAlert> {
        lock(&self.sent).clone()
    }
}

impl NotificationProvider for RecordingNotifier {
    fn send_alert(&self, to: &str, subject: &str, body: &str) -> BackendResult<()> {
        info!(to, subject, body, "alert");
        lock(&self.sent).push(SentAlert::Plain {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }

    fn send_templated_alert(
        &self,
        lookup: &FieldLookup,
        template_path: &Path,
        include_work_item_fields: bool,
        include_alert_fields: bool,
    ) -> BackendResult<()> {
        info!(
            work_item = lookup.work_item.id,
            template = %template_path.display(),
            "templated alert"
        );
        lock(&self.sent).push(SentAlert::Templated {
            work_item_id: lookup.work_item.id,
            template_path: template_path.to_path_buf(),
            include_work_item_fields,
            include_alert_fields,
        });
        Ok(())
    }
}

/// Notification provider that only logs. Holds no state.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl NotificationProvider for LogNotifier {
    fn send_alert(&self, to: &str, subject: &str, body: &str) -> BackendResult<()> {
        info!(to, subject, body, "alert");
        Ok(())
    }

    fn send_templated_alert(
        &self,
        lookup: &FieldLookup,
        template_path: &Path,
        _include_work_item_fields: bool,
        _include_alert_fields: bool,
    ) -> BackendResult<()> {
        info!(
            work_item = lookup.work_item.id,
            template = %template_path.display(),
            "templated alert"
        );
        Ok(())
    }
}
