//! The backend library: work items, builds, changesets, build arguments,
//! alerts and logging, callable from scripts.

use super::{from_script, render_message, script_error, to_script, ScriptResult};
use crate::library::{Exports, ExtensionLibrary, LibraryContext};
use alertdsl_core::{xml, FieldLookup, WorkItem};
use rhai::{Dynamic, Engine, ImmutableString, INT};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const MAJOR_VERSION: &str = "MajorVersion";
const MINOR_VERSION: &str = "MinorVersion";
const VERSION_START_DATE: &str = "VersionStartDate";

#[derive(Debug, Default)]
pub struct TfsLibrary {
    context: Option<LibraryContext>,
}

impl TfsLibrary {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ExtensionLibrary for TfsLibrary {
    fn name(&self) -> &str {
        "tfs"
    }

    fn description(&self) -> &str {
        "Work items, builds, changesets and alerts"
    }

    fn attach(&mut self, context: LibraryContext) {
        self.context = Some(context);
    }

    fn context(&self) -> Option<&LibraryContext> {
        self.context.as_ref()
    }

    fn exports(&self) -> Exports {
        let exports = Exports::new()
            .function("log_info_message", |engine, name| {
                engine.register_fn(name, |msg: Dynamic| info!(target: "alertdsl::script", "{}", render_message(&msg)));
            })
            .function("log_debug_message", |engine, name| {
                engine.register_fn(name, |msg: Dynamic| debug!(target: "alertdsl::script", "{}", render_message(&msg)));
            })
            .function("log_error_message", |engine, name| {
                engine.register_fn(name, |msg: Dynamic| error!(target: "alertdsl::script", "{}", render_message(&msg)));
            });

        let Some(context) = &self.context else {
            warn!("tfs library exported before attach; only logging is available");
            return exports;
        };
        let ops = Arc::new(Operations { context: context.clone() });

        exports
            .value("event_xml", Dynamic::from(context.event_xml.clone()))
            .function("current_script_folder", bind(&ops, |ops, engine, name| {
                engine.register_fn(name, move || ops.current_script_folder());
            }))
            .function("get_work_item", bind(&ops, |ops, engine, name| {
                engine.register_fn(name, move |id: INT| ops.get_work_item(id));
            }))
            .function("get_parent_work_item", bind(&ops, |ops, engine, name| {
                engine.register_fn(name, move |wi: Dynamic| ops.get_parent_work_item(&wi));
            }))
            .function("get_child_work_items", bind(&ops, |ops, engine, name| {
                engine.register_fn(name, move |wi: Dynamic| ops.get_child_work_items(&wi));
            }))
            .function("create_work_item", bind(&ops, |ops, engine, name| {
                engine.register_fn(
                    name,
                    move |project: ImmutableString, wi_type: ImmutableString, fields: Dynamic| {
                        ops.create_work_item(&project, &wi_type, &fields)
                    },
                );
            }))
            .function("update_work_item", bind(&ops, |ops, engine, name| {
                engine.register_fn(name, move |wi: Dynamic| ops.update_work_item(&wi));
            }))
            .function("get_build_details", bind(&ops, |ops, engine, name| {
                engine.register_fn(name, move |uri: ImmutableString| ops.get_build_details(&uri));
            }))
            .function("set_build_retention", bind(&ops, |ops, engine, name| {
                engine.register_fn(name, move |uri: ImmutableString, keep: bool| {
                    ops.set_build_retention(&uri, keep)
                });
            }))
            .function("get_changeset", bind(&ops, |ops, engine, name| {
                engine.register_fn(name, move |id: INT| ops.get_changeset(id));
            }))
            .function("get_build_argument", bind(&ops, |ops, engine, name| {
                engine.register_fn(name, move |uri: ImmutableString, key: ImmutableString| {
                    ops.get_build_argument(&uri, &key)
                });
            }))
            .function("set_build_argument", bind(&ops, |ops, engine, name| {
                engine.register_fn(
                    name,
                    move |uri: ImmutableString, key: ImmutableString, value: Dynamic| {
                        ops.set_build_argument(&uri, &key, &value)
                    },
                );
            }))
            .function("get_version_number", bind(&ops, |ops, engine, name| {
                engine.register_fn(name, move |uri: ImmutableString| ops.get_version_number(&uri));
            }))
            .function("increment_build_number", bind(&ops, |ops, engine, name| {
                engine.register_fn(name, move |uri: ImmutableString| ops.increment_build_number(&uri));
            }))
            .function("send_email", bind(&ops, |ops, engine, name| {
                let plain = ops.clone();
                engine.register_fn(
                    name,
                    move |to: ImmutableString, subject: ImmutableString, body: ImmutableString| {
                        plain.send_email(&to, &subject, &body)
                    },
                );
                engine.register_fn(
                    name,
                    move |id: INT,
                          template: ImmutableString,
                          dump_work_item: bool,
                          dump_alert: bool,
                          show_missing: bool| {
                        ops.send_templated_email(id, &template, dump_work_item, dump_alert, show_missing)
                    },
                );
            }))
    }
}

/// Adapts an operation registration to a binder, handing it its own
/// handle on the shared operations.
fn bind<F>(ops: &Arc<Operations>, register: F) -> impl Fn(&mut Engine, &str) + Send + Sync + 'static
where
    F: Fn(Arc<Operations>, &mut Engine, &str) + Send + Sync + 'static,
{
    let ops = ops.clone();
    move |engine: &mut Engine, name: &str| register(ops.clone(), engine, name)
}

struct Operations {
    context: LibraryContext,
}

impl Operations {
    fn current_script_folder(&self) -> String {
        self.context.script_folder.display().to_string()
    }

    fn get_work_item(&self, id: INT) -> ScriptResult<Dynamic> {
        let wi = self
            .context
            .backend
            .get_work_item(id)
            .map_err(|e| script_error("get_work_item", e))?;
        to_script(&wi)
    }

    fn get_parent_work_item(&self, wi: &Dynamic) -> ScriptResult<Dynamic> {
        let wi: WorkItem = from_script(wi)?;
        let parent = self
            .context
            .backend
            .get_parent_work_item(&wi)
            .map_err(|e| script_error("get_parent_work_item", e))?;
        to_script(&parent)
    }

    fn get_child_work_items(&self, wi: &Dynamic) -> ScriptResult<Dynamic> {
        let wi: WorkItem = from_script(wi)?;
        let children = self
            .context
            .backend
            .get_child_work_items(&wi)
            .map_err(|e| script_error("get_child_work_items", e))?;
        to_script(&children)
    }

    fn create_work_item(&self, project: &str, wi_type: &str, fields: &Dynamic) -> ScriptResult<Dynamic> {
        let fields: BTreeMap<String, Value> = from_script(fields)?;
        let wi = self
            .context
            .backend
            .create_work_item(project, wi_type, &fields)
            .map_err(|e| script_error("create_work_item", e))?;
        to_script(&wi)
    }

    fn update_work_item(&self, wi: &Dynamic) -> ScriptResult<()> {
        let wi: WorkItem = from_script(wi)?;
        self.context
            .backend
            .update_work_item(&wi)
            .map_err(|e| script_error("update_work_item", e))
    }

    fn get_build_details(&self, uri: &str) -> ScriptResult<Dynamic> {
        let build = self
            .context
            .backend
            .get_build_details(uri)
            .map_err(|e| script_error("get_build_details", e))?;
        to_script(&build)
    }

    fn set_build_retention(&self, uri: &str, keep_forever: bool) -> ScriptResult<()> {
        self.context
            .backend
            .set_build_retention(uri, keep_forever)
            .map_err(|e| script_error("set_build_retention", e))
    }

    fn get_changeset(&self, id: INT) -> ScriptResult<Dynamic> {
        let changeset = self
            .context
            .backend
            .get_changeset(id)
            .map_err(|e| script_error("get_changeset", e))?;
        to_script(&changeset)
    }

    fn definition_uri(&self, build_uri: &str) -> ScriptResult<String> {
        self.context
            .backend
            .get_build_details(build_uri)
            .map(|b| b.definition.uri)
            .map_err(|e| script_error("get_build_details", e))
    }

    fn build_argument(&self, definition_uri: &str, key: &str) -> ScriptResult<Option<Value>> {
        self.context
            .backend
            .get_build_argument(definition_uri, key)
            .map_err(|e| script_error("get_build_argument", e))
    }

    fn store_build_argument(&self, definition_uri: &str, key: &str, value: Value) -> ScriptResult<()> {
        self.context
            .backend
            .set_build_argument(definition_uri, key, value)
            .map_err(|e| script_error("set_build_argument", e))
    }

    fn get_build_argument(&self, build_uri: &str, key: &str) -> ScriptResult<Dynamic> {
        let definition = self.definition_uri(build_uri)?;
        to_script(&self.build_argument(&definition, key)?)
    }

    fn set_build_argument(&self, build_uri: &str, key: &str, value: &Dynamic) -> ScriptResult<()> {
        let definition = self.definition_uri(build_uri)?;
        let value: Value = from_script(value)?;
        self.store_build_argument(&definition, key, value)
    }

    /// `Major.Minor.[days since start].[build count]`
    fn get_version_number(&self, build_uri: &str) -> ScriptResult<String> {
        let definition = self.definition_uri(build_uri)?;
        let major = self.build_argument(&definition, MAJOR_VERSION)?;
        let minor = self.build_argument(&definition, MINOR_VERSION)?;
        let start = self.build_argument(&definition, VERSION_START_DATE)?;
        Ok(format!(
            "{}.{}.[days since {}].[build count]",
            argument_text(major.as_ref()),
            argument_text(minor.as_ref()),
            argument_text(start.as_ref())
        ))
    }

    /// Bump `MinorVersion` and restart the version date. An unset minor
    /// version is left alone.
    fn increment_build_number(&self, build_uri: &str) -> ScriptResult<()> {
        let definition = self.definition_uri(build_uri)?;
        let Some(current) = self.build_argument(&definition, MINOR_VERSION)? else {
            info!(
                argument = MINOR_VERSION,
                "argument is not set; it may be unused by this build template or only have a default value"
            );
            return Ok(());
        };

        let current = argument_text(Some(&current));
        info!(argument = MINOR_VERSION, old = %current, "incrementing build argument");
        let next = current.trim().parse::<i64>().unwrap_or(0) + 1;
        info!(argument = MINOR_VERSION, new = next, "updated build argument");

        self.store_build_argument(&definition, MINOR_VERSION, Value::from(next.to_string()))?;
        let today = chrono::Local::now().date_naive().to_string();
        self.store_build_argument(&definition, VERSION_START_DATE, Value::from(today))
    }

    fn send_email(&self, to: &str, subject: &str, body: &str) -> ScriptResult<()> {
        self.context
            .notifier
            .send_alert(to, subject, body)
            .map_err(|e| script_error("send_email", e))
    }

    fn send_templated_email(
        &self,
        work_item_id: INT,
        template: &str,
        dump_work_item: bool,
        dump_alert: bool,
        show_missing: bool,
    ) -> ScriptResult<()> {
        let doc = xml::parse(&self.context.event_xml)
            .map_err(|e| -> Box<rhai::EvalAltResult> { format!("send_email failed: {}", e).into() })?;
        let alert_fields = xml::changed_fields(&doc);
        let changed_by = xml::changed_by(&doc).unwrap_or_default();

        let wi = self
            .context
            .backend
            .get_work_item(work_item_id)
            .map_err(|e| script_error("get_work_item", e))?;
        let lookup = FieldLookup::new(wi, alert_fields, changed_by, show_missing);

        self.context
            .notifier
            .send_templated_alert(&lookup, Path::new(template), dump_work_item, dump_alert)
            .map_err(|e| script_error("send_email", e))
    }
}

/// Display form of a build argument; unset renders empty.
fn argument_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
