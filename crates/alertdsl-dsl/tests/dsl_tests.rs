//! Tests for alertdsl-dsl: plugin discovery, namespace composition and
//! script execution against the in-memory backend.

use alertdsl_core::fakes::{BackendCall, FakeBackend, RecordingNotifier, SentAlert};
use alertdsl_core::{BuildDefinition, BuildDetail, Event, EventKind, WorkItem};
use alertdsl_dsl::*;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

fn demo_scripts() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../scripts")
}

fn plugin_dir(libraries: &[&str]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (i, library) in libraries.iter().enumerate() {
        fs::write(
            dir.path().join(format!("{:02}_{}.toml", i, library)),
            format!("library = \"{}\"", library),
        )
        .unwrap();
    }
    dir
}

struct Harness {
    backend: Arc<FakeBackend>,
    notifier: Arc<RecordingNotifier>,
    plugins: TempDir,
    scripts: PathBuf,
    event_xml: String,
}

impl Harness {
    fn new(backend: FakeBackend, libraries: &[&str]) -> Self {
        Self {
            backend: Arc::new(backend),
            notifier: Arc::new(RecordingNotifier::new()),
            plugins: plugin_dir(libraries),
            scripts: demo_scripts(),
            event_xml: "<Event/>".to_string(),
        }
    }

    fn scripts_in(mut self, dir: &Path) -> Self {
        self.scripts = dir.to_path_buf();
        self
    }

    fn namespace(&self) -> Result<ScriptNamespace> {
        let catalog = create_default_catalog();
        let mut found = PluginRegistry::new(&catalog).discover(self.plugins.path())?;
        let context = LibraryContext::new(
            self.backend.clone(),
            self.notifier.clone(),
            self.event_xml.clone(),
            self.scripts.clone(),
        );
        Ok(compose(found.iter_mut().map(|d| &mut d.library), &context))
    }

    fn run(&self, script: &str, event: &Event) -> Result<()> {
        let namespace = self.namespace()?;
        ScriptEngine::new(&self.scripts).execute(script, &namespace, &ScriptArguments::for_event(event))
    }
}

fn script_dir(name: &str, body: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(name), body).unwrap();
    dir
}

fn build(uri: &str, number: &str, quality: &str) -> BuildDetail {
    BuildDetail {
        uri: uri.to_string(),
        build_number: number.to_string(),
        quality: quality.to_string(),
        definition: BuildDefinition {
            uri: "vstfs:///Build/Definition/5".to_string(),
            name: "CTAppBox.Main.CI".to_string(),
        },
        ..Default::default()
    }
}

fn plain(to: &str, subject: &str, body: &str) -> SentAlert {
    SentAlert::Plain {
        to: to.to_string(),
        subject: subject.to_string(),
        body: body.to_string(),
    }
}

// ===========================================================================
// Composition across libraries
// ===========================================================================

#[test]
fn two_libraries_share_one_namespace() {
    let dir = script_dir(
        "add.rhai",
        r#"
        let result = add(1, 2);
        sample_send_email("fred@test.com", "The subject", `When you add 1 and 2 you get ${result}`);
        "#,
    );
    let h = Harness::new(FakeBackend::new(), &["tfs", "sample"]).scripts_in(dir.path());
    h.run("add.rhai", &Event::unknown()).unwrap();

    assert_eq!(
        h.notifier.sent(),
        vec![plain("fred@test.com", "The subject", "When you add 1 and 2 you get 3")]
    );
}

#[test]
fn duplicate_library_yields_one_binding_per_name() {
    let h = Harness::new(FakeBackend::new(), &["sample", "sample"]);
    let ns = h.namespace().unwrap();
    assert_eq!(ns.names(), vec!["add", "sample_send_email"]);
}

#[test]
fn namespace_holds_every_tfs_operation() {
    let h = Harness::new(FakeBackend::new(), &["tfs"]);
    let ns = h.namespace().unwrap();
    for name in [
        "get_work_item",
        "get_parent_work_item",
        "get_child_work_items",
        "create_work_item",
        "update_work_item",
        "get_build_details",
        "set_build_retention",
        "get_changeset",
        "get_build_argument",
        "set_build_argument",
        "get_version_number",
        "increment_build_number",
        "send_email",
        "current_script_folder",
        "log_info_message",
        "log_debug_message",
        "log_error_message",
        "event_xml",
    ] {
        assert!(ns.contains(name), "missing {}", name);
    }
}

// ===========================================================================
// Execution failures
// ===========================================================================

#[test]
fn missing_script_is_not_found() {
    let h = Harness::new(FakeBackend::new(), &["tfs"]);
    let err = h.run("no_such_script.rhai", &Event::unknown()).unwrap_err();
    assert!(matches!(err, DslError::ScriptNotFound(_)));
}

#[test]
fn syntax_error_is_reported() {
    let dir = script_dir("bad.rhai", "let x = ;");
    let h = Harness::new(FakeBackend::new(), &["tfs"]).scripts_in(dir.path());
    let err = h.run("bad.rhai", &Event::unknown()).unwrap_err();
    assert!(matches!(err, DslError::Syntax { .. }));
}

#[test]
fn unknown_operation_is_an_undefined_name() {
    let dir = script_dir("undefined.rhai", "frobnicate(1);");
    let h = Harness::new(FakeBackend::new(), &["tfs"]).scripts_in(dir.path());
    let err = h.run("undefined.rhai", &Event::unknown()).unwrap_err();
    match err {
        DslError::UndefinedName { name, .. } => assert!(name.contains("frobnicate"), "{}", name),
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn unknown_operation_inside_script_function_is_an_undefined_name() {
    let dir = script_dir("nested.rhai", "fn helper() { frobnicate(1); }\nhelper();");
    let h = Harness::new(FakeBackend::new(), &["tfs"]).scripts_in(dir.path());
    let err = h.run("nested.rhai", &Event::unknown()).unwrap_err();
    match err {
        DslError::UndefinedName { name, .. } => assert!(name.contains("frobnicate"), "{}", name),
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn unknown_variable_two_functions_deep_is_an_undefined_name() {
    let body = "fn outer() { inner() }\nfn inner() { missing_value + 1 }\nouter();";
    let dir = script_dir("deep.rhai", body);
    let h = Harness::new(FakeBackend::new(), &["tfs"]).scripts_in(dir.path());
    let err = h.run("deep.rhai", &Event::unknown()).unwrap_err();
    assert!(
        matches!(&err, DslError::UndefinedName { name, .. } if name == "missing_value"),
        "{:?}",
        err
    );
}

#[test]
fn backend_failure_aborts_the_script() {
    let dir = script_dir(
        "fetch.rhai",
        r#"
        let wi = get_work_item(7);
        send_email("a@b", "never", "sent");
        "#,
    );
    let backend = FakeBackend::new();
    backend.fail_with(alertdsl_core::BackendError::Unavailable("offline".into()));
    let h = Harness::new(backend, &["tfs"]).scripts_in(dir.path());
    let err = h.run("fetch.rhai", &Event::unknown()).unwrap_err();
    assert!(matches!(err, DslError::Runtime { .. }));
    assert!(h.notifier.sent().is_empty());
}

#[test]
fn arguments_reach_the_script() {
    let dir = script_dir(
        "args.rhai",
        r#"sample_send_email("x@y", Arguments[0], Arguments[1]);"#,
    );
    let h = Harness::new(FakeBackend::new(), &["sample"]).scripts_in(dir.path());
    h.run("args.rhai", &Event::new(EventKind::CheckIn, "62")).unwrap();
    assert_eq!(h.notifier.sent(), vec![plain("x@y", "CheckInEvent", "62")]);
}

// ===========================================================================
// Demo scripts end to end
// ===========================================================================

#[test]
fn retention_cleared_for_failed_quality() {
    let uri = "vstfs:///Build/Build/49";
    let backend = FakeBackend::new().with_build(build(uri, "CTAppBox.Main.CI_1.5.15.6731", "Test Failed"));
    let h = Harness::new(backend, &["tfs"]);
    h.run("setbuildretentionbyquality.rhai", &Event::new(EventKind::Build, uri)).unwrap();

    let retention: Vec<_> = h
        .backend
        .calls()
        .into_iter()
        .filter(|c| matches!(c, BackendCall::SetBuildRetention { .. }))
        .collect();
    assert_eq!(
        retention,
        vec![BackendCall::SetBuildRetention { build_uri: uri.to_string(), keep_forever: false }]
    );
    assert_eq!(
        h.notifier.sent(),
        vec![plain(
            "richard@typhoontfs",
            "CTAppBox.Main.CI_1.5.15.6731 quality changed",
            "'CTAppBox.Main.CI_1.5.15.6731' retention set to 'false' as quality was changed to 'Test Failed'"
        )]
    );
}

#[test]
fn retention_kept_for_other_quality() {
    let uri = "vstfs:///Build/Build/50";
    let backend = FakeBackend::new().with_build(build(uri, "123", "Released"));
    let h = Harness::new(backend, &["tfs"]);
    h.run("setbuildretentionbyquality.rhai", &Event::new(EventKind::Build, uri)).unwrap();
    assert!(h
        .backend
        .calls()
        .contains(&BackendCall::SetBuildRetention { build_uri: uri.to_string(), keep_forever: true }));
}

#[test]
fn wrong_event_kind_only_logs() {
    let h = Harness::new(FakeBackend::new(), &["tfs"]);
    h.run("setbuildretentionbyquality.rhai", &Event::new(EventKind::WorkItem, "99")).unwrap();
    assert!(h.backend.calls().is_empty());
    assert!(h.notifier.sent().is_empty());
}

#[test]
fn released_build_increments_minor_version() {
    let uri = "vstfs:///Build/Build/51";
    let definition = "vstfs:///Build/Definition/5";
    let backend = FakeBackend::new()
        .with_build(build(uri, "CTAppBox.Main.CI_1.5.15.6731", "Released"))
        .with_build_argument(definition, "MajorVersion", json!("1"))
        .with_build_argument(definition, "MinorVersion", json!("6"));
    let h = Harness::new(backend, &["tfs"]);
    h.run("incrementbuildargument.rhai", &Event::new(EventKind::Build, uri)).unwrap();

    assert_eq!(h.backend.build_argument(definition, "MinorVersion"), Some(json!("7")));
    let today = chrono::Local::now().date_naive().to_string();
    assert_eq!(h.backend.build_argument(definition, "VersionStartDate"), Some(json!(today)));
    assert_eq!(
        h.notifier.sent(),
        vec![plain(
            "richard@typhoontfs",
            "CTAppBox.Main.CI version incremented",
            &format!(
                "'CTAppBox.Main.CI' version incremented to 1.7.[days since {}].[build count] as last build quality set to 'Released'",
                today
            )
        )]
    );
}

#[test]
fn unset_minor_version_is_left_alone() {
    let uri = "vstfs:///Build/Build/52";
    let definition = "vstfs:///Build/Definition/5";
    let backend = FakeBackend::new().with_build(build(uri, "n", "Released"));
    let h = Harness::new(backend, &["tfs"]);
    h.run("incrementbuildargument.rhai", &Event::new(EventKind::Build, uri)).unwrap();
    assert_eq!(h.backend.build_argument(definition, "MinorVersion"), None);
    assert_eq!(h.backend.build_argument(definition, "VersionStartDate"), None);
}

#[test]
fn parent_closed_when_all_children_done() {
    let backend = FakeBackend::new()
        .with_work_item(WorkItem { id: 99, state: "Committed".into(), ..Default::default() })
        .with_work_item(WorkItem { id: 100, state: "Done".into(), parent_id: Some(99), ..Default::default() })
        .with_work_item(WorkItem { id: 101, state: "Done".into(), parent_id: Some(99), ..Default::default() });
    let h = Harness::new(backend, &["tfs"]);
    h.run("changeparentworkitemstate.rhai", &Event::new(EventKind::WorkItem, "100")).unwrap();

    assert_eq!(h.backend.work_item(99).unwrap().state, "Done");
    assert_eq!(
        h.notifier.sent(),
        vec![plain(
            "richard@typhoontfs",
            "Work item '99' has been updated",
            "Work item '99' has been set as 'Done' as all its child work items are done"
        )]
    );
}

#[test]
fn parent_untouched_while_a_child_is_open() {
    let backend = FakeBackend::new()
        .with_work_item(WorkItem { id: 99, state: "Committed".into(), ..Default::default() })
        .with_work_item(WorkItem { id: 100, state: "Done".into(), parent_id: Some(99), ..Default::default() })
        .with_work_item(WorkItem { id: 101, state: "In Progress".into(), parent_id: Some(99), ..Default::default() });
    let h = Harness::new(backend, &["tfs"]);
    h.run("changeparentworkitemstate.rhai", &Event::new(EventKind::WorkItem, "100")).unwrap();

    assert_eq!(h.backend.work_item(99).unwrap().state, "Committed");
    assert!(h.notifier.sent().is_empty());
}

#[test]
fn orphan_work_item_has_no_parent() {
    let backend = FakeBackend::new().with_work_item(WorkItem { id: 5, ..Default::default() });
    let h = Harness::new(backend, &["tfs"]);
    h.run("changeparentworkitemstate.rhai", &Event::new(EventKind::WorkItem, "5")).unwrap();
    assert!(!h
        .backend
        .calls()
        .iter()
        .any(|c| matches!(c, BackendCall::GetChildWorkItems(_))));
}

#[test]
fn templated_email_uses_script_folder() {
    let backend = FakeBackend::new().with_work_item(WorkItem { id: 416, ..Default::default() });
    let mut h = Harness::new(backend, &["tfs"]);
    h.event_xml = "<WorkItemChangedEvent><CoreFields><StringFields><Field>\
        <ReferenceName>System.ChangedBy</ReferenceName><NewValue>ann</NewValue>\
        </Field></StringFields></CoreFields></WorkItemChangedEvent>"
        .to_string();
    h.run("sendtemplatedemail.rhai", &Event::new(EventKind::WorkItem, "416")).unwrap();

    let expected_template = PathBuf::from(format!("{}/EmailTemplate.htm", demo_scripts().display()));
    assert_eq!(
        h.notifier.sent(),
        vec![SentAlert::Templated {
            work_item_id: 416,
            template_path: expected_template,
            include_work_item_fields: true,
            include_alert_fields: true,
        }]
    );
}

#[test]
fn records_round_trip_through_scripts() {
    let dir = script_dir(
        "create.rhai",
        r#"
        let wi = create_work_item("Scrum", "Task", #{ "System.Title": "Follow up" });
        wi.state = "Active";
        update_work_item(wi);
        set_build_argument("vstfs:///Build/Build/1", "Flag", 3);
        let flag = get_build_argument("vstfs:///Build/Build/1", "Flag");
        sample_send_email("a@b", wi.title, `${flag}`);
        "#,
    );
    let backend = FakeBackend::new().with_build(build("vstfs:///Build/Build/1", "n", "q"));
    let h = Harness::new(backend, &["tfs", "sample"]).scripts_in(dir.path());
    h.run("create.rhai", &Event::unknown()).unwrap();

    let created = h.backend.work_item(1).unwrap();
    assert_eq!(created.state, "Active");
    assert_eq!(created.title, "Follow up");
    assert_eq!(created.fields.get("System.Title"), Some(&json!("Follow up")));
    assert_eq!(h.notifier.sent(), vec![plain("a@b", "Follow up", "3")]);
}

// ===========================================================================
// Discovery failures
// ===========================================================================

#[test]
fn empty_plugin_directory_has_no_libraries() {
    let h = Harness::new(FakeBackend::new(), &[]);
    assert!(matches!(h.namespace(), Err(DslError::NoLibraries(_))));
}

#[test]
fn bundled_plugin_manifests_load() {
    let catalog = create_default_catalog();
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../plugins");
    let found = PluginRegistry::new(&catalog).discover(&dir).unwrap();
    let mut names: Vec<&str> = found.iter().map(|d| d.library.name()).collect();
    names.sort_unstable();
    assert_eq!(names, vec!["sample", "tfs"]);
}
