//! The notification entry point.
//!
//! One call to [`DslScriptService::notify`] is one run: unpack identity,
//! classify, resolve the script, discover libraries, compose the namespace
//! and execute. Every failure is logged with its cause chain and swallowed;
//! the caller only ever gets a report back.

use crate::config::ServiceConfig;
use alertdsl_core::{BackendProvider, Event, EventClassifier, EventKind, NotificationProvider};
use alertdsl_dsl::{
    compose, create_default_catalog, DslError, LibraryCatalog, PluginRegistry, ScriptArguments,
    ScriptEngine, ScriptInvocationContext, ScriptResolver,
};
use anyhow::Context;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Received,
    IdentityUnpacked,
    Classified,
    ScriptResolved,
    PluginsDiscovered,
    NamespaceComposed,
    Dispatched,
    AbortedNoDirectory,
    AbortedNoLibraries,
    AbortedNoScript,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Dispatched
                | Self::AbortedNoDirectory
                | Self::AbortedNoLibraries
                | Self::AbortedNoScript
                | Self::Failed
        )
    }

    /// Terminal state for a run that stopped on `err`.
    fn aborted_by(err: &anyhow::Error) -> Self {
        match err.downcast_ref::<DslError>() {
            Some(DslError::NoDirectory(_)) => Self::AbortedNoDirectory,
            Some(DslError::NoLibraries(_)) => Self::AbortedNoLibraries,
            Some(DslError::ScriptNotFound(_)) => Self::AbortedNoScript,
            _ => Self::Failed,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Outcome of one run. The wire surfaces drop it; tests and the CLI read it.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub state: RunState,
    pub event: Option<Event>,
}

struct Run {
    state: RunState,
    event: Option<Event>,
}

impl Run {
    fn advance(&mut self, state: RunState) {
        debug!(from = %self.state, to = %state, "run state");
        self.state = state;
    }
}

pub struct DslScriptService {
    backend: Arc<dyn BackendProvider>,
    notifier: Arc<dyn NotificationProvider>,
    config: ServiceConfig,
    catalog: LibraryCatalog,
    classifier: EventClassifier,
}

impl DslScriptService {
    pub fn new(
        backend: Arc<dyn BackendProvider>,
        notifier: Arc<dyn NotificationProvider>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            backend,
            notifier,
            config,
            catalog: create_default_catalog(),
            classifier: EventClassifier::default(),
        }
    }

    pub fn with_catalog(mut self, catalog: LibraryCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn catalog(&self) -> &LibraryCatalog {
        &self.catalog
    }

    /// Handle one notification. Never fails; see the returned state for
    /// how far the run got.
    pub fn notify(&self, event_xml: &str, identity_xml: &str) -> RunReport {
        let run_id = Uuid::new_v4();
        let span = info_span!("notify", %run_id);
        let _enter = span.enter();

        let mut run = Run {
            state: RunState::Received,
            event: None,
        };

        if let Err(err) = self.run(&mut run, event_xml, identity_xml) {
            let state = RunState::aborted_by(&err);
            match state {
                RunState::Failed => error!(after = %run.state, "notification run failed"),
                _ => warn!(after = %run.state, outcome = %state, "notification run aborted"),
            }
            for (depth, cause) in err.chain().enumerate() {
                error!(depth, "{}", cause);
            }
            run.state = state;
        }

        info!(state = %run.state, "notification run finished");
        RunReport {
            run_id,
            state: run.state,
            event: run.event,
        }
    }

    fn run(&self, run: &mut Run, event_xml: &str, identity_xml: &str) -> anyhow::Result<()> {
        self.backend
            .unpack_identity(identity_xml)
            .context("unpacking caller identity")?;
        run.advance(RunState::IdentityUnpacked);

        let event = self
            .classifier
            .classify(event_xml)
            .context("classifying event")?;
        info!(event = %event, "event classified");
        run.event = Some(event.clone());
        run.advance(RunState::Classified);

        let resolver = ScriptResolver::new(self.config.script_extension.clone());
        let explicit = self.config.script_override(event.kind() == EventKind::Unknown);
        let script = resolver.resolve(event.label(), explicit)?;
        let engine = ScriptEngine::new(&self.config.script_folder)
            .with_timeout(self.config.script_timeout());
        let script_path = engine.resolve_path(&script)?;
        run.advance(RunState::ScriptResolved);

        let mut libraries = PluginRegistry::new(&self.catalog).discover(&self.config.dsl_folder)?;
        run.advance(RunState::PluginsDiscovered);

        let invocation = ScriptInvocationContext {
            script_path,
            arguments: ScriptArguments::for_event(&event),
            event_xml: event_xml.to_string(),
            script_folder: self.config.script_folder.clone(),
        };
        let context = invocation.library_context(self.backend.clone(), self.notifier.clone());
        let namespace = compose(libraries.iter_mut().map(|d| &mut d.library), &context);
        debug!(names = ?namespace.names(), "namespace composed");
        run.advance(RunState::NamespaceComposed);

        engine.invoke(&invocation, &namespace)?;
        run.advance(RunState::Dispatched);
        Ok(())
    }
}
