//! Script execution.
//!
//! Every run gets a fresh `rhai::Engine` and `Scope`: the composed namespace
//! is bound into them, the event arguments are pushed as constants, and the
//! script runs to completion on the calling thread. Nothing is cached
//! between runs. Script output (`print`) goes straight to stdout.

use crate::error::{DslError, Result};
use crate::library::LibraryContext;
use crate::namespace::ScriptNamespace;
use alertdsl_core::{BackendProvider, Event, NotificationProvider};
use rhai::{Array, Dynamic, Engine, EvalAltResult, Scope};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Name the event arguments are published under.
pub const ARGUMENTS_NAME: &str = "Arguments";

/// Named values published to a script alongside the namespace.
#[derive(Debug, Clone, Default)]
pub struct ScriptArguments(BTreeMap<String, Dynamic>);

impl ScriptArguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Arguments = [label, primary key]`
    pub fn for_event(event: &Event) -> Self {
        let [label, key] = event.script_arguments();
        Self::new().with_list(ARGUMENTS_NAME, [label, key])
    }

    pub fn with(mut self, name: impl Into<String>, value: Dynamic) -> Self {
        self.0.insert(name.into(), value);
        self
    }

    pub fn with_list<I, S>(self, name: impl Into<String>, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list: Array = items.into_iter().map(|s| Dynamic::from(s.into())).collect();
        self.with(name, Dynamic::from_array(list))
    }

    pub fn get(&self, name: &str) -> Option<&Dynamic> {
        self.0.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.0.keys().map(|s| s.as_str()).collect()
    }

    fn push_into(&self, scope: &mut Scope<'_>) {
        for (name, value) in &self.0 {
            scope.push_constant_dynamic(name.clone(), value.clone());
        }
    }
}

/// Everything one script run needs besides the namespace. Built fresh per run.
#[derive(Debug, Clone)]
pub struct ScriptInvocationContext {
    pub script_path: PathBuf,
    pub arguments: ScriptArguments,
    pub event_xml: String,
    pub script_folder: PathBuf,
}

impl ScriptInvocationContext {
    /// The context every library of this run is attached to.
    pub fn library_context(
        &self,
        backend: Arc<dyn BackendProvider>,
        notifier: Arc<dyn NotificationProvider>,
    ) -> LibraryContext {
        LibraryContext::new(backend, notifier, self.event_xml.clone(), self.script_folder.clone())
    }
}

#[derive(Debug, Clone)]
pub struct ScriptEngine {
    base_folder: PathBuf,
    timeout: Option<Duration>,
}

impl ScriptEngine {
    pub fn new(base_folder: impl Into<PathBuf>) -> Self {
        Self {
            base_folder: base_folder.into(),
            timeout: None,
        }
    }

    /// Abort scripts that run longer than `limit`. Unbounded when `None`.
    pub fn with_timeout(mut self, limit: Option<Duration>) -> Self {
        self.timeout = limit;
        self
    }

    pub fn base_folder(&self) -> &Path {
        &self.base_folder
    }

    /// The script as given when it exists, else joined onto the base folder.
    pub fn resolve_path(&self, script: &str) -> Result<PathBuf> {
        if script.trim().is_empty() {
            return Err(DslError::validation("script name must not be empty"));
        }

        let given = PathBuf::from(script);
        if given.is_file() {
            return Ok(given);
        }

        let base = if self.base_folder.as_os_str().is_empty() {
            Path::new(".")
        } else {
            self.base_folder.as_path()
        };
        let joined = base.join(script);
        debug!(script, candidate = %joined.display(), "script not found as given, trying base folder");
        if joined.is_file() {
            Ok(joined)
        } else {
            error!(script = %joined.display(), "the script file could not be found");
            Err(DslError::ScriptNotFound(joined))
        }
    }

    /// Run `script` to completion against `namespace` and `arguments`.
    pub fn execute(
        &self,
        script: &str,
        namespace: &ScriptNamespace,
        arguments: &ScriptArguments,
    ) -> Result<()> {
        let path = self.resolve_path(script)?;
        self.run_file(&path, namespace, arguments)
    }

    pub fn invoke(&self, context: &ScriptInvocationContext, namespace: &ScriptNamespace) -> Result<()> {
        self.run_file(&context.script_path, namespace, &context.arguments)
    }

    /// Run an already resolved script file.
    pub fn run_file(
        &self,
        path: &Path,
        namespace: &ScriptNamespace,
        arguments: &ScriptArguments,
    ) -> Result<()> {
        let path = path.to_path_buf();
        let source = std::fs::read_to_string(&path)?;

        let mut engine = Engine::new();
        let mut scope = Scope::new();
        namespace.bind(&mut engine, &mut scope);
        arguments.push_into(&mut scope);

        let ast = engine
            .compile_with_scope(&scope, &source)
            .map_err(|e| DslError::Syntax { script: path.clone(), source: e })?;

        if let Some(limit) = self.timeout {
            let started = Instant::now();
            engine.on_progress(move |_| (started.elapsed() > limit).then_some(Dynamic::UNIT));
        }

        info!(script = %path.display(), bindings = namespace.len(), "running script");
        engine
            .run_ast_with_scope(&mut scope, &ast)
            .map_err(|e| self.failure(path.clone(), e))?;
        debug!(script = %path.display(), "script completed");
        Ok(())
    }

    fn failure(&self, script: PathBuf, err: Box<EvalAltResult>) -> DslError {
        let undefined = match root_cause(&err) {
            EvalAltResult::ErrorFunctionNotFound(name, _)
            | EvalAltResult::ErrorVariableNotFound(name, _) => Some(name.clone()),
            _ => None,
        };
        if let Some(name) = undefined {
            return DslError::UndefinedName { script, name, source: err };
        }

        match (self.timeout, root_cause(&err)) {
            (Some(limit), EvalAltResult::ErrorTerminated(..)) => DslError::TimedOut {
                script,
                limit_ms: limit.as_millis() as u64,
            },
            _ => DslError::Runtime { script, source: err },
        }
    }
}

/// The error under any script-function or module call frames.
fn root_cause(err: &EvalAltResult) -> &EvalAltResult {
    match err {
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _)
        | EvalAltResult::ErrorInModule(_, inner, _) => root_cause(inner),
        other => other,
    }
}
