//! Error types for the DSL layer

use rhai::{EvalAltResult, ParseError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DslError {
    /// Caller passed something unusable; a programming error, not an event problem.
    #[error("invalid argument: {0}")]
    Validation(String),

    #[error("plugin directory {} does not exist", .0.display())]
    NoDirectory(PathBuf),

    #[error("no extension libraries found in {}", .0.display())]
    NoLibraries(PathBuf),

    #[error("the script file '{}' could not be found", .0.display())]
    ScriptNotFound(PathBuf),

    #[error("syntax error in script {}", .script.display())]
    Syntax {
        script: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("script {} references undefined name '{name}'", .script.display())]
    UndefinedName {
        script: PathBuf,
        name: String,
        #[source]
        source: Box<EvalAltResult>,
    },

    #[error("script {} failed", .script.display())]
    Runtime {
        script: PathBuf,
        #[source]
        source: Box<EvalAltResult>,
    },

    #[error("script {} exceeded its {limit_ms}ms limit", .script.display())]
    TimedOut { script: PathBuf, limit_ms: u64 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DslError>;

/// Why a plugin manifest was unusable. Discovery logs it and moves on.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("cannot read manifest {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid manifest {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl DslError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Discovery failures end a run without executing anything.
    pub fn is_discovery_failure(&self) -> bool {
        matches!(self, Self::NoDirectory(_) | Self::NoLibraries(_))
    }
}
