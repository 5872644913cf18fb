//! Built-in extension libraries and the conversions they share.

pub mod sample;
pub mod tfs;

use alertdsl_core::BackendError;
use rhai::{Dynamic, EvalAltResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub(crate) type ScriptResult<T> = Result<T, Box<EvalAltResult>>;

/// Records cross into scripts as object maps.
pub(crate) fn to_script<T: Serialize>(value: &T) -> ScriptResult<Dynamic> {
    rhai::serde::to_dynamic(value)
}

pub(crate) fn from_script<T: DeserializeOwned>(value: &Dynamic) -> ScriptResult<T> {
    rhai::serde::from_dynamic(value)
}

/// Surface a collaborator failure as a script error, which aborts the run.
pub(crate) fn script_error(operation: &str, err: BackendError) -> Box<EvalAltResult> {
    format!("{} failed: {}", operation, err).into()
}

/// Text form of a log argument. Arrays render as `List: [a] [b] `.
pub(crate) fn render_message(message: &Dynamic) -> String {
    match message.clone().into_array() {
        Ok(items) => {
            let mut out = String::from("List: ");
            for item in items {
                out.push_str(&format!("[{}] ", item));
            }
            out
        }
        Err(_) => message.to_string(),
    }
}
