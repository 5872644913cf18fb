//! A small second library. Shows that several libraries compose into one
//! namespace and can share the run's notifier.

use super::script_error;
use crate::library::{Exports, ExtensionLibrary, LibraryContext};
use rhai::{ImmutableString, INT};

#[derive(Debug, Default)]
pub struct SampleLibrary {
    context: Option<LibraryContext>,
}

impl SampleLibrary {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ExtensionLibrary for SampleLibrary {
    fn name(&self) -> &str {
        "sample"
    }

    fn description(&self) -> &str {
        "Arithmetic and a plain email helper"
    }

    fn attach(&mut self, context: LibraryContext) {
        self.context = Some(context);
    }

    fn context(&self) -> Option<&LibraryContext> {
        self.context.as_ref()
    }

    fn exports(&self) -> Exports {
        let exports = Exports::new().function("add", |engine, name| {
            engine.register_fn(name, |a: INT, b: INT| a + b);
        });

        let Some(context) = &self.context else {
            return exports;
        };
        let notifier = context.notifier.clone();
        exports.function("sample_send_email", move |engine, name| {
            let notifier = notifier.clone();
            engine.register_fn(
                name,
                move |to: ImmutableString, subject: ImmutableString, body: ImmutableString| {
                    notifier
                        .send_alert(&to, &subject, &body)
                        .map_err(|e| script_error("sample_send_email", e))
                },
            );
        })
    }
}
