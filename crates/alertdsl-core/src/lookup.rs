//! Field lookup handed to templated alerts.

use crate::provider::WorkItem;
use crate::xml::AlertField;
use serde_json::Value;

/// Resolves template placeholders against a work item and the alert that
/// announced its change.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldLookup {
    pub work_item: WorkItem,
    pub alert_fields: Vec<AlertField>,
    pub changed_by: String,
    pub show_missing_field_names: bool,
}

impl FieldLookup {
    pub fn new(
        work_item: WorkItem,
        alert_fields: Vec<AlertField>,
        changed_by: impl Into<String>,
        show_missing_field_names: bool,
    ) -> Self {
        Self {
            work_item,
            alert_fields,
            changed_by: changed_by.into(),
            show_missing_field_names,
        }
    }

    pub fn work_item_field(&self, reference_name: &str) -> String {
        match self.work_item.field(reference_name) {
            Some(Value::String(s)) => s,
            Some(Value::Null) => String::new(),
            Some(other) => other.to_string(),
            None => self.missing(reference_name),
        }
    }

    /// New (or old) value of a field changed by the alert.
    pub fn alert_field(&self, reference_name: &str, old_value: bool) -> String {
        self.alert_fields
            .iter()
            .find(|f| f.reference_name == reference_name)
            .map(|f| if old_value { f.old_value.clone() } else { f.new_value.clone() })
            .unwrap_or_else(|| self.missing(reference_name))
    }

    fn missing(&self, reference_name: &str) -> String {
        if self.show_missing_field_names {
            format!("[Field '{}' not found]", reference_name)
        } else {
            String::new()
        }
    }
}
