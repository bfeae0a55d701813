//! Widget bindings announced when the document becomes ready.

use crate::model::options::Options;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Option key carrying the binding list passed to the widget activator.
pub const WIDGETS_OPTION_KEY: &str = "widgets";

/// Pairing of a presentation class marker with the module that renders it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetBinding {
    pub associated_class: String,
    pub module_id: String,
}

impl WidgetBinding {
    pub fn new(associated_class: impl Into<String>, module_id: impl Into<String>) -> Self {
        Self {
            associated_class: associated_class.into(),
            module_id: module_id.into(),
        }
    }
}

/// Builds the `{ "widgets": [...] }` option mapping for the activator.
pub fn widget_options(bindings: &[WidgetBinding]) -> Options {
    let list = bindings
        .iter()
        .map(|binding| {
            let mut entry = Options::new();
            entry.insert(
                "associatedClass".to_string(),
                Value::String(binding.associated_class.clone()),
            );
            entry.insert(
                "moduleId".to_string(),
                Value::String(binding.module_id.clone()),
            );
            Value::Object(entry)
        })
        .collect();

    let mut options = Options::new();
    options.insert(WIDGETS_OPTION_KEY.to_string(), Value::Array(list));
    options
}

/// Reads the binding list back out of activator options.
///
/// A missing `widgets` key yields an empty list.
pub fn parse_widget_bindings(options: &Options) -> Result<Vec<WidgetBinding>, serde_json::Error> {
    match options.get(WIDGETS_OPTION_KEY) {
        Some(value) => serde_json::from_value(value.clone()),
        None => Ok(vec![]),
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_widget_bindings, widget_options, WidgetBinding, WIDGETS_OPTION_KEY};
    use serde_json::json;

    #[test]
    fn widget_options_use_camel_case_keys() {
        let options = widget_options(&[WidgetBinding::new("clock", "clockWidget")]);
        assert_eq!(
            options[WIDGETS_OPTION_KEY],
            json!([{ "associatedClass": "clock", "moduleId": "clockWidget" }])
        );
    }

    #[test]
    fn parses_bindings_back() {
        let bindings = vec![
            WidgetBinding::new("clock", "clockWidget"),
            WidgetBinding::new("feed", "newsFeed"),
        ];
        let parsed = parse_widget_bindings(&widget_options(&bindings)).expect("valid bindings");
        assert_eq!(parsed, bindings);
    }

    #[test]
    fn malformed_bindings_fail_to_parse() {
        let mut options = super::Options::new();
        options.insert(WIDGETS_OPTION_KEY.to_string(), json!([{ "moduleId": 3 }]));
        assert!(parse_widget_bindings(&options).is_err());
    }
}
