//! Runtime configuration.
//!
//! # Responsibility
//! - Name the well-known collaborator modules and lifecycle channels.
//! - Select how the mediator reacts to failing subscribers.
//!
//! # Invariants
//! - Every id, channel and key field is non-empty after `validate()`.
//! - Missing JSON fields fall back to the defaults below.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const DEFAULT_WIDGET_ACTIVATOR_MODULE_ID: &str = "__startWidgets__";
pub const DEFAULT_LIFECYCLE_NOTIFIER_MODULE_ID: &str = "__notifyDOMEvents__";
pub const DEFAULT_READY_CHANNEL: &str = "documentReady";
pub const DEFAULT_LOADED_CHANNEL: &str = "documentLoaded";
pub const DEFAULT_ASSOCIATED_CLASS_KEY: &str = "associatedClass";

/// Mediator behavior when a subscriber callback returns an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchPolicy {
    /// Report the failure and keep invoking the remaining subscribers.
    #[default]
    Continue,
    /// Report the failure and skip the remaining subscribers.
    Abort,
}

/// Settings for one runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Module started with the widget binding list on every ready publish.
    pub widget_activator_module_id: String,
    /// Module started once by `Core::boot`.
    pub lifecycle_notifier_module_id: String,
    pub ready_channel: String,
    pub loaded_channel: String,
    /// Default-option key that marks a module as a widget.
    pub associated_class_key: String,
    pub dispatch_policy: DispatchPolicy,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            widget_activator_module_id: DEFAULT_WIDGET_ACTIVATOR_MODULE_ID.to_string(),
            lifecycle_notifier_module_id: DEFAULT_LIFECYCLE_NOTIFIER_MODULE_ID.to_string(),
            ready_channel: DEFAULT_READY_CHANNEL.to_string(),
            loaded_channel: DEFAULT_LOADED_CHANNEL.to_string(),
            associated_class_key: DEFAULT_ASSOCIATED_CLASS_KEY.to_string(),
            dispatch_policy: DispatchPolicy::default(),
        }
    }
}

impl RuntimeConfig {
    /// Parses and validates a JSON configuration document.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("widget_activator_module_id", &self.widget_activator_module_id),
            (
                "lifecycle_notifier_module_id",
                &self.lifecycle_notifier_module_id,
            ),
            ("ready_channel", &self.ready_channel),
            ("loaded_channel", &self.loaded_channel),
            ("associated_class_key", &self.associated_class_key),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(ConfigError::EmptyField(name));
            }
        }
        Ok(())
    }
}

/// Configuration parse and validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Parse(String),
    EmptyField(&'static str),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(message) => write!(f, "runtime config is not valid JSON: {message}"),
            Self::EmptyField(name) => write!(f, "runtime config field `{name}` must not be empty"),
        }
    }
}

impl Error for ConfigError {}
