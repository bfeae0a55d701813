//! Module registry: validated factory descriptors keyed by module id.

use crate::error::{CoreError, CoreResult, ModuleError};
use crate::model::options::Options;
use crate::model::widget::WidgetBinding;
use crate::module::contract::{HookStyle, ModuleInstance};
use crate::runtime::sandbox::Sandbox;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

static CLASS_TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-?[_a-zA-Z][_a-zA-Z0-9-]*$").expect("valid class token regex")
});

/// Factory invoked with the instance's sandbox.
pub type ModuleFactory = Rc<dyn Fn(Sandbox) -> Result<ModuleInstance, ModuleError>>;

/// Registered module: id, factory, defaults and the facts derived from them.
#[derive(Clone)]
pub struct ModuleDescriptor {
    id: String,
    factory: ModuleFactory,
    default_options: Options,
    hook_style: HookStyle,
    associated_class: Option<String>,
}

impl Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("id", &self.id)
            .field("default_options", &self.default_options)
            .field("hook_style", &self.hook_style)
            .field("associated_class", &self.associated_class)
            .finish_non_exhaustive()
    }
}

impl ModuleDescriptor {
    /// Validates a registration candidate.
    ///
    /// The factory is invoked exactly once with `trial`, a sandbox that has
    /// no mediator installed. The produced instance is inspected for its hook
    /// style and dropped without being initialized.
    pub(crate) fn from_trial(
        id: &str,
        factory: ModuleFactory,
        default_options: Options,
        associated_class_key: &str,
        trial: Sandbox,
    ) -> CoreResult<Self> {
        validate_module_id(id)?;
        let associated_class = associated_class_of(&default_options, associated_class_key)?;
        let instance = factory(trial).map_err(|err| CoreError::FactoryContractViolation {
            module_id: id.to_string(),
            reason: err.to_string(),
        })?;

        Ok(Self {
            id: id.to_string(),
            factory,
            default_options,
            hook_style: instance.hook_style(),
            associated_class,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn default_options(&self) -> &Options {
        &self.default_options
    }

    pub fn hook_style(&self) -> HookStyle {
        self.hook_style
    }

    /// Presentation class marker, present only for widget modules.
    pub fn associated_class(&self) -> Option<&str> {
        self.associated_class.as_deref()
    }

    pub fn is_widget(&self) -> bool {
        self.associated_class.is_some()
    }

    /// Produces a live instance, enforcing the registered hook style.
    pub(crate) fn instantiate(&self, sandbox: Sandbox) -> CoreResult<ModuleInstance> {
        let instance = (self.factory)(sandbox).map_err(|err| {
            CoreError::FactoryContractViolation {
                module_id: self.id.clone(),
                reason: err.to_string(),
            }
        })?;
        if instance.hook_style() != self.hook_style {
            return Err(CoreError::FactoryContractViolation {
                module_id: self.id.clone(),
                reason: format!(
                    "factory produced a {} instance but the module registered as {}",
                    instance.hook_style().as_str(),
                    self.hook_style.as_str()
                ),
            });
        }
        Ok(instance)
    }
}

/// In-process module registry.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    entries: BTreeMap<String, Rc<ModuleDescriptor>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails with `DuplicateModule` when `module_id` is taken.
    pub fn ensure_unregistered(&self, module_id: &str) -> CoreResult<()> {
        if self.entries.contains_key(module_id) {
            return Err(CoreError::DuplicateModule(module_id.to_string()));
        }
        Ok(())
    }

    pub fn insert(&mut self, descriptor: ModuleDescriptor) -> CoreResult<()> {
        self.ensure_unregistered(descriptor.id())?;
        self.entries
            .insert(descriptor.id.clone(), Rc::new(descriptor));
        Ok(())
    }

    /// Removes a descriptor. Instances created from it keep running.
    pub fn unregister(&mut self, module_id: &str) -> bool {
        self.entries.remove(module_id).is_some()
    }

    pub fn get(&self, module_id: &str) -> Option<Rc<ModuleDescriptor>> {
        self.entries.get(module_id).cloned()
    }

    pub fn contains(&self, module_id: &str) -> bool {
        self.entries.contains_key(module_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sorted module ids.
    pub fn module_ids(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Widget bindings of every widget module, sorted by module id.
    pub fn widget_bindings(&self) -> Vec<WidgetBinding> {
        self.entries
            .values()
            .filter_map(|descriptor| {
                descriptor
                    .associated_class()
                    .map(|class| WidgetBinding::new(class, descriptor.id()))
            })
            .collect()
    }
}

pub(crate) fn validate_module_id(module_id: &str) -> CoreResult<()> {
    if module_id.trim().is_empty() {
        return Err(CoreError::InvalidArgument(
            "module id has to be a non-empty string".to_string(),
        ));
    }
    Ok(())
}

fn associated_class_of(options: &Options, key: &str) -> CoreResult<Option<String>> {
    match options.get(key) {
        None => Ok(None),
        Some(Value::String(class)) if CLASS_TOKEN_RE.is_match(class) => Ok(Some(class.clone())),
        Some(other) => Err(CoreError::InvalidArgument(format!(
            "`{key}` has to be a class name token, got {other}"
        ))),
    }
}
