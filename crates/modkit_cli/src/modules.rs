//! Built-in modules wired by the demo: the lifecycle notifier, the widget
//! activator and one sample widget.

use crate::page::Page;
use log::{info, warn};
use modkit_core::{
    options_from_value, parse_widget_bindings, Core, Module, ModuleError, ModuleInstance,
    Options, Sandbox, StartOptions,
};
use serde_json::{json, Value};
use std::rc::Rc;

/// Registers the notifier, the activator and the `greeter` widget.
pub fn register_builtins(core: &Core, page: &Rc<Page>) -> bool {
    let config = core.config().clone();

    let notifier_page = Rc::clone(page);
    let ready = config.ready_channel.clone();
    let loaded = config.loaded_channel.clone();
    let notifier = core.register(
        &config.lifecycle_notifier_module_id,
        move |sandbox: Sandbox| -> Result<ModuleInstance, ModuleError> {
            Ok(ModuleInstance::sync(LifecycleNotifier {
                sandbox,
                page: Rc::clone(&notifier_page),
                ready_channel: ready.clone(),
                loaded_channel: loaded.clone(),
            }))
        },
        None,
    );

    let activator_page = Rc::clone(page);
    let activator = core.register(
        &config.widget_activator_module_id,
        move |sandbox: Sandbox| -> Result<ModuleInstance, ModuleError> {
            Ok(ModuleInstance::sync(WidgetActivator {
                sandbox,
                page: Rc::clone(&activator_page),
            }))
        },
        None,
    );

    let mut greeter_defaults = options_from_value(json!({ "salutation": "hello" }))
        .unwrap_or_default();
    greeter_defaults.insert(
        config.associated_class_key.clone(),
        Value::String("greeting".to_string()),
    );
    let greeter_page = Rc::clone(page);
    let greeter = core.register(
        "greeter",
        move |sandbox: Sandbox| -> Result<ModuleInstance, ModuleError> {
            Ok(ModuleInstance::sync(Greeter {
                sandbox,
                page: Rc::clone(&greeter_page),
            }))
        },
        greeter_defaults,
    );

    notifier && activator && greeter
}

/// Bridges page lifecycle hooks onto the ready and loaded channels.
struct LifecycleNotifier {
    sandbox: Sandbox,
    page: Rc<Page>,
    ready_channel: String,
    loaded_channel: String,
}

impl Module for LifecycleNotifier {
    fn init(&mut self, _options: &mut Options) -> Result<(), ModuleError> {
        let sandbox = self.sandbox.clone();
        let channel = self.ready_channel.clone();
        self.page.on_ready(move || {
            sandbox.publish(&channel, &[]);
        });

        let sandbox = self.sandbox.clone();
        let channel = self.loaded_channel.clone();
        self.page.on_loaded(move || {
            sandbox.publish(&channel, &[]);
        });
        Ok(())
    }

    fn destroy(&mut self) -> Result<(), ModuleError> {
        Ok(())
    }
}

/// Starts one widget instance per page element carrying a bound class.
struct WidgetActivator {
    sandbox: Sandbox,
    page: Rc<Page>,
}

impl Module for WidgetActivator {
    fn init(&mut self, options: &mut Options) -> Result<(), ModuleError> {
        let bindings = parse_widget_bindings(options)
            .map_err(|err| ModuleError::new(format!("malformed widget list: {err}")))?;
        let core = self
            .sandbox
            .core()
            .ok_or_else(|| ModuleError::new("core is gone"))?;

        for binding in &bindings {
            for element in self.page.select_class(&binding.associated_class) {
                let mut widget_options = Options::new();
                widget_options.insert("el".to_string(), Value::String(element.id.clone()));
                let started = core.start(
                    &binding.module_id,
                    StartOptions::new()
                        .instance_id(element.id.as_str())
                        .options(widget_options),
                );
                if !started {
                    warn!(
                        "event=widget_start module=cli status=error module_id={} element={}",
                        binding.module_id, element.id
                    );
                }
            }
        }
        Ok(())
    }

    fn destroy(&mut self) -> Result<(), ModuleError> {
        Ok(())
    }
}

/// Sample widget: greets whoever publishes on `greet`.
struct Greeter {
    sandbox: Sandbox,
    page: Rc<Page>,
}

impl Module for Greeter {
    fn init(&mut self, options: &mut Options) -> Result<(), ModuleError> {
        let element = options
            .get("el")
            .and_then(Value::as_str)
            .ok_or_else(|| ModuleError::new("greeter needs an `el` option"))?
            .to_string();
        let salutation = options
            .get("salutation")
            .and_then(Value::as_str)
            .unwrap_or("hi")
            .to_string();

        let page = Rc::clone(&self.page);
        self.sandbox.subscribe("greet", move |args: &[Value]| {
            let name = args
                .first()
                .and_then(Value::as_str)
                .ok_or_else(|| ModuleError::new("greet expects a name"))?;
            page.write(format!("#{element}: {salutation}, {name}"));
            Ok(())
        });
        info!(
            "event=widget_init module=cli status=ok instance_id={}",
            self.sandbox.instance_id()
        );
        Ok(())
    }

    fn destroy(&mut self) -> Result<(), ModuleError> {
        Ok(())
    }
}
