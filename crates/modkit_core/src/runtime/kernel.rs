//! Composition root: one [`Core`] owns the module registry, the instance
//! table and the mediator.
//!
//! Public operations mirror a host-facing contract: `register` and `start`
//! return `bool` and hand failures to the configured [`ErrorReporter`];
//! `unregister` and `stop` return `false` for absent targets without
//! reporting anything.

use crate::bus::mediator::{ContextId, Mediator};
use crate::config::RuntimeConfig;
use crate::error::{CoreError, CoreResult, ModuleError};
use crate::model::options::{merge_options, Options};
use crate::model::widget::{widget_options, WidgetBinding};
use crate::module::contract::{Completion, HookStyle, ModuleInstance};
use crate::module::registry::{validate_module_id, ModuleDescriptor, ModuleFactory, ModuleRegistry};
use crate::report::{ErrorReporter, LogReporter};
use crate::runtime::instance::{InstanceManager, InstanceSlot, InstanceState};
use crate::runtime::sandbox::Sandbox;
use log::{debug, info, warn};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::fmt::{Debug, Formatter};
use std::rc::{Rc, Weak};

/// Subscription context used by the runtime's own handlers.
pub const CORE_CONTEXT: &str = "__core__";

/// Callback receiving the outcome of a start or stop.
pub type LifecycleCallback = Box<dyn FnOnce(Result<(), CoreError>)>;

pub(crate) struct CoreInner {
    config: RuntimeConfig,
    registry: RefCell<ModuleRegistry>,
    instances: RefCell<InstanceManager>,
    mediator: Mediator,
    reporter: Rc<dyn ErrorReporter>,
    booted: Cell<bool>,
}

/// Non-owning reference to a [`Core`], held by sandboxes.
#[derive(Clone, Default)]
pub struct CoreRef(Weak<CoreInner>);

impl CoreRef {
    pub fn upgrade(&self) -> Option<Core> {
        self.0.upgrade().map(|inner| Core { inner })
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl Debug for CoreRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreRef")
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Per-call arguments of [`Core::start`].
#[derive(Default)]
pub struct StartOptions {
    instance_id: Option<String>,
    options: Option<Options>,
    callback: Option<LifecycleCallback>,
}

impl StartOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Explicit instance id. Defaults to the module id, or to a synthesized
    /// unique id for widget modules.
    pub fn instance_id(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = Some(instance_id.into());
        self
    }

    /// Overrides layered over the module's default options.
    pub fn options(mut self, options: Options) -> Self {
        self.options = Some(options);
        self
    }

    /// Receives `Ok(())` once `init` completed, or the start failure.
    pub fn callback(mut self, callback: impl FnOnce(Result<(), CoreError>) + 'static) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }
}

impl Debug for StartOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StartOptions")
            .field("instance_id", &self.instance_id)
            .field("options", &self.options)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// Records one lifecycle outcome and delivers it to the callback, if any.
///
/// While held, the outcome is queued until `release`, so a completion
/// signalled from inside a hook observes the state the runtime records
/// after that hook returns.
#[derive(Clone)]
struct CallbackSlot(Rc<RefCell<CallbackState>>);

#[derive(Default)]
struct CallbackState {
    callback: Option<LifecycleCallback>,
    held: bool,
    settled: bool,
    queued: Option<Result<(), CoreError>>,
}

impl CallbackSlot {
    fn new(callback: Option<LifecycleCallback>) -> Self {
        Self(Rc::new(RefCell::new(CallbackState {
            callback,
            ..CallbackState::default()
        })))
    }

    fn hold(&self) {
        self.0.borrow_mut().held = true;
    }

    fn is_settled(&self) -> bool {
        self.0.borrow().settled
    }

    /// Later outcomes are ignored once one has been recorded.
    fn settle(&self, result: Result<(), CoreError>) {
        let callback = {
            let mut state = self.0.borrow_mut();
            if state.settled {
                return;
            }
            state.settled = true;
            if state.held {
                state.queued = Some(result);
                return;
            }
            state.callback.take()
        };
        if let Some(callback) = callback {
            callback(result);
        }
    }

    fn release(&self) {
        let pending = {
            let mut state = self.0.borrow_mut();
            state.held = false;
            match state.queued.take() {
                Some(result) => state.callback.take().map(|callback| (callback, result)),
                None => None,
            }
        };
        if let Some((callback, result)) = pending {
            callback(result);
        }
    }
}

/// Module runtime. Cloning yields another handle to the same runtime.
#[derive(Clone)]
pub struct Core {
    inner: Rc<CoreInner>,
}

impl Default for Core {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Core {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Core")
            .field("modules", &self.inner.registry.borrow().len())
            .field("instances", &self.inner.instances.borrow().len())
            .field("booted", &self.inner.booted.get())
            .finish_non_exhaustive()
    }
}

impl Core {
    /// Runtime with default configuration that logs reported errors.
    pub fn new() -> Self {
        Self::build(RuntimeConfig::default(), Rc::new(LogReporter))
    }

    pub fn with_reporter(reporter: Rc<dyn ErrorReporter>) -> Self {
        Self::build(RuntimeConfig::default(), reporter)
    }

    pub fn with_config(config: RuntimeConfig) -> CoreResult<Self> {
        Self::with_parts(config, Rc::new(LogReporter))
    }

    pub fn with_parts(config: RuntimeConfig, reporter: Rc<dyn ErrorReporter>) -> CoreResult<Self> {
        config
            .validate()
            .map_err(|err| CoreError::Configuration(err.to_string()))?;
        Ok(Self::build(config, reporter))
    }

    fn build(config: RuntimeConfig, reporter: Rc<dyn ErrorReporter>) -> Self {
        let mediator = Mediator::new(config.dispatch_policy, Rc::clone(&reporter));
        Self {
            inner: Rc::new(CoreInner {
                config,
                registry: RefCell::new(ModuleRegistry::new()),
                instances: RefCell::new(InstanceManager::new()),
                mediator,
                reporter,
                booted: Cell::new(false),
            }),
        }
    }

    pub fn downgrade(&self) -> CoreRef {
        CoreRef(Rc::downgrade(&self.inner))
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Host-side access to the channel bus.
    pub fn mediator(&self) -> &Mediator {
        &self.inner.mediator
    }

    /// Registers a module factory with optional default options.
    ///
    /// The factory is invoked once to validate it; that trial instance is
    /// dropped without `init`. Returns `false` (and reports the reason) on a
    /// blank or duplicate id, a malformed class marker, or a failing factory.
    pub fn register<F>(
        &self,
        module_id: &str,
        factory: F,
        default_options: impl Into<Option<Options>>,
    ) -> bool
    where
        F: Fn(Sandbox) -> Result<ModuleInstance, ModuleError> + 'static,
    {
        let default_options = default_options.into().unwrap_or_default();
        match self.try_register(module_id, Rc::new(factory), default_options) {
            Ok(()) => {
                info!(
                    "event=module_register module=runtime status=ok module_id={}",
                    module_id
                );
                true
            }
            Err(error) => {
                self.inner.reporter.report("module_register", &error);
                false
            }
        }
    }

    fn try_register(
        &self,
        module_id: &str,
        factory: ModuleFactory,
        default_options: Options,
    ) -> CoreResult<()> {
        validate_module_id(module_id)?;
        self.inner.registry.borrow().ensure_unregistered(module_id)?;

        let trial = Sandbox::new(
            self.downgrade(),
            &format!("{module_id}#trial"),
            default_options.clone(),
        )?;
        let descriptor = ModuleDescriptor::from_trial(
            module_id,
            factory,
            default_options,
            &self.inner.config.associated_class_key,
            trial,
        )?;
        self.inner.registry.borrow_mut().insert(descriptor)
    }

    /// Removes a module descriptor; running instances are unaffected.
    pub fn unregister(&self, module_id: &str) -> bool {
        let removed = self.inner.registry.borrow_mut().unregister(module_id);
        if removed {
            info!(
                "event=module_unregister module=runtime status=ok module_id={}",
                module_id
            );
        }
        removed
    }

    /// Creates (or reuses) an instance of `module_id` and runs its `init`.
    ///
    /// Never panics or propagates: failures are reported, delivered to the
    /// optional callback, and turned into `false`. For deferred modules the
    /// return value only says `init` was entered; completion arrives through
    /// the callback.
    pub fn start(&self, module_id: &str, opts: StartOptions) -> bool {
        let StartOptions {
            instance_id,
            options,
            callback,
        } = opts;
        let callback = CallbackSlot::new(callback);

        match self.try_start(module_id, instance_id, options.as_ref(), &callback) {
            Ok(instance_id) => {
                info!(
                    "event=module_start module=runtime status=ok module_id={} instance_id={}",
                    module_id, instance_id
                );
                true
            }
            Err(error) => {
                self.fail_lifecycle("module_start", &callback, error);
                false
            }
        }
    }

    fn try_start(
        &self,
        module_id: &str,
        instance_id: Option<String>,
        overrides: Option<&Options>,
        callback: &CallbackSlot,
    ) -> CoreResult<String> {
        validate_module_id(module_id)?;
        let descriptor = self
            .inner
            .registry
            .borrow()
            .get(module_id)
            .ok_or_else(|| CoreError::UnknownModule(module_id.to_string()))?;

        let instance_id = match instance_id {
            Some(id) if id.trim().is_empty() => {
                return Err(CoreError::InvalidArgument(
                    "instance id has to be a non-empty string".to_string(),
                ));
            }
            Some(id) => id,
            None if descriptor.is_widget() => {
                self.inner.instances.borrow_mut().synthesize_id(module_id)
            }
            None => module_id.to_string(),
        };

        let slot = self.resolve_instance(&descriptor, &instance_id, overrides)?;
        self.inner.instances.borrow_mut().begin_start(&instance_id)?;

        callback.hold();
        let outcome = self.run_init(&slot, &instance_id, callback);
        if outcome.is_err() {
            // An idle instance must not keep handlers from a failed init.
            self.inner
                .mediator
                .unsubscribe(&ContextId::new(instance_id.as_str()));
        }
        self.inner
            .instances
            .borrow_mut()
            .finish_start(&instance_id, outcome.is_ok());
        if let Ok(HookStyle::Sync) = outcome {
            callback.settle(Ok(()));
        }
        callback.release();

        outcome.map(|_| instance_id)
    }

    /// Returns the existing instance for `instance_id`, or builds one.
    fn resolve_instance(
        &self,
        descriptor: &ModuleDescriptor,
        instance_id: &str,
        overrides: Option<&Options>,
    ) -> CoreResult<InstanceSlot> {
        let existing = self.inner.instances.borrow().lookup(instance_id);
        if let Some((owner, slot)) = existing {
            if owner != descriptor.id() {
                return Err(CoreError::InvalidArgument(format!(
                    "instance id `{instance_id}` already belongs to module `{owner}`"
                )));
            }
            return Ok(slot);
        }

        let options = merge_options(descriptor.default_options(), overrides);
        let mut sandbox = Sandbox::new(self.downgrade(), instance_id, options)?;
        self.inner
            .mediator
            .install_to(&mut sandbox, ContextId::new(instance_id));
        let options = sandbox.shared_options();
        let module = descriptor.instantiate(sandbox)?;

        debug!(
            "event=instance_create module=runtime status=ok module_id={} instance_id={} hooks={}",
            descriptor.id(),
            instance_id,
            module.hook_style().as_str()
        );
        self.inner
            .instances
            .borrow_mut()
            .insert(instance_id, descriptor.id(), module, options)
    }

    /// Runs `init` on a working copy of the options and stores the copy back
    /// afterwards, whatever the outcome.
    fn run_init(
        &self,
        slot: &InstanceSlot,
        instance_id: &str,
        callback: &CallbackSlot,
    ) -> CoreResult<HookStyle> {
        let mut module = slot
            .module
            .try_borrow_mut()
            .map_err(|_| CoreError::AlreadyRunning(instance_id.to_string()))?;
        let mut options = slot.options.borrow().clone();
        let style = module.hook_style();
        let result = match &mut *module {
            ModuleInstance::Sync(hooks) => hooks.init(&mut options),
            ModuleInstance::Deferred(hooks) => hooks.init(
                &mut options,
                self.completion(instance_id, "module_start", callback.clone()),
            ),
        };
        *slot.options.borrow_mut() = options;
        result
            .map(|()| style)
            .map_err(|error| CoreError::module(instance_id, error))
    }

    /// Stops a live instance: unsubscribes it, runs `destroy`, removes it.
    ///
    /// Returns `false` only when there is no such instance or one of its
    /// hooks is still executing.
    pub fn stop(&self, instance_id: &str) -> bool {
        self.stop_inner(instance_id, CallbackSlot::new(None))
    }

    /// Like [`Core::stop`], delivering the `destroy` outcome to `callback`.
    pub fn stop_with_callback(
        &self,
        instance_id: &str,
        callback: impl FnOnce(Result<(), CoreError>) + 'static,
    ) -> bool {
        self.stop_inner(instance_id, CallbackSlot::new(Some(Box::new(callback))))
    }

    fn stop_inner(&self, instance_id: &str, callback: CallbackSlot) -> bool {
        let existing = self.inner.instances.borrow().lookup(instance_id);
        let Some((_, slot)) = existing else {
            return false;
        };
        let Ok(mut module) = slot.module.try_borrow_mut() else {
            warn!(
                "event=module_stop module=runtime status=busy instance_id={}",
                instance_id
            );
            return false;
        };

        self.inner
            .mediator
            .unsubscribe(&ContextId::new(instance_id));
        callback.hold();
        let style = module.hook_style();
        let result = match &mut *module {
            ModuleInstance::Sync(hooks) => hooks.destroy(),
            ModuleInstance::Deferred(hooks) => {
                hooks.destroy(self.completion(instance_id, "module_stop", callback.clone()))
            }
        };
        drop(module);
        self.inner.instances.borrow_mut().remove(instance_id);

        match result {
            Ok(()) => {
                info!(
                    "event=module_stop module=runtime status=ok instance_id={}",
                    instance_id
                );
                if style == HookStyle::Sync {
                    callback.settle(Ok(()));
                }
            }
            Err(error) => self.fail_lifecycle(
                "module_stop",
                &callback,
                CoreError::module(instance_id, error),
            ),
        }
        callback.release();
        true
    }

    /// Reports `error` and delivers it, unless an outcome was already
    /// recorded for this start or stop.
    fn fail_lifecycle(&self, operation: &'static str, callback: &CallbackSlot, error: CoreError) {
        if callback.is_settled() {
            return;
        }
        self.inner.reporter.report(operation, &error);
        callback.settle(Err(error));
    }

    fn completion(
        &self,
        instance_id: &str,
        operation: &'static str,
        callback: CallbackSlot,
    ) -> Completion {
        let reporter = Rc::clone(&self.inner.reporter);
        let owner = instance_id.to_string();
        Completion::new(move |result| match result {
            Ok(()) => callback.settle(Ok(())),
            Err(_) if callback.is_settled() => {}
            Err(error) => {
                let error = CoreError::module(owner, error);
                reporter.report(operation, &error);
                callback.settle(Err(error));
            }
        })
    }

    /// Publishes on the runtime's mediator.
    pub fn publish(&self, channel: &str, args: &[Value]) -> bool {
        self.inner.mediator.publish(channel, args)
    }

    /// Wires the ready-channel handler and starts the lifecycle notifier.
    ///
    /// Every later publish on the ready channel issues exactly one start of
    /// the widget activator with the current widget bindings. Calling `boot`
    /// again is a no-op.
    pub fn boot(&self) {
        if self.inner.booted.replace(true) {
            debug!("event=core_boot module=runtime status=skipped reason=already_booted");
            return;
        }

        let weak = self.downgrade();
        self.inner.mediator.subscribe(
            &self.inner.config.ready_channel,
            CORE_CONTEXT,
            move |_args: &[Value]| {
                if let Some(core) = weak.upgrade() {
                    core.activate_widgets();
                }
                Ok(())
            },
        );
        info!(
            "event=core_boot module=runtime status=ok ready_channel={}",
            self.inner.config.ready_channel
        );

        self.start(
            &self.inner.config.lifecycle_notifier_module_id,
            StartOptions::new(),
        );
    }

    fn activate_widgets(&self) -> bool {
        let bindings = self.widget_bindings();
        debug!(
            "event=widget_activation module=runtime status=start widgets={}",
            bindings.len()
        );
        self.start(
            &self.inner.config.widget_activator_module_id,
            StartOptions::new().options(widget_options(&bindings)),
        )
    }

    pub fn is_booted(&self) -> bool {
        self.inner.booted.get()
    }

    pub fn is_registered(&self, module_id: &str) -> bool {
        self.inner.registry.borrow().contains(module_id)
    }

    pub fn module_ids(&self) -> Vec<String> {
        self.inner.registry.borrow().module_ids()
    }

    pub fn descriptor(&self, module_id: &str) -> Option<Rc<ModuleDescriptor>> {
        self.inner.registry.borrow().get(module_id)
    }

    /// Widget bindings of every registered widget module, sorted by module id.
    pub fn widget_bindings(&self) -> Vec<WidgetBinding> {
        self.inner.registry.borrow().widget_bindings()
    }

    /// `None` when no such instance exists.
    pub fn is_running(&self, instance_id: &str) -> Option<bool> {
        self.inner.instances.borrow().is_running(instance_id)
    }

    pub fn instance_state(&self, instance_id: &str) -> Option<InstanceState> {
        self.inner.instances.borrow().state(instance_id)
    }

    /// Copy of an instance's own options.
    pub fn instance_options(&self, instance_id: &str) -> Option<Options> {
        self.inner.instances.borrow().options(instance_id)
    }

    pub fn instance_ids(&self) -> Vec<String> {
        self.inner.instances.borrow().instance_ids()
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.inner.mediator.subscriber_count(channel)
    }
}
