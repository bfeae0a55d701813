//! Per-instance facade.
//!
//! A module sees the runtime only through its [`Sandbox`]: the owning core,
//! its own instance id, its merged options, and the publish/subscribe
//! capability the mediator installs at construction.

use crate::bus::mediator::{MediatorHandle, MediatorTarget};
use crate::error::{CoreError, CoreResult, ModuleError};
use crate::model::options::Options;
use crate::runtime::instance::SharedOptions;
use crate::runtime::kernel::{Core, CoreRef};
use log::warn;
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;

/// Restricted view of the runtime handed to a module factory.
///
/// `core` and `instance_id` are fixed at construction; no method changes
/// them. `options` is the same mapping the runtime reports for the
/// instance; the sandbox only reads it. Edits `init` makes to the mapping it
/// is handed become visible here once `init` returns.
#[derive(Debug, Clone)]
pub struct Sandbox {
    core: CoreRef,
    instance_id: String,
    options: SharedOptions,
    bus: Option<MediatorHandle>,
}

impl Sandbox {
    /// # Errors
    /// `Configuration` when the core is gone or `instance_id` is blank.
    pub fn new(core: CoreRef, instance_id: &str, options: Options) -> CoreResult<Self> {
        if !core.is_alive() {
            return Err(CoreError::Configuration("core was not defined".to_string()));
        }
        if instance_id.trim().is_empty() {
            return Err(CoreError::Configuration(
                "no instance id was specified".to_string(),
            ));
        }
        Ok(Self {
            core,
            instance_id: instance_id.to_string(),
            options: Rc::new(RefCell::new(options)),
            bus: None,
        })
    }

    /// The owning runtime, or `None` once it has been dropped.
    pub fn core(&self) -> Option<Core> {
        self.core.upgrade()
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Copy of the instance's current options.
    pub fn options(&self) -> Options {
        self.options.borrow().clone()
    }

    pub(crate) fn shared_options(&self) -> SharedOptions {
        Rc::clone(&self.options)
    }

    /// Whether the mediator capability has been installed.
    pub fn is_connected(&self) -> bool {
        self.bus.is_some()
    }

    /// Publishes on `channel`. Returns `false` when nobody listens or the
    /// sandbox is not connected.
    pub fn publish(&self, channel: &str, args: &[Value]) -> bool {
        match &self.bus {
            Some(bus) => bus.publish(channel, args),
            None => false,
        }
    }

    /// Subscribes on behalf of this instance; `stop` removes the handler.
    pub fn subscribe<F>(&self, channel: &str, callback: F) -> &Self
    where
        F: Fn(&[Value]) -> Result<(), ModuleError> + 'static,
    {
        match &self.bus {
            Some(bus) => {
                bus.subscribe(channel, callback);
            }
            None => warn!(
                "event=channel_subscribe module=sandbox status=skipped instance_id={} channel={}",
                self.instance_id, channel
            ),
        }
        self
    }
}

impl MediatorTarget for Sandbox {
    fn install_mediator(&mut self, handle: MediatorHandle) {
        self.bus = Some(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::Sandbox;
    use crate::bus::mediator::ContextId;
    use crate::error::CoreError;
    use crate::model::options::Options;
    use crate::runtime::kernel::{Core, CoreRef};
    use serde_json::{json, Value};

    #[test]
    fn requires_live_core() {
        let err = Sandbox::new(CoreRef::default(), "widget", Options::new())
            .expect_err("detached core must fail");
        assert!(matches!(err, CoreError::Configuration(_)));

        let core = Core::new();
        let core_ref = core.downgrade();
        drop(core);
        assert!(Sandbox::new(core_ref, "widget", Options::new()).is_err());
    }

    #[test]
    fn requires_instance_id() {
        let core = Core::new();
        let err = Sandbox::new(core.downgrade(), "  ", Options::new())
            .expect_err("blank id must fail");
        assert_eq!(
            err,
            CoreError::Configuration("no instance id was specified".to_string())
        );
    }

    #[test]
    fn exposes_identity_and_options() {
        let core = Core::new();
        let mut options = Options::new();
        options.insert("x".to_string(), json!(1));
        let sandbox = Sandbox::new(core.downgrade(), "w-1", options).expect("valid sandbox");

        assert_eq!(sandbox.instance_id(), "w-1");
        assert_eq!(sandbox.options()["x"], json!(1));
        assert!(sandbox.core().is_some());

        sandbox
            .shared_options()
            .borrow_mut()
            .insert("x".to_string(), json!(2));
        assert_eq!(sandbox.clone().options()["x"], json!(2));
    }

    #[test]
    fn unconnected_sandbox_cannot_publish_or_subscribe() {
        let core = Core::new();
        let sandbox = Sandbox::new(core.downgrade(), "w-1", Options::new()).expect("sandbox");
        sandbox.subscribe("ping", |_args: &[Value]| Ok(()));

        assert!(!sandbox.is_connected());
        assert!(!sandbox.publish("ping", &[]));
        assert_eq!(core.subscriber_count("ping"), 0);
    }

    #[test]
    fn installed_sandbox_subscribes_under_instance_context() {
        let core = Core::new();
        let mut sandbox = Sandbox::new(core.downgrade(), "w-1", Options::new()).expect("sandbox");
        core.mediator()
            .install_to(&mut sandbox, ContextId::new("w-1"));

        sandbox.subscribe("ping", |_args: &[Value]| Ok(()));
        assert!(sandbox.publish("ping", &[]));
        assert_eq!(core.mediator().unsubscribe(&ContextId::new("w-1")), 1);
    }
}
