//! Mediator implementation.

use crate::config::DispatchPolicy;
use crate::error::{CoreError, ModuleError};
use crate::report::{ErrorReporter, LogReporter};
use log::{debug, warn};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;

/// Subscriber callback. Receives the published arguments positionally.
pub type SubscriberFn = Rc<dyn Fn(&[Value]) -> Result<(), ModuleError>>;

/// Owner token of a subscription; `unsubscribe` removes by owner.
///
/// Sandboxes use their instance id, so stopping an instance drops every
/// handler it registered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(String);

impl ContextId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ContextId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ContextId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ContextId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Clone)]
struct Subscription {
    context: ContextId,
    callback: SubscriberFn,
    live: Rc<Cell<bool>>,
}

/// Process-local channel bus. Cloning yields another handle to the same table.
#[derive(Clone)]
pub struct Mediator {
    channels: Rc<RefCell<HashMap<String, Vec<Subscription>>>>,
    policy: DispatchPolicy,
    reporter: Rc<dyn ErrorReporter>,
}

impl Default for Mediator {
    fn default() -> Self {
        Self::new(DispatchPolicy::default(), Rc::new(LogReporter))
    }
}

impl Debug for Mediator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mediator")
            .field("channels", &self.channels.borrow().len())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Mediator {
    pub fn new(policy: DispatchPolicy, reporter: Rc<dyn ErrorReporter>) -> Self {
        Self {
            channels: Rc::new(RefCell::new(HashMap::new())),
            policy,
            reporter,
        }
    }

    /// Appends a subscription to `channel`, creating the channel if needed.
    pub fn subscribe<F>(&self, channel: &str, context: impl Into<ContextId>, callback: F) -> &Self
    where
        F: Fn(&[Value]) -> Result<(), ModuleError> + 'static,
    {
        self.subscribe_rc(channel, context.into(), Rc::new(callback));
        self
    }

    fn subscribe_rc(&self, channel: &str, context: ContextId, callback: SubscriberFn) {
        debug!(
            "event=channel_subscribe module=mediator status=ok channel={} context={}",
            channel, context
        );
        self.channels
            .borrow_mut()
            .entry(channel.to_string())
            .or_default()
            .push(Subscription {
                context,
                callback,
                live: Rc::new(Cell::new(true)),
            });
    }

    /// Invokes every subscriber of `channel` in registration order.
    ///
    /// Returns `false` without invoking anything when the channel has no
    /// subscribers. Subscriber failures are reported, never returned; the
    /// dispatch policy decides whether the remaining subscribers still run.
    pub fn publish(&self, channel: &str, args: &[Value]) -> bool {
        // Snapshot so subscribers may subscribe, unsubscribe or publish.
        let snapshot = match self.channels.borrow().get(channel) {
            Some(list) if !list.is_empty() => list.clone(),
            _ => return false,
        };

        for subscription in snapshot {
            if !subscription.live.get() {
                continue;
            }
            if let Err(error) = (subscription.callback)(args) {
                let error = CoreError::module(subscription.context.as_str(), error);
                self.reporter.report("channel_publish", &error);
                if self.policy == DispatchPolicy::Abort {
                    warn!(
                        "event=channel_publish module=mediator status=aborted channel={} context={}",
                        channel, subscription.context
                    );
                    break;
                }
            }
        }
        true
    }

    /// Removes every subscription owned by `context`, on every channel.
    ///
    /// Returns the number of removed subscriptions.
    pub fn unsubscribe(&self, context: &ContextId) -> usize {
        let mut removed = 0;
        let mut channels = self.channels.borrow_mut();
        channels.retain(|_, list| {
            list.retain(|subscription| {
                if &subscription.context == context {
                    subscription.live.set(false);
                    removed += 1;
                    false
                } else {
                    true
                }
            });
            !list.is_empty()
        });
        if removed > 0 {
            debug!(
                "event=channel_unsubscribe module=mediator status=ok context={} removed={}",
                context, removed
            );
        }
        removed
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .borrow()
            .get(channel)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Binds publish/subscribe onto `target`, owned by `context`.
    pub fn install_to<T: MediatorTarget + ?Sized>(&self, target: &mut T, context: ContextId) {
        target.install_mediator(MediatorHandle {
            mediator: self.clone(),
            context,
        });
    }
}

/// Anything that can receive mediator capability.
pub trait MediatorTarget {
    fn install_mediator(&mut self, handle: MediatorHandle);
}

/// Publish/subscribe capability bound to one owner context.
///
/// Exposes no way to enumerate or edit other owners' subscriptions.
#[derive(Clone)]
pub struct MediatorHandle {
    mediator: Mediator,
    context: ContextId,
}

impl Debug for MediatorHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediatorHandle")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl MediatorHandle {
    pub fn context(&self) -> &ContextId {
        &self.context
    }

    pub fn subscribe<F>(&self, channel: &str, callback: F) -> &Self
    where
        F: Fn(&[Value]) -> Result<(), ModuleError> + 'static,
    {
        self.mediator
            .subscribe_rc(channel, self.context.clone(), Rc::new(callback));
        self
    }

    pub fn publish(&self, channel: &str, args: &[Value]) -> bool {
        self.mediator.publish(channel, args)
    }
}
