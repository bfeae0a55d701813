//! Lifecycle contract for module instances.

use crate::error::ModuleError;
use crate::model::options::Options;
use std::fmt::{Debug, Formatter};

/// How an instance signals that `init`/`destroy` finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStyle {
    /// Hooks are complete when they return.
    Sync,
    /// Hooks finish by calling [`Completion::complete`], possibly later.
    Deferred,
}

impl HookStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::Deferred => "deferred",
        }
    }
}

/// Module whose lifecycle hooks complete synchronously.
pub trait Module {
    /// Called once per start with the instance's own merged options.
    fn init(&mut self, options: &mut Options) -> Result<(), ModuleError>;

    /// Called once per stop, after the instance's subscriptions are removed.
    fn destroy(&mut self) -> Result<(), ModuleError>;
}

/// Module whose lifecycle hooks report completion through a [`Completion`].
///
/// Returning `Err` signals an immediate failure; in that case `done` should
/// be dropped rather than completed.
pub trait DeferredModule {
    fn init(&mut self, options: &mut Options, done: Completion) -> Result<(), ModuleError>;

    fn destroy(&mut self, done: Completion) -> Result<(), ModuleError>;
}

/// One-shot completion signal handed to deferred hooks.
///
/// Dropping it without completing means the caller is never notified;
/// there is no timeout.
pub struct Completion {
    on_done: Option<Box<dyn FnOnce(Result<(), ModuleError>)>>,
}

impl Completion {
    pub fn new(on_done: impl FnOnce(Result<(), ModuleError>) + 'static) -> Self {
        Self {
            on_done: Some(Box::new(on_done)),
        }
    }

    pub fn complete(mut self, result: Result<(), ModuleError>) {
        if let Some(on_done) = self.on_done.take() {
            on_done(result);
        }
    }

    pub fn succeed(self) {
        self.complete(Ok(()));
    }

    pub fn fail(self, error: impl Into<ModuleError>) {
        self.complete(Err(error.into()));
    }
}

impl Debug for Completion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("pending", &self.on_done.is_some())
            .finish()
    }
}

/// Object produced by a module factory, tagged with its hook style.
pub enum ModuleInstance {
    Sync(Box<dyn Module>),
    Deferred(Box<dyn DeferredModule>),
}

impl ModuleInstance {
    pub fn sync(module: impl Module + 'static) -> Self {
        Self::Sync(Box::new(module))
    }

    pub fn deferred(module: impl DeferredModule + 'static) -> Self {
        Self::Deferred(Box::new(module))
    }

    pub fn hook_style(&self) -> HookStyle {
        match self {
            Self::Sync(_) => HookStyle::Sync,
            Self::Deferred(_) => HookStyle::Deferred,
        }
    }
}

impl Debug for ModuleInstance {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ModuleInstance({})", self.hook_style().as_str())
    }
}
