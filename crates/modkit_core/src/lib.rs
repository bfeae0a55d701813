//! Core of the modkit module runtime.
//! Registers module factories, runs instance lifecycles, and routes channel
//! messages between instances through a mediator.

pub mod bus;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod module;
pub mod report;
pub mod runtime;

pub use bus::mediator::{ContextId, Mediator, MediatorHandle, MediatorTarget, SubscriberFn};
pub use config::{ConfigError, DispatchPolicy, RuntimeConfig};
pub use error::{CoreError, CoreErrorKind, CoreResult, ModuleError};
pub use logging::{default_log_level, init_logging, logging_status, LogDestination};
pub use model::options::{merge_options, options_from_value, Options};
pub use model::widget::{parse_widget_bindings, widget_options, WidgetBinding, WIDGETS_OPTION_KEY};
pub use module::contract::{Completion, DeferredModule, HookStyle, Module, ModuleInstance};
pub use module::registry::{ModuleDescriptor, ModuleFactory};
pub use report::{ErrorReporter, LogReporter};
pub use runtime::instance::InstanceState;
pub use runtime::kernel::{Core, CoreRef, LifecycleCallback, StartOptions, CORE_CONTEXT};
pub use runtime::sandbox::Sandbox;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
