//! Configuration values exchanged between the runtime and its modules.
//!
//! # Responsibility
//! - Define the option mapping handed to every instance.
//! - Describe widget bindings announced to the widget activator.
//!
//! # Invariants
//! - Merged instance options are always fresh copies; they never alias the
//!   module defaults or another instance's options.

pub mod options;
pub mod widget;
