//! Instance lifecycle runtime.
//!
//! # Responsibility
//! - Build one sandbox per instance and wire it to the mediator.
//! - Create, start and stop instances while merging option layers.
//! - Expose the boolean-returning public API and the bootstrap fan-out.
//!
//! # Invariants
//! - Instance ids are unique within one `Core`.
//! - Table borrows are never held while module code runs, so hooks and
//!   subscribers may call back into the runtime.
//! - `register` and `start` never propagate errors to their caller.

pub mod instance;
pub mod kernel;
pub mod sandbox;
