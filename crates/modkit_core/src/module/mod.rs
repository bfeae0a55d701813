//! Module contracts and the module registry.
//!
//! # Responsibility
//! - Define the lifecycle contract every module instance satisfies.
//! - Validate and store module descriptors keyed by module id.
//!
//! # Invariants
//! - Module ids are unique within one registry.
//! - A descriptor's hook style is fixed at registration and checked again
//!   whenever the factory produces a live instance.
//! - Descriptors are immutable once stored.

pub mod contract;
pub mod registry;
