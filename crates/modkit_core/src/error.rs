//! Runtime error contracts.
//!
//! # Responsibility
//! - Classify every failure the runtime can report.
//! - Carry failures raised by module code across the core boundary.
//!
//! # Invariants
//! - `CoreErrorKind::as_str()` values are stable log codes.
//! - Module-raised failures are always wrapped with the owning instance or
//!   subscription context so reports can be attributed.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub type CoreResult<T> = Result<T, CoreError>;

/// Failure raised by module code: lifecycle hooks, factories or subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleError {
    message: String,
}

impl ModuleError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for ModuleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for ModuleError {}

impl From<&str> for ModuleError {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ModuleError {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Stable classification of [`CoreError`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoreErrorKind {
    InvalidArgument,
    DuplicateModule,
    UnknownModule,
    AlreadyRunning,
    FactoryContractViolation,
    Configuration,
    Module,
}

impl CoreErrorKind {
    /// Stable code used in log lines.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid_argument",
            Self::DuplicateModule => "duplicate_module",
            Self::UnknownModule => "unknown_module",
            Self::AlreadyRunning => "already_running",
            Self::FactoryContractViolation => "factory_contract_violation",
            Self::Configuration => "configuration",
            Self::Module => "module",
        }
    }
}

/// Error reported by registry, instance manager, sandbox and mediator paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Wrong shape for an id, option value or argument.
    InvalidArgument(String),
    /// A module with this id is already registered.
    DuplicateModule(String),
    /// No module with this id is registered.
    UnknownModule(String),
    /// The instance is already running (or still initializing).
    AlreadyRunning(String),
    /// The factory did not produce a usable instance.
    FactoryContractViolation { module_id: String, reason: String },
    /// Runtime or sandbox configuration is invalid.
    Configuration(String),
    /// A module hook or subscriber failed.
    Module { owner: String, error: ModuleError },
}

impl CoreError {
    pub fn kind(&self) -> CoreErrorKind {
        match self {
            Self::InvalidArgument(_) => CoreErrorKind::InvalidArgument,
            Self::DuplicateModule(_) => CoreErrorKind::DuplicateModule,
            Self::UnknownModule(_) => CoreErrorKind::UnknownModule,
            Self::AlreadyRunning(_) => CoreErrorKind::AlreadyRunning,
            Self::FactoryContractViolation { .. } => CoreErrorKind::FactoryContractViolation,
            Self::Configuration(_) => CoreErrorKind::Configuration,
            Self::Module { .. } => CoreErrorKind::Module,
        }
    }

    pub(crate) fn module(owner: impl Into<String>, error: ModuleError) -> Self {
        Self::Module {
            owner: owner.into(),
            error,
        }
    }
}

impl Display for CoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            Self::DuplicateModule(id) => write!(f, "module `{id}` was already registered"),
            Self::UnknownModule(id) => write!(f, "module `{id}` is not registered"),
            Self::AlreadyRunning(id) => write!(f, "instance `{id}` was already started"),
            Self::FactoryContractViolation { module_id, reason } => {
                write!(f, "module `{module_id}` violates the factory contract: {reason}")
            }
            Self::Configuration(message) => write!(f, "configuration error: {message}"),
            Self::Module { owner, error } => write!(f, "module `{owner}` failed: {error}"),
        }
    }
}

impl Error for CoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Module { error, .. } => Some(error),
            _ => None,
        }
    }
}
