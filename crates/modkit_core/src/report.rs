//! Error reporting seam for boolean-returning API boundaries.
//!
//! `register`, `start` and mediator dispatch never propagate failures to
//! their callers; they hand them to an [`ErrorReporter`] instead.

use crate::error::CoreError;
use crate::logging::{sanitize_message, MAX_LOG_MESSAGE_CHARS};
use log::error;

/// Sink for failures caught at an API boundary.
pub trait ErrorReporter {
    /// `operation` is a stable event name such as `module_start`.
    fn report(&self, operation: &'static str, error: &CoreError);
}

/// Default reporter: one `log::error!` line per failure.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, operation: &'static str, error: &CoreError) {
        error!(
            "event={} module=runtime status=error kind={} message={}",
            operation,
            error.kind().as_str(),
            sanitize_message(&error.to_string(), MAX_LOG_MESSAGE_CHARS)
        );
    }
}
