// Allow unused assignments for diagnostic fields - they're used by the macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Scheduler error type
#[derive(Error, Debug, Diagnostic)]
pub enum SchedulerError {
    /// Malformed resource data (quantities, missing fields)
    #[error(transparent)]
    #[diagnostic(transparent)]
    CoreError(#[from] nodefit_core::CoreError),

    /// A control-plane call failed
    #[error(transparent)]
    #[diagnostic(transparent)]
    ClientError(#[from] nodefit_client::ClientError),

    /// No node could be picked from the fit candidates
    #[error("Node selection failed: {message}")]
    #[diagnostic(
        code(scheduler::selection_failed),
        help("{suggestion}")
    )]
    SelectionFailed {
        #[allow(unused)]
        message: String,
        #[allow(unused)]
        suggestion: String,
    },

    /// The price table file could not be used
    #[error("Invalid price table {path}: {message}")]
    #[diagnostic(
        code(scheduler::invalid_price_table),
        help("The price table is a YAML mapping of instance type to hourly price, e.g. `m5.large: 0.096`")
    )]
    InvalidPriceTable {
        #[allow(unused)]
        path: String,
        #[allow(unused)]
        message: String,
    },

    /// Internal error
    #[error("Internal error: {message}")]
    #[diagnostic(
        code(scheduler::internal_error),
        help("This is likely a bug. Please report it")
    )]
    InternalError {
        #[allow(unused)]
        message: String,
    },
}

/// Result type for scheduler operations
pub type Result<T> = std::result::Result<T, SchedulerError>;

impl SchedulerError {
    /// Create a SelectionFailed error
    pub fn selection_failed(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::SelectionFailed {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create an InvalidPriceTable error
    pub fn invalid_price_table(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPriceTable {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an InternalError
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }
}
